//! ISO-8601 durations (`PnDTnHnMn.nS`), as used by `<duration>` entries.

use std::sync::LazyLock;

use chrono::TimeDelta;
use regex::Regex;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^([-+]?)P(?:([-+]?[0-9]+)D)?(?:T(?:([-+]?[0-9]+)H)?(?:([-+]?[0-9]+)M)?(?:([-+]?[0-9]+)(?:[.,]([0-9]{0,9}))?S)?)?$",
    )
    .expect("duration pattern is valid")
});

/// Parses an ISO-8601 day-time duration. Returns `None` for text that is
/// not a duration or has no components.
pub fn parse_iso_duration(text: &str) -> Option<TimeDelta> {
    let caps = ISO_DURATION.captures(text.trim())?;
    if caps.get(2).is_none() && caps.get(3).is_none() && caps.get(4).is_none() && caps.get(5).is_none()
    {
        return None;
    }
    if text.trim().to_ascii_uppercase().ends_with('T') {
        return None;
    }

    let int = |i: usize| -> Option<i64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<i64>().ok(),
            None => Some(0),
        }
    };

    let days = int(2)?;
    let hours = int(3)?;
    let minutes = int(4)?;
    let seconds = int(5)?;
    let nanos = match caps.get(6) {
        Some(m) if !m.as_str().is_empty() => {
            let digits = m.as_str();
            let scale = 10_i64.pow(9 - digits.len() as u32);
            let n = digits.parse::<i64>().ok()? * scale;
            if seconds < 0 || caps.get(5).is_some_and(|s| s.as_str().starts_with('-')) {
                -n
            } else {
                n
            }
        }
        _ => 0,
    };

    let total = TimeDelta::try_days(days)?
        .checked_add(&TimeDelta::try_hours(hours)?)?
        .checked_add(&TimeDelta::try_minutes(minutes)?)?
        .checked_add(&TimeDelta::try_seconds(seconds)?)?
        .checked_add(&TimeDelta::nanoseconds(nanos))?;

    if &caps[1] == "-" {
        Some(-total)
    } else {
        Some(total)
    }
}

/// Formats a duration the way `java.time.Duration#toString` does:
/// `PT{h}H{m}M{s}S`, zero parts omitted, `PT0S` for zero.
pub fn format_iso_duration(duration: TimeDelta) -> String {
    if duration.is_zero() {
        return "PT0S".to_string();
    }
    let negative = duration < TimeDelta::zero();
    let abs = duration.abs();
    let hours = abs.num_hours();
    let minutes = abs.num_minutes() % 60;
    let seconds = abs.num_seconds() % 60;
    let nanos = abs.subsec_nanos();
    let sign = if negative { "-" } else { "" };

    let mut out = String::from("PT");
    if hours != 0 {
        out.push_str(&format!("{sign}{hours}H"));
    }
    if minutes != 0 {
        out.push_str(&format!("{sign}{minutes}M"));
    }
    if seconds != 0 || nanos != 0 {
        out.push_str(&format!("{sign}{seconds}"));
        if nanos != 0 {
            let frac = format!("{nanos:09}");
            out.push('.');
            out.push_str(frac.trim_end_matches('0'));
        }
        out.push('S');
    }
    out
}
