//! Flat `key=value` sources and how they are folded into a tree.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::node::Node;
use crate::value::Value;

const PLACEHOLDER: &str = "{0}";

/// Parses `.properties` text.
///
/// Supports `#`/`!` comments, `=`/`:`/whitespace separators, backslash line
/// continuations and the `\t \n \r \f \uXXXX` escapes. Entries come back in
/// file order; a repeated key appears more than once.
pub fn parse_properties(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut entries = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let mut logical = line.to_string();
        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }
        let (key, value) = split_key_value(&logical);
        entries.push((unescape(key)?, unescape(value)?));
    }
    Ok(entries)
}

fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    const BLANK: [char; 3] = [' ', '\t', '\x0c'];
    let mut escaped = false;
    let mut end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let mut rest = line[end..].trim_start_matches(BLANK);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(BLANK);
    }
    (&line[..end], rest)
}

fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let high = hex_unit(&mut chars)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    let low = match (chars.next(), chars.next()) {
                        (Some('\\'), Some('u')) => hex_unit(&mut chars)?,
                        _ => return Err(format!("unpaired surrogate \\u{high:04X}")),
                    };
                    0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF)
                } else {
                    high
                };
                out.push(char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#X}"))?);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn hex_unit(chars: &mut std::str::Chars<'_>) -> Result<u32, String> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 {
        return Err("malformed \\uxxxx encoding".to_string());
    }
    u32::from_str_radix(&digits, 16).map_err(|_| format!("malformed \\uxxxx encoding: {digits}"))
}

/// Parses the XML variant: `<properties><entry key="k">v</entry></properties>`.
/// `<comment>` elements are ignored.
pub fn parse_properties_xml(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<(String, String)> = None;
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) if e.name().as_ref() == b"entry" => {
                current = Some((entry_key(&e)?, String::new()));
            }
            Event::Empty(e) if e.name().as_ref() == b"entry" => {
                entries.push((entry_key(&e)?, String::new()));
            }
            Event::Text(t) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&t.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(t) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) if e.name().as_ref() == b"entry" => {
                entries.extend(current.take());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(entries)
}

fn entry_key(e: &quick_xml::events::BytesStart<'_>) -> Result<String, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == b"key" {
            return attr
                .unescape_value()
                .map(|v| v.into_owned())
                .map_err(|e| e.to_string());
        }
    }
    Err("<entry> without a key attribute".to_string())
}

/// Drops everything from the first `{0}` onwards.
pub fn up_to_placeholder(value: &str) -> &str {
    match value.find(PLACEHOLDER) {
        Some(index) => &value[..index],
        None => value,
    }
}

impl Node {
    /// Folds flat dotted keys into the tree.
    ///
    /// Each key is walked one segment at a time, descending while the
    /// current target holds a node under the segment. At the first segment
    /// that is not a node, the remaining dotted suffix is stored literally as
    /// one key. A key whose every segment names a node stores nothing.
    pub fn flatten_properties<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in entries {
            let value = up_to_placeholder(value.trim()).to_string();
            let segments = key.trim().split('.').map(str::trim).collect::<Vec<_>>();
            let mut target = self.clone();
            for (i, segment) in segments.iter().enumerate() {
                if let Some(Value::Node(next)) = target.get_raw(segment) {
                    target = next;
                    continue;
                }
                target.put(&segments[i..].join("."), Value::Text(value));
                break;
            }
        }
    }
}
