//! Logic behind the `model-run` binary: load a model file into a fresh tree,
//! run steps against it and render the result.

use std::path::Path;

use model_tree::{ModelError, Node, Value};
use tracing::info;

use crate::engine;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CliError {
    Usage(String),
    UnknownFormat(String),
    Model(ModelError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(e) => write!(f, "{e}"),
            CliError::UnknownFormat(e) => write!(f, "Unknown model format: {e}"),
            CliError::Model(e) => write!(f, "{e}"),
        }
    }
}

impl From<ModelError> for CliError {
    fn from(e: ModelError) -> Self {
        CliError::Model(e)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────

/// Loads a `.json` or `.xml` model file into a new root node built on the
/// expression-language engine.
pub fn load(path: &Path) -> Result<Node, CliError> {
    info!(file = %path.display(), "loading model");
    let root = engine().root();
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => root.append_from_json_file(path)?,
        Some("xml") => root.append_from_xml_file(path)?,
        other => return Err(CliError::UnknownFormat(other.unwrap_or("").to_string())),
    };
    Ok(root)
}

// ── Running ───────────────────────────────────────────────────────────────

/// Runs `steps` against `root`, or its `run()` entry point when no steps are
/// given. Returns the value of the last step.
pub fn execute(root: &Node, steps: Option<&str>) -> Result<Value, CliError> {
    let value = match steps {
        Some(steps) => root.steps(steps)?,
        None => root.run()?,
    };
    Ok(value)
}

/// Loads `file`, runs it and renders the resulting tree as pretty JSON.
pub fn run_file(file: &str, steps: Option<&str>) -> Result<String, CliError> {
    if file.is_empty() {
        return Err(CliError::Usage("First argument must be a model file.".into()));
    }
    let root = load(Path::new(file))?;
    execute(&root, steps)?;
    Ok(root.to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn runs_inline_steps_and_renders_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("model.json");
        fs::write(&file, "{ count: 3 }").unwrap();

        let out = run_file(file.to_str().unwrap(), Some("count = count * 2")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["count"], serde_json::json!(6));
    }

    #[test]
    fn runs_the_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("model.json");
        fs::write(&file, r#"{ n: 0, "$$run": ["n = n + 1", "n = n + 1"] }"#).unwrap();

        let root = load(&file).unwrap();
        assert_eq!(execute(&root, None).unwrap(), Value::from(2));
    }

    #[test]
    fn rejects_unknown_formats() {
        assert!(matches!(
            load(Path::new("model.yaml")),
            Err(CliError::UnknownFormat(ext)) if ext == "yaml"
        ));
        assert!(matches!(run_file("", None), Err(CliError::Usage(_))));
    }
}
