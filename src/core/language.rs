// src/core/language.rs

use crate::{
    constants::LANGUAGE_FILENAME,
    core::paths::{self, PathStatus},
};
use serde_json::{Map, Value};
use std::{fs, path::Path};

/// Loads the messages file from the working directory, falling back to the
/// installation root. Missing files are silent; broken ones are logged and skipped.
pub fn load_language(working_dir: &Path, install_root: &Path) -> Option<Map<String, Value>> {
    let path = [working_dir, install_root]
        .into_iter()
        .map(|dir| dir.join(LANGUAGE_FILENAME))
        .find(|candidate| matches!(paths::probe(candidate), PathStatus::Present))?;

    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()));

    match parsed {
        Ok(Value::Object(messages)) => {
            log::info!("Using language file: {}", path.display());
            Some(messages)
        }
        Ok(_) => {
            log::warn!("Language file {} is not a JSON object, skipping it...", path.display());
            None
        }
        Err(e) => {
            log::warn!(
                "Invalid or inaccessible language file {}, skipping it... ({})",
                path.display(),
                e
            );
            None
        }
    }
}

/// Flattens a message entry into display lines: a string is split on newlines,
/// an array contributes one line per string element.
pub fn as_lines(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s.lines().map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_working_dir_language_wins() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        let install = tmp.path().join("install");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir_all(&install).unwrap();
        fs::write(work.join(LANGUAGE_FILENAME), r#"{ "help": "local" }"#).unwrap();
        fs::write(install.join(LANGUAGE_FILENAME), r#"{ "help": "global" }"#).unwrap();

        let messages = load_language(&work, &install).unwrap();
        assert_eq!(messages.get("help"), Some(&json!("local")));
    }

    #[test]
    fn test_broken_language_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(LANGUAGE_FILENAME), "{ broken").unwrap();
        assert!(load_language(tmp.path(), tmp.path()).is_none());
    }

    #[test]
    fn test_as_lines() {
        assert_eq!(as_lines(&json!("a\nb")), vec!["a", "b"]);
        assert_eq!(as_lines(&json!(["a", 1, "b"])), vec!["a", "b"]);
        assert!(as_lines(&json!(3)).is_empty());
    }
}
