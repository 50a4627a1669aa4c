//! # Config Loader
//!
//! This module provides the `ConfigStore`, the single owner of the layered runtime
//! configuration. Three layers are merged in order, later layers winning:
//!
//! 1. **Defaults** built into the binary (`ConfigStore::defaults`).
//! 2. **File config**: the first `omega.json` found in the working directory, the
//!    project root, or the installation root.
//! 3. **Runtime overrides**: CLI parameters merged through `process_params`.
//!
//! Mappings are merged recursively, everything else (arrays included) is replaced.
use crate::{
    constants::{CONFIG_FILENAME, ENV_FILENAME},
    core::{
        arg_parser::ParsedParams,
        language,
        paths::{self, PathError, PathStatus},
    },
    models::DeployTarget,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

lazy_static! {
    // Block comments, or `//` line comments not preceded by `:` (keeps `http://`).
    // Best effort: a `//` inside a string literal elsewhere is still stripped.
    static ref COMMENT_RE: Regex =
        Regex::new(r"(?m)/\*[\s\S]*?\*/|([^:]|^)//.*$").expect("comment regex is valid");
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing JSON in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{path}' does not contain a JSON object.")]
    NotAnObject { path: String },
}

/// The resolved configuration plus the locations it was resolved from.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    values: Map<String, Value>,
    working_dir: PathBuf,
    project_root: Option<PathBuf>,
    install_root: PathBuf,
    conf_path: Option<PathBuf>,
}

impl ConfigStore {
    /// Builds the store for the current process: discovers the project root from
    /// the working directory, then loads the file layer and the language file.
    pub fn load() -> Result<Self, PathError> {
        let working_dir = paths::working_dir()?;
        let install_root = paths::install_root()?;
        let project_root = paths::resolve_project_root(&working_dir);
        Ok(Self::from_locations(working_dir, project_root, install_root))
    }

    /// Builds the store from explicit locations. Never fails: unreadable or
    /// invalid files are logged and skipped.
    pub fn from_locations(
        working_dir: PathBuf,
        project_root: Option<PathBuf>,
        install_root: PathBuf,
    ) -> Self {
        let mut store = Self {
            values: Self::defaults(),
            working_dir,
            project_root,
            install_root,
            conf_path: None,
        };
        store.load_layered_config();
        if let Some(messages) = language::load_language(&store.working_dir, &store.install_root)
        {
            store.values.insert("language".to_string(), Value::Object(messages));
        }
        store
    }

    /// The built-in default layer.
    pub fn defaults() -> Map<String, Value> {
        let defaults = json!({
            "envFileName": ENV_FILENAME,
            "backendDir": "backend/",
            "frontendDir": "frontend/",
            // S3 bucket prefix; the stage is appended when no exact name is set.
            "s3Bucket": "",
            "s3BucketName": "",
            "profile": "",
            "stage": "",
            "stageBackend": "",
            "stageFrontend": "",
            "deploy": {
                "back": "backend",
                "front": "frontend",
            },
            "language": {},
            "environment": {},
        });
        match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Finds and merges the file layer.
    ///
    /// The candidates are checked in order: working directory, project root,
    /// installation root. The first one that exists wins, even if it later fails
    /// to parse; candidates that exist but cannot be inspected are skipped.
    pub fn load_layered_config(&mut self) {
        let mut candidates = vec![self.working_dir.join(CONFIG_FILENAME)];
        if let Some(root) = &self.project_root {
            candidates.push(root.join(CONFIG_FILENAME));
        }
        candidates.push(self.install_root.join(CONFIG_FILENAME));

        let Some(conf_file) = candidates.into_iter().find(|candidate| match paths::probe(candidate) {
            PathStatus::Present => true,
            PathStatus::Missing => false,
            PathStatus::Inaccessible(e) => {
                log::warn!(
                    "Configuration file '{}' is not accessible ({}), skipping it...",
                    candidate.display(),
                    e
                );
                false
            }
        }) else {
            log::debug!("No '{}' found, using built-in defaults.", CONFIG_FILENAME);
            return;
        };

        match read_config_file(&conf_file) {
            Ok(file_layer) => {
                merge_config(&mut self.values, &file_layer);
                self.conf_path = Some(conf_file);
            }
            Err(e) => {
                log::warn!("Invalid or inaccessible configuration file, skipping it: {}", e);
            }
        }
    }

    /// Merges CLI parameters into the configuration.
    /// With an allow-list only those keys are merged; otherwise every named flag is.
    pub fn process_params(&mut self, params: &ParsedParams, allow_list: Option<&[&str]>) {
        let overlay: Map<String, Value> = match allow_list {
            Some(keys) => params
                .named()
                .iter()
                .filter(|(key, _)| keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            None => params.named().clone(),
        };
        if !overlay.is_empty() {
            log::debug!("Merging runtime parameters into config: {:?}", overlay);
            merge_config(&mut self.values, &overlay);
        }
    }

    // --- Accessors ---

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns a string setting, or `""` when it is absent or not a string.
    pub fn get_str(&self, key: &str) -> &str {
        self.values.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// The config file that was merged, if any.
    pub fn conf_path(&self) -> Option<&Path> {
        self.conf_path.as_deref()
    }

    pub fn backend_path(&self) -> Option<PathBuf> {
        self.project_root
            .as_ref()
            .map(|root| root.join(self.get_str("backendDir")))
    }

    pub fn frontend_path(&self) -> Option<PathBuf> {
        self.project_root
            .as_ref()
            .map(|root| root.join(self.get_str("frontendDir")))
    }

    /// The configured deploy targets, in key order. Malformed entries are skipped.
    pub fn deploy_targets(&self) -> Vec<(String, DeployTarget)> {
        let Some(Value::Object(targets)) = self.values.get("deploy") else {
            return Vec::new();
        };
        targets
            .iter()
            .filter_map(|(name, value)| {
                match serde_json::from_value::<DeployTarget>(value.clone()) {
                    Ok(target) => Some((name.clone(), target)),
                    Err(e) => {
                        log::warn!("Ignoring malformed deploy target '{}': {}", name, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// The free-form `environment` mapping that overrides the environment file.
    pub fn environment_overrides(&self) -> Map<String, Value> {
        match self.values.get("environment") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Lines of the localized help screen, if the language file provides them.
    pub fn language_lines(&self, key: &str) -> Vec<String> {
        self.values
            .get("language")
            .and_then(|lang| lang.get(key))
            .map(language::as_lines)
            .unwrap_or_default()
    }
}

/// Deep-merges `overlay` into `base` and returns `base`.
///
/// For every key of `overlay` holding a JSON object, the object is merged
/// recursively into `base[key]`, which is first set to `{}` when it is absent or
/// not an object. Any other value, arrays included, overwrites `base[key]`.
pub fn merge_config<'a>(
    base: &'a mut Map<String, Value>,
    overlay: &Map<String, Value>,
) -> &'a mut Map<String, Value> {
    for (key, value) in overlay {
        match value {
            Value::Object(nested) => {
                let slot = base
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(inner) = slot {
                    merge_config(inner, nested);
                }
            }
            other => {
                base.insert(key.clone(), other.clone());
            }
        }
    }
    base
}

/// Removes `//` and `/* */` comments. Not fool proof, see `COMMENT_RE`.
pub fn strip_comments(text: &str) -> Cow<'_, str> {
    COMMENT_RE.replace_all(text, "${1}")
}

/// Reads a JSON-with-comments file into a mapping.
pub fn read_config_file(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    let value: Value =
        serde_json::from_str(&strip_comments(&content)).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::NotAnObject {
            path: path.display().to_string(),
        }),
    }
}
