// src/core/environment.rs

use crate::{
    constants::ENV_FILE_PREAMBLE,
    core::config_loader::{ConfigStore, merge_config},
    models::ExtractedDeployInfo,
};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("no project root path located")]
    NoProjectRoot,
    #[error("invalid or inaccessible environment path '{0}'")]
    NotWritable(String),
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' does not contain a JSON object")]
    NoObject { path: String },
    #[error("invalid JSON in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not serialize the environment: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Per-stage deployment values (`baseUrl`, `apiKey`, ...) persisted in `env.js`
/// at the project root, so the frontend build can import them.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentStore {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl EnvironmentStore {
    /// Loads the environment file of the configured project and merges the
    /// config `environment` overrides on top. Never fails: a missing or broken
    /// file leaves the environment empty.
    pub fn load(config: &ConfigStore) -> Self {
        let path = config
            .project_root()
            .map(|root| root.join(config.get_str("envFileName")));

        let mut store = Self {
            path,
            values: Map::new(),
        };
        let Some(path) = store.path.clone() else {
            log::debug!("No project root, environment left empty.");
            return store;
        };
        if !path.exists() {
            log::debug!("No environment file at '{}'.", path.display());
            return store;
        }

        match read_environment_file(&path) {
            Ok(values) => {
                store.values = values;
                merge_config(&mut store.values, &config.environment_overrides());
                log::info!("Successfully processed environment vars from {}", path.display());
            }
            Err(e) => {
                log::warn!("Invalid or inaccessible environment file, skipping it: {}", e);
            }
        }
        store
    }

    /// Serializes the whole environment as `module.exports = {...}`, overwriting
    /// the file.
    pub fn save(&self) -> Result<PathBuf, EnvironmentError> {
        let path = self.path.as_ref().ok_or(EnvironmentError::NoProjectRoot)?;
        let dir = path.parent().unwrap_or(Path::new("."));

        let writable = fs::metadata(dir)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(EnvironmentError::NotWritable(dir.display().to_string()));
        }

        let body = format!("{}{}", ENV_FILE_PREAMBLE, serde_json::to_string(&self.values)?);
        fs::write(path, body).map_err(|e| EnvironmentError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        log::info!("Environment vars saved to {}", path.display());
        Ok(path.clone())
    }

    /// Stores the scraped deploy values under `env_name`, creating the entry if
    /// needed and keeping any other keys it already has.
    pub fn record_deploy(&mut self, env_name: &str, info: &ExtractedDeployInfo) {
        let entry = self
            .values
            .entry(env_name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(record) = entry {
            record.insert("baseUrl".to_string(), Value::String(info.base_url.clone()));
            record.insert(
                "apiKey".to_string(),
                Value::String(info.api_keys.first().cloned().unwrap_or_default()),
            );
        }
    }

    pub fn get(&self, env_name: &str) -> Option<&Map<String, Value>> {
        self.values.get(env_name).and_then(Value::as_object)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Reads an environment file, skipping everything before the first `{`
/// (e.g. `module.exports = `).
pub fn read_environment_file(path: &Path) -> Result<Map<String, Value>, EnvironmentError> {
    let content = fs::read_to_string(path).map_err(|e| EnvironmentError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    let json = content
        .find('{')
        .and_then(|start| content.get(start..))
        .ok_or_else(|| EnvironmentError::NoObject {
            path: path.display().to_string(),
        })?;
    match serde_json::from_str(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EnvironmentError::NoObject {
            path: path.display().to_string(),
        }),
        Err(e) => Err(EnvironmentError::Parse {
            path: path.display().to_string(),
            source: e,
        }),
    }
}
