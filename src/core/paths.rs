// src/core/paths.rs

use crate::constants::{OMEGA_DIR, OMEGA_HOME_ENV, PROJECT_TEMPLATES_DIR, TEMPLATES_DIR};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not determine the current working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
    #[error("Failed to expand path '{path}': {message}")]
    Expansion { path: String, message: String },
}

/// Result of probing a path, separating "not there" from "there but unusable".
#[derive(Debug)]
pub enum PathStatus {
    Missing,
    Present,
    Inaccessible(std::io::Error),
}

/// Checks whether `path` exists without reading it.
pub fn probe(path: &Path) -> PathStatus {
    match fs::metadata(path) {
        Ok(_) => PathStatus::Present,
        Err(e) if e.kind() == ErrorKind::NotFound => PathStatus::Missing,
        Err(e) => PathStatus::Inaccessible(e),
    }
}

/// Returns the current working directory, simplified for display.
pub fn working_dir() -> Result<PathBuf, PathError> {
    std::env::current_dir()
        .map(|p| dunce::simplified(&p).to_path_buf())
        .map_err(PathError::WorkingDir)
}

/// Returns the installation root: `$OMEGA_HOME` if set, else `~/.config/omega`.
/// It holds the fallback `omega.json`, `language.json` and the project templates.
pub fn install_root() -> Result<PathBuf, PathError> {
    if let Some(home) = std::env::var_os(OMEGA_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::config_dir()
        .map(|dir| dir.join("omega"))
        .ok_or(PathError::ConfigDirNotFound)
}

/// Directory holding the project templates used by `omg project create`.
pub fn project_templates_dir(install_root: &Path) -> PathBuf {
    install_root.join(TEMPLATES_DIR).join(PROJECT_TEMPLATES_DIR)
}

/// Checks whether the given path is a project root (must contain `.omega/`).
pub fn is_project_root(path: &Path) -> bool {
    path.join(OMEGA_DIR).is_dir()
}

/// Searches for the project root starting at `start` and walking up to `/`.
///
/// Returns the first directory (including `start` itself) that contains the
/// marker directory, or `None` once the filesystem root has been checked.
/// Each iteration strictly shortens the path, so the search visits at most
/// one candidate per path component.
pub fn resolve_project_root(start: &Path) -> Option<PathBuf> {
    let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    let mut candidate = start.as_path();
    loop {
        log::trace!("Checking for project root at '{}'", candidate.display());
        if is_project_root(candidate) {
            return Some(candidate.to_path_buf());
        }
        match candidate.parent() {
            Some(parent) if parent != candidate => candidate = parent,
            _ => return None,
        }
    }
}

/// Expands `~` and environment variables in a user-supplied path and makes it
/// absolute relative to `base`.
pub fn expand_user_path(raw: &str, base: &Path) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(raw).map_err(|e| PathError::Expansion {
        path: raw.to_string(),
        message: e.to_string(),
    })?;
    let path = PathBuf::from(expanded.into_owned());
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(base.join(path))
    }
}
