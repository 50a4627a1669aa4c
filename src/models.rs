// src/models.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::arg_parser::ParsedParams;

// --- DISPATCH MODELS ---

/// A fully parsed CLI invocation, ready to be validated against the plugin registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub plugin_name: String,
    pub command_name: Option<String>,
    /// The argument vector as entered, without the binary name.
    pub raw_args: Vec<String>,
    pub params: ParsedParams,
}

// --- SEQUENCE MODELS ---

/// One entry of an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceStep {
    /// A capability of the plugin that owns the sequence (e.g. `backend`).
    SubCommand(String),
    /// An opaque command line handed to the platform shell.
    External(String),
}

impl SequenceStep {
    pub fn label(&self) -> &str {
        match self {
            Self::SubCommand(name) => name,
            Self::External(command_line) => command_line,
        }
    }
}

/// Controls what is echoed to the console while a command runs.
/// Capturing stdout happens regardless of these flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOptions {
    /// Print `# <command>` before running it.
    pub show_command: bool,
    /// Stream the child's stdout to the console as it arrives.
    pub show_output: bool,
    /// Working directory of the child. `None` inherits ours.
    pub cwd: Option<PathBuf>,
    /// Treat anything written to stderr as a failure, even with a zero exit status.
    pub fail_on_stderr: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            show_command: true,
            show_output: true,
            cwd: None,
            fail_on_stderr: true,
        }
    }
}

impl StepOptions {
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    pub fn quiet(mut self) -> Self {
        self.show_command = false;
        self.show_output = false;
        self
    }

    /// For tools that report progress on stderr (`git push`, `npm`).
    pub fn allow_stderr(mut self) -> Self {
        self.fail_on_stderr = false;
        self
    }
}

// --- DEPLOY MODELS ---

/// Deployment metadata scraped from the backend tool's console report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDeployInfo {
    pub base_url: String,
    pub api_keys: Vec<String>,
    pub endpoints: Vec<String>,
}

/// The value of a `deploy` target in `omega.json`: one step or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeployTarget {
    Single(String),
    Sequence(Vec<String>),
}

impl DeployTarget {
    pub fn steps(&self) -> Vec<String> {
        match self {
            Self::Single(step) => vec![step.clone()],
            Self::Sequence(steps) => steps.clone(),
        }
    }
}
