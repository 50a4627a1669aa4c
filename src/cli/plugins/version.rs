// src/cli/plugins/version.rs

use anyhow::Result;
use colored::*;

use super::Plugin;
use crate::core::{arg_parser::ParsedParams, sequencer::SequenceResult};

/// `omg --version`: prints the crate version. Its help screen is the version itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionPlugin;

impl VersionPlugin {
    pub fn version_line() -> String {
        format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    fn show(&self) -> SequenceResult {
        let line = Self::version_line();
        println!("{}", line.cyan());
        SequenceResult {
            success: true,
            output: vec![line],
            error: None,
        }
    }
}

impl Plugin for VersionPlugin {
    fn name(&self) -> &'static str {
        "version"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["show".to_string()]
    }

    fn invoke(&mut self, _command: &str, _params: &ParsedParams) -> Result<SequenceResult> {
        Ok(self.show())
    }

    fn help(&mut self) -> Result<SequenceResult> {
        Ok(self.show())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_prints_version() {
        let mut plugin = VersionPlugin;
        let result = plugin.help().unwrap();
        assert!(result.success);
        assert_eq!(result.first_output(), format!("omega v{}", env!("CARGO_PKG_VERSION")));
        assert!(plugin.is_capability("show"));
    }
}
