use clap::Parser;
use colored::*;
use thiserror::Error;

use crate::core::{
    config_loader::ConfigStore,
    sequencer::{SequenceError, SequenceResult},
};

pub mod dispatcher;
pub mod plugins;

/// omg: scaffolds and deploys multi-tier (backend/frontend) projects.
///
/// The grammar is flexible: `omg <plugin> <command>` and `omg <command> <plugin>`
/// are both accepted. See `dispatcher` for the exact resolution rules.
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
// The dispatcher owns `--version`/`-v` and the help screen.
#[command(disable_help_subcommand = true, disable_version_flag = true, disable_help_flag = true)]
pub struct Cli {
    /// The raw argument vector, interpreted by the dispatcher.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Stable exit codes, partitioned by subsystem.
pub mod codes {
    pub const INVALID_PLUGIN: i32 = 10;
    pub const INVALID_COMMAND: i32 = 11;
    pub const NO_HELP: i32 = 12;

    pub const INSTALL_UNKNOWN_TARGET: i32 = 201;
    pub const INSTALL_BACKEND_FAILED: i32 = 202;
    pub const INSTALL_FRONTEND_FAILED: i32 = 203;
    pub const PROJECT_CREATE_FAILED: i32 = 204;
    pub const PROJECT_PUSH_FAILED: i32 = 205;

    pub const DEPLOY_FAILED: i32 = 300;
    pub const DEPLOY_NO_PROJECT_ROOT: i32 = 301;
    pub const DEPLOY_BACKEND_FAILED: i32 = 302;
    pub const DEPLOY_FRONTEND_FAILED: i32 = 303;
}

/// A user-facing error that terminates the process with `code` as exit status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ERROR: #{code} - {message}")]
pub struct FatalError {
    pub code: i32,
    pub message: String,
}

impl FatalError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Converts a failed sequence into the error its caller should raise.
///
/// A fatal error raised by a nested command keeps its own code; any other
/// cause is printed and replaced by a fatal error with `code`.
pub fn sequence_failure(result: SequenceResult, code: i32, message: &str) -> anyhow::Error {
    match result.error.map(SequenceError::into_sub_command_error) {
        Some(Ok(inner)) if inner.is::<FatalError>() => inner,
        Some(Ok(inner)) => {
            println!("{}", format!("{:#}", inner).red());
            FatalError::new(code, message).into()
        }
        Some(Err(e)) => {
            println!("{}", e.to_string().red());
            FatalError::new(code, message).into()
        }
        None => FatalError::new(code, message).into(),
    }
}

const DEFAULT_HELP: &[&str] = &[
    "omg project create -t=template_name project_folder/",
    "omg project install [backend|frontend]",
    "omg project push -m=\"commit message\" [-b=branch]",
    "",
    "omg deploy target [stage]",
    "omg deploy back",
    "omg deploy frontend dev",
    "omg deploy all prod",
];

/// Prints the help screen, preferring the `help` entry of the language file.
pub fn print_help(config: &ConfigStore) {
    let localized = config.language_lines("help");
    let lines: Vec<&str> = if localized.is_empty() {
        DEFAULT_HELP.to_vec()
    } else {
        localized.iter().map(String::as_str).collect()
    };

    println!("\n\n{}\n", "HELP:".yellow().bold());
    for line in lines {
        println!("{}", line.cyan());
    }
    println!("\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::executor::ExecutionError;
    use anyhow::anyhow;

    #[test]
    fn test_cli_captures_flags_as_raw_args() {
        let cli = Cli::parse_from(["omg", "--version"]);
        assert_eq!(cli.args, vec!["--version"]);

        let cli = Cli::parse_from(["omg", "deploy", "backend", "--stage=prod"]);
        assert_eq!(cli.args, vec!["deploy", "backend", "--stage=prod"]);
    }

    #[test]
    fn test_fatal_error_display() {
        let e = FatalError::new(10, "Invalid command/plugin to execute!");
        assert_eq!(e.to_string(), "ERROR: #10 - Invalid command/plugin to execute!");
    }

    #[test]
    fn test_sequence_failure_keeps_nested_fatal_code() {
        let result = SequenceResult {
            success: false,
            output: vec![],
            error: Some(SequenceError::SubCommand {
                step: "backend".to_string(),
                source: FatalError::new(codes::DEPLOY_BACKEND_FAILED, "BACKEND: Deployment failed!").into(),
            }),
        };
        let err = sequence_failure(result, codes::DEPLOY_FAILED, "Deployment sequence failed");
        assert_eq!(err.downcast_ref::<FatalError>().unwrap().code, 302);
    }

    #[test]
    fn test_sequence_failure_wraps_other_causes() {
        let result = SequenceResult {
            success: false,
            output: vec!["ok".to_string()],
            error: Some(SequenceError::External {
                step: "npm install".to_string(),
                source: ExecutionError::StderrOutput {
                    command: "npm install".to_string(),
                    stderr: "npm ERR!".to_string(),
                },
            }),
        };
        let err = sequence_failure(result, codes::INSTALL_BACKEND_FAILED, "install failed");
        assert_eq!(err.downcast_ref::<FatalError>().unwrap().code, 202);

        let result = SequenceResult {
            success: false,
            output: vec![],
            error: Some(SequenceError::SubCommand {
                step: "x".to_string(),
                source: anyhow!("plain failure"),
            }),
        };
        let err = sequence_failure(result, codes::DEPLOY_FAILED, "failed");
        assert_eq!(err.downcast_ref::<FatalError>().unwrap().code, 300);
    }
}
