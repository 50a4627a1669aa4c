// src/system/executor.rs

use crate::models::StepOptions;
use colored::*;
use std::io::{self, Read, Write};
use std::process::{Command as StdCommand, Stdio};
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, #[source] io::Error),
    #[error("Working directory '{path}' for command '{command}' does not exist.")]
    WorkingDir { command: String, path: String },
    #[error("Command '{command}' exited with a non-zero error code ({}).{}", .code.map_or("signal".to_string(), |c| c.to_string()), stderr_suffix(.stderr))]
    NonZeroExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Command '{command}' wrote to stderr:\n{stderr}")]
    StderrOutput { command: String, stderr: String },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr.trim_end())
    }
}

/// Executes a single external command and hands back what it printed.
///
/// Implementations must not return before the child has exited: the sequencer
/// relies on this to keep steps strictly ordered.
pub trait ProcessRunner: std::fmt::Debug {
    fn run(&self, command_line: &str, options: &StepOptions) -> Result<String, ExecutionError>;
}

/// Runs commands through the platform shell (`sh -c`, or `cmd /C` on Windows).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ShellRunner {
    fn shell_command(command_line: &str) -> StdCommand {
        if cfg!(target_os = "windows") {
            let mut command = StdCommand::new("cmd");
            command.arg("/C").arg(command_line);
            command
        } else {
            let mut command = StdCommand::new("sh");
            command.arg("-c").arg(command_line);
            command
        }
    }
}

impl ProcessRunner for ShellRunner {
    /// Runs `command_line` to completion.
    ///
    /// Stdout is always captured; with `show_output` it is also streamed to the
    /// console as it arrives. The command fails on a non-zero exit status and,
    /// unless `fail_on_stderr` is off, when it wrote anything to stderr.
    fn run(&self, command_line: &str, options: &StepOptions) -> Result<String, ExecutionError> {
        let trimmed_command = command_line.trim();
        if trimmed_command.is_empty() {
            return Ok(String::new()); // An empty command is a success, not an error.
        }

        if options.show_command {
            println!("{} {}", "#".blue(), trimmed_command.green());
        }

        let mut command = Self::shell_command(trimmed_command);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(cwd) = &options.cwd {
            if !cwd.is_dir() {
                return Err(ExecutionError::WorkingDir {
                    command: trimmed_command.to_string(),
                    path: cwd.display().to_string(),
                });
            }
            command.current_dir(dunce::simplified(cwd));
        }

        log::debug!("Spawning '{}' (cwd: {:?})", trimmed_command, options.cwd);
        let mut child = command
            .spawn()
            .map_err(|e| ExecutionError::CommandFailed(trimmed_command.to_string(), e))?;

        // Stderr is drained on its own thread so a chatty child cannot block on a
        // full pipe while we are reading stdout.
        let stderr_handle = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let mut captured = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            let mut chunk = [0u8; 4096];
            loop {
                let read = stdout
                    .read(&mut chunk)
                    .map_err(|e| ExecutionError::CommandFailed(trimmed_command.to_string(), e))?;
                let Some(bytes) = chunk.get(..read).filter(|b| !b.is_empty()) else {
                    break;
                };
                if options.show_output {
                    let mut console = io::stdout().lock();
                    // Echo failures must not abort the capture.
                    let _ = console.write_all(bytes).and_then(|_| console.flush());
                }
                captured.extend_from_slice(bytes);
            }
        }

        let status = child
            .wait()
            .map_err(|e| ExecutionError::CommandFailed(trimmed_command.to_string(), e))?;

        let stderr_bytes = match stderr_handle {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Ok(Vec::new()))
                .map_err(|e| ExecutionError::CommandFailed(trimmed_command.to_string(), e))?,
            None => Vec::new(),
        };
        let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

        if !status.success() {
            return Err(ExecutionError::NonZeroExitStatus {
                command: trimmed_command.to_string(),
                code: status.code(),
                stderr,
            });
        }
        if options.fail_on_stderr && !stderr.trim().is_empty() {
            return Err(ExecutionError::StderrOutput {
                command: trimmed_command.to_string(),
                stderr,
            });
        }

        String::from_utf8(captured).map_err(|e| ExecutionError::InvalidUtf8Output {
            command: trimmed_command.to_string(),
            source: e,
        })
    }
}

/// Quotes a value for interpolation into a shell command line.
pub fn quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| value.replace('\0', ""))
}
