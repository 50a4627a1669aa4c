// src/core/sequencer.rs

use crate::{
    constants::MAX_SEQUENCE_DEPTH,
    models::{SequenceStep, StepOptions},
    system::executor::ExecutionError,
};
use colored::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Step '{step}' failed: {source}")]
    External {
        step: String,
        #[source]
        source: ExecutionError,
    },
    #[error("Command '{step}' failed: {source}")]
    SubCommand {
        step: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Command '{step}' did not complete: {source}")]
    Nested {
        step: String,
        #[source]
        source: Box<SequenceError>,
    },
    #[error("Maximum nesting depth ({depth}) exceeded while running '{step}'.")]
    MaxDepth { depth: u32, step: String },
}

impl SequenceError {
    /// Unwraps nested failures down to the error raised by a sub-command, so a
    /// caller can keep a fatal error raised deeper in the chain.
    pub fn into_sub_command_error(self) -> Result<anyhow::Error, Self> {
        match self {
            Self::SubCommand { source, .. } => Ok(source),
            Self::Nested { source, .. } => source.into_sub_command_error(),
            other => Err(other),
        }
    }
}

/// The outcome of an ordered sequence.
///
/// `success` is true only when every step completed. After a failure `output`
/// holds the stdout of the completed steps only and `error` the cause.
#[derive(Debug, Default)]
pub struct SequenceResult {
    pub success: bool,
    pub output: Vec<String>,
    pub error: Option<SequenceError>,
}

impl SequenceResult {
    /// A successful result with no captured output, for commands that do not
    /// run processes.
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// The output of the first step, or `""`.
    pub fn first_output(&self) -> &str {
        self.output.first().map(String::as_str).unwrap_or("")
    }
}

/// The context a sequence runs in, usually the plugin that owns it.
pub trait StepHost {
    /// Whether `name` is a capability of the host, i.e. a sub-command step.
    fn is_step_command(&self, name: &str) -> bool;

    /// Runs a capability. `depth` is the nesting level the capability runs at
    /// and must be passed on to any sequence it starts.
    fn run_step_command(&mut self, name: &str, depth: u32) -> anyhow::Result<SequenceResult>;

    /// Runs a literal command line to completion and returns its stdout.
    fn run_external(
        &mut self,
        command_line: &str,
        options: &StepOptions,
    ) -> Result<String, ExecutionError>;
}

/// Classifies a raw step against the host's capabilities.
pub fn classify_step<H: StepHost + ?Sized>(step: &str, host: &H) -> SequenceStep {
    if host.is_step_command(step) {
        SequenceStep::SubCommand(step.to_string())
    } else {
        SequenceStep::External(step.to_string())
    }
}

/// Runs `steps` strictly in order, stopping at the first failure.
///
/// Each step is either a capability of `host` (run as a sub-command, which may
/// start its own nested sequence) or a command line run through the host's
/// process runner with `options`. A step only starts after the previous one has
/// fully finished.
pub fn run_sequence<H: StepHost + ?Sized>(
    steps: &[String],
    host: &mut H,
    options: &StepOptions,
    depth: u32,
) -> SequenceResult {
    let mut result = SequenceResult::default();

    if depth > MAX_SEQUENCE_DEPTH {
        result.error = Some(SequenceError::MaxDepth {
            depth: MAX_SEQUENCE_DEPTH,
            step: steps.join(", "),
        });
        return result;
    }

    for (i, raw_step) in steps.iter().enumerate() {
        let step = classify_step(raw_step, host);
        log::debug!("Sequence step {}/{}: {:?}", i + 1, steps.len(), step);

        let outcome = match &step {
            SequenceStep::SubCommand(name) => match host.run_step_command(name, depth + 1) {
                Ok(nested) if nested.success => Ok(nested.output.join("\n")),
                Ok(nested) => Err(match nested.error {
                    Some(source) => SequenceError::Nested {
                        step: name.clone(),
                        source: Box::new(source),
                    },
                    None => SequenceError::SubCommand {
                        step: name.clone(),
                        source: anyhow::anyhow!("command reported failure without a cause"),
                    },
                }),
                Err(source) => Err(SequenceError::SubCommand {
                    step: name.clone(),
                    source,
                }),
            },
            SequenceStep::External(command_line) => host
                .run_external(command_line, options)
                .map_err(|source| SequenceError::External {
                    step: command_line.clone(),
                    source,
                }),
        };

        match outcome {
            Ok(stdout) => result.output.push(stdout),
            Err(e) => {
                log::debug!(
                    "Step '{}' failed; skipping {} remaining step(s).",
                    step.label(),
                    steps.len() - i - 1
                );
                if log::log_enabled!(log::Level::Trace) {
                    log::trace!("{}", format!("Failure: {}", e).red());
                }
                result.error = Some(e);
                return result;
            }
        }
    }

    result.success = true;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::executor::{ProcessRunner, test_support::RecordingRunner};
    use anyhow::anyhow;
    use std::collections::HashMap;

    /// A host with named sub-commands that expand to nested sequences.
    struct TestHost {
        runner: RecordingRunner,
        commands: HashMap<String, Vec<String>>,
        invoked: Vec<String>,
    }

    impl TestHost {
        fn new(runner: RecordingRunner) -> Self {
            Self {
                runner,
                commands: HashMap::new(),
                invoked: Vec::new(),
            }
        }

        fn with_command(mut self, name: &str, steps: &[&str]) -> Self {
            self.commands.insert(
                name.to_string(),
                steps.iter().map(|s| s.to_string()).collect(),
            );
            self
        }
    }

    impl StepHost for TestHost {
        fn is_step_command(&self, name: &str) -> bool {
            name == "explode" || self.commands.contains_key(name)
        }

        fn run_step_command(&mut self, name: &str, depth: u32) -> anyhow::Result<SequenceResult> {
            self.invoked.push(name.to_string());
            if name == "explode" {
                return Err(anyhow!("sub-command exploded"));
            }
            let steps = self.commands.get(name).cloned().unwrap_or_default();
            Ok(run_sequence(&steps, self, &StepOptions::default().quiet(), depth))
        }

        fn run_external(
            &mut self,
            command_line: &str,
            options: &StepOptions,
        ) -> Result<String, ExecutionError> {
            self.runner.run(command_line, options)
        }
    }

    fn steps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_steps_succeed_in_order() {
        let runner = RecordingRunner::new();
        let mut host = TestHost::new(runner.clone());

        let result = run_sequence(&steps(&["echo a", "echo b"]), &mut host, &StepOptions::default(), 0);

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.output, vec!["ran: echo a", "ran: echo b"]);
        assert_eq!(runner.commands(), vec!["echo a", "echo b"]);
    }

    #[test]
    fn test_failure_short_circuits_remaining_steps() {
        let runner = RecordingRunner::new().failing_on("step-b");
        let mut host = TestHost::new(runner.clone());

        let result = run_sequence(&steps(&["step-a", "step-b", "step-c"]), &mut host, &StepOptions::default(), 0);

        assert!(!result.success);
        assert_eq!(result.output, vec!["ran: step-a"]);
        assert!(matches!(result.error, Some(SequenceError::External { ref step, .. }) if step == "step-b"));
        // step-c was never started.
        assert_eq!(runner.commands(), vec!["step-a", "step-b"]);
    }

    #[test]
    fn test_failing_sub_command_stops_sequence() {
        let runner = RecordingRunner::new();
        let mut host = TestHost::new(runner.clone());

        let result = run_sequence(&steps(&["echo first", "explode", "echo never"]), &mut host, &StepOptions::default(), 0);

        assert!(!result.success);
        assert_eq!(result.output.len(), 1);
        assert_eq!(host.invoked, vec!["explode"]);
        assert_eq!(runner.commands(), vec!["echo first"]);
        let source = result.error.unwrap().into_sub_command_error().unwrap();
        assert_eq!(source.to_string(), "sub-command exploded");
    }

    #[test]
    fn test_sub_command_runs_nested_sequence() {
        let runner = RecordingRunner::new().with_output("build", "built!");
        let mut host = TestHost::new(runner.clone()).with_command("backend", &["npm run build", "sls deploy"]);

        let result = run_sequence(&steps(&["backend", "echo done"]), &mut host, &StepOptions::default(), 0);

        assert!(result.success);
        assert_eq!(result.output, vec!["built!\nran: sls deploy", "ran: echo done"]);
        assert_eq!(runner.commands(), vec!["npm run build", "sls deploy", "echo done"]);
    }

    #[test]
    fn test_nested_failure_is_wrapped() {
        let runner = RecordingRunner::new().failing_on("sls deploy");
        let mut host = TestHost::new(runner.clone()).with_command("backend", &["sls deploy", "echo after"]);

        let result = run_sequence(&steps(&["backend", "frontend-cmd"]), &mut host, &StepOptions::default(), 0);

        assert!(!result.success);
        assert!(result.output.is_empty());
        assert!(matches!(result.error, Some(SequenceError::Nested { ref step, .. }) if step == "backend"));
        assert_eq!(runner.commands(), vec!["sls deploy"]);
    }

    #[test]
    fn test_self_referencing_command_hits_depth_limit() {
        let runner = RecordingRunner::new();
        let mut host = TestHost::new(runner.clone()).with_command("loop", &["loop"]);

        let result = run_sequence(&steps(&["loop"]), &mut host, &StepOptions::default(), 0);

        assert!(!result.success);
        assert_eq!(host.invoked.len() as u32, MAX_SEQUENCE_DEPTH + 1);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_options_are_forwarded_to_runner() {
        let runner = RecordingRunner::new();
        let mut host = TestHost::new(runner.clone());
        let options = StepOptions::in_dir("/srv/app/frontend");

        run_sequence(&steps(&["au build"]), &mut host, &options, 0);

        assert_eq!(runner.calls()[0].1, options);
    }
}
