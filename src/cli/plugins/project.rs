// src/cli/plugins/project.rs

use anyhow::{Context, Result, anyhow};
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use std::{
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};
use walkdir::WalkDir;

use super::{Plugin, PluginContext};
use crate::{
    cli::{FatalError, codes, sequence_failure},
    constants::OMEGA_DIR,
    core::{
        arg_parser::{AliasRules, ParsedParams},
        config_loader::ConfigStore,
        paths,
        sequencer::{self, SequenceResult, StepHost},
    },
    models::StepOptions,
    system::executor::{self, ExecutionError, ProcessRunner},
};

/// Long-option aliases of the project plugin.
const PROJECT_ALIASES: AliasRules = &[
    (
        "template",
        &["t", "fromtemplate", "from-template", "templatefrom", "template-from"],
    ),
    (
        "templatePath",
        &[
            "templatepath",
            "template-path",
            "template-dir",
            "templatedir",
            "template-folder",
            "templatefolder",
        ],
    ),
    (
        "projectPath",
        &[
            "projectpath",
            "project-path",
            "project-dir",
            "projectdir",
            "project-folder",
            "projectfolder",
        ],
    ),
    ("message", &["m"]),
    ("branch", &["b"]),
];

const COMMANDS: &[&str] = &["create", "install", "push"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Backend,
    Frontend,
}

impl Tier {
    fn label(self) -> &'static str {
        match self {
            Self::Backend => "BACKEND",
            Self::Frontend => "FRONTEND",
        }
    }

    fn failure_code(self) -> i32 {
        match self {
            Self::Backend => codes::INSTALL_BACKEND_FAILED,
            Self::Frontend => codes::INSTALL_FRONTEND_FAILED,
        }
    }
}

/// `omg project <create|install|push>`: scaffolds a project from a template and
/// manages its dependencies and repository.
#[derive(Debug)]
pub struct ProjectPlugin {
    config: ConfigStore,
    params: ParsedParams,
    runner: Rc<dyn ProcessRunner>,
    interactive: bool,
}

impl ProjectPlugin {
    pub fn new(ctx: PluginContext) -> Self {
        let params = ParsedParams::parse(&ctx.raw_args, PROJECT_ALIASES);
        Self {
            config: ctx.config,
            params,
            runner: ctx.runner,
            interactive: ctx.interactive,
        }
    }

    fn run_command(&mut self, command: &str, _depth: u32) -> Result<SequenceResult> {
        match command {
            "create" => self.create(),
            "install" => self.install(),
            "push" => self.push(),
            other => Err(FatalError::new(
                codes::INVALID_COMMAND,
                format!("Method/command not part of the plugin (plugin name: project): {}", other),
            )
            .into()),
        }
    }

    // --- create ---

    fn create(&mut self) -> Result<SequenceResult> {
        println!("Current working dir = {}", self.config.working_dir().display());

        let template_path = self.template_path()?;
        let project_path = self.project_path()?;
        let (Some(template_path), Some(project_path)) = (template_path, project_path) else {
            return Err(FatalError::new(
                codes::PROJECT_CREATE_FAILED,
                "Can NOT create a new project - invalid parameters. Please make sure you properly specify template and project path!",
            )
            .into());
        };

        if is_non_empty_dir(&project_path) {
            return Err(FatalError::new(
                codes::PROJECT_CREATE_FAILED,
                format!(
                    "Can NOT create a new project - '{}' already exists and is not empty.",
                    project_path.display()
                ),
            )
            .into());
        }

        println!("{}", "Setting up your new project.".bold());
        let copied = copy_template(&template_path, &project_path).map_err(|e| {
            println!("{}", format!("{:#}", e).red());
            FatalError::new(codes::PROJECT_CREATE_FAILED, "Can NOT create a new project - copying the template failed.")
        })?;
        log::info!(
            "Copied {} file(s) from '{}' to '{}'",
            copied,
            template_path.display(),
            project_path.display()
        );

        println!("{}", "Success - project created!".green().bold());
        Ok(SequenceResult {
            success: true,
            output: vec![project_path.display().to_string()],
            error: None,
        })
    }

    /// `--templatePath`, else `--template` looked up in the installed templates,
    /// else asked for. Prints why and returns `None` when it is not a directory.
    fn template_path(&self) -> Result<Option<PathBuf>> {
        let templates_dir = paths::project_templates_dir(self.config.install_root());

        let candidate = if let Some(explicit) = self.params.get_str("templatePath") {
            Some(paths::expand_user_path(explicit, self.config.working_dir())?)
        } else if let Some(name) = self.params.get_str("template") {
            Some(templates_dir.join(name))
        } else if self.interactive {
            let name: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Template name (from {})", templates_dir.display()))
                .interact_text()?;
            Some(templates_dir.join(name.trim())).filter(|_| !name.trim().is_empty())
        } else {
            None
        };

        match candidate {
            Some(path) if path.is_dir() => Ok(Some(path)),
            Some(path) => {
                println!("{} '{}'", "ERROR: Invalid template".red(), path.display());
                Ok(None)
            }
            None => {
                println!("{}", "ERROR: no template found".red());
                Ok(None)
            }
        }
    }

    /// `--projectPath`, else the third positional, else asked for.
    fn project_path(&self) -> Result<Option<PathBuf>> {
        let raw = match self
            .params
            .get_str("projectPath")
            .or_else(|| self.params.positional(2))
        {
            Some(raw) => raw.to_string(),
            None if self.interactive => Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Project folder")
                .interact_text()?,
            None => return Ok(None),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(paths::expand_user_path(raw.trim(), self.config.working_dir())?))
    }

    // --- install ---

    fn install(&mut self) -> Result<SequenceResult> {
        let target = self.params.positional(2).map(str::to_string);
        match target.as_deref() {
            None => {
                let mut result = self.install_tier(Tier::Frontend)?;
                let backend = self.install_tier(Tier::Backend)?;
                result.output.extend(backend.output);
                Ok(result)
            }
            Some("backend") => self.install_tier(Tier::Backend),
            Some("frontend") => self.install_tier(Tier::Frontend),
            Some(other) => Err(FatalError::new(
                codes::INSTALL_UNKNOWN_TARGET,
                format!("Can NOT identify target to install dependencies for: {}", other),
            )
            .into()),
        }
    }

    fn install_tier(&mut self, tier: Tier) -> Result<SequenceResult> {
        let failed = format!("{}: Installing project dependencies FAILED!", tier.label());
        println!("\n{}\n", format!("{}: Project dependencies - install started", tier.label()).bold());

        let dir = match tier {
            Tier::Backend => self.config.backend_path(),
            Tier::Frontend => self.config.frontend_path(),
        };
        let Some(dir) = dir else {
            println!("Can NOT locate the project root path. Please make sure you are within a project folder.");
            return Err(FatalError::new(tier.failure_code(), failed).into());
        };

        // npm reports warnings and progress on stderr.
        let options = StepOptions::in_dir(dir).allow_stderr();
        let result = sequencer::run_sequence(&["npm install".to_string()], self, &options, 0);
        if !result.success {
            return Err(sequence_failure(result, tier.failure_code(), &failed));
        }

        println!(
            "\n{}\n",
            format!("{}: Project dependencies installed successfully!", tier.label())
                .green()
                .bold()
        );
        Ok(result)
    }

    // --- push ---

    fn push(&mut self) -> Result<SequenceResult> {
        let Some(root) = self.config.project_root().map(Path::to_path_buf) else {
            return Err(FatalError::new(
                codes::PROJECT_PUSH_FAILED,
                "Can NOT locate the project root path. Please make sure you are within a project folder.",
            )
            .into());
        };

        let message = match self.params.get_str("message") {
            Some(message) => message.to_string(),
            None if self.interactive => Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Commit message")
                .interact_text()?,
            None => String::new(),
        };
        if message.trim().is_empty() {
            return Err(FatalError::new(
                codes::PROJECT_PUSH_FAILED,
                "A commit message is required (--message=\"...\").",
            )
            .into());
        }

        let branch = match self.params.get_str("branch") {
            Some(branch) => branch.to_string(),
            None => self.current_branch(&root).map_err(|e| {
                println!("{}", format!("{:#}", e).red());
                FatalError::new(codes::PROJECT_PUSH_FAILED, "Can NOT determine the current branch.")
            })?,
        };
        log::debug!("Pushing to branch '{}' from '{}'", branch, root.display());

        let steps = vec![
            "git add -u".to_string(),
            format!("git commit -m {}", executor::quote(message.trim())),
            format!("git push origin {}", executor::quote(&branch)),
        ];
        // git writes its progress report to stderr.
        let options = StepOptions::in_dir(&root).allow_stderr();
        let result = sequencer::run_sequence(&steps, self, &options, 0);
        if !result.success {
            return Err(sequence_failure(result, codes::PROJECT_PUSH_FAILED, "Pushing the project FAILED!"));
        }

        println!("\n{}\n", format!("Project pushed to '{}'.", branch).green().bold());
        Ok(result)
    }

    fn current_branch(&self, root: &Path) -> Result<String> {
        let output = self
            .runner
            .run("git rev-parse --abbrev-ref HEAD", &StepOptions::in_dir(root).quiet())
            .context("Failed to query the current git branch")?;
        let branch = output.trim();
        if branch.is_empty() || branch == "HEAD" {
            return Err(anyhow!("Not on a branch (detached HEAD?)"));
        }
        Ok(branch.to_string())
    }
}

fn is_non_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Recursively copies `template` into `target` and makes sure the result is
/// recognized as a project root. Returns the number of files copied.
fn copy_template(template: &Path, target: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(template) {
        let entry = entry.with_context(|| format!("Failed to read template '{}'", template.display()))?;
        let relative = entry
            .path()
            .strip_prefix(template)
            .with_context(|| format!("'{}' is outside the template", entry.path().display()))?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .with_context(|| format!("Failed to create '{}'", destination.display()))?;
        } else {
            fs::copy(entry.path(), &destination).with_context(|| {
                format!(
                    "Failed to copy '{}' to '{}'",
                    entry.path().display(),
                    destination.display()
                )
            })?;
            copied += 1;
        }
    }

    let marker = target.join(OMEGA_DIR);
    fs::create_dir_all(&marker).with_context(|| format!("Failed to create '{}'", marker.display()))?;
    Ok(copied)
}

impl StepHost for ProjectPlugin {
    fn is_step_command(&self, name: &str) -> bool {
        COMMANDS.contains(&name)
    }

    fn run_step_command(&mut self, name: &str, depth: u32) -> Result<SequenceResult> {
        self.run_command(name, depth)
    }

    fn run_external(
        &mut self,
        command_line: &str,
        options: &StepOptions,
    ) -> Result<String, ExecutionError> {
        self.runner.run(command_line, options)
    }
}

impl Plugin for ProjectPlugin {
    fn name(&self) -> &'static str {
        "project"
    }

    fn capabilities(&self) -> Vec<String> {
        COMMANDS.iter().map(|c| c.to_string()).collect()
    }

    fn invoke(&mut self, command: &str, _params: &ParsedParams) -> Result<SequenceResult> {
        // `self.params` was parsed with the project aliases and supersedes `_params`.
        self.run_command(command, 0)
    }
}
