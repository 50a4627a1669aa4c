// src/cli/dispatcher.rs

use anyhow::Result;
use std::rc::Rc;

use crate::{
    cli::{
        FatalError, codes,
        plugins::{self, Plugin, PluginContext},
        print_help,
    },
    core::{
        arg_parser::{AliasRules, ParsedParams},
        config_loader::ConfigStore,
        sequencer::SequenceResult,
    },
    models::CommandRequest,
    system::executor::ProcessRunner,
};

/// Aliases understood before any plugin is known.
const GLOBAL_ALIASES: AliasRules = &[("version", &["v"])];

/// What the positional tokens ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Help,
    Run {
        plugin: String,
        command: Option<String>,
    },
}

/// Picks the plugin and command out of the positional tokens.
///
/// With two or more tokens only the first one is tested against the registry:
/// if it names a plugin the order is `<plugin> <command>`, otherwise the first
/// two tokens are taken as `<command> <plugin>`.
pub fn route(positionals: &[String]) -> Route {
    match positionals {
        [] => Route::Help,
        [plugin] => Route::Run {
            plugin: plugin.clone(),
            command: None,
        },
        [first, second, ..] if plugins::is_plugin(first) => Route::Run {
            plugin: first.clone(),
            command: Some(second.clone()),
        },
        [first, second, ..] => Route::Run {
            plugin: second.clone(),
            command: Some(first.clone()),
        },
    }
}

/// Turns an argument vector into a plugin invocation.
#[derive(Debug)]
pub struct Dispatcher {
    config: ConfigStore,
    runner: Rc<dyn ProcessRunner>,
    interactive: bool,
}

impl Dispatcher {
    pub fn new(config: ConfigStore, runner: Rc<dyn ProcessRunner>, interactive: bool) -> Self {
        log::info!("omega v{}", env!("CARGO_PKG_VERSION"));
        match config.conf_path() {
            Some(path) => log::info!("Configuration file: {}", path.display()),
            None => log::info!("Configuration file: none, using defaults"),
        }
        match config.project_root() {
            Some(root) => log::info!("Project root: {}", root.display()),
            None => log::info!("Project root: not inside a project"),
        }
        Self {
            config,
            runner,
            interactive,
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Parses `args`. Returns `None` when there is nothing to run and the help
    /// screen should be shown instead.
    pub fn parse(&self, args: &[String]) -> Option<CommandRequest> {
        let mut params = ParsedParams::parse(args, GLOBAL_ALIASES);
        if params.has_flag("version") {
            // `--version` / `-v` wins over whatever else was typed.
            params.set_positionals(vec!["version".to_string()]);
        }

        match route(params.positionals()) {
            Route::Help => None,
            Route::Run { plugin, command } => {
                log::debug!("Resolved plugin '{}', command {:?}", plugin, command);
                Some(CommandRequest {
                    plugin_name: plugin,
                    command_name: command,
                    raw_args: args.to_vec(),
                    params,
                })
            }
        }
    }

    /// Instantiates the requested plugin and checks that it has the command.
    pub fn resolve(&self, request: &CommandRequest) -> Result<Box<dyn Plugin>> {
        let definition = plugins::find_plugin(&request.plugin_name).ok_or_else(|| {
            log::debug!("No plugin named '{}'", request.plugin_name);
            FatalError::new(codes::INVALID_PLUGIN, "Invalid command/plugin to execute!")
        })?;

        let plugin = definition.instantiate(PluginContext {
            raw_args: request.raw_args.clone(),
            config: self.config.clone(),
            runner: Rc::clone(&self.runner),
            interactive: self.interactive,
        })?;

        if let Some(command) = &request.command_name {
            if !plugin.is_capability(command) {
                return Err(FatalError::new(
                    codes::INVALID_COMMAND,
                    format!("Invalid command to execute! ({} {})", plugin.name(), command),
                )
                .into());
            }
        }
        Ok(plugin)
    }

    /// Runs `command` on `plugin`, or the plugin's help when the command is
    /// missing or not one of its capabilities.
    pub fn execute(
        plugin: &mut dyn Plugin,
        command: Option<&str>,
        params: &ParsedParams,
    ) -> Result<SequenceResult> {
        match command {
            Some(command) if plugin.is_capability(command) => {
                log::debug!("Invoking '{} {}'", plugin.name(), command);
                plugin.invoke(command, params)
            }
            _ => {
                log::debug!("Running help of plugin '{}'", plugin.name());
                plugin.help()
            }
        }
    }

    /// Parses, resolves and executes one invocation.
    pub fn process(&self, args: &[String]) -> Result<SequenceResult> {
        log::debug!("Dispatching args: {:?}", args);
        let Some(request) = self.parse(args) else {
            print_help(&self.config);
            return Ok(SequenceResult::empty());
        };
        let mut plugin = self.resolve(&request)?;
        Self::execute(plugin.as_mut(), request.command_name.as_deref(), &request.params)
    }
}
