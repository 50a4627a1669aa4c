// src/cli/plugins/mod.rs

// Each plugin is a named command group. Its commands form a capability table the
// dispatcher and the sequencer query uniformly.

use anyhow::Result;
use std::rc::Rc;

use crate::{
    cli::{FatalError, codes},
    core::{arg_parser::ParsedParams, config_loader::ConfigStore, sequencer::SequenceResult},
    system::executor::ProcessRunner,
};

pub mod deploy;
pub mod project;
pub mod version;

/// Everything a plugin receives when it is instantiated.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// The full argument vector as entered; plugins re-parse it with their own aliases.
    pub raw_args: Vec<String>,
    pub config: ConfigStore,
    pub runner: Rc<dyn ProcessRunner>,
    /// Whether missing values may be asked for on the terminal.
    pub interactive: bool,
}

/// A named group of invocable commands.
pub trait Plugin: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Every command name this instance can execute, configured ones included.
    fn capabilities(&self) -> Vec<String>;

    fn is_capability(&self, command: &str) -> bool {
        self.capabilities().iter().any(|c| c == command)
    }

    /// Runs `command`. Callers check `is_capability` first.
    fn invoke(&mut self, command: &str, params: &ParsedParams) -> Result<SequenceResult>;

    /// Runs when no valid command was given.
    fn help(&mut self) -> Result<SequenceResult> {
        Err(FatalError::new(codes::NO_HELP, "Method/command not part of the plugin!").into())
    }
}

type PluginFactory = fn(PluginContext) -> Result<Box<dyn Plugin>>;

/// Defines a plugin and the function that instantiates it.
pub struct PluginDefinition {
    pub name: &'static str,
    factory: PluginFactory,
}

impl PluginDefinition {
    pub fn instantiate(&self, ctx: PluginContext) -> Result<Box<dyn Plugin>> {
        log::debug!("Instantiating plugin '{}'", self.name);
        (self.factory)(ctx)
    }
}

impl std::fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDefinition").field("name", &self.name).finish()
    }
}

/// The single source of truth for all plugins.
static PLUGIN_REGISTRY: &[PluginDefinition] = &[
    PluginDefinition {
        name: "deploy",
        factory: |ctx| Ok(Box::new(deploy::DeployPlugin::new(ctx)?)),
    },
    PluginDefinition {
        name: "project",
        factory: |ctx| Ok(Box::new(project::ProjectPlugin::new(ctx))),
    },
    PluginDefinition {
        name: "version",
        factory: |_| Ok(Box::new(version::VersionPlugin)),
    },
];

/// Finds a plugin by name. Lookup is case-insensitive.
pub fn find_plugin(name: &str) -> Option<&'static PluginDefinition> {
    let wanted = name.to_lowercase();
    PLUGIN_REGISTRY.iter().find(|plugin| plugin.name == wanted)
}

pub fn is_plugin(name: &str) -> bool {
    find_plugin(name).is_some()
}
