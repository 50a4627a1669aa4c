// src/bin/omg.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use omega::{
    cli::{Cli, FatalError, dispatcher::Dispatcher},
    core::config_loader::ConfigStore,
    system::executor::ShellRunner,
};
use std::io::IsTerminal;
use std::rc::Rc;

/// Sets up logging, runs the dispatcher and maps errors to exit codes.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // Fatal errors carry their own exit code.
        if let Some(fatal) = e.downcast_ref::<FatalError>() {
            eprintln!("\n{}\n", fatal.to_string().red().bold());
            std::process::exit(fatal.code);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let config = ConfigStore::load()?;
    let interactive = std::io::stdin().is_terminal();
    let dispatcher = Dispatcher::new(config, Rc::new(ShellRunner), interactive);

    let result = dispatcher.process(&cli.args)?;
    log::debug!("Command finished with {} output block(s)", result.output.len());
    Ok(())
}
