//! omega: a command-line orchestrator that scaffolds multi-tier (backend and
//! frontend) projects and runs their install and deploy sequences.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
