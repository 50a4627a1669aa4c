// src/core/mod.rs

pub mod arg_parser;
pub mod config_loader;
pub mod environment;
pub mod language;
pub mod output_extractor;
pub mod paths;
pub mod sequencer;
