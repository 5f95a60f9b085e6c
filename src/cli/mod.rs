//! Command-line interface for codetutor
//!
//! - [`args`]: clap definitions and the mapping onto config overrides
//! - `run`: the entry point called by `main`
//! - `progress`: the stdout progress observer

pub mod args;
mod progress;
mod run;

pub use args::{Cli, build_cli};
pub use run::run;
