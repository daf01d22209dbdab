//! Command line interface module
//!
//! Parses the three source modes into a validated configuration and runs the
//! migration against the configured registries.

pub mod args;
pub mod runner;

pub use args::{Cli, Command};
pub use runner::Runner;
