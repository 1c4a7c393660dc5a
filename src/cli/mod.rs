//! Command-line interface module.

mod args;
pub mod build;
pub mod list;
pub mod worker;

pub use args::{BuildArgs, Cli, Commands, WorkerArgs};
