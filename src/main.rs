//! mdxc - parallel precompiler for MDX blog content.

mod aggregate;
mod cache;
mod cli;
mod compiler;
mod config;
mod logger;
mod scheduler;
mod source;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PrecompileConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        // Workers run without config: everything they need is on the command line
        Commands::Worker { args } => cli::worker::run_worker(args),
        Commands::Build { .. } => {
            let config = PrecompileConfig::load(&cli)?;
            cli::build::build_posts(&config)
        }
        Commands::List { limit } => {
            let config = PrecompileConfig::load(&cli)?;
            cli::list::list_posts(&config, *limit)
        }
    }
}
