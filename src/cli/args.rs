//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Isolation;

/// Parallel MDX precompiler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: mdxc.toml, searched upward from cwd)
    #[arg(short = 'C', long, global = true, default_value = "mdxc.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Precompile every post into the artifact cache
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Print the posts recorded in the index
    #[command(visible_alias = "l")]
    List {
        /// Show at most this many posts
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Compile a single post and print a JSON report (spawned by `build`)
    #[command(hide = true)]
    Worker {
        #[command(flatten)]
        args: WorkerArgs,
    },
}

/// Build command arguments. Every flag overrides `mdxc.toml`.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Content directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub content: Option<PathBuf>,

    /// Artifact cache directory path (relative to project root)
    #[arg(short = 'o', long, value_hint = clap::ValueHint::DirPath)]
    pub cache: Option<PathBuf>,

    /// Fixed worker count (default: CPU count clamped to [workers] min..max)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Per-attempt timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Extra attempts after a failed compilation
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Execution context for each attempt
    #[arg(short, long, value_enum)]
    pub isolation: Option<Isolation>,

    /// Remove the artifact cache before building
    #[arg(long)]
    pub clean: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

/// Arguments of the hidden worker subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Source file to compile
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Post identifier
    #[arg(long)]
    pub slug: String,

    /// Zero-based attempt number
    #[arg(long, default_value_t = 0)]
    pub attempt: u32,

    /// Hero image when front matter has none
    #[arg(long)]
    pub default_image: Option<String>,

    /// Read time when front matter has none
    #[arg(long)]
    pub default_read_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let cli = Cli::parse_from(["mdxc", "build"]);
        assert_eq!(cli.config, PathBuf::from("mdxc.toml"));
        let Commands::Build { build_args } = cli.command else {
            panic!("expected build");
        };
        assert!(build_args.workers.is_none());
        assert!(build_args.isolation.is_none());
        assert!(!build_args.clean);
    }

    #[test]
    fn test_build_isolation_flag() {
        let cli = Cli::parse_from(["mdxc", "b", "--isolation", "thread", "-j", "2"]);
        let Commands::Build { build_args } = cli.command else {
            panic!("expected build");
        };
        assert_eq!(build_args.isolation, Some(Isolation::Thread));
        assert_eq!(build_args.workers, Some(2));
    }

    #[test]
    fn test_worker_args() {
        let cli = Cli::parse_from([
            "mdxc", "worker", "--file", "/tmp/a.mdx", "--slug", "a", "--attempt", "2",
        ]);
        let Commands::Worker { args } = cli.command else {
            panic!("expected worker");
        };
        assert_eq!(args.slug, "a");
        assert_eq!(args.attempt, 2);
        assert!(args.default_image.is_none());
    }
}
