//! Precompiler configuration from `mdxc.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [content], [cache], [workers]
//! ├── error          # ConfigError, ConfigDiagnostics
//! ├── util           # config discovery, path resolution
//! └── mod.rs         # PrecompileConfig (this file)
//! ```
//!
//! The file is optional: every field has a default, so a bare checkout with
//! `content/blogs/` builds without any configuration. CLI flags override
//! file values. Relative paths resolve against the config file's directory,
//! or the current directory when there is no file.

mod error;
pub mod section;
mod util;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{CacheConfig, ContentConfig, Isolation, WorkersConfig};

use util::{find_config_file, normalize_path};

use crate::{
    cli::{BuildArgs, Cli, Commands},
    log,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing mdxc.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrecompileConfig {
    /// Absolute path to the config file, when one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Project root directory (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Remove the artifact directory before building (CLI only)
    #[serde(skip)]
    pub clean: bool,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub workers: WorkersConfig,
}

impl PrecompileConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file; falls back to defaults
    /// rooted at cwd when none exists.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config, &cwd) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.clone());
                config.config_path = Some(path);
                config
            }
            None => {
                crate::debug!("config"; "{} not found, using defaults", cli.config.display());
                Self {
                    root: cwd,
                    ..Self::default()
                }
            }
        };

        if let Commands::Build { build_args } = &cli.command {
            config.apply_build_args(build_args);
        }
        config.normalize_paths();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "ignoring unknown fields in {}: {}", display_path, fields.join(", "));
    }

    /// Apply build arguments from CLI.
    fn apply_build_args(&mut self, args: &BuildArgs) {
        crate::logger::set_verbose(args.verbose);

        Self::update_option(&mut self.content.dir, args.content.as_ref());
        Self::update_option(&mut self.cache.dir, args.cache.as_ref());
        Self::update_option(&mut self.workers.timeout, args.timeout.as_ref());
        Self::update_option(&mut self.workers.retries, args.retries.as_ref());
        Self::update_option(&mut self.workers.isolation, args.isolation.as_ref());
        if let Some(count) = args.workers {
            self.workers.count = Some(count);
        }
        self.clean = args.clean;
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve content and cache directories against the root.
    fn normalize_paths(&mut self) {
        self.root = normalize_path(Path::new("."), &self.root);
        self.content.dir = normalize_path(&self.root, &self.content.dir);
        self.cache.dir = normalize_path(&self.root, &self.cache.dir);
    }

    /// Validate all sections, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();
        self.content.validate(&mut diag);
        self.cache.validate(&mut diag);
        self.workers.validate(&mut diag);
        diag.into_result().map_err(Into::into)
    }

    /// Path of the combined index artifact.
    pub fn index_path(&self) -> PathBuf {
        self.cache.dir.join(&self.cache.index)
    }

    /// Get path relative to the project root, for display.
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PrecompileConfig {
    let (parsed, ignored) = PrecompileConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_invalid_toml() {
        assert!(PrecompileConfig::parse_with_ignored("[content\ndir = \"x\"").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[content]\ndir = \"posts\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = PrecompileConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.content.dir, PathBuf::from("posts"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_build_args_override_file_values() {
        let mut config = test_parse_config("[workers]\ntimeout = 30\nretries = 5");
        let cli = Cli::parse_from([
            "mdxc", "build", "--timeout", "5", "--workers", "3", "--cache", "out", "--clean",
        ]);
        let Commands::Build { build_args } = &cli.command else {
            panic!("expected build command");
        };
        config.apply_build_args(build_args);

        assert_eq!(config.workers.timeout, 5);
        assert_eq!(config.workers.retries, 5);
        assert_eq!(config.workers.concurrency(), 3);
        assert_eq!(config.cache.dir, PathBuf::from("out"));
        assert!(config.clean);
    }

    #[test]
    fn test_paths_resolve_against_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = PrecompileConfig {
            root: dir.path().to_path_buf(),
            ..PrecompileConfig::default()
        };
        config.normalize_paths();

        assert!(config.content.dir.ends_with("content/blogs"));
        assert!(config.cache.dir.starts_with(&config.root));
        assert!(config.index_path().ends_with(".mdx-cache/index.json"));
        assert_eq!(
            config.root_relative(config.cache.dir.join("a.json")),
            PathBuf::from(".mdx-cache/a.json")
        );
    }

    #[test]
    fn test_validate_collects_all_sections() {
        let config = test_parse_config(
            "[content]\nextension = \".mdx\"\n[workers]\nmin = 0\n[cache]\nindex = \"x\"",
        );
        let err = config.validate().unwrap_err();
        let text = format!("{err}");
        assert!(text.starts_with("3 config errors"));
    }
}
