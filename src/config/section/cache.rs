//! `[cache]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [cache]
//! dir = ".mdx-cache"   # One <slug>.json per post lives here
//! index = "index.json" # Combined, date-sorted post index
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Artifact cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact directory (relative to the config file's directory).
    pub dir: PathBuf,

    /// Index file name inside `dir`.
    pub index: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: ".mdx-cache".into(),
            index: "index.json".into(),
        }
    }
}

impl CacheConfig {
    /// File stem of the index, which no post may use as its identifier.
    pub fn index_stem(&self) -> &str {
        self.index.strip_suffix(".json").unwrap_or(&self.index)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.index.ends_with(".json") || self.index_stem().is_empty() {
            diag.error_with_hint(
                "cache.index",
                format!("`{}` is not a json file name", self.index),
                "use something like `index.json`",
            );
        }
        if self.index.contains(['/', '\\']) {
            diag.error("cache.index", "must be a file name, not a path");
        }
    }
}
