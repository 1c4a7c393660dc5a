//! `[content]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [content]
//! dir = "content/blogs"              # Root of the post tree
//! extension = "mdx"                  # Files compiled as posts
//! default_image = "/images/og.webp"  # Hero image when front matter has none
//! default_read_time = "5 min read"   # Read time when front matter has none
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Content source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Post tree root (relative to the config file's directory).
    pub dir: PathBuf,

    /// Extension (without dot) of files that become compilation jobs.
    pub extension: String,

    /// Hero image used when a post declares none.
    pub default_image: String,

    /// Read time used when a post declares none.
    pub default_read_time: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dir: "content/blogs".into(),
            extension: "mdx".into(),
            default_image: "/images/default-hero.webp".into(),
            default_read_time: "5 min read".into(),
        }
    }
}

impl ContentConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.extension.is_empty() {
            diag.error("content.extension", "must not be empty");
        } else if self.extension.starts_with('.') {
            diag.error_with_hint(
                "content.extension",
                format!("`{}` starts with a dot", self.extension),
                format!("use `{}`", self.extension.trim_start_matches('.')),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_content_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.content.dir.to_str(), Some("content/blogs"));
        assert_eq!(config.content.extension, "mdx");
        assert_eq!(config.content.default_read_time, "5 min read");
    }

    #[test]
    fn test_content_config_override() {
        let config = test_parse_config("[content]\ndir = \"posts\"\nextension = \"md\"");
        assert_eq!(config.content.dir.to_str(), Some("posts"));
        assert_eq!(config.content.extension, "md");
        // untouched fields keep defaults
        assert_eq!(config.content.default_image, "/images/default-hero.webp");
    }
}
