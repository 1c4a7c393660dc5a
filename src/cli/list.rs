//! `mdxc list`: print what the index currently holds.
//!
//! A version mismatch is an error, and entries without a slug or title are
//! skipped. Undated entries are kept and listed with an empty date column,
//! since the build sorts them last rather than dropping them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use owo_colors::{Stream, Style};
use serde::Deserialize;

use crate::aggregate::BuildStats;
use crate::cache::CACHE_VERSION;
use crate::config::PrecompileConfig;
use crate::log;
use crate::logger::paint;
use crate::utils::plural_count;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexFile {
    #[serde(default)]
    posts: Vec<serde_json::Value>,
    #[serde(default)]
    last_updated: String,
    #[serde(default)]
    cache_version: String,
    #[serde(default)]
    build_stats: Option<BuildStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntry {
    slug: Option<String>,
    title: Option<String>,
    date: Option<String>,
}

/// One usable index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPost {
    pub slug: String,
    pub title: String,
    pub date: String,
}

#[derive(Debug)]
pub struct LoadedIndex {
    pub posts: Vec<ListedPost>,
    pub skipped: usize,
    pub last_updated: String,
    pub stats: Option<BuildStats>,
}

/// Load the index at `path`, requiring format `version`.
pub fn load_index(path: &Path, version: &str) -> Result<LoadedIndex> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read index {} (run `mdxc build` first)", path.display()))?;
    let index: IndexFile =
        serde_json::from_str(&content).with_context(|| format!("Invalid index {}", path.display()))?;

    if index.cache_version != version {
        bail!(
            "index was built by format {}, expected {} (run `mdxc build --clean`)",
            if index.cache_version.is_empty() { "<unknown>" } else { index.cache_version.as_str() },
            version
        );
    }

    let total = index.posts.len();
    let posts: Vec<_> = index
        .posts
        .into_iter()
        .filter_map(|value| {
            let entry: RawEntry = serde_json::from_value(value).unwrap_or_default();
            Some(ListedPost {
                slug: entry.slug.filter(|s| !s.is_empty())?,
                title: entry.title.filter(|s| !s.is_empty())?,
                date: entry.date.unwrap_or_default(),
            })
        })
        .collect();

    Ok(LoadedIndex {
        skipped: total - posts.len(),
        posts,
        last_updated: index.last_updated,
        stats: index.build_stats,
    })
}

pub fn list_posts(config: &PrecompileConfig, limit: Option<usize>) -> Result<()> {
    let index = load_index(&config.index_path(), CACHE_VERSION)?;

    if index.skipped > 0 {
        log!("warning"; "skipped {} without slug or title", plural_count(index.skipped, "post"));
    }

    let shown = limit.unwrap_or(usize::MAX);
    for post in index.posts.iter().take(shown) {
        let date = post.date.get(..10).unwrap_or(&post.date);
        println!(
            "{}  {}  {}",
            paint(Stream::Stdout, format!("{date:<10}"), Style::new().dimmed()),
            paint(Stream::Stdout, &post.slug, Style::new().cyan()),
            post.title
        );
    }

    log!(
        "list";
        "{} (updated {})",
        plural_count(index.posts.len(), "post"),
        index.last_updated
    );
    if let Some(stats) = index.stats {
        log!(
            "list";
            "last build: {} compiled, {} cached, {} failed in {}ms",
            stats.compiled,
            stats.cached,
            stats.failed_compilations,
            stats.total_time
        );
    }

    Ok(())
}
