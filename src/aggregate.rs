//! Aggregation of per-post results into the combined index.
//!
//! The index is what the site's list pages read: every post's metadata
//! (without the compiled payload), newest first, plus statistics about the
//! run that produced it.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;

use owo_colors::{Stream, Style};
use serde::{Deserialize, Serialize};

use crate::cache::{CachedArtifact, PostMeta};
use crate::config::section::cpu_count;
use crate::log;
use crate::logger::paint;
use crate::scheduler::{JobFailure, RunStats};
use crate::utils::date::DateTimeUtc;
use crate::utils::plural_count;

/// Contents of `<cache>/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIndex {
    pub posts: Vec<PostMeta>,
    pub last_updated: String,
    pub total_posts: usize,
    pub cache_version: String,
    pub build_stats: BuildStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildStats {
    /// Wall-clock duration of the run in ms.
    pub total_time: u64,
    /// Mean processing time of compiled posts in ms (cache hits excluded).
    pub avg_processing_time: f64,
    /// Largest per-attempt memory delta in MB.
    pub peak_memory_usage: f64,
    pub successful_compilations: usize,
    pub failed_compilations: usize,
    pub compiled: usize,
    pub cached: usize,
    /// Pool size the run was configured with.
    pub workers_used: usize,
    /// Most workers busy at once (0 on a fully cached run).
    pub peak_workers: usize,
    pub cpu_count: usize,
}

impl BuildStats {
    pub fn from_run(stats: &RunStats, total_time: u64) -> Self {
        Self {
            total_time,
            avg_processing_time: round2(stats.avg_processing_ms()),
            peak_memory_usage: round2(stats.peak_memory_mb),
            successful_compilations: stats.succeeded,
            failed_compilations: stats.failed,
            compiled: stats.compiled,
            cached: stats.cached,
            workers_used: stats.pool_size,
            peak_workers: stats.peak_active,
            cpu_count: cpu_count(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the index from successful results.
pub fn finalize(results: Vec<CachedArtifact>, build_stats: BuildStats, cache_version: &str) -> BuildIndex {
    let mut posts: Vec<PostMeta> = results.into_iter().map(CachedArtifact::into_meta).collect();
    sort_posts(&mut posts);

    BuildIndex {
        total_posts: posts.len(),
        posts,
        last_updated: DateTimeUtc::now().to_rfc3339(),
        cache_version: cache_version.to_string(),
        build_stats,
    }
}

/// Newest first. Posts without a parseable date go last; ties are broken by
/// slug so the index is byte-stable across runs.
pub fn sort_posts(posts: &mut [PostMeta]) {
    posts.sort_by(|a, b| {
        compare_dates(date_key(&a.date), date_key(&b.date)).then_with(|| a.slug.cmp(&b.slug))
    });
}

fn date_key(date: &str) -> Option<i64> {
    DateTimeUtc::parse(date).map(DateTimeUtc::to_unix)
}

fn compare_dates(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Write the index as pretty JSON.
pub fn write_index(path: &Path, index: &BuildIndex) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(index)?;
    fs::write(path, json)
}

/// Print the end-of-run summary: every failure with its final error, then
/// the counters.
pub fn report(errors: &[JobFailure], stats: &BuildStats) {
    for failure in errors {
        log!(
            "error";
            "{} ({}): {}",
            paint(Stream::Stdout, &failure.identifier, Style::new().bold()),
            plural_count(failure.attempts as usize, "attempt"),
            failure.error
        );
    }

    log!(
        "done";
        "{} compiled, {} cached, {} failed in {}ms",
        stats.compiled,
        stats.cached,
        stats.failed_compilations,
        stats.total_time
    );
    log!(
        "stats";
        "avg {:.2}ms per post, peak memory +{:.2}MB, {} busy of {} on {} cpus",
        stats.avg_processing_time,
        stats.peak_memory_usage,
        stats.peak_workers,
        plural_count(stats.workers_used, "worker"),
        stats.cpu_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CACHE_VERSION, test_artifact};
    use tempfile::TempDir;

    fn slugs(index: &BuildIndex) -> Vec<&str> {
        index.posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_sorted_newest_first() {
        let results = vec![
            test_artifact("old", "2023-01-01T00:00:00Z", 0.0),
            test_artifact("new", "2024-06-15T00:00:00Z", 0.0),
            test_artifact("mid", "2023-12-31T23:59:59Z", 0.0),
        ];
        let index = finalize(results, BuildStats::default(), CACHE_VERSION);

        assert_eq!(slugs(&index), ["new", "mid", "old"]);
        assert_eq!(index.total_posts, 3);
        assert_eq!(index.cache_version, CACHE_VERSION);
    }

    #[test]
    fn test_undated_last_and_ties_by_slug() {
        let results = vec![
            test_artifact("zeta", "", 0.0),
            test_artifact("beta", "2024-01-01T00:00:00Z", 0.0),
            test_artifact("alpha", "2024-01-01T00:00:00Z", 0.0),
            test_artifact("gamma", "not a date", 0.0),
        ];
        let index = finalize(results, BuildStats::default(), CACHE_VERSION);
        assert_eq!(slugs(&index), ["alpha", "beta", "gamma", "zeta"]);
    }

    #[test]
    fn test_posts_have_no_payload() {
        let index = finalize(vec![test_artifact("a", "", 0.0)], BuildStats::default(), CACHE_VERSION);
        let json = serde_json::to_value(&index).unwrap();

        assert!(json["posts"][0].get("compiled").is_none());
        assert_eq!(json["totalPosts"], 1);
        assert!(json["buildStats"].get("avgProcessingTime").is_some());
        assert!(json["lastUpdated"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_stats_from_run() {
        let run = RunStats {
            total: 3,
            succeeded: 2,
            failed: 1,
            compiled: 1,
            cached: 1,
            pool_size: 4,
            peak_active: 2,
            peak_memory_mb: 1.23456,
            ..RunStats::default()
        };
        let stats = BuildStats::from_run(&run, 1500);

        assert_eq!(stats.total_time, 1500);
        assert_eq!(stats.successful_compilations, 2);
        assert_eq!(stats.failed_compilations, 1);
        assert_eq!(stats.workers_used, 4);
        assert_eq!(stats.peak_workers, 2);
        assert_eq!(stats.peak_memory_usage, 1.23);
        assert!(stats.cpu_count >= 1);
    }

    #[test]
    fn test_write_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/index.json");
        let index = finalize(vec![test_artifact("a", "", 0.0)], BuildStats::default(), CACHE_VERSION);

        write_index(&path, &index).unwrap();
        let back: BuildIndex = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, index);
    }
}
