//! Hidden `mdxc worker` subcommand: one attempt in its own process.
//!
//! Writes exactly one JSON report to stdout and nothing else, so the parent
//! can parse it. A compile failure is still a successful exit with a
//! `failure` report; only a crash exits non-zero.

use std::io::{Write, stdout};

use anyhow::{Context, Result};

use crate::cache::CACHE_VERSION;
use crate::cli::WorkerArgs;
use crate::compiler::{CompileOptions, compile_post};
use crate::config::ContentConfig;
use crate::scheduler::{WorkerReport, run_attempt};
use crate::source::{self, CompileJob};
use crate::utils::memory;

pub fn run_worker(args: &WorkerArgs) -> Result<()> {
    let report = compile_one(args);
    let json = serde_json::to_string(&report).context("Failed to encode worker report")?;

    let mut out = stdout().lock();
    out.write_all(json.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn compile_one(args: &WorkerArgs) -> WorkerReport {
    let baseline = memory::resident_mb();
    let defaults = ContentConfig::default();
    let options = CompileOptions {
        default_image: args.default_image.clone().unwrap_or(defaults.default_image),
        default_read_time: args
            .default_read_time
            .clone()
            .unwrap_or(defaults.default_read_time),
        cache_version: CACHE_VERSION.to_string(),
    };

    let job = CompileJob {
        retry_count: args.attempt,
        ..CompileJob::new(&args.slug, args.file.clone(), 0.0)
    };

    let mut report = run_attempt(&job, || {
        // stamp the artifact with the mtime as of this attempt
        let source_modified = source::modified_ms(&job.source_path)
            .with_context(|| format!("cannot stat `{}`", job.source_path.display()))?;
        let job = CompileJob {
            source_modified,
            ..job.clone()
        };
        Ok(compile_post(&job, &options)?)
    });

    // a fresh process: peak RSS above the startup baseline is this attempt's cost
    if let Some(delta) = baseline
        .zip(memory::peak_resident_mb())
        .map(|(base, peak)| (peak - base).max(0.0))
    {
        report.memory_delta_mb = Some(delta);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WorkerOutcome;
    use std::fs;
    use tempfile::TempDir;

    fn args(file: std::path::PathBuf) -> WorkerArgs {
        WorkerArgs {
            file,
            slug: "post".to_string(),
            attempt: 1,
            default_image: Some("/hero.png".to_string()),
            default_read_time: None,
        }
    }

    #[test]
    fn test_worker_compiles_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("post.mdx");
        fs::write(&path, "---\ntitle: Hi\n---\nBody\n").unwrap();

        let report = compile_one(&args(path));
        assert_eq!(report.slug, "post");
        let WorkerOutcome::Success { artifact } = report.outcome else {
            panic!("expected success");
        };
        assert_eq!(artifact.meta.title, "Hi");
        assert_eq!(artifact.meta.image, "/hero.png");
        assert_eq!(artifact.meta.read_time, "5 min read");
        assert_eq!(artifact.meta.retry_count, Some(1));
        assert!(artifact.meta.last_modified > 0.0);
    }

    #[test]
    fn test_worker_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let report = compile_one(&args(dir.path().join("gone.mdx")));
        let WorkerOutcome::Failure { error } = report.outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("gone.mdx"));
    }
}
