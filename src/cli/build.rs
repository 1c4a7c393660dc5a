//! `mdxc build`: precompile every post into the artifact cache.
//!
//! Pipeline: clean -> enumerate -> schedule (cache | compile) -> index -> report

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use crate::aggregate::{self, BuildStats};
use crate::cache::{ArtifactCache, CachedArtifact};
use crate::compiler::{CompileOptions, compile_post};
use crate::config::{Isolation, PrecompileConfig};
use crate::logger::ProgressLine;
use crate::scheduler::{
    Executor, PROGRESS_COUNTER, ProcessExecutor, Scheduler, SchedulerOptions, ThreadExecutor,
};
use crate::source::{self, CompileJob};
use crate::utils::{elapsed_ms, plural_count};
use crate::{debug, log};

/// Run a full build. Fails if any post failed terminally.
pub fn build_posts(config: &PrecompileConfig) -> Result<()> {
    let start = Instant::now();
    let cache = ArtifactCache::new(&config.cache.dir);

    if config.clean {
        cache
            .clear()
            .with_context(|| format!("Failed to clear cache directory: {}", cache.dir().display()))?;
        debug!("build"; "cleared {}", config.root_relative(cache.dir()).display());
    }

    let jobs = source::enumerate(
        &config.content.dir,
        &config.content.extension,
        &[config.cache.index_stem()],
    )
    .context("Failed to collect posts")?;

    if jobs.is_empty() {
        log!(
            "warning";
            "no .{} files in {}",
            config.content.extension,
            config.root_relative(&config.content.dir).display()
        );
    }

    fs::create_dir_all(cache.dir())
        .with_context(|| format!("Failed to create cache directory: {}", cache.dir().display()))?;

    let executor = create_executor(config)?;
    let options = SchedulerOptions::from_config(&config.workers);
    log!(
        "build";
        "{} with up to {} ({} isolation)",
        plural_count(jobs.len(), "post"),
        plural_count(options.max_concurrency, "worker"),
        executor.name()
    );

    let progress = ProgressLine::new(&[(PROGRESS_COUNTER, jobs.len())]);
    let outcome = Scheduler::new(executor.as_ref(), &cache, options).run(jobs, Some(&progress));
    progress.finish();

    let stats = BuildStats::from_run(&outcome.stats, elapsed_ms(start));
    let index = aggregate::finalize(outcome.results, stats, cache.version());

    let index_path = config.index_path();
    match aggregate::write_index(&index_path, &index) {
        Ok(()) => debug!("build"; "wrote {}", config.root_relative(&index_path).display()),
        Err(e) => log!("error"; "cannot write {}: {}", index_path.display(), e),
    }

    aggregate::report(&outcome.errors, &index.build_stats);

    if !outcome.errors.is_empty() {
        bail!("failed to precompile {}", plural_count(outcome.errors.len(), "post"));
    }
    Ok(())
}

fn create_executor(config: &PrecompileConfig) -> Result<Box<dyn Executor>> {
    let options = CompileOptions::from_content(&config.content);
    let executor: Box<dyn Executor> = match config.workers.isolation {
        Isolation::Process => Box::new(
            ProcessExecutor::current(options).context("Failed to locate the mdxc executable")?,
        ),
        Isolation::Thread => Box::new(ThreadExecutor::new(
            move |job: &CompileJob| -> Result<CachedArtifact> { Ok(compile_post(job, &options)?) },
        )),
    };
    Ok(executor)
}
