//! Compile collaborator: one source file in, one artifact out.
//!
//! ```text
//! source ──► frontmatter::split ──► frontmatter::parse ──► metadata
//!                   │
//!                   └──► body ──► markdown::render ──► { html, headings }
//! ```
//!
//! The scheduler never calls this directly; executors do.

pub mod frontmatter;
pub mod markdown;

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::{CACHE_VERSION, CachedArtifact, PostMeta};
use crate::config::ContentConfig;
use crate::source::CompileJob;
use crate::utils::date::DateTimeUtc;

use markdown::MarkdownOptions;

/// Defaults applied when front matter leaves a field out.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub default_image: String,
    pub default_read_time: String,
    pub cache_version: String,
}

impl CompileOptions {
    pub fn from_content(content: &ContentConfig) -> Self {
        Self {
            default_image: content.default_image.clone(),
            default_read_time: content.default_read_time.clone(),
            cache_version: CACHE_VERSION.to_string(),
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from_content(&ContentConfig::default())
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot read `{0}`")]
    Read(PathBuf, #[source] io::Error),

    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("empty content")]
    EmptyContent,
}

/// Compile one post into an artifact stamped with the job's source mtime.
pub fn compile_post(job: &CompileJob, options: &CompileOptions) -> Result<CachedArtifact, CompileError> {
    let source = fs::read_to_string(&job.source_path)
        .map_err(|e| CompileError::Read(job.source_path.clone(), e))?;
    compile_source(job, &source, options)
}

fn compile_source(
    job: &CompileJob,
    source: &str,
    options: &CompileOptions,
) -> Result<CachedArtifact, CompileError> {
    let (fm, body) = frontmatter::split(source);
    let fm = fm.map(frontmatter::parse).transpose()?.unwrap_or_default();

    if body.trim().is_empty() {
        return Err(CompileError::EmptyContent);
    }

    let compiled = markdown::render(body, &MarkdownOptions::all());

    let meta = PostMeta {
        slug: job.identifier.clone(),
        title: fm.title.unwrap_or_else(|| "Untitled".to_string()),
        excerpt: fm.excerpt.unwrap_or_default(),
        date: fm.date.map(|raw| normalize_date(&raw)).unwrap_or_default(),
        image: fm.image.unwrap_or_else(|| options.default_image.clone()),
        read_time: fm
            .read_time
            .unwrap_or_else(|| options.default_read_time.clone()),
        keywords: fm.keywords.unwrap_or_default(),
        last_modified: job.source_modified,
        cache_version: options.cache_version.clone(),
        processing_time: None,
        retry_count: Some(job.retry_count),
    };

    Ok(CachedArtifact { meta, compiled })
}

/// RFC 3339 when the date parses, the author's text otherwise.
fn normalize_date(raw: &str) -> String {
    DateTimeUtc::parse(raw).map_or_else(|| raw.trim().to_string(), DateTimeUtc::to_rfc3339)
}
