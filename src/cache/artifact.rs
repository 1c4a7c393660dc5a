//! Persisted artifact layout.
//!
//! Metadata keys are camelCase, matching the names the site's post pages
//! use. The rendered payload lives under `compiled`, and undated posts carry
//! an empty `date`:
//!
//! ```json
//! {
//!   "slug": "hello-world",
//!   "title": "Hello",
//!   "excerpt": "",
//!   "date": "2024-06-15T00:00:00Z",
//!   "image": "/images/default-hero.webp",
//!   "readTime": "5 min read",
//!   "keywords": "rust, mdx",
//!   "lastModified": 1718409600000.0,
//!   "cacheVersion": "1.3.0",
//!   "processingTime": 12,
//!   "retryCount": 0,
//!   "compiled": { "html": "<h1 id=\"hello\">Hello</h1>\n", "headings": [...] }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Post metadata: everything in an artifact except the compiled payload.
///
/// This is what the index lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMeta {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    /// Normalized RFC 3339 when parseable, raw text otherwise, empty when absent.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub read_time: String,
    #[serde(default)]
    pub keywords: String,
    /// Source mtime (ms since epoch) the artifact was built from.
    pub last_modified: f64,
    pub cache_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

/// A compiled post as stored in `<cache>/<slug>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedArtifact {
    #[serde(flatten)]
    pub meta: PostMeta,
    pub compiled: CompiledDocument,
}

impl CachedArtifact {
    #[inline]
    pub fn slug(&self) -> &str {
        &self.meta.slug
    }

    /// Drop the compiled payload.
    pub fn into_meta(self) -> PostMeta {
        self.meta
    }
}

/// Renderable output of the compile collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledDocument {
    pub html: String,
    #[serde(default)]
    pub headings: Vec<Heading>,
}

/// One entry of the heading outline (table of contents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    /// Anchor id emitted on the `<hN>` element.
    pub id: String,
    pub text: String,
}

#[cfg(test)]
pub(crate) fn test_artifact(slug: &str, date: &str, last_modified: f64) -> CachedArtifact {
    CachedArtifact {
        meta: PostMeta {
            slug: slug.to_string(),
            title: format!("Title of {slug}"),
            excerpt: String::new(),
            date: date.to_string(),
            image: "/images/default-hero.webp".to_string(),
            read_time: "5 min read".to_string(),
            keywords: String::new(),
            last_modified,
            cache_version: super::CACHE_VERSION.to_string(),
            processing_time: None,
            retry_count: None,
        },
        compiled: CompiledDocument {
            html: format!("<p>{slug}</p>\n"),
            headings: Vec::new(),
        },
    }
}
