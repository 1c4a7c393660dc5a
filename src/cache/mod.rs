//! Artifact cache: one JSON file per post, keyed by identifier.

mod artifact;
mod store;

/// Artifact format version. Bump whenever the artifact layout or the
/// compiler output changes, so every cached artifact is rebuilt.
pub const CACHE_VERSION: &str = "1.3.0";

pub use artifact::{CachedArtifact, CompiledDocument, Heading, PostMeta};
pub use store::ArtifactCache;

#[cfg(test)]
pub(crate) use artifact::test_artifact;
