//! Artifact persistence and validity checks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::source::CompileJob;
use crate::{debug, log};

use super::{CACHE_VERSION, CachedArtifact};

/// Directory of per-post artifacts.
///
/// An artifact is reusable iff it parses, carries the current format
/// version, and was built from a source at least as new as the one on disk.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
    version: String,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_version(dir, CACHE_VERSION)
    }

    pub fn with_version(dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            version: version.into(),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `<dir>/<identifier>.json`
    pub fn artifact_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.json"))
    }

    /// Return the cached artifact for `job` if it is still valid.
    ///
    /// Every failure mode is a miss; a corrupt file is reported but never
    /// aborts the run.
    pub fn lookup(&self, job: &CompileJob) -> Option<CachedArtifact> {
        let path = self.artifact_path(&job.identifier);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                log!("cache"; "cannot read {}: {}", path.display(), e);
                return None;
            }
        };

        let artifact: CachedArtifact = match serde_json::from_str(&content) {
            Ok(artifact) => artifact,
            Err(e) => {
                log!("cache"; "ignoring corrupt artifact {}: {}", path.display(), e);
                return None;
            }
        };

        if artifact.meta.cache_version != self.version {
            debug!("cache"; "{}: version {} != {}", job.identifier, artifact.meta.cache_version, self.version);
            return None;
        }
        if artifact.meta.last_modified < job.source_modified {
            debug!("cache"; "{}: source changed", job.identifier);
            return None;
        }

        Some(artifact)
    }

    /// Write an artifact, replacing any previous one.
    pub fn store(&self, artifact: &CachedArtifact) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(self.artifact_path(artifact.slug()), json)
    }

    /// Remove the whole cache directory.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_artifact;
    use tempfile::TempDir;

    fn job(slug: &str, modified: f64) -> CompileJob {
        CompileJob::new(slug, PathBuf::from(format!("/content/{slug}.mdx")), modified)
    }

    #[test]
    fn test_store_then_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path().join("cache"));
        let artifact = test_artifact("hello", "", 100.0);

        cache.store(&artifact).unwrap();

        assert!(cache.artifact_path("hello").exists());
        assert_eq!(cache.lookup(&job("hello", 100.0)), Some(artifact));
    }

    #[test]
    fn test_missing_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path());
        assert!(cache.lookup(&job("nope", 0.0)).is_none());
    }

    #[test]
    fn test_newer_source_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path());
        cache.store(&test_artifact("post", "", 100.0)).unwrap();

        assert!(cache.lookup(&job("post", 99.5)).is_some());
        assert!(cache.lookup(&job("post", 100.5)).is_none());
    }

    #[test]
    fn test_version_mismatch_is_miss() {
        let dir = TempDir::new().unwrap();
        ArtifactCache::new(dir.path())
            .store(&test_artifact("post", "", 100.0))
            .unwrap();

        let bumped = ArtifactCache::with_version(dir.path(), "99.0.0");
        assert!(bumped.lookup(&job("post", 0.0)).is_none());
    }

    #[test]
    fn test_corrupt_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path());
        fs::write(cache.artifact_path("broken"), "{ not json").unwrap();
        assert!(cache.lookup(&job("broken", 0.0)).is_none());
    }

    #[test]
    fn test_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path());
        cache.store(&test_artifact("post", "", 1.0)).unwrap();
        cache.store(&test_artifact("post", "", 2.0)).unwrap();

        let found = cache.lookup(&job("post", 2.0)).unwrap();
        assert_eq!(found.meta.last_modified, 2.0);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path().join("cache"));
        cache.store(&test_artifact("post", "", 1.0)).unwrap();

        cache.clear().unwrap();
        assert!(!cache.dir().exists());
        // clearing twice is fine
        cache.clear().unwrap();
    }
}
