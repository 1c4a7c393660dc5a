//! Job source: turns the content tree into compilation jobs.
//!
//! One job per file with the configured extension, found recursively and
//! visited in file-name order within each directory. The identifier is the
//! file name without its extension and must be unique across the tree, since
//! it names the artifact on disk.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use jwalk::WalkDir;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// One unit of compilation work.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileJob {
    pub identifier: String,
    pub source_path: PathBuf,
    /// Source mtime in milliseconds since the Unix epoch.
    pub source_modified: f64,
    /// Attempts already spent on this job.
    pub retry_count: u32,
}

impl CompileJob {
    pub fn new(identifier: impl Into<String>, source_path: PathBuf, source_modified: f64) -> Self {
        Self {
            identifier: identifier.into(),
            source_path,
            source_modified,
            retry_count: 0,
        }
    }

    /// 1-based number of the attempt this job is about to make.
    pub fn attempt_number(&self) -> u32 {
        self.retry_count + 1
    }
}

/// Startup failures. Any of these aborts the run before a job is dispatched.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("content directory `{0}` is not readable")]
    Unreadable(PathBuf, #[source] io::Error),

    #[error("cannot read modification time of `{0}`")]
    Metadata(PathBuf, #[source] io::Error),

    #[error("duplicate post identifier `{identifier}` (`{first}` and `{second}`)")]
    DuplicateIdentifier {
        identifier: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("`{0}` uses the reserved identifier `{1}`")]
    ReservedIdentifier(PathBuf, String),
}

/// Enumerate every `*.{extension}` file under `root`.
///
/// `reserved` lists identifiers that would collide with other artifacts in
/// the cache directory (the index file).
pub fn enumerate(
    root: &Path,
    extension: &str,
    reserved: &[&str],
) -> Result<Vec<CompileJob>, SourceError> {
    // jwalk reports an unreadable root as an entry error; check it up front
    fs::read_dir(root).map_err(|e| SourceError::Unreadable(root.to_path_buf(), e))?;

    let mut jobs = Vec::new();
    let mut seen: FxHashMap<String, PathBuf> = FxHashMap::default();

    for entry in WalkDir::new(root).sort(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
            SourceError::Unreadable(path, io::Error::other(e.to_string()))
        })?;
        // symlinked posts are compiled from their target
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }

        let path = entry.path();
        if path.extension() != Some(OsStr::new(extension)) {
            continue;
        }
        let Some(identifier) = path.file_stem().and_then(OsStr::to_str) else {
            crate::log!("warning"; "skipping non UTF-8 file name: {}", path.display());
            continue;
        };
        let identifier = identifier.to_string();

        if reserved.contains(&identifier.as_str()) {
            return Err(SourceError::ReservedIdentifier(path, identifier));
        }
        if let Some(first) = seen.get(&identifier) {
            return Err(SourceError::DuplicateIdentifier {
                identifier,
                first: first.clone(),
                second: path,
            });
        }

        let modified = modified_ms(&path).map_err(|e| SourceError::Metadata(path.clone(), e))?;
        seen.insert(identifier.clone(), path.clone());
        jobs.push(CompileJob::new(identifier, path, modified));
    }

    crate::debug!("source"; "found {} posts under {}", jobs.len(), root.display());
    Ok(jobs)
}

/// Modification time of `path` in fractional milliseconds since the epoch.
pub fn modified_ms(path: &Path) -> io::Result<f64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(system_time_ms(modified))
}

#[allow(clippy::cast_precision_loss)]
fn system_time_ms(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as f64 / 1_000_000.0,
        Err(e) => -(e.duration().as_nanos() as f64) / 1_000_000.0,
    }
}
