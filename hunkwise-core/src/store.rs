//! Content-addressed, per-directory review store.
//!
//! Each canonical working directory maps to exactly one file,
//! `<base>/<sha256_hex(canonical_path)>.json`. SHA-256 is only a fixed-width,
//! filesystem-safe name here, not a security primitive.
//!
//! Writes go to `<target>.tmp` first and are renamed over the target, so any
//! observer sees either the previous complete review or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::paths::{self, PathError};
use crate::types::Review;

/// Suffix of in-flight write files. Never a valid review path.
pub const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no review stored for {0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error("review file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not serialize review: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        StoreError::Io { op, path: path.to_path_buf(), source }
    }
}

/// Handle on a store base directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReviewStore {
    base: PathBuf,
}

impl ReviewStore {
    /// Creates a store rooted at `base`. The directory is created lazily on
    /// the first write.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Returns the default base directory: the user cache directory joined
    /// with the application name, or `./.hunkwise-cache` when the platform
    /// reports no cache directory.
    pub fn default_base() -> PathBuf {
        dirs::cache_dir()
            .map(|d| d.join(crate::APP_NAME))
            .unwrap_or_else(|| PathBuf::from(".hunkwise-cache"))
    }

    /// The base directory this store writes into.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Target file for an already-canonical working directory.
    pub fn path_for_canonical(&self, canonical: &str) -> PathBuf {
        let digest = Sha256::digest(canonical.as_bytes());
        self.base.join(format!("{}.json", hex::encode(digest)))
    }

    /// Target file for any working directory (canonicalized first).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] when canonicalization fails.
    pub fn path_for(&self, dir: &str) -> Result<PathBuf, StoreError> {
        let canonical = paths::canonicalize(dir)?;
        Ok(self.path_for_canonical(&canonical))
    }

    /// Atomically writes `review`, keyed by its (already canonical)
    /// `working_directory`, and returns the target path.
    ///
    /// The temp file is created or truncated with mode 0644 on Unix, fully
    /// written and flushed, then renamed over the target. On rename failure
    /// the temp file is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] or [`StoreError::Io`]; IO errors are
    /// surfaced unchanged inside the variant.
    pub async fn write(&self, review: &Review) -> Result<PathBuf, StoreError> {
        let target = self.path_for_canonical(&review.working_directory);
        let bytes = serde_json::to_vec_pretty(review).map_err(StoreError::Serialize)?;

        tokio::fs::create_dir_all(&self.base)
            .await
            .map_err(|e| StoreError::io("create", &self.base, e))?;

        let tmp = temp_path(&target);
        if let Err(e) = write_file(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "could not remove temp review file");
            }
            return Err(StoreError::io("rename", &target, e));
        }

        debug!(path = %target.display(), bytes = bytes.len(), "review written");
        Ok(target)
    }

    /// Reads the review stored for `dir` (canonicalized first).
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no file exists, [`StoreError::Parse`] when
    /// the file is not a valid review, [`StoreError::Io`] otherwise.
    pub async fn read(&self, dir: &str) -> Result<Review, StoreError> {
        let target = self.path_for(dir)?;
        self.read_file(&target).await
    }

    /// Reads and parses one review file by location.
    pub async fn read_file(&self, target: &Path) -> Result<Review, StoreError> {
        let bytes = match tokio::fs::read(target).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(target.display().to_string()));
            }
            Err(e) => return Err(StoreError::io("read", target, e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Parse { path: target.to_path_buf(), source })
    }
}

/// `<target>.tmp` next to the target file.
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(path).await.map_err(|e| StoreError::io("create", path, e))?;
    file.write_all(bytes).await.map_err(|e| StoreError::io("write", path, e))?;
    file.flush().await.map_err(|e| StoreError::io("flush", path, e))?;
    file.sync_all().await.map_err(|e| StoreError::io("sync", path, e))?;
    Ok(())
}
