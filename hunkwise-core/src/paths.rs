//! Working-directory canonicalization.
//!
//! A canonical path is absolute, lexically clean (no `.`/`..`, no repeated or
//! trailing separators) and symlink-resolved. Paths that do not exist yet are
//! accepted: the symlink step is skipped and the cleaned path is returned, so
//! a producer may submit a review before its directory is created.
//!
//! Case is never folded by hand. On case-insensitive filesystems the
//! symlink-resolution step already returns the on-disk case.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("invalid path {path:?}: {reason}")]
    Invalid { path: String, reason: String },
}

impl PathError {
    fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PathError::Invalid { path: path.into(), reason: reason.into() }
    }
}

/// Canonicalizes a working-directory string.
///
/// # Errors
///
/// Returns [`PathError::Invalid`] when the input contains a NUL byte, when the
/// process working directory cannot be determined for a relative input, when
/// symlink resolution fails with anything other than "not found", or when the
/// result is not valid UTF-8.
pub fn canonicalize(raw: &str) -> Result<String, PathError> {
    if raw.contains('\0') {
        return Err(PathError::invalid(raw, "contains a NUL byte"));
    }
    let resolved = canonicalize_path(Path::new(raw)).map_err(|e| match e {
        PathError::Invalid { reason, .. } => PathError::invalid(raw, reason),
    })?;
    resolved
        .into_os_string()
        .into_string()
        .map_err(|_| PathError::invalid(raw, "not valid UTF-8"))
}

/// Canonicalizes a filesystem path. See [`canonicalize`].
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, PathError> {
    let display = path.to_string_lossy().into_owned();
    if path.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(PathError::invalid(display, "contains a NUL byte"));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| PathError::invalid(&display, format!("current directory: {e}")))?;
        cwd.join(path)
    };

    let cleaned = lexical_clean(&absolute);

    match std::fs::canonicalize(&cleaned) {
        Ok(real) => Ok(real),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(cleaned),
        Err(e) => Err(PathError::invalid(display, e.to_string())),
    }
}

/// Collapses `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above the root.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_clean_collapses_dots_and_separators() {
        assert_eq!(lexical_clean(Path::new("/a/./b//c/../d/")), PathBuf::from("/a/b/d"));
        assert_eq!(lexical_clean(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(lexical_clean(Path::new("/")), PathBuf::from("/"));
    }

    #[test]
    fn missing_directory_returns_cleaned_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = canonicalize(dir.path().to_str().unwrap()).unwrap();
        let raw = format!("{base}/not-yet/../still-missing/");
        assert_eq!(canonicalize(&raw).unwrap(), format!("{base}/still-missing"));
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let raw = format!("{}/./", dir.path().display());
        let once = canonicalize(&raw).unwrap();
        assert_eq!(canonicalize(&once).unwrap(), once);
        assert!(!once.ends_with('/'));
    }

    #[test]
    fn trailing_separator_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let plain = dir.path().to_str().unwrap().to_owned();
        assert_eq!(canonicalize(&format!("{plain}/")).unwrap(), canonicalize(&plain).unwrap());
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let cwd = std::fs::canonicalize(std::env::current_dir().unwrap()).unwrap();
        assert_eq!(canonicalize(".").unwrap(), cwd.to_str().unwrap());
    }

    #[test]
    fn nul_byte_is_rejected() {
        assert!(matches!(canonicalize("/tmp/a\0b"), Err(PathError::Invalid { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_resolved() {
        let dir = tempfile::TempDir::new().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert_eq!(
            canonicalize(link.to_str().unwrap()).unwrap(),
            canonicalize(real.to_str().unwrap()).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_directory_component_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        let raw = format!("{}/child", file.display());
        assert!(matches!(canonicalize(&raw), Err(PathError::Invalid { .. })));
    }
}
