//! Input validation for session ids and paths taken from hook payloads.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const MAX_SESSION_ID_LEN: usize = 128;
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("path is empty")]
    EmptyPath,
    #[error("path contains null byte")]
    NullByte,
    #[error("path contains traversal pattern")]
    PathTraversal,
    #[error("path escapes working directory")]
    PathEscape,
    #[error("invalid working directory")]
    InvalidWorkDir,
    #[error("session ID is empty")]
    SessionIdEmpty,
    #[error("session ID too long")]
    SessionIdTooLong,
    #[error("session ID contains invalid characters")]
    SessionIdInvalid,
}

pub fn validate_session_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::SessionIdEmpty);
    }
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(ValidationError::SessionIdTooLong);
    }
    if !id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::SessionIdInvalid);
    }
    Ok(())
}

/// The session id if valid, otherwise [`DEFAULT_SESSION_ID`].
pub fn sanitize_session_id(id: &str) -> String {
    match validate_session_id(id) {
        Ok(()) => id.to_string(),
        Err(err) => {
            if !id.is_empty() {
                tracing::warn!("ignoring session id: {err}");
            }
            DEFAULT_SESSION_ID.to_string()
        }
    }
}

/// Resolve `path` against `work_dir`, rejecting anything that could land
/// outside it.
pub fn validate_path(path: &str, work_dir: &Path) -> Result<PathBuf, ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if path.contains('\0') {
        return Err(ValidationError::NullByte);
    }
    if path.contains("..") {
        return Err(ValidationError::PathTraversal);
    }

    let root = normalize(work_dir);
    let candidate = Path::new(path);
    let resolved = if candidate.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&root.join(candidate))
    };
    if !resolved.starts_with(&root) {
        return Err(ValidationError::PathEscape);
    }
    Ok(resolved)
}

pub fn validate_work_dir(work_dir: &Path) -> Result<(), ValidationError> {
    let raw = work_dir.as_os_str();
    if raw.is_empty() {
        return Err(ValidationError::InvalidWorkDir);
    }
    if raw.to_string_lossy().contains('\0') {
        return Err(ValidationError::NullByte);
    }
    if !work_dir.is_absolute() || !work_dir.is_dir() {
        return Err(ValidationError::InvalidWorkDir);
    }
    Ok(())
}

/// Lexically drop `.` components. `..` is rejected before this is called.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids() {
        assert_eq!(validate_session_id("abc-123_XYZ"), Ok(()));
        assert_eq!(validate_session_id(""), Err(ValidationError::SessionIdEmpty));
        assert_eq!(
            validate_session_id(&"a".repeat(129)),
            Err(ValidationError::SessionIdTooLong)
        );
        assert_eq!(validate_session_id(&"a".repeat(128)), Ok(()));
        for bad in ["../etc", "a/b", "a.b", "a b", "a\0b"] {
            assert_eq!(validate_session_id(bad), Err(ValidationError::SessionIdInvalid), "{bad:?}");
        }
    }

    #[test]
    fn invalid_session_ids_become_default() {
        assert_eq!(sanitize_session_id("sess-1"), "sess-1");
        assert_eq!(sanitize_session_id(""), "default");
        assert_eq!(sanitize_session_id("../../x"), "default");
    }

    #[test]
    fn paths_inside_work_dir() {
        let root = Path::new("/home/user/project");
        assert_eq!(
            validate_path("src/main.rs", root),
            Ok(PathBuf::from("/home/user/project/src/main.rs"))
        );
        assert_eq!(
            validate_path("/home/user/project/./a.txt", root),
            Ok(PathBuf::from("/home/user/project/a.txt"))
        );
    }

    #[test]
    fn paths_that_escape() {
        let root = Path::new("/home/user/project");
        assert_eq!(validate_path("", root), Err(ValidationError::EmptyPath));
        assert_eq!(validate_path("a\0b", root), Err(ValidationError::NullByte));
        assert_eq!(validate_path("../secret", root), Err(ValidationError::PathTraversal));
        assert_eq!(validate_path("/etc/passwd", root), Err(ValidationError::PathEscape));
        assert_eq!(
            validate_path("/home/user/project-other/x", root),
            Err(ValidationError::PathEscape)
        );
    }

    #[test]
    fn work_dirs() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(validate_work_dir(dir.path()), Ok(()));
        assert_eq!(validate_work_dir(Path::new("relative")), Err(ValidationError::InvalidWorkDir));
        assert_eq!(
            validate_work_dir(&dir.path().join("missing")),
            Err(ValidationError::InvalidWorkDir)
        );
    }
}
