//! Typed failures for the persistence core.
//!
//! Everything below the command layer returns [`ProfileError`]. Raw `io::Error`s
//! never leave the core on their own: permission failures become
//! [`ProfileError::PermissionDenied`], anything else unexpected is wrapped in
//! [`ProfileError::Io`] with the original error kept as its source.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::ValidationIssue;

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Filesystem operation that was refused by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOperation {
    Read,
    Write,
    Symlink,
    Rename,
    Delete,
    List,
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            FsOperation::Read => "read",
            FsOperation::Write => "write",
            FsOperation::Symlink => "symlink",
            FsOperation::Rename => "rename",
            FsOperation::Delete => "delete",
            FsOperation::List => "list",
        };
        f.write_str(op)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("invalid profile name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("profile '{name}' does not exist")]
    NotFound { name: String },

    #[error("profile '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("profile '{name}' is the active profile and cannot be deleted")]
    Active { name: String },

    #[error("active config {link} points to missing file {target}")]
    DanglingSymlink { link: PathBuf, target: PathBuf },

    #[error("invalid config {}: {}", source_label(.path), format_issues(.issues))]
    InvalidConfig {
        path: Option<PathBuf>,
        issues: Vec<ValidationIssue>,
    },

    #[error("permission denied: cannot {operation} {path}")]
    PermissionDenied {
        path: PathBuf,
        operation: FsOperation,
    },

    #[error("{path} was modified since it was loaded; reload and try again")]
    ConcurrentModification { path: PathBuf },

    #[error("symlink loop detected while resolving {path}")]
    SymlinkLoop { path: PathBuf },

    #[error("too many levels of symbolic links while resolving {path}")]
    TooManySymlinks { path: PathBuf },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProfileError {
    /// Classify an OS error raised while performing `operation` on `path`
    pub fn from_io(path: &Path, operation: FsOperation, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            ProfileError::PermissionDenied {
                path: path.to_path_buf(),
                operation,
            }
        } else {
            ProfileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        ProfileError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(path: Option<&Path>, issues: Vec<ValidationIssue>) -> Self {
        ProfileError::InvalidConfig {
            path: path.map(Path::to_path_buf),
            issues,
        }
    }
}

fn source_label(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "(document)".to_string(),
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_errors_are_tagged() {
        let err = ProfileError::from_io(
            Path::new("/x/config.json"),
            FsOperation::Write,
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(
            err,
            ProfileError::PermissionDenied {
                operation: FsOperation::Write,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "permission denied: cannot write /x/config.json"
        );
    }

    #[test]
    fn test_other_errors_keep_source() {
        let err = ProfileError::from_io(
            Path::new("/x"),
            FsOperation::Read,
            io::Error::other("disk on fire"),
        );
        match err {
            ProfileError::Io { source, .. } => assert_eq!(source.to_string(), "disk on fire"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_lists_issues() {
        let err = ProfileError::invalid_config(
            None,
            vec![
                ValidationIssue::new("/agents", "expected an object"),
                ValidationIssue::new("", "expected a JSON object"),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("(document)"));
        assert!(msg.contains("/agents: expected an object"));
        assert!(msg.contains("<root>: expected a JSON object"));
    }
}
