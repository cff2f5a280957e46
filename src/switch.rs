//! Active-profile link handling.
//!
//! The canonical config path is either a regular file or a symlink to one
//! profile file. This module inspects that link and swaps it atomically:
//! a fresh symlink is created beside it and renamed over the old one.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{FsOperation, ProfileError, ProfileResult};
use crate::paths::with_suffix;

/// Number of regular-file backups kept beside the canonical config
const MAX_BACKUPS: usize = 10;

/// What currently sits at the canonical config path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Missing,
    RegularFile,
    Symlink { target: PathBuf },
    BrokenSymlink { target: PathBuf },
}

impl LinkStatus {
    /// Inspect `path` without following it
    pub fn detect(path: &Path) -> ProfileResult<Self> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::Missing),
            Err(e) => return Err(ProfileError::from_io(path, FsOperation::Read, e)),
        };

        if !meta.file_type().is_symlink() {
            return Ok(Self::RegularFile);
        }

        let raw = fs::read_link(path)
            .map_err(|e| ProfileError::from_io(path, FsOperation::Read, e))?;
        let target = match path.parent() {
            Some(parent) if raw.is_relative() => parent.join(raw),
            _ => raw,
        };

        // metadata() follows the whole chain, so this also catches multi-hop breakage
        match fs::metadata(path) {
            Ok(_) => Ok(Self::Symlink { target }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::BrokenSymlink { target }),
            Err(e) => Err(ProfileError::from_io(path, FsOperation::Read, e)),
        }
    }
}

/// Point the symlink at `link` to `target`, replacing whatever is there in one rename.
///
/// A regular file at `link` is backed up first. Permission failures surface as
/// [`ProfileError::PermissionDenied`], anything else as [`ProfileError::Io`].
pub fn repoint_symlink(link: &Path, target: &Path) -> ProfileResult<()> {
    if matches!(LinkStatus::detect(link)?, LinkStatus::RegularFile) {
        backup_existing_file(link)?;
    }

    let temp_link = with_suffix(link, ".link.tmp");
    match fs::remove_file(&temp_link) {
        Ok(()) => debug!(path = %temp_link.display(), "removed stale temp link"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ProfileError::from_io(&temp_link, FsOperation::Delete, e)),
    }

    if let Some(parent) = link.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| ProfileError::from_io(parent, FsOperation::Write, e))?;
    }

    make_symlink(target, &temp_link)
        .map_err(|e| ProfileError::from_io(link, FsOperation::Symlink, e))?;

    if let Err(e) = fs::rename(&temp_link, link) {
        if let Err(cleanup) = fs::remove_file(&temp_link) {
            warn!(path = %temp_link.display(), error = %cleanup, "failed to remove temp link");
        }
        return Err(ProfileError::from_io(link, FsOperation::Symlink, e));
    }

    info!(link = %link.display(), points_to = %target.display(), "active link updated");
    Ok(())
}

fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Copy a regular canonical config aside before it is replaced by a link
pub fn backup_existing_file(path: &Path) -> ProfileResult<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S%.3f").to_string();
    let backup_path = with_suffix(path, &format!(".{timestamp}.bak"));

    fs::copy(path, &backup_path)
        .map_err(|e| ProfileError::from_io(&backup_path, FsOperation::Write, e))?;
    info!(from = %path.display(), to = %backup_path.display(), "backed up regular config file");

    if let Err(e) = cleanup_old_backups(path) {
        warn!(path = %path.display(), error = %e, "failed to rotate config backups");
    }

    Ok(backup_path)
}

/// Backups of `path` that sit beside it, oldest first
pub fn list_backups(path: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{file_name}.");
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".bak"))
        })
        .map(|e| e.path())
        .collect();

    // Timestamps sort lexically
    backups.sort();
    Ok(backups)
}

fn cleanup_old_backups(path: &Path) -> io::Result<()> {
    let backups = list_backups(path)?;
    if backups.len() <= MAX_BACKUPS {
        return Ok(());
    }

    let to_remove = backups.len() - MAX_BACKUPS;
    for old in backups.iter().take(to_remove) {
        fs::remove_file(old)?;
        debug!(path = %old.display(), "removed old backup");
    }
    Ok(())
}
