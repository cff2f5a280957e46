//! Crash-safe writes that respect symlinks.
//!
//! A write to a path that is a symlink (possibly through several hops) lands
//! on the final physical file. The link itself is never replaced by a
//! regular file.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{FsOperation, ProfileError, ProfileResult};
use crate::paths::with_suffix;

/// Maximum number of symlinks followed before giving up, same as Linux `MAXSYMLINKS`
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Follow symlinks from `path` to the file a write should actually replace.
///
/// A hop that does not exist is returned as is, so writing creates a new
/// regular file there.
pub fn resolve_write_path(path: &Path) -> ProfileResult<PathBuf> {
    let mut current = path.to_path_buf();
    let mut visited: HashSet<PathBuf> = HashSet::new();

    for hop in 0..=MAX_SYMLINK_HOPS {
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(current),
            Err(e) => return Err(ProfileError::from_io(&current, FsOperation::Read, e)),
        };

        if !meta.file_type().is_symlink() {
            return Ok(current);
        }

        if hop == MAX_SYMLINK_HOPS {
            break;
        }

        let link_target = fs::read_link(&current)
            .map_err(|e| ProfileError::from_io(&current, FsOperation::Read, e))?;
        let next = match current.parent() {
            Some(parent) if link_target.is_relative() => parent.join(&link_target),
            _ => link_target,
        };

        if !visited.insert(next.clone()) {
            return Err(ProfileError::SymlinkLoop {
                path: path.to_path_buf(),
            });
        }

        debug!(from = %current.display(), to = %next.display(), "following symlink");
        current = next;
    }

    Err(ProfileError::TooManySymlinks {
        path: path.to_path_buf(),
    })
}

/// Atomically replace the contents of `path` (or of the file it links to).
///
/// Content goes to `<real>.tmp` first and is renamed over the real file, so
/// readers see either the old or the new content, never a torn write.
pub fn atomic_write(path: &Path, content: &[u8]) -> ProfileResult<()> {
    let real_path = resolve_write_path(path)?;
    let temp_path = with_suffix(&real_path, ".tmp");

    if let Err(e) = write_then_rename(&real_path, &temp_path, content) {
        if let Err(cleanup) = fs::remove_file(&temp_path)
            && cleanup.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temp file");
        }
        return Err(ProfileError::from_io(path, FsOperation::Write, e));
    }

    debug!(
        path = %path.display(),
        real = %real_path.display(),
        bytes = content.len(),
        "atomic write complete"
    );
    Ok(())
}

fn write_then_rename(real_path: &Path, temp_path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = real_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, real_path)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{make_read_only, restore_writable};
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_regular_and_missing() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("config.json");
        assert_eq!(resolve_write_path(&file).unwrap(), file);

        fs::write(&file, "{}").unwrap();
        assert_eq!(resolve_write_path(&file).unwrap(), file);
    }

    #[test]
    fn test_resolve_dangling_link_returns_missing_hop() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link.json");
        symlink("gone.json", &link).unwrap();

        assert_eq!(
            resolve_write_path(&link).unwrap(),
            temp.path().join("gone.json")
        );
    }

    #[test]
    fn test_resolve_detects_loop() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        symlink(&b, &a).unwrap();
        symlink(&a, &b).unwrap();

        let err = resolve_write_path(&a).unwrap_err();
        assert!(matches!(err, ProfileError::SymlinkLoop { .. }));
    }

    #[test]
    fn test_resolve_too_many_hops() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        fs::write(dir.join("end"), "x").unwrap();

        // link0 -> link1 -> ... -> link41 -> end
        let hops = MAX_SYMLINK_HOPS + 2;
        symlink(dir.join("end"), dir.join(format!("link{}", hops - 1))).unwrap();
        for i in (0..hops - 1).rev() {
            symlink(dir.join(format!("link{}", i + 1)), dir.join(format!("link{i}"))).unwrap();
        }

        let err = resolve_write_path(&dir.join("link0")).unwrap_err();
        assert!(matches!(err, ProfileError::TooManySymlinks { .. }));

        // 40 hops is still fine
        let ok = resolve_write_path(&dir.join("link2")).unwrap();
        assert_eq!(ok, dir.join("end"));
    }

    #[test]
    fn test_atomic_write_creates_parents_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("nested/dir/config.json");

        atomic_write(&file, b"{\"a\": 1}\n").unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "{\"a\": 1}\n");
        assert!(!with_suffix(&file, ".tmp").exists());
    }

    #[test]
    fn test_atomic_write_through_symlink_chain() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let real = dir.join("real.json");
        fs::write(&real, "old").unwrap();

        symlink(&real, dir.join("l3")).unwrap();
        symlink("l3", dir.join("l2")).unwrap();
        symlink(dir.join("l2"), dir.join("l1")).unwrap();

        atomic_write(&dir.join("l1"), b"new").unwrap();

        assert_eq!(fs::read_to_string(&real).unwrap(), "new");
        for link in ["l1", "l2", "l3"] {
            let meta = fs::symlink_metadata(dir.join(link)).unwrap();
            assert!(meta.file_type().is_symlink(), "{link} should still be a symlink");
        }
        assert!(!dir.join("real.json.tmp").exists());
        assert!(!dir.join("l1.tmp").exists());
    }

    #[test]
    fn test_atomic_write_failure_cleans_temp() {
        let temp = TempDir::new().unwrap();
        // A directory at the real path makes the final rename fail
        let target = temp.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("child"), "x").unwrap();

        let err = atomic_write(&target, b"data").unwrap_err();
        assert!(matches!(err, ProfileError::Io { .. }));
        assert!(!temp.path().join("occupied.tmp").exists());
    }

    #[test]
    fn test_atomic_write_in_read_only_dir_is_permission_denied() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("locked");
        fs::create_dir(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(&path, "{}").unwrap();
        if !make_read_only(&dir) {
            return;
        }

        let result = atomic_write(&path, b"new");
        restore_writable(&dir);

        assert!(matches!(
            result.unwrap_err(),
            ProfileError::PermissionDenied {
                operation: FsOperation::Write,
                ..
            }
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }
}
