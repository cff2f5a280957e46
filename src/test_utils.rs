//! Test utilities shared across test modules

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::paths::Paths;
use crate::profiles::ProfileStore;

/// Paths rooted in a temporary directory, mimicking ~/.config/opencode
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::in_dir(temp_dir.path().join("opencode"))
}

/// A profile store over [`setup_test_paths`], directory created
pub fn setup_test_store(temp_dir: &TempDir) -> ProfileStore {
    let paths = setup_test_paths(temp_dir);
    paths.ensure_dirs().unwrap();
    ProfileStore::new(paths.config_dir)
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Leftover `*.tmp` files in `dir`
pub fn tmp_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
        .collect()
}

/// Make `dir` read-only. Returns `false` when the process can still write
/// there (running as root), in which case permission tests should skip.
#[cfg(unix)]
pub fn make_read_only(dir: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
    let canary = dir.join(".write-check");
    if fs::write(&canary, "").is_ok() {
        let _ = fs::remove_file(&canary);
        restore_writable(dir);
        return false;
    }
    true
}

#[cfg(unix)]
pub fn restore_writable(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
}
