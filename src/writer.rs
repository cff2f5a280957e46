//! JSON config persistence with an optimistic concurrency check.
//!
//! Callers [`load`] a document, keep the returned modification time, and hand
//! it back to [`save`]. If someone else wrote the file in between, the save is
//! refused instead of silently clobbering their change.

use serde_json::Value;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::atomic::atomic_write;
use crate::error::{FsOperation, ProfileError, ProfileResult};
use crate::schema::ValidationIssue;

/// A parsed document plus the mtime observed when it was read
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub document: Value,
    pub mtime: Option<SystemTime>,
}

/// Read and parse a JSON document, following symlinks.
///
/// The mtime is taken from the open handle before reading, so it can never be
/// newer than the content it is returned with.
pub fn load(path: &Path) -> ProfileResult<LoadedConfig> {
    let read_err = |e| ProfileError::from_io(path, FsOperation::Read, e);

    let mut file = File::open(path).map_err(read_err)?;
    let mtime = file.metadata().and_then(|m| m.modified()).ok();

    let mut content = String::new();
    file.read_to_string(&mut content).map_err(read_err)?;

    let document = parse_document(path, &content)?;
    Ok(LoadedConfig { document, mtime })
}

/// Parse JSON text, reporting syntax errors as an invalid config
pub fn parse_document(path: &Path, content: &str) -> ProfileResult<Value> {
    serde_json::from_str(content).map_err(|e| {
        ProfileError::invalid_config(
            Some(path),
            vec![ValidationIssue::new(
                "",
                format!("invalid JSON at line {} column {}: {e}", e.line(), e.column()),
            )],
        )
    })
}

/// Serialize a document the way it is stored on disk: 2-space indent, trailing newline
pub fn to_pretty_json(document: &Value) -> String {
    // Serializing a `Value` cannot fail: its map keys are always strings.
    let mut out = serde_json::to_string_pretty(document).unwrap_or_default();
    out.push('\n');
    out
}

/// Write `document` to `path` atomically.
///
/// With `expected_mtime`, the write is refused if the file on disk is newer.
/// A file that cannot be stat-ed (usually because it does not exist yet) is
/// treated as unmodified.
pub fn save(
    path: &Path,
    document: &Value,
    expected_mtime: Option<SystemTime>,
) -> ProfileResult<()> {
    if let Some(expected) = expected_mtime {
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(current) if current > expected => {
                warn!(path = %path.display(), "refusing to overwrite concurrently modified config");
                return Err(ProfileError::ConcurrentModification {
                    path: path.to_path_buf(),
                });
            }
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "no mtime to compare, writing"),
        }
    }

    atomic_write(path, to_pretty_json(document).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("oh-my-opencode.json");
        let doc = json!({ "agents": { "oracle": { "model": "openai/gpt-5" } }, "z": 1, "a": 2 });

        save(&path, &doc, None).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("{}\n", serde_json::to_string_pretty(&doc).unwrap()));
        assert!(text.contains("\n  \"agents\""));
        // key order is kept
        assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.document, doc);
        assert!(loaded.mtime.is_some());
    }

    #[test]
    fn test_stale_mtime_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{\"v\": 1}").unwrap();

        let loaded_at = SystemTime::now() - Duration::from_secs(60);
        set_mtime(&path, loaded_at + Duration::from_secs(30));

        let err = save(&path, &json!({ "v": 2 }), Some(loaded_at)).unwrap_err();
        assert!(matches!(err, ProfileError::ConcurrentModification { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\": 1}");
    }

    #[test]
    fn test_equal_or_older_mtime_is_accepted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        let stamp = SystemTime::now() - Duration::from_secs(60);
        set_mtime(&path, stamp);
        save(&path, &json!({ "v": 2 }), Some(stamp)).unwrap();

        set_mtime(&path, stamp - Duration::from_secs(10));
        save(&path, &json!({ "v": 3 }), Some(stamp)).unwrap();

        assert_eq!(load(&path).unwrap().document, json!({ "v": 3 }));
    }

    #[test]
    fn test_load_mtime_belongs_to_loaded_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{\"v\": 1}").unwrap();
        let first = SystemTime::now() - Duration::from_secs(120);
        set_mtime(&path, first);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.document, json!({ "v": 1 }));
        assert_eq!(loaded.mtime, Some(first));

        // Someone else replaces the file after our read
        fs::write(&path, "{\"v\": 2}").unwrap();
        set_mtime(&path, first + Duration::from_secs(60));

        let err = save(&path, &json!({ "v": 3 }), loaded.mtime).unwrap_err();
        assert!(matches!(err, ProfileError::ConcurrentModification { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\": 2}");
    }

    #[test]
    fn test_missing_file_is_not_a_conflict() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fresh.json");
        save(&path, &json!({}), Some(SystemTime::UNIX_EPOCH)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_load_reports_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load(&path).unwrap_err(),
            ProfileError::InvalidConfig { .. }
        ));
    }
}
