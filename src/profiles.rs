//! Core profile management logic.
//!
//! A profile is a file `<dir>/oh-my-opencode-<name>.json`. The active profile
//! is whichever one the canonical config symlink points at; it is always
//! re-derived from the filesystem and never stored anywhere else.
//!
//! This module handles:
//! - Saving profiles (template merge, schema validation, first-run `default` snapshot)
//! - Activating a profile by repointing the canonical config
//! - Listing, deleting and renaming profiles

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::atomic::atomic_write;
use crate::error::{FsOperation, ProfileError, ProfileResult};
use crate::merge::deep_merge;
use crate::names::{DEFAULT_PROFILE, check_name_syntax, validate_profile_name};
use crate::paths::{
    config_file_name, parse_profile_file_name, profile_file_name, template_file_name,
};
use crate::schema::{DocumentValidator, ModelMapValidator};
use crate::switch::{LinkStatus, repoint_symlink};
use crate::writer::{parse_document, to_pretty_json};

/// A profile as shown to listing UIs
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    pub name: String,
    pub is_active: bool,
    pub created: DateTime<Utc>,
}

/// Named profiles in one directory, plus the canonical config link
pub struct ProfileStore {
    dir: PathBuf,
    config_path: PathBuf,
    validator: Box<dyn DocumentValidator>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("dir", &self.dir)
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

impl ProfileStore {
    /// Store rooted at `dir`, with the canonical config at `<dir>/oh-my-opencode.json`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let config_path = dir.join(config_file_name());
        Self {
            dir,
            config_path,
            validator: Box::new(ModelMapValidator),
        }
    }

    /// Use a canonical config path other than the one beside the profiles
    pub fn with_config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = config_path.into();
        self
    }

    pub fn with_validator(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.dir.join(profile_file_name(name))
    }

    /// Template used when the caller gives none: beside the canonical config
    pub fn default_template_path(&self) -> PathBuf {
        self.config_path.with_file_name(template_file_name())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_path(name).is_file()
    }

    /// Save `document` as profile `name`, overwriting any previous version.
    ///
    /// The document is validated, merged over the template (if any) and
    /// validated again. On the very first save into an empty directory a
    /// `default` profile is written first, so the user always has a way back.
    pub fn save(
        &self,
        name: &str,
        document: &Value,
        template_path: Option<&Path>,
    ) -> ProfileResult<()> {
        validate_profile_name(name)?;
        let document = self.validate(document, None)?;

        let template = self.load_template(template_path)?;
        let output = self.apply_template(template.as_ref(), &document)?;

        if name != DEFAULT_PROFILE && self.profile_names()?.is_empty() {
            let snapshot = match self.read_current_config()? {
                Some(current) => {
                    let current = self.validate(&current, Some(self.config_path.as_path()))?;
                    self.apply_template(template.as_ref(), &current)?
                }
                None => output.clone(),
            };
            self.write_profile(DEFAULT_PROFILE, &snapshot)?;
            info!(dir = %self.dir.display(), "created bootstrap '{DEFAULT_PROFILE}' profile");
        }

        self.write_profile(name, &output)?;
        info!(profile = name, "profile saved");
        Ok(())
    }

    /// Make `name` the active profile by pointing the canonical config at it
    pub fn use_profile(&self, name: &str) -> ProfileResult<()> {
        check_name_syntax(name)?;
        let path = self.require_profile(name)?;
        let target = std::path::absolute(&path)
            .map_err(|e| ProfileError::from_io(&path, FsOperation::Read, e))?;

        repoint_symlink(&self.config_path, &target)?;
        info!(profile = name, "profile activated");
        Ok(())
    }

    /// All profiles, oldest first, each tagged with whether it is active
    pub fn list(&self) -> ProfileResult<Vec<ProfileInfo>> {
        let active = self.active()?;
        let mut profiles = Vec::new();

        for name in self.profile_names()? {
            let path = self.profile_path(&name);
            let meta = fs::metadata(&path)
                .map_err(|e| ProfileError::from_io(&path, FsOperation::Read, e))?;
            let created: SystemTime = meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            profiles.push(ProfileInfo {
                is_active: active.as_deref() == Some(name.as_str()),
                created: created.into(),
                name,
            });
        }

        profiles.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        Ok(profiles)
    }

    /// Name of the active profile, re-derived from the canonical config link.
    ///
    /// A regular file, a missing path, or a link to something that is not one
    /// of this store's profiles all mean "no active profile". A link whose
    /// target is gone is an error the operator has to fix.
    pub fn active(&self) -> ProfileResult<Option<String>> {
        match LinkStatus::detect(&self.config_path)? {
            LinkStatus::Missing | LinkStatus::RegularFile => Ok(None),
            LinkStatus::BrokenSymlink { target } => Err(ProfileError::DanglingSymlink {
                link: self.config_path.clone(),
                target,
            }),
            LinkStatus::Symlink { target } => {
                let Some(name) = target
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(parse_profile_file_name)
                else {
                    debug!(
                        points_to = %target.display(),
                        "canonical config links outside the profile set"
                    );
                    return Ok(None);
                };

                if self.is_same_file(&self.config_path, &self.profile_path(name)) {
                    Ok(Some(name.to_string()))
                } else {
                    debug!(
                        points_to = %target.display(),
                        "link target is not in the profile directory"
                    );
                    Ok(None)
                }
            }
        }
    }

    /// Delete a profile. The active profile is never deleted.
    pub fn delete(&self, name: &str) -> ProfileResult<()> {
        check_name_syntax(name)?;
        let path = self.require_profile(name)?;

        if self.active()?.as_deref() == Some(name) {
            return Err(ProfileError::Active {
                name: name.to_string(),
            });
        }

        fs::remove_file(&path).map_err(|e| ProfileError::from_io(&path, FsOperation::Delete, e))?;
        info!(profile = name, "profile deleted");
        Ok(())
    }

    /// Rename a profile, carrying the active link along if it pointed at `old`.
    ///
    /// The file rename and the link repoint are two steps. If the repoint fails
    /// the file is renamed back on a best-effort basis; should that also fail,
    /// the link is left dangling until someone runs `use` again.
    pub fn rename(&self, old: &str, new: &str) -> ProfileResult<()> {
        check_name_syntax(old)?;
        validate_profile_name(new)?;

        let old_path = self.require_profile(old)?;
        let new_path = self.profile_path(new);
        if new_path.exists() {
            return Err(ProfileError::AlreadyExists {
                name: new.to_string(),
            });
        }

        let was_active = self.active()?.as_deref() == Some(old);

        fs::rename(&old_path, &new_path)
            .map_err(|e| ProfileError::from_io(&old_path, FsOperation::Rename, e))?;

        if was_active {
            let relinked = std::path::absolute(&new_path)
                .map_err(|e| ProfileError::from_io(&new_path, FsOperation::Read, e))
                .and_then(|target| repoint_symlink(&self.config_path, &target));

            if let Err(e) = relinked {
                if let Err(revert) = fs::rename(&new_path, &old_path) {
                    warn!(
                        from = %new_path.display(),
                        to = %old_path.display(),
                        error = %revert,
                        "failed to revert profile rename; active link is now dangling"
                    );
                }
                return Err(e);
            }
        }

        info!(from = old, to = new, "profile renamed");
        Ok(())
    }

    /// Read a stored profile document
    pub fn load(&self, name: &str) -> ProfileResult<Value> {
        check_name_syntax(name)?;
        let path = self.require_profile(name)?;
        let content = fs::read_to_string(&path)
            .map_err(|e| ProfileError::from_io(&path, FsOperation::Read, e))?;
        parse_document(&path, &content)
    }

    /// Validate a document against the store's schema capability
    pub fn validate(&self, document: &Value, source: Option<&Path>) -> ProfileResult<Value> {
        self.validator
            .validate(document)
            .map_err(|issues| ProfileError::invalid_config(source, issues))
    }

    /// Names of every profile file in the directory, unsorted
    pub fn profile_names(&self) -> ProfileResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProfileError::from_io(&self.dir, FsOperation::List, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProfileError::from_io(&self.dir, FsOperation::List, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(parse_profile_file_name) else {
                continue;
            };
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn require_profile(&self, name: &str) -> ProfileResult<PathBuf> {
        let path = self.profile_path(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ProfileError::NotFound {
                name: name.to_string(),
            })
        }
    }

    fn write_profile(&self, name: &str, document: &Value) -> ProfileResult<()> {
        atomic_write(&self.profile_path(name), to_pretty_json(document).as_bytes())
    }

    fn load_template(&self, explicit: Option<&Path>) -> ProfileResult<Option<Value>> {
        let path = match explicit {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                debug!(path = %path.display(), "explicit template not found, trying default");
                self.default_template_path()
            }
            None => self.default_template_path(),
        };

        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| ProfileError::from_io(&path, FsOperation::Read, e))?;
        debug!(path = %path.display(), "using template");
        parse_document(&path, &content).map(Some)
    }

    fn apply_template(&self, template: Option<&Value>, document: &Value) -> ProfileResult<Value> {
        match template {
            Some(base) => {
                let merged = deep_merge(base, document);
                self.validate(&merged, None)
            }
            None => Ok(document.clone()),
        }
    }

    fn read_current_config(&self) -> ProfileResult<Option<Value>> {
        match fs::read_to_string(&self.config_path) {
            Ok(content) => parse_document(&self.config_path, &content).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProfileError::from_io(&self.config_path, FsOperation::Read, e)),
        }
    }

    fn is_same_file(&self, a: &Path, b: &Path) -> bool {
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
