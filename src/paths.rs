use anyhow::{Context, Result};
use directories::BaseDirs;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::names::check_name_syntax;

/// File stem of the canonical config
pub const BASE_NAME: &str = "oh-my-opencode";

/// Canonical config file name, e.g. `oh-my-opencode.json`
pub fn config_file_name() -> String {
    format!("{BASE_NAME}.json")
}

/// Profile file name, e.g. `oh-my-opencode-work.json`
pub fn profile_file_name(name: &str) -> String {
    format!("{BASE_NAME}-{name}.json")
}

/// Template file name, e.g. `oh-my-opencode.template.json`
pub fn template_file_name() -> String {
    format!("{BASE_NAME}.template.json")
}

/// Extract the profile name from a file name, if it follows the profile pattern
pub fn parse_profile_file_name(file_name: &str) -> Option<&str> {
    let name = file_name
        .strip_prefix(BASE_NAME)?
        .strip_prefix('-')?
        .strip_suffix(".json")?;
    check_name_syntax(name).ok()?;
    Some(name)
}

/// `path` with `suffix` appended to its final component
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// All computed paths used by omoprof
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.config/opencode, holds the canonical config and every profile
    pub config_dir: PathBuf,
    /// ~/.config/opencode/oh-my-opencode.json
    pub config_file: PathBuf,
    /// ~/.config/opencode/oh-my-opencode.template.json
    pub template_file: PathBuf,
}

impl Paths {
    /// Resolve paths from an explicit directory, falling back to ~/.config/opencode
    pub fn new(config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => {
                let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
                base_dirs.home_dir().join(".config").join("opencode")
            }
        };
        Ok(Self::in_dir(config_dir))
    }

    pub fn in_dir(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join(config_file_name());
        let template_file = config_dir.join(template_file_name());
        Self {
            config_dir,
            config_file,
            template_file,
        }
    }

    /// Get the path to a specific profile's file
    pub fn profile_file(&self, name: &str) -> PathBuf {
        self.config_dir.join(profile_file_name(name))
    }

    /// Ensure the config directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.config_dir.display()
            )
        })
    }
}
