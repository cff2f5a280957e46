//! Profile name rules.

use crate::error::{ProfileError, ProfileResult};
use crate::paths::BASE_NAME;

/// Longest accepted profile name, in characters
pub const MAX_NAME_LEN: usize = 32;

/// Name of the snapshot created automatically on the first save
pub const DEFAULT_PROFILE: &str = "default";

/// Names a user may not create a profile under
pub const RESERVED_NAMES: [&str; 5] = [DEFAULT_PROFILE, "backup", "temp", "current", BASE_NAME];

/// Validate a name for a profile that is about to be created.
///
/// Applies the character rules plus the reserved-name set.
pub fn validate_profile_name(name: &str) -> ProfileResult<()> {
    check_name_syntax(name)?;

    if RESERVED_NAMES.contains(&name) {
        return Err(ProfileError::invalid_name(name, "this name is reserved"));
    }

    Ok(())
}

/// Character rules only: 1..=32 characters of `[A-Za-z0-9_-]`.
///
/// Used when referring to a profile that already exists, so the
/// bootstrap `default` profile can still be addressed.
pub fn check_name_syntax(name: &str) -> ProfileResult<()> {
    if name.is_empty() {
        return Err(ProfileError::invalid_name(name, "name cannot be empty"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ProfileError::invalid_name(
            name,
            format!("name cannot be longer than {MAX_NAME_LEN} characters"),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProfileError::invalid_name(
            name,
            "only letters, digits, hyphens (-) and underscores (_) are allowed",
        ));
    }

    Ok(())
}
