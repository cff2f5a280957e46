//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs`. Handlers stay
//! thin: they build a [`ProfileStore`] from [`Paths`], call one store
//! operation, and render the result (or a hint) through [`Ui`].

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};
use std::path::Path;

use crate::doctor::run_doctor;
use crate::error::ProfileError;
use crate::paths::Paths;
use crate::profiles::ProfileStore;
use crate::switch::LinkStatus;
use crate::ui::Ui;
use crate::writer;

fn store(paths: &Paths) -> ProfileStore {
    ProfileStore::new(&paths.config_dir).with_config_path(&paths.config_file)
}

/// Turn typed store errors into messages with a next step for the user
fn with_hint(err: ProfileError) -> anyhow::Error {
    let hint = match &err {
        ProfileError::NotFound { .. } => Some("Use 'omoprof list' to see available profiles."),
        ProfileError::AlreadyExists { .. } => {
            Some("Choose a different name or remove the existing profile first.")
        }
        ProfileError::Active { .. } => {
            Some("Switch to another profile first with 'omoprof use <other-profile>'.")
        }
        ProfileError::DanglingSymlink { .. } => Some(
            "Restore the missing file, or run 'omoprof use <profile>' to point the config at an existing profile.",
        ),
        ProfileError::InvalidName { .. } => Some(
            "Use up to 32 letters, digits, '-' or '_'; 'default', 'backup', 'temp', 'current' and 'oh-my-opencode' are reserved.",
        ),
        ProfileError::ConcurrentModification { .. } => {
            Some("Another program changed the config; run the command again.")
        }
        _ => None,
    };

    match hint {
        Some(hint) => anyhow::anyhow!("{err}\nHint: {hint}"),
        None => anyhow::Error::new(err),
    }
}

/// List all available profiles
pub fn list(paths: &Paths, ui: &Ui, as_json: bool) -> Result<()> {
    let profiles = store(paths).list().map_err(with_hint)?;

    if as_json {
        ui.println(
            serde_json::to_string_pretty(&profiles).context("Failed to serialize profiles")?,
        );
        return Ok(());
    }

    if profiles.is_empty() {
        ui.warn("No profiles found.");
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!("  {} save <name>", ui.bold("omoprof")));
        return Ok(());
    }

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Profile"),
        ui.header_cell("Created"),
        ui.header_cell("Status"),
    ]);

    for profile in &profiles {
        let icon = if profile.is_active { ui.icon_ok() } else { " " };
        let status_cell = if profile.is_active {
            ui.colored_cell("active", AnsiColor::Green)
        } else {
            ui.cell("-")
        };

        table.add_row(vec![
            ui.cell(icon),
            ui.cell(&profile.name),
            ui.cell(profile.created.format("%Y-%m-%d %H:%M").to_string()),
            status_cell,
        ]);
    }

    ui.section("Profiles");
    ui.println(table.to_string());
    Ok(())
}

/// Show what the canonical config currently is and which profile is active
pub fn current(paths: &Paths, ui: &Ui) -> Result<()> {
    let status = LinkStatus::detect(&paths.config_file)?;

    ui.section("Current Profile");
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![
        ui.cell("Config file:"),
        ui.cell(paths.config_file.display().to_string()),
    ]);

    let status_cell = match &status {
        LinkStatus::Missing => ui.colored_cell("missing", AnsiColor::Yellow),
        LinkStatus::RegularFile => ui.cell("regular file (no active profile)"),
        LinkStatus::Symlink { target } => ui.cell(format!("symlink → {}", target.display())),
        LinkStatus::BrokenSymlink { target } => ui.colored_cell(
            format!("broken symlink → {}", target.display()),
            AnsiColor::Red,
        ),
    };
    table.add_row(vec![ui.cell("Status:"), status_cell]);

    let template_cell = if paths.template_file.is_file() {
        ui.cell(paths.template_file.display().to_string())
    } else {
        ui.colored_cell("(none)", AnsiColor::BrightBlack)
    };
    table.add_row(vec![ui.cell("Template:"), template_cell]);

    match store(paths).active() {
        Ok(Some(name)) => {
            table.add_row(vec![
                ui.cell("Active profile:"),
                ui.colored_cell(name, AnsiColor::Green),
            ]);
        }
        Ok(None) => {
            if let LinkStatus::Symlink { .. } = status {
                table.add_row(vec![
                    ui.cell(""),
                    ui.colored_cell("(symlink outside the profile set)", AnsiColor::Yellow),
                ]);
            } else {
                table.add_row(vec![ui.cell("Active profile:"), ui.cell("(none)")]);
            }
        }
        Err(e) => {
            table.add_row(vec![
                ui.cell("Active profile:"),
                ui.colored_cell(e.to_string(), AnsiColor::Red),
            ]);
        }
    }

    ui.println(table.to_string());
    Ok(())
}

/// Save a profile from a file, or from the current config when no file is given
pub fn save(
    paths: &Paths,
    name: &str,
    from: Option<&Path>,
    template: Option<&Path>,
    ui: &Ui,
) -> Result<()> {
    paths.ensure_dirs()?;

    let source = from.unwrap_or(paths.config_file.as_path());
    let document = match writer::load(source) {
        Ok(loaded) => loaded.document,
        Err(ProfileError::Io { source: e, .. })
            if e.kind() == std::io::ErrorKind::NotFound && from.is_none() =>
        {
            ui.warn(format!(
                "{} does not exist yet, saving an empty config",
                paths.config_file.display()
            ));
            Value::Object(Map::new())
        }
        Err(e) => {
            return Err(with_hint(e).context(format!("Failed to read {}", source.display())));
        }
    };

    let store = store(paths);
    let had_profiles = !store.profile_names()?.is_empty();
    store.save(name, &document, template).map_err(with_hint)?;

    ui.ok(format!("Saved profile '{name}'"));
    ui.println(ui.dim(format!("  {}", paths.profile_file(name).display())));
    if !had_profiles {
        ui.info("Also saved your previous config as profile 'default'");
    }
    ui.newline();
    ui.println("To activate it:");
    ui.println(format!("  omoprof use {name}"));
    Ok(())
}

/// Switch to a profile
pub fn use_profile(paths: &Paths, name: &str, ui: &Ui) -> Result<()> {
    let spinner = ui.spinner(format!("Switching to profile '{name}'..."));

    match store(paths).use_profile(name) {
        Ok(()) => {
            ui.spinner_finish_ok(&spinner, format!("Active profile: {name}"));
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to switch: {e}"));
            Err(with_hint(e))
        }
    }
}

/// Remove a profile
pub fn remove(paths: &Paths, name: &str, ui: &Ui, force: bool) -> Result<()> {
    let store = store(paths);
    if !store.exists(name) {
        return Err(with_hint(ProfileError::NotFound {
            name: name.to_string(),
        }));
    }

    if !force {
        let prompt = format!("Are you sure you want to remove profile '{name}'?");
        let confirm = inquire::Confirm::new(&prompt)
            .with_default(false)
            .with_help_message("This permanently deletes the profile file")
            .prompt()
            .context("Confirmation cancelled")?;

        if !confirm {
            ui.warn("Removal cancelled.");
            return Ok(());
        }
    }

    store.delete(name).map_err(with_hint)?;
    ui.ok(format!("Removed profile '{name}'"));
    Ok(())
}

/// Rename a profile
pub fn rename(paths: &Paths, old_name: &str, new_name: &str, ui: &Ui) -> Result<()> {
    let store = store(paths);
    let was_active = store.active().ok().flatten().as_deref() == Some(old_name);

    store.rename(old_name, new_name).map_err(with_hint)?;

    if was_active {
        ui.ok(format!("Renamed profile '{old_name}' to '{new_name}' (config link updated)"));
    } else {
        ui.ok(format!("Renamed profile '{old_name}' to '{new_name}'"));
    }
    Ok(())
}

/// Print a profile's document
pub fn show(paths: &Paths, name: &str, ui: &Ui) -> Result<()> {
    let document = store(paths).load(name).map_err(with_hint)?;
    ui.print_json(&document);
    Ok(())
}

/// Set the model for one agent (or category) in the live config.
///
/// Goes through the plain config writer with the mtime captured at load, so
/// an edit made by another program in the meantime is not overwritten.
pub fn set_model(
    paths: &Paths,
    key: &str,
    model: &str,
    variant: Option<&str>,
    category: bool,
    ui: &Ui,
) -> Result<()> {
    let loaded = match writer::load(&paths.config_file) {
        Ok(loaded) => loaded,
        Err(ProfileError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            writer::LoadedConfig {
                document: Value::Object(Map::new()),
                mtime: None,
            }
        }
        Err(e) => return Err(with_hint(e)),
    };

    let section = if category { "categories" } else { "agents" };
    let mut document = loaded.document;
    let Some(root) = document.as_object_mut() else {
        bail!("{} is not a JSON object", paths.config_file.display());
    };

    let entries = root
        .entry(section)
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(entries) = entries.as_object_mut() else {
        bail!("'{section}' in {} is not an object", paths.config_file.display());
    };

    let entry = entries
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(entry) = entry.as_object_mut() else {
        bail!("'{section}.{key}' in {} is not an object", paths.config_file.display());
    };

    entry.insert("model".to_string(), json!(model));
    match variant {
        Some(v) => {
            entry.insert("variant".to_string(), json!(v));
        }
        None => {
            entry.remove("variant");
        }
    }

    store(paths).validate(&document, Some(paths.config_file.as_path())).map_err(with_hint)?;
    writer::save(&paths.config_file, &document, loaded.mtime).map_err(with_hint)?;

    let target = match variant {
        Some(v) => format!("{model} ({v})"),
        None => model.to_string(),
    };
    ui.ok(format!("{section}.{key} → {target}"));
    Ok(())
}

/// Run diagnostics
pub fn doctor(paths: &Paths, ui: &Ui) -> Result<()> {
    if run_doctor(paths, ui) {
        Ok(())
    } else {
        bail!("Doctor found problems")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{read_json, setup_test_paths};
    use crate::ui::ColorMode;
    use std::fs;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    #[test]
    fn test_list_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(list(&paths, &test_ui(), false).is_ok());
    }

    #[test]
    fn test_save_from_current_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        paths.ensure_dirs().unwrap();
        fs::write(&paths.config_file, r#"{"agents": {"oracle": {"model": "a"}}}"#).unwrap();

        save(&paths, "work", None, None, &ui).unwrap();

        assert!(paths.profile_file("work").exists());
        assert!(paths.profile_file("default").exists());
        assert!(list(&paths, &ui, true).is_ok());
    }

    #[test]
    fn test_save_without_config_uses_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);

        save(&paths, "fresh", None, None, &test_ui()).unwrap();
        assert_eq!(read_json(&paths.profile_file("fresh")), json!({}));
    }

    #[test]
    fn test_use_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        paths.ensure_dirs().unwrap();

        let err = use_profile(&paths, "nonexistent", &test_ui()).unwrap_err();
        assert!(err.to_string().contains("Hint:"));
    }

    #[test]
    fn test_set_model_writes_through_active_link() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        save(&paths, "work", None, None, &ui).unwrap();
        use_profile(&paths, "work", &ui).unwrap();

        set_model(&paths, "oracle", "openai/gpt-5", Some("high"), false, &ui).unwrap();

        assert!(fs::symlink_metadata(&paths.config_file).unwrap().file_type().is_symlink());
        assert_eq!(
            read_json(&paths.profile_file("work")),
            json!({ "agents": { "oracle": { "model": "openai/gpt-5", "variant": "high" } } })
        );
    }

    #[test]
    fn test_remove_active_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        save(&paths, "work", None, None, &ui).unwrap();
        use_profile(&paths, "work", &ui).unwrap();

        assert!(remove(&paths, "work", &ui, true).is_err());
        remove(&paths, "default", &ui, true).unwrap();
        assert!(!paths.profile_file("default").exists());
    }

    #[test]
    fn test_current_no_config() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(current(&paths, &test_ui()).is_ok());
    }

    #[test]
    fn test_save_and_current_use_template_from_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        paths.ensure_dirs().unwrap();
        fs::write(&paths.template_file, r#"{"hooks": ["base"]}"#).unwrap();
        fs::write(&paths.config_file, r#"{"agents": {}}"#).unwrap();

        save(&paths, "work", None, None, &test_ui()).unwrap();
        assert_eq!(
            read_json(&paths.profile_file("work")),
            json!({ "hooks": ["base"], "agents": {} })
        );
        assert!(current(&paths, &test_ui()).is_ok());
    }
}
