//! Diagnostic tool for omoprof.
//!
//! This module implements the `omoprof doctor` command, which checks:
//! - The config directory exists.
//! - The canonical config link is healthy and points into the profile set.
//! - Every profile and the template parse and pass schema validation.
//! - No temp files were left behind by an interrupted write.
//!
//! Nothing is repaired automatically; problems are reported with pass/fail/warn.

use anstyle::AnsiColor;
use std::fs;

use crate::paths::Paths;
use crate::profiles::ProfileStore;
use crate::switch::LinkStatus;
use crate::ui::Ui;
use crate::writer;

/// Run the doctor diagnostics, returning `true` when no errors were found
pub fn run_doctor(paths: &Paths, ui: &Ui) -> bool {
    let store = ProfileStore::new(&paths.config_dir).with_config_path(&paths.config_file);

    ui.section("omoprof Doctor");
    ui.newline();

    let mut healthy = true;

    healthy &= check_step(ui, "Config Directory", || {
        if paths.config_dir.is_dir() {
            ui.println(format!(
                "  {} Config directory exists: {}",
                ui.icon_ok(),
                paths.config_dir.display()
            ));
            true
        } else {
            ui.println(format!(
                "  {} Config directory missing: {}",
                ui.icon_warn(),
                paths.config_dir.display()
            ));
            // Not an error until the first profile is saved
            true
        }
    });

    healthy &= check_step(ui, "Active Config", || {
        let status = match LinkStatus::detect(&paths.config_file) {
            Ok(status) => status,
            Err(e) => {
                ui.println(format!("  {} Cannot inspect config: {}", ui.icon_err(), e));
                return false;
            }
        };

        match status {
            LinkStatus::Missing => {
                ui.println(format!(
                    "  {} {} is missing",
                    ui.icon_warn(),
                    paths.config_file.display()
                ));
                true
            }
            LinkStatus::RegularFile => {
                ui.println(format!(
                    "  {} Config is a regular file (no profile active)",
                    ui.icon_info()
                ));
                true
            }
            LinkStatus::Symlink { target } => {
                ui.println(format!("  {} Symlink points to: {}", ui.icon_ok(), target.display()));
                match store.active() {
                    Ok(Some(name)) => {
                        ui.println(format!("  {} Active profile: {}", ui.icon_ok(), name));
                    }
                    Ok(None) => {
                        ui.println(format!(
                            "  {} Target is EXTERNAL (not an omoprof profile)",
                            ui.icon_warn()
                        ));
                    }
                    Err(e) => {
                        ui.println(format!("  {} {}", ui.icon_err(), e));
                        return false;
                    }
                }
                true
            }
            LinkStatus::BrokenSymlink { target } => {
                ui.println(format!(
                    "  {} BROKEN symlink pointing to: {}",
                    ui.icon_err(),
                    target.display()
                ));
                false
            }
        }
    });

    healthy &= check_step(ui, "Profiles", || {
        let mut names = match store.profile_names() {
            Ok(names) => names,
            Err(e) => {
                ui.println(format!("  {} Failed to list profiles: {}", ui.icon_err(), e));
                return false;
            }
        };

        if names.is_empty() {
            ui.println(format!("  {} No profiles found", ui.icon_warn()));
            return true;
        }

        names.sort();
        ui.println(format!("  Found {} profiles:", names.len()));
        let mut all_valid = true;

        for name in names {
            match store
                .load(&name)
                .and_then(|doc| store.validate(&doc, Some(store.profile_path(&name).as_path())))
            {
                Ok(_) => ui.println(format!("    {} {}", ui.icon_ok(), name)),
                Err(e) => {
                    ui.println(format!("    {} {} ({})", ui.icon_err(), name, e));
                    all_valid = false;
                }
            }
        }
        all_valid
    });

    healthy &= check_step(ui, "Template", || {
        let template = &paths.template_file;
        if !template.is_file() {
            ui.println(format!(
                "  {} No template at {}",
                ui.icon_info(),
                template.display()
            ));
            return true;
        }

        match writer::load(template)
            .and_then(|t| store.validate(&t.document, Some(template.as_path())))
        {
            Ok(_) => {
                ui.println(format!("  {} Template is valid", ui.icon_ok()));
                true
            }
            Err(e) => {
                ui.println(format!("  {} {}", ui.icon_err(), e));
                false
            }
        }
    });

    healthy &= check_step(ui, "Leftover Temp Files", || {
        let Ok(entries) = fs::read_dir(&paths.config_dir) else {
            return true;
        };

        let leftovers: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|n| n.ends_with(".tmp"))
            .collect();

        if leftovers.is_empty() {
            ui.println(format!("  {} None", ui.icon_ok()));
        } else {
            for name in &leftovers {
                ui.println(format!(
                    "  {} {} (left by an interrupted write, safe to delete)",
                    ui.icon_warn(),
                    name
                ));
            }
        }
        true
    });

    healthy
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {name}...")));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}
