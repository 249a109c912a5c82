// ── Table preferences ──
//
// Column order, visibility, scrollability and page size per table id, one
// TOML file each under `<data_dir>/tables/`.

use std::path::{Path, PathBuf};

use ledgerdesk_core::TablePreferences;
use tracing::debug;

use crate::{ConfigError, data_dir, write_toml};

/// `<data_dir>/tables/<table_id>.toml`.
pub fn table_preferences_path(table_id: &str) -> Result<PathBuf, ConfigError> {
    table_preferences_path_in(&data_dir(), table_id)
}

fn table_preferences_path_in(root: &Path, table_id: &str) -> Result<PathBuf, ConfigError> {
    let valid = !table_id.is_empty()
        && table_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ConfigError::Validation {
            field: "table id".into(),
            reason: format!("'{table_id}' may only contain letters, digits, '-' and '_'"),
        });
    }
    Ok(root.join("tables").join(format!("{table_id}.toml")))
}

/// Saved preferences for `table_id`; `None` when nothing was saved yet.
pub fn load_table_preferences(table_id: &str) -> Result<Option<TablePreferences>, ConfigError> {
    load_table_preferences_at(&table_preferences_path(table_id)?)
}

pub fn save_table_preferences(table_id: &str, prefs: &TablePreferences) -> Result<PathBuf, ConfigError> {
    let path = table_preferences_path(table_id)?;
    save_table_preferences_at(&path, prefs)?;
    Ok(path)
}

pub fn load_table_preferences_at(path: &Path) -> Result<Option<TablePreferences>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let prefs = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded table preferences");
    Ok(Some(prefs))
}

pub fn save_table_preferences_at(path: &Path, prefs: &TablePreferences) -> Result<(), ConfigError> {
    write_toml(path, prefs)?;
    debug!(path = %path.display(), "saved table preferences");
    Ok(())
}

/// Forget saved preferences. Returns whether a file was removed.
pub fn reset_table_preferences_at(path: &Path) -> Result<bool, ConfigError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
