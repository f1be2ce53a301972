//! Persisted user settings.
//!
//! A missing or unreadable file never fails a load: the caller gets
//! defaults and a log line. Each field is read on its own, so a field that
//! is absent or holds an unknown value falls back to its
//! [`Settings::default`] value without discarding the rest of the file.

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::StoreError;

const FILE_NAME: &str = "settings.json";

/// `<platform config dir>/keyrev/settings.json`.
pub fn default_settings_path() -> Result<PathBuf, StoreError> {
    directories::ProjectDirs::from("dev", "keyrev", "keyrev")
        .map(|dirs| dirs.config_dir().join(FILE_NAME))
        .ok_or(StoreError::NoConfigDir)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Overlay every valid field of a stored record onto the defaults.
fn merge_fields(stored: serde_json::Value) -> Settings {
    let mut settings = Settings::default();
    let serde_json::Value::Object(fields) = stored else {
        log::warn!("load_settings: stored settings are not an object, using defaults");
        return settings;
    };
    for (key, value) in fields {
        let applied = match key.as_str() {
            "enabled" => serde_json::from_value(value).map(|v| settings.enabled = v),
            "volume" => serde_json::from_value(value).map(|v| settings.volume = v),
            "engineType" => serde_json::from_value(value).map(|v| settings.engine_type = v),
            "sensitivity" => serde_json::from_value(value).map(|v| settings.sensitivity = v),
            _ => continue,
        };
        if let Err(e) = applied {
            log::warn!("load_settings: ignoring invalid {key}: {e}");
        }
    }
    settings
}

/// Load settings, falling back to defaults when the file is missing or
/// unparseable, and per field when a single value is invalid.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        log::info!("load_settings: {:?} doesn't exist, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<serde_json::Value>(&contents) {
            Ok(stored) => {
                let settings = merge_fields(stored);
                log::info!(
                    "load_settings: enabled={} volume={:.2} engine={} sensitivity={:?}",
                    settings.enabled,
                    settings.volume,
                    settings.engine_type.name(),
                    settings.sensitivity
                );
                settings
            }
            Err(e) => {
                log::warn!("load_settings: failed to parse {:?}: {}, using defaults", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            log::warn!("load_settings: failed to read {:?}: {}, using defaults", path, e);
            Settings::default()
        }
    }
}

/// Write settings as pretty JSON, creating parent directories.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json).map_err(|e| io_error(path, e))?;
    log::info!("save_settings: saved to {:?}", path);
    Ok(())
}

/// First-run initialisation: write defaults if nothing is stored yet, then
/// return what is in effect.
pub fn ensure_initialized(path: &Path) -> Result<Settings, StoreError> {
    if path.exists() {
        return Ok(load_settings(path));
    }
    let defaults = Settings::default();
    save_settings(&defaults, path)?;
    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineType, Sensitivity};

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(FILE_NAME);
        let saved = Settings {
            enabled: false,
            volume: 0.25,
            engine_type: EngineType::V12,
            sensitivity: Sensitivity::High,
        };
        save_settings(&saved, &path).unwrap();
        assert_eq!(load_settings(&path), saved);
    }

    #[test]
    fn invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path), Settings::default());

        std::fs::write(&path, "[1, 2]").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn unknown_value_only_resets_its_own_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(
            &path,
            r#"{"engineType":"v16","volume":0.3,"sensitivity":"high","enabled":"yes"}"#,
        )
        .unwrap();
        let s = load_settings(&path);
        assert_eq!(s.engine_type, EngineType::V10, "unknown engine type");
        assert!(s.enabled, "non-boolean enabled");
        assert_eq!(s.volume, 0.3);
        assert_eq!(s.sensitivity, Sensitivity::High);
    }

    #[test]
    fn default_path_points_at_settings_file() {
        // No home directory in some sandboxes; nothing to check then.
        if let Ok(path) = default_settings_path() {
            assert!(path.ends_with(FILE_NAME));
        }
    }

    #[test]
    fn partial_file_is_completed_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, r#"{"volume":0.9}"#).unwrap();
        let s = load_settings(&path);
        assert_eq!(s.volume, 0.9);
        assert!(s.enabled);
        assert_eq!(s.engine_type, EngineType::V10);
    }

    #[test]
    fn ensure_initialized_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        assert_eq!(ensure_initialized(&path).unwrap(), Settings::default());
        assert!(path.exists());

        let custom = Settings {
            volume: 0.1,
            ..Settings::default()
        };
        save_settings(&custom, &path).unwrap();
        assert_eq!(ensure_initialized(&path).unwrap(), custom, "existing settings are kept");
    }
}
