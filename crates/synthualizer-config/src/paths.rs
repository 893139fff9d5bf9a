//! Platform-specific paths for user presets.
//!
//! - Linux: `~/.config/synthualizer/presets/`
//! - macOS: `~/Library/Application Support/synthualizer/presets/`
//! - Windows: `%APPDATA%\synthualizer\presets\`

use std::path::{Path, PathBuf};

use crate::{ConfigError, EngineConfig, get_factory_preset};

/// Application name used for directory paths.
pub const APP_NAME: &str = "synthualizer";

const PRESETS_SUBDIR: &str = "presets";

/// Returns the user configuration directory.
///
/// Falls back to the current directory if the platform has none.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user presets directory.
pub fn user_presets_dir() -> PathBuf {
    user_config_dir().join(PRESETS_SUBDIR)
}

/// Ensure the user presets directory exists.
pub fn ensure_user_presets_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_presets_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}

/// Find a preset file.
///
/// `name` may be a path to a TOML file, or a preset name (with or without
/// `.toml`) looked up in `dir`.
pub fn find_preset_in(dir: &Path, name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    let candidate = dir.join(filename);
    candidate.is_file().then_some(candidate)
}

/// Find a preset file, searching the user presets directory.
pub fn find_preset(name: &str) -> Option<PathBuf> {
    find_preset_in(&user_presets_dir(), name)
}

/// Resolve a preset name to a configuration.
///
/// Files (explicit paths, then user presets) take precedence over factory
/// presets of the same name.
pub fn load_preset(name: &str) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = find_preset(name) {
        return EngineConfig::load(path);
    }
    get_factory_preset(name).ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))
}

/// TOML files in the user presets directory.
///
/// Returns an empty list when the directory is missing or unreadable.
pub fn list_user_presets() -> Vec<PathBuf> {
    list_presets_in_dir(&user_presets_dir())
}

/// TOML files directly inside `dir`, sorted by path.
pub fn list_presets_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut presets: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    presets.sort();
    presets
}

/// Preset name from a file path: the file stem.
///
/// ```rust
/// use synthualizer_config::preset_name_from_path;
/// use std::path::Path;
///
/// assert_eq!(preset_name_from_path(Path::new("/presets/warm-lead.toml")).as_deref(), Some("warm-lead"));
/// ```
pub fn preset_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}
