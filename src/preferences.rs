//! Per-user preference profiles persisted as one JSON file

use crate::orchestration::UserPreferences;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// JSON file mapping usernames to their saved preferences
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every saved profile. A missing file is an empty store.
    pub fn load_all(&self) -> Result<BTreeMap<String, UserPreferences>, PreferenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load(&self, username: &str) -> Result<UserPreferences, PreferenceError> {
        Ok(self.load_all()?.remove(username).unwrap_or_default())
    }

    /// Replace one user's profile, keeping the others.
    ///
    /// An unreadable file is moved aside to `*.json.corrupt` and a fresh one is written.
    pub fn save(&self, username: &str, preferences: &UserPreferences) -> Result<(), PreferenceError> {
        let mut all = match self.load_all() {
            Ok(all) => all,
            Err(PreferenceError::Serialization(e)) => {
                let backup = self.path.with_extension("json.corrupt");
                tracing::warn!(
                    error = %e,
                    backup = %backup.display(),
                    "preference file unreadable, starting a new one"
                );
                std::fs::rename(&self.path, &backup).map_err(|e| self.io_error(e))?;
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        all.insert(username.to_string(), preferences.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&all)?).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(user = %username, path = %self.path.display(), "preferences saved");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> PreferenceError {
        PreferenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Set one preference from a `key=value` style pair
pub fn apply_setting(prefs: &mut UserPreferences, key: &str, value: &str) -> Result<(), PreferenceError> {
    let value = value.trim();
    let invalid = || PreferenceError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    match key.trim() {
        "distance" | "distance_km" => prefs.distance_km = Some(value.parse().map_err(|_| invalid())?),
        "duration" | "duration_hours" => prefs.duration_hours = Some(value.parse().map_err(|_| invalid())?),
        "difficulty" => {
            let level: u8 = match value.to_lowercase().as_str() {
                "easy" => 0,
                "medium" => 1,
                "hard" => 2,
                other => other.parse().map_err(|_| invalid())?,
            };
            if level > 2 {
                return Err(invalid());
            }
            prefs.difficulty = Some(level);
        }
        "activity" => prefs.activity = Some(value.to_string()),
        "activities" | "preferred_activities" => {
            prefs.preferred_activities = value
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
        }
        "location" => prefs.location = Some(value.to_string()),
        _ => return Err(PreferenceError::UnknownKey(key.to_string())),
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid preference file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown preference '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}
