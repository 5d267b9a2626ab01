//! Configuration file support for the advisor

use crate::orchestration::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Zero keeps routing reproducible for identical input
    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// OAuth access token with the `calendar.readonly` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Table or view queried for activities
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_select")]
    pub select: String,

    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default = "default_preferences_path")]
    pub path: PathBuf,

    #[serde(default = "default_username")]
    pub username: String,
}

// Defaults

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_weather_endpoint() -> String {
    "https://wttr.in".to_string()
}

fn default_calendar_endpoint() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_table() -> String {
    "random_hiking_routes".to_string()
}

fn default_select() -> String {
    "title, region, length_m, difficulty".to_string()
}

fn default_limit() -> u32 {
    5
}

fn default_preferences_path() -> PathBuf {
    config_dir().join("preferences.json")
}

fn default_username() -> String {
    std::env::var("USER").unwrap_or_else(|_| "default".to_string())
}

/// Directory holding the config file and the preference store
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("adventure-advisor"))
        .unwrap_or_else(|| PathBuf::from(".adventure-advisor"))
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_weather_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            endpoint: default_calendar_endpoint(),
            calendar_id: default_calendar_id(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: default_table(),
            select: default_select(),
            default_limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
            username: default_username(),
        }
    }
}

impl AdvisorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load the explicit file if given, else `config.toml` in the config dir
    /// when it exists, else defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = config_dir().join("config.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from environment-style lookups
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(url) = lookup("SUPABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_API_KEY") {
            self.database.api_key = Some(key);
        }
        if let Some(token) = lookup("GOOGLE_CALENDAR_TOKEN") {
            self.calendar.access_token = Some(token);
        }
        if let Some(user) = lookup("ADVISOR_USER") {
            self.preferences.username = user;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
