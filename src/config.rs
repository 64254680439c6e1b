use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::Mode;
use crate::default_config::DEFAULT_CONFIG_TOML;
use crate::error::ConfigError;
use crate::fs_io::{home_dir, read_text_file, write_text_file_atomic};

const APP_DIR: &str = ".arkchat";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub local: LocalConfig,
    pub conversation: ConversationConfig,
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            api_key: Some(String::new()),
            default_model: Some(String::new()),
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    /// The configured default model, ignoring blanks.
    pub fn model(&self) -> Option<String> {
        self.default_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_secs: u64,
    pub parallel: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:11434".to_string(),
            timeout_secs: 300,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub history_window: usize,
    pub listing_depth: usize,
    pub default_mode: Mode,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            listing_depth: 3,
            default_mode: Mode::Ask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub transcript_bg: Rgb,
    pub insights_bg: Rgb,
    pub input_bg: Rgb,
    pub status_bg: Rgb,
    pub text_fg: Rgb,
    pub muted_fg: Rgb,
    pub active_fg: Rgb,
    pub accent_fg: Rgb,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            transcript_bg: Rgb::new(30, 32, 36),
            insights_bg: Rgb::new(36, 38, 43),
            input_bg: Rgb::new(46, 49, 56),
            status_bg: Rgb::new(24, 26, 30),
            text_fg: Rgb::new(222, 224, 228),
            muted_fg: Rgb::new(150, 155, 165),
            active_fg: Rgb::new(255, 255, 255),
            accent_fg: Rgb::new(120, 180, 255),
        }
    }
}

pub fn app_dir() -> Result<PathBuf, ConfigError> {
    home_dir()
        .map(|home| home.join(APP_DIR))
        .map_err(|_| ConfigError::NoHome)
}

pub fn expand_home(raw_path: &str) -> Result<PathBuf, ConfigError> {
    if raw_path == "~" {
        return home_dir().map_err(|_| ConfigError::NoHome);
    }
    if let Some(rest) = raw_path.strip_prefix("~/") {
        return Ok(home_dir().map_err(|_| ConfigError::NoHome)?.join(rest));
    }
    Ok(PathBuf::from(raw_path))
}

/// The on-disk configuration file. Loading fills in any keys missing from
/// the user's file and writes the merged result back.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn user_default() -> Result<Self, ConfigError> {
        Ok(Self::at(app_dir()?.join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let existing = self.read_existing()?;
        let merged = merge_with_defaults(existing.as_deref())?;
        let merged_text = toml::to_string_pretty(&merged)?;
        if existing.as_deref() != Some(merged_text.as_str()) {
            debug!(path = %self.path.display(), "writing merged config");
            self.write(&merged_text)?;
        }
        Ok(merged.try_into()?)
    }

    /// Sets `[section] key = value` and persists the file atomically.
    pub fn set_value(
        &self,
        section: &str,
        key: &str,
        value: impl Into<toml::Value>,
    ) -> Result<(), ConfigError> {
        let mut merged = merge_with_defaults(self.read_existing()?.as_deref())?;
        if let toml::Value::Table(root) = &mut merged {
            let entry = root
                .entry(section.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            if let toml::Value::Table(table) = entry {
                table.insert(key.to_string(), value.into());
            }
        }
        self.write(&toml::to_string_pretty(&merged)?)
    }

    fn read_existing(&self) -> Result<Option<String>, ConfigError> {
        match read_text_file(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&self, text: &str) -> Result<(), ConfigError> {
        write_text_file_atomic(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn merge_with_defaults(user_text: Option<&str>) -> Result<toml::Value, ConfigError> {
    let mut merged = parse_table(DEFAULT_CONFIG_TOML)?;
    merge_tables(&mut merged, parse_table(user_text.unwrap_or_default())?);
    Ok(merged)
}

fn parse_table(text: &str) -> Result<toml::Value, ConfigError> {
    if text.trim().is_empty() {
        return Ok(toml::Value::Table(toml::map::Map::new()));
    }
    Ok(toml::from_str(text)?)
}

fn merge_tables(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base_map), toml::Value::Table(override_map)) => {
            for (key, item) in override_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_tables(slot, item),
                    None => {
                        base_map.insert(key, item);
                    }
                }
            }
        }
        (slot, item) => *slot = item,
    }
}

#[cfg(test)]
#[path = "../tests/unit/config_tests.rs"]
mod tests;
