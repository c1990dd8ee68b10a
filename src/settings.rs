use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::{Result, ThumbnailError};

const SETTINGS_DIR: &str = "canvas-thumbnails";
const SETTINGS_FILE: &str = "data.json";

/// Per-side offsets added around the thumbnail. A missing side counts as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraMargin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<i32>,
}

impl ExtraMargin {
    pub fn to_css(&self) -> String {
        format!(
            "{}px {}px {}px {}px",
            self.top.unwrap_or(0),
            self.right.unwrap_or(0),
            self.bottom.unwrap_or(0),
            self.left.unwrap_or(0)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThumbnailSettings {
    pub size: u32,
    pub border_radius: u32,
    pub extra_margin: ExtraMargin,
    pub enable_real_time_update: bool,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            size: 32,
            border_radius: 10,
            extra_margin: ExtraMargin {
                top: Some(0),
                right: Some(4),
                bottom: Some(0),
                left: Some(0),
            },
            enable_real_time_update: true,
        }
    }
}

impl ThumbnailSettings {
    /// Shallow-merge a persisted blob over the defaults: every top-level key
    /// present in `saved` replaces the default wholesale. A key whose value
    /// does not fit keeps its default without affecting the others.
    pub fn merged_over_defaults(saved: Option<Value>) -> Self {
        let mut settings = Self::default();
        let saved = match saved {
            Some(Value::Object(saved)) => saved,
            Some(other) => {
                warn!(blob = %other, "ignoring settings blob that is not an object");
                return settings;
            }
            None => return settings,
        };

        for (key, value) in saved {
            let applied = match key.as_str() {
                "size" => pixels(&value).map(|px| settings.size = px).is_some(),
                "borderRadius" => pixels(&value).map(|px| settings.border_radius = px).is_some(),
                "extraMargin" => ExtraMargin::deserialize(&value)
                    .map(|margin| settings.extra_margin = margin)
                    .is_ok(),
                "enableRealTimeUpdate" => value
                    .as_bool()
                    .map(|enabled| settings.enable_real_time_update = enabled)
                    .is_some(),
                _ => {
                    debug!(key = %key, "ignoring unknown setting");
                    true
                }
            };
            if !applied {
                warn!(key = %key, value = %value, "invalid setting, keeping its default");
            }
        }
        settings
    }
}

/// Any finite non-negative JSON number, rounded to whole pixels.
fn pixels(value: &Value) -> Option<u32> {
    let px = value.as_f64()?;
    if px.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&px) {
        Some(px.round() as u32)
    } else {
        None
    }
}

pub trait SettingsStore: Send + Sync {
    /// The persisted blob, or `None` when nothing was ever saved.
    fn load(&self) -> Result<Option<Value>>;

    fn save(&self, data: &Value) -> Result<()>;
}

pub fn load_settings<S: SettingsStore + ?Sized>(store: &S) -> ThumbnailSettings {
    match store.load() {
        Ok(saved) => ThumbnailSettings::merged_over_defaults(saved),
        Err(e) => {
            warn!(error = %e, "failed to load settings, using defaults");
            ThumbnailSettings::default()
        }
    }
}

pub fn save_settings<S: SettingsStore + ?Sized>(store: &S, settings: &ThumbnailSettings) -> Result<()> {
    let data = serde_json::to_value(settings)?;
    store.save(&data)?;
    debug!("settings saved");
    Ok(())
}

pub fn default_settings_path() -> PathBuf {
    let config_home = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));

    config_home.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

/// Settings persisted as a pretty-printed JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, e: impl std::fmt::Display) -> ThumbnailError {
        ThumbnailError::SettingsPersistence(format!("{}: {}", self.path.display(), e))
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, data: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.persistence_error(e))?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content).map_err(|e| self.persistence_error(e))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Option<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }

    pub fn saved(&self) -> Option<Value> {
        self.data.read().ok().and_then(|data| data.clone())
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Value>> {
        let data = self
            .data
            .read()
            .map_err(|_| ThumbnailError::SettingsPersistence("lock poisoned".to_owned()))?;
        Ok(data.clone())
    }

    fn save(&self, data: &Value) -> Result<()> {
        let mut slot = self
            .data
            .write()
            .map_err(|_| ThumbnailError::SettingsPersistence("lock poisoned".to_owned()))?;
        *slot = Some(data.clone());
        Ok(())
    }
}
