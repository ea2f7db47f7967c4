/// Notification settings port.
///
/// Settings belong to the surrounding application. The core only reads them
/// through [`SettingsPort::load`] at the start of an evaluation and never
/// mutates what it was given. Invalid overrides are rejected at load/save
/// time as configuration errors.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::model::{HazardError, NotificationSettings};

pub trait SettingsPort: Send + Sync {
    fn load(&self) -> Result<NotificationSettings, HazardError>;
    fn save(&self, settings: &NotificationSettings) -> Result<(), HazardError>;
}

/// Settings held for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    settings: Mutex<NotificationSettings>,
}

impl MemorySettings {
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsPort for MemorySettings {
    fn load(&self) -> Result<NotificationSettings, HazardError> {
        Ok(self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, settings: &NotificationSettings) -> Result<(), HazardError> {
        settings.validate()?;
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }
}

/// Settings stored as a TOML file; a missing file means defaults.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsPort for TomlSettingsStore {
    fn load(&self) -> Result<NotificationSettings, HazardError> {
        if !self.path.exists() {
            return Ok(NotificationSettings::default());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            HazardError::Configuration(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let settings: NotificationSettings = toml::from_str(&contents).map_err(|e| {
            HazardError::Configuration(format!("failed to parse {}: {}", self.path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn save(&self, settings: &NotificationSettings) -> Result<(), HazardError> {
        settings.validate()?;
        let body = toml::to_string_pretty(settings)
            .map_err(|e| HazardError::Configuration(format!("failed to encode settings: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                HazardError::Persistence(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(&self.path, body).map_err(|e| {
            HazardError::Persistence(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}
