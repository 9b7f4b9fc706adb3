use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Identifier used to compute per-app configuration directories.
#[derive(Clone, Copy)]
pub struct AppId {
    /// Reverse-DNS style qualifier, e.g. `"com"`.
    pub qualifier: &'static str,
    /// Organization or vendor name, e.g. `"local"`.
    pub organization: &'static str,
    /// Application name, e.g. `"itemsweep"`.
    pub application: &'static str,
}

/// Shared by the daemon and the CLI so both edit the same `config.toml`.
pub const APP: AppId = AppId { qualifier: "com", organization: "local", application: "itemsweep" };

/// Application settings persisted to `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Tracing level to use if `RUST_LOG` is not set (e.g. `"info"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Message language; selects `messages_<language>.toml`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Auto-clear schedule.
    #[serde(rename = "auto-clear", default)]
    pub auto_clear: AutoClearSettings,
    /// Warning countdown before each sweep.
    #[serde(default)]
    pub countdown: CountdownSettings,
}

/// `[auto-clear]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoClearSettings {
    /// Whether the repeating sweep is switched on.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Interval text, e.g. `"30m"` or `"1d2h"`.
    #[serde(default = "default_interval")]
    pub interval: String,
}

/// `[countdown]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownSettings {
    /// Seconds of warning before a sweep. Negative values are rejected on load.
    #[serde(rename = "start-at", default = "default_start_at")]
    pub start_at: i64,
}

fn default_log_level() -> String { "info".to_string() }
fn default_language() -> String { "en".to_string() }
fn default_enabled() -> bool { true }
fn default_interval() -> String { "30m".to_string() }
fn default_start_at() -> i64 { 10 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            language: default_language(),
            auto_clear: AutoClearSettings::default(),
            countdown: CountdownSettings::default(),
        }
    }
}

impl Default for AutoClearSettings {
    fn default() -> Self {
        Self { enabled: default_enabled(), interval: default_interval() }
    }
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self { start_at: default_start_at() }
    }
}

/// Where settings are loaded from and saved to.
pub trait SettingsStore: Send + Sync + 'static {
    /// Read the current settings.
    fn load(&self) -> Result<Settings>;
    /// Replace the stored settings.
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// Settings kept in a TOML file.
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    /// Store backed by `path`; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `config.toml` in the app config dir.
    pub fn for_app(app: &AppId) -> Result<Self> {
        Ok(Self::new(config_dir(app)?.join("config.toml")))
    }

    /// File this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, writing defaults first if it is missing.
    pub fn load_or_init(&self) -> Result<Settings> {
        if self.path.exists() {
            self.load()
        } else {
            let settings = Settings::default();
            self.save(&settings)?;
            Ok(settings)
        }
    }
}

impl SettingsStore for TomlFileStore {
    fn load(&self) -> Result<Settings> {
        let txt = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let settings: Settings = toml::from_str(&txt)
            .with_context(|| format!("parse {}", self.path.display()))?;
        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(settings)?;
        // Write temp then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, s).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Settings held in memory.
#[derive(Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
}

impl MemoryStore {
    /// Store seeded with `settings`.
    pub fn new(settings: Settings) -> Self {
        Self { settings: Mutex::new(settings) }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }
}

/// Return the configuration directory for this app, creating it if needed.
pub fn config_dir(app: &AppId) -> Result<PathBuf> {
    let pd = ProjectDirs::from(app.qualifier, app.organization, app.application)
        .ok_or_else(|| anyhow::anyhow!("failed to resolve ProjectDirs"))?;
    let dir = pd.config_dir().to_path_buf();
    fs::create_dir_all(&dir).with_context(|| format!("create config dir {}", dir.display()))?;
    Ok(dir)
}
