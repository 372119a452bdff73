use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, YomuError};
use crate::models::{FeedScope, MigrationFlags};

/// Root application configuration, loaded from `~/.config/yomu/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub feed: FeedConfig,
    pub migration: MigrationConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub max_global_entries: usize,
    pub max_source_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Raw bitmask, see [`MigrationFlags`].
    pub default_flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, `RUST_LOG` wins when set.
    pub filter: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("yomu");
        Self {
            data_dir: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_global_entries: 20,
            max_source_entries: 20,
        }
    }
}

impl FeedConfig {
    /// Maximum number of entries in the given list.
    pub fn limit_for(&self, scope: FeedScope) -> usize {
        match scope {
            FeedScope::Global => self.max_global_entries,
            FeedScope::Source(_) => self.max_source_entries,
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            default_flags: MigrationFlags::DEFAULT.bits(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/yomu/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("YOMU_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("yomu")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(dir) = std::env::var("YOMU_DATA_DIR") {
            config.set_data_dir(dir.into());
        }
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.max_global_entries == 0 || self.feed.max_source_entries == 0 {
            return Err(YomuError::ConfigError(
                "feed limits must be greater than zero".to_string(),
            ));
        }
        if self.core.data_dir.trim().is_empty() {
            return Err(YomuError::ConfigError("core.data_dir is empty".to_string()));
        }
        Ok(())
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.core.data_dir = dir.to_string_lossy().to_string();
    }

    pub fn default_migration_flags(&self) -> MigrationFlags {
        MigrationFlags::from_bits(self.migration.default_flags)
    }

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.core.data_dir).join("yomu.db")
    }
}
