//! Configuration management for chainport
//!
//! The node configuration lives at `<home>/config/config.toml`. Only the keys
//! that locate the stores are read; everything else in the file is ignored.

use crate::error::{MigrationError, Result};
use crate::persistence::BackendType;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "config";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_HOME_DIR: &str = ".chaind";
pub const TARGET_NAMESPACE: &str = "rollup";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Node home directory; relative store paths resolve against it.
    #[serde(skip)]
    pub root_dir: PathBuf,
    #[serde(default)]
    pub db_backend: BackendType,
    #[serde(default = "default_db_dir")]
    pub db_dir: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Whether the node discarded ABCI responses after applying blocks.
    #[serde(default)]
    pub discard_abci_responses: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// Home directory of the target store; defaults to the node home.
    #[serde(default)]
    pub target_root_dir: Option<PathBuf>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            target_root_dir: None,
            namespace: default_namespace(),
        }
    }
}

impl Config {
    /// Defaults used when no config file is present.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            db_backend: BackendType::default(),
            db_dir: default_db_dir(),
            storage: StorageConfig::default(),
            migration: MigrationConfig::default(),
        }
    }

    /// Directory holding the source block and state stores.
    pub fn db_dir_path(&self) -> PathBuf {
        rootify(&self.db_dir, &self.root_dir)
    }

    pub fn target_root_dir(&self) -> &Path {
        self.migration
            .target_root_dir
            .as_deref()
            .unwrap_or(&self.root_dir)
    }

    /// Directory holding the target store.
    pub fn target_db_dir_path(&self) -> PathBuf {
        rootify(&self.db_dir, self.target_root_dir())
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_dir.is_empty() {
            return Err(MigrationError::Config("db_dir must be set".to_string()));
        }
        if self.migration.namespace.is_empty() {
            return Err(MigrationError::Config(
                "migration.namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads `<home>/config/config.toml`, falling back to defaults when the file is absent.
pub fn load_config(root_dir: &Path) -> Result<Config> {
    let path = root_dir.join(CONFIG_DIR).join(CONFIG_FILE);
    let config_str = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        String::new()
    };

    let mut config: Config = if config_str.trim().is_empty() {
        Config::with_root(root_dir)
    } else {
        toml::from_str(&config_str)?
    };
    config.root_dir = root_dir.to_path_buf();

    config.validate()?;
    Ok(config)
}

/// `$HOME/.chaind`, or the relative directory when no home is known.
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_HOME_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME_DIR))
}

fn rootify(path: &str, root: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn default_db_dir() -> String {
    "data".to_string()
}

fn default_namespace() -> String {
    TARGET_NAMESPACE.to_string()
}
