//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "APPRAISE_ROOT_FOLDER";

/// Default database file name inside the root folder
pub const DEFAULT_DATABASE_FILE: &str = "appraise.db";

/// Default log level when neither config nor RUST_LOG set one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Sub-folder of the root folder holding uploaded HIT XML files
pub const XML_FOLDER: &str = "xml";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub log_level: Option<String>,
    pub database_file: Option<String>,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load the platform config file, falling back to defaults when none exists
    pub fn load_or_default() -> Self {
        match load_config_file() {
            Ok(path) => match Self::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn database_file(&self) -> &str {
        self.database_file.as_deref().unwrap_or(DEFAULT_DATABASE_FILE)
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &config.root_folder {
        return PathBuf::from(root_folder);
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    // Try the per-user config first, then /etc/appraise/config.toml on unix
    let user_config = dirs::config_dir().map(|d| d.join("appraise").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/appraise/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\appraise
        dirs::data_local_dir()
            .map(|d| d.join("appraise"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\appraise"))
    } else {
        // ~/.local/share/appraise, ~/Library/Application Support/appraise
        dirs::data_local_dir()
            .map(|d| d.join("appraise"))
            .unwrap_or_else(|| PathBuf::from("./appraise_data"))
    }
}

/// Derives well-known paths below a resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder and XML sub-folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.xml_folder())?;
        Ok(())
    }

    pub fn database_path(&self, config: &TomlConfig) -> PathBuf {
        self.root_folder.join(config.database_file())
    }

    pub fn xml_folder(&self) -> PathBuf {
        self.root_folder.join(XML_FOLDER)
    }
}
