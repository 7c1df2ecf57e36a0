//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SAU_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SAU_ROOT_FOLDER";

/// Environment variable naming an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "SAU_CONFIG";

/// Resolves the data root folder from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value from the command line, if any
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Value from the `root_folder` key of the TOML config, if any
    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    /// Resolve the root folder; never fails, falls back to the compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!("Root folder from config file: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!("Root folder (compiled default): {}", path.display());
        path
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sau (or /var/lib/sau for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sau"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sau"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("sau"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sau"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("sau"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sau"))
    } else {
        PathBuf::from("./sau_data")
    }
}

/// Default TOML config path for a module, e.g. `~/.config/sau/sau-login.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sau").join(format!("{}.toml", module_name)))
}

/// Pick the TOML file to read: explicit path, then `SAU_CONFIG`, then the module default
pub fn resolve_config_path(explicit: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path)),
        _ => default_config_path(module_name),
    }
}

/// Load a TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but does not parse is a configuration error.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Layout of files under the resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the root, database and cookie directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            info!("Creating root folder: {}", self.root.display());
        }
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.root.join("db"))?;
        std::fs::create_dir_all(self.root.join("cookies"))?;
        Ok(())
    }

    /// SQLite database holding the account table
    pub fn database_path(&self) -> PathBuf {
        self.root.join("db").join("database.db")
    }

    /// Resolve a stored relative path (e.g. a credential file) against the root
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}
