//! Configuration collaborator
//!
//! The restart coordinator does not parse configuration itself; it asks a
//! [`ConfigSource`] to reload from its original source and to replay the
//! originally captured process arguments. [`FileConfigSource`] is the
//! file-backed implementation with format auto-detection (YAML, TOML, JSON,
//! INI, RON, JSON5); [`StaticConfigSource`] covers hosts without a config
//! file.

use config::{Config as Cfg, File, FileFormat};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// The configuration collaborator consumed by the restart coordinator.
pub trait ConfigSource: Send + Sync {
    /// Re-load configuration from its original source.
    fn reload(&self) -> ConfigResult<()>;

    /// The process arguments captured at startup, replayed verbatim to the
    /// application entry point on every restart.
    fn args(&self) -> Vec<String>;
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// File-backed configuration source.
///
/// Remembers the path it was first loaded from; [`ConfigSource::reload`]
/// re-reads that same file, replacing the previously parsed values
/// wholesale.
pub struct FileConfigSource {
    path: PathBuf,
    args: Vec<String>,
    values: RwLock<serde_json::Value>,
}

impl FileConfigSource {
    /// Load configuration from `path`, capturing the current process
    /// arguments.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        Self::load_with_args(path, std::env::args().collect())
    }

    /// Load configuration from `path` with explicitly captured arguments.
    pub fn load_with_args<P: AsRef<Path>>(path: P, args: Vec<String>) -> ConfigResult<Self> {
        let source = Self {
            path: path.as_ref().to_path_buf(),
            args,
            values: RwLock::new(serde_json::Value::Null),
        };
        source.reload()?;
        Ok(source)
    }

    /// The path configuration is (re)loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a typed value by key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.read();
        values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl ConfigSource for FileConfigSource {
    fn reload(&self) -> ConfigResult<()> {
        let format = detect_format(&self.path)?;
        debug!("Reloading configuration from {:?}", self.path);

        let cfg = Cfg::builder()
            .add_source(File::from(self.path.as_path()).format(format))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let parsed: serde_json::Value = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        *self.values.write() = parsed;
        info!("Configuration reloaded from {:?}", self.path);
        Ok(())
    }

    fn args(&self) -> Vec<String> {
        self.args.clone()
    }
}

/// Configuration source for hosts without an external config file.
///
/// Reload is a no-op; only the captured arguments matter.
pub struct StaticConfigSource {
    args: Vec<String>,
}

impl StaticConfigSource {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    /// Capture the current process arguments.
    pub fn from_env() -> Self {
        Self::new(std::env::args().collect())
    }
}

impl ConfigSource for StaticConfigSource {
    fn reload(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn args(&self) -> Vec<String> {
        self.args.clone()
    }
}
