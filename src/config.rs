//! Layered configuration
//!
//! Built-in defaults, then an optional TOML file, then `LANW_` environment
//! variables (`LANW_CAPTURE__SNAP_LENGTH=1500`). Command-line flags are
//! applied on top by the caller.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analyzers::WorkerOptions;
use crate::collectors::{CaptureParams, PacketLimit};

pub const DEFAULT_CONFIG_FILE: &str = "lanw.toml";
pub const ENV_PREFIX: &str = "LANW";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Falls back to the system default device
    pub device: Option<String>,
    pub promiscuous: bool,
    pub snap_length: i32,
    pub read_timeout_ms: i32,
    pub filter: String,
    /// 0 = unbounded
    pub packet_limit: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            promiscuous: true,
            snap_length: 65536,
            read_timeout_ms: 1000,
            filter: String::new(),
            packet_limit: 0,
        }
    }
}

impl CaptureConfig {
    pub fn params(&self, device: &str) -> CaptureParams {
        CaptureParams {
            device: device.to_string(),
            promiscuous: self.promiscuous,
            snap_length: self.snap_length,
            read_timeout_ms: self.read_timeout_ms,
            filter: self.filter.clone(),
            packet_limit: PacketLimit::from(self.packet_limit),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ports_file: PathBuf,
    pub resolve_names: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ports_file: PathBuf::from("ports.txt"),
            resolve_names: true,
        }
    }
}

impl AnalysisConfig {
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            ports_file: self.ports_file.clone(),
            resolve_names: self.resolve_names,
        }
    }
}

impl AppConfig {
    /// Loads `path` (or `lanw.toml` when absent; the file is optional) and
    /// the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let required = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::load_layered(path, required, environment())
    }

    /// Same layering with an explicit environment source
    ///
    /// Not validated: callers apply their overrides first, then call `validate`.
    pub fn load_layered(path: &Path, required: bool, env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Parse and validate a TOML document (no environment layer)
    pub fn load_from_str(s: &str) -> Result<Self> {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.capture.snap_length > 0,
            "capture.snap_length must be > 0, got {}",
            self.capture.snap_length
        );
        anyhow::ensure!(
            self.capture.read_timeout_ms > 0,
            "capture.read_timeout_ms must be > 0, got {}",
            self.capture.read_timeout_ms
        );
        anyhow::ensure!(
            !self.analysis.ports_file.as_os_str().is_empty(),
            "analysis.ports_file must be non-empty"
        );
        Ok(())
    }
}

/// `LANW_` variables; `__` separates nested keys
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
