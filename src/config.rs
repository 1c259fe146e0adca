//! Configuration management for the prediction service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable that points at an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "IRIS_CONFIG";

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line friendly output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface or hostname to bind (all interfaces by default)
    pub host: String,
    /// TCP port
    pub port: u16,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the serialized model, resolved relative to the working directory
    pub path: String,
    /// Intra-op threads for ONNX Runtime sessions
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level for this crate when RUST_LOG is unset (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json)
    #[serde(default)]
    pub format: LogFormat,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables periodic reporting
    pub report_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from `IRIS_CONFIG` or the default file, then the environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path
    ///
    /// The file is optional; built-in defaults apply to anything it leaves out,
    /// and `IRIS_<SECTION>__<KEY>` variables override both.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = AppConfig::default();

        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("model.path", defaults.model.path)?
            .set_default("model.onnx_threads", defaults.model.onnx_threads as i64)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", "pretty")?
            .set_default(
                "metrics.report_interval_secs",
                defaults.metrics.report_interval_secs as i64,
            )?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("IRIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            model: ModelConfig {
                path: "models/iris_forest.json".to_string(),
                onnx_threads: default_onnx_threads(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
        }
    }
}
