use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::PipelineDefinition;
use crate::models::DataService;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub optimization: OptimizationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// JSON file declaring pipelines and the data services over them.
    pub definitions_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizationConfig {
    /// Per-activation timeout; an activation still unresolved after this
    /// long is treated as not applicable.
    pub activation_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("services.definitions_path", "./services.json")?
            .set_default("optimization.activation_timeout_ms", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        // Load from environment variables
        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(path) = env::var("DEFINITIONS_PATH") {
            builder = builder.set_override("services.definitions_path", path)?;
        }

        if let Ok(timeout) = env::var("ACTIVATION_TIMEOUT_MS") {
            builder = builder.set_override(
                "optimization.activation_timeout_ms",
                timeout.parse::<u64>().unwrap_or(5000),
            )?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        // Try to load from .env file
        let _ = dotenv::dotenv();

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.optimization.activation_timeout_ms)
    }
}

/// Startup definitions: the pipelines the engine knows about and the data
/// services exposed over them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
    #[serde(default)]
    pub services: Vec<DataService>,
}

impl Definitions {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let definitions = serde_json::from_str(&raw)?;
        Ok(definitions)
    }
}
