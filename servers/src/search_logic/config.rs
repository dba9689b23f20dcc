use std::path::PathBuf;

use clap::Parser;
use search_common::configs::{ConfigError, LoadMode, Settings};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// # Application Configuration
///
/// Command-line arguments and environment variables of the search API
/// server. Everything else comes from `config.json`.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "HTTP API server in front of the search engine, MySQL and Redis."
)]
#[clap(long_about = None)]
pub struct AppConfig {
    /// Where settings come from: `file` (config.json search order) or `test`
    /// (built-in fixture).
    #[clap(long, env = "RUNNING_MODE", default_value = "file")]
    pub running_mode: String,

    /// Explicit config.json path, bypassing the search order.
    #[clap(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Overrides `common.host`.
    #[clap(long, env = "HOST")]
    pub host: Option<String>,

    /// Overrides `common.port`.
    #[clap(long, env = "PORT")]
    pub port: Option<u16>,
}

impl AppConfig {
    /// Loads settings and applies the command-line overrides.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = match &self.config_file {
            Some(path) => Settings::from_file(path)?,
            None => Settings::load(self.running_mode.parse::<LoadMode>()?)?,
        };
        if let Some(host) = &self.host {
            settings.common.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.common.port = port;
        }
        Ok(settings)
    }

    /// `host:port` to listen on, with defaults for unset values.
    pub fn bind_addr(settings: &Settings) -> String {
        let host = if settings.common.host.is_empty() {
            DEFAULT_HOST
        } else {
            settings.common.host.as_str()
        };
        let port = if settings.common.port == 0 {
            DEFAULT_PORT
        } else {
            settings.common.port
        };
        format!("{}:{}", host, port)
    }
}
