//! # Settings Loader
//!
//! Builds the read-only [`Settings`] object once at process start. The server
//! constructs it explicitly and hands an `Arc<Settings>` to whatever needs it;
//! there is no global instance.
//!
//! ## Sources
//! - [`LoadMode::File`]: the first existing `config.json` along
//!   [`Settings::search_paths`], decoded with `serde_json`.
//! - [`LoadMode::Test`]: the built-in [`Settings::test_fixture`], no disk access.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::sections::*;
use crate::utils::path_exists;

const CONFIG_FILE_NAME: &str = "config.json";

/// Environment switch read by [`LoadMode::from_env`].
pub const RUNNING_MODE_ENV: &str = "RUNNING_MODE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("no config.json found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("load file config failed ({path}): {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("load json config failed ({path}): {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unknown running mode: {0}")]
    UnknownMode(String),
}

/// Where the settings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Read `config.json` from the search path.
    #[default]
    File,
    /// Use the in-memory fixture.
    Test,
}

impl FromStr for LoadMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "file" | "debug" | "release" => Ok(LoadMode::File),
            "test" => Ok(LoadMode::Test),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl LoadMode {
    /// Reads [`RUNNING_MODE_ENV`]; unset means [`LoadMode::File`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(RUNNING_MODE_ENV) {
            Ok(mode) => mode.parse(),
            Err(_) => Ok(LoadMode::File),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # Settings
///
/// Root of the service configuration. Each section maps to one JSON object of
/// `config.json`; missing sections and fields fall back to their defaults.
pub struct Settings {
    /// Server settings.
    pub common: CommonSettings,
    /// Cache settings.
    pub redis: RedisSettings,
    /// Relational store settings.
    pub mysql: MySqlSettings,
    /// Search engine settings.
    pub elastic: ElasticSettings,
    /// Logger settings.
    pub logger: LoggerSettings,
    /// Token settings.
    pub jwt: JwtSettings,
}

impl Settings {
    /// Loads settings according to `mode`.
    pub fn load(mode: LoadMode) -> Result<Self, ConfigError> {
        match mode {
            LoadMode::Test => {
                tracing::info!("Using in-memory test settings fixture");
                Ok(Self::test_fixture())
            }
            LoadMode::File => {
                let searched = Self::search_paths()?;
                let path = Self::locate(&searched).ok_or(ConfigError::NotFound { searched })?;
                Self::from_file(path)
            }
        }
    }

    /// The fixed list of candidate locations, nearest first.
    pub fn search_paths() -> Result<Vec<PathBuf>, ConfigError> {
        let pwd = env::current_dir()?;
        let mut paths: Vec<PathBuf> = (0..6)
            .map(|depth| {
                let mut p = PathBuf::from(".");
                for _ in 0..depth {
                    p.push("..");
                }
                p.join(CONFIG_FILE_NAME)
            })
            .collect();
        if let Some(parent) = pwd.parent() {
            paths.push(parent.join("..").join(CONFIG_FILE_NAME));
        }
        Ok(paths)
    }

    /// Returns the first candidate that exists.
    pub fn locate(paths: &[PathBuf]) -> Option<PathBuf> {
        paths
            .iter()
            .find(|p| path_exists(p).unwrap_or(false))
            .cloned()
    }

    /// Reads and decodes one settings file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("load config template path : {}", path.display());

        let data = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&data).map_err(|source| ConfigError::JsonError {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!("load config template : {}", settings);
        Ok(settings)
    }

    /// Decodes settings from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Settings used under test: local backends, a test database and a
    /// console-only logger.
    pub fn test_fixture() -> Self {
        Settings {
            common: CommonSettings {
                mode: MODE_TEST.to_string(),
                host: "127.0.0.1".to_string(),
                port: 8080,
                sys_name: "es-search".to_string(),
                ..Default::default()
            },
            redis: RedisSettings {
                address: "127.0.0.1".to_string(),
                port: 6379,
                password: String::new(),
                database: 0,
            },
            mysql: MySqlSettings {
                address: "127.0.0.1".to_string(),
                port: 3306,
                username: "root".to_string(),
                password: String::new(),
                database: "fobrain_test".to_string(),
                charset: "utf8mb4".to_string(),
                log_level: "debug".to_string(),
                slow_time: 15,
            },
            elastic: ElasticSettings {
                address: "127.0.0.1".to_string(),
                port: 9200,
                username: String::new(),
                password: String::new(),
                sniff: false,
            },
            logger: LoggerSettings {
                level: "info".to_string(),
                output_console: true,
                output_file: false,
                file_name: "../logs/logs.log".to_string(),
                ..Default::default()
            },
            jwt: JwtSettings::default(),
        }
    }

    /// Server section.
    pub fn common(&self) -> CommonSettings {
        self.common.clone()
    }

    /// Cache section.
    pub fn redis(&self) -> RedisSettings {
        self.redis.clone()
    }

    /// Relational store section.
    pub fn mysql(&self) -> MySqlSettings {
        self.mysql.clone()
    }

    /// Search engine section.
    pub fn elastic(&self) -> ElasticSettings {
        self.elastic.clone()
    }

    /// Logger section; console output is always on for the main logger.
    pub fn logger(&self) -> LoggerSettings {
        LoggerSettings {
            output_console: true,
            ..self.logger.clone()
        }
    }

    /// Token section.
    pub fn jwt(&self) -> JwtSettings {
        self.jwt.clone()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "*****"
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings
    Common: mode={} host={} port={} app={} version={}
    Redis: {}:{} db={} password={}
    MySQL: {}@{}:{}/{} charset={} password={}
    Elastic: {} sniff={} username={} password={}
    Logger: level={} console={} file={} ({})
    Jwt: expire={}m key={}
",
            self.common.mode,
            self.common.host,
            self.common.port,
            self.common.sys_name,
            self.common.version,
            self.redis.address,
            self.redis.port,
            self.redis.database,
            mask(&self.redis.password),
            self.mysql.username,
            self.mysql.address,
            self.mysql.port,
            self.mysql.database,
            self.mysql.charset,
            mask(&self.mysql.password),
            self.elastic.url(),
            self.elastic.sniff,
            self.elastic.username,
            mask(&self.elastic.password),
            self.logger.level,
            self.logger.output_console,
            self.logger.output_file,
            self.logger.file_name,
            self.jwt.expire,
            mask(&self.jwt.key),
        )
    }
}
