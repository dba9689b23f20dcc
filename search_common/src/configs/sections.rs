use serde::{Deserialize, Serialize};

/// Server mode: verbose request logging.
pub const MODE_DEBUG: &str = "debug";
/// Server mode: production.
pub const MODE_RELEASE: &str = "release";
/// Server mode: test harness.
pub const MODE_TEST: &str = "test";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # Common Settings
///
/// Process-wide settings of the HTTP API server.
pub struct CommonSettings {
    /// One of `debug`, `release` or `test`.
    pub mode: String,
    /// Listening port.
    pub port: u16,
    /// Listening host.
    pub host: String,
    /// Disables captcha checks when set to a truthy string.
    pub close_captcha: String,
    /// Product name.
    #[serde(rename = "app_name")]
    pub sys_name: String,
    /// Copyright line reported by `/version`.
    pub copyright: String,
    /// Product version.
    pub version: String,
    /// Root of the storage directory, e.g. `./storage`.
    #[serde(rename = "root_storage")]
    pub storage_path: String,
    /// Disables token authentication when set to a truthy string.
    pub close_auth_token: String,
}

impl CommonSettings {
    /// True when the server runs in `debug` mode.
    pub fn is_debug(&self) -> bool {
        self.mode.eq_ignore_ascii_case(MODE_DEBUG)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # Redis Settings
pub struct RedisSettings {
    /// Host name or IP of the redis server.
    pub address: String,
    /// Port of the redis server.
    pub port: u16,
    /// Optional password, empty for none.
    pub password: String,
    /// Logical database index.
    pub database: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # MySQL Settings
pub struct MySqlSettings {
    /// Host name or IP of the MySQL server.
    pub address: String,
    /// Port of the MySQL server.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Schema to select.
    pub database: String,
    /// Connection charset, e.g. `utf8mb4`.
    pub charset: String,
    /// Statement log level (`debug`, `info`, `warn`, `error`, `silent`).
    #[serde(rename = "log-level")]
    pub log_level: String,
    /// Statements slower than this many milliseconds are logged as slow.
    #[serde(rename = "slow-time")]
    pub slow_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # Search Engine Settings
pub struct ElasticSettings {
    /// Host name or IP of the seed node.
    pub address: String,
    /// HTTP port of the seed node.
    pub port: u16,
    /// Basic auth user, empty for none.
    pub username: String,
    /// Basic auth password.
    pub password: String,
    /// Discover the cluster's nodes from the seed before serving requests.
    pub sniff: bool,
}

impl ElasticSettings {
    /// Base URL of the seed node, e.g. `http://127.0.0.1:9200`.
    ///
    /// An address that already carries a scheme is kept as is.
    pub fn url(&self) -> String {
        if self.address.starts_with("http://") || self.address.starts_with("https://") {
            format!("{}:{}", self.address.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.address, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # Logger Settings
///
/// Controls the level and the sinks of the structured logger.
pub struct LoggerSettings {
    /// Minimum level: `debug`, `info`, `warn`, `error`, `dpanic`, `panic`, `fatal`.
    pub level: String,
    /// Write to stdout.
    pub output_console: bool,
    /// Write to the size-rotating log file.
    pub output_file: bool,
    /// Path of the log file; the directory part is created when missing.
    pub file_name: String,
    /// Rotate the log file once it reaches this many megabytes; 0 means 100.
    pub max_size: u64,
    /// Delete rotated files older than this many days; 0 keeps them.
    pub max_age: u64,
    /// Number of rotated files retained next to the active one; 0 keeps all.
    pub max_backups: usize,
    /// Render timestamps in `time_zone` rather than UTC.
    pub local_time: bool,
    /// Gzip rotated files.
    pub compress: bool,
    /// IANA zone used for timestamps when `local_time` is set.
    pub time_zone: String,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output_console: true,
            output_file: false,
            file_name: "./logs/logs.log".to_string(),
            max_size: 64,
            max_age: 30,
            max_backups: 5,
            local_time: true,
            compress: true,
            time_zone: "Asia/Shanghai".to_string(),
        }
    }
}

impl LoggerSettings {
    /// Copy with console output turned off, used by scheduled jobs whose
    /// output only belongs in the log file.
    pub fn without_console(&self) -> Self {
        Self {
            output_console: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// # Token Settings
pub struct JwtSettings {
    /// Token lifetime in minutes.
    pub expire: u64,
    /// Signing key.
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elastic_url_adds_scheme_when_missing() {
        let es = ElasticSettings {
            address: "127.0.0.1".into(),
            port: 9200,
            ..Default::default()
        };
        assert_eq!(es.url(), "http://127.0.0.1:9200");

        let tls = ElasticSettings {
            address: "https://search.internal/".into(),
            port: 443,
            ..Default::default()
        };
        assert_eq!(tls.url(), "https://search.internal:443");
    }

    #[test]
    fn test_mysql_uses_dashed_json_keys() {
        let raw = r#"{"address":"db","port":3306,"log-level":"warn","slow-time":200}"#;
        let mysql: MySqlSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(mysql.log_level, "warn");
        assert_eq!(mysql.slow_time, 200);
        assert!(mysql.username.is_empty());
    }

    #[test]
    fn test_without_console_keeps_other_fields() {
        let logger = LoggerSettings {
            level: "debug".into(),
            output_file: true,
            ..Default::default()
        };
        let quiet = logger.without_console();
        assert!(!quiet.output_console);
        assert!(quiet.output_file);
        assert_eq!(quiet.level, "debug");
    }
}
