//! Server configuration from environment variables.
//!
//! | Variable            | Default                         |
//! |---------------------|---------------------------------|
//! | `DAYPLAN_DB_PATH`   | `<temp dir>/dayplan.sqlite3`    |
//! | `DAYPLAN_BIND_ADDR` | `127.0.0.1:8787`                |
//! | `DAYPLAN_LOG_LEVEL` | `debug` (debug) / `info` (release) |
//! | `DAYPLAN_LOG_DIR`   | unset: log to stderr only       |
//!
//! Blank values count as unset.

use dayplan_core::{default_log_level, LogConfig};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "DAYPLAN_DB_PATH";
pub const ENV_BIND_ADDR: &str = "DAYPLAN_BIND_ADDR";
pub const ENV_LOG_LEVEL: &str = "DAYPLAN_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DAYPLAN_LOG_DIR";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_DB_FILE_NAME: &str = "dayplan.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidBindAddr { value: String, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBindAddr { value, reason } => {
                write!(f, "invalid {ENV_BIND_ADDR} `{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_raw = read(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::InvalidBindAddr {
                value: bind_raw.clone(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            bind_addr,
            log_level: read(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        })
    }

    /// Logging settings for the server process; file output is mirrored to
    /// stderr.
    pub fn log_config(&self) -> LogConfig {
        match &self.log_dir {
            Some(dir) => LogConfig::files(&self.log_level, dir).with_stderr_duplicate(),
            None => LogConfig::stderr(&self.log_level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServerConfig, ENV_BIND_ADDR, ENV_DB_PATH, ENV_LOG_DIR};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let config = config_from(&[(ENV_BIND_ADDR, "  ")]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8787");
        assert!(config.db_path.ends_with("dayplan.sqlite3"));
        assert_eq!(config.log_dir, None);
        assert!(config.log_config().log_dir.is_none());
    }

    #[test]
    fn explicit_values_are_used() {
        let config = config_from(&[
            (ENV_BIND_ADDR, "0.0.0.0:9000"),
            (ENV_DB_PATH, "/var/lib/dayplan/app.db"),
            (ENV_LOG_DIR, "/var/log/dayplan"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/dayplan/app.db"));
        let log_config = config.log_config();
        assert_eq!(log_config.log_dir, Some(PathBuf::from("/var/log/dayplan")));
        assert!(log_config.duplicate_to_stderr);
    }

    #[test]
    fn malformed_bind_addr_is_rejected() {
        let err = config_from(&[(ENV_BIND_ADDR, "localhost")]).unwrap_err();
        assert!(err.to_string().contains("DAYPLAN_BIND_ADDR"));
    }
}
