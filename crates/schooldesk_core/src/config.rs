//! Environment-driven store configuration.

use crate::db::DbTarget;
use crate::logging::LogLevel;
use crate::mirror::DEFAULT_COMPACT_EVERY;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

pub const ENV_BACKEND: &str = "SCHOOLDESK_BACKEND";
pub const ENV_DB_PATH: &str = "SCHOOLDESK_DB_PATH";
pub const ENV_SNAPSHOT_DIR: &str = "SCHOOLDESK_SNAPSHOT_DIR";
pub const ENV_COMPACT_EVERY: &str = "SCHOOLDESK_COMPACT_EVERY";
pub const ENV_DEMO_FIXTURES: &str = "SCHOOLDESK_DEMO_FIXTURES";
pub const ENV_ADMIN_SECRET: &str = "SCHOOLDESK_ADMIN_SECRET";
pub const ENV_LOG_LEVEL: &str = "SCHOOLDESK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SCHOOLDESK_LOG_DIR";

const EPHEMERAL_SNAPSHOT_DIR: &str = ":memory:";

#[derive(Debug)]
pub enum ConfigError {
    MissingEnv(&'static str),
    InvalidValue(&'static str, String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnv(name) => write!(f, "missing required environment variable: {name}"),
            Self::InvalidValue(name, reason) => write!(f, "invalid value for {name}: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Which backend a deployment uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Sqlite {
        target: DbTarget,
    },
    Mirror {
        /// `None` keeps snapshots in process memory only.
        snapshot_dir: Option<PathBuf>,
        compact_every: usize,
        demo_fixtures: bool,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Mirror { .. } => "mirror",
        }
    }

    /// Whether the backend keeps its data on disk or in process memory.
    pub fn storage(&self) -> &'static str {
        match self {
            Self::Sqlite {
                target: DbTarget::File(_),
            }
            | Self::Mirror {
                snapshot_dir: Some(_),
                ..
            } => "file",
            Self::Sqlite {
                target: DbTarget::Memory,
            }
            | Self::Mirror {
                snapshot_dir: None, ..
            } => "memory",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    pub admin_secret: Option<String>,
    /// `None` falls back to [`crate::logging::default_log_level`].
    pub log_level: Option<LogLevel>,
    pub log_dir: Option<PathBuf>,
}

impl Debug for StoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let backend = match non_empty(&env_map, ENV_BACKEND).unwrap_or("sqlite") {
            "sqlite" => {
                let path = non_empty(&env_map, ENV_DB_PATH)
                    .ok_or(ConfigError::MissingEnv(ENV_DB_PATH))?;
                BackendConfig::Sqlite {
                    target: DbTarget::from_path(path),
                }
            }
            "mirror" => {
                let dir = non_empty(&env_map, ENV_SNAPSHOT_DIR)
                    .ok_or(ConfigError::MissingEnv(ENV_SNAPSHOT_DIR))?;
                let snapshot_dir = if dir == EPHEMERAL_SNAPSHOT_DIR {
                    None
                } else {
                    Some(PathBuf::from(dir))
                };
                BackendConfig::Mirror {
                    snapshot_dir,
                    compact_every: parse_compact_every(&env_map)?,
                    demo_fixtures: parse_bool(&env_map, ENV_DEMO_FIXTURES, true)?,
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(
                    ENV_BACKEND,
                    format!("must be sqlite or mirror, got {other}"),
                ))
            }
        };

        Ok(Self {
            backend,
            admin_secret: non_empty(&env_map, ENV_ADMIN_SECRET).map(str::to_string),
            log_level: parse_log_level(&env_map)?,
            log_dir: non_empty(&env_map, ENV_LOG_DIR).map(PathBuf::from),
        })
    }
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    env_map
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_compact_every(env_map: &HashMap<String, String>) -> Result<usize, ConfigError> {
    let Some(raw) = non_empty(env_map, ENV_COMPACT_EVERY) else {
        return Ok(DEFAULT_COMPACT_EVERY);
    };
    match raw.parse::<usize>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            ENV_COMPACT_EVERY,
            format!("must be a positive integer, got {raw}"),
        )),
    }
}

fn parse_log_level(env_map: &HashMap<String, String>) -> Result<Option<LogLevel>, ConfigError> {
    let Some(raw) = non_empty(env_map, ENV_LOG_LEVEL) else {
        return Ok(None);
    };
    LogLevel::parse(raw).map(Some).ok_or_else(|| {
        ConfigError::InvalidValue(
            ENV_LOG_LEVEL,
            format!("must be trace, debug, info, warn or error, got {raw}"),
        )
    })
}

fn parse_bool(
    env_map: &HashMap<String, String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match non_empty(env_map, name).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            name,
            format!("must be true or false, got {other}"),
        )),
    }
}
