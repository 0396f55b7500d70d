//! Process logging bootstrap.
//!
//! # Responsibility
//! - Start rolling file logs once per process from [`StoreConfig`].
//! - Record which backend and storage mode the process was started with.
//!
//! # Invariants
//! - Starting again with the same directory and level is a no-op; any other
//!   combination is rejected.
//! - Panic events carry the source location only, never the payload.
//! - Events carry ids, counts and durations only; never credentials.

use crate::config::StoreConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "schooldesk";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: LogLevel,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Verbosity accepted in `SCHOOLDESK_LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Case-insensitive; `warning` is accepted for `warn`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level used when the configuration names none: `debug` in debug builds,
/// `info` otherwise.
pub fn default_log_level() -> LogLevel {
    if cfg!(debug_assertions) {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Starts logging from store configuration.
///
/// Returns `Ok(false)` without side effects when no log directory is
/// configured.
///
/// # Side effects
/// - Emits `app_start` with the crate version, backend and storage mode.
pub fn init_from_config(config: &StoreConfig) -> Result<bool, String> {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return Ok(false);
    };
    let level = config.log_level.unwrap_or_else(default_log_level);
    init_logging(level, log_dir)?;
    info!(
        "event=app_start module=logging status=ok version={} backend={} storage={}",
        env!("CARGO_PKG_VERSION"),
        config.backend.kind(),
        config.backend.storage()
    );
    Ok(true)
}

/// Starts rolling file logs under `log_dir`.
///
/// # Errors
/// - `log_dir` is relative or cannot be created.
/// - Logging already runs with a different directory or level.
pub fn init_logging(level: LogLevel, log_dir: &Path) -> Result<(), String> {
    if !log_dir.is_absolute() {
        return Err(format!(
            "log directory must be absolute, got `{}`",
            log_dir.display()
        ));
    }

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(level, log_dir))?;
    if state.log_dir != log_dir {
        return Err(format!(
            "logging already writes to `{}`; refusing `{}`",
            state.log_dir.display(),
            log_dir.display()
        ));
    }
    if state.level != level {
        return Err(format!(
            "logging already runs at `{}`; refusing `{level}`",
            state.level
        ));
    }
    Ok(())
}

fn start_logger(level: LogLevel, log_dir: &Path) -> Result<LoggingState, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let logger = Logger::try_with_str(level.as_str())
        .map_err(|err| format!("invalid log specification `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={}",
        log_dir.display()
    );

    Ok(LoggingState {
        level,
        log_dir: log_dir.to_path_buf(),
        _logger: logger,
    })
}

// Runs inside the one-time logger start, so the hook is installed once.
fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payloads can echo usernames or passwords passed by callers.
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let thread = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        error!("event=panic_captured module=logging status=error location={location} thread={thread}");
        previous_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::{default_log_level, init_from_config, init_logging, LogLevel};
    use crate::config::{BackendConfig, StoreConfig};
    use crate::db::DbTarget;
    use std::path::{Path, PathBuf};

    fn config(log_dir: Option<PathBuf>) -> StoreConfig {
        StoreConfig {
            backend: BackendConfig::Sqlite {
                target: DbTarget::Memory,
            },
            admin_secret: None,
            log_level: Some(LogLevel::Info),
            log_dir,
        }
    }

    #[test]
    fn log_level_parse_accepts_known_values() {
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse(" warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert!(matches!(
            default_log_level(),
            LogLevel::Debug | LogLevel::Info
        ));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let error = init_logging(LogLevel::Info, Path::new("logs/dev"))
            .expect_err("relative paths must be rejected");
        assert!(error.contains("absolute"));
    }

    #[test]
    fn init_from_config_without_log_dir_is_a_no_op() {
        assert_eq!(init_from_config(&config(None)), Ok(false));
    }

    #[test]
    fn init_from_config_is_idempotent_and_rejects_conflicts() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let other = tempfile::tempdir().expect("temp dir should be created");

        assert_eq!(init_from_config(&config(Some(dir.path().to_path_buf()))), Ok(true));
        assert_eq!(init_from_config(&config(Some(dir.path().to_path_buf()))), Ok(true));

        let level_error = init_logging(LogLevel::Trace, dir.path())
            .expect_err("level conflict should fail");
        assert!(level_error.contains("refusing"));

        let dir_error = init_from_config(&config(Some(other.path().to_path_buf())))
            .expect_err("directory conflict should fail");
        assert!(dir_error.contains("refusing"));
    }
}
