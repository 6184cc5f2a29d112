//! Logging setup
//!
//! Installs a `tracing-subscriber` registry with a reloadable level filter,
//! a stdout layer and, when the cache directory is writable, a file layer
//! appending to `<cache dir>/hisame/log/hisame.log`.
//!
//! Level precedence: `HISAME_LOG_LEVEL` > settings file `log_level` > info.
//! The settings file is read after logging starts, so its level is applied
//! later through `Logging::set_level`, which leaves an env-provided level
//! alone unless told to bypass it.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use tracing::{Level, Subscriber, debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Env var that pins the log level
pub const LOG_LEVEL_ENV: &str = "HISAME_LOG_LEVEL";

pub const DEFAULT_LEVEL: Level = Level::INFO;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Handle to the installed subscriber.
///
/// Logs a shutdown line when dropped.
pub struct Logging {
    filter: FilterHandle,
    current: Mutex<Level>,
    log_file: Option<PathBuf>,
}

/// Why the env var did not yield a level.
#[derive(Debug, PartialEq, Eq)]
enum EnvLevelError {
    NotSet,
    Invalid(String),
}

/// Install the global subscriber and return the handle used to change the
/// level later.
pub fn init() -> Logging {
    let env_level = level_from_env();
    let level = match &env_level {
        Ok(level) => *level,
        Err(_) => DEFAULT_LEVEL,
    };

    let (log_file, file, file_error) = match open_log_file() {
        Ok((path, file)) => (Some(path), Some(file), None),
        Err(reason) => (None, None, Some(reason)),
    };

    let (subscriber, filter) = build_subscriber(level, file);
    if let Err(e) = subscriber.try_init() {
        eprintln!("hisame: could not install log subscriber: {e}");
    }

    if let Err(EnvLevelError::Invalid(raw)) = &env_level {
        warn!(
            value = %raw,
            env = LOG_LEVEL_ENV,
            default = %DEFAULT_LEVEL,
            "invalid log level in environment, using default"
        );
    }
    match (&log_file, file_error) {
        (Some(path), _) => debug!(path = %path.display(), "logging to file"),
        (None, Some(reason)) => warn!(%reason, "file logging disabled"),
        (None, None) => {}
    }
    info!("===== Welcome to Hisame (log level: {level}) =====");

    Logging {
        filter,
        current: Mutex::new(level),
        log_file,
    }
}

impl Logging {
    /// Active level.
    pub fn level(&self) -> Level {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// File the logs are mirrored to, if any.
    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Change the active level.
    ///
    /// Unless `bypass_env` is set, a valid `HISAME_LOG_LEVEL` takes
    /// precedence and the level is left unchanged.
    pub fn set_level(&self, level: Level, bypass_env: bool) {
        if !bypass_env && level_from_env().is_ok() {
            info!(
                env = LOG_LEVEL_ENV,
                current = %self.level(),
                "log level not changed because the environment pins it"
            );
            return;
        }

        if let Err(e) = self.filter.reload(filter_for(level)) {
            warn!(error = %e, "could not change log level");
            return;
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = level;
        info!("log level set to {level}");
    }

    /// Apply a level taken from the settings file.
    ///
    /// An unparseable value is logged and ignored.
    pub fn apply_configured_level(&self, raw: &str) {
        match parse_level(raw) {
            Some(level) => self.set_level(level, false),
            None => warn!(
                value = raw,
                current = %self.level(),
                "invalid log level in configuration, continuing with current level"
            ),
        }
    }
}

impl Drop for Logging {
    fn drop(&mut self) {
        info!("Hisame is shutting down");
    }
}

/// Parse a level name. Accepts the tracing names plus `warning`, and maps
/// `fatal`/`panic` to error.
pub fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        "fatal" | "panic" => Some(Level::ERROR),
        other => Level::from_str(other).ok(),
    }
}

fn level_from_env() -> Result<Level, EnvLevelError> {
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            parse_level(&raw).ok_or(EnvLevelError::Invalid(raw))
        }
        _ => Err(EnvLevelError::NotSet),
    }
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

fn build_subscriber(
    level: Level,
    file: Option<File>,
) -> (impl Subscriber + Send + Sync + 'static, FilterHandle) {
    let (filter, handle) = reload::Layer::new(filter_for(level));

    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer);

    (subscriber, handle)
}

fn open_log_file() -> Result<(PathBuf, File), String> {
    let cache = dirs::cache_dir().ok_or("could not determine cache directory")?;
    let path = cache.join("hisame").join("log").join("hisame.log");

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| format!("creating log directory: {e}"))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("opening log file: {e}"))?;

    Ok((path, file))
}
