//! Configuration loading and management
//!
//! Handles parsing of `tasklens.toml`. Every field has a default, so an
//! empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::retry::RetryPolicy;

pub const CONFIG_FILE_NAME: &str = "tasklens.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Analytics refresh job
    #[serde(default = "JobConfig::refresh")]
    pub refresh: JobConfig,

    /// Retention sweep job
    #[serde(default = "JobConfig::sweep")]
    pub sweep: JobConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Directory relative paths resolve against. Not read from the file.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            refresh: JobConfig::refresh(),
            sweep: JobConfig::sweep(),
            log: LogConfig::default(),
            base_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tasklens.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local; only useful inside `serve` or an embedding program.
    Memory,
    /// Shared by every process pointed at the same directory.
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Directory for the file backend
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: default_cache_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Schedule and retry settings for a periodic job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobConfig {
    /// Time between cycles, e.g. "6h". Unset means the job's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Attempts per step, including the first
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,
}

pub const REFRESH_INTERVAL: &str = "6h";
pub const SWEEP_INTERVAL: &str = "24h";

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay() -> String {
    "5s".to_string()
}

impl JobConfig {
    pub fn refresh() -> Self {
        Self::every(REFRESH_INTERVAL)
    }

    pub fn sweep() -> Self {
        Self::every(SWEEP_INTERVAL)
    }

    fn every(interval: &str) -> Self {
        Self {
            interval: Some(interval.to_string()),
            attempts: default_attempts(),
            retry_delay: default_retry_delay(),
        }
    }

    /// Configured interval, or `fallback` when the section leaves it out.
    pub fn period_or(&self, fallback: &str) -> Result<Duration> {
        parse_duration(self.interval.as_deref().unwrap_or(fallback))
    }

    pub fn policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new(self.attempts, parse_duration(&self.retry_delay)?))
    }

    fn validate(&self, section: &str, fallback: &str) -> Result<()> {
        let period = self
            .period_or(fallback)
            .map_err(|err| Error::InvalidConfig(format!("{section}.interval: {err}")))?;
        if period.is_zero() {
            return Err(Error::InvalidConfig(format!("{section}.interval must be > 0")));
        }
        if self.attempts == 0 {
            return Err(Error::InvalidConfig(format!("{section}.attempts must be >= 1")));
        }
        parse_duration(&self.retry_delay)
            .map_err(|err| Error::InvalidConfig(format!("{section}.retry_delay: {err}")))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional JSONL event output; "-" means stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            events: None,
        }
    }
}

impl Config {
    /// Load configuration from a `tasklens.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Load an explicit file, or the per-user config if it exists, or the
    /// defaults. An explicit path that does not exist is an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(dirs) = project_dirs() {
            let path = dirs.config_dir().join(CONFIG_FILE_NAME);
            if path.exists() {
                let mut config = Self::load(&path)?;
                config.base_dir = Some(dirs.data_dir().to_path_buf());
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        self.refresh.validate("refresh", REFRESH_INTERVAL)?;
        self.sweep.validate("sweep", SWEEP_INTERVAL)?;
        if self.log.level.trim().is_empty() {
            return Err(Error::InvalidConfig("log.level cannot be empty".to_string()));
        }
        if self.cache.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig("cache.lock_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Resolve `path` against the base directory. Absolute paths are kept.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let base = self
            .base_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(path)
    }

    pub fn refresh_period(&self) -> Result<Duration> {
        self.refresh.period_or(REFRESH_INTERVAL)
    }

    pub fn sweep_period(&self) -> Result<Duration> {
        self.sweep.period_or(SWEEP_INTERVAL)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.cache.dir)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "tasklens")
}

/// Parse a duration like `90s`, `15m`, `6h`, `1d` or `2w`. `ms` is accepted
/// for sub-second values. A bare number is minutes.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::InvalidArgument("duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, "m"),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid duration number: '{num_str}'")))?;

    let secs = |factor: u64| Duration::from_secs(num.saturating_mul(factor));
    let duration = match unit.trim().to_lowercase().as_str() {
        "ms" => Duration::from_millis(num),
        "s" | "sec" | "second" | "seconds" => secs(1),
        "m" | "min" | "minute" | "minutes" => secs(60),
        "h" | "hr" | "hour" | "hours" => secs(3600),
        "d" | "day" | "days" => secs(86_400),
        "w" | "week" | "weeks" => secs(604_800),
        other => {
            return Err(Error::InvalidArgument(format!(
                "invalid duration unit '{other}' (expected ms, s, m, h, d, w)"
            )));
        }
    };
    Ok(duration)
}
