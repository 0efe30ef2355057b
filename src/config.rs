use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub build: BuildConfig,
    pub retry: RetryConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BuildConfig {
    /// Rows per committed write batch
    pub batch_size: usize,
    /// Longest ancestor chain walked before the chain is treated as corrupt
    pub max_depth: usize,
    /// Delay between publishing a version and dropping its predecessor
    pub grace_period_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub listen: String,
    pub timeout_ms: u64,
    /// Feed directory watched by the server; rebuilds run in-process when set
    pub feed_dir: Option<PathBuf>,
    pub refresh_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/addressok"),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_depth: 64,
            grace_period_secs: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:14000".to_string(),
            timeout_ms: 2000,
            feed_dir: None,
            refresh_secs: 3600,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl BuildConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.build.batch_size == 0 {
            return Err(Error::Config("build.batch_size must be positive".into()));
        }
        if self.build.max_depth == 0 {
            return Err(Error::Config("build.max_depth must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be positive".into()));
        }
        if self.query.feed_dir.is_some() && self.query.refresh_secs == 0 {
            return Err(Error::Config("query.refresh_secs must be positive".into()));
        }
        Ok(())
    }
}
