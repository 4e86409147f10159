use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{client::DEFAULT_TIMEOUT, event::NativeErrorKind, queue::get_root_queue_dir};

pub const ENV_DSN: &str = "FAULTLINE_DSN";
pub const ENV_ENVIRONMENT: &str = "FAULTLINE_ENV";
pub const ENV_ERROR_MASK: &str = "FAULTLINE_ERROR_MASK";
pub const ENV_CACHE_DIR: &str = "FAULTLINE_CACHE_DIR";
pub const ENV_TIMEOUT_SECS: &str = "FAULTLINE_TIMEOUT_SECS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Connection string for the ingestion API. Capture is disabled without it.
    pub dsn: Option<String>,
    /// Label merged into every event, to tell several installations apart
    pub environment: Option<String>,
    /// Bitmask of native error codes eligible for capture
    pub error_mask: u32,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            error_mask: NativeErrorKind::ALL,
            cache_dir: get_root_queue_dir(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `FAULTLINE_*` environment variables. Unparseable numbers keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            dsn: non_empty(ENV_DSN),
            environment: non_empty(ENV_ENVIRONMENT),
            error_mask: non_empty(ENV_ERROR_MASK)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.error_mask),
            cache_dir: non_empty(ENV_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            timeout_secs: non_empty(ENV_TIMEOUT_SECS)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether native errors with `code` should be captured
    pub fn wants(&self, code: u32) -> bool {
        self.error_mask & code != 0
    }
}
