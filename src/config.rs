//! Application-level configuration loading for the leaderboard and lifecycle tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PUZZLE_BACK_CONFIG_PATH";

const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
const DEFAULT_CONFLICT_RETRIES: u32 = 3;
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum number of rows returned by a leaderboard query.
    pub leaderboard_limit: usize,
    /// How many times a lifecycle transaction is retried after a storage write conflict.
    pub conflict_retries: u32,
    /// Upper bound for a single lifecycle operation, `None` disables the limit.
    pub operation_timeout: Option<Duration>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        leaderboard_limit = app_config.leaderboard_limit,
                        conflict_retries = app_config.conflict_retries,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            operation_timeout: Some(DEFAULT_OPERATION_TIMEOUT),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every key is optional; absent keys keep their default.
struct RawConfig {
    leaderboard_limit: Option<usize>,
    conflict_retries: Option<u32>,
    /// Milliseconds; `0` disables the timeout.
    operation_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let operation_timeout = match value.operation_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.operation_timeout,
        };

        Self {
            leaderboard_limit: value
                .leaderboard_limit
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.leaderboard_limit),
            conflict_retries: value.conflict_retries.unwrap_or(defaults.conflict_retries),
            operation_timeout,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
