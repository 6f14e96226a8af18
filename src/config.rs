//! Client configuration from environment variables
//!
//! Controls RPC timeouts, the change-notification throttle window, the
//! operation poll interval and where the settings file lives.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Per-request timeout for node RPC calls
    pub rpc_timeout: Duration,
    /// Window of the throttled change channel
    pub throttle_window: Duration,
    /// Interval between operation status polls
    pub poll_interval: Duration,
    /// Pause after a failed import before moving to the next address
    pub import_retry_pause: Duration,
    /// Pause before contribution paging reports completion
    pub settle_pause: Duration,
    /// Location of the persisted settings file
    pub settings_path: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ZMONKEY_RPC_TIMEOUT_SECS`: RPC timeout in seconds (default 10)
    /// - `ZMONKEY_THROTTLE_MS`: throttle window in milliseconds (default 500)
    /// - `ZMONKEY_POLL_MS`: operation poll interval in milliseconds (default 2000)
    /// - `ZMONKEY_SETTINGS`: settings file path
    ///   (default `$HOME/.config/zcash-monkey/settings.json`)
    ///
    /// # Examples
    ///
    /// ```bash
    /// ZMONKEY_SETTINGS=./settings.json zcash-monkey info
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let rpc_timeout = env_millis("ZMONKEY_RPC_TIMEOUT_SECS", 1000)
            .unwrap_or(defaults.rpc_timeout);
        let throttle_window =
            env_millis("ZMONKEY_THROTTLE_MS", 1).unwrap_or(defaults.throttle_window);
        let poll_interval = env_millis("ZMONKEY_POLL_MS", 1).unwrap_or(defaults.poll_interval);

        let settings_path = env::var("ZMONKEY_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or(defaults.settings_path);
        log::debug!("Settings file: {}", settings_path.display());

        Self {
            rpc_timeout,
            throttle_window,
            poll_interval,
            import_retry_pause: defaults.import_retry_pause,
            settle_pause: defaults.settle_pause,
            settings_path,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(10),
            throttle_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(2000),
            import_retry_pause: Duration::from_millis(2000),
            settle_pause: Duration::from_millis(100),
            settings_path: default_settings_path(),
        }
    }
}

/// Read a positive numeric env var and scale it to a duration in milliseconds
fn env_millis(key: &str, scale: u64) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            log::warn!("Ignoring zero {}", key);
            None
        }
        Ok(value) => Some(Duration::from_millis(value.saturating_mul(scale))),
        Err(_) => {
            log::warn!("Ignoring non-numeric {}={:?}", key, raw);
            None
        }
    }
}

fn default_settings_path() -> PathBuf {
    let base = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|_| PathBuf::from("."));
    base.join("zcash-monkey").join("settings.json")
}
