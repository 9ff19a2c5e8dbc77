/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::actor::RestartLimiterConfig;

/// Configuration for the Cinder runtime.
///
/// Loaded from `config.toml` in the XDG config directory (`$XDG_CONFIG_HOME/cinder/`);
/// every section and every key falls back to its default when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CinderConfig {
    /// Identity and observability of this runtime instance
    pub system: SystemConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Watch heartbeat configuration
    pub watch: WatchConfig,
    /// Parameters of the default supervisor's backoff restarts
    pub supervision: RestartLimiterConfig,
    /// Retry policy for persistent actors
    pub persistence: PersistenceConfig,
}

/// Identity and observability of this runtime instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Host name used in every local address
    pub host: String,
    /// Handlers running longer than this are logged; zero disables the check
    pub slow_message_threshold_ms: u64,
}

/// Timeout-related configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ask timeout applied when the caller does not pass one
    pub ask_default_ms: u64,
    /// How long a graceful shutdown may take before it is reported as timed out
    pub system_shutdown_ms: u64,
}

/// Watch heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Period between pings to a watched actor
    pub heartbeat_interval_ms: u64,
    /// How long a ping may go unanswered before the target counts as lost
    pub heartbeat_timeout_ms: u64,
}

/// Retry policy for persistent actors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Save attempts after the first failure before giving up
    pub retry_limit: u32,
    /// Delay before the first retry
    pub retry_base_ms: u64,
    /// Upper bound on any retry delay
    pub retry_max_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            slow_message_threshold_ms: 0,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ask_default_ms: 1_000,
            system_shutdown_ms: 30_000,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 3_000,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_base_ms: 50,
            retry_max_ms: 1_000,
        }
    }
}

impl PersistenceConfig {
    /// The retry schedule as a backoff policy without jitter.
    pub fn retry_policy(&self) -> RestartLimiterConfig {
        RestartLimiterConfig {
            restart_limit: self.retry_limit,
            base_delay_ms: self.retry_base_ms,
            max_delay_ms: self.retry_max_ms,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

impl CinderConfig {
    /// Default ask timeout as a `Duration`
    pub const fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.ask_default_ms)
    }

    /// Graceful shutdown timeout as a `Duration`
    pub const fn system_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.system_shutdown_ms)
    }

    /// Heartbeat period as a `Duration`
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.watch.heartbeat_interval_ms)
    }

    /// Heartbeat reply timeout as a `Duration`
    pub const fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.watch.heartbeat_timeout_ms)
    }

    /// Slow message threshold, `None` when disabled
    pub const fn slow_message_threshold(&self) -> Option<Duration> {
        match self.system.slow_message_threshold_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed TOML or mistyped values.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `cinder/config.toml` under `$XDG_CONFIG_HOME` (falling back to
    /// `~/.config`) and then the XDG config dirs. A missing file yields the
    /// defaults; an unreadable or malformed one is logged and also yields the defaults.
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("cinder") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("config.toml") else {
            info!("No configuration file found, using defaults");
            return Self::default();
        };

        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(text) => match Self::from_toml_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Global configuration instance loaded from XDG-compliant locations
    pub static ref CONFIG: CinderConfig = CinderConfig::load();
}
