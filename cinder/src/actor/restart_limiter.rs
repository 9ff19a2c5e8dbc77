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

//! Exponential backoff with jitter and an attempt limit.
//!
//! Used by [`AccidentRecord::exponential_backoff_restart`](crate::actor::AccidentRecord::exponential_backoff_restart)
//! to space out restarts of a failing actor, and by persistent actors to
//! space out save retries.
//!
//! ```rust,ignore
//! let policy = RestartLimiterConfig {
//!     restart_limit: 3,
//!     base_delay_ms: 100,
//!     max_delay_ms: 1_000,
//!     multiplier: 2.0,
//!     jitter: 0.5,
//! };
//! record.exponential_backoff_restart(&policy);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff parameters: `delay = min(max, base * multiplier^attempt + (u - 0.5) * jitter * base)`
/// with `u` uniform in `[0, 1)`, clamped below at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartLimiterConfig {
    /// Attempts allowed for one failure chain before the actor is killed instead.
    pub restart_limit: u32,

    /// Delay before the first attempt, in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound on any delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor per attempt.
    pub multiplier: f64,

    /// Jitter amplitude as a fraction of the base delay.
    pub jitter: f64,
}

impl Default for RestartLimiterConfig {
    fn default() -> Self {
        Self {
            restart_limit: 3,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl RestartLimiterConfig {
    /// Get the base delay.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Get the maximum delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Whether `attempts` already used up the limit.
    #[must_use]
    pub fn limit_reached(&self, attempts: usize) -> bool {
        attempts >= self.restart_limit as usize
    }

    /// Delay before attempt number `attempt` (zero based), with a fresh jitter sample.
    #[must_use]
    pub fn next_delay(&self, attempt: usize) -> Duration {
        self.delay_with_sample(attempt, rand::random::<f64>())
    }

    /// Delay before attempt number `attempt` for a given jitter sample in `[0, 1)`.
    #[must_use]
    pub fn delay_with_sample(&self, attempt: usize, sample: f64) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let base = self.base_delay_ms as f64;
        #[allow(clippy::cast_precision_loss)]
        let max = self.max_delay_ms as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = base * self.multiplier.powi(exponent) + (sample - 0.5) * self.jitter * base;
        let clamped = if delay.is_finite() { delay.clamp(0.0, max) } else { max };
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let millis = clamped.round() as u64;
        Duration::from_millis(millis)
    }
}
