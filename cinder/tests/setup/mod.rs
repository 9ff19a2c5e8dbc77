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

use std::sync::Once;
use std::time::{Duration, Instant};

use cinder::prelude::*;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod actors;
pub mod messages;

pub use actors::{recorder, recorder_failing_relaunch, Journal, Recorder};
pub use messages::*;

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests, writing to `logs/cinder_tests.txt`.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        std::fs::create_dir_all("logs").expect("could not create logs dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, "logs", "cinder_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the non-blocking writer is not dropped before process exit
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("info")
            .add_directive("cinder=trace".parse().unwrap())
            .add_directive("cinder::common::mailbox=debug".parse().unwrap());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// A configuration with short timers so failure paths finish quickly.
pub fn test_config(host: &str) -> CinderConfig {
    let mut config = CinderConfig::default();
    config.system.host = host.to_string();
    config.timeouts.ask_default_ms = 500;
    config.timeouts.system_shutdown_ms = 5_000;
    config.watch.heartbeat_interval_ms = 50;
    config.watch.heartbeat_timeout_ms = 100;
    config.supervision.base_delay_ms = 10;
    config.supervision.max_delay_ms = 40;
    config.supervision.jitter = 0.0;
    config.persistence.retry_base_ms = 1;
    config.persistence.retry_max_ms = 5;
    config
}

/// Launches a system on `host` with [`test_config`] and `journal` installed as hook.
pub async fn launch(host: &str, journal: &Journal) -> ActorSystem {
    CinderApp::builder()
        .config(test_config(host))
        .hook(journal.clone())
        .launch()
        .await
}

/// Polls `condition` until it holds or five seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
