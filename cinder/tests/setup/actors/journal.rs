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

use std::sync::Arc;

use cinder::prelude::*;
use parking_lot::Mutex;

/// Shared, ordered event log filled by test actors and by the system hooks.
#[derive(Clone, Default, Debug)]
pub struct Journal {
    events: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.count(event) > 0
    }

    /// Waits until `event` was recorded at least once.
    pub async fn wait_for(&self, event: &str) -> bool {
        crate::setup::eventually(|| self.contains(event)).await
    }

    /// Numbers recorded by [`Record`](crate::setup::Record), in order.
    pub fn numbers(&self) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.parse().ok())
            .collect()
    }
}

impl SystemHook for Journal {
    fn on_actor_launched(&self, address: &Address, restarted: bool) {
        let kind = if restarted { "relaunched" } else { "launched" };
        self.record(format!("{kind}:{}", address.name()));
    }

    fn on_actor_terminated(&self, address: &Address) {
        self.record(format!("terminated:{}", address.name()));
    }

    fn on_accident(&self, record: &AccidentRecord) {
        self.record(format!("accident:{}", record.victim().name()));
    }

    fn on_dead_letter(&self, envelope: &Envelope) {
        let kind = envelope
            .message()
            .type_name()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        self.record(format!("dead:{kind}"));
    }
}
