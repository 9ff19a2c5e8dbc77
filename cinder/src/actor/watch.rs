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
use std::time::Duration;

use tracing::{trace, warn};

use crate::actor::ActorContext;
use crate::common::{AskError, AskFuture};
use crate::message::{Address, MessageClass, OnPing, OnUnwatch, OnWatch, OnWatchStopped, WatchAck};
use crate::traits::{Message, WatchHandler};

pub(crate) const WATCH_TIMER_PREFIX: &str = "[watch]";

fn heartbeat_key(target: &Address) -> String {
    format!("{WATCH_TIMER_PREFIX}{target}")
}

impl ActorContext {
    /// Asks to be told when `target` terminates. The notice arrives as an
    /// [`OnWatchStopped`] user message, exactly once.
    ///
    /// While the watch lasts, `target` is pinged periodically; a missed
    /// heartbeat produces the same notice with
    /// [`is_heartbeat_lost`](OnWatchStopped::is_heartbeat_lost) set. Watching
    /// an actor that is already gone produces the notice right away.
    ///
    /// # Errors
    ///
    /// Fails if `target` does not acknowledge the watch in time.
    pub fn watch(&mut self, target: &Address) -> Result<(), AskError> {
        self.watch_with_handlers(target, Vec::new())
    }

    /// Like [`watch`](ActorContext::watch), but `handler` runs instead of the
    /// notice reaching `receive`. Watching the same target again adds handlers.
    ///
    /// # Errors
    ///
    /// Fails if `target` does not acknowledge the watch in time.
    pub fn watch_with(&mut self, target: &Address, handler: impl WatchHandler) -> Result<(), AskError> {
        self.watch_with_handlers(target, vec![Arc::new(handler)])
    }

    pub(crate) fn watch_with_handlers(
        &mut self,
        target: &Address,
        handlers: Vec<Arc<dyn WatchHandler>>,
    ) -> Result<(), AskError> {
        if let Some(existing) = self.watching.get_mut(target) {
            existing.extend(handlers);
            return Ok(());
        }
        if target == self.address() {
            let me = self.address().clone();
            self.watchers.insert(me.clone());
            self.watching.insert(me, handlers);
            return Ok(());
        }

        let terminated = match self
            .system()
            .ask_from(
                self.address(),
                target,
                Message::new(OnWatch),
                MessageClass::System,
                None,
            )
            .result_as::<WatchAck>()
        {
            Ok(ack) => ack.terminated,
            Err(AskError::TargetNotFound(_)) => true,
            Err(error) => return Err(error),
        };
        self.watching.insert(target.clone(), handlers);
        trace!(watcher = %self.address(), target = %target, terminated, "watching");
        if terminated {
            let me = self.address().clone();
            self.tell_class(
                &me,
                Message::new(OnWatchStopped::terminated(target.clone())),
                MessageClass::User,
            );
        } else {
            self.start_heartbeat(target);
        }
        Ok(())
    }

    /// Stops watching `target`; no notice will be delivered for it.
    pub fn unwatch(&mut self, target: &Address) {
        if self.watching.remove(target).is_none() {
            return;
        }
        self.stop_heartbeat(target);
        if target == self.address() {
            self.watchers.remove(target);
        } else {
            self.tell_class(target, Message::new(OnUnwatch), MessageClass::System);
        }
    }

    /// Whether a watch on `target` is in place.
    pub fn is_watching(&self, target: &Address) -> bool {
        self.watching.contains_key(target)
    }

    /// Checks that `target` is alive and handling its system lane, the way
    /// watch heartbeats do. The future resolves once `target` answers and fails
    /// with [`AskError::Timeout`] or [`AskError::TargetNotFound`] otherwise.
    pub fn ping(&self, target: &Address, timeout: Option<Duration>) -> AskFuture {
        self.system()
            .ask_from(self.address(), target, Message::new(OnPing), MessageClass::System, timeout)
    }

    fn start_heartbeat(&self, target: &Address) {
        let config = self.system().config();
        let timeout = config.heartbeat_timeout();
        let system = self.system().clone();
        let me = self.address().clone();
        let target = target.clone();
        self.scheduler
            .every(heartbeat_key(&target), config.heartbeat_interval(), move || {
                let system = system.clone();
                let me = me.clone();
                let target = target.clone();
                async move {
                    let ping = system.ask_from(&me, &target, Message::new(OnPing), MessageClass::System, Some(timeout));
                    if let Err(error) = ping.result_async().await {
                        warn!(watcher = %me, target = %target, error = %error, "heartbeat missed");
                        system.tell_from(
                            &me,
                            &me,
                            Message::new(OnWatchStopped::heartbeat_lost(target)),
                            MessageClass::User,
                        );
                    }
                }
            });
    }

    pub(crate) fn stop_heartbeat(&self, target: &Address) {
        self.scheduler.stop(&heartbeat_key(target));
    }
}
