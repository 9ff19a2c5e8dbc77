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

use crate::message::{Address, Envelope};

/// Anything the registry can resolve an [`Address`] to: local actors, ask
/// futures, remote proxies and the dead-letter fallback.
pub trait Process: Send + Sync {
    /// The address this process is registered under.
    fn address(&self) -> &Address;

    /// Accepts an envelope. Never blocks and never fails; undeliverable
    /// traffic is the process's own concern.
    fn send(&self, envelope: Envelope);

    /// Whether the process has reached its terminal state. Address caches
    /// pointing at a terminated process are discarded.
    fn is_terminated(&self) -> bool;

    /// Called after the registry removed this process on behalf of `operator`.
    fn on_unregistered(&self, _operator: &Address) {}
}
