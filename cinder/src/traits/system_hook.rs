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

use crate::actor::AccidentRecord;
use crate::message::{Address, Envelope};

/// Typed observer for runtime events, registered on the
/// [`CinderBuilder`](crate::common::CinderBuilder).
///
/// Every method defaults to doing nothing. Hooks run inline on the thread
/// that produced the event and should return quickly.
pub trait SystemHook: Send + Sync + 'static {
    /// An actor instance finished handling its launch notice.
    fn on_actor_launched(&self, _address: &Address, _restarted: bool) {}

    /// An actor reached its terminal state.
    fn on_actor_terminated(&self, _address: &Address) {}

    /// User code failed and the record is about to be supervised.
    fn on_accident(&self, _record: &AccidentRecord) {}

    /// An envelope could not be delivered and reached the fallback process.
    fn on_dead_letter(&self, _envelope: &Envelope) {}
}
