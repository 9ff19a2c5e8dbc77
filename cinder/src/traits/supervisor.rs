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

/// Recovery policy for accidents raised by an actor's children, or by the
/// actor itself.
///
/// `decide` must apply exactly one directive on the record (`resume`,
/// `restart`, `exponential_backoff_restart`, `kill`, `poison_kill` or
/// `escalate`). Only the first directive takes effect; a record left
/// undecided is escalated to the parent.
pub trait Supervisor: Send + Sync + 'static {
    /// Applies a directive to `record`.
    fn decide(&self, record: &AccidentRecord);
}

impl<F> Supervisor for F
where
    F: Fn(&AccidentRecord) + Send + Sync + 'static,
{
    fn decide(&self, record: &AccidentRecord) {
        self(record);
    }
}
