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

use tracing::error;

use crate::traits::Message;

/// A stored snapshot plus the events recorded after it.
pub type Recovered = (Option<Message>, Vec<Message>);

/// Backing store for persistence-capable actors.
///
/// Calls happen on the owning actor's worker turn, so implementations may
/// block briefly but should not wait on other actors.
pub trait PersistentStorage: Send + Sync + 'static {
    /// Replaces whatever is stored under `id` with `snapshot` and `events`.
    fn save(&self, id: &str, snapshot: Option<&Message>, events: &[Message]) -> anyhow::Result<()>;

    /// Loads the snapshot and events stored under `id`; unknown ids load as empty.
    fn load(&self, id: &str) -> anyhow::Result<Recovered>;

    /// Called once retries are exhausted. The actor keeps running with its in-memory state.
    fn on_persist_failed(&self, id: &str, error: &anyhow::Error) {
        error!(persistence_id = id, error = %error, "persisting actor state failed");
    }
}
