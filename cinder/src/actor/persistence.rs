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

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::actor::props::PersistenceOptions;
use crate::actor::{ActorContext, RestartLimiterConfig};
use crate::traits::{ActorMessage, Message, PersistentStorage, Recovered};

/// Errors surfaced by persistent actors.
#[derive(Debug)]
pub enum PersistenceError {
    /// The actor was spawned without [`Props::with_persistence`](crate::actor::Props::with_persistence).
    NotPersistent,
    /// Saving kept failing after every retry.
    SaveFailed {
        /// Persistence id of the actor.
        id: String,
        /// Attempts made, the first one included.
        attempts: u32,
        /// The last storage error.
        source: anyhow::Error,
    },
    /// Loading the stored state failed.
    LoadFailed {
        /// Persistence id of the actor.
        id: String,
        /// The storage error.
        source: anyhow::Error,
    },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPersistent => write!(f, "actor is not persistent"),
            Self::SaveFailed { id, attempts, source } => {
                write!(f, "saving {id} failed after {attempts} attempts: {source:#}")
            }
            Self::LoadFailed { id, source } => write!(f, "loading {id} failed: {source:#}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// In-memory persistence bookkeeping of one actor.
pub(crate) struct PersistenceState {
    id: String,
    storage: Arc<dyn PersistentStorage>,
    retry: RestartLimiterConfig,
    snapshot: Option<Message>,
    events: Vec<Message>,
    dirty: bool,
    recovering: bool,
}

impl PersistenceState {
    pub(crate) fn new(options: &PersistenceOptions, retry: RestartLimiterConfig) -> Self {
        Self {
            id: options.id.clone(),
            storage: Arc::clone(&options.storage),
            retry,
            snapshot: None,
            events: Vec::new(),
            dirty: false,
            recovering: false,
        }
    }

    /// Loads stored state and returns what must be replayed, snapshot first.
    pub(crate) fn load(&mut self) -> Result<Vec<Message>, PersistenceError> {
        let (snapshot, events) = self.storage.load(&self.id).map_err(|source| PersistenceError::LoadFailed {
            id: self.id.clone(),
            source,
        })?;
        debug!(persistence_id = %self.id, has_snapshot = snapshot.is_some(), events = events.len(), "recovering");
        let replay = snapshot.iter().cloned().chain(events.iter().cloned()).collect();
        self.snapshot = snapshot;
        self.events = events;
        self.dirty = false;
        Ok(replay)
    }

    pub(crate) fn set_recovering(&mut self, recovering: bool) {
        self.recovering = recovering;
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        if !self.dirty {
            return Ok(());
        }
        let mut attempt: u32 = 0;
        loop {
            match self.storage.save(&self.id, self.snapshot.as_ref(), &self.events) {
                Ok(()) => {
                    self.dirty = false;
                    return Ok(());
                }
                Err(source) => {
                    if self.retry.limit_reached(attempt as usize) {
                        self.storage.on_persist_failed(&self.id, &source);
                        return Err(PersistenceError::SaveFailed {
                            id: self.id.clone(),
                            attempts: attempt + 1,
                            source,
                        });
                    }
                    let delay = self.retry.next_delay(attempt as usize);
                    warn!(persistence_id = %self.id, attempt = attempt + 1, error = %source, "save failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl ActorContext {
    /// Whether stored messages are currently being replayed into this actor.
    pub fn is_recovering(&self) -> bool {
        self.persistence.as_ref().is_some_and(|state| state.recovering)
    }

    /// Records an event to be saved by the next [`persist`](ActorContext::persist).
    /// Ignored while recovering, since replayed events are already stored.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::NotPersistent`] for actors spawned without persistence.
    pub fn persist_event(&mut self, event: impl ActorMessage) -> Result<(), PersistenceError> {
        let state = self.persistence.as_mut().ok_or(PersistenceError::NotPersistent)?;
        if !state.recovering {
            state.events.push(Message::new(event));
            state.dirty = true;
        }
        Ok(())
    }

    /// Replaces the stored snapshot and discards the events recorded before it.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::NotPersistent`] for actors spawned without persistence.
    pub fn snapshot(&mut self, snapshot: impl ActorMessage) -> Result<(), PersistenceError> {
        let state = self.persistence.as_mut().ok_or(PersistenceError::NotPersistent)?;
        if !state.recovering {
            state.snapshot = Some(Message::new(snapshot));
            state.events.clear();
            state.dirty = true;
        }
        Ok(())
    }

    /// Saves the snapshot and events, retrying with backoff. Also done
    /// automatically before a restart and on termination.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::SaveFailed`] once retries are exhausted; the
    /// storage's failure hook has been called and in-memory state is kept.
    pub fn persist(&mut self) -> Result<(), PersistenceError> {
        self.persistence
            .as_mut()
            .ok_or(PersistenceError::NotPersistent)?
            .flush()
    }
}

/// [`PersistentStorage`] kept in process memory; contents are lost on exit.
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Recovered>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events stored under `id`.
    pub fn event_count(&self, id: &str) -> usize {
        self.entries.get(id).map_or(0, |entry| entry.1.len())
    }

    /// Whether a snapshot is stored under `id`.
    pub fn has_snapshot(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|entry| entry.0.is_some())
    }
}

impl PersistentStorage for MemoryStorage {
    fn save(&self, id: &str, snapshot: Option<&Message>, events: &[Message]) -> anyhow::Result<()> {
        self.entries
            .insert(id.to_string(), (snapshot.cloned(), events.to_vec()));
        Ok(())
    }

    fn load(&self, id: &str) -> anyhow::Result<Recovered> {
        Ok(self
            .entries
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Flaky {
        failures_left: AtomicU32,
        failed_hook: AtomicU32,
        inner: MemoryStorage,
    }

    impl PersistentStorage for Flaky {
        fn save(&self, id: &str, snapshot: Option<&Message>, events: &[Message]) -> anyhow::Result<()> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("disk unavailable");
            }
            self.inner.save(id, snapshot, events)
        }

        fn load(&self, id: &str) -> anyhow::Result<Recovered> {
            self.inner.load(id)
        }

        fn on_persist_failed(&self, _id: &str, _error: &anyhow::Error) {
            self.failed_hook.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn state(storage: Arc<dyn PersistentStorage>, retry_limit: u32) -> PersistenceState {
        let options = PersistenceOptions {
            id: "account-1".to_string(),
            storage,
        };
        let retry = RestartLimiterConfig {
            restart_limit: retry_limit,
            base_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 2.0,
            jitter: 0.0,
        };
        PersistenceState::new(&options, retry)
    }

    fn flaky(failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures_left: AtomicU32::new(failures),
            failed_hook: AtomicU32::new(0),
            inner: MemoryStorage::new(),
        })
    }

    #[test]
    fn flush_retries_until_storage_recovers() -> anyhow::Result<()> {
        let storage = flaky(2);
        let mut state = state(storage.clone(), 3);
        state.events.push(Message::new(5_u32));
        state.dirty = true;
        state.flush()?;
        assert_eq!(storage.inner.event_count("account-1"), 1);
        assert_eq!(storage.failed_hook.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn exhausted_retries_call_the_failure_hook() {
        let storage = flaky(10);
        let mut state = state(storage.clone(), 2);
        state.events.push(Message::new(5_u32));
        state.dirty = true;
        let result = state.flush();
        assert!(matches!(result, Err(PersistenceError::SaveFailed { attempts: 3, .. })));
        assert_eq!(storage.failed_hook.load(Ordering::SeqCst), 1);
        assert_eq!(state.events.len(), 1);
    }

    #[test]
    fn load_replays_snapshot_before_events() -> anyhow::Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        storage.save("account-1", Some(&Message::new("snapshot".to_string())), &[Message::new(1_u32), Message::new(2_u32)])?;
        let mut state = state(storage, 1);
        let replay = state.load()?;
        assert_eq!(replay.len(), 3);
        assert!(replay[0].is::<String>());
        assert_eq!(replay[2].downcast_ref::<u32>(), Some(&2));
        Ok(())
    }
}
