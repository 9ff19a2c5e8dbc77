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

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::common::remote::{RemoteProcess, RemoteStreams};
use crate::message::{Address, Envelope};
use crate::traits::{Process, SystemHook};

/// Errors raised by [`ProcessRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The address names another host; only local processes can be registered.
    ForeignHost {
        /// The rejected address.
        address: Address,
        /// This registry's host.
        local_host: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignHost { address, local_host } => write!(
                f,
                "cannot register {address}: it does not belong to local host {local_host}"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Concurrent table from local paths to processes.
///
/// Lookups that miss resolve to the fallback ("daemon") process, addresses on
/// other hosts resolve to a remote proxy when a transport is configured, and
/// every successful local lookup refreshes the address's process cache.
pub struct ProcessRegistry {
    host: String,
    processes: DashMap<String, Arc<dyn Process>>,
    daemon: RwLock<Arc<dyn Process>>,
    remote: Option<Arc<RemoteStreams>>,
}

impl ProcessRegistry {
    pub(crate) fn new(
        host: impl Into<String>,
        daemon: Arc<dyn Process>,
        remote: Option<Arc<RemoteStreams>>,
    ) -> Self {
        Self {
            host: host.into(),
            processes: DashMap::new(),
            daemon: RwLock::new(daemon),
            remote,
        }
    }

    /// The host every local address carries.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Registers `process` under its own address.
    ///
    /// Returns `Ok(true)` without replacing anything when the path is already
    /// taken, `Ok(false)` when the process was registered.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ForeignHost`] when the address names another host.
    pub fn register(&self, process: Arc<dyn Process>) -> Result<bool, RegistryError> {
        let address = process.address().clone();
        if address.host() != self.host {
            return Err(RegistryError::ForeignHost {
                address,
                local_host: self.host.clone(),
            });
        }
        match self.processes.entry(address.path().to_string()) {
            Entry::Occupied(_) => Ok(true),
            Entry::Vacant(slot) => {
                address.cache_process(&process);
                slot.insert(process);
                trace!(address = %address, "process registered");
                Ok(false)
            }
        }
    }

    /// Removes the process at `address` and tells it who removed it.
    pub fn unregister(&self, operator: &Address, address: &Address) {
        address.clear_cache();
        if address.host() != self.host {
            return;
        }
        if let Some((_, process)) = self.processes.remove(address.path()) {
            trace!(address = %address, operator = %operator, "process unregistered");
            process.on_unregistered(operator);
        }
    }

    /// Resolves `address`. The flag is `true` when the fallback process was returned.
    pub fn lookup(&self, address: &Address) -> (Arc<dyn Process>, bool) {
        if let Some(process) = address.cached_process() {
            return (process, false);
        }
        if address.host() != self.host {
            if let Some(streams) = &self.remote {
                let proxy: Arc<dyn Process> =
                    Arc::new(RemoteProcess::new(address.clone(), Arc::clone(streams)));
                return (proxy, false);
            }
            debug!(address = %address, "no transport for a foreign host, using the fallback");
            return (self.daemon(), true);
        }
        match self.processes.get(address.path()) {
            Some(entry) => {
                let process = Arc::clone(entry.value());
                drop(entry);
                address.cache_process(&process);
                (process, false)
            }
            None => (self.daemon(), true),
        }
    }

    /// Whether a local process is registered at `address`.
    pub fn contains(&self, address: &Address) -> bool {
        address.host() == self.host && self.processes.contains_key(address.path())
    }

    /// Number of registered local processes, futures included.
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// The fallback process.
    pub fn daemon(&self) -> Arc<dyn Process> {
        Arc::clone(&self.daemon.read())
    }

    /// Replaces the fallback process.
    pub fn set_daemon(&self, daemon: Arc<dyn Process>) {
        *self.daemon.write() = daemon;
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("host", &self.host)
            .field("processes", &self.processes.len())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

/// The default fallback process: logs undeliverable envelopes and reports them to hooks.
pub(crate) struct DeadLetters {
    address: Address,
    hooks: Arc<[Arc<dyn SystemHook>]>,
}

impl DeadLetters {
    pub(crate) fn new(host: &str, hooks: Arc<[Arc<dyn SystemHook>]>) -> Self {
        Self {
            address: Address::new(host, "/deadletters"),
            hooks,
        }
    }
}

impl Process for DeadLetters {
    fn address(&self) -> &Address {
        &self.address
    }

    fn send(&self, envelope: Envelope) {
        warn!(
            sender = %envelope.sender(),
            receiver = %envelope.receiver(),
            class = %envelope.class(),
            message = ?envelope.message(),
            "dead letter"
        );
        for hook in self.hooks.iter() {
            hook.on_dead_letter(&envelope);
        }
    }

    fn is_terminated(&self) -> bool {
        false
    }
}
