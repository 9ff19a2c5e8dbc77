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

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace};

use crate::actor::{ActorProcess, Guardian, Props};
use crate::common::actor_system::{default_supervisor, SystemInner};
use crate::common::registry::DeadLetters;
use crate::common::remote::RemoteStreams;
use crate::common::{ActorSystem, CinderConfig, Dispatcher, ProcessRegistry, TokioDispatcher, CONFIG};
use crate::message::Address;
use crate::traits::{Process, Supervisor, SystemHook, Transport};

/// Entry point for launching an [`ActorSystem`].
///
/// ```rust,ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let system = CinderApp::launch_async().await;
///     // ...
///     system.shutdown().await?;
///     Ok(())
/// }
/// ```
#[derive(Default, Debug, Clone)]
pub struct CinderApp;

impl CinderApp {
    /// Launches a system with the configuration loaded from the XDG config directory.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub async fn launch_async() -> ActorSystem {
        Self::builder().launch().await
    }

    /// Launches a system with `config`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub async fn launch_with_config(config: CinderConfig) -> ActorSystem {
        Self::builder().config(config).launch().await
    }

    /// Starts a [`CinderBuilder`] for systems that need hooks, a transport or a
    /// custom root supervisor.
    pub fn builder() -> CinderBuilder {
        CinderBuilder::default()
    }
}

/// Collects the collaborators of a system before launch.
#[derive(Default)]
pub struct CinderBuilder {
    config: Option<CinderConfig>,
    hooks: Vec<Arc<dyn SystemHook>>,
    transport: Option<Arc<dyn Transport>>,
    root_supervisor: Option<Arc<dyn Supervisor>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl CinderBuilder {
    /// Uses `config` instead of the file-based configuration.
    #[must_use]
    pub fn config(mut self, config: CinderConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds an observer of runtime events.
    #[must_use]
    pub fn hook(mut self, hook: impl SystemHook) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Routes envelopes for other hosts through `transport`. Without one they
    /// become dead letters.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Supervises accidents escalated all the way to the root.
    #[must_use]
    pub fn root_supervisor(mut self, supervisor: impl Supervisor) -> Self {
        self.root_supervisor = Some(Arc::new(supervisor));
        self
    }

    /// Runs drain loops on `dispatcher` instead of Tokio's blocking pool.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Builds the system and launches its root.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub async fn launch(self) -> ActorSystem {
        let config = self.config.unwrap_or_else(|| CONFIG.clone());
        trace!("Configuration loaded: {:?}", config);
        let handle = Handle::current();
        let host = config.system.host.clone();

        let hooks: Arc<[Arc<dyn SystemHook>]> = self.hooks.into();
        let dead_letters: Arc<dyn Process> = Arc::new(DeadLetters::new(&host, Arc::clone(&hooks)));
        let remote = self
            .transport
            .map(|transport| Arc::new(RemoteStreams::new(transport, handle.clone())));
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(TokioDispatcher::new(handle.clone())) as Arc<dyn Dispatcher>);
        let (terminated, _) = watch::channel(false);

        let system = ActorSystem::from_inner(SystemInner {
            registry: ProcessRegistry::new(host.clone(), dead_letters, remote),
            default_supervisor: default_supervisor(&config),
            config: Arc::new(config),
            dispatcher,
            handle,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            hooks,
            root: Address::root(host),
            future_seq: AtomicU64::new(0),
            top_level_seq: AtomicU64::new(0),
            terminated,
        });

        let mut props = Props::new(Guardian::default);
        if let Some(supervisor) = self.root_supervisor {
            props = props.with_arc_supervisor(supervisor);
        }
        let root = system.address().clone();
        match ActorProcess::create(&system, None, root.clone(), props, &root) {
            Ok(process) => process.start(),
            Err(error) => error!(root = %root, error = %error, "root could not be registered"),
        }
        debug!(host = system.host(), "system launched");
        system
    }
}

impl std::fmt::Debug for CinderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CinderBuilder")
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .field("transport", &self.transport.is_some())
            .field("root_supervisor", &self.root_supervisor.is_some())
            .finish_non_exhaustive()
    }
}
