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
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use static_assertions::assert_impl_all;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actor::{ActorContext, ActorProcess, DefaultSupervisor, LifeStatus, Props};
use crate::common::{
    AskFuture, CinderConfig, Dispatcher, ProcessRegistry, RegistryError, Scheduler,
};
use crate::message::{
    crosses_hosts_in_system_lane, Address, ContextTask, Envelope, MessageClass, OnKill, OnPing,
};
use crate::traits::{ActorMessage, Message, Supervisor, SystemHook, WatchHandler};

/// Why a spawn was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// A live actor already holds the address.
    AlreadyExists(Address),
    /// The would-be parent is restarting, terminating or gone.
    ParentNotAlive(Address),
    /// The registry rejected the address.
    Registry(RegistryError),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists(address) => write!(f, "an actor already exists at {address}"),
            Self::ParentNotAlive(parent) => write!(f, "parent {parent} is not alive"),
            Self::Registry(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(error) => Some(error),
            _ => None,
        }
    }
}

impl From<RegistryError> for SpawnError {
    fn from(error: RegistryError) -> Self {
        Self::Registry(error)
    }
}

/// Errors from system-wide operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// The root did not terminate within the configured shutdown timeout.
    ShutdownTimedOut(Duration),
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShutdownTimedOut(after) => write!(f, "system did not terminate within {after:?}"),
        }
    }
}

impl std::error::Error for SystemError {}

pub(crate) struct SystemInner {
    pub(crate) config: Arc<CinderConfig>,
    pub(crate) registry: ProcessRegistry,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) handle: Handle,
    pub(crate) token: CancellationToken,
    pub(crate) tracker: TaskTracker,
    pub(crate) hooks: Arc<[Arc<dyn SystemHook>]>,
    pub(crate) default_supervisor: Arc<dyn Supervisor>,
    pub(crate) root: Address,
    pub(crate) future_seq: AtomicU64,
    pub(crate) top_level_seq: AtomicU64,
    pub(crate) terminated: watch::Sender<bool>,
}

/// A running actor system: the registry of every local process, the root of
/// the actor tree, and the shared worker pool.
///
/// Cheap to clone; every clone drives the same system. Obtain one from
/// [`CinderApp`](crate::common::CinderApp).
///
/// # Example
///
/// ```rust,ignore
/// let system = CinderApp::launch_async().await;
/// let counter = system.spawn(Props::of::<Counter>().with_name("counter"))?;
/// system.tell(&counter, Increment);
/// let total: Total = system.ask(&counter, GetTotal, None).result_as_async().await?;
/// system.shutdown().await?;
/// ```
#[derive(Clone)]
pub struct ActorSystem {
    pub(crate) inner: Arc<SystemInner>,
}

impl ActorSystem {
    pub(crate) fn from_inner(inner: SystemInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The root actor's address. Top-level actors are its children.
    pub fn address(&self) -> &Address {
        &self.inner.root
    }

    /// The host every local address carries.
    pub fn host(&self) -> &str {
        self.inner.registry.host()
    }

    /// The configuration the system was launched with.
    pub fn config(&self) -> &CinderConfig {
        &self.inner.config
    }

    /// The process registry.
    pub fn registry(&self) -> &ProcessRegistry {
        &self.inner.registry
    }

    /// Spawns a top-level actor as a child of the root.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the system is shutting down.
    #[instrument(skip(self, props), fields(host = self.host(), name = props.name()))]
    pub fn spawn(&self, props: Props) -> Result<Address, SpawnError> {
        let root = self.address().clone();
        if self.is_terminated() {
            return Err(SpawnError::ParentNotAlive(root));
        }
        let name = match props.name() {
            Some(name) => name.to_string(),
            None => (self.inner.top_level_seq.fetch_add(1, Ordering::Relaxed) + 1).to_string(),
        };
        let address = root.sub(&name);
        let process = ActorProcess::create(self, Some(root.clone()), address.clone(), props, &root)?;

        // The adoption is queued before the child starts, so the root handles
        // it ahead of anything the child can report.
        let child = address.clone();
        self.run_on_root("adopt", move |ctx| {
            if ctx.status() == LifeStatus::Alive {
                ctx.children.insert(child.name().to_string(), child);
            } else {
                ctx.kill(&child, "system shutting down");
            }
            Ok(())
        });
        process.start();
        debug!(actor = %address, "top-level actor spawned");
        Ok(address)
    }

    /// Sends `message` to `target` in the user lane, from the root.
    pub fn tell(&self, target: &Address, message: impl ActorMessage) {
        self.tell_from(self.address(), target, Message::new(message), MessageClass::User);
    }

    /// Asks `target` from outside any actor.
    ///
    /// `timeout` of `None` uses the configured default; `Some(Duration::ZERO)`
    /// waits forever.
    pub fn ask(&self, target: &Address, message: impl ActorMessage, timeout: Option<Duration>) -> AskFuture {
        self.ask_from(
            self.address(),
            target,
            Message::new(message),
            MessageClass::User,
            timeout,
        )
    }

    /// Terminates `target` right away.
    pub fn kill(&self, target: &Address, reason: impl Into<String>) {
        let root = self.address().clone();
        self.tell_from(
            &root,
            target,
            Message::new(OnKill::kill(root.clone(), reason)),
            MessageClass::System,
        );
    }

    /// Terminates `target` after it handles the user messages already queued.
    pub fn poison_kill(&self, target: &Address, reason: impl Into<String>) {
        let root = self.address().clone();
        self.tell_from(
            &root,
            target,
            Message::new(OnKill::poison(root.clone(), reason)),
            MessageClass::User,
        );
    }

    /// Watches `target` on behalf of the root; `handler` runs once when it stops.
    pub fn watch(&self, target: &Address, handler: impl WatchHandler) {
        let target = target.clone();
        let handler: Arc<dyn WatchHandler> = Arc::new(handler);
        self.run_on_root("watch", move |ctx| {
            if let Err(error) = ctx.watch_with_handlers(&target, vec![handler]) {
                warn!(target = %target, error = %error, "system watch failed");
            }
            Ok(())
        });
    }

    /// Cancels a watch placed with [`watch`](ActorSystem::watch).
    pub fn unwatch(&self, target: &Address) {
        let target = target.clone();
        self.run_on_root("unwatch", move |ctx| {
            ctx.unwatch(&target);
            Ok(())
        });
    }

    /// Pings `target` from the root; see [`ActorContext::ping`].
    pub fn ping(&self, target: &Address, timeout: Option<Duration>) -> AskFuture {
        self.ask_from(self.address(), target, Message::new(OnPing), MessageClass::System, timeout)
    }

    /// Feeds an envelope received by a transport into local delivery.
    pub fn receive_remote(&self, envelope: Envelope) {
        if envelope.receiver().host() != self.host() {
            warn!(receiver = %envelope.receiver(), host = self.host(), "remote envelope for another host");
            self.inner.registry.daemon().send(envelope);
            return;
        }
        if envelope.class() == MessageClass::System && !crosses_hosts_in_system_lane(envelope.message()) {
            warn!(
                receiver = %envelope.receiver(),
                sender = %envelope.sender(),
                message = envelope.message().type_name(),
                "remote envelope claims the system lane for a non-runtime message"
            );
            self.inner.registry.daemon().send(envelope);
            return;
        }
        trace!(receiver = %envelope.receiver(), sender = %envelope.sender(), "remote envelope received");
        let (process, _) = self.inner.registry.lookup(envelope.receiver());
        process.send(envelope);
    }

    /// Poison-kills the root and waits until the whole tree has terminated,
    /// so every user message queued before the call is handled.
    ///
    /// # Errors
    ///
    /// [`SystemError::ShutdownTimedOut`] after `timeouts.system_shutdown_ms`.
    #[instrument(skip(self), fields(host = self.host()))]
    pub async fn shutdown(&self) -> Result<(), SystemError> {
        info!(host = self.host(), "system shutdown requested");
        let root = self.address().clone();
        self.tell_from(
            &root,
            &root,
            Message::new(OnKill::poison(root.clone(), "system shutdown")),
            MessageClass::User,
        );
        self.await_termination().await
    }

    /// Kills the root and waits until the whole tree has terminated. Queued
    /// user messages are abandoned.
    ///
    /// # Errors
    ///
    /// [`SystemError::ShutdownTimedOut`] after `timeouts.system_shutdown_ms`.
    #[instrument(skip(self), fields(host = self.host()))]
    pub async fn terminate(&self) -> Result<(), SystemError> {
        info!(host = self.host(), "system termination requested");
        self.kill(&self.address().clone(), "system terminated");
        self.await_termination().await
    }

    /// Resolves once the root has terminated.
    pub async fn terminated(&self) {
        let mut terminated = self.inner.terminated.subscribe();
        let _ = terminated.wait_for(|done| *done).await;
    }

    /// Whether the root has terminated.
    pub fn is_terminated(&self) -> bool {
        *self.inner.terminated.borrow()
    }

    async fn await_termination(&self) -> Result<(), SystemError> {
        let timeout = self.config().system_shutdown_timeout();
        tokio::time::timeout(timeout, async {
            self.terminated().await;
            self.inner.tracker.wait().await;
        })
        .await
        .map_err(|_| {
            error!(timeout_ms = timeout.as_millis() as u64, "system shutdown timed out");
            SystemError::ShutdownTimedOut(timeout)
        })?;
        info!(host = self.host(), "system terminated");
        Ok(())
    }

    pub(crate) fn tell_from(&self, sender: &Address, target: &Address, message: Message, class: MessageClass) {
        let (process, _) = self.inner.registry.lookup(target);
        process.send(Envelope::new(sender.clone(), target.clone(), class, message));
    }

    /// Registers a future under `sender` and sends `message` with the future as reply agent.
    pub(crate) fn ask_from(
        &self,
        sender: &Address,
        target: &Address,
        message: Message,
        class: MessageClass,
        timeout: Option<Duration>,
    ) -> AskFuture {
        let id = self.inner.future_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let agent = sender.sub(&format!("future-{id}"));
        let timeout = timeout.unwrap_or_else(|| self.config().ask_timeout());
        let future = AskFuture::register(self.clone(), agent.clone(), timeout);
        let (process, fallback) = self.inner.registry.lookup(target);
        let envelope = Envelope::with_agent(agent, sender.clone(), target.clone(), class, message);
        if fallback {
            future.fail(crate::common::AskError::TargetNotFound(target.clone()));
        }
        process.send(envelope);
        future
    }

    pub(crate) fn run_on_root<F>(&self, label: &'static str, task: F)
    where
        F: FnOnce(&mut ActorContext) -> anyhow::Result<()> + Send + 'static,
    {
        let root = self.address().clone();
        self.tell_from(
            &root,
            &root,
            Message::new(ContextTask::new(label, task)),
            MessageClass::System,
        );
    }

    pub(crate) fn new_scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.inner.handle.clone(),
            &self.inner.token,
            self.inner.tracker.clone(),
        )
    }

    pub(crate) fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    pub(crate) fn default_supervisor(&self) -> Arc<dyn Supervisor> {
        Arc::clone(&self.inner.default_supervisor)
    }

    /// Runs `notify` for every hook; a panicking hook is logged and skipped.
    pub(crate) fn notify_hooks(&self, notify: impl Fn(&dyn SystemHook)) {
        for hook in self.inner.hooks.iter() {
            if catch_unwind(AssertUnwindSafe(|| notify(hook.as_ref()))).is_err() {
                error!("system hook panicked");
            }
        }
    }

    /// Called by the root once it has terminated.
    pub(crate) fn mark_terminated(&self) {
        self.inner.token.cancel();
        self.inner.tracker.close();
        self.inner.terminated.send_replace(true);
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("host", &self.host())
            .field("processes", &self.inner.registry.len())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl fmt::Debug for SystemInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemInner")
            .field("root", &format_args!("{}", self.root))
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn default_supervisor(config: &CinderConfig) -> Arc<dyn Supervisor> {
    Arc::new(DefaultSupervisor::new(config.supervision.clone()))
}

assert_impl_all!(ActorSystem: Send, Sync, Clone);
assert_impl_all!(SpawnError: Send, Sync);
