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

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::actor::lifecycle::{LifeState, LifeStatus};
use crate::actor::persistence::PersistenceState;
use crate::actor::supervision::Responsible;
use crate::actor::{ActorProcess, Props};
use crate::common::{ActorSystem, AskFuture, Mailbox, Scheduler, SpawnError};
use crate::message::{Address, ContextTask, Envelope, Failure, MessageClass, OnKill};
use crate::traits::{ActorMessage, Message, WatchHandler};

pub(crate) const TIMER_PREFIX: &str = "[timer]";

/// An actor's view of the runtime while it handles a message.
///
/// Gives access to the current message and its sender, and to everything an
/// actor may do: send, ask, reply, spawn children, kill, watch, schedule
/// timers and persist state. Only the actor's own worker turn ever holds it.
pub struct ActorContext {
    system: ActorSystem,
    address: Address,
    parent: Option<Address>,
    envelope: Envelope,
    pub(crate) mailbox: Arc<Mailbox>,
    pub(crate) state: Arc<LifeState>,
    pub(crate) props: Props,
    pub(crate) children: HashMap<String, Address>,
    child_seq: u64,
    pub(crate) watchers: HashSet<Address>,
    pub(crate) watching: HashMap<Address, Vec<Arc<dyn WatchHandler>>>,
    pub(crate) scheduler: Scheduler,
    pub(crate) persistence: Option<PersistenceState>,
}

impl ActorContext {
    pub(crate) fn new(
        system: ActorSystem,
        address: Address,
        parent: Option<Address>,
        mailbox: Arc<Mailbox>,
        state: Arc<LifeState>,
        props: Props,
    ) -> Self {
        let scheduler = system.new_scheduler();
        let persistence = props
            .persistence()
            .map(|options| PersistenceState::new(options, system.config().persistence.retry_policy()));
        let envelope = Envelope::new(
            address.clone(),
            address.clone(),
            MessageClass::System,
            Message::new(()),
        );
        Self {
            system,
            address,
            parent,
            envelope,
            mailbox,
            state,
            props,
            children: HashMap::new(),
            child_seq: 0,
            watchers: HashSet::new(),
            watching: HashMap::new(),
            scheduler,
            persistence,
        }
    }

    /// This actor's address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The parent's address; `None` only for the root.
    pub fn parent(&self) -> Option<&Address> {
        self.parent.as_ref()
    }

    /// The system this actor belongs to.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// The envelope being handled.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The message being handled.
    pub fn message(&self) -> &Message {
        self.envelope.message()
    }

    /// The message being handled, if it is a `T`.
    pub fn message_as<T: ActorMessage>(&self) -> Option<&T> {
        self.envelope.message().downcast_ref::<T>()
    }

    /// Who sent the message being handled.
    pub fn sender(&self) -> &Address {
        self.envelope.sender()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> LifeStatus {
        self.state.load()
    }

    /// Addresses of the live children.
    pub fn children(&self) -> impl Iterator<Item = &Address> {
        self.children.values()
    }

    /// The child spawned under `name`, if still alive.
    pub fn child(&self, name: &str) -> Option<&Address> {
        self.children.get(name)
    }

    /// Sends `message` to `target` in the user lane.
    pub fn tell(&self, target: &Address, message: impl ActorMessage) {
        self.tell_class(target, Message::new(message), MessageClass::User);
    }

    pub(crate) fn tell_class(&self, target: &Address, message: Message, class: MessageClass) {
        self.system.tell_from(&self.address, target, message, class);
    }

    /// Sends `message` to `target` and returns a future for the reply.
    ///
    /// `timeout` of `None` uses the configured default; `Some(Duration::ZERO)`
    /// waits forever.
    pub fn ask(&self, target: &Address, message: impl ActorMessage, timeout: Option<Duration>) -> AskFuture {
        self.system
            .ask_from(&self.address, target, Message::new(message), MessageClass::User, timeout)
    }

    /// Answers the message being handled: to the asking future when there is
    /// one, to the sender otherwise.
    pub fn reply(&self, message: impl ActorMessage) {
        let to = self.envelope.reply_to().clone();
        self.tell(&to, message);
    }

    /// Answers with an error; an asking future fails with it.
    pub fn reply_error(&self, error: impl Into<anyhow::Error>) {
        self.reply(Failure::new(error));
    }

    /// Spawns a child actor and returns its address.
    ///
    /// The child's [`OnLaunch`](crate::message::OnLaunch) is queued before this
    /// returns, so messages sent to the address afterwards arrive after it.
    ///
    /// # Errors
    ///
    /// Fails if a live child already uses the name, or if this actor is no
    /// longer alive.
    pub fn spawn(&mut self, props: Props) -> Result<Address, SpawnError> {
        if self.state.load() != LifeStatus::Alive {
            return Err(SpawnError::ParentNotAlive(self.address.clone()));
        }
        let name = match props.name() {
            Some(name) => name.to_string(),
            None => {
                self.child_seq += 1;
                self.child_seq.to_string()
            }
        };
        let address = self.address.sub(&name);
        if self.children.contains_key(address.name()) {
            return Err(SpawnError::AlreadyExists(address));
        }
        let process = ActorProcess::create(
            &self.system,
            Some(self.address.clone()),
            address.clone(),
            props,
            &self.address,
        )?;
        self.children.insert(address.name().to_string(), address.clone());
        process.start();
        trace!(parent = %self.address, child = %address, "child spawned");
        Ok(address)
    }

    /// Terminates `target` right away; its queued user messages are abandoned.
    pub fn kill(&self, target: &Address, reason: impl Into<String>) {
        self.tell_class(
            target,
            Message::new(OnKill::kill(self.address.clone(), reason)),
            MessageClass::System,
        );
    }

    /// Terminates `target` once the user messages already queued for it are handled.
    pub fn poison_kill(&self, target: &Address, reason: impl Into<String>) {
        self.tell_class(
            target,
            Message::new(OnKill::poison(self.address.clone(), reason)),
            MessageClass::User,
        );
    }

    /// Kills this actor once the current message is handled.
    pub fn stop(&self, reason: impl Into<String>) {
        let me = self.address.clone();
        self.kill(&me, reason);
    }

    /// Poison-kills this actor: it terminates after the user messages already queued.
    pub fn poison_self(&self, reason: impl Into<String>) {
        let me = self.address.clone();
        self.poison_kill(&me, reason);
    }

    /// Runs `task` on this actor's own turn after `delay`. Scheduling the same
    /// key again replaces the pending timer.
    pub fn after<F>(&self, key: impl AsRef<str>, delay: Duration, task: F)
    where
        F: FnOnce(&mut ActorContext) -> anyhow::Result<()> + Send + 'static,
    {
        let system = self.system.clone();
        let me = self.address.clone();
        self.scheduler
            .after(format!("{TIMER_PREFIX}{}", key.as_ref()), delay, async move {
                system.tell_from(&me, &me, Message::new(ContextTask::new("timer", task)), MessageClass::User);
            });
    }

    /// Runs `task` on this actor's own turn every `interval` until stopped.
    pub fn every<F>(&self, key: impl AsRef<str>, interval: Duration, task: F)
    where
        F: Fn(&mut ActorContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let system = self.system.clone();
        let me = self.address.clone();
        let task = Arc::new(task);
        self.scheduler
            .every(format!("{TIMER_PREFIX}{}", key.as_ref()), interval, move || {
                let task = Arc::clone(&task);
                system.tell_from(
                    &me,
                    &me,
                    Message::new(ContextTask::new("timer", move |ctx| task(ctx))),
                    MessageClass::User,
                );
                async {}
            });
    }

    /// Cancels the timer under `key`. Returns whether one was pending.
    pub fn stop_timer(&self, key: impl AsRef<str>) -> bool {
        self.scheduler.stop(&format!("{TIMER_PREFIX}{}", key.as_ref()))
    }

    pub(crate) fn set_envelope(&mut self, envelope: Envelope) -> Envelope {
        std::mem::replace(&mut self.envelope, envelope)
    }

    pub(crate) fn responsible(&self) -> Responsible {
        Responsible {
            address: self.address.clone(),
            parent: self.parent.clone(),
            system: self.system.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    pub(crate) fn forward_dead_letter(&self, envelope: Envelope) {
        self.system.registry().daemon().send(envelope);
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("address", &format_args!("{}", self.address))
            .field("status", &self.state.load())
            .field("children", &self.children.len())
            .field("watchers", &self.watchers.len())
            .field("watching", &self.watching.len())
            .finish_non_exhaustive()
    }
}
