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

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use tracing::{debug, error, instrument, trace, warn};

use crate::actor::lifecycle::{LifeState, LifeStatus};
use crate::actor::watch::WATCH_TIMER_PREFIX;
use crate::actor::{AccidentReason, AccidentRecord, ActorContext, Props};
use crate::common::{ActorSystem, Mailbox, Recipient, SpawnError};
use crate::message::{
    AccidentFinished, Address, ContextTask, Envelope, MessageClass, OnKill, OnKilled, OnLaunch, OnPing,
    OnPreRestart, OnUnwatch, OnWatch, OnWatchStopped, Pong, WatchAck,
};
use crate::traits::{Actor, Message, Process};

/// The registered face of a local actor: a mailbox in front of a cell that
/// only one worker at a time may enter.
pub(crate) struct ActorProcess {
    address: Address,
    mailbox: Arc<Mailbox>,
    state: Arc<LifeState>,
    cell: Mutex<ActorCell>,
}

impl ActorProcess {
    /// Builds the actor, queues its first launch notice and registers it.
    ///
    /// The mailbox stays unbound until [`start`](ActorProcess::start), so
    /// anything sent to the registered address meanwhile queues behind the
    /// `OnLaunch` sent on behalf of `launcher`.
    pub(crate) fn create(
        system: &ActorSystem,
        parent: Option<Address>,
        address: Address,
        props: Props,
        launcher: &Address,
    ) -> Result<Arc<Self>, SpawnError> {
        let mailbox = Mailbox::new(system.dispatcher());
        let state = Arc::new(LifeState::default());
        let actor = props.provide();
        mailbox.deliver(Envelope::new(
            launcher.clone(),
            address.clone(),
            MessageClass::System,
            Message::new(OnLaunch::new(false, props.launch_context())),
        ));
        let ctx = ActorContext::new(
            system.clone(),
            address.clone(),
            parent,
            Arc::clone(&mailbox),
            Arc::clone(&state),
            props,
        );
        let process = Arc::new(Self {
            address: address.clone(),
            mailbox,
            state,
            cell: Mutex::new(ActorCell::new(actor, ctx)),
        });

        let registered: Arc<dyn Process> = process.clone();
        if system.registry().register(registered)? {
            return Err(SpawnError::AlreadyExists(address));
        }
        Ok(process)
    }

    /// Binds the mailbox so the actor starts handling what queued since [`create`](ActorProcess::create).
    pub(crate) fn start(self: &Arc<Self>) {
        let recipient: Weak<dyn Recipient> = Arc::downgrade(self) as Weak<dyn Recipient>;
        self.mailbox.bind(recipient);
    }
}

impl Process for ActorProcess {
    fn address(&self) -> &Address {
        &self.address
    }

    fn send(&self, envelope: Envelope) {
        self.mailbox.deliver(envelope);
    }

    fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }
}

impl Recipient for ActorProcess {
    fn on_receive_envelope(&self, envelope: Envelope) {
        self.cell.lock().receive(envelope);
    }
}

impl fmt::Debug for ActorProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorProcess")
            .field("address", &format_args!("{}", self.address))
            .field("status", &self.state.load())
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

assert_impl_all!(ActorProcess: Send, Sync);

/// Everything that changes while an actor runs. Accessed under the process lock only.
pub(crate) struct ActorCell {
    actor: Box<dyn Actor>,
    pub(crate) ctx: ActorContext,
    /// The record of the failure chain currently being restarted, if any.
    accident: Option<AccidentRecord>,
    /// Records this actor's supervisor put on a delayed restart.
    unfinished: HashMap<Address, AccidentRecord>,
    termination: Option<OnKill>,
    launching: bool,
}

impl ActorCell {
    fn new(actor: Box<dyn Actor>, ctx: ActorContext) -> Self {
        Self {
            actor,
            ctx,
            accident: None,
            unfinished: HashMap::new(),
            termination: None,
            launching: false,
        }
    }

    fn me(&self) -> Address {
        self.ctx.address().clone()
    }

    fn receive(&mut self, envelope: Envelope) {
        match self.ctx.status() {
            LifeStatus::Terminated => return self.receive_terminated(envelope),
            LifeStatus::Restarting if envelope.class() == MessageClass::User => {
                // A stale directive resumed the mailbox mid-restart; hold the
                // envelope for the fresh instance.
                trace!(actor = %self.ctx.address(), "user envelope deferred until restart completes");
                self.ctx.mailbox.defer(envelope);
                return;
            }
            _ => {}
        }
        self.ctx.set_envelope(envelope.clone());
        match envelope.class() {
            MessageClass::System => self.receive_system(&envelope),
            MessageClass::User => self.receive_user(&envelope),
        }
    }

    fn receive_terminated(&mut self, envelope: Envelope) {
        let message = envelope.message();
        if message.is::<OnWatch>() {
            self.ctx.tell_class(
                envelope.reply_to(),
                Message::new(WatchAck { terminated: true }),
                MessageClass::System,
            );
        } else if message.is::<OnKill>()
            || message.is::<OnKilled>()
            || message.is::<OnUnwatch>()
            || message.is::<AccidentFinished>()
            || message.is::<ContextTask>()
        {
            trace!(actor = %self.ctx.address(), message = message.type_name(), "ignored after termination");
        } else {
            self.ctx.forward_dead_letter(envelope);
        }
    }

    fn receive_system(&mut self, envelope: &Envelope) {
        let message = envelope.message();
        if let Some(launch) = message.downcast_ref::<OnLaunch>() {
            self.on_launch(launch.restarted());
        } else if let Some(kill) = message.downcast_ref::<OnKill>() {
            self.on_kill(kill.clone());
        } else if let Some(killed) = message.downcast_ref::<OnKilled>() {
            self.on_child_killed(envelope.sender(), &killed.reason);
        } else if message.is::<OnWatch>() {
            self.ctx.watchers.insert(envelope.sender().clone());
            self.ctx.tell_class(
                envelope.reply_to(),
                Message::new(WatchAck { terminated: false }),
                MessageClass::System,
            );
        } else if message.is::<OnUnwatch>() {
            self.ctx.watchers.remove(envelope.sender());
        } else if let Some(stopped) = message.downcast_ref::<OnWatchStopped>() {
            self.on_watch_stopped(stopped);
        } else if message.is::<OnPing>() {
            self.ctx
                .tell_class(envelope.reply_to(), Message::new(Pong), MessageClass::System);
        } else if let Some(record) = message.downcast_ref::<AccidentRecord>() {
            self.supervise(record.clone());
        } else if let Some(finished) = message.downcast_ref::<AccidentFinished>() {
            self.unfinished.remove(&finished.victim);
        } else if let Some(task) = message.downcast_ref::<ContextTask>() {
            self.run_task(task);
        } else {
            error!(
                actor = %self.ctx.address(),
                message = message.type_name(),
                sender = %envelope.sender(),
                "protocol violation: unknown system message, terminating"
            );
            self.ctx.forward_dead_letter(envelope.clone());
            let me = self.me();
            let kill = OnKill::kill(me.clone(), format!("protocol violation: {}", message.type_name()));
            self.ctx
                .set_envelope(Envelope::new(me.clone(), me, MessageClass::System, Message::new(kill.clone())));
            self.on_kill(kill);
        }
    }

    fn receive_user(&mut self, envelope: &Envelope) {
        let message = envelope.message();
        if self.ctx.status() == LifeStatus::Terminating
            && !message.is::<OnKill>()
            && !message.is::<OnWatchStopped>()
        {
            self.ctx.forward_dead_letter(envelope.clone());
        } else if let Some(kill) = message.downcast_ref::<OnKill>() {
            self.on_kill(kill.clone());
        } else if let Some(stopped) = message.downcast_ref::<OnWatchStopped>() {
            self.on_watch_stopped(stopped);
        } else if let Some(task) = message.downcast_ref::<ContextTask>() {
            self.run_task(task);
        } else {
            self.invoke_actor();
        }
    }

    fn run_task(&mut self, task: &ContextTask) {
        if let Some(run) = task.take() {
            self.invoke_with(run);
        }
    }

    /// Hands the current envelope to user code inside the failure boundary.
    /// Returns whether the handler succeeded.
    fn invoke_actor(&mut self) -> bool {
        let started = Instant::now();
        let actor = &mut self.actor;
        let ctx = &mut self.ctx;
        let outcome = catch_unwind(AssertUnwindSafe(|| actor.receive(ctx)));
        self.settle(started, outcome)
    }

    /// Runs a closure against the context inside the failure boundary.
    fn invoke_with<F>(&mut self, run: F) -> bool
    where
        F: FnOnce(&mut ActorContext) -> anyhow::Result<()>,
    {
        let started = Instant::now();
        let ctx = &mut self.ctx;
        let outcome = catch_unwind(AssertUnwindSafe(|| run(ctx)));
        self.settle(started, outcome)
    }

    fn settle(&mut self, started: Instant, outcome: std::thread::Result<anyhow::Result<()>>) -> bool {
        if let Some(threshold) = self.ctx.system().config().slow_message_threshold() {
            let elapsed = started.elapsed();
            if elapsed > threshold {
                warn!(
                    actor = %self.ctx.address(),
                    message = self.ctx.message().type_name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow message"
                );
            }
        }
        let reason = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(error)) => AccidentReason::Error(Arc::new(error)),
            Err(payload) => AccidentReason::Panic(panic_message(payload.as_ref())),
        };
        self.on_accident(reason);
        false
    }

    #[instrument(skip(self), fields(actor = %self.ctx.address()), level = "debug")]
    fn on_accident(&mut self, reason: AccidentReason) {
        self.ctx.mailbox.suspend();
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => backtrace.to_string(),
            _ => String::new(),
        };
        let message = self.ctx.message().clone();
        let culprit = self.ctx.sender().clone();
        warn!(
            actor = %self.ctx.address(),
            message = message.type_name(),
            culprit = %culprit,
            reason = %reason,
            "accident"
        );
        let record = match &self.accident {
            Some(chain) if self.launching => {
                chain.record_restart_failed(culprit, message, reason, stack);
                chain.clone()
            }
            _ => AccidentRecord::new(
                self.me(),
                Arc::clone(&self.ctx.mailbox),
                culprit,
                message,
                reason,
                stack,
            ),
        };
        self.accident = Some(record.clone());
        self.ctx.system().notify_hooks(|hook| hook.on_accident(&record));
        self.supervise(record);
    }

    /// Lets this actor's supervisor decide on `record`, escalating when it does not.
    #[instrument(skip(self, record), fields(actor = %self.ctx.address(), victim = %record.victim()), level = "debug")]
    fn supervise(&mut self, record: AccidentRecord) {
        record.bind_responsible(self.ctx.responsible());
        let supervisor = self
            .ctx
            .props
            .supervisor()
            .cloned()
            .unwrap_or_else(|| self.ctx.system().default_supervisor());
        if catch_unwind(AssertUnwindSafe(|| supervisor.decide(&record))).is_err() {
            error!(actor = %self.ctx.address(), victim = %record.victim(), "supervisor panicked");
        }
        if !record.is_finished() {
            record.escalate();
        }
        if record.is_delayed() {
            self.unfinished.insert(record.victim().clone(), record);
        }
    }

    fn on_launch(&mut self, restarted: bool) {
        self.launching = true;
        let launched = self.recover() && self.invoke_actor();
        self.launching = false;
        if !launched {
            return;
        }
        if self.accident.take().is_some() {
            debug!(actor = %self.ctx.address(), "failure chain cleared by a successful launch");
        }
        debug!(actor = %self.ctx.address(), restarted, "launched");
        let me = self.me();
        self.ctx
            .system()
            .notify_hooks(|hook| hook.on_actor_launched(&me, restarted));
    }

    /// Replays stored state into the fresh instance. Returns whether the replay succeeded.
    fn recover(&mut self) -> bool {
        let Some(state) = self.ctx.persistence.as_mut() else {
            return true;
        };
        let replay = match state.load() {
            Ok(replay) => replay,
            Err(error) => {
                self.on_accident(AccidentReason::Error(Arc::new(anyhow::Error::new(error))));
                return false;
            }
        };
        state.set_recovering(true);
        let me = self.me();
        let launch = self.ctx.envelope().clone();
        let mut recovered = true;
        for message in replay {
            self.ctx
                .set_envelope(Envelope::new(me.clone(), me.clone(), MessageClass::User, message));
            if !self.invoke_actor() {
                recovered = false;
                break;
            }
        }
        if let Some(state) = self.ctx.persistence.as_mut() {
            state.set_recovering(false);
        }
        if recovered {
            self.ctx.set_envelope(launch);
        }
        recovered
    }

    #[instrument(skip(self), fields(actor = %self.ctx.address()), level = "debug")]
    fn on_kill(&mut self, kill: OnKill) {
        if kill.is_restart() {
            if !self.ctx.state.transition(LifeStatus::Alive, LifeStatus::Restarting) {
                trace!(actor = %self.ctx.address(), status = %self.ctx.status(), "restart ignored");
                return;
            }
            self.ctx.mailbox.suspend();
            debug!(actor = %self.ctx.address(), reason = kill.reason(), "restarting");
            self.notify_pre_restart(kill.reason());
            self.flush_persistence();
            let me = self.me();
            self.stop_children(Message::new(OnKill::poison(me, "parent restarting")), MessageClass::User);
            self.refresh();
            return;
        }

        let upgraded = self.ctx.state.transition(LifeStatus::Restarting, LifeStatus::Terminating);
        if !upgraded && !self.ctx.state.transition(LifeStatus::Alive, LifeStatus::Terminating) {
            trace!(actor = %self.ctx.address(), status = %self.ctx.status(), "kill ignored");
            return;
        }
        self.ctx.mailbox.suspend();
        debug!(
            actor = %self.ctx.address(),
            reason = kill.reason(),
            operator = %kill.operator(),
            poison = kill.is_poison(),
            "terminating"
        );
        self.invoke_actor();
        self.flush_persistence();
        self.abandon_unfinished();

        let me = self.me();
        let (cascade, class) = if kill.is_poison() {
            (OnKill::poison(me, kill.reason()), MessageClass::User)
        } else {
            (OnKill::kill(me, kill.reason()), MessageClass::System)
        };
        self.termination = Some(kill);
        self.stop_children(Message::new(cascade), class);
        self.refresh();
    }

    /// Tells the outgoing instance it is about to be replaced. Failures are
    /// logged only; a restart cannot be vetoed.
    fn notify_pre_restart(&mut self, reason: &str) {
        let me = self.me();
        let notice = Envelope::new(
            me.clone(),
            me,
            MessageClass::System,
            Message::new(OnPreRestart::new(reason)),
        );
        let previous = self.ctx.set_envelope(notice);
        let actor = &mut self.actor;
        let ctx = &mut self.ctx;
        match catch_unwind(AssertUnwindSafe(|| actor.receive(ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(actor = %self.ctx.address(), error = %error, "pre-restart handler failed")
            }
            Err(payload) => warn!(
                actor = %self.ctx.address(),
                panic = %panic_message(payload.as_ref()),
                "pre-restart handler panicked"
            ),
        }
        self.ctx.set_envelope(previous);
    }

    fn flush_persistence(&mut self) {
        if self.ctx.persistence.is_none() {
            return;
        }
        if let Err(error) = self.ctx.persist() {
            error!(actor = %self.ctx.address(), error = %error, "state could not be saved");
        }
    }

    /// Kills children whose delayed restart this actor's supervisor still owes.
    fn abandon_unfinished(&mut self) {
        let me = self.me();
        for (victim, _) in self.unfinished.drain() {
            if victim != me {
                self.ctx.tell_class(
                    &victim,
                    Message::new(OnKill::kill(me.clone(), "supervisor terminating")),
                    MessageClass::System,
                );
            }
        }
    }

    fn stop_children(&self, message: Message, class: MessageClass) {
        for child in self.ctx.children.values() {
            self.ctx.tell_class(child, message.clone(), class);
        }
    }

    fn on_child_killed(&mut self, child: &Address, reason: &str) {
        // A same-named successor may already be registered under the name.
        if self
            .ctx
            .children
            .get(child.name())
            .is_some_and(|known| known.same_instance(child))
        {
            self.ctx.children.remove(child.name());
        }
        self.unfinished.remove(child);
        trace!(actor = %self.ctx.address(), child = %child, reason, "child terminated");
        self.refresh();
    }

    /// Completes a pending restart or termination once every child is gone.
    fn refresh(&mut self) {
        if !self.ctx.children.is_empty() {
            return;
        }
        match self.ctx.status() {
            LifeStatus::Restarting => self.complete_restart(),
            LifeStatus::Terminating => {
                if self.ctx.state.transition(LifeStatus::Terminating, LifeStatus::Terminated) {
                    self.complete_termination();
                }
            }
            LifeStatus::Alive | LifeStatus::Terminated => {}
        }
    }

    fn complete_restart(&mut self) {
        self.ctx.scheduler.retain(|key| key.starts_with(WATCH_TIMER_PREFIX));
        let props = &self.ctx.props;
        let fresh = match catch_unwind(AssertUnwindSafe(|| props.provide())) {
            Ok(actor) => actor,
            Err(payload) => {
                error!(
                    actor = %self.ctx.address(),
                    panic = %panic_message(payload.as_ref()),
                    "actor could not be rebuilt, terminating"
                );
                let me = self.me();
                self.termination = Some(OnKill::kill(me, "actor could not be rebuilt"));
                self.ctx.state.store(LifeStatus::Terminating);
                self.refresh();
                return;
            }
        };
        self.actor = fresh;
        self.ctx.state.store(LifeStatus::Alive);
        let me = self.me();
        let launch = OnLaunch::new(true, self.ctx.props.launch_context());
        self.ctx
            .mailbox
            .deliver(Envelope::new(me.clone(), me, MessageClass::System, Message::new(launch)));
        self.ctx.mailbox.resume();
    }

    fn complete_termination(&mut self) {
        let me = self.me();
        let kill = self
            .termination
            .take()
            .unwrap_or_else(|| OnKill::kill(me.clone(), "terminated"));
        self.ctx.scheduler.clear();

        let watchers: Vec<Address> = self.ctx.watchers.drain().collect();
        for watcher in watchers {
            if watcher == me {
                self.on_watch_stopped(&OnWatchStopped::terminated(me.clone()));
            } else {
                self.ctx.tell_class(
                    &watcher,
                    Message::new(OnWatchStopped::terminated(me.clone())),
                    MessageClass::User,
                );
            }
        }
        let watching: Vec<Address> = self.ctx.watching.drain().map(|(target, _)| target).collect();
        for target in watching.iter().filter(|target| **target != me) {
            self.ctx
                .tell_class(target, Message::new(OnUnwatch), MessageClass::System);
        }

        let system = self.ctx.system().clone();
        system.registry().unregister(kill.operator(), &me);
        debug!(actor = %me, reason = kill.reason(), "terminated");
        system.notify_hooks(|hook| hook.on_actor_terminated(&me));
        match self.ctx.parent() {
            Some(parent) => self.ctx.tell_class(
                parent,
                Message::new(OnKilled {
                    reason: kill.reason().to_string(),
                }),
                MessageClass::System,
            ),
            None => system.mark_terminated(),
        }
        // Whatever is still queued drains into the fallback process.
        self.ctx.mailbox.resume();
    }

    /// Handles a termination notice for a watched target, exactly once per watch.
    pub(crate) fn on_watch_stopped(&mut self, stopped: &OnWatchStopped) {
        let target = stopped.target().clone();
        let Some(handlers) = self.ctx.watching.remove(&target) else {
            trace!(actor = %self.ctx.address(), target = %target, "notice for an unwatched target");
            return;
        };
        self.ctx.stop_heartbeat(&target);
        if stopped.is_heartbeat_lost() {
            warn!(actor = %self.ctx.address(), target = %target, "watched actor unreachable");
        } else {
            debug!(actor = %self.ctx.address(), target = %target, "watched actor terminated");
        }

        let me = self.me();
        let notice = Envelope::new(
            target,
            me,
            MessageClass::User,
            Message::new(stopped.clone()),
        );
        let previous = self.ctx.set_envelope(notice);
        if handlers.is_empty() {
            self.invoke_actor();
        } else {
            for handler in handlers {
                let stopped = stopped.clone();
                if !self.invoke_with(move |ctx| handler.handle(ctx, &stopped)) {
                    break;
                }
            }
        }
        self.ctx.set_envelope(previous);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Debug for ActorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCell")
            .field("ctx", &self.ctx)
            .field("unfinished", &self.unfinished.len())
            .field("launching", &self.launching)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_text() {
        let borrowed: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(borrowed.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
