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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use static_assertions::assert_impl_all;
use tracing::{debug, error, warn};

use crate::actor::RestartLimiterConfig;
use crate::common::{ActorSystem, Mailbox, Scheduler};
use crate::message::{AccidentFinished, Address, MessageClass, OnKill, OnLaunch};
use crate::traits::{Message, Supervisor};

/// Why user code failed.
#[derive(Debug, Clone)]
pub enum AccidentReason {
    /// The handler panicked with this payload.
    Panic(String),
    /// The handler returned this error.
    Error(Arc<anyhow::Error>),
}

impl fmt::Display for AccidentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic(payload) => write!(f, "panic: {payload}"),
            Self::Error(error) => write!(f, "error: {error:#}"),
        }
    }
}

/// The actor whose supervisor currently owns a record.
#[derive(Clone)]
pub(crate) struct Responsible {
    pub(crate) address: Address,
    pub(crate) parent: Option<Address>,
    pub(crate) system: ActorSystem,
    pub(crate) scheduler: Scheduler,
}

struct Details {
    prime_culprit: Address,
    message: Message,
    reason: AccidentReason,
    stack: String,
}

struct RecordInner {
    victim: Address,
    mailbox: Arc<Mailbox>,
    details: RwLock<Details>,
    restart_times: Mutex<Vec<Instant>>,
    finished: AtomicBool,
    delayed: AtomicBool,
    responsible: RwLock<Option<Responsible>>,
}

/// A captured user-code failure awaiting a supervision decision.
///
/// The victim's mailbox stays suspended until a directive is applied. The
/// first directive wins; any later call on the same record is ignored, so a
/// supervisor that decides twice (or from two threads) cannot act twice.
/// Escalation hands the same record to the parent's supervisor, which again
/// gets exactly one decision.
///
/// Restart attempts accumulate on the record across repeated failures of the
/// same restart chain and are forgotten once a restarted instance launches
/// successfully.
#[derive(Clone)]
pub struct AccidentRecord {
    inner: Arc<RecordInner>,
}

impl AccidentRecord {
    pub(crate) fn new(
        victim: Address,
        mailbox: Arc<Mailbox>,
        prime_culprit: Address,
        message: Message,
        reason: AccidentReason,
        stack: String,
    ) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                victim,
                mailbox,
                details: RwLock::new(Details {
                    prime_culprit,
                    message,
                    reason,
                    stack,
                }),
                restart_times: Mutex::new(Vec::new()),
                finished: AtomicBool::new(false),
                delayed: AtomicBool::new(false),
                responsible: RwLock::new(None),
            }),
        }
    }

    /// Reuses the record for a failure of the instance it restarted, keeping the attempt history.
    pub(crate) fn record_restart_failed(
        &self,
        prime_culprit: Address,
        message: Message,
        reason: AccidentReason,
        stack: String,
    ) {
        *self.inner.details.write() = Details {
            prime_culprit,
            message,
            reason,
            stack,
        };
    }

    pub(crate) fn bind_responsible(&self, responsible: Responsible) {
        *self.inner.responsible.write() = Some(responsible);
        self.inner.delayed.store(false, Ordering::Release);
        self.inner.finished.store(false, Ordering::Release);
    }

    pub(crate) fn is_delayed(&self) -> bool {
        self.inner.delayed.load(Ordering::Acquire)
    }

    /// The actor whose user code failed.
    pub fn victim(&self) -> &Address {
        &self.inner.victim
    }

    /// The sender of the message being handled when the failure happened.
    pub fn prime_culprit(&self) -> Address {
        self.inner.details.read().prime_culprit.clone()
    }

    /// The message being handled when the failure happened.
    pub fn message(&self) -> Message {
        self.inner.details.read().message.clone()
    }

    /// What went wrong.
    pub fn reason(&self) -> AccidentReason {
        self.inner.details.read().reason.clone()
    }

    /// Backtrace captured at the failure; empty unless backtraces are enabled.
    pub fn stack(&self) -> String {
        self.inner.details.read().stack.clone()
    }

    /// Restart attempts made so far in this failure chain.
    pub fn restart_count(&self) -> usize {
        self.inner.restart_times.lock().len()
    }

    /// When each restart attempt of this chain was scheduled.
    pub fn restart_times(&self) -> Vec<Instant> {
        self.inner.restart_times.lock().clone()
    }

    /// Whether the current supervisor already applied a directive.
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// The actor whose supervisor is deciding.
    pub fn responsible(&self) -> Option<Address> {
        self.inner.responsible.read().as_ref().map(|r| r.address.clone())
    }

    fn finish(&self) -> bool {
        self.inner
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn current_responsible(&self) -> Option<Responsible> {
        self.inner.responsible.read().clone()
    }

    /// Drops the failed message and lets the victim carry on with its current state.
    pub fn resume(&self) {
        if !self.finish() {
            return;
        }
        debug!(victim = %self.victim(), "accident resolved: resume");
        self.inner.mailbox.resume();
    }

    /// Replaces the victim's instance with a fresh one; queued messages survive.
    pub fn restart(&self, reason: impl Into<String>) {
        if !self.finish() {
            return;
        }
        let reason = reason.into();
        debug!(victim = %self.victim(), reason = %reason, "accident resolved: restart");
        self.apply_restart(reason);
    }

    /// Restarts after an exponentially growing delay, or kills the victim once
    /// `policy.restart_limit` attempts have been made in this failure chain.
    pub fn exponential_backoff_restart(&self, policy: &RestartLimiterConfig) {
        if !self.finish() {
            return;
        }
        let attempts = self.restart_count();
        if policy.limit_reached(attempts) {
            warn!(victim = %self.victim(), attempts, "restart limit reached, killing the actor");
            self.apply_kill(format!("restart limit of {} reached: {}", policy.restart_limit, self.reason()));
            return;
        }
        let Some(responsible) = self.current_responsible() else {
            error!(victim = %self.victim(), "backoff restart without a responsible actor");
            return;
        };
        let delay = policy.next_delay(attempts);
        self.inner.restart_times.lock().push(Instant::now());
        self.inner.delayed.store(true, Ordering::Release);
        debug!(victim = %self.victim(), attempt = attempts + 1, delay_ms = delay.as_millis() as u64, "accident resolved: backoff restart");

        let record = self.clone();
        let reason = format!("backoff restart {} after {}", attempts + 1, self.reason());
        responsible
            .scheduler
            .after(format!("[backoff]{}", self.victim()), delay, async move {
                record.apply_restart(reason);
                if let Some(owner) = record.current_responsible() {
                    owner.system.tell_from(
                        &owner.address,
                        &owner.address,
                        Message::new(AccidentFinished {
                            victim: record.victim().clone(),
                        }),
                        MessageClass::System,
                    );
                }
            });
    }

    /// Terminates the victim right away, abandoning its queued user messages.
    pub fn kill(&self, reason: impl Into<String>) {
        if !self.finish() {
            return;
        }
        self.apply_kill(reason.into());
    }

    /// Terminates the victim once its already queued user messages are processed.
    pub fn poison_kill(&self, reason: impl Into<String>) {
        if !self.finish() {
            return;
        }
        let reason = reason.into();
        debug!(victim = %self.victim(), reason = %reason, "accident resolved: poison kill");
        if let Some(responsible) = self.current_responsible() {
            responsible.system.tell_from(
                &responsible.address,
                self.victim(),
                Message::new(OnKill::poison(responsible.address.clone(), reason)),
                MessageClass::User,
            );
        }
        self.inner.mailbox.resume();
    }

    /// Hands the decision to the responsible actor's parent.
    pub fn escalate(&self) {
        if !self.finish() {
            return;
        }
        let Some(responsible) = self.current_responsible() else {
            return;
        };
        match &responsible.parent {
            Some(parent) => {
                debug!(victim = %self.victim(), from = %responsible.address, to = %parent, "accident escalated");
                responsible.system.tell_from(
                    &responsible.address,
                    parent,
                    Message::new(self.clone()),
                    MessageClass::System,
                );
            }
            None => {
                error!(
                    victim = %self.victim(),
                    reason = %self.reason(),
                    "fatal: accident escalated beyond the root, no supervisor left to decide"
                );
            }
        }
    }

    fn apply_restart(&self, reason: String) {
        let Some(responsible) = self.current_responsible() else {
            return;
        };
        responsible.system.tell_from(
            &responsible.address,
            self.victim(),
            Message::new(OnKill::restart(responsible.address.clone(), reason)),
            MessageClass::System,
        );
        self.inner.mailbox.resume();
    }

    fn apply_kill(&self, reason: String) {
        debug!(victim = %self.victim(), reason = %reason, "accident resolved: kill");
        if let Some(responsible) = self.current_responsible() {
            responsible.system.tell_from(
                &responsible.address,
                self.victim(),
                Message::new(OnKill::kill(responsible.address.clone(), reason)),
                MessageClass::System,
            );
        }
    }
}

impl fmt::Debug for AccidentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self.inner.details.read();
        f.debug_struct("AccidentRecord")
            .field("victim", &format_args!("{}", self.inner.victim))
            .field("prime_culprit", &format_args!("{}", details.prime_culprit))
            .field("message", &details.message.type_name())
            .field("reason", &format_args!("{}", details.reason))
            .field("restarts", &self.restart_count())
            .field("finished", &self.is_finished())
            .finish()
    }
}

assert_impl_all!(AccidentRecord: Send, Sync, Clone);

/// The supervisor used when an actor has none of its own.
///
/// *   A failure while handling the first, non-restarted [`OnLaunch`] kills the
///     actor, since restarting would most likely fail the same way.
/// *   A failure while handling an [`OnKill`] repeats the same kind of kill.
/// *   Any other failure, including a failed restarted launch, restarts with
///     exponential backoff until the configured limit, then kills.
///
/// Replace it per actor with [`Props::with_supervisor`](crate::actor::Props::with_supervisor),
/// or for the root with [`CinderBuilder::root_supervisor`](crate::common::CinderBuilder::root_supervisor).
#[derive(Debug, Clone, Default)]
pub struct DefaultSupervisor {
    policy: RestartLimiterConfig,
}

impl DefaultSupervisor {
    /// Uses `policy` for backoff restarts.
    pub fn new(policy: RestartLimiterConfig) -> Self {
        Self { policy }
    }

    /// The backoff policy.
    pub fn policy(&self) -> &RestartLimiterConfig {
        &self.policy
    }
}

impl Supervisor for DefaultSupervisor {
    fn decide(&self, record: &AccidentRecord) {
        let message = record.message();
        if let Some(launch) = message.downcast_ref::<OnLaunch>() {
            if launch.restarted() {
                record.exponential_backoff_restart(&self.policy);
            } else {
                record.kill(format!("launch failed: {}", record.reason()));
            }
        } else if let Some(kill) = message.downcast_ref::<OnKill>() {
            if kill.is_poison() {
                record.poison_kill(kill.reason());
            } else {
                record.kill(kill.reason());
            }
        } else {
            record.exponential_backoff_restart(&self.policy);
        }
    }
}
