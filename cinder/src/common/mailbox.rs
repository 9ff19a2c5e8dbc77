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

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use tokio::runtime::Handle;
use tracing::trace;

use crate::message::{Envelope, MessageClass};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

/// A unit of work handed to a [`Dispatcher`].
pub type DrainTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs mailbox drain loops on a shared worker pool.
pub trait Dispatcher: Send + Sync + 'static {
    /// Schedules `task` to run once on some worker.
    fn dispatch(&self, task: DrainTask);
}

/// Dispatches onto Tokio's blocking pool.
///
/// Drain loops run synchronous user code that may wait on an ask reply or a
/// watch acknowledgement, so they must not occupy the async worker threads
/// that drive timers and transports.
#[derive(Clone)]
pub struct TokioDispatcher {
    handle: Handle,
}

impl TokioDispatcher {
    /// Dispatches onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, task: DrainTask) {
        drop(self.handle.spawn_blocking(task));
    }
}

impl fmt::Debug for TokioDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioDispatcher").finish_non_exhaustive()
    }
}

/// The consumer a mailbox feeds, one envelope at a time.
pub(crate) trait Recipient: Send + Sync {
    fn on_receive_envelope(&self, envelope: Envelope);
}

/// Per-actor two-lane queue plus the run state deciding when the actor runs.
///
/// Any number of senders may [`deliver`](Mailbox::deliver) concurrently; at
/// most one worker drains the mailbox at a time, guarded by an idle to running
/// compare-and-swap. System envelopes always drain before user envelopes, and
/// user envelopes are held back while the mailbox is suspended.
pub struct Mailbox {
    dispatcher: Arc<dyn Dispatcher>,
    recipient: OnceLock<Weak<dyn Recipient>>,
    system: Lane,
    user: Lane,
    status: AtomicU8,
    suspended: AtomicBool,
}

#[derive(Default)]
struct Lane {
    queue: Mutex<VecDeque<Envelope>>,
    depth: AtomicUsize,
}

impl Lane {
    fn push(&self, envelope: Envelope) {
        let mut queue = self.queue.lock();
        queue.push_back(envelope);
        self.depth.fetch_add(1, Ordering::AcqRel);
    }

    fn push_front(&self, envelope: Envelope) {
        let mut queue = self.queue.lock();
        queue.push_front(envelope);
        self.depth.fetch_add(1, Ordering::AcqRel);
    }

    fn pop(&self) -> Option<Envelope> {
        let mut queue = self.queue.lock();
        let envelope = queue.pop_front()?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(envelope)
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

impl Mailbox {
    pub(crate) fn new(dispatcher: Arc<dyn Dispatcher>) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            recipient: OnceLock::new(),
            system: Lane::default(),
            user: Lane::default(),
            status: AtomicU8::new(IDLE),
            suspended: AtomicBool::new(false),
        })
    }

    /// Binds the consumer. Envelopes delivered before binding stay queued.
    pub(crate) fn bind(self: &Arc<Self>, recipient: Weak<dyn Recipient>) {
        if self.recipient.set(recipient).is_ok() {
            self.dispatch();
        }
    }

    /// Queues `envelope` in the lane matching its class and makes sure a worker will see it.
    pub fn deliver(self: &Arc<Self>, envelope: Envelope) {
        match envelope.class() {
            MessageClass::System => self.system.push(envelope),
            MessageClass::User => self.user.push(envelope),
        }
        self.dispatch();
    }

    /// Withholds user envelopes until [`resume`](Mailbox::resume). System envelopes keep flowing.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Release);
    }

    /// Lifts the suspension and drains whatever queued meanwhile.
    pub fn resume(self: &Arc<Self>) {
        self.suspended.store(false, Ordering::Release);
        self.dispatch();
    }

    /// Puts a user envelope back at the head of its lane and suspends, so it is
    /// the first one handled after the next resume.
    pub(crate) fn defer(&self, envelope: Envelope) {
        self.suspend();
        self.user.push_front(envelope);
    }

    /// Whether user envelopes are currently withheld.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Number of queued system envelopes.
    pub fn system_depth(&self) -> usize {
        self.system.depth()
    }

    /// Number of queued user envelopes.
    pub fn user_depth(&self) -> usize {
        self.user.depth()
    }

    fn has_eligible_work(&self) -> bool {
        self.system.depth() > 0 || (!self.is_suspended() && self.user.depth() > 0)
    }

    fn try_claim(&self) -> bool {
        self.status
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn dispatch(self: &Arc<Self>) {
        if !self.has_eligible_work() || !self.try_claim() {
            return;
        }
        let Some(recipient) = self.recipient.get().and_then(Weak::upgrade) else {
            self.status.store(IDLE, Ordering::Release);
            return;
        };
        let mailbox = Arc::clone(self);
        self.dispatcher.dispatch(Box::new(move || mailbox.run(&*recipient)));
    }

    fn run(&self, recipient: &dyn Recipient) {
        let _reset = ResetOnUnwind(&self.status);
        loop {
            self.drain(recipient);
            self.status.store(IDLE, Ordering::Release);
            // A sender may have pushed after the last pop but before the store
            // above; its own claim attempt could have failed against RUNNING.
            if !self.has_eligible_work() || !self.try_claim() {
                return;
            }
        }
    }

    fn drain(&self, recipient: &dyn Recipient) {
        loop {
            if let Some(envelope) = self.system.pop() {
                trace!(receiver = %envelope.receiver(), message = envelope.message().type_name(), "system envelope");
                recipient.on_receive_envelope(envelope);
                continue;
            }
            if self.is_suspended() {
                return;
            }
            match self.user.pop() {
                Some(envelope) => {
                    trace!(receiver = %envelope.receiver(), message = envelope.message().type_name(), "user envelope");
                    recipient.on_receive_envelope(envelope);
                }
                None => return,
            }
        }
    }
}

/// Releases the run claim if a recipient panics, so the next delivery can
/// claim the mailbox again instead of finding it stuck in `RUNNING`.
struct ResetOnUnwind<'a>(&'a AtomicU8);

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.store(IDLE, Ordering::Release);
        }
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("system_depth", &self.system_depth())
            .field("user_depth", &self.user_depth())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

assert_impl_all!(Mailbox: Send, Sync);
