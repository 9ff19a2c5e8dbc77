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
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use static_assertions::assert_impl_all;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{trace, warn};

use crate::common::ActorSystem;
use crate::message::{Address, Envelope, Failure, MessageClass};
use crate::traits::{ActorMessage, Message, Process};

/// Why an ask did not produce a reply.
#[derive(Debug, Clone)]
pub enum AskError {
    /// No reply arrived in time.
    Timeout(Duration),
    /// Nothing is registered at the target address.
    TargetNotFound(Address),
    /// The target answered with a [`Failure`].
    Replied(Failure),
    /// A reply arrived but was not of the requested type.
    UnexpectedReply {
        /// The requested type.
        expected: &'static str,
        /// The type that arrived.
        actual: &'static str,
    },
    /// The future was closed before any reply.
    Closed(String),
}

impl fmt::Display for AskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(after) => write!(f, "ask timed out after {after:?}"),
            Self::TargetNotFound(target) => write!(f, "ask target {target} not found"),
            Self::Replied(failure) => write!(f, "ask target replied with an error: {failure}"),
            Self::UnexpectedReply { expected, actual } => {
                write!(f, "expected a {expected} reply, got {actual}")
            }
            Self::Closed(reason) => write!(f, "ask closed: {reason}"),
        }
    }
}

impl std::error::Error for AskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Replied(failure) => Some(failure),
            _ => None,
        }
    }
}

type AskResult = Result<Message, AskError>;

/// Handle on a pending ask: a short-lived process registered under the
/// asker's address that resolves exactly once, with the first reply, the
/// first error reply, the timeout, or an explicit close.
///
/// Waiting comes in two flavours: [`result`](AskFuture::result) blocks the
/// calling thread (what an actor does inside `receive`), and
/// [`result_async`](AskFuture::result_async) awaits.
#[derive(Clone)]
pub struct AskFuture {
    state: Arc<FutureState>,
}

struct FutureState {
    address: Address,
    system: ActorSystem,
    closed: AtomicBool,
    outcome: OnceLock<AskResult>,
    done: Mutex<bool>,
    done_signal: Condvar,
    resolved: watch::Sender<bool>,
    forwards: Mutex<Vec<Address>>,
    timer: Mutex<Option<AbortHandle>>,
}

impl AskFuture {
    /// Registers a future at `address`. A zero `timeout` never expires.
    pub(crate) fn register(system: ActorSystem, address: Address, timeout: Duration) -> Self {
        let (resolved, _) = watch::channel(false);
        let state = Arc::new(FutureState {
            address,
            system,
            closed: AtomicBool::new(false),
            outcome: OnceLock::new(),
            done: Mutex::new(false),
            done_signal: Condvar::new(),
            resolved,
            forwards: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
        });
        let process: Arc<dyn Process> = state.clone();
        if let Err(error) = state.system.registry().register(process) {
            warn!(future = %state.address, error = %error, "future could not be registered");
        }
        if !timeout.is_zero() {
            let weak: Weak<FutureState> = Arc::downgrade(&state);
            let timer = state.system.handle().spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(state) = weak.upgrade() {
                    state.close(Err(AskError::Timeout(timeout)));
                }
            });
            *state.timer.lock() = Some(timer.abort_handle());
            if state.closed.load(Ordering::Acquire) {
                timer.abort();
            }
        }
        Self { state }
    }

    /// The address replies are delivered to.
    pub fn address(&self) -> &Address {
        &self.state.address
    }

    /// Whether the future already resolved.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Blocks the calling thread until the future resolves.
    ///
    /// # Errors
    ///
    /// Any [`AskError`]; [`AskError::Timeout`] when no reply arrived in time.
    pub fn result(&self) -> Result<Message, AskError> {
        let mut done = self.state.done.lock();
        while !*done {
            self.state.done_signal.wait(&mut done);
        }
        drop(done);
        self.state.outcome()
    }

    /// Blocks until resolution, discarding the reply.
    ///
    /// # Errors
    ///
    /// Same as [`result`](AskFuture::result).
    pub fn wait(&self) -> Result<(), AskError> {
        self.result().map(|_| ())
    }

    /// Blocks until resolution and downcasts the reply to `T`.
    ///
    /// # Errors
    ///
    /// Same as [`result`](AskFuture::result), plus [`AskError::UnexpectedReply`].
    pub fn result_as<T: ActorMessage + Clone>(&self) -> Result<T, AskError> {
        downcast_reply(self.result()?)
    }

    /// Awaits resolution without blocking the thread.
    ///
    /// # Errors
    ///
    /// Same as [`result`](AskFuture::result).
    pub async fn result_async(&self) -> Result<Message, AskError> {
        let mut resolved = self.state.resolved.subscribe();
        if resolved.wait_for(|done| *done).await.is_err() {
            return Err(AskError::Closed("future dropped".to_string()));
        }
        self.state.outcome()
    }

    /// Awaits resolution and downcasts the reply to `T`.
    ///
    /// # Errors
    ///
    /// Same as [`result_as`](AskFuture::result_as).
    pub async fn result_as_async<T: ActorMessage + Clone>(&self) -> Result<T, AskError> {
        downcast_reply(self.result_async().await?)
    }

    /// Re-delivers the outcome to `targets` in the user lane: the reply itself,
    /// or a [`Failure`] describing the error. Targets added before resolution
    /// are served on resolution.
    pub fn forward(&self, targets: impl IntoIterator<Item = Address>) {
        let ready: Vec<Address> = {
            let mut forwards = self.state.forwards.lock();
            if self.state.outcome.get().is_some() {
                targets.into_iter().collect()
            } else {
                forwards.extend(targets);
                Vec::new()
            }
        };
        self.state.deliver_forwards(ready);
    }

    /// Resolves the future with [`AskError::Closed`] unless it already resolved.
    pub fn close(&self, reason: impl Into<String>) {
        self.state.close(Err(AskError::Closed(reason.into())));
    }

    pub(crate) fn fail(&self, error: AskError) {
        self.state.close(Err(error));
    }
}

fn downcast_reply<T: ActorMessage + Clone>(message: Message) -> Result<T, AskError> {
    message
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| AskError::UnexpectedReply {
            expected: std::any::type_name::<T>(),
            actual: message.type_name(),
        })
}

impl FutureState {
    fn outcome(&self) -> Result<Message, AskError> {
        self.outcome
            .get()
            .cloned()
            .unwrap_or_else(|| Err(AskError::Closed("resolved without an outcome".to_string())))
    }

    fn close(&self, outcome: AskResult) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let _ = self.outcome.set(outcome);
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        self.system.registry().unregister(&self.address, &self.address);

        *self.done.lock() = true;
        self.done_signal.notify_all();
        self.resolved.send_replace(true);
        trace!(future = %self.address, "future resolved");

        let pending = std::mem::take(&mut *self.forwards.lock());
        self.deliver_forwards(pending);
    }

    fn deliver_forwards(&self, targets: Vec<Address>) {
        if targets.is_empty() {
            return;
        }
        let message = match self.outcome() {
            Ok(message) => message,
            Err(error) => Message::new(Failure::new(error)),
        };
        for target in targets {
            self.system
                .tell_from(&self.address, &target, message.clone(), MessageClass::User);
        }
    }
}

impl Process for FutureState {
    fn address(&self) -> &Address {
        &self.address
    }

    fn send(&self, envelope: Envelope) {
        let message = envelope.message().clone();
        let outcome = match message.downcast_ref::<Failure>() {
            Some(failure) => Err(AskError::Replied(failure.clone())),
            None => Ok(message),
        };
        self.close(outcome);
    }

    fn is_terminated(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for AskFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskFuture")
            .field("address", &format_args!("{}", self.state.address))
            .field("closed", &self.is_closed())
            .finish()
    }
}

assert_impl_all!(AskFuture: Send, Sync, Clone);
assert_impl_all!(AskError: Send, Sync);
