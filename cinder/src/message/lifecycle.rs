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

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::actor::{AccidentRecord, ActorContext};
use crate::message::Address;
use crate::traits::{ActorMessage, Message};

/// Values handed to every instance of an actor on launch, keyed by name.
pub type LaunchContext = HashMap<String, Message>;

/// First message every actor instance sees, once per launch and once per restart.
///
/// For persistent actors, recovery has completed before this arrives.
#[derive(Debug, Clone)]
pub struct OnLaunch {
    restarted: bool,
    launched_at: SystemTime,
    context: Arc<LaunchContext>,
}

impl OnLaunch {
    pub(crate) fn new(restarted: bool, context: LaunchContext) -> Self {
        Self {
            restarted,
            launched_at: SystemTime::now(),
            context: Arc::new(context),
        }
    }

    /// `true` when this instance replaces one that was restarted.
    pub fn restarted(&self) -> bool {
        self.restarted
    }

    /// Wall clock time at which the launch was requested.
    pub fn launched_at(&self) -> SystemTime {
        self.launched_at
    }

    /// The full launch context.
    pub fn context(&self) -> &LaunchContext {
        &self.context
    }

    /// Looks up one launch context value by key and type.
    pub fn context_value<T: ActorMessage>(&self, key: &str) -> Option<&T> {
        self.context.get(key).and_then(Message::downcast_ref::<T>)
    }
}

/// Termination request, and the notice an actor's own logic gets when it is being terminated.
///
/// A forceful kill travels in the system lane and overtakes queued user work;
/// a poison kill travels in the user lane behind it.
#[derive(Debug, Clone)]
pub struct OnKill {
    reason: String,
    operator: Address,
    poison: bool,
    restart: bool,
}

impl OnKill {
    pub(crate) fn kill(operator: Address, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            operator,
            poison: false,
            restart: false,
        }
    }

    pub(crate) fn poison(operator: Address, reason: impl Into<String>) -> Self {
        Self {
            poison: true,
            ..Self::kill(operator, reason)
        }
    }

    pub(crate) fn restart(operator: Address, reason: impl Into<String>) -> Self {
        Self {
            restart: true,
            ..Self::kill(operator, reason)
        }
    }

    /// Why the actor is being terminated.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Who asked for the termination.
    pub fn operator(&self) -> &Address {
        &self.operator
    }

    /// `true` for graceful termination that honours queued user messages.
    pub fn is_poison(&self) -> bool {
        self.poison
    }

    /// `true` when this kill is the first half of a restart.
    pub fn is_restart(&self) -> bool {
        self.restart
    }
}

/// Last chance for an actor instance to save state before a restart replaces it.
#[derive(Debug, Clone)]
pub struct OnPreRestart {
    reason: String,
}

impl OnPreRestart {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// Why the restart happens.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Termination notice for a watched actor.
///
/// Delivered to each registered watch handler, or to the watcher's own logic
/// when it registered none.
#[derive(Debug, Clone)]
pub struct OnWatchStopped {
    target: Address,
    heartbeat_lost: bool,
}

impl OnWatchStopped {
    pub(crate) fn terminated(target: Address) -> Self {
        Self {
            target,
            heartbeat_lost: false,
        }
    }

    pub(crate) fn heartbeat_lost(target: Address) -> Self {
        Self {
            target,
            heartbeat_lost: true,
        }
    }

    /// The actor that stopped.
    pub fn target(&self) -> &Address {
        &self.target
    }

    /// `true` when the notice was synthesised locally after the target stopped answering heartbeats.
    pub fn is_heartbeat_lost(&self) -> bool {
        self.heartbeat_lost
    }
}

/// An error reply. An [`AskFuture`](crate::common::AskFuture) resolving with one
/// fails with [`AskError::Replied`](crate::common::AskError::Replied).
#[derive(Clone)]
pub struct Failure {
    error: Arc<anyhow::Error>,
}

impl Failure {
    /// Wraps an error.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: Arc::new(error.into()),
        }
    }

    /// Builds a failure from a plain message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// The wrapped error.
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failure({:#})", self.error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl std::error::Error for Failure {}

// Runtime protocol messages below never reach user code.

#[derive(Debug, Clone)]
pub(crate) struct OnKilled {
    pub(crate) reason: String,
}

#[derive(Debug, Clone)]
pub(crate) struct OnWatch;

#[derive(Debug, Clone)]
pub(crate) struct WatchAck {
    pub(crate) terminated: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct OnUnwatch;

#[derive(Debug, Clone)]
pub(crate) struct OnPing;

#[derive(Debug, Clone)]
pub(crate) struct Pong;

#[derive(Debug, Clone)]
pub(crate) struct AccidentFinished {
    pub(crate) victim: Address,
}

type TaskFn = Box<dyn FnOnce(&mut ActorContext) -> anyhow::Result<()> + Send>;

/// A closure run on an actor's own worker turn. In the user lane it is user code
/// (timers) and runs inside the failure boundary; in the system lane it is runtime code.
pub(crate) struct ContextTask {
    label: &'static str,
    task: Mutex<Option<TaskFn>>,
}

impl ContextTask {
    pub(crate) fn new(
        label: &'static str,
        task: impl FnOnce(&mut ActorContext) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label,
            task: Mutex::new(Some(Box::new(task))),
        }
    }

    pub(crate) fn take(&self) -> Option<TaskFn> {
        self.task.lock().take()
    }
}

impl fmt::Debug for ContextTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextTask({})", self.label)
    }
}

/// Whether `message` is a runtime notice that may travel in the system lane
/// between hosts. [`ContextTask`] never leaves its host.
pub(crate) fn crosses_hosts_in_system_lane(message: &Message) -> bool {
    message.is::<OnLaunch>()
        || message.is::<OnKill>()
        || message.is::<OnKilled>()
        || message.is::<OnWatch>()
        || message.is::<WatchAck>()
        || message.is::<OnUnwatch>()
        || message.is::<OnWatchStopped>()
        || message.is::<OnPing>()
        || message.is::<Pong>()
        || message.is::<AccidentRecord>()
        || message.is::<AccidentFinished>()
}
