//! Actors: how they are described, run, supervised and restarted.
//!
//! # Key Components
//!
//! *   [`Props`]: recipe for spawning an actor and for rebuilding it on restart.
//! *   [`ActorContext`]: everything an actor can see and do while handling a message,
//!     including watches, timers and persistence.
//! *   [`Behavior`]: a typed handler table that implements [`Actor`](crate::traits::Actor).
//! *   [`AccidentRecord`] and [`DefaultSupervisor`]: failure capture and the stock
//!     recovery policy, tuned through [`RestartLimiterConfig`].
//! *   [`MemoryStorage`]: an in-process [`PersistentStorage`](crate::traits::PersistentStorage).

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

// --- Public Re-exports ---
pub use actor_context::ActorContext;
pub use behavior::Behavior;
pub use lifecycle::LifeStatus;
pub use persistence::{MemoryStorage, PersistenceError};
pub use props::Props;
pub use restart_limiter::RestartLimiterConfig;
pub use supervision::{AccidentReason, AccidentRecord, DefaultSupervisor};

// --- Crate-Internal Re-exports ---
pub(crate) use actor_cell::ActorProcess;
pub(crate) use guardian::Guardian;

/// Contains `ActorProcess` and the cell driving lifecycle, routing and supervision.
mod actor_cell;
/// Contains the `ActorContext` handed to user code.
mod actor_context;
/// Contains the typed `Behavior` handler table.
mod behavior;
/// Contains the root actor.
mod guardian;
/// Contains lifecycle states.
mod lifecycle;
/// Contains persistence bookkeeping and the in-memory store.
mod persistence;
/// Contains `Props`.
mod props;
/// Contains the backoff policy.
mod restart_limiter;
/// Contains accident records and the default supervisor.
mod supervision;
/// Contains watch and heartbeat operations on `ActorContext`.
mod watch;
