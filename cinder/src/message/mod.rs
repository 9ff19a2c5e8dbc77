//! Message addressing and the runtime's message vocabulary.
//!
//! *   [`Address`]: host + path identity of any process, local or remote.
//! *   [`Envelope`]: a message in transit, with its sender, receiver, optional
//!     reply agent and [`MessageClass`].
//! *   Lifecycle notices delivered to user code: [`OnLaunch`], [`OnKill`],
//!     [`OnPreRestart`], [`OnWatchStopped`], plus [`Failure`] for error replies.
//!
//! The remaining protocol messages (watch requests, heartbeats, child
//! termination reports) are crate-internal.

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
pub use address::{Address, ROOT_PATH};
pub use envelope::{Envelope, MessageClass};
pub use lifecycle::{Failure, LaunchContext, OnKill, OnLaunch, OnPreRestart, OnWatchStopped};

// --- Crate-Internal Re-exports ---
pub(crate) use lifecycle::{
    crosses_hosts_in_system_lane, AccidentFinished, ContextTask, OnKilled, OnPing, OnUnwatch, OnWatch,
    Pong, WatchAck,
};

/// Defines [`Address`].
mod address;
/// Defines [`Envelope`] and [`MessageClass`].
mod envelope;
/// Defines lifecycle notices and the internal protocol messages.
mod lifecycle;
