//! Runtime plumbing shared by every actor.
//!
//! # Key Re-exported Components:
//!
//! *   [`CinderApp`] / [`CinderBuilder`]: launch an [`ActorSystem`].
//! *   [`ActorSystem`]: spawn top-level actors, talk to them from outside, shut down.
//! *   [`AskFuture`]: the pending reply of an ask.
//! *   [`Mailbox`] and [`Dispatcher`]: two-lane queues and the worker pool draining them.
//! *   [`Scheduler`]: keyed one-shot and repeating timers.
//! *   [`ProcessRegistry`]: address to process resolution, with a fallback for misses.
//! *   [`CinderConfig`]: XDG-loaded configuration.

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
pub use actor_system::{ActorSystem, SpawnError, SystemError};
pub use cinder::{CinderApp, CinderBuilder};
pub use config::{
    CinderConfig, PersistenceConfig, SystemConfig, TimeoutConfig, WatchConfig, CONFIG,
};
pub use future::{AskError, AskFuture};
pub use mailbox::{Dispatcher, DrainTask, Mailbox, TokioDispatcher};
pub use registry::{ProcessRegistry, RegistryError};
pub use scheduler::Scheduler;

// --- Crate-Internal Re-exports ---
pub(crate) use mailbox::Recipient;

/// Defines `ActorSystem` and its errors.
mod actor_system;
/// Defines the `CinderApp` entry point and `CinderBuilder`.
mod cinder;
/// Defines the configuration system.
pub mod config;
/// Defines `AskFuture`.
mod future;
/// Defines the two-lane mailbox and dispatchers.
mod mailbox;
/// Defines the process registry and the dead letter process.
mod registry;
/// Defines per-host ordered streams to remote processes.
mod remote;
/// Defines keyed timers.
mod scheduler;
