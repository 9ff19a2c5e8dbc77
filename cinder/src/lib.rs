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

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

//! # Cinder
//!
//! An actor runtime built on Tokio. Actors are isolated units of state that
//! handle one message at a time and interact only by sending messages.
//!
//! ## Key Concepts
//!
//! - **Actors**: user logic implementing [`Actor`](prelude::Actor), spawned from
//!   [`Props`](prelude::Props) into a tree rooted at the system's guardian.
//! - **Mailboxes**: every actor has a system lane for lifecycle traffic and a
//!   user lane for application messages; the system lane always goes first and
//!   only the user lane is ever suspended.
//! - **Supervision**: a failing handler suspends its actor and produces an
//!   [`AccidentRecord`](prelude::AccidentRecord); the supervisor resumes,
//!   restarts (optionally with exponential backoff), kills or escalates.
//! - **Watches**: any actor can ask to be told, exactly once, when another one
//!   terminates; heartbeats detect targets that silently disappear.
//! - **Ask**: a one-shot request/reply with a timeout, resolved by an
//!   [`AskFuture`](prelude::AskFuture).
//! - **Location transparency**: [`Address`](prelude::Address)es carry a host;
//!   envelopes for other hosts go through a pluggable
//!   [`Transport`](prelude::Transport).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cinder::prelude::*;
//!
//! #[cinder_message]
//! struct Greet(String);
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = CinderApp::launch_async().await;
//!     let greeter = system.spawn(Props::new(|| {
//!         |ctx: &mut ActorContext| {
//!             if let Some(Greet(name)) = ctx.message_as::<Greet>() {
//!                 println!("hello, {name}");
//!             }
//!             Ok(())
//!         }
//!     }))?;
//!     system.tell(&greeter, Greet("world".into()));
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```

/// Runtime plumbing: system, mailboxes, registry, timers, ask futures and configuration.
pub(crate) mod common;

/// Actor description, context, lifecycle and supervision.
pub(crate) mod actor;

/// Addresses, envelopes and the runtime's message vocabulary.
pub(crate) mod message;

/// Core traits and collaborator seams.
pub(crate) mod traits;

/// A prelude module for conveniently importing the most commonly used items.
///
/// # Re-exports
///
/// ## Macros (from `cinder-macro`)
/// *   [`cinder_macro::cinder_message`]: Attribute macro for defining messages.
/// *   [`cinder_macro::cinder_actor`]: Attribute macro for defining actor structs.
///
/// ## External Crates
/// *   [`async_trait::async_trait`](https://docs.rs/async-trait/latest/async_trait/attr.async_trait.html): needed to implement [`Transport`](crate::traits::Transport).
///
/// ## Core Types
/// *   [`crate::common::CinderApp`], [`crate::common::CinderBuilder`], [`crate::common::ActorSystem`]
/// *   [`crate::actor::Props`], [`crate::actor::ActorContext`], [`crate::actor::Behavior`]
/// *   [`crate::actor::AccidentRecord`], [`crate::actor::DefaultSupervisor`]
/// *   [`crate::message::Address`], [`crate::message::Envelope`] and the lifecycle notices
/// *   [`crate::traits::Actor`], [`crate::traits::ActorMessage`], [`crate::traits::Message`] and the collaborator traits
pub mod prelude {
    // Macros from cinder-macro
    pub use cinder_macro::*;

    // External crate re-exports
    pub use async_trait::async_trait;

    // Core types
    pub use crate::actor::{
        AccidentReason, AccidentRecord, ActorContext, Behavior, DefaultSupervisor, LifeStatus,
        MemoryStorage, PersistenceError, Props, RestartLimiterConfig,
    };
    pub use crate::common::config::{
        PersistenceConfig, SystemConfig, TimeoutConfig, WatchConfig,
    };
    pub use crate::common::{
        ActorSystem, AskError, AskFuture, CinderApp, CinderBuilder, CinderConfig, Dispatcher,
        DrainTask, Mailbox, ProcessRegistry, RegistryError, Scheduler, SpawnError, SystemError,
        TokioDispatcher, CONFIG,
    };
    pub use crate::message::{
        Address, Envelope, Failure, LaunchContext, MessageClass, OnKill, OnLaunch, OnPreRestart,
        OnWatchStopped, ROOT_PATH,
    };
    pub use crate::traits::{
        Actor, ActorMessage, ActorProvider, Codec, Message, PersistentStorage, Process, Recovered,
        Supervisor, SystemHook, Transport, WatchHandler,
    };
}
