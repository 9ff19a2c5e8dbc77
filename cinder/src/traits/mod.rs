//! Core traits of the Cinder runtime.
//!
//! *   [`ActorMessage`] / [`Message`]: what can be sent.
//! *   [`Actor`] / [`ActorProvider`]: user logic and how fresh instances are built.
//! *   [`Supervisor`]: accident recovery policy.
//! *   [`WatchHandler`]: reaction to a watched actor stopping.
//! *   [`Process`]: anything an address can resolve to.
//! *   Collaborator seams: [`Transport`], [`Codec`], [`PersistentStorage`], [`SystemHook`].

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

pub use actor::{Actor, ActorProvider};
pub use actor_message::{ActorMessage, Message};
pub use process::Process;
pub use storage::{PersistentStorage, Recovered};
pub use supervisor::Supervisor;
pub use system_hook::SystemHook;
pub use transport::{Codec, Transport};
pub use watch_handler::WatchHandler;

mod actor;
mod actor_message;
mod process;
mod storage;
mod supervisor;
mod system_hook;
mod transport;
mod watch_handler;
