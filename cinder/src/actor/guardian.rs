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

use tracing::{debug, trace};

use crate::actor::ActorContext;
use crate::message::{OnKill, OnLaunch, OnWatchStopped};
use crate::traits::Actor;

/// Behaviour of the root actor: parent of every top-level actor and owner of
/// system-level watches.
#[derive(Debug, Default)]
pub(crate) struct Guardian;

impl Actor for Guardian {
    fn receive(&mut self, ctx: &mut ActorContext) -> anyhow::Result<()> {
        if let Some(launch) = ctx.message_as::<OnLaunch>() {
            debug!(root = %ctx.address(), restarted = launch.restarted(), "root launched");
        } else if let Some(kill) = ctx.message_as::<OnKill>() {
            debug!(root = %ctx.address(), reason = kill.reason(), "root stopping");
        } else if let Some(stopped) = ctx.message_as::<OnWatchStopped>() {
            debug!(target = %stopped.target(), "system watch ended");
        } else {
            trace!(message = ctx.message().type_name(), sender = %ctx.sender(), "root ignores user message");
        }
        Ok(())
    }
}
