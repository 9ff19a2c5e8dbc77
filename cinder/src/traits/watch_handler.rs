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

use crate::actor::ActorContext;
use crate::message::OnWatchStopped;

/// Callback run on the watcher's own worker turn when a watched actor stops.
///
/// Failures are accidents of the watcher, exactly like a failing `receive`.
pub trait WatchHandler: Send + Sync + 'static {
    /// Reacts to the termination notice.
    fn handle(&self, ctx: &mut ActorContext, stopped: &OnWatchStopped) -> anyhow::Result<()>;
}

impl<F> WatchHandler for F
where
    F: Fn(&mut ActorContext, &OnWatchStopped) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut ActorContext, stopped: &OnWatchStopped) -> anyhow::Result<()> {
        self(ctx, stopped)
    }
}
