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

/// User logic: one isolated unit of sequential state and behaviour.
///
/// `receive` is called for one message at a time, never concurrently, on
/// whatever worker thread drains the mailbox. The current message, its sender
/// and every runtime operation are reached through `ctx`.
///
/// Returning an error or panicking is an *accident*: the mailbox is suspended
/// and the actor's supervisor decides what happens next.
///
/// ```rust,ignore
/// struct Counter(u64);
///
/// impl Actor for Counter {
///     fn receive(&mut self, ctx: &mut ActorContext) -> anyhow::Result<()> {
///         if ctx.message().is::<Increment>() {
///             self.0 += 1;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Actor: Send + 'static {
    /// Handles the message currently held by `ctx`.
    fn receive(&mut self, ctx: &mut ActorContext) -> anyhow::Result<()>;
}

impl<F> Actor for F
where
    F: FnMut(&mut ActorContext) -> anyhow::Result<()> + Send + 'static,
{
    fn receive(&mut self, ctx: &mut ActorContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Produces fresh actor instances: one at spawn and one per restart.
pub trait ActorProvider: Send + Sync + 'static {
    /// Builds a new instance.
    fn provide(&self) -> Box<dyn Actor>;
}

impl<F, A> ActorProvider for F
where
    F: Fn() -> A + Send + Sync + 'static,
    A: Actor,
{
    fn provide(&self) -> Box<dyn Actor> {
        Box::new(self())
    }
}
