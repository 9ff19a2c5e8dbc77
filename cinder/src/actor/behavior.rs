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

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::actor::ActorContext;
use crate::traits::{Actor, ActorMessage, Message};

type Handler<S> = Box<dyn FnMut(&mut S, &mut ActorContext, &Message) -> anyhow::Result<()> + Send>;
type Fallback<S> = Box<dyn FnMut(&mut S, &mut ActorContext) -> anyhow::Result<()> + Send>;

/// An actor assembled from typed handlers over a piece of state.
///
/// Each handler is registered for one message type; messages without a
/// handler go to the fallback, or are ignored when there is none.
///
/// ```rust,ignore
/// let props = Props::new(|| {
///     Behavior::new(0_u64)
///         .on::<Increment>(|count, _ctx, increment| {
///             *count += increment.by;
///             Ok(())
///         })
///         .on::<GetCount>(|count, ctx, _| {
///             ctx.reply(*count);
///             Ok(())
///         })
/// });
/// ```
pub struct Behavior<S> {
    state: S,
    handlers: HashMap<TypeId, Handler<S>>,
    fallback: Option<Fallback<S>>,
}

impl<S: Send + 'static> Behavior<S> {
    /// Starts with `state` and no handlers.
    pub fn new(state: S) -> Self {
        Self {
            state,
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Handles messages of type `M`. Registering `M` again replaces the earlier handler.
    #[must_use]
    pub fn on<M, F>(mut self, mut handler: F) -> Self
    where
        M: ActorMessage,
        F: FnMut(&mut S, &mut ActorContext, &M) -> anyhow::Result<()> + Send + 'static,
    {
        let erased: Handler<S> = Box::new(
            move |state: &mut S, ctx: &mut ActorContext, message: &Message| match message.downcast_ref::<M>() {
                Some(typed) => handler(state, ctx, typed),
                None => Ok(()),
            },
        );
        self.handlers.insert(TypeId::of::<M>(), erased);
        self
    }

    /// Handles every message no typed handler claimed.
    #[must_use]
    pub fn otherwise<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut S, &mut ActorContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// The current state.
    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S: Send + 'static> Actor for Behavior<S> {
    fn receive(&mut self, ctx: &mut ActorContext) -> anyhow::Result<()> {
        let message = ctx.message().clone();
        if let Some(handler) = self.handlers.get_mut(&message.payload_type_id()) {
            return handler(&mut self.state, ctx, &message);
        }
        match self.fallback.as_mut() {
            Some(fallback) => fallback(&mut self.state, ctx),
            None => {
                trace!(actor = %ctx.address(), message = message.type_name(), "no handler, message ignored");
                Ok(())
            }
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Behavior<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("state", &self.state)
            .field("handlers", &self.handlers.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
