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

use std::fmt;
use std::sync::Arc;

use crate::message::LaunchContext;
use crate::traits::{Actor, ActorProvider, PersistentStorage, Supervisor};

type LaunchContextFn = dyn Fn() -> LaunchContext + Send + Sync;

/// Everything needed to spawn an actor, and to rebuild it on every restart.
///
/// ```rust,ignore
/// let worker = ctx.spawn(
///     Props::of::<Worker>()
///         .with_name("worker")
///         .with_supervisor(|record: &AccidentRecord| record.restart("crashed")),
/// )?;
/// ```
#[derive(Clone)]
pub struct Props {
    provider: Arc<dyn ActorProvider>,
    name: Option<String>,
    supervisor: Option<Arc<dyn Supervisor>>,
    launch_context: Option<Arc<LaunchContextFn>>,
    persistence: Option<PersistenceOptions>,
}

/// Where a persistent actor keeps its snapshot and events.
#[derive(Clone)]
pub(crate) struct PersistenceOptions {
    pub(crate) id: String,
    pub(crate) storage: Arc<dyn PersistentStorage>,
}

impl Props {
    /// Spawns instances produced by `provider`, e.g. a closure returning the actor.
    pub fn new(provider: impl ActorProvider) -> Self {
        Self {
            provider: Arc::new(provider),
            name: None,
            supervisor: None,
            launch_context: None,
            persistence: None,
        }
    }

    /// Spawns `A::default()` instances.
    pub fn of<A: Actor + Default>() -> Self {
        Self::new(A::default)
    }

    /// Names the actor; the name becomes the last segment of its address.
    /// Unnamed actors get a sequence number from their parent.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Supervises accidents raised by this actor, and accidents its children escalate.
    /// Without one, the system's default supervisor applies.
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: impl Supervisor) -> Self {
        self.supervisor = Some(Arc::new(supervisor));
        self
    }

    pub(crate) fn with_arc_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Builds the [`LaunchContext`] passed in every [`OnLaunch`](crate::message::OnLaunch).
    #[must_use]
    pub fn with_launch_context(
        mut self,
        context: impl Fn() -> LaunchContext + Send + Sync + 'static,
    ) -> Self {
        self.launch_context = Some(Arc::new(context));
        self
    }

    /// Makes the actor persistent: its state is recovered from `storage`
    /// under `id` before each launch.
    #[must_use]
    pub fn with_persistence(
        mut self,
        id: impl Into<String>,
        storage: Arc<dyn PersistentStorage>,
    ) -> Self {
        self.persistence = Some(PersistenceOptions {
            id: id.into(),
            storage,
        });
        self
    }

    /// The configured name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn provide(&self) -> Box<dyn Actor> {
        self.provider.provide()
    }

    pub(crate) fn supervisor(&self) -> Option<&Arc<dyn Supervisor>> {
        self.supervisor.as_ref()
    }

    pub(crate) fn launch_context(&self) -> LaunchContext {
        self.launch_context
            .as_ref()
            .map(|build| build())
            .unwrap_or_default()
    }

    pub(crate) fn persistence(&self) -> Option<&PersistenceOptions> {
        self.persistence.as_ref()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("name", &self.name)
            .field("supervised", &self.supervisor.is_some())
            .field("persistent", &self.persistence.as_ref().map(|p| p.id.as_str()))
            .finish_non_exhaustive()
    }
}
