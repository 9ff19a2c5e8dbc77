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
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of an actor.
///
/// `Alive` may pass through `Restarting` and back any number of times;
/// `Terminating` leads only to `Terminated`, which is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifeStatus {
    /// Processing messages.
    Alive = 0,
    /// Waiting for children to stop before a fresh instance replaces the current one.
    Restarting = 1,
    /// Waiting for children to stop before termination completes.
    Terminating = 2,
    /// Gone. Late traffic is redirected to the fallback process.
    Terminated = 3,
}

impl LifeStatus {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Alive,
            1 => Self::Restarting,
            2 => Self::Terminating,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for LifeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Alive => "alive",
            Self::Restarting => "restarting",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Atomic holder of a [`LifeStatus`], shared between the actor cell and its process handle.
#[derive(Debug, Default)]
pub(crate) struct LifeState(AtomicU8);

impl LifeState {
    pub(crate) fn load(&self) -> LifeStatus {
        LifeStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, status: LifeStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Moves from `from` to `to`; fails if another transition got there first.
    pub(crate) fn transition(&self, from: LifeStatus, to: LifeStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.load() == LifeStatus::Terminated
    }
}
