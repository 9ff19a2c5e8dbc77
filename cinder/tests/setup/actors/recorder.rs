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

use std::time::Duration;

use cinder::prelude::*;

use crate::setup::actors::Journal;
use crate::setup::messages::{Boom, Fail, Ping, Pong, Record, Sleep};

/// Writes every notice and message it handles into its [`Journal`].
#[derive(Debug)]
pub struct Recorder {
    journal: Journal,
    fail_relaunch: bool,
}

impl Recorder {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_relaunch: false,
        }
    }
}

impl Actor for Recorder {
    fn receive(&mut self, ctx: &mut ActorContext) -> anyhow::Result<()> {
        let message = ctx.message().clone();
        if let Some(launch) = message.downcast_ref::<OnLaunch>() {
            if launch.restarted() {
                self.journal.record("relaunch");
                if self.fail_relaunch {
                    panic!("relaunch refused");
                }
            } else {
                self.journal.record("launch");
            }
        } else if message.is::<OnKill>() {
            self.journal.record("kill");
        } else if message.is::<OnPreRestart>() {
            self.journal.record("prerestart");
        } else if let Some(stopped) = message.downcast_ref::<OnWatchStopped>() {
            let kind = if stopped.is_heartbeat_lost() { "lost" } else { "stopped" };
            self.journal.record(format!("{kind}:{}", stopped.target().name()));
        } else if let Some(Record(number)) = message.downcast_ref::<Record>() {
            self.journal.record(number.to_string());
        } else if let Some(Sleep(ms)) = message.downcast_ref::<Sleep>() {
            self.journal.record("sleeping");
            std::thread::sleep(Duration::from_millis(*ms));
            self.journal.record("slept");
        } else if message.is::<Boom>() {
            panic!("boom");
        } else if message.is::<Fail>() {
            anyhow::bail!("failed on purpose");
        } else if message.is::<Ping>() {
            ctx.reply(Pong);
        }
        Ok(())
    }
}

/// Props spawning recorders that share `journal`.
pub fn recorder(journal: &Journal) -> Props {
    let journal = journal.clone();
    Props::new(move || Recorder::new(journal.clone()))
}

/// Like [`recorder`], but every restarted instance panics on launch.
pub fn recorder_failing_relaunch(journal: &Journal) -> Props {
    let journal = journal.clone();
    Props::new(move || Recorder {
        journal: journal.clone(),
        fail_relaunch: true,
    })
}
