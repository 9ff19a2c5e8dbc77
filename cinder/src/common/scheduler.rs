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
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable};
use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::trace;

/// Keyed one-shot and repeating timers.
///
/// Each actor owns one scheduler; backoff restarts and watch heartbeats use it
/// too. Scheduling under a key that is already in use replaces the earlier
/// timer. Every timer is cancelled when the owning actor terminates or the
/// system shuts down.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    handle: Handle,
    token: CancellationToken,
    tracker: TaskTracker,
    timers: DashMap<String, Timer>,
    generation: AtomicU64,
}

struct Timer {
    generation: u64,
    abort: AbortHandle,
}

impl Scheduler {
    pub(crate) fn new(handle: Handle, parent: &CancellationToken, tracker: TaskTracker) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                handle,
                token: parent.child_token(),
                tracker,
                timers: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Runs `task` once after `delay`.
    pub fn after<F>(&self, key: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let (generation, registration) = self.register(&key);
        let inner = Arc::clone(&self.inner);
        let timer_key = key.clone();
        let timer = async move {
            tokio::time::sleep(delay).await;
            inner
                .timers
                .remove_if(&timer_key, |_, timer| timer.generation == generation);
            task.await;
        };
        self.spawn(key, registration, timer);
    }

    /// Runs `task` every `interval`, first after one full interval. A run
    /// finishes before the next one starts.
    pub fn every<F, Fut>(&self, key: impl Into<String>, interval: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let (_, registration) = self.register(&key);
        let period = interval.max(Duration::from_millis(1));
        let timer = async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                task().await;
            }
        };
        self.spawn(key, registration, timer);
    }

    /// Cancels the timer under `key`. Returns whether one was scheduled.
    pub fn stop(&self, key: &str) -> bool {
        match self.inner.timers.remove(key) {
            Some((_, timer)) => {
                timer.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a timer is currently scheduled under `key`.
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.inner.timers.contains_key(key)
    }

    /// Cancels every timer.
    pub fn clear(&self) {
        self.retain(|_| false);
    }

    /// Cancels every timer whose key does not satisfy `keep`.
    pub(crate) fn retain(&self, keep: impl Fn(&str) -> bool) {
        self.inner.timers.retain(|key, timer| {
            let kept = keep(key);
            if !kept {
                timer.abort.abort();
            }
            kept
        });
    }

    fn register(&self, key: &str) -> (u64, futures::future::AbortRegistration) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let (abort, registration) = AbortHandle::new_pair();
        if let Some(previous) = self
            .inner
            .timers
            .insert(key.to_string(), Timer { generation, abort })
        {
            previous.abort.abort();
        }
        (generation, registration)
    }

    fn spawn<F>(&self, key: String, registration: futures::future::AbortRegistration, timer: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.inner.token.clone();
        let guarded = Abortable::new(timer, registration);
        self.inner.tracker.spawn_on(
            async move {
                tokio::select! {
                    () = token.cancelled() => trace!(timer = %key, "timer cancelled by shutdown"),
                    _ = guarded => {}
                }
            },
            &self.inner.handle,
        );
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        for timer in self.timers.iter() {
            timer.abort.abort();
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("timers", &self.inner.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn scheduler() -> Scheduler {
        Scheduler::new(Handle::current(), &CancellationToken::new(), TaskTracker::new())
    }

    #[tokio::test]
    async fn after_runs_once_and_forgets_the_key() {
        let scheduler = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        scheduler.after("once", Duration::from_millis(10), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_scheduled("once"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled("once"));
    }

    #[tokio::test]
    async fn rescheduling_a_key_replaces_the_timer() {
        let scheduler = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&fired);
            scheduler.after("same", Duration::from_millis(20), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_repeats_until_stopped() {
        let scheduler = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        scheduler.every("tick", Duration::from_millis(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(75)).await;
        assert!(scheduler.stop("tick"));
        let seen = fired.load(Ordering::SeqCst);
        assert!(seen >= 3, "only {seen} ticks");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), seen);
        assert!(!scheduler.stop("tick"));
    }

    #[tokio::test]
    async fn retain_cancels_the_rest() {
        let scheduler = scheduler();
        scheduler.after("[watch]a", Duration::from_secs(60), async {});
        scheduler.after("user", Duration::from_secs(60), async {});
        scheduler.retain(|key| key.starts_with("[watch]"));
        assert!(scheduler.is_scheduled("[watch]a"));
        assert!(!scheduler.is_scheduled("user"));
        scheduler.clear();
        assert!(!scheduler.is_scheduled("[watch]a"));
    }
}
