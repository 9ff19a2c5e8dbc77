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

#![allow(dead_code, unused_doc_comments)]

use std::sync::Arc;

use cinder::prelude::*;

use crate::setup::*;

mod setup;

/// Replaces the stored events with a snapshot of the running total.
#[cinder_message]
struct Compact;

/// A persistent counter: every [`Add`] is stored as an event and a [`Total`]
/// serves as its snapshot.
fn ledger(storage: &Arc<MemoryStorage>, journal: &Journal) -> Props {
    let journal = journal.clone();
    Props::new(move || {
        let replayed = journal.clone();
        let restored = journal.clone();
        Behavior::new(0_u64)
            .on::<Add, _>(move |total: &mut u64, ctx: &mut ActorContext, add: &Add| {
                *total += add.0;
                if ctx.is_recovering() {
                    replayed.record("replayed");
                } else {
                    ctx.persist_event(add.clone())?;
                    ctx.persist()?;
                }
                Ok(())
            })
            .on::<Total, _>(move |total: &mut u64, ctx: &mut ActorContext, snapshot: &Total| {
                if ctx.is_recovering() {
                    restored.record("restored");
                    *total = snapshot.0;
                }
                Ok(())
            })
            .on::<Compact, _>(|total: &mut u64, ctx: &mut ActorContext, _: &Compact| {
                ctx.snapshot(Total(*total))?;
                ctx.persist()?;
                Ok(())
            })
            .on::<GetTotal, _>(|total: &mut u64, ctx: &mut ActorContext, _: &GetTotal| {
                ctx.reply(Total(*total));
                Ok(())
            })
            .on::<Fail, _>(|_: &mut u64, _ctx: &mut ActorContext, _: &Fail| {
                Err(anyhow::anyhow!("ledger failure"))
            })
    })
    .with_name("ledger")
    .with_persistence("ledger-1", storage.clone())
}

async fn total(system: &ActorSystem, actor: &Address) -> anyhow::Result<u64> {
    let Total(total) = system.ask(actor, GetTotal, None).result_as_async().await?;
    Ok(total)
}

/// **Scenario:** a persistent actor stores events, is killed, and is spawned again under the same id.
/// **Verification:** the new instance replays the events and reports the same total.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_events_survive_termination() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let storage = Arc::new(MemoryStorage::new());
    let system = launch("persist-events", &journal).await;

    let actor = system.spawn(ledger(&storage, &journal))?;
    system.tell(&actor, Add(5));
    system.tell(&actor, Add(7));
    assert_eq!(total(&system, &actor).await?, 12);
    assert_eq!(storage.event_count("ledger-1"), 2);
    assert!(!journal.contains("replayed"));

    system.kill(&actor, "moving on");
    assert!(journal.wait_for("terminated:ledger").await);

    let revived = system.spawn(ledger(&storage, &journal))?;
    assert_eq!(total(&system, &revived).await?, 12);
    assert_eq!(journal.count("replayed"), 2);
    assert_eq!(storage.event_count("ledger-1"), 2);

    system.shutdown().await?;
    Ok(())
}

/// **Scenario:** a persistent actor snapshots its state, then records one more event.
/// **Verification:** only the later event is kept next to the snapshot, and recovery restores both.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_replaces_earlier_events() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let storage = Arc::new(MemoryStorage::new());
    let system = launch("persist-snapshot", &journal).await;

    let actor = system.spawn(ledger(&storage, &journal))?;
    system.tell(&actor, Add(5));
    system.tell(&actor, Add(7));
    system.tell(&actor, Compact);
    system.tell(&actor, Add(1));
    assert_eq!(total(&system, &actor).await?, 13);
    assert!(storage.has_snapshot("ledger-1"));
    assert_eq!(storage.event_count("ledger-1"), 1);

    system.kill(&actor, "moving on");
    assert!(journal.wait_for("terminated:ledger").await);

    let revived = system.spawn(ledger(&storage, &journal))?;
    assert_eq!(total(&system, &revived).await?, 13);
    assert_eq!(journal.count("restored"), 1);
    assert_eq!(journal.count("replayed"), 1);

    system.shutdown().await?;
    Ok(())
}

/// **Scenario:** a persistent actor fails and is restarted by its supervisor.
/// **Verification:** the restarted instance recovers the stored state before handling new work.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_recovers_state() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let storage = Arc::new(MemoryStorage::new());
    let system = launch("persist-restart", &journal).await;

    let actor = system.spawn(ledger(&storage, &journal))?;
    system.tell(&actor, Add(3));
    system.tell(&actor, Fail);
    system.tell(&actor, Add(4));
    assert!(journal.wait_for("relaunched:ledger").await);
    assert_eq!(total(&system, &actor).await?, 7);
    assert_eq!(journal.count("replayed"), 1);

    system.shutdown().await?;
    Ok(())
}

/// **Scenario:** an actor without persistence tries to record an event.
/// **Verification:** the call fails with `NotPersistent`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transient_actor_cannot_persist() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let system = launch("persist-none", &journal).await;

    let actor = system.spawn(Props::new(|| {
        |ctx: &mut ActorContext| -> anyhow::Result<()> {
            if ctx.message().is::<GetTotal>() {
                let refused = matches!(ctx.persist_event(Add(1)), Err(PersistenceError::NotPersistent));
                ctx.reply(Total(u64::from(refused)));
            }
            Ok(())
        }
    }))?;
    assert_eq!(total(&system, &actor).await?, 1);

    system.shutdown().await?;
    Ok(())
}
