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

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cinder::prelude::*;

use crate::setup::*;

mod setup;

/// Messages from one sender are handled in the order they were sent.
///
/// **Scenario:**
/// 1. Spawn a recorder and send it 200 numbered messages from outside any actor.
///
/// **Verification:**
/// - The journal holds the numbers 0..200 in ascending order, after the launch notice.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_sender_order_is_preserved() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let system = launch("mailbox-order", &journal).await;

    let actor = system.spawn(recorder(&journal).with_name("ordered"))?;
    for n in 0..200 {
        system.tell(&actor, Record(n));
    }
    assert!(eventually(|| journal.numbers().len() == 200).await);
    assert_eq!(journal.numbers(), (0..200).collect::<Vec<_>>());
    assert_eq!(journal.events().first().map(String::as_str), Some("launch"));

    system.shutdown().await?;
    Ok(())
}

/// An actor never runs two handlers at once, whatever the number of senders.
///
/// **Scenario:**
/// 1. Spawn an actor whose handler flags itself busy, sleeps briefly, then clears the flag.
/// 2. Hammer it from eight Tokio tasks at once.
///
/// **Verification:**
/// - The handler never observed the flag already set.
/// - Every message was handled.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_handlers_never_overlap() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let system = launch("mailbox-exclusive", &journal).await;

    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));
    let props = {
        let (busy, overlaps, handled) = (busy.clone(), overlaps.clone(), handled.clone());
        Props::new(move || {
            let (busy, overlaps, handled) = (busy.clone(), overlaps.clone(), handled.clone());
            move |ctx: &mut ActorContext| -> anyhow::Result<()> {
                if ctx.message().is::<Record>() {
                    if busy.swap(true, Ordering::SeqCst) {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_micros(200));
                    busy.store(false, Ordering::SeqCst);
                    handled.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        })
    };
    let actor = system.spawn(props)?;

    let mut senders = Vec::new();
    for task in 0..8 {
        let system = system.clone();
        let actor = actor.clone();
        senders.push(tokio::spawn(async move {
            for n in 0..50 {
                system.tell(&actor, Record(task * 100 + n));
                if n % 10 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for sender in senders {
        sender.await?;
    }

    assert!(eventually(|| handled.load(Ordering::SeqCst) == 400).await);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);

    system.shutdown().await?;
    Ok(())
}

/// Lifecycle traffic overtakes queued application messages.
///
/// **Scenario:**
/// 1. Keep a recorder busy with a long `Sleep`, then queue ten numbered messages.
/// 2. Kill it while it is still sleeping.
///
/// **Verification:**
/// - The kill is handled right after the sleep; none of the numbers are.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_system_lane_overtakes_user_lane() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let system = launch("mailbox-lanes", &journal).await;

    let actor = system.spawn(recorder(&journal).with_name("busy"))?;
    system.tell(&actor, Sleep(150));
    assert!(journal.wait_for("sleeping").await);
    for n in 0..10 {
        system.tell(&actor, Record(n));
    }
    system.kill(&actor, "enough");

    assert!(journal.wait_for("terminated:busy").await);
    let events = journal.events();
    let slept = events.iter().position(|e| e == "slept").unwrap();
    let killed = events.iter().position(|e| e == "kill").unwrap();
    assert_eq!(killed, slept + 1);
    assert!(journal.numbers().is_empty());

    system.shutdown().await?;
    Ok(())
}

/// A typed [`Behavior`] routes each message to the handler registered for its type.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_behavior_dispatches_by_type() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let system = launch("mailbox-behavior", &journal).await;

    let counter = system.spawn(Props::new(|| {
        Behavior::new(0_u64)
            .on::<Add, _>(|total: &mut u64, _ctx: &mut ActorContext, add: &Add| {
                *total += add.0;
                Ok(())
            })
            .on::<GetTotal, _>(|total: &mut u64, ctx: &mut ActorContext, _: &GetTotal| {
                ctx.reply(Total(*total));
                Ok(())
            })
    }))?;

    for n in 1..=10 {
        system.tell(&counter, Add(n));
    }
    let total: Total = system.ask(&counter, GetTotal, None).result_as_async().await?;
    assert_eq!(total.0, 55);

    system.shutdown().await?;
    Ok(())
}
