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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cinder::prelude::*;

use crate::setup::*;

mod setup;

/// A restart swaps the instance but keeps the messages queued behind the failure.
///
/// **Scenario:**
/// 1. Send a recorder a message that panics, followed by five numbered messages.
///
/// **Verification:**
/// - The old instance saw the pre-restart notice, the fresh one the restarted launch.
/// - The fresh instance handled all five numbers, in order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_keeps_queued_messages() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let hooks = Journal::default();
    let system = launch("supervision-restart", &hooks).await;

    let actor = system.spawn(recorder(&journal).with_name("phoenix"))?;
    system.tell(&actor, Boom);
    for n in 0..5 {
        system.tell(&actor, Record(n));
    }

    assert!(eventually(|| journal.numbers().len() == 5).await);
    let events = journal.events();
    let pre = events.iter().position(|e| e == "prerestart").unwrap();
    let relaunch = events.iter().position(|e| e == "relaunch").unwrap();
    let first = events.iter().position(|e| e == "0").unwrap();
    assert!(pre < relaunch && relaunch < first);
    assert_eq!(journal.numbers(), (0..5).collect::<Vec<_>>());
    assert_eq!(hooks.count("accident:phoenix"), 1);
    assert!(hooks.wait_for("relaunched:phoenix").await);

    system.shutdown().await?;
    Ok(())
}

fn counter() -> Behavior<u64> {
    Behavior::new(0_u64)
        .on::<Add, _>(|total: &mut u64, _ctx: &mut ActorContext, add: &Add| {
            *total += add.0;
            Ok(())
        })
        .on::<GetTotal, _>(|total: &mut u64, ctx: &mut ActorContext, _: &GetTotal| {
            ctx.reply(Total(*total));
            Ok(())
        })
        .on::<Fail, _>(|_: &mut u64, _: &mut ActorContext, _: &Fail| {
            Err(anyhow::anyhow!("refused to count"))
        })
}

/// Resume keeps the instance and its state; restart starts over.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resume_keeps_state_and_restart_resets_it() -> anyhow::Result<()> {
    initialize_tracing();
    let hooks = Journal::default();
    let system = launch("supervision-resume", &hooks).await;

    let resumed = system.spawn(
        Props::new(counter).with_supervisor(|record: &AccidentRecord| record.resume()),
    )?;
    let restarted = system.spawn(
        Props::new(counter).with_supervisor(|record: &AccidentRecord| record.restart("fresh start")),
    )?;
    for actor in [&resumed, &restarted] {
        system.tell(actor, Add(5));
        system.tell(actor, Fail);
        system.tell(actor, Add(5));
    }

    let resumed_total: Total = system.ask(&resumed, GetTotal, None).result_as_async().await?;
    let restarted_total: Total = system.ask(&restarted, GetTotal, None).result_as_async().await?;
    assert_eq!(resumed_total.0, 10);
    assert_eq!(restarted_total.0, 5);
    assert_eq!(hooks.count(&format!("relaunched:{}", restarted.name())), 1);
    assert_eq!(hooks.count(&format!("relaunched:{}", resumed.name())), 0);

    system.shutdown().await?;
    Ok(())
}

/// Backoff restarts stop at the configured limit and the actor is killed.
///
/// **Scenario:**
/// 1. Spawn a recorder whose restarted instances always fail to launch.
/// 2. Make it fail once.
///
/// **Verification:**
/// - Exactly `restart_limit` restarted launches were attempted.
/// - The actor terminated afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backoff_restarts_are_bounded() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let hooks = Journal::default();
    let system = launch("supervision-backoff", &hooks).await;
    let limit = system.config().supervision.restart_limit as usize;

    let actor = system.spawn(recorder_failing_relaunch(&journal).with_name("stubborn"))?;
    system.tell(&actor, Boom);

    assert!(hooks.wait_for("terminated:stubborn").await);
    assert_eq!(journal.count("relaunch"), limit);
    assert_eq!(hooks.count("accident:stubborn"), limit + 1);
    assert_eq!(hooks.count("relaunched:stubborn"), 0);
    assert!(journal.contains("kill"));

    system.shutdown().await?;
    Ok(())
}

/// A failure of the very first launch kills the actor instead of restarting it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_first_launch_kills() -> anyhow::Result<()> {
    initialize_tracing();
    let hooks = Journal::default();
    let system = launch("supervision-launch", &hooks).await;

    let actor = system.spawn(
        Props::new(|| {
            |ctx: &mut ActorContext| -> anyhow::Result<()> {
                if ctx.message().is::<OnLaunch>() {
                    anyhow::bail!("not today");
                }
                Ok(())
            }
        })
        .with_name("stillborn"),
    )?;

    assert!(hooks.wait_for("terminated:stillborn").await);
    assert_eq!(hooks.count("accident:stillborn"), 1);
    assert!(!hooks.contains("launched:stillborn"));
    assert!(!system.registry().contains(&actor));

    system.shutdown().await?;
    Ok(())
}

/// Only the first directive applied to a record takes effect.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_directive_wins() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let hooks = Journal::default();
    let system = launch("supervision-once", &hooks).await;

    let actor = system.spawn(recorder(&journal).with_name("decided").with_supervisor(
        |record: &AccidentRecord| {
            record.restart("first");
            record.restart("second");
            record.kill("third");
            record.escalate();
        },
    ))?;
    system.tell(&actor, Boom);
    system.tell(&actor, Record(7));

    assert!(eventually(|| journal.numbers() == vec![7]).await);
    assert_eq!(journal.count("relaunch"), 1);
    assert!(!hooks.contains("terminated:decided"));

    system.shutdown().await?;
    Ok(())
}

/// An escalated accident is decided by the parent's supervisor.
///
/// **Scenario:**
/// 1. Spawn a parent with a supervisor that records the victim and restarts it.
/// 2. The parent spawns a child whose own supervisor escalates.
/// 3. Make the child fail.
///
/// **Verification:**
/// - The parent's supervisor decided for the child, once.
/// - The child was restarted; the parent was not.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_escalation_reaches_the_parent() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let hooks = Journal::default();
    let system = launch("supervision-escalate", &hooks).await;

    let decisions = journal.clone();
    let parent_props = {
        let journal = journal.clone();
        Props::new(move || {
            let journal = journal.clone();
            move |ctx: &mut ActorContext| -> anyhow::Result<()> {
                if ctx.message().is::<OnLaunch>() {
                    ctx.spawn(
                        recorder(&journal)
                            .with_name("child")
                            .with_supervisor(|record: &AccidentRecord| record.escalate()),
                    )?;
                }
                Ok(())
            }
        })
    }
    .with_name("parent")
    .with_supervisor(move |record: &AccidentRecord| {
        decisions.record(format!("decided:{}", record.victim().name()));
        record.restart("parent decided");
    });

    let parent = system.spawn(parent_props)?;
    assert!(journal.wait_for("launch").await);
    system.tell(&parent.sub("child"), Boom);

    assert!(hooks.wait_for("relaunched:child").await);
    assert_eq!(journal.count("decided:child"), 1);
    assert!(!hooks.contains("relaunched:parent"));

    system.shutdown().await?;
    Ok(())
}

/// An accident escalated to the root is decided once by the root supervisor.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_root_supervisor_decides_once() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let hooks = Journal::default();
    let decided = Arc::new(AtomicUsize::new(0));
    let system = {
        let decided = decided.clone();
        CinderApp::builder()
            .config(test_config("supervision-root"))
            .hook(hooks.clone())
            .root_supervisor(move |record: &AccidentRecord| {
                decided.fetch_add(1, Ordering::SeqCst);
                record.kill("root decided");
            })
            .launch()
            .await
    };

    let actor = system.spawn(
        recorder(&journal)
            .with_name("escalator")
            .with_supervisor(|record: &AccidentRecord| record.escalate()),
    )?;
    system.tell(&actor, Fail);

    assert!(hooks.wait_for("terminated:escalator").await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(decided.load(Ordering::SeqCst), 1);
    assert!(!system.is_terminated());

    system.shutdown().await?;
    Ok(())
}

/// An accident escalated over two hops is decided once, by the first supervisor that decides.
///
/// **Scenario:**
/// 1. A top-level actor whose supervisor escalates spawns a grandchild whose supervisor escalates too.
/// 2. Make the grandchild fail.
///
/// **Verification:**
/// - The root supervisor decided exactly once, for the grandchild.
/// - Only the grandchild was killed; its parent keeps running.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_hop_escalation_decides_once() -> anyhow::Result<()> {
    initialize_tracing();
    let journal = Journal::default();
    let hooks = Journal::default();
    let decisions = Journal::default();
    let system = {
        let decisions = decisions.clone();
        CinderApp::builder()
            .config(test_config("supervision-two-hop"))
            .hook(hooks.clone())
            .root_supervisor(move |record: &AccidentRecord| {
                decisions.record(format!("decided:{}", record.victim().name()));
                record.kill("root decided");
            })
            .launch()
            .await
    };

    let middle_props = {
        let journal = journal.clone();
        Props::new(move || {
            let journal = journal.clone();
            move |ctx: &mut ActorContext| -> anyhow::Result<()> {
                if ctx.message().is::<OnLaunch>() {
                    ctx.spawn(
                        recorder(&journal)
                            .with_name("grandchild")
                            .with_supervisor(|record: &AccidentRecord| record.escalate()),
                    )?;
                }
                Ok(())
            }
        })
    }
    .with_name("middle")
    .with_supervisor(|record: &AccidentRecord| record.escalate());

    let middle = system.spawn(middle_props)?;
    assert!(journal.wait_for("launch").await);
    system.tell(&middle.sub("grandchild"), Fail);

    assert!(hooks.wait_for("terminated:grandchild").await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(decisions.events(), vec!["decided:grandchild".to_string()]);
    assert!(!hooks.contains("terminated:middle"));
    assert!(system.registry().contains(&middle));

    system.shutdown().await?;
    Ok(())
}
