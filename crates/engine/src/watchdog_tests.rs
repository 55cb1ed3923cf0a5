// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{setup, wait_until, TestContext};
use drover_adapters::TerminalCall;
use drover_core::test_support::task_builder;
use drover_core::{SessionRecord, TaskId, TaskStatus};

/// Epoch base of the fake clock
const T0: u64 = 1_000_000;

async fn session_with_sample(ctx: &TestContext, name: &str) -> SessionRecord {
    let session = ctx.register_session(name).await;
    ctx.terminal
        .set_output(&session.terminal_session_name, "$ waiting");
    // Seed the activity sample so later silence is measurable
    ctx.activity.poll(&session.terminal_session_name).await;
    session
}

fn advance_secs(ctx: &TestContext, secs: u64) {
    ctx.clock.advance(Duration::from_secs(secs));
}

#[tokio::test]
async fn fresh_output_clears_failures_and_refreshes_progress() {
    let ctx = setup().await;
    let session = session_with_sample(&ctx, "s1").await;

    let task = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .health_check_failures(3)
        .build();
    ctx.store.commit(vec![Event::TaskCreated { task }]).unwrap();

    advance_secs(&ctx, 10); // silence well inside the recent-output window
    ctx.watchdog.scan_once().await;

    let checked = ctx.task(&TaskId::new("t-1"));
    assert_eq!(checked.health_check_failures, 0);
    assert_eq!(checked.last_progress_at_ms, Some(T0 + 10_000));
    assert_eq!(checked.status, TaskStatus::Running);
}

#[tokio::test]
async fn warning_zone_does_not_mutate_state() {
    let ctx = setup().await;
    let session = session_with_sample(&ctx, "s1").await;

    let task = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .build();
    ctx.store.commit(vec![Event::TaskCreated { task }]).unwrap();

    advance_secs(&ctx, 150); // past warning, before stuck
    ctx.watchdog.scan_once().await;

    let checked = ctx.task(&TaskId::new("t-1"));
    assert_eq!(checked.status, TaskStatus::Running);
    assert_eq!(checked.health_check_failures, 0);
}

#[tokio::test]
async fn stuck_task_is_flagged_and_nudged() {
    let ctx = setup().await;
    let session = session_with_sample(&ctx, "s1").await;
    let terminal = session.terminal_session_name.clone();

    let task = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .build();
    ctx.store.commit(vec![Event::TaskCreated { task }]).unwrap();

    advance_secs(&ctx, 310);
    ctx.watchdog.scan_once().await;

    let checked = ctx.task(&TaskId::new("t-1"));
    assert_eq!(checked.status, TaskStatus::Running);
    assert_eq!(checked.health_check_failures, 1);

    // Nudge = ctrl-c then escape x2
    let calls = ctx.terminal.calls();
    assert!(calls.contains(&TerminalCall::CtrlC {
        name: terminal.clone()
    }));
    assert!(calls.contains(&TerminalCall::Escape {
        name: terminal,
        count: 2
    }));
}

#[tokio::test]
async fn repeated_stuck_scans_escalate_to_force_cancel() {
    let ctx = setup().await;
    let session = session_with_sample(&ctx, "s1").await;

    let task = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .health_check_failures(4)
        .build();
    ctx.store.commit(vec![Event::TaskCreated { task }]).unwrap();

    advance_secs(&ctx, 310);
    ctx.watchdog.scan_once().await;

    let checked = ctx.task(&TaskId::new("t-1"));
    assert_eq!(checked.status, TaskStatus::Failed);
    assert!(checked
        .error
        .as_deref()
        .unwrap()
        .contains("unresponsive after 5 recovery attempts"));
}

#[tokio::test]
async fn critical_staleness_force_cancels_and_unblocks_the_queue() {
    let ctx = setup().await;
    let session = session_with_sample(&ctx, "s1").await;

    let stuck = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .build();
    let queued = task_builder("t-2", session.id.as_str())
        .queue_position(1)
        .build();
    ctx.store
        .commit(vec![
            Event::TaskCreated { task: stuck },
            Event::TaskCreated { task: queued },
        ])
        .unwrap();

    advance_secs(&ctx, 610);
    ctx.watchdog.scan_once().await;

    let failed = ctx.task(&TaskId::new("t-1"));
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("watchdog"));
    assert!(failed.completed_at_ms.is_some());

    // Queue processing fired: the queued task is no longer waiting
    wait_until(|| ctx.task(&TaskId::new("t-2")).status != TaskStatus::Queued).await;
}

#[tokio::test]
async fn dead_session_gets_revived_within_the_budget() {
    let ctx = setup().await;
    let session = ctx.register_session("s1").await;
    ctx.terminal.set_alive(&session.terminal_session_name, false);

    let task = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .build();
    ctx.store.commit(vec![Event::TaskCreated { task }]).unwrap();

    ctx.watchdog.scan_once().await;

    let checked = ctx.task(&TaskId::new("t-1"));
    assert_eq!(checked.status, TaskStatus::Running);
    assert_eq!(checked.health_check_failures, 1);
    assert!(ctx.terminal.is_session_alive("drover-s1-r1"));
}

#[tokio::test]
async fn dead_session_past_the_budget_force_cancels() {
    let ctx = setup().await;
    let session = ctx.register_session("s1").await;
    ctx.terminal.set_alive(&session.terminal_session_name, false);

    let task = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(T0)
        .health_check_failures(5)
        .build();
    ctx.store.commit(vec![Event::TaskCreated { task }]).unwrap();

    ctx.watchdog.scan_once().await;

    let failed = ctx.task(&TaskId::new("t-1"));
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("unresponsive after 5 recovery attempts"));
}

#[tokio::test]
async fn missing_session_record_force_cancels() {
    let ctx = setup().await;

    let orphan = task_builder("t-1", "never-registered")
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .build();
    ctx.store
        .commit(vec![Event::TaskCreated { task: orphan }])
        .unwrap();

    ctx.watchdog.scan_once().await;

    let failed = ctx.task(&TaskId::new("t-1"));
    assert_eq!(failed.status, TaskStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("session record missing"));
}

#[tokio::test]
async fn queue_blockade_cancels_the_long_running_blocker() {
    let ctx = setup().await;
    let session = session_with_sample(&ctx, "s1").await;

    advance_secs(&ctx, 1_900);
    let now = ctx.clock.epoch_ms();

    // Blocker started 1900s ago but made progress recently, so the stale
    // ladder leaves it alone; only the blockade rule applies.
    let blocker = task_builder("t-1", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(T0)
        .last_progress_at_ms(now - 100_000)
        .build();
    let starved = task_builder("t-2", session.id.as_str())
        .queue_position(1)
        .last_progress_at_ms(T0)
        .build();
    ctx.store
        .commit(vec![
            Event::TaskCreated { task: blocker },
            Event::TaskCreated { task: starved },
        ])
        .unwrap();

    ctx.watchdog.scan_once().await;

    let cancelled = ctx.task(&TaskId::new("t-1"));
    assert_eq!(cancelled.status, TaskStatus::Failed);
    assert!(cancelled.error.as_deref().unwrap().contains("queue"));

    wait_until(|| ctx.task(&TaskId::new("t-2")).status != TaskStatus::Queued).await;
}

#[tokio::test]
async fn idle_session_with_queued_work_gets_its_queue_driven() {
    let ctx = setup().await;
    let session = ctx.register_session("s1").await;
    ctx.verifier.push(true, "done");

    // Queued directly in the store: nothing has run process_queue yet
    let queued = task_builder("t-1", session.id.as_str())
        .queue_position(1)
        .build();
    ctx.store
        .commit(vec![Event::TaskCreated { task: queued }])
        .unwrap();

    ctx.watchdog.scan_once().await;

    wait_until(|| ctx.task(&TaskId::new("t-1")).status == TaskStatus::Completed).await;
}
