//! Watchdog scenarios: a frozen task is force-cancelled within the SLA and
//! the session's queue keeps moving.

use crate::prelude::*;
use drover_core::test_support::task_builder;
use drover_core::{Event, TaskSpec, TaskStatus};
use std::time::Duration;

#[tokio::test]
async fn stuck_task_is_force_cancelled_and_queue_processing_fires() {
    let h = harness().await;
    let session = h.register_session("s1").await;
    h.terminal
        .set_output(&session.terminal_session_name, "$ frozen output");

    // A task the store believes is running, but whose loop is gone and
    // whose scrollback never changes - the watchdog's target case.
    let stuck = task_builder("t-stuck", session.id.as_str())
        .status(TaskStatus::Running)
        .started_at_ms(1_000_000)
        .last_progress_at_ms(1_000_000)
        .build();
    h.supervisor
        .store()
        .commit(vec![Event::TaskCreated { task: stuck }])
        .unwrap();
    let stuck_id = drover_core::TaskId::new("t-stuck");

    // A queued task waits behind the frozen one
    let t2 = h.create_task(&session, "waiting", "next up").await;
    h.supervisor.service().queue(&t2.id).await.unwrap();
    assert_eq!(h.task(&t2.id).status, TaskStatus::Queued);
    h.verifier.push(true, "t2 done");

    // First scan seeds the activity sample for the frozen terminal
    h.supervisor.watchdog().scan_once().await;

    // Past the critical SLA with unchanged scrollback: force-cancel
    h.clock.advance(Duration::from_secs(700));
    h.supervisor.watchdog().scan_once().await;

    let ended = h.task(&stuck_id);
    assert_eq!(ended.status, TaskStatus::Failed);
    assert!(ended.error.as_deref().unwrap().contains("watchdog"));
    assert!(ended.completed_at_ms.is_some());

    // Queue processing fired: the waiting task runs to completion
    wait_until(|| h.task(&t2.id).status == TaskStatus::Completed).await;
}

#[tokio::test]
async fn dead_session_is_revived_for_a_running_task() {
    let h = harness().await;
    let session = h.register_session("s1").await;

    let mut spec = TaskSpec::new(session.id.clone(), "survivor", "keep at it");
    spec.max_iterations = Some(100);
    let task = h.supervisor.service().create(spec).await.unwrap();
    h.supervisor.service().start(&task.id).await.unwrap();

    h.terminal.set_alive(&session.terminal_session_name, false);
    h.supervisor.watchdog().scan_once().await;

    assert!(h.terminal.is_session_alive("drover-s1-r1"));
    assert_eq!(h.task(&task.id).health_check_failures, 1);
    assert_eq!(h.task(&task.id).status, TaskStatus::Running);
}
