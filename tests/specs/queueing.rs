//! Queue serialization: one active task per session, FIFO promotion,
//! unique positions, and the unqueue law.

use crate::prelude::*;
use drover_core::TaskStatus;

#[tokio::test]
async fn only_one_task_runs_per_session() {
    let h = harness().await;
    let session = h.register_session("s1").await;
    h.keep_busy(&session.terminal_session_name, 5_000);

    let t1 = h.create_task(&session, "first", "a").await;
    let t2 = h.create_task(&session, "second", "b").await;

    h.supervisor.service().start(&t1.id).await.unwrap();
    let err = h
        .supervisor
        .service()
        .start(&t2.id)
        .await
        .expect_err("second start must be rejected");
    assert_eq!(err.to_string(), "another task already running on this session");
    assert_eq!(h.task(&t2.id).status, TaskStatus::Pending);

    // The single-active invariant holds in the store
    let active = h.supervisor.store().read(|state| {
        state
            .tasks
            .values()
            .filter(|t| t.session_id == session.id && t.is_active())
            .count()
    });
    assert_eq!(active, 1);
}

#[tokio::test]
async fn queued_task_promotes_after_the_blocker_completes() {
    let h = harness().await;
    let session = h.register_session("s1").await;
    let terminal = session.terminal_session_name.clone();

    h.keep_busy(&terminal, 50);
    h.verifier.push(true, "t1 done");
    h.verifier.push(true, "t2 done");

    let t1 = h.create_task(&session, "first", "a").await;
    let t2 = h.create_task(&session, "second", "b").await;
    h.supervisor.service().start(&t1.id).await.unwrap();

    let queued = h.supervisor.service().queue(&t2.id).await.unwrap();
    assert_eq!(queued.status, TaskStatus::Queued);
    assert_eq!(queued.queue_position, Some(1));

    wait_until(|| h.task(&t1.id).status == TaskStatus::Completed).await;
    wait_until(|| h.task(&t2.id).status == TaskStatus::Completed).await;
    assert!(h.task(&t2.id).queue_position.is_none());
}

#[tokio::test]
async fn queue_positions_are_pairwise_distinct_per_session() {
    let h = harness().await;
    let session = h.register_session("s1").await;
    h.keep_busy(&session.terminal_session_name, 5_000);

    let blocker = h.create_task(&session, "blocker", "spin").await;
    h.supervisor.service().start(&blocker.id).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..4 {
        let task = h.create_task(&session, &format!("q{i}"), "p").await;
        h.supervisor.service().queue(&task.id).await.unwrap();
        ids.push(task.id);
    }

    let mut positions: Vec<u32> = ids
        .iter()
        .map(|id| h.task(id).queue_position.unwrap())
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn unqueue_after_queue_restores_pending() {
    let h = harness().await;
    let session = h.register_session("s1").await;
    h.keep_busy(&session.terminal_session_name, 5_000);

    let blocker = h.create_task(&session, "blocker", "spin").await;
    h.supervisor.service().start(&blocker.id).await.unwrap();

    let task = h.create_task(&session, "transient", "p").await;
    let before = h.task(&task.id);

    h.supervisor.service().queue(&task.id).await.unwrap();
    let restored = h.supervisor.service().unqueue(&task.id).unwrap();

    assert_eq!(restored.status, TaskStatus::Pending);
    assert_eq!(restored.queue_position, None);
    assert_eq!(restored.name, before.name);
    assert_eq!(restored.prompt, before.prompt);
    assert_eq!(restored.created_at_ms, before.created_at_ms);
}
