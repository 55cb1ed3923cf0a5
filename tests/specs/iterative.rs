//! Iterative-runner scenarios: the happy feedback loop, budget exhaustion,
//! and pause/resume.

use crate::prelude::*;
use drover_core::{Event, TaskSpec, TaskStatus};

#[tokio::test]
async fn happy_iterative_path_completes_on_second_iteration() {
    let h = harness().await;
    let mut rx = h.supervisor.bus().subscribe();
    let session = h.register_session("s1").await;

    h.verifier.push(false, "hello.txt not found");
    h.verifier.push(true, "hello.txt contains Hi");

    let mut spec = TaskSpec::new(
        session.id.clone(),
        "write hello",
        "write hello.txt with contents Hi",
    );
    spec.max_iterations = Some(3);
    let task = h.supervisor.service().create(spec).await.unwrap();
    h.supervisor.service().start(&task.id).await.unwrap();

    wait_until(|| h.task(&task.id).status == TaskStatus::Completed).await;

    let finished = h.task(&task.id);
    assert_eq!(finished.current_iteration, 2);
    assert_eq!(finished.status, TaskStatus::Completed);
    assert!(finished.completed_at_ms.is_some());

    let events = drain_events(&mut rx);
    assert_eq!(
        names_of(
            &events,
            &[
                "iteration:start",
                "iteration:complete",
                "verification:complete",
                "task:complete",
            ]
        ),
        vec![
            "iteration:start",
            "iteration:complete",
            "verification:complete",
            "iteration:start",
            "iteration:complete",
            "verification:complete",
            "task:complete",
        ]
    );
    let verdicts: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            Event::VerificationCompleted { passed, .. } => Some(*passed),
            _ => None,
        })
        .collect();
    assert_eq!(verdicts, vec![false, true]);
}

#[tokio::test]
async fn max_iterations_exhausted_fails_with_exact_iteration_count() {
    let h = harness().await;
    let mut rx = h.supervisor.bus().subscribe();
    let session = h.register_session("s1").await;

    // The default fake verdict never passes
    let mut spec = TaskSpec::new(session.id.clone(), "sisyphus", "push the boulder");
    spec.max_iterations = Some(4);
    let task = h.supervisor.service().create(spec).await.unwrap();
    h.supervisor.service().start(&task.id).await.unwrap();

    wait_until(|| h.task(&task.id).status == TaskStatus::Failed).await;

    let failed = h.task(&task.id);
    assert!(failed.error.as_deref().unwrap().contains("max iterations"));
    assert_eq!(failed.current_iteration, 4);

    let events = drain_events(&mut rx);
    let starts = events
        .iter()
        .filter(|e| matches!(e, Event::IterationStarted { .. }))
        .count();
    assert_eq!(starts, 4);
}

#[tokio::test]
async fn iteration_budget_of_one_fails_after_exactly_one_attempt() {
    let h = harness().await;
    let session = h.register_session("s1").await;

    let mut spec = TaskSpec::new(session.id.clone(), "one shot", "try");
    spec.max_iterations = Some(1);
    let task = h.supervisor.service().create(spec).await.unwrap();
    h.supervisor.service().start(&task.id).await.unwrap();

    wait_until(|| h.task(&task.id).status == TaskStatus::Failed).await;
    assert_eq!(h.task(&task.id).current_iteration, 1);
    assert_eq!(h.verifier.call_count(), 1);
}

#[tokio::test]
async fn pause_and_resume_keep_the_iteration_counter_monotonic() {
    let h = harness().await;
    let mut rx = h.supervisor.bus().subscribe();
    let session = h.register_session("s1").await;

    let mut spec = TaskSpec::new(session.id.clone(), "pausable", "work");
    spec.max_iterations = Some(100);
    let task = h.supervisor.service().create(spec).await.unwrap();
    h.supervisor.service().start(&task.id).await.unwrap();

    wait_until(|| h.task(&task.id).current_iteration >= 1).await;
    h.supervisor.service().pause(&task.id).await.unwrap();
    wait_until(|| h.task(&task.id).status == TaskStatus::Paused).await;
    let iterations_at_pause = h.task(&task.id).current_iteration;

    h.supervisor.service().resume(&task.id).await.unwrap();
    wait_until(|| h.task(&task.id).status == TaskStatus::Running).await;

    h.verifier.push(true, "done now");
    wait_until(|| h.task(&task.id).status == TaskStatus::Completed).await;
    assert!(h.task(&task.id).current_iteration >= iterations_at_pause);

    let events = drain_events(&mut rx);
    let names: Vec<&str> = names_of(&events, &["task:paused", "task:resumed"]);
    assert_eq!(names, vec!["task:paused", "task:resumed"]);
}

#[tokio::test]
async fn cancelling_a_terminal_task_is_a_no_op() {
    let h = harness().await;
    let session = h.register_session("s1").await;
    h.verifier.push(true, "done");

    let task = h.create_task(&session, "quick", "do it").await;
    h.supervisor.service().start(&task.id).await.unwrap();
    wait_until(|| h.task(&task.id).status == TaskStatus::Completed).await;

    let before = h.task(&task.id);
    h.supervisor.service().cancel(&task.id, false).await.unwrap();
    h.supervisor.service().cancel(&task.id, true).await.unwrap();
    assert_eq!(h.task(&task.id), before);
}
