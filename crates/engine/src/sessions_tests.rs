// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_adapters::FakeTerminal;
use drover_core::{FakeClock, SequentialIdGen};
use tempfile::tempdir;

struct Ctx {
    manager: SessionManager<FakeTerminal, FakeClock, SequentialIdGen>,
    terminal: FakeTerminal,
    store: Arc<TaskStore>,
    clock: FakeClock,
    _dir: tempfile::TempDir,
}

fn setup() -> Ctx {
    let dir = tempdir().unwrap();
    let store = Arc::new(TaskStore::open(dir.path()).unwrap());
    let terminal = FakeTerminal::new();
    let clock = FakeClock::new();
    let manager = SessionManager::new(
        terminal.clone(),
        Arc::clone(&store),
        clock.clone(),
        SequentialIdGen::new("s"),
    );
    Ctx {
        manager,
        terminal,
        store,
        clock,
        _dir: dir,
    }
}

fn new_session(name: &str) -> NewSession {
    NewSession {
        name: name.to_string(),
        project_path: "/tmp".into(),
        agent_kind: AgentKind::Claude,
        autonomous: false,
        initial_prompt: None,
    }
}

#[tokio::test]
async fn register_spawns_terminal_and_persists() {
    let ctx = setup();
    let record = ctx.manager.register(new_session("alpha")).await.unwrap();

    assert_eq!(record.id.as_str(), "s-1");
    assert_eq!(record.terminal_session_name, "drover-alpha");
    assert!(ctx.terminal.is_session_alive("drover-alpha"));
    ctx.store.read(|state| {
        assert_eq!(state.session("s-1").unwrap().name, "alpha");
    });
}

#[tokio::test]
async fn register_rejects_duplicate_names() {
    let ctx = setup();
    ctx.manager.register(new_session("alpha")).await.unwrap();
    let result = ctx.manager.register(new_session("alpha")).await;
    assert!(matches!(result, Err(EngineError::SessionExists(_))));
}

#[tokio::test]
async fn register_sends_initial_prompt_after_settle() {
    let ctx = setup();
    let mut input = new_session("alpha");
    input.initial_prompt = Some("work on the backlog".to_string());
    ctx.manager.register(input).await.unwrap();

    assert_eq!(
        ctx.terminal.sent_keys("drover-alpha"),
        vec!["work on the backlog"]
    );
}

#[tokio::test]
async fn ensure_alive_returns_current_binding_when_alive() {
    let ctx = setup();
    let record = ctx.manager.register(new_session("alpha")).await.unwrap();
    let name = ctx.manager.ensure_alive(&record.id).await.unwrap();
    assert_eq!(name, "drover-alpha");
}

#[tokio::test]
async fn ensure_alive_revives_dead_session_and_rebinds() {
    let ctx = setup();
    let mut input = new_session("alpha");
    input.initial_prompt = Some("resume the plan".to_string());
    let record = ctx.manager.register(input).await.unwrap();

    ctx.terminal.set_alive("drover-alpha", false);
    let name = ctx.manager.ensure_alive(&record.id).await.unwrap();

    assert_eq!(name, "drover-alpha-r1");
    assert!(ctx.terminal.is_session_alive("drover-alpha-r1"));
    // Record rebinds; logical identity survives
    ctx.store.read(|state| {
        let session = state.session(record.id.as_str()).unwrap();
        assert_eq!(session.terminal_session_name, "drover-alpha-r1");
        assert_eq!(session.name, "alpha");
    });
    // Initial prompt replayed into the revived terminal
    assert_eq!(
        ctx.terminal.sent_keys("drover-alpha-r1"),
        vec!["resume the plan"]
    );
}

#[tokio::test]
async fn revive_counter_increments_per_session() {
    let ctx = setup();
    let record = ctx.manager.register(new_session("alpha")).await.unwrap();

    ctx.terminal.set_alive("drover-alpha", false);
    assert_eq!(
        ctx.manager.ensure_alive(&record.id).await.unwrap(),
        "drover-alpha-r1"
    );
    ctx.terminal.set_alive("drover-alpha-r1", false);
    assert_eq!(
        ctx.manager.ensure_alive(&record.id).await.unwrap(),
        "drover-alpha-r2"
    );
}

#[tokio::test]
async fn ensure_alive_unknown_session_errors() {
    let ctx = setup();
    let result = ctx.manager.ensure_alive(&SessionId::new("nope")).await;
    assert!(matches!(result, Err(EngineError::SessionNotFound(_))));
}

#[tokio::test]
async fn touch_updates_last_accessed() {
    let ctx = setup();
    let record = ctx.manager.register(new_session("alpha")).await.unwrap();
    let before = record.last_accessed_at_ms;

    ctx.clock.advance(std::time::Duration::from_secs(5));
    ctx.manager.touch(&record.id).unwrap();

    ctx.store.read(|state| {
        let session = state.session(record.id.as_str()).unwrap();
        assert_eq!(session.last_accessed_at_ms, before + 5_000);
    });
}

#[tokio::test]
async fn kill_leaves_the_record_for_revival() {
    let ctx = setup();
    let record = ctx.manager.register(new_session("alpha")).await.unwrap();

    ctx.manager.kill(&record.id).await.unwrap();
    assert!(!ctx.terminal.is_session_alive("drover-alpha"));
    // Identity survives: the next ensure_alive revives
    assert_eq!(
        ctx.manager.ensure_alive(&record.id).await.unwrap(),
        "drover-alpha-r1"
    );
}

#[tokio::test]
async fn remove_kills_terminal_and_cascades() {
    let ctx = setup();
    let record = ctx.manager.register(new_session("alpha")).await.unwrap();
    ctx.manager.remove(&record.id).await.unwrap();

    assert!(!ctx.terminal.is_session_alive("drover-alpha"));
    ctx.store
        .read(|state| assert!(state.session(record.id.as_str()).is_none()));
}
