// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::activity::ActivityMonitor;
use crate::bus::EventBus;
use crate::config::Tunables;
use crate::service::TaskService;
use crate::sessions::{NewSession, SessionManager};
use crate::watchdog::Watchdog;
use drover_adapters::{FakeTerminal, FakeVerifier};
use drover_core::{
    AgentKind, Event, FakeClock, SequentialIdGen, SessionRecord, Task, TaskId, TaskSpec,
};
use drover_storage::TaskStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

pub(crate) type TestService =
    TaskService<FakeTerminal, FakeVerifier, FakeClock, SequentialIdGen>;
pub(crate) type TestWatchdog =
    Watchdog<FakeTerminal, FakeVerifier, FakeClock, SequentialIdGen>;

/// The fully-wired engine graph over fakes and a virtual clock.
pub(crate) struct TestContext {
    pub service: Arc<TestService>,
    pub sessions: Arc<SessionManager<FakeTerminal, FakeClock, SequentialIdGen>>,
    pub watchdog: Arc<TestWatchdog>,
    pub activity: Arc<ActivityMonitor<FakeTerminal, FakeClock>>,
    pub store: Arc<TaskStore>,
    pub bus: EventBus,
    pub terminal: FakeTerminal,
    pub verifier: FakeVerifier,
    pub clock: FakeClock,
    pub state_dir: PathBuf,
    _dir: tempfile::TempDir,
}

/// Build the graph and start the event bridge (the watchdog loop is NOT
/// started - watchdog tests drive `scan_once` explicitly).
pub(crate) async fn setup() -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().to_path_buf();

    let store = Arc::new(TaskStore::open(&state_dir).unwrap());
    let terminal = FakeTerminal::new();
    let verifier = FakeVerifier::new();
    let clock = FakeClock::new();
    let ids = SequentialIdGen::new("id");
    let tunables = Arc::new(Tunables::default());
    let bus = EventBus::new();

    let activity = Arc::new(ActivityMonitor::new(
        terminal.clone(),
        clock.clone(),
        Arc::clone(&tunables),
    ));
    let sessions = Arc::new(SessionManager::new(
        terminal.clone(),
        Arc::clone(&store),
        clock.clone(),
        ids.clone(),
    ));
    let service = Arc::new(TaskService::new(
        Arc::clone(&store),
        bus.clone(),
        clock.clone(),
        ids,
        Arc::clone(&sessions),
        Arc::clone(&activity),
        terminal.clone(),
        verifier.clone(),
        Arc::clone(&tunables),
    ));
    let watchdog = Arc::new(Watchdog::new(
        Arc::clone(&service),
        Arc::clone(&sessions),
        Arc::clone(&activity),
        Arc::clone(&store),
        terminal.clone(),
        Arc::clone(&tunables),
        clock.clone(),
    ));

    Arc::clone(&service).spawn_event_bridge();

    TestContext {
        service,
        sessions,
        watchdog,
        activity,
        store,
        bus,
        terminal,
        verifier,
        clock,
        state_dir,
        _dir: dir,
    }
}

impl TestContext {
    /// Register a session backed by a live fake terminal.
    pub async fn register_session(&self, name: &str) -> SessionRecord {
        self.sessions
            .register(NewSession {
                name: name.to_string(),
                project_path: self.state_dir.clone(),
                agent_kind: AgentKind::Claude,
                autonomous: false,
                initial_prompt: None,
            })
            .await
            .unwrap()
    }

    /// Create a pending task on a session.
    pub async fn create_task(&self, session: &SessionRecord, name: &str) -> Task {
        self.service
            .create(TaskSpec::new(session.id.clone(), name, format!("{name} prompt")))
            .await
            .unwrap()
    }

    /// Script a long run of changing output so a session stays active.
    pub fn keep_session_busy(&self, terminal_name: &str, frames: usize) {
        for i in 0..frames {
            self.terminal
                .push_frame(terminal_name, format!("working on step {i}"));
        }
    }

    pub fn task(&self, id: &TaskId) -> Task {
        self.service.get(id).unwrap()
    }
}

/// Yield until the condition holds (bounded; panics on timeout).
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..20_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not met within the yield budget");
}

/// Drain every event currently buffered in a subscription.
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    use tokio::sync::broadcast::error::TryRecvError;
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// The wire names of `events`, filtered to the given set, in order.
pub(crate) fn names_of<'a>(events: &'a [Event], keep: &[&str]) -> Vec<&'a str> {
    events
        .iter()
        .map(|e| e.name())
        .filter(|name| keep.contains(name))
        .collect()
}
