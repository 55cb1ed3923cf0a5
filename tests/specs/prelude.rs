//! Shared harness for the behavioral specs.

use drover_adapters::{FakeTerminal, FakeVerifier};
use drover_core::{
    AgentKind, Event, FakeClock, SequentialIdGen, SessionRecord, Task, TaskId, TaskSpec,
};
use drover_engine::sessions::NewSession;
use drover_engine::{Supervisor, SupervisorDeps, Tunables};
use drover_storage::TaskStore;
use std::sync::Arc;
use tokio::sync::broadcast;

pub type SpecSupervisor = Supervisor<FakeTerminal, FakeVerifier, FakeClock, SequentialIdGen>;

pub struct Harness {
    pub supervisor: SpecSupervisor,
    pub terminal: FakeTerminal,
    pub verifier: FakeVerifier,
    pub clock: FakeClock,
    state_dir: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

/// Build the engine over fakes. The event bridge runs; the watchdog loop
/// does not - specs drive `scan_once` explicitly so virtual time stays
/// under test control.
pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().to_path_buf();
    let store = Arc::new(TaskStore::open(dir.path()).unwrap());
    let terminal = FakeTerminal::new();
    let verifier = FakeVerifier::new();
    let clock = FakeClock::new();

    let supervisor = Supervisor::build(SupervisorDeps {
        terminal: terminal.clone(),
        verifier: verifier.clone(),
        clock: clock.clone(),
        ids: SequentialIdGen::new("id"),
        store,
        tunables: Tunables::default(),
    });
    Arc::clone(supervisor.service()).spawn_event_bridge();

    Harness {
        supervisor,
        terminal,
        verifier,
        clock,
        state_dir,
        _dir: dir,
    }
}

impl Harness {
    pub async fn register_session(&self, name: &str) -> SessionRecord {
        self.supervisor
            .sessions()
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

    pub async fn create_task(&self, session: &SessionRecord, name: &str, prompt: &str) -> Task {
        self.supervisor
            .service()
            .create(TaskSpec::new(session.id.clone(), name, prompt))
            .await
            .unwrap()
    }

    pub fn task(&self, id: &TaskId) -> Task {
        self.supervisor.service().get(id).unwrap()
    }

    /// Keep a terminal's output changing so it never quiesces.
    pub fn keep_busy(&self, terminal_name: &str, frames: usize) {
        for i in 0..frames {
            self.terminal
                .push_frame(terminal_name, format!("output line {i}"));
        }
    }
}

/// Yield until the condition holds (bounded; panics on timeout).
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..20_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not met within the yield budget");
}

/// Drain buffered events from a subscription, tolerating lag.
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
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
pub fn names_of<'a>(events: &'a [Event], keep: &[&str]) -> Vec<&'a str> {
    events
        .iter()
        .map(|e| e.name())
        .filter(|name| keep.contains(name))
        .collect()
}
