// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root.
//!
//! Builds the whole engine from explicit dependencies - store, bus,
//! detector, session manager, runners, service, watchdog - and owns the
//! background loops (event bridge, watchdog). No global singletons: tests
//! build the same graph over fakes and a virtual clock.

use crate::activity::ActivityMonitor;
use crate::bus::EventBus;
use crate::config::{StoreConfigSource, Tunables};
use crate::error::EngineError;
use crate::service::TaskService;
use crate::sessions::SessionManager;
use crate::watchdog::Watchdog;
use drover_adapters::{LlmVerifier, TerminalAdapter, TmuxTerminal, VerifierAdapter};
use drover_core::{Clock, Event, IdGen, SystemClock, UuidIdGen, VerifierConfig};
use drover_storage::TaskStore;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything the engine needs, provided explicitly
pub struct SupervisorDeps<T, V, C: Clock, I: IdGen> {
    pub terminal: T,
    pub verifier: V,
    pub clock: C,
    pub ids: I,
    pub store: Arc<TaskStore>,
    pub tunables: Tunables,
}

/// The assembled engine
pub struct Supervisor<T, V, C: Clock, I: IdGen> {
    service: Arc<TaskService<T, V, C, I>>,
    sessions: Arc<SessionManager<T, C, I>>,
    watchdog: Arc<Watchdog<T, V, C, I>>,
    store: Arc<TaskStore>,
    bus: EventBus,
    clock: C,
    verifier_config_source: Option<StoreConfigSource<C>>,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T, V, C, I> Supervisor<T, V, C, I>
where
    T: TerminalAdapter,
    V: VerifierAdapter,
    C: Clock,
    I: IdGen + 'static,
{
    /// Wire the component graph. Nothing runs until [`Supervisor::start`].
    pub fn build(deps: SupervisorDeps<T, V, C, I>) -> Self {
        let SupervisorDeps {
            terminal,
            verifier,
            clock,
            ids,
            store,
            tunables,
        } = deps;
        let tunables = Arc::new(tunables);
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
            verifier,
            Arc::clone(&tunables),
        ));
        let watchdog = Arc::new(Watchdog::new(
            Arc::clone(&service),
            Arc::clone(&sessions),
            activity,
            Arc::clone(&store),
            terminal,
            Arc::clone(&tunables),
            clock.clone(),
        ));

        Self {
            service,
            sessions,
            watchdog,
            store,
            bus,
            clock,
            verifier_config_source: None,
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the event bridge and the watchdog loop.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        handles.push(Arc::clone(&self.service).spawn_event_bridge());
        handles.push(Arc::clone(&self.watchdog).spawn(self.shutdown.clone()));
        tracing::info!("supervisor started");
    }

    /// Stop background loops. Running task loops are cooperative and stop
    /// through task cancellation, not here.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
        tracing::info!("supervisor stopped");
    }

    pub fn service(&self) -> &Arc<TaskService<T, V, C, I>> {
        &self.service
    }

    pub fn sessions(&self) -> &Arc<SessionManager<T, C, I>> {
        &self.sessions
    }

    pub fn watchdog(&self) -> &Arc<Watchdog<T, V, C, I>> {
        &self.watchdog
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Persist new verifier config and drop the cached copy.
    pub fn update_verifier_config(&self, config: VerifierConfig) -> Result<(), EngineError> {
        self.store
            .commit(vec![Event::VerifierConfigUpdated { config }])?;
        if let Some(source) = &self.verifier_config_source {
            source.invalidate();
        }
        Ok(())
    }

    /// Write a snapshot and truncate the WAL.
    pub fn checkpoint(&self) -> Result<(), EngineError> {
        self.store.checkpoint(self.clock.epoch_ms())?;
        Ok(())
    }
}

/// Production wiring: tmux + LLM verifier + system clock + uuid ids.
pub type ProductionSupervisor =
    Supervisor<TmuxTerminal, LlmVerifier<StoreConfigSource<SystemClock>>, SystemClock, UuidIdGen>;

impl ProductionSupervisor {
    /// Open the store under `state_dir` and assemble the production graph.
    ///
    /// Fails fast when the tmux binary is missing.
    pub async fn open(state_dir: &Path) -> Result<Self, EngineError> {
        TmuxTerminal::probe().await?;

        let store = Arc::new(TaskStore::open(state_dir)?);
        let clock = SystemClock;
        let config_source = StoreConfigSource::new(Arc::clone(&store), clock.clone());
        let verifier = LlmVerifier::new(config_source.clone());

        let mut supervisor = Self::build(SupervisorDeps {
            terminal: TmuxTerminal::new(),
            verifier,
            clock,
            ids: UuidIdGen,
            store,
            tunables: Tunables::from_env(),
        });
        supervisor.verifier_config_source = Some(config_source);
        Ok(supervisor)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
