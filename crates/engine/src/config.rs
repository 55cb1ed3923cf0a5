// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tunables and the cached verifier-config source.
//!
//! Every threshold the engine uses lives in [`Tunables`]; defaults match
//! the documented SLAs and can be overridden per deployment through the
//! environment (values in whole seconds).

use drover_core::{Clock, VerifierConfig};
use drover_storage::TaskStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a loaded verifier config stays cached
const VERIFIER_CONFIG_TTL: Duration = Duration::from_secs(30);

/// All engine timing thresholds and budgets
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Watchdog scan interval
    pub watchdog_interval: Duration,
    /// Progress age that logs a warning
    pub stale_warning: Duration,
    /// Progress age that triggers nudge + health flag
    pub stale_stuck: Duration,
    /// Progress age that force-cancels
    pub stale_critical: Duration,
    /// Age since start that force-cancels a task with no progress at all
    pub absolute_critical: Duration,
    /// Queued wait + blocker runtime that breaks a queue blockade
    pub queue_block: Duration,
    /// Health-check failures before the watchdog gives up on recovery
    pub max_health_failures: u32,
    /// Runner poll cadence
    pub poll_interval: Duration,
    /// Cadence of verifier-backed status summaries
    pub status_update_interval: Duration,
    /// Wall-clock budget for one iteration
    pub iteration_timeout: Duration,
    /// How long to wait for a session to quiesce before interrupting it
    pub idle_wait_timeout: Duration,
    /// Cadence of synthetic progress events that feed the watchdog
    pub progress_heartbeat: Duration,
    /// Output younger than this classifies the session as active
    pub active_idle_threshold: Duration,
    /// Silence at least this old is eligible for waiting-for-input
    pub waiting_threshold: Duration,
    /// Output within this window resets watchdog health failures
    pub recent_output_window: Duration,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_secs(15),
            stale_warning: Duration::from_secs(120),
            stale_stuck: Duration::from_secs(300),
            stale_critical: Duration::from_secs(600),
            absolute_critical: Duration::from_secs(900),
            queue_block: Duration::from_secs(1800),
            max_health_failures: 5,
            poll_interval: Duration::from_secs(2),
            status_update_interval: Duration::from_secs(5),
            iteration_timeout: Duration::from_secs(300),
            idle_wait_timeout: Duration::from_secs(30),
            progress_heartbeat: Duration::from_secs(10),
            active_idle_threshold: Duration::from_secs(3),
            waiting_threshold: Duration::from_secs(6),
            recent_output_window: Duration::from_secs(30),
        }
    }
}

impl Tunables {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an injectable lookup (seconds values).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut tunables = Self::default();

        let secs = |key: &str| -> Option<Duration> {
            get(key)?.trim().parse::<u64>().ok().map(Duration::from_secs)
        };

        if let Some(v) = secs("WATCHDOG_INTERVAL") {
            tunables.watchdog_interval = v;
        }
        if let Some(v) = secs("STALE_WARNING") {
            tunables.stale_warning = v;
        }
        if let Some(v) = secs("STALE_STUCK") {
            tunables.stale_stuck = v;
        }
        if let Some(v) = secs("STALE_CRITICAL") {
            tunables.stale_critical = v;
        }
        if let Some(v) = secs("POLL_INTERVAL") {
            tunables.poll_interval = v;
        }
        if let Some(v) = secs("ITERATION_TIMEOUT") {
            tunables.iteration_timeout = v;
        }
        if let Some(v) = secs("IDLE_WAIT_TIMEOUT") {
            tunables.idle_wait_timeout = v;
        }
        if let Some(v) = secs("ACTIVE_IDLE_THRESHOLD") {
            tunables.active_idle_threshold = v;
        }
        if let Some(v) = secs("WAITING_THRESHOLD") {
            tunables.waiting_threshold = v;
        }
        if let Some(v) = get("MAX_HEALTH_FAILURES").and_then(|v| v.trim().parse().ok()) {
            tunables.max_health_failures = v;
        }

        tunables
    }
}

/// Store-backed verifier config with a TTL cache.
///
/// Reads hit the store at most once per [`VERIFIER_CONFIG_TTL`]; config
/// writes call [`StoreConfigSource::invalidate`] so the next load sees
/// fresh values immediately.
pub struct StoreConfigSource<C: Clock> {
    store: Arc<TaskStore>,
    clock: C,
    cache: Arc<Mutex<Option<(Instant, VerifierConfig)>>>,
}

impl<C: Clock> Clone for StoreConfigSource<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C: Clock> StoreConfigSource<C> {
    pub fn new(store: Arc<TaskStore>, clock: C) -> Self {
        Self {
            store,
            clock,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Drop the cached config; the next load re-reads the store.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}

impl<C: Clock> drover_adapters::VerifierConfigSource for StoreConfigSource<C> {
    fn load(&self) -> VerifierConfig {
        let now = self.clock.now();
        let mut cache = self.cache.lock();
        if let Some((loaded_at, config)) = cache.as_ref() {
            if now.saturating_duration_since(*loaded_at) < VERIFIER_CONFIG_TTL {
                return config.clone();
            }
        }
        let config = self.store.read(|state| state.verifier_config.clone());
        *cache = Some((now, config.clone()));
        config
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
