//! Shared runtime state for fac-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The engine services
//! live inside [`Console`]; this module adds the SSE bus and build metadata.

use std::sync::Arc;
use std::time::Duration;

use fac_engine::{ChangeEvent, Console, MemStore};
use fac_loans::OutstandingPolicy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the daemon bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Change(ChangeEvent),
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub console: Console,
    /// "memory" | "postgres"
    pub store_kind: &'static str,
    /// Hash of the configuration the process booted with, if any.
    pub config_hash: Option<String>,
}

impl AppState {
    pub fn new(console: Console, store_kind: &'static str) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "fac-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            console,
            store_kind,
            config_hash: None,
        }
    }

    /// State over a fresh in-memory store; the store handle is returned for
    /// seeding.
    pub fn in_memory(policy: OutstandingPolicy) -> (Self, Arc<MemStore>) {
        let (console, store) = Console::in_memory(policy);
        (Self::new(console, "memory"), store)
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Emit a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Forward committed-change events from the engine onto the SSE bus.
pub fn spawn_change_relay(st: &AppState) {
    let mut changes = st.console.bus.subscribe();
    let bus = st.bus.clone();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(ev) => {
                    let _ = bus.send(BusMsg::Change(ev));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "change relay lagged; SSE clients missed events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
