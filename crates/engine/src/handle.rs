//! External entry points into the control loop

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use triarb_core::{Currency, EngineEvent, EventBus};

/// Commands accepted by the engine actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Skip the remaining inter-cycle delay
    RunNow,
    /// Clear a halt after manual reconciliation
    Resume,
    Shutdown,
}

#[derive(Debug, Error)]
#[error("engine is not running")]
pub struct EngineStopped;

/// Read-only counters published by the control loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub cycles: u64,
    pub opportunities_evaluated: u64,
    pub profitable_seen: u64,
    pub invalid_candidates: u64,
    pub trades_completed: u64,
    pub trades_failed: u64,
    pub realized_profit: HashMap<Currency, Decimal>,
    pub halted: bool,
    /// Not halted, but the failure counter keeps the risk gate closed
    pub execution_blocked: bool,
    pub consecutive_failures: u32,
    pub last_cycle_ms: u64,
    pub avg_cycle_latency_ms: Option<u64>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Cloneable handle to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    stats: Arc<RwLock<EngineStats>>,
    events: EventBus,
}

impl EngineHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        stats: Arc<RwLock<EngineStats>>,
        events: EventBus,
    ) -> Self {
        Self {
            commands,
            stats,
            events,
        }
    }

    pub async fn run_now(&self) -> Result<(), EngineStopped> {
        self.send(Command::RunNow).await
    }

    pub async fn resume(&self) -> Result<(), EngineStopped> {
        self.send(Command::Resume).await
    }

    pub async fn shutdown(&self) -> Result<(), EngineStopped> {
        self.send(Command::Shutdown).await
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), EngineStopped> {
        self.commands.send(command).await.map_err(|_| EngineStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_after_engine_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let handle = EngineHandle::new(tx, Arc::default(), EventBus::new(4));

        handle.run_now().await.unwrap();
        drop(rx);
        assert!(handle.shutdown().await.is_err());
    }

    #[test]
    fn test_stats_snapshot_is_detached() {
        let (tx, _rx) = mpsc::channel(4);
        let stats = Arc::new(RwLock::new(EngineStats::default()));
        let handle = EngineHandle::new(tx, Arc::clone(&stats), EventBus::new(4));

        let before = handle.stats();
        stats.write().cycles = 7;
        assert_eq!(before.cycles, 0);
        assert_eq!(handle.stats().cycles, 7);
    }
}
