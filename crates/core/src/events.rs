//! Structured engine events
//!
//! Events are published on a broadcast channel. Publishing never blocks and
//! never fails the caller: slow subscribers lag and drop old events, and a
//! bus with no subscribers simply discards them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::{Currency, Direction, Exposure, Recommendation, TradeExecutionRecord, TradeId};

/// Events consumed by alerting, persistence and other collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    OpportunityEvaluated {
        triangle_id: String,
        direction: Direction,
        profit_pct: Decimal,
        is_profitable: bool,
        total_score: Option<Decimal>,
        recommendation: Option<Recommendation>,
    },
    TradeReserved {
        trade_id: TradeId,
        triangle_id: String,
        funding_currency: Currency,
        notional: Decimal,
    },
    TradeCompleted {
        record: TradeExecutionRecord,
    },
    TradeFailed {
        record: TradeExecutionRecord,
    },
    /// Residual currency left after a failed unwind; needs manual reconciliation
    ExposureAlert {
        trade_id: TradeId,
        exposure: Exposure,
    },
    EngineHalted {
        consecutive_failures: u32,
        reason: String,
    },
    /// A failed trade holds new executions back until a success or resume
    ExecutionBlocked {
        consecutive_failures: u32,
        reason: String,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::OpportunityEvaluated { .. } => "opportunity_evaluated",
            EngineEvent::TradeReserved { .. } => "trade_reserved",
            EngineEvent::TradeCompleted { .. } => "trade_completed",
            EngineEvent::TradeFailed { .. } => "trade_failed",
            EngineEvent::ExposureAlert { .. } => "exposure_alert",
            EngineEvent::EngineHalted { .. } => "engine_halted",
            EngineEvent::ExecutionBlocked { .. } => "execution_blocked",
        }
    }
}

/// Non-blocking fan-out of engine events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: EngineEvent) {
        let name = event.name();
        // Err only means nobody is listening
        if self.tx.send(event).is_err() {
            trace!(event = name, "No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.publish(EngineEvent::EngineHalted {
            consecutive_failures: 3,
            reason: "test".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(EngineEvent::OpportunityEvaluated {
            triangle_id: "USDT-BTC-ETH".into(),
            direction: Direction::Forward,
            profit_pct: dec!(0.12),
            is_profitable: true,
            total_score: None,
            recommendation: None,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "opportunity_evaluated");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = EngineEvent::EngineHalted {
            consecutive_failures: 3,
            reason: "limit".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "engine_halted");
    }
}
