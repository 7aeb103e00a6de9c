//! Consecutive-failure breaker
//!
//! Trips after `max_consecutive_failures` failed trades in a row, or at once
//! when a failed unwind leaves currency exposure behind. Once tripped it
//! stays halted until [`FailureBreaker::reset`] is called from outside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use triarb_core::{ExecutionError, ExecutionResult, Exposure};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HaltReason {
    ConsecutiveFailures { count: u32 },
    UnresolvedExposure { exposure: Exposure },
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::ConsecutiveFailures { count } => {
                write!(f, "{count} consecutive execution failures")
            }
            HaltReason::UnresolvedExposure { exposure } => write!(
                f,
                "unresolved exposure of {} {}",
                exposure.amount, exposure.currency
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Halted {
        reason: HaltReason,
        since: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct FailureBreaker {
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    state: BreakerState,
}

impl FailureBreaker {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
            consecutive_failures: 0,
            state: BreakerState::Closed,
        }
    }

    pub fn can_trade(&self) -> ExecutionResult<()> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Halted { .. } => Err(ExecutionError::Halted {
                consecutive_failures: self.consecutive_failures,
            }),
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count a failed trade; returns the halt reason if this trips the breaker
    pub fn record_failure(&mut self) -> Option<HaltReason> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.max_consecutive_failures && !self.is_halted() {
            let reason = HaltReason::ConsecutiveFailures {
                count: self.consecutive_failures,
            };
            self.trip(reason.clone());
            return Some(reason);
        }
        None
    }

    pub fn halt_for_exposure(&mut self, exposure: Exposure) -> HaltReason {
        let reason = HaltReason::UnresolvedExposure { exposure };
        self.trip(reason.clone());
        reason
    }

    /// Manual intervention: clear the halt and the failure counter
    pub fn reset(&mut self) {
        if self.is_halted() {
            info!(failures = self.consecutive_failures, "Failure breaker reset");
        }
        self.consecutive_failures = 0;
        self.state = BreakerState::Closed;
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, BreakerState::Halted { .. })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn state(&self) -> &BreakerState {
        &self.state
    }

    fn trip(&mut self, reason: HaltReason) {
        warn!(%reason, "Failure breaker tripped, execution halted");
        self.state = BreakerState::Halted {
            reason,
            since: Utc::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use triarb_core::Currency;

    #[test]
    fn test_trips_at_limit() {
        let mut breaker = FailureBreaker::new(3);
        assert!(breaker.record_failure().is_none());
        assert!(breaker.record_failure().is_none());
        assert!(breaker.can_trade().is_ok());

        let reason = breaker.record_failure().unwrap();
        assert_eq!(reason, HaltReason::ConsecutiveFailures { count: 3 });
        assert!(matches!(
            breaker.can_trade(),
            Err(ExecutionError::Halted { consecutive_failures: 3 })
        ));
    }

    #[test]
    fn test_success_resets_counter() {
        let mut breaker = FailureBreaker::new(3);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_halted());
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[test]
    fn test_exposure_halts_immediately() {
        let mut breaker = FailureBreaker::new(3);
        breaker.halt_for_exposure(Exposure {
            currency: Currency::new("BTC"),
            amount: dec!(0.02),
        });
        assert!(breaker.is_halted());
        assert!(breaker.can_trade().is_err());

        breaker.reset();
        assert!(breaker.can_trade().is_ok());
        assert_eq!(breaker.consecutive_failures(), 0);
    }
}
