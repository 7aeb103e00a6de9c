//! Trade execution records
//!
//! A record is created when funds are reserved and is mutated only by the
//! execution state machine. Once terminal it never changes again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::precision::{deviation_pct, truncate};
use crate::{Currency, Direction, ExecutionError, Side, Symbol};

pub type TradeId = Uuid;

/// Lifecycle state: `Reserved -> Executing -> Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    Reserved,
    Executing,
    Completed,
    Failed,
}

impl TradeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeState::Completed | TradeState::Failed)
    }

    pub fn can_transition_to(&self, next: TradeState) -> bool {
        matches!(
            (self, next),
            (TradeState::Reserved, TradeState::Executing)
                | (TradeState::Reserved, TradeState::Failed)
                | (TradeState::Executing, TradeState::Completed)
                | (TradeState::Executing, TradeState::Failed)
        )
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradeState::Reserved => "RESERVED",
            TradeState::Executing => "EXECUTING",
            TradeState::Completed => "COMPLETED",
            TradeState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Fill outcome of one submitted leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub index: usize,
    pub symbol: Symbol,
    pub side: Side,
    /// Input amount requested
    pub requested: Decimal,
    /// Input amount actually consumed
    pub filled: Decimal,
    /// Output received after fees
    pub received: Decimal,
    pub average_price: Decimal,
    pub fee: Decimal,
    pub order_id: String,
}

impl LegResult {
    /// Filled share of the requested input
    pub fn fill_ratio(&self) -> Decimal {
        if self.requested.is_zero() {
            return Decimal::ZERO;
        }
        truncate(self.filled / self.requested)
    }
}

/// Currency left stranded after a failed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    pub currency: Currency,
    pub amount: Decimal,
}

/// What happened to completed legs after a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnwindOutcome {
    /// No leg had completed
    NotNeeded,
    /// All completed legs were reversed back into the funding currency
    Unwound { recovered: Decimal },
    /// Reversal stopped part-way; manual reconciliation required
    Incomplete {
        exposure: Exposure,
        /// Smaller balances stranded in other currencies of the route
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        residual: Vec<Exposure>,
        reason: String,
    },
}

impl UnwindOutcome {
    /// Where the reversal stopped
    pub fn exposure(&self) -> Option<&Exposure> {
        match self {
            UnwindOutcome::Incomplete { exposure, .. } => Some(exposure),
            _ => None,
        }
    }

    /// Every stranded balance, the stopping point first
    pub fn exposures(&self) -> impl Iterator<Item = &Exposure> {
        let (primary, residual) = match self {
            UnwindOutcome::Incomplete { exposure, residual, .. } => (Some(exposure), residual.as_slice()),
            _ => (None, &[][..]),
        };
        primary.into_iter().chain(residual)
    }
}

/// Full history of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecutionRecord {
    pub id: TradeId,
    pub triangle_id: String,
    pub funding_currency: Currency,
    pub direction: Direction,
    pub notional: Decimal,
    pub state: TradeState,
    pub legs: Vec<LegResult>,
    /// Leg prices the evaluator expected, used for realized slippage
    pub expected_leg_prices: [Decimal; 3],
    pub warnings: Vec<String>,
    pub final_amount: Option<Decimal>,
    pub realized_profit: Option<Decimal>,
    pub failure: Option<String>,
    pub unwind: Option<UnwindOutcome>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TradeExecutionRecord {
    pub fn reserved(
        triangle_id: impl Into<String>,
        funding_currency: Currency,
        direction: Direction,
        notional: Decimal,
        expected_leg_prices: [Decimal; 3],
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            triangle_id: triangle_id.into(),
            funding_currency,
            direction,
            notional,
            state: TradeState::Reserved,
            legs: Vec::new(),
            expected_leg_prices,
            warnings: Vec::new(),
            final_amount: None,
            realized_profit: None,
            failure: None,
            unwind: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: TradeState) -> Result<(), ExecutionError> {
        if !self.state.can_transition_to(next) {
            return Err(ExecutionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.state == TradeState::Completed
    }

    /// Mean deviation of executed leg prices from the expected ones, in percent
    pub fn realized_slippage_pct(&self) -> Option<Decimal> {
        let deviations: Vec<Decimal> = self
            .legs
            .iter()
            .filter_map(|leg| {
                let expected = *self.expected_leg_prices.get(leg.index)?;
                if expected.is_zero() || leg.average_price.is_zero() {
                    return None;
                }
                Some(deviation_pct(expected, leg.average_price))
            })
            .collect();

        if deviations.is_empty() {
            return None;
        }
        let sum: Decimal = deviations.iter().sum();
        Some(truncate(sum / Decimal::from(deviations.len())))
    }

    /// Stranded currency after an incomplete unwind
    pub fn exposure(&self) -> Option<&Exposure> {
        self.unwind.as_ref().and_then(UnwindOutcome::exposure)
    }

    pub fn exposures(&self) -> impl Iterator<Item = &Exposure> {
        self.unwind.iter().flat_map(|unwind| unwind.exposures())
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> TradeExecutionRecord {
        TradeExecutionRecord::reserved(
            "USDT-BTC-ETH",
            Currency::new("USDT"),
            Direction::Forward,
            dec!(1000),
            [dec!(50000), dec!(0.05), dec!(2510)],
        )
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut rec = record();
        assert_eq!(rec.state, TradeState::Reserved);
        rec.transition(TradeState::Executing).unwrap();
        rec.transition(TradeState::Completed).unwrap();
        assert!(rec.is_terminal());
        assert!(rec.ended_at.is_some());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut rec = record();
        rec.transition(TradeState::Executing).unwrap();
        rec.transition(TradeState::Failed).unwrap();
        let err = rec.transition(TradeState::Completed).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::InvalidTransition { from: TradeState::Failed, to: TradeState::Completed }
        ));
    }

    #[test]
    fn test_cannot_complete_without_executing() {
        let mut rec = record();
        assert!(rec.transition(TradeState::Completed).is_err());
        assert_eq!(rec.state, TradeState::Reserved);
    }

    #[test]
    fn test_realized_slippage() {
        let mut rec = record();
        rec.legs.push(LegResult {
            index: 0,
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Buy,
            requested: dec!(1000),
            filled: dec!(1000),
            received: dec!(0.01998),
            average_price: dec!(50500),
            fee: dec!(0.00002),
            order_id: "1".into(),
        });
        // 1% worse than expected on the only executed leg
        assert_eq!(rec.realized_slippage_pct(), Some(dec!(1)));
    }

    #[test]
    fn test_exposures_lists_stop_point_first() {
        let mut rec = record();
        assert_eq!(rec.exposures().count(), 0);

        rec.unwind = Some(UnwindOutcome::Incomplete {
            exposure: Exposure { currency: Currency::new("ETH"), amount: dec!(0.36) },
            residual: vec![Exposure { currency: Currency::new("BTC"), amount: dec!(0.002) }],
            reason: "unwind of ETHBTC failed".into(),
        });
        let currencies: Vec<&str> = rec.exposures().map(|e| e.currency.as_str()).collect();
        assert_eq!(currencies, ["ETH", "BTC"]);
        assert_eq!(rec.exposure().unwrap().amount, dec!(0.36));
    }
}
