//! Risk gate: turns independent risk flags into a safety score and an
//! execute/skip decision
//!
//! Suggested adjustments are advisory only and never applied automatically.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use triarb_core::precision::truncate;
use triarb_core::{Currency, OpportunityEvaluation, RiskConfig};

/// Penalty per raised flag
const FLAG_PENALTY: Decimal = dec!(1.5);
const MAX_SAFETY_SCORE: Decimal = dec!(10);
const MIN_SAFETY_SCORE: Decimal = dec!(1);

/// Funding-currency view used by the gate
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub currency: Currency,
    pub cached_balance: Decimal,
    pub active_trades: usize,
    pub concurrency_cap: usize,
}

/// Process-wide view used by the gate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemState {
    /// Mean wall-clock duration of recent cycles
    pub avg_cycle_latency_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub halted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flag", rename_all = "snake_case")]
pub enum RiskFlag {
    InsufficientBalance {
        currency: Currency,
        available: Decimal,
        required: Decimal,
    },
    HighLatency { avg_ms: u64, max_ms: u64 },
    ExcessiveSlippage { slippage_pct: Decimal, max_pct: Decimal },
    ConcurrencyCap { currency: Currency, active: usize, cap: usize },
    RecentFailures { count: u32 },
    Halted,
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFlag::InsufficientBalance { currency, available, required } => write!(
                f,
                "cached {currency} balance {available} below required {required}"
            ),
            RiskFlag::HighLatency { avg_ms, max_ms } => {
                write!(f, "average cycle latency {avg_ms}ms exceeds {max_ms}ms")
            }
            RiskFlag::ExcessiveSlippage { slippage_pct, max_pct } => {
                write!(f, "estimated slippage {slippage_pct}% exceeds {max_pct}%")
            }
            RiskFlag::ConcurrencyCap { currency, active, cap } => {
                write!(f, "{currency} already has {active} active trade(s), cap {cap}")
            }
            RiskFlag::RecentFailures { count } => {
                write!(f, "{count} consecutive execution failure(s)")
            }
            RiskFlag::Halted => f.write_str("execution is halted pending manual reset"),
        }
    }
}

/// Advisory parameter change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAdjustment {
    pub parameter: String,
    pub suggested: Option<Decimal>,
    pub note: String,
}

impl SuggestedAdjustment {
    fn new(parameter: &str, suggested: Option<Decimal>, note: impl Into<String>) -> Self {
        Self {
            parameter: parameter.to_string(),
            suggested,
            note: note.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub execute: bool,
    pub safety_score: Decimal,
    pub flags: Vec<RiskFlag>,
    pub reasons: Vec<String>,
    pub adjustments: Vec<SuggestedAdjustment>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskGate {
    config: RiskConfig,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Evaluate every flag independently, then decide
    pub fn assess_and_decide(
        &self,
        evaluation: &OpportunityEvaluation,
        account: &AccountState,
        system: &SystemState,
    ) -> Decision {
        let flags = self.assess(evaluation, account, system);
        let safety_score = safety_score(flags.len());

        let mut reasons: Vec<String> = flags.iter().map(ToString::to_string).collect();
        if !evaluation.is_profitable {
            reasons.push(format!(
                "profit {}% is below the configured threshold",
                evaluation.profit_pct
            ));
        }
        if safety_score < self.config.min_safety_score {
            reasons.push(format!(
                "safety score {safety_score} below minimum {}",
                self.config.min_safety_score
            ));
        }

        let execute = evaluation.is_profitable
            && safety_score >= self.config.min_safety_score
            && system.consecutive_failures == 0
            && !system.halted;

        let adjustments = if execute {
            Vec::new()
        } else {
            flags
                .iter()
                .filter_map(|flag| self.adjustment_for(flag, evaluation))
                .collect()
        };

        Decision {
            execute,
            safety_score,
            flags,
            reasons: if execute { Vec::new() } else { reasons },
            adjustments,
        }
    }

    fn assess(
        &self,
        evaluation: &OpportunityEvaluation,
        account: &AccountState,
        system: &SystemState,
    ) -> Vec<RiskFlag> {
        let mut flags = Vec::new();

        let required = truncate(
            evaluation.start_amount * (Decimal::ONE + self.config.balance_buffer_pct / Decimal::ONE_HUNDRED),
        );
        if account.cached_balance < required {
            flags.push(RiskFlag::InsufficientBalance {
                currency: account.currency.clone(),
                available: account.cached_balance,
                required,
            });
        }

        if let Some(avg_ms) = system.avg_cycle_latency_ms {
            if avg_ms > self.config.max_avg_latency_ms {
                flags.push(RiskFlag::HighLatency {
                    avg_ms,
                    max_ms: self.config.max_avg_latency_ms,
                });
            }
        }

        let slippage_pct = evaluation.max_slippage_pct();
        if slippage_pct > self.config.max_slippage_pct {
            flags.push(RiskFlag::ExcessiveSlippage {
                slippage_pct,
                max_pct: self.config.max_slippage_pct,
            });
        }

        if account.active_trades >= account.concurrency_cap {
            flags.push(RiskFlag::ConcurrencyCap {
                currency: account.currency.clone(),
                active: account.active_trades,
                cap: account.concurrency_cap,
            });
        }

        if system.consecutive_failures > 0 {
            flags.push(RiskFlag::RecentFailures {
                count: system.consecutive_failures,
            });
        }

        if system.halted {
            flags.push(RiskFlag::Halted);
        }

        flags
    }

    fn adjustment_for(&self, flag: &RiskFlag, evaluation: &OpportunityEvaluation) -> Option<SuggestedAdjustment> {
        let buffer = Decimal::ONE + self.config.balance_buffer_pct / Decimal::ONE_HUNDRED;
        match flag {
            RiskFlag::InsufficientBalance { available, .. } => Some(SuggestedAdjustment::new(
                "trading.base_notional",
                Some(truncate(*available / buffer)),
                "reduce trade size to fit the cached balance",
            )),
            RiskFlag::HighLatency { avg_ms, .. } => Some(SuggestedAdjustment::new(
                "control.min_delay_ms",
                Some(Decimal::from(*avg_ms * 2)),
                "slow the loop down until latency recovers",
            )),
            RiskFlag::ExcessiveSlippage { slippage_pct, max_pct } if !slippage_pct.is_zero() => {
                Some(SuggestedAdjustment::new(
                    "trading.base_notional",
                    Some(truncate(evaluation.start_amount * *max_pct / *slippage_pct)),
                    "smaller size consumes fewer book levels",
                ))
            }
            RiskFlag::ConcurrencyCap { cap, .. } => Some(SuggestedAdjustment::new(
                "trading.max_concurrent_per_currency",
                Some(Decimal::from(*cap as u64 + 1)),
                "raise the cap only if the venue enforces balances",
            )),
            RiskFlag::RecentFailures { .. } => Some(SuggestedAdjustment::new(
                "risk.max_consecutive_failures",
                None,
                "wait for a successful cycle before executing again",
            )),
            RiskFlag::Halted => Some(SuggestedAdjustment::new(
                "engine",
                None,
                "reconcile exposure and resume the engine manually",
            )),
            RiskFlag::ExcessiveSlippage { .. } => None,
        }
    }
}

/// `max(1, 10 - 1.5 x flags)`
pub fn safety_score(flag_count: usize) -> Decimal {
    (MAX_SAFETY_SCORE - FLAG_PENALTY * Decimal::from(flag_count as u64)).max(MIN_SAFETY_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use triarb_core::{Direction, LegQuote, PricingPath, Side, Symbol};

    fn evaluation(profitable: bool, slippage: Decimal) -> OpportunityEvaluation {
        let leg = |symbol: &str| LegQuote {
            symbol: Symbol::new(symbol),
            side: Side::Buy,
            input: dec!(1),
            output: dec!(1),
            average_price: dec!(1),
            best_price: dec!(1),
            liquidity: dec!(10),
            slippage_pct: slippage,
        };
        OpportunityEvaluation {
            triangle_id: "USDT-BTC-ETH".into(),
            funding_currency: Currency::new("USDT"),
            direction: Direction::Forward,
            route: "USDT -> BTC -> ETH -> USDT".into(),
            start_amount: dec!(1000),
            end_amount: dec!(1002),
            profit: dec!(2),
            profit_pct: dec!(0.2),
            is_profitable: profitable,
            legs: [leg("BTCUSDT"), leg("ETHBTC"), leg("ETHUSDT")],
            pricing: PricingPath::TopOfBook,
            evaluated_at: Utc::now(),
        }
    }

    fn account(balance: Decimal, active: usize) -> AccountState {
        AccountState {
            currency: Currency::new("USDT"),
            cached_balance: balance,
            active_trades: active,
            concurrency_cap: 1,
        }
    }

    #[test]
    fn test_safety_score_bounds() {
        assert_eq!(safety_score(0), dec!(10));
        assert_eq!(safety_score(1), dec!(8.5));
        assert_eq!(safety_score(2), dec!(7));
        assert_eq!(safety_score(3), dec!(5.5));
        assert_eq!(safety_score(6), dec!(1));
        assert_eq!(safety_score(10), dec!(1));
    }

    #[test]
    fn test_clean_opportunity_executes() {
        let gate = RiskGate::default();
        let decision = gate.assess_and_decide(
            &evaluation(true, dec!(0.01)),
            &account(dec!(5000), 0),
            &SystemState::default(),
        );
        assert!(decision.execute);
        assert_eq!(decision.safety_score, dec!(10));
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_balance_buffer() {
        let gate = RiskGate::default();
        // 1000 notional plus 1% buffer needs 1010
        let decision = gate.assess_and_decide(
            &evaluation(true, Decimal::ZERO),
            &account(dec!(1005), 0),
            &SystemState::default(),
        );
        assert!(matches!(decision.flags[0], RiskFlag::InsufficientBalance { required, .. } if required == dec!(1010)));
        // one flag still leaves 8.5
        assert!(decision.execute);
    }

    #[test]
    fn test_consecutive_failures_block_execution() {
        let gate = RiskGate::default();
        let decision = gate.assess_and_decide(
            &evaluation(true, Decimal::ZERO),
            &account(dec!(5000), 0),
            &SystemState {
                consecutive_failures: 1,
                ..Default::default()
            },
        );
        assert!(!decision.execute);
        assert_eq!(decision.safety_score, dec!(8.5));
        assert!(!decision.adjustments.is_empty());
    }

    #[test]
    fn test_multiple_flags_drop_score() {
        let gate = RiskGate::default();
        let decision = gate.assess_and_decide(
            &evaluation(true, dec!(2)),
            &account(dec!(10), 1),
            &SystemState {
                avg_cycle_latency_ms: Some(4_000),
                ..Default::default()
            },
        );
        assert_eq!(decision.flags.len(), 4);
        assert_eq!(decision.safety_score, dec!(4));
        assert!(!decision.execute);
        assert!(decision.reasons.iter().any(|r| r.contains("safety score")));
        assert!(decision
            .adjustments
            .iter()
            .any(|a| a.parameter == "trading.base_notional"));
    }

    #[test]
    fn test_unprofitable_never_executes() {
        let gate = RiskGate::default();
        let decision = gate.assess_and_decide(
            &evaluation(false, Decimal::ZERO),
            &account(dec!(5000), 0),
            &SystemState::default(),
        );
        assert!(!decision.execute);
        assert_eq!(decision.safety_score, dec!(10));
        assert_eq!(decision.reasons.len(), 1);
    }

    #[test]
    fn test_halted_blocks() {
        let gate = RiskGate::default();
        let decision = gate.assess_and_decide(
            &evaluation(true, Decimal::ZERO),
            &account(dec!(5000), 0),
            &SystemState {
                halted: true,
                ..Default::default()
            },
        );
        assert!(!decision.execute);
        assert!(decision.flags.contains(&RiskFlag::Halted));
    }
}
