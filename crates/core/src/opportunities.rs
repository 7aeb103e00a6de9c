//! Arbitrage opportunity types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Currency, Direction, Side, Symbol};

/// How leg outputs were priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPath {
    /// Best bid / ask only
    TopOfBook,
    /// Full walk over book levels
    DepthWalk,
}

/// Pricing detail for one leg of an evaluated cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegQuote {
    pub symbol: Symbol,
    pub side: Side,
    /// Amount spent, in the leg's input currency
    pub input: Decimal,
    /// Amount received after fees, in the leg's output currency
    pub output: Decimal,
    /// Volume-weighted price actually paid or received
    pub average_price: Decimal,
    /// Best price on the consumed side when the leg was priced
    pub best_price: Decimal,
    /// Summed quantity over the top levels of the consumed side
    pub liquidity: Decimal,
    /// Deviation of `average_price` from `best_price`, in percent
    pub slippage_pct: Decimal,
}

/// Result of evaluating one triangle in its better direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityEvaluation {
    pub triangle_id: String,
    pub funding_currency: Currency,
    pub direction: Direction,
    pub route: String,
    pub start_amount: Decimal,
    pub end_amount: Decimal,
    pub profit: Decimal,
    pub profit_pct: Decimal,
    pub is_profitable: bool,
    pub legs: [LegQuote; 3],
    pub pricing: PricingPath,
    pub evaluated_at: DateTime<Utc>,
}

impl OpportunityEvaluation {
    pub fn leg_prices(&self) -> [Decimal; 3] {
        [
            self.legs[0].average_price,
            self.legs[1].average_price,
            self.legs[2].average_price,
        ]
    }

    pub fn liquidity_per_leg(&self) -> [Decimal; 3] {
        [
            self.legs[0].liquidity,
            self.legs[1].liquidity,
            self.legs[2].liquidity,
        ]
    }

    /// Worst estimated slippage across the legs
    pub fn max_slippage_pct(&self) -> Decimal {
        self.legs
            .iter()
            .map(|l| l.slippage_pct)
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }
}

/// Coarse risk classification of a scored opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        };
        f.write_str(name)
    }
}

/// Action suggested by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Consider,
    Monitor,
    Skip,
}

impl Recommendation {
    /// True for recommendations that may proceed to the risk gate
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Recommendation::StrongBuy | Recommendation::Buy | Recommendation::Consider
        )
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Recommendation::StrongBuy => "STRONG_BUY",
            Recommendation::Buy => "BUY",
            Recommendation::Consider => "CONSIDER",
            Recommendation::Monitor => "MONITOR",
            Recommendation::Skip => "SKIP",
        };
        f.write_str(name)
    }
}

/// Per-factor scores, each in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub profit_pct: Decimal,
    pub profit_amount: Decimal,
    pub execution_speed: Decimal,
    pub liquidity: Decimal,
    pub volatility: Decimal,
    pub history: Decimal,
}

/// Evaluation plus ranking metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOpportunity {
    pub evaluation: OpportunityEvaluation,
    pub total_score: Decimal,
    pub sub_scores: SubScores,
    pub risk_tier: RiskTier,
    pub recommendation: Recommendation,
}
