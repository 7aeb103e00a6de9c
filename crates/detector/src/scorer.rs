//! Multi-factor opportunity scoring
//!
//! Each factor maps to 0-100 through tiered thresholds that are monotonic in
//! the favorable direction. The total is the weighted sum divided by the
//! weight sum, so it stays on the same 0-100 scale.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use triarb_core::precision::truncate;
use triarb_core::{OpportunityEvaluation, Recommendation, RiskTier, ScoredOpportunity, SubScores};

use crate::history::TriangleHistory;

/// Factor weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub profit_pct: Decimal,
    pub profit_amount: Decimal,
    pub execution_speed: Decimal,
    pub liquidity: Decimal,
    pub volatility: Decimal,
    pub history: Decimal,
}

impl ScoreWeights {
    pub fn sum(&self) -> Decimal {
        self.profit_pct
            + self.profit_amount
            + self.execution_speed
            + self.liquidity
            + self.volatility
            + self.history
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            profit_pct: dec!(0.40),
            profit_amount: dec!(0.40),
            execution_speed: dec!(0.15),
            liquidity: dec!(0.10),
            volatility: dec!(0.05),
            history: dec!(0.05),
        }
    }
}

/// Score used when a triangle has fewer than two profit samples
pub const NEUTRAL_VOLATILITY_SCORE: Decimal = dec!(75);
/// Score used when a triangle has never been executed
pub const NEUTRAL_HISTORY_SCORE: Decimal = dec!(50);

/// Ranks evaluations; pure and deterministic
#[derive(Debug, Clone, Default)]
pub struct OpportunityScorer {
    weights: ScoreWeights,
}

impl OpportunityScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        evaluation: &OpportunityEvaluation,
        history: Option<&TriangleHistory>,
    ) -> ScoredOpportunity {
        let profit_samples: Vec<Decimal> = history
            .map(|h| h.profit_pcts().iter().copied().collect())
            .unwrap_or_default();

        let sub_scores = SubScores {
            profit_pct: profit_pct_score(evaluation.profit_pct),
            profit_amount: profit_amount_score(evaluation.profit),
            execution_speed: execution_speed_score(evaluation.leg_count()),
            liquidity: liquidity_score(estimated_slippage(evaluation, history)),
            volatility: volatility_score(&profit_samples),
            history: history_score(history),
        };

        let total_score = self.total(&sub_scores);
        let risk_tier = risk_tier(&sub_scores);
        let recommendation = recommend(evaluation, total_score, risk_tier);

        ScoredOpportunity {
            evaluation: evaluation.clone(),
            total_score,
            sub_scores,
            risk_tier,
            recommendation,
        }
    }

    fn total(&self, s: &SubScores) -> Decimal {
        let w = &self.weights;
        let weighted = w.profit_pct * s.profit_pct
            + w.profit_amount * s.profit_amount
            + w.execution_speed * s.execution_speed
            + w.liquidity * s.liquidity
            + w.volatility * s.volatility
            + w.history * s.history;

        let sum = w.sum();
        if sum.is_zero() {
            return Decimal::ZERO;
        }
        truncate(weighted / sum)
    }
}

/// Profit percentage tiers
pub fn profit_pct_score(profit_pct: Decimal) -> Decimal {
    let score = if profit_pct >= dec!(1) {
        100
    } else if profit_pct >= dec!(0.5) {
        85
    } else if profit_pct >= dec!(0.3) {
        70
    } else if profit_pct >= dec!(0.2) {
        55
    } else if profit_pct >= dec!(0.1) {
        40
    } else if profit_pct > Decimal::ZERO {
        20
    } else {
        0
    };
    Decimal::from(score)
}

/// Absolute profit tiers, in funding-currency units
pub fn profit_amount_score(profit: Decimal) -> Decimal {
    let score = if profit >= dec!(50) {
        100
    } else if profit >= dec!(20) {
        80
    } else if profit >= dec!(10) {
        65
    } else if profit >= dec!(5) {
        50
    } else if profit >= dec!(1) {
        30
    } else if profit > Decimal::ZERO {
        10
    } else {
        0
    };
    Decimal::from(score)
}

/// 3 legs score 100; longer routes lose proportionally
pub fn execution_speed_score(legs: usize) -> Decimal {
    if legs == 0 {
        return Decimal::ZERO;
    }
    let score = Decimal::from(300) / Decimal::from(legs as u64);
    truncate(score.min(Decimal::ONE_HUNDRED))
}

/// Worse of the estimated leg slippage and the realized mean
fn estimated_slippage(evaluation: &OpportunityEvaluation, history: Option<&TriangleHistory>) -> Decimal {
    let estimated = evaluation.max_slippage_pct();
    match history.and_then(TriangleHistory::realized_slippage_pct) {
        Some(realized) => estimated.max(realized),
        None => estimated,
    }
}

/// Slippage tiers: lower slippage, higher score
pub fn liquidity_score(slippage_pct: Decimal) -> Decimal {
    let score = if slippage_pct <= dec!(0.05) {
        100
    } else if slippage_pct <= dec!(0.1) {
        85
    } else if slippage_pct <= dec!(0.25) {
        70
    } else if slippage_pct <= dec!(0.5) {
        55
    } else if slippage_pct <= dec!(1.0) {
        35
    } else {
        10
    };
    Decimal::from(score)
}

/// Population standard deviation; `None` below two samples
pub fn std_dev(samples: &[Decimal]) -> Option<Decimal> {
    if samples.len() < 2 {
        return None;
    }
    let n = Decimal::from(samples.len() as u64);
    let mean = samples.iter().sum::<Decimal>() / n;
    let variance = samples
        .iter()
        .map(|s| (*s - mean) * (*s - mean))
        .sum::<Decimal>()
        / n;
    variance.sqrt().map(truncate)
}

/// Stdev tiers over the recent profit percentages
pub fn volatility_score(samples: &[Decimal]) -> Decimal {
    let Some(stdev) = std_dev(samples) else {
        return NEUTRAL_VOLATILITY_SCORE;
    };
    let score = if stdev <= dec!(0.02) {
        100
    } else if stdev <= dec!(0.05) {
        85
    } else if stdev <= dec!(0.1) {
        70
    } else if stdev <= dec!(0.2) {
        50
    } else {
        30
    };
    Decimal::from(score)
}

/// `0.3 x lifetime + 0.7 x recent` success rate, scaled to 100
pub fn history_score(history: Option<&TriangleHistory>) -> Decimal {
    let Some(history) = history.filter(|h| h.has_outcomes()) else {
        return NEUTRAL_HISTORY_SCORE;
    };
    let lifetime = history.lifetime_success_rate().unwrap_or(Decimal::ZERO);
    let recent = history.recent_success_rate().unwrap_or(lifetime);
    truncate((dec!(0.3) * lifetime + dec!(0.7) * recent) * Decimal::ONE_HUNDRED)
}

pub fn risk_tier(s: &SubScores) -> RiskTier {
    if s.liquidity < dec!(60) || s.volatility < dec!(50) {
        RiskTier::High
    } else if s.liquidity < dec!(75) || s.volatility < dec!(70) {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Deterministic lookup over `(total, profit_pct, tier)`
pub fn recommend(evaluation: &OpportunityEvaluation, total: Decimal, tier: RiskTier) -> Recommendation {
    let pct = evaluation.profit_pct;
    if !evaluation.is_profitable || pct <= Decimal::ZERO {
        return Recommendation::Skip;
    }

    if total >= dec!(80) && pct >= dec!(0.3) && tier == RiskTier::Low {
        Recommendation::StrongBuy
    } else if total >= dec!(65) && pct >= dec!(0.15) && tier != RiskTier::High {
        Recommendation::Buy
    } else if total >= dec!(50) {
        Recommendation::Consider
    } else if total >= dec!(30) {
        Recommendation::Monitor
    } else {
        Recommendation::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::tests::{scenario_books, usdt_btc_eth};
    use crate::evaluator::{EvaluatorConfig, TriangleEvaluator};
    use triarb_core::PricingMode;

    fn scenario_evaluation() -> OpportunityEvaluation {
        TriangleEvaluator::new(EvaluatorConfig {
            min_profit_threshold_pct: dec!(0.05),
            taker_fee_rate: dec!(0.001),
            pricing_mode: PricingMode::TopOfBook,
            liquidity_levels: 5,
        })
        .evaluate(&usdt_btc_eth(), &scenario_books(), dec!(1000))
        .unwrap()
    }

    #[test]
    fn test_tiers_are_monotonic() {
        let pcts = [dec!(-1), dec!(0.01), dec!(0.1), dec!(0.2), dec!(0.3), dec!(0.5), dec!(1), dec!(5)];
        let scores: Vec<_> = pcts.iter().map(|p| profit_pct_score(*p)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));

        let slippages = [dec!(0), dec!(0.08), dec!(0.2), dec!(0.4), dec!(0.9), dec!(3)];
        let scores: Vec<_> = slippages.iter().map(|s| liquidity_score(*s)).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_execution_speed() {
        assert_eq!(execution_speed_score(3), dec!(100));
        assert_eq!(execution_speed_score(4), dec!(75));
        assert_eq!(execution_speed_score(2), dec!(100));
    }

    #[test]
    fn test_volatility() {
        assert_eq!(volatility_score(&[]), NEUTRAL_VOLATILITY_SCORE);
        assert_eq!(volatility_score(&[dec!(0.5)]), NEUTRAL_VOLATILITY_SCORE);
        assert_eq!(volatility_score(&[dec!(0.2), dec!(0.2), dec!(0.2)]), dec!(100));
        assert_eq!(volatility_score(&[dec!(0.1), dec!(0.9)]), dec!(30));

        let stdev = std_dev(&[dec!(1), dec!(3)]).unwrap();
        assert!((stdev - dec!(1)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_history_blend() {
        assert_eq!(history_score(None), NEUTRAL_HISTORY_SCORE);

        let mut history = TriangleHistory::default();
        for _ in 0..10 {
            history.record_outcome(false);
        }
        for _ in 0..10 {
            history.record_outcome(true);
        }
        // lifetime 0.5, recent 1.0
        assert_eq!(history_score(Some(&history)), dec!(85));
    }

    #[test]
    fn test_risk_tiers() {
        let base = SubScores {
            profit_pct: dec!(50),
            profit_amount: dec!(50),
            execution_speed: dec!(100),
            liquidity: dec!(100),
            volatility: dec!(100),
            history: dec!(50),
        };
        assert_eq!(risk_tier(&base), RiskTier::Low);
        assert_eq!(risk_tier(&SubScores { liquidity: dec!(70), ..base }), RiskTier::Medium);
        assert_eq!(risk_tier(&SubScores { volatility: dec!(30), ..base }), RiskTier::High);
    }

    #[test]
    fn test_scenario_scoring() {
        let scored = OpportunityScorer::default().score(&scenario_evaluation(), None);

        assert_eq!(scored.sub_scores.profit_pct, dec!(20));
        assert_eq!(scored.sub_scores.profit_amount, dec!(10));
        assert_eq!(scored.sub_scores.liquidity, dec!(100));
        // (8 + 4 + 15 + 10 + 3.75 + 2.5) / 1.15
        assert_eq!(scored.total_score, truncate(dec!(43.25) / dec!(1.15)));
        assert_eq!(scored.risk_tier, RiskTier::Low);
        assert_eq!(scored.recommendation, Recommendation::Monitor);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let scorer = OpportunityScorer::default();
        let eval = scenario_evaluation();
        let mut history = TriangleHistory::default();
        history.record_profit_pct(dec!(0.1));
        history.record_profit_pct(dec!(0.12));
        history.record_outcome(true);

        let a = scorer.score(&eval, Some(&history));
        let b = scorer.score(&eval, Some(&history));
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unprofitable_is_skipped() {
        let mut eval = scenario_evaluation();
        eval.is_profitable = false;
        assert_eq!(recommend(&eval, dec!(99), RiskTier::Low), Recommendation::Skip);
    }

    #[test]
    fn test_recommendation_lookup() {
        let mut eval = scenario_evaluation();
        eval.profit_pct = dec!(0.4);
        assert_eq!(recommend(&eval, dec!(85), RiskTier::Low), Recommendation::StrongBuy);
        assert_eq!(recommend(&eval, dec!(85), RiskTier::Medium), Recommendation::Buy);
        assert_eq!(recommend(&eval, dec!(85), RiskTier::High), Recommendation::Consider);
        assert_eq!(recommend(&eval, dec!(40), RiskTier::Low), Recommendation::Monitor);
        assert_eq!(recommend(&eval, dec!(10), RiskTier::Low), Recommendation::Skip);
    }
}
