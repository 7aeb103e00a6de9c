//! Triangle evaluation
//!
//! Prices both cycle directions of a triangle against the current books and
//! keeps the better one. Every leg compounds the taker fee, and any leg that
//! cannot be filled invalidates its direction. Books are never substituted:
//! a missing book invalidates the whole triangle.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use triarb_core::precision::{percent_change, truncate};
use triarb_core::{
    Direction, EvaluationError, EvaluationResult, Leg, LegQuote, OpportunityEvaluation,
    OrderBookSnapshot, PricingMode, PricingPath, Symbol, TradingConfig, Triangle,
};

use crate::simulator::{best_level_covers, slippage_pct, top_of_book, walk, FillSimulation};

/// Books available for this cycle, keyed by symbol
pub type BookMap = HashMap<Symbol, Arc<OrderBookSnapshot>>;

/// Evaluation parameters
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub min_profit_threshold_pct: Decimal,
    pub taker_fee_rate: Decimal,
    pub pricing_mode: PricingMode,
    pub liquidity_levels: usize,
}

impl From<&TradingConfig> for EvaluatorConfig {
    fn from(cfg: &TradingConfig) -> Self {
        Self {
            min_profit_threshold_pct: cfg.min_profit_threshold_pct,
            taker_fee_rate: cfg.taker_fee_rate,
            pricing_mode: cfg.pricing_mode,
            liquidity_levels: cfg.liquidity_levels,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::from(&TradingConfig::default())
    }
}

/// One priced direction
struct CycleQuote {
    direction: Direction,
    legs: [LegQuote; 3],
    end_amount: Decimal,
    pricing: PricingPath,
}

/// Computes forward and reverse cycle profit for a triangle
#[derive(Debug, Clone, Default)]
pub struct TriangleEvaluator {
    config: EvaluatorConfig,
}

impl TriangleEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `triangle` starting with `notional` of its funding currency
    pub fn evaluate(
        &self,
        triangle: &Triangle,
        books: &BookMap,
        notional: Decimal,
    ) -> EvaluationResult<OpportunityEvaluation> {
        if notional <= Decimal::ZERO {
            return Err(EvaluationError::ZeroNotional);
        }
        for symbol in triangle.symbols() {
            if !books.contains_key(symbol) {
                return Err(EvaluationError::MissingBook(symbol.clone()));
            }
        }

        let forward = self.price_cycle(triangle, Direction::Forward, books, notional);
        let reverse = self.price_cycle(triangle, Direction::Reverse, books, notional);

        let best = match (forward, reverse) {
            (Ok(f), Ok(r)) => {
                // Same start amount, so the larger end amount has the larger profit_pct
                if r.end_amount > f.end_amount {
                    r
                } else {
                    f
                }
            }
            (Ok(f), Err(e)) => {
                trace!(triangle = %triangle.id, error = %e, "Reverse direction unfillable");
                f
            }
            (Err(e), Ok(r)) => {
                trace!(triangle = %triangle.id, error = %e, "Forward direction unfillable");
                r
            }
            (Err(e), Err(_)) => return Err(e),
        };

        let profit = truncate(best.end_amount - notional);
        let profit_pct = percent_change(notional, best.end_amount);

        Ok(OpportunityEvaluation {
            triangle_id: triangle.id.clone(),
            funding_currency: triangle.funding_currency().clone(),
            direction: best.direction,
            route: triangle.route(best.direction),
            start_amount: notional,
            end_amount: best.end_amount,
            profit,
            profit_pct,
            is_profitable: profit_pct >= self.config.min_profit_threshold_pct,
            legs: best.legs,
            pricing: best.pricing,
            evaluated_at: Utc::now(),
        })
    }

    fn price_cycle(
        &self,
        triangle: &Triangle,
        direction: Direction,
        books: &BookMap,
        notional: Decimal,
    ) -> EvaluationResult<CycleQuote> {
        let [l0, l1, l2] = triangle.legs(direction);

        let (q0, p0) = self.price_leg(l0, books, notional)?;
        let (q1, p1) = self.price_leg(l1, books, q0.output)?;
        let (q2, p2) = self.price_leg(l2, books, q1.output)?;

        let walked = [p0, p1, p2].contains(&PricingPath::DepthWalk);
        let end_amount = q2.output;

        Ok(CycleQuote {
            direction,
            legs: [q0, q1, q2],
            end_amount,
            pricing: if walked {
                PricingPath::DepthWalk
            } else {
                PricingPath::TopOfBook
            },
        })
    }

    fn price_leg(
        &self,
        leg: &Leg,
        books: &BookMap,
        input: Decimal,
    ) -> EvaluationResult<(LegQuote, PricingPath)> {
        let book = books
            .get(&leg.symbol)
            .ok_or_else(|| EvaluationError::MissingBook(leg.symbol.clone()))?;

        let side = leg.side();
        let levels = book.levels_for(side);
        let best = levels.first().ok_or_else(|| EvaluationError::EmptySide {
            symbol: leg.symbol.clone(),
            side,
        })?;

        let path = match self.config.pricing_mode {
            PricingMode::TopOfBook => PricingPath::TopOfBook,
            PricingMode::DepthWalk => PricingPath::DepthWalk,
            PricingMode::Adaptive if best_level_covers(side, input, levels) => PricingPath::TopOfBook,
            PricingMode::Adaptive => PricingPath::DepthWalk,
        };

        let fee = self.config.taker_fee_rate;
        let fill: FillSimulation = match path {
            PricingPath::TopOfBook => top_of_book(side, input, levels, fee),
            PricingPath::DepthWalk => walk(side, input, levels, fee),
        };

        if fill.is_unfillable() {
            return Err(EvaluationError::InsufficientDepth {
                symbol: leg.symbol.clone(),
                residual: fill.residual_unfilled,
            });
        }
        if fill.output <= Decimal::ZERO {
            return Err(EvaluationError::ZeroOutput(leg.symbol.clone()));
        }

        let quote = LegQuote {
            symbol: leg.symbol.clone(),
            side,
            input,
            output: fill.output,
            average_price: fill.average_price,
            best_price: best.price,
            liquidity: book.liquidity(side, self.config.liquidity_levels),
            slippage_pct: slippage_pct(best.price, fill.average_price),
        };
        Ok((quote, path))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use triarb_core::{Side, SymbolRegistry, SymbolSpec, TriangleSpec};

    pub(crate) fn usdt_btc_eth() -> Triangle {
        let registry = SymbolRegistry::from_specs(&[
            SymbolSpec::new("BTCUSDT", "BTC", "USDT"),
            SymbolSpec::new("ETHBTC", "ETH", "BTC"),
            SymbolSpec::new("ETHUSDT", "ETH", "USDT"),
        ])
        .unwrap();
        Triangle::from_spec(
            &TriangleSpec::new(["USDT", "BTC", "ETH"], ["BTCUSDT", "ETHBTC", "ETHUSDT"]),
            &registry,
        )
        .unwrap()
    }

    /// BTCUSDT ask 50000, ETHBTC ask 0.05, ETHUSDT bid 2510
    pub(crate) fn scenario_books() -> BookMap {
        [
            OrderBookSnapshot::from_pairs("BTCUSDT", &[(dec!(49990), dec!(1))], &[(dec!(50000), dec!(1))]),
            OrderBookSnapshot::from_pairs("ETHBTC", &[(dec!(0.0499), dec!(10))], &[(dec!(0.05), dec!(10))]),
            OrderBookSnapshot::from_pairs("ETHUSDT", &[(dec!(2510), dec!(10))], &[(dec!(2515), dec!(10))]),
        ]
        .into_iter()
        .map(|b| (b.symbol.clone(), Arc::new(b)))
        .collect()
    }

    fn evaluator(mode: PricingMode) -> TriangleEvaluator {
        TriangleEvaluator::new(EvaluatorConfig {
            min_profit_threshold_pct: dec!(0.05),
            taker_fee_rate: dec!(0.001),
            pricing_mode: mode,
            liquidity_levels: 5,
        })
    }

    #[test]
    fn test_scenario_top_of_book_profit() {
        let eval = evaluator(PricingMode::TopOfBook)
            .evaluate(&usdt_btc_eth(), &scenario_books(), dec!(1000))
            .unwrap();

        assert_eq!(eval.direction, Direction::Forward);
        assert_eq!(eval.legs[0].output, dec!(0.01998));
        assert_eq!(eval.legs[1].output, dec!(0.3992004));
        assert_eq!(eval.end_amount, dec!(1000.991010996));
        assert!((eval.profit_pct - dec!(0.0991010996)).abs() < dec!(0.000001));
        assert!(eval.is_profitable);
        assert_eq!(eval.pricing, PricingPath::TopOfBook);
    }

    #[test]
    fn test_profit_pct_identity() {
        for mode in [PricingMode::TopOfBook, PricingMode::DepthWalk, PricingMode::Adaptive] {
            let eval = evaluator(mode)
                .evaluate(&usdt_btc_eth(), &scenario_books(), dec!(1000))
                .unwrap();
            let expected = (eval.end_amount - eval.start_amount) / eval.start_amount * dec!(100);
            assert!((eval.profit_pct - expected).abs() < dec!(0.000000001));
            assert_eq!(eval.profit, eval.end_amount - eval.start_amount);
        }
    }

    #[test]
    fn test_threshold_decides_profitability() {
        let mut cfg = evaluator(PricingMode::TopOfBook).config().clone();
        cfg.min_profit_threshold_pct = dec!(0.1);
        let eval = TriangleEvaluator::new(cfg)
            .evaluate(&usdt_btc_eth(), &scenario_books(), dec!(1000))
            .unwrap();
        assert!(!eval.is_profitable);
    }

    #[test]
    fn test_reverse_wins_when_better() {
        // Cheap ETH on ETHUSDT and rich BTC bids flip the cycle
        let mut books = scenario_books();
        books.insert(
            Symbol::new("ETHUSDT"),
            Arc::new(OrderBookSnapshot::from_pairs("ETHUSDT", &[(dec!(2400), dec!(10))], &[(dec!(2401), dec!(10))])),
        );
        let eval = evaluator(PricingMode::TopOfBook)
            .evaluate(&usdt_btc_eth(), &books, dec!(1000))
            .unwrap();
        assert_eq!(eval.direction, Direction::Reverse);
        assert_eq!(eval.legs[0].symbol, Symbol::new("ETHUSDT"));
        assert_eq!(eval.legs[0].side, Side::Buy);
    }

    #[test]
    fn test_missing_book_is_invalid() {
        let mut books = scenario_books();
        books.remove(&Symbol::new("ETHBTC"));
        let err = evaluator(PricingMode::Adaptive)
            .evaluate(&usdt_btc_eth(), &books, dec!(1000))
            .unwrap_err();
        assert_eq!(err, EvaluationError::MissingBook(Symbol::new("ETHBTC")));
    }

    #[test]
    fn test_insufficient_depth_rejects_triangle() {
        // One ask of quantity 1 cannot absorb a 1000 USDT buy; with no bids
        // the reverse cycle cannot close either
        let mut books = scenario_books();
        books.insert(
            Symbol::new("BTCUSDT"),
            Arc::new(OrderBookSnapshot::from_pairs("BTCUSDT", &[], &[(dec!(10), dec!(1))])),
        );
        let err = evaluator(PricingMode::DepthWalk)
            .evaluate(&usdt_btc_eth(), &books, dec!(1000))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::InsufficientDepth { .. }));
    }

    #[test]
    fn test_adaptive_switches_to_depth_walk() {
        let mut books = scenario_books();
        books.insert(
            Symbol::new("BTCUSDT"),
            Arc::new(OrderBookSnapshot::from_pairs(
                "BTCUSDT",
                &[(dec!(49990), dec!(1))],
                &[(dec!(50000), dec!(0.01)), (dec!(50100), dec!(1))],
            )),
        );
        let eval = evaluator(PricingMode::Adaptive)
            .evaluate(&usdt_btc_eth(), &books, dec!(1000))
            .unwrap();
        assert_eq!(eval.pricing, PricingPath::DepthWalk);
        assert!(eval.legs[0].slippage_pct > Decimal::ZERO);
        assert!(eval.end_amount < dec!(1000.991010996));
    }

    #[test]
    fn test_empty_required_side_drops_direction() {
        let mut books = scenario_books();
        books.insert(
            Symbol::new("ETHUSDT"),
            Arc::new(OrderBookSnapshot::from_pairs("ETHUSDT", &[], &[(dec!(2515), dec!(10))])),
        );
        // Forward needs ETHUSDT bids; only the reverse cycle can be priced
        let eval = evaluator(PricingMode::TopOfBook)
            .evaluate(&usdt_btc_eth(), &books, dec!(1000))
            .unwrap();
        assert_eq!(eval.direction, Direction::Reverse);
        assert!(!eval.is_profitable);
    }

    #[test]
    fn test_zero_notional() {
        let err = evaluator(PricingMode::TopOfBook)
            .evaluate(&usdt_btc_eth(), &scenario_books(), Decimal::ZERO)
            .unwrap_err();
        assert_eq!(err, EvaluationError::ZeroNotional);
    }

    #[test]
    fn test_liquidity_attached() {
        let eval = evaluator(PricingMode::TopOfBook)
            .evaluate(&usdt_btc_eth(), &scenario_books(), dec!(1000))
            .unwrap();
        assert_eq!(eval.liquidity_per_leg(), [dec!(1), dec!(10), dec!(10)]);
    }
}
