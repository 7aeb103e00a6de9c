//! Adaptive trade sizing from execution outcomes

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use triarb_core::precision::truncate;
use triarb_core::{AdaptiveConfig, Currency, TradeExecutionRecord};

/// What one terminal trade changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveUpdate {
    pub triangle_id: String,
    pub mean_slippage_pct: Option<Decimal>,
    pub funding_currency: Currency,
    pub multiplier: Decimal,
}

/// Per-triangle slippage windows and per-funding-currency size multipliers
#[derive(Debug, Clone, Default)]
pub struct AdaptiveModel {
    config: AdaptiveConfig,
    slippage: HashMap<String, VecDeque<Decimal>>,
    multipliers: HashMap<Currency, Decimal>,
}

impl AdaptiveModel {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            config,
            slippage: HashMap::new(),
            multipliers: HashMap::new(),
        }
    }

    /// Learn from a terminal trade
    pub fn record(&mut self, record: &TradeExecutionRecord) -> AdaptiveUpdate {
        if let Some(sample) = record.realized_slippage_pct() {
            let window = self.slippage.entry(record.triangle_id.clone()).or_default();
            if window.len() == self.config.slippage_window {
                window.pop_front();
            }
            window.push_back(sample);
        }

        let current = self.multiplier(&record.funding_currency);
        let next = if record.succeeded() {
            (current * self.config.growth_factor).min(self.config.max_multiplier)
        } else {
            (current * self.config.shrink_factor).max(self.config.min_multiplier)
        };
        let next = truncate(next);
        self.multipliers.insert(record.funding_currency.clone(), next);

        let update = AdaptiveUpdate {
            triangle_id: record.triangle_id.clone(),
            mean_slippage_pct: self.mean_slippage(&record.triangle_id),
            funding_currency: record.funding_currency.clone(),
            multiplier: next,
        };
        debug!(
            triangle = %update.triangle_id,
            currency = %update.funding_currency,
            multiplier = %update.multiplier,
            "Adaptive model updated"
        );
        update
    }

    pub fn mean_slippage(&self, triangle_id: &str) -> Option<Decimal> {
        let window = self.slippage.get(triangle_id)?;
        if window.is_empty() {
            return None;
        }
        let sum: Decimal = window.iter().sum();
        Some(truncate(sum / Decimal::from(window.len() as u64)))
    }

    pub fn multiplier(&self, currency: &Currency) -> Decimal {
        self.multipliers
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// First-leg notional for `currency`
    pub fn trade_size(&self, currency: &Currency, base_notional: Decimal) -> Decimal {
        truncate(base_notional * self.multiplier(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use triarb_core::{Direction, LegResult, Side, Symbol, TradeState};

    fn terminal(success: bool, executed_price: Decimal) -> TradeExecutionRecord {
        let mut rec = TradeExecutionRecord::reserved(
            "USDT-BTC-ETH",
            Currency::new("USDT"),
            Direction::Forward,
            dec!(100),
            [dec!(100), dec!(1), dec!(1)],
        );
        rec.legs.push(LegResult {
            index: 0,
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Buy,
            requested: dec!(100),
            filled: dec!(100),
            received: dec!(1),
            average_price: executed_price,
            fee: Decimal::ZERO,
            order_id: "1".into(),
        });
        rec.transition(TradeState::Executing).unwrap();
        rec.transition(if success { TradeState::Completed } else { TradeState::Failed })
            .unwrap();
        rec
    }

    #[test]
    fn test_multiplier_grows_and_caps() {
        let mut model = AdaptiveModel::default();
        let usdt = Currency::new("USDT");

        model.record(&terminal(true, dec!(100)));
        assert_eq!(model.multiplier(&usdt), dec!(1.05));
        assert_eq!(model.trade_size(&usdt, dec!(100)), dec!(105));

        for _ in 0..50 {
            model.record(&terminal(true, dec!(100)));
        }
        assert_eq!(model.multiplier(&usdt), dec!(2));
    }

    #[test]
    fn test_multiplier_shrinks_and_floors() {
        let mut model = AdaptiveModel::default();
        let usdt = Currency::new("USDT");

        model.record(&terminal(false, dec!(100)));
        assert_eq!(model.multiplier(&usdt), dec!(0.9));

        for _ in 0..100 {
            model.record(&terminal(false, dec!(100)));
        }
        assert_eq!(model.multiplier(&usdt), dec!(0.1));
        assert_eq!(model.multiplier(&Currency::new("BTC")), Decimal::ONE);
    }

    #[test]
    fn test_slippage_window() {
        let mut model = AdaptiveModel::default();
        // first sample deviates 10%, the next ten deviate 1%
        model.record(&terminal(true, dec!(110)));
        assert_eq!(model.mean_slippage("USDT-BTC-ETH"), Some(dec!(10)));

        for _ in 0..10 {
            model.record(&terminal(true, dec!(101)));
        }
        assert_eq!(model.mean_slippage("USDT-BTC-ETH"), Some(dec!(1)));
        assert_eq!(model.mean_slippage("unknown"), None);
    }
}
