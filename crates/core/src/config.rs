//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{CoreError, CoreResult, Currency, SymbolRegistry, SymbolSpec, Triangle, TriangleSpec};

/// Which pricing path the evaluator uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Best bid/ask only
    TopOfBook,
    /// Always walk the book levels
    DepthWalk,
    /// Top of book when the best level covers every leg, depth walk otherwise
    Adaptive,
}

/// Trade sizing and profitability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub min_profit_threshold_pct: Decimal,
    pub taker_fee_rate: Decimal,
    /// First-leg notional in the funding currency, before the adaptive multiplier
    pub base_notional: Decimal,
    pub notional_by_currency: HashMap<Currency, Decimal>,
    pub max_concurrent_per_currency: usize,
    /// Shaved off each leg output before it feeds the next leg, in percent
    pub leg_safety_buffer_pct: Decimal,
    /// Fills below this share of the request are flagged as partial
    pub partial_fill_threshold: Decimal,
    pub leg_timeout_ms: u64,
    pub pricing_mode: PricingMode,
    /// Book levels summed for per-leg liquidity
    pub liquidity_levels: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold_pct: dec!(0.1),
            taker_fee_rate: dec!(0.001),
            base_notional: dec!(100),
            notional_by_currency: HashMap::new(),
            max_concurrent_per_currency: 1,
            leg_safety_buffer_pct: dec!(0.1),
            partial_fill_threshold: dec!(0.95),
            leg_timeout_ms: 10_000,
            pricing_mode: PricingMode::Adaptive,
            liquidity_levels: 5,
        }
    }
}

impl TradingConfig {
    pub fn base_notional_for(&self, currency: &Currency) -> Decimal {
        self.notional_by_currency
            .get(currency)
            .copied()
            .unwrap_or(self.base_notional)
    }

    pub fn leg_timeout(&self) -> Duration {
        Duration::from_millis(self.leg_timeout_ms)
    }
}

/// Order book fetching and caching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub depth: usize,
    pub freshness_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub book_timeout_ms: u64,
    pub ticker_timeout_ms: u64,
    /// JSON order book fixture for the static provider
    pub fixture_path: Option<String>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            depth: 20,
            freshness_ms: 1_000,
            max_attempts: 3,
            backoff_base_ms: 100,
            backoff_max_ms: 2_000,
            book_timeout_ms: 3_000,
            ticker_timeout_ms: 1_000,
            fixture_path: None,
        }
    }
}

/// Risk gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_avg_latency_ms: u64,
    pub max_slippage_pct: Decimal,
    /// Extra balance required above the notional, in percent
    pub balance_buffer_pct: Decimal,
    pub min_safety_score: Decimal,
    pub max_consecutive_failures: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_avg_latency_ms: 2_000,
            max_slippage_pct: dec!(0.5),
            balance_buffer_pct: dec!(1),
            min_safety_score: dec!(7),
            max_consecutive_failures: 3,
        }
    }
}

/// Trade-size adaptation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub growth_factor: Decimal,
    pub shrink_factor: Decimal,
    pub min_multiplier: Decimal,
    pub max_multiplier: Decimal,
    pub slippage_window: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            growth_factor: dec!(1.05),
            shrink_factor: dec!(0.9),
            min_multiplier: dec!(0.1),
            max_multiplier: dec!(2),
            slippage_window: 10,
        }
    }
}

/// Control loop pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Next delay = previous cycle duration x factor, clamped
    pub delay_factor: u32,
    pub latency_window: usize,
    pub balance_refresh_ms: u64,
    pub trade_history_limit: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1_000,
            max_delay_ms: 5_000,
            delay_factor: 2,
            latency_window: 10,
            balance_refresh_ms: 1_000,
            trade_history_limit: 500,
        }
    }
}

/// Simulated venue used for dry runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub enabled: bool,
    pub balances: HashMap<Currency, Decimal>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            balances: HashMap::new(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trading: TradingConfig,
    pub market_data: MarketDataConfig,
    pub risk: RiskConfig,
    pub adaptive: AdaptiveConfig,
    pub control: ControlConfig,
    pub paper: PaperConfig,
    pub symbols: Vec<SymbolSpec>,
    pub triangles: Vec<TriangleSpec>,
}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> CoreResult<()> {
        let t = &self.trading;
        if t.taker_fee_rate < Decimal::ZERO || t.taker_fee_rate >= Decimal::ONE {
            return invalid(format!("taker_fee_rate {} outside [0, 1)", t.taker_fee_rate));
        }
        if t.base_notional <= Decimal::ZERO {
            return invalid("base_notional must be positive");
        }
        if t.max_concurrent_per_currency == 0 {
            return invalid("max_concurrent_per_currency must be at least 1");
        }
        if t.partial_fill_threshold <= Decimal::ZERO || t.partial_fill_threshold > Decimal::ONE {
            return invalid("partial_fill_threshold must be in (0, 1]");
        }
        if t.leg_safety_buffer_pct < Decimal::ZERO || t.leg_safety_buffer_pct >= Decimal::ONE_HUNDRED {
            return invalid("leg_safety_buffer_pct must be in [0, 100)");
        }

        let m = &self.market_data;
        if m.max_attempts == 0 {
            return invalid("market_data.max_attempts must be at least 1");
        }
        if m.depth == 0 {
            return invalid("market_data.depth must be at least 1");
        }

        let a = &self.adaptive;
        if a.min_multiplier <= Decimal::ZERO || a.min_multiplier > a.max_multiplier {
            return invalid("adaptive multiplier bounds are inconsistent");
        }
        if a.slippage_window == 0 {
            return invalid("adaptive.slippage_window must be at least 1");
        }

        let c = &self.control;
        if c.min_delay_ms > c.max_delay_ms {
            return invalid("control.min_delay_ms exceeds control.max_delay_ms");
        }

        if self.risk.max_consecutive_failures == 0 {
            return invalid("risk.max_consecutive_failures must be at least 1");
        }

        Ok(())
    }

    /// Validate every configured triangle against the symbol table
    pub fn build_triangles(&self) -> CoreResult<Vec<Triangle>> {
        let registry = SymbolRegistry::from_specs(&self.symbols)?;
        self.triangles
            .iter()
            .map(|spec| Triangle::from_spec(spec, &registry))
            .collect()
    }
}

fn invalid<T>(msg: impl Into<String>) -> CoreResult<T> {
    Err(CoreError::InvalidConfig(msg.into()))
}
