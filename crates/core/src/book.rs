//! Order book snapshot types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Side, Symbol};

/// Maximum levels kept per book side
pub const MAX_BOOK_DEPTH: usize = 100;

/// A single `(price, quantity)` level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Quote value of the full level
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, quantity): (Decimal, Decimal)) -> Self {
        Self { price, quantity }
    }
}

/// Point-in-time depth snapshot for one symbol
///
/// Bids are sorted by descending price, asks by ascending price. Levels with
/// zero quantity are removed levels, not zero-priced liquidity, and are
/// dropped on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub captured_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    pub fn new(symbol: Symbol, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self::with_depth(symbol, bids, asks, MAX_BOOK_DEPTH)
    }

    pub fn with_depth(
        symbol: Symbol,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        depth: usize,
    ) -> Self {
        let depth = depth.min(MAX_BOOK_DEPTH);
        Self {
            symbol,
            bids: normalize(bids, Side::Sell, depth),
            asks: normalize(asks, Side::Buy, depth),
            captured_at: Utc::now(),
        }
    }

    /// Build from raw `[price, quantity]` pairs
    pub fn from_pairs(symbol: &str, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> Self {
        Self::new(
            Symbol::new(symbol),
            bids.iter().copied().map(PriceLevel::from).collect(),
            asks.iter().copied().map(PriceLevel::from).collect(),
        )
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Levels consumed when trading `side` on this book
    pub fn levels_for(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// Summed quantity across the top `levels` levels consumed by `side`
    pub fn liquidity(&self, side: Side, levels: usize) -> Decimal {
        self.levels_for(side)
            .iter()
            .take(levels)
            .map(|l| l.quantity)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.captured_at).num_milliseconds()
    }

    pub fn best_bid_ask(&self) -> Option<BestBidAsk> {
        Some(BestBidAsk {
            symbol: self.symbol.clone(),
            bid: self.best_bid()?.price,
            ask: self.best_ask()?.price,
        })
    }
}

fn normalize(mut levels: Vec<PriceLevel>, side: Side, depth: usize) -> Vec<PriceLevel> {
    levels.retain(|l| l.quantity > Decimal::ZERO && l.price > Decimal::ZERO);
    match side {
        // asks ascending
        Side::Buy => levels.sort_by(|a, b| a.price.cmp(&b.price)),
        // bids descending
        Side::Sell => levels.sort_by(|a, b| b.price.cmp(&a.price)),
    }
    levels.truncate(depth);
    levels
}

/// Instantaneous top of book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestBidAsk {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BestBidAsk {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_quantity_levels_removed() {
        let book = OrderBookSnapshot::from_pairs(
            "BTCUSDT",
            &[(dec!(99), dec!(0)), (dec!(98), dec!(1))],
            &[(dec!(100), dec!(0)), (dec!(101), dec!(2))],
        );
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.best_ask().unwrap().price, dec!(101));
    }

    #[test]
    fn test_levels_sorted() {
        let book = OrderBookSnapshot::from_pairs(
            "BTCUSDT",
            &[(dec!(97), dec!(1)), (dec!(99), dec!(1)), (dec!(98), dec!(1))],
            &[(dec!(103), dec!(1)), (dec!(101), dec!(1)), (dec!(102), dec!(1))],
        );
        let bids: Vec<_> = book.bids.iter().map(|l| l.price).collect();
        let asks: Vec<_> = book.asks.iter().map(|l| l.price).collect();
        assert_eq!(bids, vec![dec!(99), dec!(98), dec!(97)]);
        assert_eq!(asks, vec![dec!(101), dec!(102), dec!(103)]);
    }

    #[test]
    fn test_depth_bounded() {
        let asks: Vec<PriceLevel> = (1..=150)
            .map(|i| PriceLevel::new(Decimal::from(i), dec!(1)))
            .collect();
        let book = OrderBookSnapshot::new(Symbol::new("X"), vec![], asks);
        assert_eq!(book.asks.len(), MAX_BOOK_DEPTH);

        let shallow = OrderBookSnapshot::with_depth(Symbol::new("X"), vec![], book.asks.clone(), 5);
        assert_eq!(shallow.asks.len(), 5);
    }

    #[test]
    fn test_liquidity_top_levels() {
        let book = OrderBookSnapshot::from_pairs(
            "ETHBTC",
            &[(dec!(0.05), dec!(2)), (dec!(0.049), dec!(3)), (dec!(0.048), dec!(10))],
            &[],
        );
        assert_eq!(book.liquidity(Side::Sell, 2), dec!(5));
        assert_eq!(book.liquidity(Side::Buy, 5), dec!(0));
    }
}
