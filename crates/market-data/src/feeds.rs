//! Market data provider implementations

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use triarb_core::{
    BestBidAsk, MarketDataError, MarketDataResult, OrderBookSnapshot, PriceLevel, Symbol,
};

/// Source of order book depth and top-of-book quotes
///
/// Implementations must report a symbol that does not exist with
/// [`MarketDataError::UnknownSymbol`], distinct from transient failures.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn order_book(&self, symbol: &Symbol, depth: usize) -> MarketDataResult<OrderBookSnapshot>;

    async fn best_bid_ask(&self, symbol: &Symbol) -> MarketDataResult<BestBidAsk>;

    fn name(&self) -> &'static str;
}

/// Book as written in a JSON fixture: `[price, quantity]` pairs
#[derive(Debug, Clone, Deserialize)]
pub struct BookFixture {
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
}

/// In-memory provider serving fixed books
///
/// Used for dry runs from a fixture file and as a deterministic source in
/// tests. Books can be replaced at any time with [`StaticMarketData::set_book`].
#[derive(Debug, Default)]
pub struct StaticMarketData {
    books: RwLock<HashMap<Symbol, OrderBookSnapshot>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: impl IntoIterator<Item = OrderBookSnapshot>) -> Self {
        let provider = Self::new();
        for book in books {
            provider.set_book(book);
        }
        provider
    }

    /// Parse `{ "SYMBOL": { "bids": [[p, q], ..], "asks": [[p, q], ..] } }`
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let fixtures: HashMap<String, BookFixture> = serde_json::from_str(json)?;
        let provider = Self::new();
        for (symbol, fixture) in fixtures {
            provider.set_book(OrderBookSnapshot::new(
                Symbol::new(&symbol),
                fixture.bids.into_iter().map(PriceLevel::from).collect(),
                fixture.asks.into_iter().map(PriceLevel::from).collect(),
            ));
        }
        Ok(provider)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let provider = Self::from_json_str(&json)?;
        info!(path = %path.display(), books = provider.len(), "Loaded order book fixture");
        Ok(provider)
    }

    pub fn set_book(&self, book: OrderBookSnapshot) {
        self.books.write().insert(book.symbol.clone(), book);
    }

    pub fn remove_book(&self, symbol: &Symbol) -> Option<OrderBookSnapshot> {
        self.books.write().remove(symbol)
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn order_book(&self, symbol: &Symbol, depth: usize) -> MarketDataResult<OrderBookSnapshot> {
        let book = self
            .books
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.clone()))?;

        debug!(%symbol, depth, "Serving static book");

        let mut snapshot = OrderBookSnapshot::with_depth(book.symbol, book.bids, book.asks, depth);
        snapshot.captured_at = Utc::now();
        Ok(snapshot)
    }

    async fn best_bid_ask(&self, symbol: &Symbol) -> MarketDataResult<BestBidAsk> {
        let books = self.books.read();
        let book = books
            .get(symbol)
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.clone()))?;

        book.best_bid_ask()
            .ok_or_else(|| MarketDataError::Malformed(format!("{symbol} has an empty side")))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const FIXTURE: &str = r#"{
        "BTCUSDT": { "bids": [["49990", "1.5"]], "asks": [["50000", "2"], ["50010", "0"]] },
        "ETHBTC": { "bids": [[0.0499, 10]], "asks": [[0.05, 12]] }
    }"#;

    #[tokio::test]
    async fn test_fixture_parsing() {
        let provider = StaticMarketData::from_json_str(FIXTURE).unwrap();
        assert_eq!(provider.len(), 2);

        let book = provider.order_book(&Symbol::new("BTCUSDT"), 10).await.unwrap();
        assert_eq!(book.asks.len(), 1, "zero-quantity level dropped");
        assert_eq!(book.best_bid().unwrap().price, dec!(49990));

        let top = provider.best_bid_ask(&Symbol::new("ETHBTC")).await.unwrap();
        assert_eq!(top.ask, dec!(0.05));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_transient() {
        let provider = StaticMarketData::new();
        let err = provider.order_book(&Symbol::new("DOGEUSDT"), 5).await.unwrap_err();
        assert!(matches!(err, MarketDataError::UnknownSymbol(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_depth_truncation() {
        let asks: Vec<PriceLevel> = (1..=30)
            .map(|i| PriceLevel::new(Decimal::from(i), dec!(1)))
            .collect();
        let provider = StaticMarketData::with_books([OrderBookSnapshot::new(
            Symbol::new("X"),
            vec![],
            asks,
        )]);
        let book = provider.order_book(&Symbol::new("X"), 5).await.unwrap();
        assert_eq!(book.asks.len(), 5);
    }
}
