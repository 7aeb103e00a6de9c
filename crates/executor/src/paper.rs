//! Paper trading venue
//!
//! Fills market orders against the latest cached books using the same depth
//! walk the evaluator prices with, and keeps its own balance ledger.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use triarb_core::precision::truncate;
use triarb_core::{Currency, Side, SymbolRegistry, VenueError, VenueResult};
use triarb_detector::simulator::walk;
use triarb_market_data::BookState;

use crate::venue::{BalanceProvider, OrderFill, OrderRequest, OrderVenue};

pub struct PaperVenue {
    books: Arc<BookState>,
    registry: SymbolRegistry,
    fee_rate: Decimal,
    balances: Mutex<HashMap<Currency, Decimal>>,
    sequence: AtomicU64,
}

impl PaperVenue {
    pub fn new(
        books: Arc<BookState>,
        registry: SymbolRegistry,
        fee_rate: Decimal,
        balances: HashMap<Currency, Decimal>,
    ) -> Self {
        Self {
            books,
            registry,
            fee_rate,
            balances: Mutex::new(balances),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn orders_filled(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderVenue for PaperVenue {
    async fn submit_market_order(&self, request: &OrderRequest) -> VenueResult<OrderFill> {
        let spec = self
            .registry
            .get(&request.symbol)
            .ok_or_else(|| VenueError::Rejected(format!("unlisted symbol {}", request.symbol)))?;
        let (spend, gain) = match request.side {
            Side::Buy => (&spec.quote, &spec.base),
            Side::Sell => (&spec.base, &spec.quote),
        };

        let entry = self
            .books
            .get(&request.symbol)
            .ok_or_else(|| VenueError::NoLiquidity(request.symbol.clone()))?;
        let fill = walk(
            request.side,
            request.amount,
            entry.snapshot.levels_for(request.side),
            self.fee_rate,
        );
        if fill.input_consumed.is_zero() || fill.output.is_zero() {
            return Err(VenueError::NoLiquidity(request.symbol.clone()));
        }

        {
            let mut balances = self.balances.lock();
            let available = balances.get(spend).copied().unwrap_or(Decimal::ZERO);
            if available < fill.input_consumed {
                return Err(VenueError::InsufficientFunds {
                    currency: spend.clone(),
                    available,
                    required: fill.input_consumed,
                });
            }
            balances.insert(spend.clone(), available - fill.input_consumed);
            *balances.entry(gain.clone()).or_insert(Decimal::ZERO) += fill.output;
        }

        let gross = match request.side {
            Side::Buy => fill.filled_quantity,
            Side::Sell => fill.value,
        };
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(order = %request, consumed = %fill.input_consumed, output = %fill.output, "Paper fill");

        Ok(OrderFill {
            order_id: format!("paper-{seq}"),
            filled: fill.input_consumed,
            received: fill.output,
            average_price: fill.average_price,
            fee: truncate(gross - fill.output),
        })
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}

#[async_trait]
impl BalanceProvider for PaperVenue {
    async fn balance(&self, currency: &Currency) -> VenueResult<Decimal> {
        Ok(self.balances.lock().get(currency).copied().unwrap_or(Decimal::ZERO))
    }

    async fn balances(&self) -> VenueResult<HashMap<Currency, Decimal>> {
        Ok(self.balances.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use triarb_core::{OrderBookSnapshot, Symbol, SymbolSpec};

    fn venue(usdt: Decimal) -> PaperVenue {
        let books = Arc::new(BookState::new());
        books.insert(OrderBookSnapshot::from_pairs(
            "BTCUSDT",
            &[(dec!(49990), dec!(1))],
            &[(dec!(50000), dec!(0.01)), (dec!(50100), dec!(1))],
        ));
        let registry =
            SymbolRegistry::from_specs(&[SymbolSpec::new("BTCUSDT", "BTC", "USDT")]).unwrap();
        let balances = HashMap::from([(Currency::new("USDT"), usdt)]);
        PaperVenue::new(books, registry, dec!(0.001), balances)
    }

    fn buy(amount: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Buy,
            amount,
        }
    }

    #[tokio::test]
    async fn test_buy_walks_depth_and_moves_balances() {
        let venue = venue(dec!(10000));
        let fill = venue.submit_market_order(&buy(dec!(1001))).await.unwrap();

        // 500 USDT at 50000 then 501 at 50100
        assert_eq!(fill.filled, dec!(1001));
        assert_eq!(fill.received, dec!(0.01998));
        assert_eq!(fill.fee, dec!(0.00002));
        assert_eq!(fill.order_id, "paper-1");

        let balances = venue.balances().await.unwrap();
        assert_eq!(balances[&Currency::new("USDT")], dec!(8999));
        assert_eq!(balances[&Currency::new("BTC")], dec!(0.01998));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let venue = venue(dec!(10));
        let err = venue.submit_market_order(&buy(dec!(100))).await.unwrap_err();
        assert!(matches!(err, VenueError::InsufficientFunds { .. }));
        assert_eq!(venue.orders_filled(), 0);
    }

    #[tokio::test]
    async fn test_missing_book_has_no_liquidity() {
        let venue = venue(dec!(10000));
        let mut request = buy(dec!(100));
        request.symbol = Symbol::new("ETHUSDT");
        assert!(matches!(
            venue.submit_market_order(&request).await,
            Err(VenueError::Rejected(_))
        ));

        venue.books.invalidate(&Symbol::new("BTCUSDT"));
        assert!(matches!(
            venue.submit_market_order(&buy(dec!(100))).await,
            Err(VenueError::NoLiquidity(_))
        ));
    }
}
