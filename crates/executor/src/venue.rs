//! Order venue and balance provider contracts

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use triarb_core::{Currency, Leg, Side, Symbol, VenueResult};

/// Immediate-or-cancel market order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    /// Input amount: quote to spend on a buy, base to sell on a sell
    pub amount: Decimal,
}

impl OrderRequest {
    pub fn for_leg(leg: &Leg, amount: Decimal) -> Self {
        Self {
            symbol: leg.symbol.clone(),
            side: leg.side(),
            amount,
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.side, self.amount, self.symbol)
    }
}

/// Venue acknowledgement of an executed order
///
/// A partial fill is reported through `filled` being less than the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    /// Input amount consumed
    pub filled: Decimal,
    /// Output received after fees
    pub received: Decimal,
    pub average_price: Decimal,
    /// Fee charged, in the output currency
    pub fee: Decimal,
}

/// Exchange order submission
#[async_trait]
pub trait OrderVenue: Send + Sync {
    async fn submit_market_order(&self, request: &OrderRequest) -> VenueResult<OrderFill>;

    fn name(&self) -> &'static str;
}

/// Account balances; eventually consistent, never authoritative for
/// concurrency decisions
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn balance(&self, currency: &Currency) -> VenueResult<Decimal>;

    async fn balances(&self) -> VenueResult<HashMap<Currency, Decimal>>;
}
