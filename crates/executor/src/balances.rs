//! Cached balances with optimistic reservation
//!
//! Refreshed from the provider at most once per interval. Reservations
//! decrement the cached amount locally; the exchange does not enforce them.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use triarb_core::{Currency, ExecutionError, ExecutionResult, VenueResult};

use crate::venue::BalanceProvider;

pub struct BalanceCache {
    provider: Arc<dyn BalanceProvider>,
    balances: HashMap<Currency, Decimal>,
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
}

impl BalanceCache {
    pub fn new(provider: Arc<dyn BalanceProvider>, refresh_interval: Duration) -> Self {
        Self {
            provider,
            balances: HashMap::new(),
            refresh_interval,
            last_refresh: None,
        }
    }

    pub fn is_due(&self) -> bool {
        self.last_refresh
            .map_or(true, |at| at.elapsed() >= self.refresh_interval)
    }

    /// Reload from the provider when the interval has passed; returns whether
    /// a reload happened
    pub async fn refresh_if_due(&mut self) -> VenueResult<bool> {
        if !self.is_due() {
            return Ok(false);
        }
        match self.provider.balances().await {
            Ok(balances) => {
                debug!(currencies = balances.len(), "Balance cache refreshed");
                self.balances = balances;
                self.last_refresh = Some(Instant::now());
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Balance refresh failed, keeping cached values");
                Err(e)
            }
        }
    }

    /// Force a reload on the next refresh
    pub fn invalidate(&mut self) {
        self.last_refresh = None;
    }

    pub fn available(&self, currency: &Currency) -> Decimal {
        self.balances.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    /// Decrement the cached balance by `amount`
    pub fn reserve(&mut self, currency: &Currency, amount: Decimal) -> ExecutionResult<()> {
        let available = self.available(currency);
        if available < amount {
            return Err(ExecutionError::InsufficientBalance {
                currency: currency.clone(),
                available,
                required: amount,
            });
        }
        self.balances.insert(currency.clone(), available - amount);
        Ok(())
    }

    pub fn credit(&mut self, currency: &Currency, amount: Decimal) {
        *self.balances.entry(currency.clone()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn snapshot(&self) -> HashMap<Currency, Decimal> {
        self.balances.clone()
    }
}
