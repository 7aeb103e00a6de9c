//! Freshness-bounded order book cache
//!
//! Reads inside the freshness window are served from [`BookState`]. Misses go
//! to the provider with a per-attempt timeout; transient failures are retried
//! with exponential backoff plus jitter, everything else fails immediately.

use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use triarb_core::{
    BestBidAsk, MarketDataConfig, MarketDataError, MarketDataResult, OrderBookSnapshot, Symbol,
};

use crate::feeds::MarketDataProvider;
use crate::state::{BookState, BookStateStats};

/// Attempt limits and backoff schedule for provider calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &MarketDataConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Exponential part of the delay after failed attempt `attempt` (0-based)
    pub fn exponential(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Exponential delay plus uniform jitter in `[0, base)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..base_ms)
        };
        self.exponential(attempt) + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MarketDataConfig::default())
    }
}

/// Order book cache in front of a [`MarketDataProvider`]
pub struct BookCache {
    provider: Arc<dyn MarketDataProvider>,
    state: Arc<BookState>,
    policy: RetryPolicy,
    depth: usize,
    freshness: Duration,
    book_timeout: Duration,
    ticker_timeout: Duration,

    fetches: AtomicU64,
    failures: AtomicU64,
}

impl BookCache {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &MarketDataConfig) -> Self {
        Self {
            provider,
            state: Arc::new(BookState::new()),
            policy: RetryPolicy::from_config(config),
            depth: config.depth,
            freshness: Duration::from_millis(config.freshness_ms),
            book_timeout: Duration::from_millis(config.book_timeout_ms),
            ticker_timeout: Duration::from_millis(config.ticker_timeout_ms),
            fetches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Shared snapshot store, also read by the paper venue
    pub fn state(&self) -> Arc<BookState> {
        Arc::clone(&self.state)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Fresh cached book, or a new one from the provider
    pub async fn fetch(&self, symbol: &Symbol, depth: usize) -> MarketDataResult<Arc<OrderBookSnapshot>> {
        if let Some(book) = self.state.get_fresh(symbol, self.freshness) {
            debug!(%symbol, "Book cache hit");
            return Ok(book);
        }

        let book_timeout = self.book_timeout;
        let snapshot = self
            .with_retry(symbol, book_timeout, || self.provider.order_book(symbol, depth))
            .await?;
        Ok(self.state.insert(snapshot))
    }

    /// Fetch several books concurrently and join them
    pub async fn fetch_all(
        &self,
        symbols: &[Symbol],
        depth: usize,
    ) -> HashMap<Symbol, MarketDataResult<Arc<OrderBookSnapshot>>> {
        let results = join_all(symbols.iter().map(|s| self.fetch(s, depth))).await;
        symbols.iter().cloned().zip(results).collect()
    }

    /// Top of book straight from the provider, under the short ticker timeout
    pub async fn best_bid_ask(&self, symbol: &Symbol) -> MarketDataResult<BestBidAsk> {
        let ticker_timeout = self.ticker_timeout;
        self.with_retry(symbol, ticker_timeout, || self.provider.best_bid_ask(symbol))
            .await
    }

    pub fn invalidate(&self, symbol: &Symbol) {
        self.state.invalidate(symbol);
    }

    /// Drop entries well past the freshness window
    pub fn cleanup(&self) {
        self.state.cleanup(self.freshness * 10);
    }

    pub fn stats(&self) -> BookCacheStats {
        BookCacheStats {
            state: self.state.stats(),
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        symbol: &Symbol,
        attempt_timeout: Duration,
        mut call: F,
    ) -> MarketDataResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = MarketDataResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            self.fetches.fetch_add(1, Ordering::Relaxed);

            let err = match timeout(attempt_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_transient() => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
                Ok(Err(e)) => e,
                Err(_) => MarketDataError::Timeout {
                    symbol: symbol.clone(),
                    timeout_ms: attempt_timeout.as_millis() as u64,
                },
            };

            if attempt + 1 < self.policy.max_attempts {
                let delay = self.policy.backoff(attempt);
                warn!(
                    %symbol,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Market data request failed, retrying"
                );
                sleep(delay).await;
            }
            last_error = Some(err);
        }

        self.failures.fetch_add(1, Ordering::Relaxed);
        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        warn!(%symbol, attempts = self.policy.max_attempts, %last_error, "Market data unavailable");

        Err(MarketDataError::Unavailable {
            symbol: symbol.clone(),
            attempts: self.policy.max_attempts,
            last_error,
        })
    }
}

/// Cache counters plus underlying state statistics
#[derive(Debug, Clone)]
pub struct BookCacheStats {
    pub state: BookStateStats,
    pub fetches: u64,
    pub failures: u64,
}
