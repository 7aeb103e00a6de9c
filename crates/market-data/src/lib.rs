//! Order book access for the arbitrage engine
//!
//! Features:
//! - Provider trait separating unknown symbols from transient failures
//! - Fixture-backed in-memory provider for dry runs and tests
//! - Lock-free snapshot state with freshness-bounded reads
//! - Retry with exponential backoff and jitter, per-attempt timeouts
//! - Concurrent multi-symbol fetches

pub mod cache;
pub mod feeds;
pub mod state;

pub use cache::{BookCache, BookCacheStats, RetryPolicy};
pub use feeds::{MarketDataProvider, StaticMarketData};
pub use state::{BookState, BookStateStats};
