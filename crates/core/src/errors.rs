//! Error types

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{Currency, Side, Symbol, TradeState};

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid triangle: {0}")]
    InvalidTriangle(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Market data errors
#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    #[error("Symbol not listed: {0}")]
    UnknownSymbol(Symbol),

    #[error("Timeout fetching {symbol} after {timeout_ms}ms")]
    Timeout { symbol: Symbol, timeout_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed book data: {0}")]
    Malformed(String),

    #[error("{symbol} unavailable after {attempts} attempts: {last_error}")]
    Unavailable {
        symbol: Symbol,
        attempts: u32,
        last_error: String,
    },
}

impl MarketDataError {
    /// Transient failures are retried at the cache boundary
    pub fn is_transient(&self) -> bool {
        matches!(self, MarketDataError::Timeout { .. } | MarketDataError::Transport(_))
    }
}

/// Reasons a triangle cannot be evaluated this cycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("No order book for {0}")]
    MissingBook(Symbol),

    #[error("{symbol} has no levels on the {side} side")]
    EmptySide { symbol: Symbol, side: Side },

    #[error("Insufficient depth on {symbol}: {residual} unfilled")]
    InsufficientDepth { symbol: Symbol, residual: Decimal },

    #[error("Notional must be positive")]
    ZeroNotional,

    #[error("Leg on {0} produced no output")]
    ZeroOutput(Symbol),
}

/// Order venue errors
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Order submission timed out after {0}ms")]
    Timeout(u64),

    #[error("Venue transport error: {0}")]
    Transport(String),

    #[error("Insufficient {currency} funds: {available} < {required}")]
    InsufficientFunds {
        currency: Currency,
        available: Decimal,
        required: Decimal,
    },

    #[error("No liquidity for {0}")]
    NoLiquidity(Symbol),
}

/// Execution errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Execution halted after {consecutive_failures} consecutive failures")]
    Halted { consecutive_failures: u32 },

    #[error("Concurrency cap reached for {currency}: {active} >= {cap}")]
    ConcurrencyCapReached {
        currency: Currency,
        active: usize,
        cap: usize,
    },

    #[error("Insufficient cached {currency} balance: {available} < {required}")]
    InsufficientBalance {
        currency: Currency,
        available: Decimal,
        required: Decimal,
    },

    #[error("Unknown trade: {0}")]
    UnknownTrade(Uuid),

    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition { from: TradeState, to: TradeState },

    #[error("Leg {index} failed: {source}")]
    LegFailed {
        index: usize,
        #[source]
        source: VenueError,
    },
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type MarketDataResult<T> = Result<T, MarketDataError>;
pub type EvaluationResult<T> = Result<T, EvaluationError>;
pub type VenueResult<T> = Result<T, VenueError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;
