//! Trade execution for triangular cycles
//!
//! Features:
//! - Pre-trade risk gate producing a safety score and a go/no-go decision
//! - Reservation against cached balances with a per-currency concurrency cap
//! - Sequential leg execution with reverse unwind on failure
//! - Consecutive-failure breaker
//! - Adaptive trade sizing
//! - Paper venue filling against cached books

pub mod venue;
pub mod balances;
pub mod risk;
pub mod breaker;
pub mod adaptive;
pub mod machine;
pub mod paper;

pub use venue::{BalanceProvider, OrderFill, OrderRequest, OrderVenue};
pub use balances::BalanceCache;
pub use risk::{AccountState, Decision, RiskFlag, RiskGate, SuggestedAdjustment, SystemState};
pub use breaker::{BreakerState, FailureBreaker, HaltReason};
pub use adaptive::{AdaptiveModel, AdaptiveUpdate};
pub use machine::{ExecutionOutcome, ExecutionPlan, ExecutorConfig, TradeExecutor};
pub use paper::PaperVenue;
