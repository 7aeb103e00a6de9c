//! Arbitrage detection for triangular cycles
//!
//! Features:
//! - Order book walk with prorated last level and fee-adjusted output
//! - Forward and reverse cycle evaluation with top-of-book fast path
//! - Multi-factor scoring, risk tiers and recommendations
//! - Parallel evaluation and ranking with rayon

pub mod simulator;
pub mod evaluator;
pub mod history;
pub mod scorer;
pub mod scanner;

pub use simulator::FillSimulation;
pub use evaluator::{BookMap, EvaluatorConfig, TriangleEvaluator};
pub use history::{HistoryBook, TriangleHistory};
pub use scorer::{OpportunityScorer, ScoreWeights};
pub use scanner::{ScanResult, Scanner};
