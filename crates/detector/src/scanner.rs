//! Candidate scanner: evaluate and rank triangles

use rayon::prelude::*;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::debug;

use triarb_core::{
    Currency, EvaluationError, OpportunityEvaluation, ScoredOpportunity, Triangle,
};

use crate::evaluator::{BookMap, TriangleEvaluator};
use crate::history::HistoryBook;
use crate::scorer::OpportunityScorer;

/// Outcome of evaluating every configured triangle once
#[derive(Debug, Default)]
pub struct ScanResult {
    pub evaluations: Vec<OpportunityEvaluation>,
    /// Triangles skipped this cycle and why
    pub invalid: Vec<(String, EvaluationError)>,
}

/// Evaluates and ranks triangles in parallel
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    evaluator: TriangleEvaluator,
    scorer: OpportunityScorer,
}

impl Scanner {
    pub fn new(evaluator: TriangleEvaluator, scorer: OpportunityScorer) -> Self {
        Self { evaluator, scorer }
    }

    pub fn evaluator(&self) -> &TriangleEvaluator {
        &self.evaluator
    }

    /// Evaluate each triangle with the notional `notional_for` gives its
    /// funding currency
    pub fn evaluate_all<F>(&self, triangles: &[Triangle], books: &BookMap, notional_for: F) -> ScanResult
    where
        F: Fn(&Currency) -> Decimal + Sync,
    {
        let start = Instant::now();

        let results: Vec<_> = triangles
            .par_iter()
            .map(|t| {
                let notional = notional_for(t.funding_currency());
                (t.id.clone(), self.evaluator.evaluate(t, books, notional))
            })
            .collect();

        let mut scan = ScanResult::default();
        for (id, result) in results {
            match result {
                Ok(eval) => scan.evaluations.push(eval),
                Err(e) => scan.invalid.push((id, e)),
            }
        }

        debug!(
            triangles = triangles.len(),
            valid = scan.evaluations.len(),
            invalid = scan.invalid.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Evaluated triangles"
        );
        scan
    }

    /// Score evaluations and sort best first
    ///
    /// Order: total score, then profit percentage, both descending, then
    /// triangle id ascending so equal candidates rank deterministically.
    pub fn rank(&self, evaluations: &[OpportunityEvaluation], history: &HistoryBook) -> Vec<ScoredOpportunity> {
        let mut scored: Vec<ScoredOpportunity> = evaluations
            .par_iter()
            .map(|eval| self.scorer.score(eval, history.get(&eval.triangle_id)))
            .collect();

        scored.sort_by(compare_ranked);
        scored
    }
}

fn compare_ranked(a: &ScoredOpportunity, b: &ScoredOpportunity) -> Ordering {
    b.total_score
        .cmp(&a.total_score)
        .then_with(|| b.evaluation.profit_pct.cmp(&a.evaluation.profit_pct))
        .then_with(|| a.evaluation.triangle_id.cmp(&b.evaluation.triangle_id))
}
