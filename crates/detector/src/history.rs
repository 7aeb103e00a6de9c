//! Per-triangle observation history used by the scorer

use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Profit percentages kept for the volatility factor
pub const PROFIT_WINDOW: usize = 5;
/// Execution outcomes kept for the recent success rate
pub const OUTCOME_WINDOW: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleHistory {
    profit_pcts: VecDeque<Decimal>,
    recent_outcomes: VecDeque<bool>,
    lifetime_successes: u64,
    lifetime_total: u64,
    realized_slippage_pct: Option<Decimal>,
}

impl TriangleHistory {
    pub fn record_profit_pct(&mut self, profit_pct: Decimal) {
        push_bounded(&mut self.profit_pcts, profit_pct, PROFIT_WINDOW);
    }

    pub fn record_outcome(&mut self, success: bool) {
        push_bounded(&mut self.recent_outcomes, success, OUTCOME_WINDOW);
        self.lifetime_total += 1;
        if success {
            self.lifetime_successes += 1;
        }
    }

    /// Mean realized slippage, as tracked by the adaptive model
    pub fn set_realized_slippage(&mut self, slippage_pct: Option<Decimal>) {
        self.realized_slippage_pct = slippage_pct;
    }

    pub fn profit_pcts(&self) -> &VecDeque<Decimal> {
        &self.profit_pcts
    }

    pub fn realized_slippage_pct(&self) -> Option<Decimal> {
        self.realized_slippage_pct
    }

    pub fn has_outcomes(&self) -> bool {
        self.lifetime_total > 0
    }

    pub fn lifetime_success_rate(&self) -> Option<Decimal> {
        ratio(self.lifetime_successes, self.lifetime_total)
    }

    pub fn recent_success_rate(&self) -> Option<Decimal> {
        let wins = self.recent_outcomes.iter().filter(|ok| **ok).count();
        ratio(wins as u64, self.recent_outcomes.len() as u64)
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, value: T, cap: usize) {
    if window.len() == cap {
        window.pop_front();
    }
    window.push_back(value);
}

fn ratio(num: u64, den: u64) -> Option<Decimal> {
    if den == 0 {
        return None;
    }
    Some(Decimal::from(num) / Decimal::from(den))
}

/// Histories keyed by triangle id
#[derive(Debug, Clone, Default)]
pub struct HistoryBook {
    triangles: HashMap<String, TriangleHistory>,
}

impl HistoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, triangle_id: &str) -> Option<&TriangleHistory> {
        self.triangles.get(triangle_id)
    }

    pub fn entry(&mut self, triangle_id: &str) -> &mut TriangleHistory {
        self.triangles.entry(triangle_id.to_string()).or_default()
    }

    pub fn record_profit_pct(&mut self, triangle_id: &str, profit_pct: Decimal) {
        self.entry(triangle_id).record_profit_pct(profit_pct);
    }

    pub fn record_outcome(&mut self, triangle_id: &str, success: bool) {
        self.entry(triangle_id).record_outcome(success);
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_profit_window_bounded() {
        let mut history = TriangleHistory::default();
        for i in 0..8 {
            history.record_profit_pct(Decimal::from(i));
        }
        let kept: Vec<_> = history.profit_pcts().iter().copied().collect();
        assert_eq!(kept, vec![dec!(3), dec!(4), dec!(5), dec!(6), dec!(7)]);
    }

    #[test]
    fn test_success_rates() {
        let mut history = TriangleHistory::default();
        assert_eq!(history.lifetime_success_rate(), None);

        for _ in 0..10 {
            history.record_outcome(false);
        }
        for _ in 0..10 {
            history.record_outcome(true);
        }
        assert_eq!(history.lifetime_success_rate(), Some(dec!(0.5)));
        assert_eq!(history.recent_success_rate(), Some(dec!(1)));
    }

    #[test]
    fn test_book_creates_entries() {
        let mut book = HistoryBook::new();
        book.record_outcome("USDT-BTC-ETH", true);
        book.record_profit_pct("USDT-BTC-ETH", dec!(0.2));
        assert_eq!(book.len(), 1);
        assert!(book.get("USDT-BTC-ETH").unwrap().has_outcomes());
        assert!(book.get("USDT-ETH-BNB").is_none());
    }
}
