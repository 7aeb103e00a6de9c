//! Trade execution state machine
//!
//! `RESERVED -> EXECUTING -> COMPLETED | FAILED`. Reservation optimistically
//! takes the notional out of the cached balance and registers the trade
//! under its funding currency. Legs run one at a time; each next leg spends
//! the previous leg's net output minus a small safety buffer. A failed leg is
//! never retried: completed legs are unwound in reverse and anything that
//! cannot be unwound is reported as exposure and halts the breaker.

use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

use triarb_core::precision::truncate;
use triarb_core::{
    Currency, Direction, EngineConfig, ExecutionError, ExecutionResult, Exposure, Leg, LegResult,
    OpportunityEvaluation, TradeExecutionRecord, TradeId, TradeState, Triangle, UnwindOutcome,
    VenueError,
};

use crate::balances::BalanceCache;
use crate::breaker::{FailureBreaker, HaltReason};
use crate::venue::{OrderFill, OrderRequest, OrderVenue};

/// Execution parameters
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shaved off each leg output before it feeds the next leg, in percent
    pub leg_safety_buffer_pct: Decimal,
    /// Fills below this share of the request raise a warning
    pub partial_fill_threshold: Decimal,
    pub leg_timeout: Duration,
    pub max_concurrent_per_currency: usize,
    pub max_consecutive_failures: u32,
    pub history_limit: usize,
}

impl From<&EngineConfig> for ExecutorConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            leg_safety_buffer_pct: cfg.trading.leg_safety_buffer_pct,
            partial_fill_threshold: cfg.trading.partial_fill_threshold,
            leg_timeout: cfg.trading.leg_timeout(),
            max_concurrent_per_currency: cfg.trading.max_concurrent_per_currency,
            max_consecutive_failures: cfg.risk.max_consecutive_failures,
            history_limit: cfg.control.trade_history_limit,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// What to execute: the triangle's legs in the chosen direction
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub triangle_id: String,
    pub funding_currency: Currency,
    pub direction: Direction,
    pub legs: [Leg; 3],
    pub notional: Decimal,
    pub expected_leg_prices: [Decimal; 3],
}

impl ExecutionPlan {
    pub fn from_evaluation(triangle: &Triangle, evaluation: &OpportunityEvaluation) -> Self {
        Self {
            triangle_id: evaluation.triangle_id.clone(),
            funding_currency: evaluation.funding_currency.clone(),
            direction: evaluation.direction,
            legs: triangle.legs(evaluation.direction).clone(),
            notional: evaluation.start_amount,
            expected_leg_prices: evaluation.leg_prices(),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveTrade {
    record: TradeExecutionRecord,
    legs: [Leg; 3],
}

/// Side effects of a terminal trade the caller may need to surface
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub record: TradeExecutionRecord,
    /// Set when this trade tripped the breaker
    pub halted: Option<HaltReason>,
}

/// Owns reservations, the active-trade table and the failure breaker
pub struct TradeExecutor {
    venue: Arc<dyn OrderVenue>,
    balances: BalanceCache,
    breaker: FailureBreaker,
    active: HashMap<Currency, Vec<ActiveTrade>>,
    history: VecDeque<TradeExecutionRecord>,
    config: ExecutorConfig,
}

impl TradeExecutor {
    pub fn new(venue: Arc<dyn OrderVenue>, balances: BalanceCache, config: ExecutorConfig) -> Self {
        Self {
            venue,
            balances,
            breaker: FailureBreaker::new(config.max_consecutive_failures),
            active: HashMap::new(),
            history: VecDeque::new(),
            config,
        }
    }

    pub fn balances(&self) -> &BalanceCache {
        &self.balances
    }

    pub fn balances_mut(&mut self) -> &mut BalanceCache {
        &mut self.balances
    }

    pub fn breaker(&self) -> &FailureBreaker {
        &self.breaker
    }

    /// Clear a halt after manual intervention
    pub fn reset_breaker(&mut self) {
        self.breaker.reset();
    }

    pub fn active_for(&self, currency: &Currency) -> usize {
        self.active.get(currency).map_or(0, Vec::len)
    }

    pub fn active_count(&self) -> usize {
        self.active.values().map(Vec::len).sum()
    }

    pub fn history(&self) -> impl Iterator<Item = &TradeExecutionRecord> {
        self.history.iter()
    }

    pub fn concurrency_cap(&self) -> usize {
        self.config.max_concurrent_per_currency
    }

    /// Reserve funds for `plan`; the trade enters `RESERVED`
    pub fn reserve(&mut self, plan: ExecutionPlan) -> ExecutionResult<TradeId> {
        self.breaker.can_trade()?;

        let currency = plan.funding_currency.clone();
        let active = self.active_for(&currency);
        if active >= self.config.max_concurrent_per_currency {
            return Err(ExecutionError::ConcurrencyCapReached {
                currency,
                active,
                cap: self.config.max_concurrent_per_currency,
            });
        }

        self.balances.reserve(&currency, plan.notional)?;

        let record = TradeExecutionRecord::reserved(
            plan.triangle_id,
            currency.clone(),
            plan.direction,
            plan.notional,
            plan.expected_leg_prices,
        );
        let id = record.id;
        info!(
            trade_id = %id,
            triangle = %record.triangle_id,
            currency = %currency,
            notional = %record.notional,
            "Trade reserved"
        );

        self.active.entry(currency).or_default().push(ActiveTrade {
            record,
            legs: plan.legs,
        });
        Ok(id)
    }

    /// Run a reserved trade to a terminal state
    ///
    /// Leg failures produce a `FAILED` record, not an error; errors are
    /// reserved for unknown trades and illegal transitions.
    pub async fn execute(&mut self, id: TradeId) -> ExecutionResult<ExecutionOutcome> {
        let ActiveTrade { mut record, legs } = self.take_active(id)?;
        record.transition(TradeState::Executing)?;

        let venue = Arc::clone(&self.venue);
        let mut input = record.notional;
        let mut failure: Option<(usize, VenueError)> = None;

        for (index, leg) in legs.iter().enumerate() {
            let request = OrderRequest::for_leg(leg, input);
            let fill = match self.submit(venue.as_ref(), &request).await {
                Ok(fill) if fill.filled > Decimal::ZERO && fill.received > Decimal::ZERO => fill,
                Ok(_) => {
                    failure = Some((index, VenueError::NoLiquidity(leg.symbol.clone())));
                    break;
                }
                Err(e) => {
                    failure = Some((index, e));
                    break;
                }
            };

            let result = LegResult {
                index,
                symbol: leg.symbol.clone(),
                side: leg.side(),
                requested: request.amount,
                filled: fill.filled,
                received: fill.received,
                average_price: fill.average_price,
                fee: fill.fee,
                order_id: fill.order_id,
            };

            if result.filled < truncate(result.requested * self.config.partial_fill_threshold) {
                let warning = format!(
                    "leg {index} {} partially filled: {} of {}",
                    leg.symbol, result.filled, result.requested
                );
                warn!(trade_id = %id, leg = index, fill_ratio = %result.fill_ratio(), "Partial fill, continuing");
                record.warnings.push(warning);
            }

            input = self.next_leg_input(result.received);
            record.legs.push(result);
        }

        let outcome = match failure {
            None => self.complete(record)?,
            Some((index, e)) => self.fail(record, &legs, index, e).await?,
        };

        self.push_history(outcome.record.clone());
        Ok(outcome)
    }

    async fn submit(&self, venue: &dyn OrderVenue, request: &OrderRequest) -> Result<OrderFill, VenueError> {
        let limit = self.config.leg_timeout;
        match timeout(limit, venue.submit_market_order(request)).await {
            Ok(result) => result,
            Err(_) => Err(VenueError::Timeout(limit.as_millis() as u64)),
        }
    }

    fn next_leg_input(&self, received: Decimal) -> Decimal {
        let keep = Decimal::ONE - self.config.leg_safety_buffer_pct / Decimal::ONE_HUNDRED;
        truncate(received * keep)
    }

    fn complete(&mut self, mut record: TradeExecutionRecord) -> ExecutionResult<ExecutionOutcome> {
        let final_amount = record
            .legs
            .last()
            .map(|leg| leg.received)
            .unwrap_or(Decimal::ZERO);

        record.final_amount = Some(final_amount);
        record.realized_profit = Some(truncate(final_amount - record.notional));
        record.transition(TradeState::Completed)?;

        self.balances.credit(&record.funding_currency, final_amount);
        self.breaker.record_success();

        info!(
            trade_id = %record.id,
            triangle = %record.triangle_id,
            final_amount = %final_amount,
            profit = %record.realized_profit.unwrap_or_default(),
            warnings = record.warnings.len(),
            "Trade completed"
        );

        Ok(ExecutionOutcome {
            record,
            halted: None,
        })
    }

    async fn fail(
        &mut self,
        mut record: TradeExecutionRecord,
        legs: &[Leg; 3],
        index: usize,
        cause: VenueError,
    ) -> ExecutionResult<ExecutionOutcome> {
        let err = ExecutionError::LegFailed { index, source: cause };
        error!(trade_id = %record.id, triangle = %record.triangle_id, error = %err, "Leg failed");
        record.failure = Some(err.to_string());

        let (unwind, recovered) = self.unwind(&record, legs).await;

        // Funding the first leg did not spend is still ours
        let unspent = record
            .legs
            .first()
            .map_or(record.notional, |leg| (record.notional - leg.filled).max(Decimal::ZERO));
        self.balances.credit(&record.funding_currency, unspent + recovered);

        record.unwind = Some(unwind);
        record.transition(TradeState::Failed)?;

        let mut halted = self.breaker.record_failure();
        for exposure in record.exposures() {
            error!(
                trade_id = %record.id,
                currency = %exposure.currency,
                amount = %exposure.amount,
                "Unwind incomplete, manual reconciliation required"
            );
        }
        if let Some(exposure) = record.exposure().cloned() {
            halted = Some(self.breaker.halt_for_exposure(exposure));
        }

        Ok(ExecutionOutcome { record, halted })
    }

    /// Reverse completed legs, newest first, back into the funding currency
    ///
    /// What a leg received but the following leg did not spend (an unfilled
    /// remainder or the safety buffer) joins the reversal out of that
    /// currency, so nothing is left behind silently. Also returns how much
    /// funding currency came back, even when the reversal stops part-way.
    async fn unwind(&self, record: &TradeExecutionRecord, legs: &[Leg; 3]) -> (UnwindOutcome, Decimal) {
        let Some(last) = record.legs.last() else {
            return (UnwindOutcome::NotNeeded, Decimal::ZERO);
        };

        // kept_back[i] is held in the currency leg i received
        let kept_back: Vec<Decimal> = record
            .legs
            .windows(2)
            .map(|pair| (pair[0].received - pair[1].filled).max(Decimal::ZERO))
            .collect();
        let residual_below = |index: usize| -> Vec<Exposure> {
            kept_back[..index]
                .iter()
                .enumerate()
                .filter(|(_, amount)| !amount.is_zero())
                .map(|(i, amount)| Exposure {
                    currency: legs[i].to_currency().clone(),
                    amount: *amount,
                })
                .collect()
        };

        let venue = Arc::clone(&self.venue);
        let mut holding = last.received;

        for done in record.legs.iter().rev() {
            let leg = &legs[done.index];
            let request = OrderRequest::for_leg(&leg.inverse(), holding);
            let below = done.index.checked_sub(1).map_or(Decimal::ZERO, |i| kept_back[i]);

            let (exposure, residual, returned, reason) = match self.submit(venue.as_ref(), &request).await {
                Ok(fill) if fill.filled >= holding => {
                    info!(trade_id = %record.id, order = %request, received = %fill.received, kept_back = %below, "Leg unwound");
                    holding = fill.received + below;
                    continue;
                }
                Ok(fill) => {
                    let mut residual = residual_below(done.index);
                    let mut returned = Decimal::ZERO;
                    if done.index == 0 {
                        returned = fill.received;
                    } else if !(fill.received + below).is_zero() {
                        residual.retain(|e| e.currency != *leg.from_currency());
                        residual.push(Exposure {
                            currency: leg.from_currency().clone(),
                            amount: fill.received + below,
                        });
                    }
                    let reason = format!("unwind of {} filled {} of {}", leg.symbol, fill.filled, holding);
                    (holding - fill.filled, residual, returned, reason)
                }
                Err(e) => (
                    holding,
                    residual_below(done.index),
                    Decimal::ZERO,
                    format!("unwind of {} failed: {e}", leg.symbol),
                ),
            };

            let outcome = UnwindOutcome::Incomplete {
                exposure: Exposure {
                    currency: leg.to_currency().clone(),
                    amount: exposure,
                },
                residual,
                reason,
            };
            return (outcome, returned);
        }

        (UnwindOutcome::Unwound { recovered: holding }, holding)
    }

    fn take_active(&mut self, id: TradeId) -> ExecutionResult<ActiveTrade> {
        for trades in self.active.values_mut() {
            if let Some(pos) = trades.iter().position(|t| t.record.id == id) {
                return Ok(trades.swap_remove(pos));
            }
        }
        Err(ExecutionError::UnknownTrade(id))
    }

    fn push_history(&mut self, record: TradeExecutionRecord) {
        if self.history.len() == self.config.history_limit.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(record);
        self.active.retain(|_, trades| !trades.is_empty());
    }
}
