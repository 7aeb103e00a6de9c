//! Control loop actor
//!
//! One cycle runs to completion before the next begins:
//! observe books, evaluate, score, gate, execute, learn. The actor is the
//! only writer of every piece of mutable state; the outside world reaches it
//! through [`EngineHandle`] commands and the event bus.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use triarb_core::{
    ControlConfig, CoreResult, EngineConfig, EngineEvent, EventBus, OpportunityEvaluation,
    ScoredOpportunity, SymbolRegistry, Triangle,
};
use triarb_detector::{
    BookMap, EvaluatorConfig, HistoryBook, OpportunityScorer, ScoreWeights, Scanner,
    TriangleEvaluator,
};
use triarb_executor::{
    AccountState, AdaptiveModel, BalanceCache, BalanceProvider, ExecutionOutcome, ExecutionPlan,
    ExecutorConfig, OrderVenue, PaperVenue, RiskGate, SystemState, TradeExecutor,
};
use triarb_market_data::{BookCache, MarketDataProvider};

use crate::handle::{Command, EngineHandle, EngineStats};

const COMMAND_BUFFER: usize = 16;

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub evaluated: usize,
    pub invalid: usize,
    pub actionable: usize,
    pub completed: usize,
    pub failed: usize,
    pub duration: Duration,
}

pub struct Engine {
    config: EngineConfig,
    triangles: Vec<Triangle>,
    books: BookCache,
    scanner: Scanner,
    gate: RiskGate,
    executor: TradeExecutor,
    adaptive: AdaptiveModel,
    history: HistoryBook,
    latencies: VecDeque<u64>,
    events: EventBus,
    stats: Arc<RwLock<EngineStats>>,
    commands: mpsc::Receiver<Command>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        books: BookCache,
        venue: Arc<dyn OrderVenue>,
        balances: Arc<dyn BalanceProvider>,
        events: EventBus,
    ) -> CoreResult<(Self, EngineHandle)> {
        config.validate()?;
        let triangles = config.build_triangles()?;

        let scanner = Scanner::new(
            TriangleEvaluator::new(EvaluatorConfig::from(&config.trading)),
            OpportunityScorer::new(ScoreWeights::default()),
        );
        let balance_cache = BalanceCache::new(
            balances,
            Duration::from_millis(config.control.balance_refresh_ms),
        );
        let executor = TradeExecutor::new(venue, balance_cache, ExecutorConfig::from(&config));

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let stats = Arc::new(RwLock::new(EngineStats::default()));
        let handle = EngineHandle::new(tx, Arc::clone(&stats), events.clone());

        info!(
            triangles = triangles.len(),
            pricing = ?config.trading.pricing_mode,
            "Engine initialized"
        );

        let engine = Self {
            gate: RiskGate::new(config.risk.clone()),
            adaptive: AdaptiveModel::new(config.adaptive.clone()),
            config,
            triangles,
            books,
            scanner,
            executor,
            history: HistoryBook::new(),
            latencies: VecDeque::new(),
            events,
            stats,
            commands: rx,
        };
        Ok((engine, handle))
    }

    /// Engine trading against a [`PaperVenue`] that fills on the cached books
    pub fn paper(
        config: EngineConfig,
        provider: Arc<dyn MarketDataProvider>,
        events: EventBus,
    ) -> CoreResult<(Self, EngineHandle)> {
        let books = BookCache::new(provider, &config.market_data);
        let venue = Arc::new(PaperVenue::new(
            books.state(),
            SymbolRegistry::from_specs(&config.symbols)?,
            config.trading.taker_fee_rate,
            config.paper.balances.clone(),
        ));
        Self::new(config, books, venue.clone(), venue, events)
    }

    pub fn is_halted(&self) -> bool {
        self.executor.breaker().is_halted()
    }

    pub fn executor(&self) -> &TradeExecutor {
        &self.executor
    }

    pub fn adaptive(&self) -> &AdaptiveModel {
        &self.adaptive
    }

    pub fn history(&self) -> &HistoryBook {
        &self.history
    }

    /// Drive cycles until shut down
    ///
    /// While halted no cycle runs; only `Resume` or `Shutdown` are acted on.
    pub async fn run(mut self) {
        info!("Control loop started");
        loop {
            if self.is_halted() {
                warn!("Engine halted, waiting for resume");
                match self.commands.recv().await {
                    Some(Command::Resume) => self.resume(),
                    Some(Command::RunNow) => debug!("Ignoring run request while halted"),
                    Some(Command::Shutdown) | None => break,
                }
                continue;
            }

            let report = self.run_cycle().await;
            let delay = next_delay(report.duration, &self.config.control);
            debug!(delay_ms = delay.as_millis() as u64, "Waiting for next cycle");

            tokio::select! {
                _ = sleep(delay) => {}
                command = self.commands.recv() => match command {
                    Some(Command::RunNow) => debug!("Cycle requested"),
                    Some(Command::Resume) => self.resume(),
                    Some(Command::Shutdown) | None => break,
                },
            }
        }
        info!("Control loop stopped");
    }

    /// Clear the breaker after manual intervention
    pub fn resume(&mut self) {
        self.executor.reset_breaker();
        self.sync_breaker_stats();
        info!("Engine resumed");
    }

    /// Run one full cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        if let Err(e) = self.executor.balances_mut().refresh_if_due().await {
            warn!(error = %e, "Using stale cached balances");
        }

        let books = self.observe().await;

        let trading = &self.config.trading;
        let adaptive = &self.adaptive;
        let scan = self.scanner.evaluate_all(&self.triangles, &books, |currency| {
            adaptive.trade_size(currency, trading.base_notional_for(currency))
        });

        for (triangle_id, reason) in &scan.invalid {
            debug!(triangle = %triangle_id, %reason, "Skipping triangle");
        }
        for evaluation in &scan.evaluations {
            self.history
                .record_profit_pct(&evaluation.triangle_id, evaluation.profit_pct);
        }

        let ranked = self.scanner.rank(&scan.evaluations, &self.history);
        for scored in &ranked {
            self.events.publish(EngineEvent::OpportunityEvaluated {
                triangle_id: scored.evaluation.triangle_id.clone(),
                direction: scored.evaluation.direction,
                profit_pct: scored.evaluation.profit_pct,
                is_profitable: scored.evaluation.is_profitable,
                total_score: Some(scored.total_score),
                recommendation: Some(scored.recommendation),
            });
        }

        report.evaluated = scan.evaluations.len();
        report.invalid = scan.invalid.len();

        let candidates: Vec<&ScoredOpportunity> = ranked
            .iter()
            .filter(|s| s.evaluation.is_profitable && s.recommendation.is_actionable())
            .collect();
        report.actionable = candidates.len();

        let mut traded = HashSet::new();
        for scored in candidates {
            if self.is_halted() {
                break;
            }
            // Books are stale for this currency once it has traded this cycle
            if traded.contains(&scored.evaluation.funding_currency) {
                continue;
            }
            if let Some(outcome) = self.execute_candidate(scored).await {
                traded.insert(scored.evaluation.funding_currency.clone());
                if outcome.record.succeeded() {
                    report.completed += 1;
                } else {
                    report.failed += 1;
                }
                self.learn(&outcome);
                self.publish_outcome(outcome);
            }
        }

        self.books.cleanup();
        report.duration = started.elapsed();
        self.record_cycle(&report, &scan.evaluations);

        info!(
            evaluated = report.evaluated,
            invalid = report.invalid,
            actionable = report.actionable,
            completed = report.completed,
            failed = report.failed,
            elapsed_ms = report.duration.as_millis() as u64,
            "Cycle finished"
        );
        report
    }

    async fn observe(&self) -> BookMap {
        let depth = self.books.depth();
        let mut books = BookMap::new();

        for triangle in &self.triangles {
            let wanted: Vec<_> = triangle
                .symbols()
                .iter()
                .filter(|s| !books.contains_key(*s))
                .cloned()
                .collect();
            if wanted.is_empty() {
                continue;
            }

            for (symbol, result) in self.books.fetch_all(&wanted, depth).await {
                match result {
                    Ok(book) => {
                        books.insert(symbol, book);
                    }
                    Err(e) => {
                        warn!(%symbol, triangle = %triangle.id, error = %e, "Order book unavailable")
                    }
                }
            }
        }
        books
    }

    async fn execute_candidate(&mut self, scored: &ScoredOpportunity) -> Option<ExecutionOutcome> {
        let evaluation = &scored.evaluation;
        let currency = &evaluation.funding_currency;

        let account = AccountState {
            currency: currency.clone(),
            cached_balance: self.executor.balances().available(currency),
            active_trades: self.executor.active_for(currency),
            concurrency_cap: self.executor.concurrency_cap(),
        };
        let system = SystemState {
            avg_cycle_latency_ms: self.avg_latency_ms(),
            consecutive_failures: self.executor.breaker().consecutive_failures(),
            halted: self.is_halted(),
        };

        let decision = self.gate.assess_and_decide(evaluation, &account, &system);
        if !decision.execute {
            info!(
                triangle = %evaluation.triangle_id,
                safety_score = %decision.safety_score,
                reasons = ?decision.reasons,
                adjustments = ?decision.adjustments,
                "Risk gate declined"
            );
            return None;
        }

        let triangle = self
            .triangles
            .iter()
            .find(|t| t.id == evaluation.triangle_id)?;
        let plan = ExecutionPlan::from_evaluation(triangle, evaluation);

        let trade_id = match self.executor.reserve(plan) {
            Ok(id) => id,
            Err(e) => {
                warn!(triangle = %evaluation.triangle_id, error = %e, "Reservation rejected");
                return None;
            }
        };
        self.events.publish(EngineEvent::TradeReserved {
            trade_id,
            triangle_id: evaluation.triangle_id.clone(),
            funding_currency: currency.clone(),
            notional: evaluation.start_amount,
        });

        match self.executor.execute(trade_id).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(%trade_id, error = %e, "Execution aborted");
                None
            }
        }
    }

    fn learn(&mut self, outcome: &ExecutionOutcome) {
        let record = &outcome.record;
        let update = self.adaptive.record(record);
        let history = self.history.entry(&record.triangle_id);
        history.record_outcome(record.succeeded());
        history.set_realized_slippage(update.mean_slippage_pct);
    }

    fn publish_outcome(&mut self, outcome: ExecutionOutcome) {
        let ExecutionOutcome { record, halted } = outcome;

        {
            let mut stats = self.stats.write();
            if record.succeeded() {
                stats.trades_completed += 1;
                if let Some(profit) = record.realized_profit {
                    *stats
                        .realized_profit
                        .entry(record.funding_currency.clone())
                        .or_insert(Decimal::ZERO) += profit;
                }
            } else {
                stats.trades_failed += 1;
            }
        }
        self.sync_breaker_stats();

        for exposure in record.exposures() {
            self.events.publish(EngineEvent::ExposureAlert {
                trade_id: record.id,
                exposure: exposure.clone(),
            });
        }

        let failed = !record.succeeded();
        let event = if record.succeeded() {
            EngineEvent::TradeCompleted { record }
        } else {
            EngineEvent::TradeFailed { record }
        };
        self.events.publish(event);

        let consecutive_failures = self.executor.breaker().consecutive_failures();
        if let Some(reason) = halted {
            error!(%reason, "Engine halted, manual resume required");
            self.events.publish(EngineEvent::EngineHalted {
                consecutive_failures,
                reason: reason.to_string(),
            });
        } else if failed && consecutive_failures > 0 {
            warn!(consecutive_failures, "Execution blocked until a resume");
            self.events.publish(EngineEvent::ExecutionBlocked {
                consecutive_failures,
                reason: format!("{consecutive_failures} consecutive failed trade(s)"),
            });
        }
    }

    fn sync_breaker_stats(&self) {
        let breaker = self.executor.breaker();
        let halted = breaker.is_halted();
        let failures = breaker.consecutive_failures();

        let mut stats = self.stats.write();
        stats.halted = halted;
        stats.consecutive_failures = failures;
        stats.execution_blocked = !halted && failures > 0;
    }

    fn record_cycle(&mut self, report: &CycleReport, evaluations: &[OpportunityEvaluation]) {
        let elapsed_ms = report.duration.as_millis() as u64;
        if self.latencies.len() == self.config.control.latency_window.max(1) {
            self.latencies.pop_front();
        }
        self.latencies.push_back(elapsed_ms);
        let avg = self.avg_latency_ms();

        let mut stats = self.stats.write();
        stats.cycles += 1;
        stats.opportunities_evaluated += report.evaluated as u64;
        stats.profitable_seen += evaluations.iter().filter(|e| e.is_profitable).count() as u64;
        stats.invalid_candidates += report.invalid as u64;
        stats.last_cycle_ms = elapsed_ms;
        stats.avg_cycle_latency_ms = avg;
        stats.last_cycle_at = Some(chrono::Utc::now());
        drop(stats);
        self.sync_breaker_stats();
    }

    fn avg_latency_ms(&self) -> Option<u64> {
        if self.latencies.is_empty() {
            return None;
        }
        Some(self.latencies.iter().sum::<u64>() / self.latencies.len() as u64)
    }
}

/// Previous cycle duration times the factor, clamped to the configured bounds
pub fn next_delay(previous: Duration, control: &ControlConfig) -> Duration {
    let min = Duration::from_millis(control.min_delay_ms);
    let max = Duration::from_millis(control.max_delay_ms);
    previous
        .saturating_mul(control.delay_factor)
        .max(min)
        .min(max)
}
