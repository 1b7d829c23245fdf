//! Active/Paused scan loop.
//!
//! Every tick reads the global permissions first. While liquidations are
//! disabled the scheduler makes no scanner, oracle or dispatch calls and
//! backs off for the long interval. While enabled it runs exactly one cycle:
//! scan, evaluate each candidate, dispatch, and fold the per-position reports
//! into a [`CycleOutcome`].

use crate::config::Config;
use crate::engine::{CycleOutcome, PositionReport, PositionStatus};
use crate::gateway::{with_timeout, GatewayError, LedgerGateway, ValuationOracle};
use crate::orchestration::bootstrap::MonitorTarget;
use crate::orchestration::dispatcher::ActionDispatcher;
use crate::orchestration::evaluator::RiskEvaluator;
use crate::orchestration::scanner::{PositionScanner, ScanError, ScannedPosition};
use crate::orchestration::status::StatusBoard;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Active,
    Paused,
}

#[derive(Debug)]
pub enum TickResult {
    Completed(CycleOutcome),
    Paused,
    /// Permissions could not be read; handled like a pause, state unchanged.
    PermissionsUnavailable(GatewayError),
    /// Candidates could not be listed; retried after the normal interval.
    ScanFailed(ScanError),
}

/// What one tick did and how long to wait before the next.
#[derive(Debug)]
pub struct Tick {
    pub state: SchedulerState,
    pub result: TickResult,
    pub sleep: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub cycle_interval: Duration,
    pub paused_backoff: Duration,
    pub call_timeout: Duration,
    pub max_concurrency: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cycle_interval: config.cycle_interval,
            paused_backoff: config.paused_backoff,
            call_timeout: config.call_timeout,
            max_concurrency: config.max_concurrency,
        }
    }
}

pub struct Scheduler {
    ledger: Arc<dyn LedgerGateway>,
    scanner: PositionScanner,
    evaluator: RiskEvaluator,
    dispatcher: ActionDispatcher,
    target: MonitorTarget,
    settings: SchedulerSettings,
    state: SchedulerState,
    status: Option<StatusBoard>,
}

impl Scheduler {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        oracle: Arc<dyn ValuationOracle>,
        target: MonitorTarget,
        settings: SchedulerSettings,
    ) -> Self {
        let max_concurrency = settings.max_concurrency.max(1);
        Self {
            scanner: PositionScanner::new(ledger.clone(), settings.call_timeout, max_concurrency),
            evaluator: RiskEvaluator::new(oracle.clone(), settings.call_timeout),
            dispatcher: ActionDispatcher::new(ledger.clone(), oracle, settings.call_timeout),
            ledger,
            target,
            settings: SchedulerSettings {
                max_concurrency,
                ..settings
            },
            state: SchedulerState::Active,
            status: None,
        }
    }

    /// Publish every tick to `status`.
    pub fn with_status(mut self, status: StatusBoard) -> Self {
        self.status = Some(status);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// One permission check and, when Active, one full cycle.
    pub async fn tick(&mut self) -> Tick {
        let tick = match with_timeout(self.settings.call_timeout, self.ledger.get_permissions())
            .await
        {
            Err(e) => {
                warn!(error = %e, "Failed to read permissions, backing off");
                Tick {
                    state: self.state,
                    result: TickResult::PermissionsUnavailable(e),
                    sleep: self.settings.paused_backoff,
                }
            }
            Ok(permissions) if !permissions.keeper_enabled() => {
                self.transition(SchedulerState::Paused);
                Tick {
                    state: self.state,
                    result: TickResult::Paused,
                    sleep: self.settings.paused_backoff,
                }
            }
            Ok(_) => {
                self.transition(SchedulerState::Active);
                let cycle_id = Uuid::new_v4();
                let span = info_span!("cycle", id = %cycle_id, pool = %self.target.pool_name);
                let result = match self.run_cycle().instrument(span).await {
                    Ok(outcome) => TickResult::Completed(outcome),
                    Err(e) => TickResult::ScanFailed(e),
                };
                Tick {
                    state: self.state,
                    result,
                    sleep: self.settings.cycle_interval,
                }
            }
        };

        if let Some(status) = &self.status {
            status.record(&tick).await;
        }
        tick
    }

    fn transition(&mut self, next: SchedulerState) {
        if self.state == next {
            return;
        }
        match next {
            SchedulerState::Paused => warn!("Liquidations disabled on ledger, pausing"),
            SchedulerState::Active => info!("Liquidations enabled on ledger, resuming"),
        }
        self.state = next;
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, ScanError> {
        let scanned = match self.scanner.scan(&self.target).await {
            Ok(scanned) => scanned,
            Err(e) => {
                warn!(error = %e, "Scan failed, retrying next cycle");
                return Err(e);
            }
        };

        let reports: Vec<PositionReport> = stream::iter(scanned)
            .map(|candidate| self.process_position(candidate))
            .buffered(self.settings.max_concurrency)
            .collect()
            .await;

        let outcome = CycleOutcome::from_reports(&reports);
        info!("{}", outcome);
        Ok(outcome)
    }

    /// Liquidation first; the trigger check only runs if the record survived it.
    async fn process_position(&self, candidate: ScannedPosition) -> PositionReport {
        let ScannedPosition { position, status } = candidate;
        let key = position.key();
        match status {
            PositionStatus::NotExist => return PositionReport::not_exist(key),
            PositionStatus::Unverified => return PositionReport::unverified(key),
            PositionStatus::Live => {}
        }

        let mut report = PositionReport::live(key.clone());
        let risk = self.evaluator.assess_liquidation(&key).await;
        if risk.is_liquidatable() {
            report.liquidation = Some(self.dispatcher.liquidate(&position, &self.target).await);
        }
        report.risk = Some(risk);

        if report.liquidation.is_some() {
            match self.scanner.liveness(&position).await {
                PositionStatus::Live => {}
                PositionStatus::NotExist => {
                    report.closed_before_trigger = true;
                    return report;
                }
                PositionStatus::Unverified => {
                    debug!(
                        owner = %key.owner,
                        side = %key.side,
                        "Skipping trigger check, record state unknown"
                    );
                    return report;
                }
            }
        }

        let verdict = self.evaluator.assess_trigger(&position).await;
        if verdict.is_crossed() {
            report.trigger_dispatch = Some(self.dispatcher.trigger(&position, &self.target).await);
        }
        report.trigger = Some(verdict);
        report
    }

    /// Tick and sleep until `shutdown` resolves. A tick in progress is always
    /// allowed to finish.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future,
    {
        tokio::pin!(shutdown);
        info!(pool = %self.target.pool_name, custody = %self.target.custody, "Keeper started");
        loop {
            let tick = self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(tick.sleep) => {}
                _ = &mut shutdown => break,
            }
        }
        info!("Keeper stopped");
    }
}
