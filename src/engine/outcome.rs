//! Per-position reports and the per-cycle aggregate built from them.

use super::{RiskVerdict, TriggerVerdict};
use crate::domain::{PositionKey, TxId};
use crate::gateway::GatewayError;
use serde::Serialize;
use std::fmt;

/// Liveness of a listed position at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Live,
    NotExist,
    /// The existence check itself failed; skipped without a verdict.
    Unverified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Exit price could not be fetched; never trigger on an unknown price.
    PriceUnavailable(GatewayError),
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed(TxId),
    Failed(GatewayError),
    Skipped(SkipReason),
}

/// Everything that happened to one candidate during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionReport {
    pub key: PositionKey,
    pub status: PositionStatus,
    pub risk: Option<RiskVerdict>,
    pub liquidation: Option<DispatchOutcome>,
    /// Set when the record disappeared between the liquidation step and the
    /// trigger step; the trigger step is then a no-op.
    pub closed_before_trigger: bool,
    pub trigger: Option<TriggerVerdict>,
    pub trigger_dispatch: Option<DispatchOutcome>,
}

impl PositionReport {
    pub fn not_exist(key: PositionKey) -> Self {
        Self {
            key,
            status: PositionStatus::NotExist,
            risk: None,
            liquidation: None,
            closed_before_trigger: false,
            trigger: None,
            trigger_dispatch: None,
        }
    }

    pub fn live(key: PositionKey) -> Self {
        Self {
            status: PositionStatus::Live,
            ..Self::not_exist(key)
        }
    }

    pub fn unverified(key: PositionKey) -> Self {
        Self {
            status: PositionStatus::Unverified,
            ..Self::not_exist(key)
        }
    }
}

/// Aggregate counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleOutcome {
    pub total: usize,
    pub not_exist: usize,
    pub liveness_errors: usize,
    pub liquidation_state_errors: usize,
    pub undercollateralized: usize,
    pub liquidated: usize,
    pub liquidation_failures: usize,
    pub trigger_eligible: usize,
    pub triggered: usize,
    pub trigger_failures: usize,
    pub pnl_errors: usize,
    pub price_errors: usize,
    pub closed_before_trigger: usize,
}

impl CycleOutcome {
    pub fn record(&mut self, report: &PositionReport) {
        self.total += 1;
        match report.status {
            PositionStatus::NotExist => {
                self.not_exist += 1;
                return;
            }
            PositionStatus::Unverified => {
                self.liveness_errors += 1;
                return;
            }
            PositionStatus::Live => {}
        }

        match &report.risk {
            Some(RiskVerdict::Liquidatable) => self.undercollateralized += 1,
            Some(RiskVerdict::EvaluationFailed(_)) => self.liquidation_state_errors += 1,
            Some(RiskVerdict::Healthy) | None => {}
        }
        match &report.liquidation {
            Some(DispatchOutcome::Executed(_)) => self.liquidated += 1,
            Some(DispatchOutcome::Failed(_)) => self.liquidation_failures += 1,
            Some(DispatchOutcome::Skipped(_)) | None => {}
        }

        if report.closed_before_trigger {
            self.closed_before_trigger += 1;
        }
        match &report.trigger {
            Some(verdict) if verdict.is_crossed() => self.trigger_eligible += 1,
            Some(TriggerVerdict::EvaluationFailed(_)) => self.pnl_errors += 1,
            _ => {}
        }
        match &report.trigger_dispatch {
            Some(DispatchOutcome::Executed(_)) => self.triggered += 1,
            Some(DispatchOutcome::Failed(_)) => self.trigger_failures += 1,
            Some(DispatchOutcome::Skipped(SkipReason::PriceUnavailable(_))) => {
                self.price_errors += 1
            }
            None => {}
        }
    }

    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a PositionReport>) -> Self {
        let mut outcome = CycleOutcome::default();
        for report in reports {
            outcome.record(report);
        }
        outcome
    }

    pub fn evaluation_errors(&self) -> usize {
        self.liveness_errors + self.liquidation_state_errors + self.pnl_errors + self.price_errors
    }

    pub fn dispatch_failures(&self) -> usize {
        self.liquidation_failures + self.trigger_failures
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Liquidated: {} / {}. Total: {}, Not exist: {}, getLiquidationStateErrors: {}, \
             triggered: {} / {}, pnlErrors: {}, evaluationErrors: {}, closedBeforeTrigger: {}, \
             dispatchFailures: {}",
            self.liquidated,
            self.undercollateralized,
            self.total,
            self.not_exist,
            self.liquidation_state_errors,
            self.triggered,
            self.trigger_eligible,
            self.pnl_errors + self.price_errors,
            self.evaluation_errors(),
            self.closed_before_trigger,
            self.dispatch_failures(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Side};

    fn key(b: u8) -> PositionKey {
        PositionKey {
            owner: Address::from_bytes([b; 32]),
            pool: Address::from_bytes([0xa0; 32]),
            custody: Address::from_bytes([0xc0; 32]),
            side: Side::Long,
        }
    }

    #[test]
    fn test_not_exist_counts_once_and_nothing_else() {
        let outcome = CycleOutcome::from_reports(&[PositionReport::not_exist(key(1))]);
        assert_eq!(
            outcome,
            CycleOutcome {
                total: 1,
                not_exist: 1,
                ..CycleOutcome::default()
            }
        );
    }

    #[test]
    fn test_unverified_is_neither_missing_nor_evaluated() {
        let outcome = CycleOutcome::from_reports(&[PositionReport::unverified(key(1))]);
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.not_exist, 0);
        assert_eq!(outcome.liveness_errors, 1);
        assert_eq!(outcome.evaluation_errors(), 1);
    }

    #[test]
    fn test_liquidated_position() {
        let mut report = PositionReport::live(key(1));
        report.risk = Some(RiskVerdict::Liquidatable);
        report.liquidation = Some(DispatchOutcome::Executed(TxId::new("sig")));
        report.closed_before_trigger = true;

        let outcome = CycleOutcome::from_reports(&[report]);
        assert_eq!(outcome.undercollateralized, 1);
        assert_eq!(outcome.liquidated, 1);
        assert_eq!(outcome.closed_before_trigger, 1);
        assert_eq!(outcome.pnl_errors, 0);
    }

    #[test]
    fn test_price_skip_is_an_evaluation_error_not_a_dispatch_failure() {
        let mut report = PositionReport::live(key(1));
        report.risk = Some(RiskVerdict::Healthy);
        report.trigger = Some(TriggerVerdict::ProfitCrossed);
        report.trigger_dispatch = Some(DispatchOutcome::Skipped(SkipReason::PriceUnavailable(
            GatewayError::Timeout { after_ms: 1 },
        )));

        let outcome = CycleOutcome::from_reports(&[report]);
        assert_eq!(outcome.trigger_eligible, 1);
        assert_eq!(outcome.triggered, 0);
        assert_eq!(outcome.price_errors, 1);
        assert_eq!(outcome.dispatch_failures(), 0);
        assert_eq!(outcome.evaluation_errors(), 1);
    }

    #[test]
    fn test_summary_line() {
        let outcome = CycleOutcome {
            total: 3,
            undercollateralized: 1,
            liquidated: 1,
            trigger_eligible: 1,
            triggered: 1,
            ..CycleOutcome::default()
        };
        assert_eq!(
            outcome.to_string(),
            "Liquidated: 1 / 1. Total: 3, Not exist: 0, getLiquidationStateErrors: 0, \
             triggered: 1 / 1, pnlErrors: 0, evaluationErrors: 0, closedBeforeTrigger: 0, \
             dispatchFailures: 0"
        );
    }

    #[test]
    fn test_summary_line_shows_failed_existence_checks() {
        let outcome = CycleOutcome::from_reports(&[
            PositionReport::unverified(key(1)),
            PositionReport::unverified(key(2)),
        ]);
        let line = outcome.to_string();
        assert!(line.contains("Total: 2"), "{}", line);
        assert!(line.contains("evaluationErrors: 2"), "{}", line);
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let json = serde_json::to_value(CycleOutcome::default()).unwrap();
        assert_eq!(json["liquidationStateErrors"], 0);
        assert_eq!(json["notExist"], 0);
    }
}
