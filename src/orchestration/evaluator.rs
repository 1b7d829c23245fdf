use crate::domain::{Position, PositionKey};
use crate::engine::{classify_liquidation, RiskVerdict, TriggerLimits, TriggerVerdict};
use crate::gateway::{with_timeout, ValuationOracle};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Classifies live positions from fresh oracle reads. Nothing is cached
/// between calls.
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    oracle: Arc<dyn ValuationOracle>,
    call_timeout: Duration,
}

impl RiskEvaluator {
    pub fn new(oracle: Arc<dyn ValuationOracle>, call_timeout: Duration) -> Self {
        Self {
            oracle,
            call_timeout,
        }
    }

    pub async fn assess_liquidation(&self, key: &PositionKey) -> RiskVerdict {
        let result = with_timeout(self.call_timeout, self.oracle.get_liquidation_state(key)).await;
        let verdict = classify_liquidation(result);
        if let RiskVerdict::EvaluationFailed(e) = &verdict {
            debug!(
                owner = %key.owner,
                side = %key.side,
                error = %e,
                "Liquidation state unavailable"
            );
        }
        verdict
    }

    /// Positions without limits are `NotApplicable` and cost no oracle call.
    pub async fn assess_trigger(&self, position: &Position) -> TriggerVerdict {
        let limits = TriggerLimits::from_position(position);
        if !limits.is_set() {
            return TriggerVerdict::NotApplicable;
        }
        let key = position.key();
        let pnl = with_timeout(self.call_timeout, self.oracle.get_pnl(&key)).await;
        let verdict = limits.classify(pnl);
        if let TriggerVerdict::EvaluationFailed(e) = &verdict {
            debug!(owner = %key.owner, side = %key.side, error = %e, "PnL unavailable");
        }
        verdict
    }
}
