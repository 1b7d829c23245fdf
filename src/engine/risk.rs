use crate::gateway::{GatewayError, LiquidationState};

/// Liquidation classification of one live position for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskVerdict {
    Healthy,
    Liquidatable,
    /// The oracle call failed or returned something that is not a verdict.
    EvaluationFailed(GatewayError),
}

impl RiskVerdict {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, RiskVerdict::Liquidatable)
    }
}

/// Classify the raw oracle answer. Only codes 0 and 1 are verdicts.
pub fn classify_liquidation(result: Result<LiquidationState, GatewayError>) -> RiskVerdict {
    match result {
        Ok(LiquidationState::HEALTHY) => RiskVerdict::Healthy,
        Ok(LiquidationState::LIQUIDATABLE) => RiskVerdict::Liquidatable,
        Ok(LiquidationState(code)) => RiskVerdict::EvaluationFailed(GatewayError::Parse(format!(
            "ambiguous liquidation state {}",
            code
        ))),
        Err(e) => RiskVerdict::EvaluationFailed(e),
    }
}
