//! Stop-loss / take-profit threshold evaluation.

use crate::domain::{Amount, Position};
use crate::gateway::{GatewayError, ProfitAndLoss};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerVerdict {
    /// Neither stop-loss nor take-profit is set.
    NotApplicable,
    NotCrossed,
    LossCrossed,
    ProfitCrossed,
    /// Profit/loss could not be read; neither crossed nor not-crossed.
    EvaluationFailed(GatewayError),
}

impl TriggerVerdict {
    pub fn is_crossed(&self) -> bool {
        matches!(self, TriggerVerdict::LossCrossed | TriggerVerdict::ProfitCrossed)
    }
}

/// Owner-configured limits copied from a position snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerLimits {
    pub stop_loss: Option<Amount>,
    pub take_profit: Option<Amount>,
}

impl TriggerLimits {
    pub fn from_position(position: &Position) -> Self {
        Self {
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
        }
    }

    pub fn is_set(&self) -> bool {
        self.stop_loss.is_some() || self.take_profit.is_some()
    }

    /// Meets-or-exceeds comparison; a loss crossing wins over a profit crossing.
    pub fn evaluate(&self, pnl: &ProfitAndLoss) -> TriggerVerdict {
        if !self.is_set() {
            return TriggerVerdict::NotApplicable;
        }
        if self.stop_loss.is_some_and(|limit| pnl.loss.meets(&limit)) {
            return TriggerVerdict::LossCrossed;
        }
        if self.take_profit.is_some_and(|limit| pnl.profit.meets(&limit)) {
            return TriggerVerdict::ProfitCrossed;
        }
        TriggerVerdict::NotCrossed
    }

    pub fn classify(&self, pnl: Result<ProfitAndLoss, GatewayError>) -> TriggerVerdict {
        match pnl {
            Ok(pnl) => self.evaluate(&pnl),
            Err(e) => TriggerVerdict::EvaluationFailed(e),
        }
    }
}
