use crate::domain::Position;
use crate::engine::{DispatchOutcome, SkipReason};
use crate::gateway::{with_timeout, LedgerGateway, ValuationOracle};
use crate::orchestration::bootstrap::MonitorTarget;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Submits settlement transactions. Every failure is returned as an outcome
/// for the caller to count; nothing is retried within the cycle.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    ledger: Arc<dyn LedgerGateway>,
    oracle: Arc<dyn ValuationOracle>,
    call_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        oracle: Arc<dyn ValuationOracle>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            oracle,
            call_timeout,
        }
    }

    /// Liquidate an under-collateralized position, paying the reward to the
    /// keeper's account.
    pub async fn liquidate(
        &self,
        position: &Position,
        target: &MonitorTarget,
    ) -> DispatchOutcome {
        let key = position.key();
        let receiving = match with_timeout(
            self.call_timeout,
            self.ledger.receiving_account(&key.owner, &target.mint),
        )
        .await
        {
            Ok(account) => account,
            Err(e) => {
                warn!(
                    owner = %key.owner,
                    side = %key.side,
                    error = %e,
                    "Owner receiving account unavailable"
                );
                return DispatchOutcome::Failed(e);
            }
        };

        match with_timeout(
            self.call_timeout,
            self.ledger.liquidate(&key, &receiving, &target.reward_account),
        )
        .await
        {
            Ok(tx) => {
                info!(owner = %key.owner, side = %key.side, tx = %tx, "Position liquidated");
                DispatchOutcome::Executed(tx)
            }
            Err(e) => {
                warn!(owner = %key.owner, side = %key.side, error = %e, "Liquidation rejected");
                DispatchOutcome::Failed(e)
            }
        }
    }

    /// Close a position whose stop-loss or take-profit crossed, at the current
    /// exit price. Without a price the position is skipped.
    pub async fn trigger(
        &self,
        position: &Position,
        target: &MonitorTarget,
    ) -> DispatchOutcome {
        let key = position.key();
        let price = match with_timeout(self.call_timeout, self.oracle.get_exit_price(&key)).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    owner = %key.owner,
                    side = %key.side,
                    error = %e,
                    "Exit price unavailable, not triggering"
                );
                return DispatchOutcome::Skipped(SkipReason::PriceUnavailable(e));
            }
        };

        let receiving = match with_timeout(
            self.call_timeout,
            self.ledger.receiving_account(&key.owner, &target.mint),
        )
        .await
        {
            Ok(account) => account,
            Err(e) => {
                warn!(
                    owner = %key.owner,
                    side = %key.side,
                    error = %e,
                    "Owner receiving account unavailable"
                );
                return DispatchOutcome::Failed(e);
            }
        };

        // The settlement engine pays trigger proceeds and fee rebate to the owner.
        match with_timeout(
            self.call_timeout,
            self.ledger.trigger(&key, &receiving, &receiving, price),
        )
        .await
        {
            Ok(tx) => {
                info!(
                    owner = %key.owner,
                    side = %key.side,
                    price = %price,
                    tx = %tx,
                    "Position triggered"
                );
                DispatchOutcome::Executed(tx)
            }
            Err(e) => {
                warn!(owner = %key.owner, side = %key.side, error = %e, "Trigger rejected");
                DispatchOutcome::Failed(e)
            }
        }
    }
}
