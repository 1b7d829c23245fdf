use crate::domain::Position;
use crate::engine::PositionStatus;
use crate::gateway::{with_timeout, GatewayError, LedgerGateway};
use crate::orchestration::bootstrap::MonitorTarget;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list positions: {0}")]
    List(#[source] GatewayError),
}

/// A listed position together with its liveness at scan time.
#[derive(Debug, Clone)]
pub struct ScannedPosition {
    pub position: Position,
    pub status: PositionStatus,
}

/// Enumerates candidates for one pool+custody pair and confirms each still exists.
#[derive(Debug, Clone)]
pub struct PositionScanner {
    ledger: Arc<dyn LedgerGateway>,
    call_timeout: Duration,
    max_concurrency: usize,
}

impl PositionScanner {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        call_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            call_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Candidates in ledger order. Only a failed listing aborts the scan.
    pub async fn scan(&self, target: &MonitorTarget) -> Result<Vec<ScannedPosition>, ScanError> {
        let positions = with_timeout(
            self.call_timeout,
            self.ledger.list_positions(&target.pool, &target.custody),
        )
        .await
        .map_err(ScanError::List)?;

        debug!(count = positions.len(), "Listed positions");

        let scanned: Vec<ScannedPosition> = stream::iter(positions)
            .map(|position| async move {
                let status = self.liveness(&position).await;
                ScannedPosition { position, status }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;
        Ok(scanned)
    }

    /// Re-derive the position's address and confirm the record is still there.
    pub async fn liveness(&self, position: &Position) -> PositionStatus {
        let key = position.key();
        let address = self.ledger.position_address(&key);
        match with_timeout(self.call_timeout, self.ledger.position_exists(&address)).await {
            Ok(true) => PositionStatus::Live,
            Ok(false) => {
                debug!(owner = %key.owner, side = %key.side, "Position no longer exists");
                PositionStatus::NotExist
            }
            Err(e) => {
                debug!(owner = %key.owner, side = %key.side, error = %e, "Existence check failed");
                PositionStatus::Unverified
            }
        }
    }
}
