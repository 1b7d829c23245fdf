use crate::domain::{Address, PoolName};
use crate::engine::CycleOutcome;
use crate::orchestration::bootstrap::MonitorTarget;
use crate::orchestration::scheduler::{SchedulerState, Tick, TickResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Point-in-time view of the keeper served by the status API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub pool: PoolName,
    pub custody: Address,
    pub state: SchedulerState,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<CycleOutcome>,
    pub last_error: Option<String>,
}

/// Shared status, written by the scheduler after every tick and read by the API.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new(target: &MonitorTarget) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                pool: target.pool_name.clone(),
                custody: target.custody.clone(),
                state: SchedulerState::Active,
                cycles: 0,
                last_cycle_at: None,
                last_outcome: None,
                last_error: None,
            })),
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn record(&self, tick: &Tick) {
        let mut status = self.inner.write().await;
        status.state = tick.state;
        match &tick.result {
            TickResult::Completed(outcome) => {
                status.cycles += 1;
                status.last_cycle_at = Some(Utc::now());
                status.last_outcome = Some(*outcome);
                status.last_error = None;
            }
            TickResult::Paused => {}
            TickResult::PermissionsUnavailable(e) => status.last_error = Some(e.to_string()),
            TickResult::ScanFailed(e) => status.last_error = Some(e.to_string()),
        }
    }
}
