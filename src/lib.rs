pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod orchestration;

pub use config::Config;
pub use domain::{Address, Amount, Permissions, PoolName, Position, PositionKey, Side, TxId};
pub use engine::{CycleOutcome, RiskVerdict, TriggerVerdict};
pub use error::AppError;
pub use gateway::{GatewayError, HttpLedgerClient, LedgerGateway, MockLedger, ValuationOracle};
pub use orchestration::{Scheduler, SchedulerState, StatusBoard};
