pub mod bootstrap;
pub mod dispatcher;
pub mod evaluator;
pub mod scanner;
pub mod scheduler;
pub mod status;

pub use bootstrap::{resolve_target, BootstrapError, LookupPolicy, MonitorTarget};
pub use dispatcher::ActionDispatcher;
pub use evaluator::RiskEvaluator;
pub use scanner::{PositionScanner, ScanError, ScannedPosition};
pub use scheduler::{Scheduler, SchedulerSettings, SchedulerState, Tick, TickResult};
pub use status::{StatusBoard, StatusSnapshot};
