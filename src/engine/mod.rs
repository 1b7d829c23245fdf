//! Pure classification logic: no I/O, no clocks.

pub mod outcome;
pub mod risk;
pub mod trigger;

pub use outcome::{CycleOutcome, DispatchOutcome, PositionReport, PositionStatus, SkipReason};
pub use risk::{classify_liquidation, RiskVerdict};
pub use trigger::{TriggerLimits, TriggerVerdict};
