//! Domain types for the position keeper.
//!
//! This module provides:
//! - Lossless amounts via the `Amount` wrapper
//! - Ledger primitives: Address, PoolName, Side, TxId
//! - Position snapshots and their identity key
//! - Global permission flags

pub mod amount;
pub mod permissions;
pub mod position;
pub mod primitives;

pub use amount::Amount;
pub use permissions::Permissions;
pub use position::{Position, PositionKey};
pub use primitives::{Address, AddressParseError, PoolName, Side, TxId, ADDRESS_LEN};
