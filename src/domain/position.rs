//! Position snapshots as read from the ledger.

use super::{Address, Amount, Side};
use serde::{Deserialize, Serialize};

/// Identity of a position: one per (owner, pool, custody, side).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: Address,
    pub pool: Address,
    pub custody: Address,
    pub side: Side,
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner.short(), self.side)
    }
}

/// Read-only snapshot of a position record.
///
/// The keeper never owns a position; a snapshot may already be stale by the
/// time it is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub owner: Address,
    pub pool: Address,
    pub custody: Address,
    pub side: Side,
    pub open_time: i64,
    pub update_time: i64,
    /// Entry price.
    pub price: Amount,
    pub size_usd: Amount,
    pub collateral_usd: Amount,
    pub collateral_amount: Amount,
    /// Loss magnitude (USD) at which the owner wants the position closed.
    pub stop_loss: Option<Amount>,
    /// Profit magnitude (USD) at which the owner wants the position closed.
    pub take_profit: Option<Amount>,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            owner: self.owner.clone(),
            pool: self.pool.clone(),
            custody: self.custody.clone(),
            side: self.side,
        }
    }
}
