//! External collaborator seams: the ledger program and its valuation views.
//!
//! The keeper never reads account bytes or computes margin itself. Everything
//! it knows about positions, permissions and prices arrives through these
//! traits, so tests can substitute [`MockLedger`] for the network client.

use crate::domain::{Address, Amount, Permissions, PoolName, Position, PositionKey, TxId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub mod address;
pub mod http;
pub mod mock;

pub use address::AddressDeriver;
pub use http::HttpLedgerClient;
pub use mock::MockLedger;

/// Read and write access to the ledger program.
///
/// Write operations are single atomic transactions: they either land fully or
/// fail with an error, never partially.
#[async_trait]
pub trait LedgerGateway: Send + Sync + fmt::Debug {
    /// Canonical address of the custody for `mint` within `pool`.
    fn custody_address(&self, pool: &Address, mint: &Address) -> Address;

    /// Canonical address of the record backing `key`.
    fn position_address(&self, key: &PositionKey) -> Address;

    /// Positions currently indexed under the pool+custody pair, in ledger order.
    async fn list_positions(
        &self,
        pool: &Address,
        custody: &Address,
    ) -> Result<Vec<Position>, GatewayError>;

    /// Whether the account at `position` still exists.
    async fn position_exists(&self, position: &Address) -> Result<bool, GatewayError>;

    async fn get_permissions(&self) -> Result<Permissions, GatewayError>;

    async fn get_pool(&self, name: &PoolName) -> Result<PoolInfo, GatewayError>;

    /// Get or create the token account through which `owner` receives `mint`.
    async fn receiving_account(
        &self,
        owner: &Address,
        mint: &Address,
    ) -> Result<Address, GatewayError>;

    async fn liquidate(
        &self,
        key: &PositionKey,
        receiving_account: &Address,
        reward_account: &Address,
    ) -> Result<TxId, GatewayError>;

    async fn trigger(
        &self,
        key: &PositionKey,
        receiving_account: &Address,
        reward_account: &Address,
        price: Amount,
    ) -> Result<TxId, GatewayError>;
}

/// Valuation views computed by the settlement engine against live oracle data.
#[async_trait]
pub trait ValuationOracle: Send + Sync + fmt::Debug {
    async fn get_liquidation_state(
        &self,
        key: &PositionKey,
    ) -> Result<LiquidationState, GatewayError>;

    async fn get_pnl(&self, key: &PositionKey) -> Result<ProfitAndLoss, GatewayError>;

    /// Price at which the position would close right now.
    async fn get_exit_price(&self, key: &PositionKey) -> Result<Amount, GatewayError>;
}

/// Pool account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub name: PoolName,
    pub address: Address,
    pub custodies: Vec<Address>,
}

/// Raw liquidation state code reported by the settlement engine.
///
/// `0` is healthy, `1` is liquidatable; anything else is not a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationState(pub u8);

impl LiquidationState {
    pub const HEALTHY: LiquidationState = LiquidationState(0);
    pub const LIQUIDATABLE: LiquidationState = LiquidationState(1);
}

/// Unrealized profit and loss magnitudes; at most one is normally non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub profit: Amount,
    pub loss: Amount,
}

/// Error type for gateway operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network error (connection refused, DNS failure, reset)
    Network(String),
    /// Non-success HTTP status from the bridge
    Http { status: u16, message: String },
    /// Malformed or unexpected response payload
    Parse(String),
    /// The ledger rejected the call (stale price, closed account, permission)
    Rejected { code: i64, message: String },
    /// The requested account does not exist
    NotFound(String),
    /// The call did not finish within the per-call limit
    Timeout { after_ms: u64 },
    /// Other error
    Other(String),
}

impl GatewayError {
    /// Whether the same read is worth repeating immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout { .. } => true,
            GatewayError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Network(msg) => write!(f, "Network error: {}", msg),
            GatewayError::Http { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            GatewayError::Parse(msg) => write!(f, "Parse error: {}", msg),
            GatewayError::Rejected { code, message } => {
                write!(f, "Rejected ({}): {}", code, message)
            }
            GatewayError::NotFound(what) => write!(f, "Not found: {}", what),
            GatewayError::Timeout { after_ms } => write!(f, "Timed out after {}ms", after_ms),
            GatewayError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Run a gateway call under `limit`, mapping an elapsed timer to
/// [`GatewayError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            after_ms: limit.as_millis() as u64,
        }),
    }
}
