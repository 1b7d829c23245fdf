//! One-time resolution of the pool, custody and reward account to monitor.

use crate::config::Config;
use crate::domain::{Address, PoolName};
use crate::gateway::{with_timeout, GatewayError, LedgerGateway, PoolInfo};
use backoff::backoff::Constant;
use backoff::future::retry_notify;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Addresses the keeper works against for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTarget {
    pub pool_name: PoolName,
    pub pool: Address,
    pub mint: Address,
    pub custody: Address,
    /// Keeper-owned account that receives liquidation rewards.
    pub reward_account: Address,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("pool {pool} lookup failed after {attempts} attempts: {last_error}")]
    PoolLookupExhausted {
        pool: PoolName,
        attempts: u32,
        #[source]
        last_error: GatewayError,
    },
    #[error("custody for mint {mint} is not part of pool {pool}")]
    UnknownCustody { pool: PoolName, mint: Address },
    #[error("failed to resolve reward account: {0}")]
    RewardAccount(#[source] GatewayError),
}

#[derive(Debug, Clone, Copy)]
pub struct LookupPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub call_timeout: Duration,
}

impl LookupPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.pool_lookup_attempts,
            delay: config.pool_lookup_delay,
            call_timeout: config.call_timeout,
        }
    }
}

/// Look the pool up, retrying any failure up to `policy.attempts` times with a
/// constant delay. Exhaustion is returned as a typed error.
pub async fn lookup_pool(
    ledger: &dyn LedgerGateway,
    name: &PoolName,
    policy: LookupPolicy,
) -> Result<PoolInfo, BootstrapError> {
    let attempts = policy.attempts.max(1);
    let made = AtomicU32::new(0);

    let result = retry_notify(
        Constant::new(policy.delay),
        || async {
            let attempt = made.fetch_add(1, Ordering::SeqCst) + 1;
            match with_timeout(policy.call_timeout, ledger.get_pool(name)).await {
                Ok(pool) => Ok(pool),
                Err(e) if attempt >= attempts => Err(backoff::Error::permanent(e)),
                Err(e) => Err(backoff::Error::transient(e)),
            }
        },
        |err: GatewayError, wait: Duration| {
            warn!(pool = %name, error = %err, "Failed to get pool. Retrying in {:?}", wait);
        },
    )
    .await;

    result.map_err(|last_error| BootstrapError::PoolLookupExhausted {
        pool: name.clone(),
        attempts: made.load(Ordering::SeqCst),
        last_error,
    })
}

/// Resolve everything the scheduler needs before its first cycle.
pub async fn resolve_target(
    ledger: &dyn LedgerGateway,
    pool_name: &PoolName,
    mint: &Address,
    keeper: &Address,
    policy: LookupPolicy,
) -> Result<MonitorTarget, BootstrapError> {
    let pool = lookup_pool(ledger, pool_name, policy).await?;

    let custody = ledger.custody_address(&pool.address, mint);
    if !pool.custodies.contains(&custody) {
        return Err(BootstrapError::UnknownCustody {
            pool: pool_name.clone(),
            mint: mint.clone(),
        });
    }

    let reward_account = with_timeout(policy.call_timeout, ledger.receiving_account(keeper, mint))
        .await
        .map_err(BootstrapError::RewardAccount)?;

    info!(
        pool = %pool_name,
        custody = %custody,
        reward_account = %reward_account,
        "Resolved monitor target"
    );

    Ok(MonitorTarget {
        pool_name: pool_name.clone(),
        pool: pool.address,
        mint: mint.clone(),
        custody,
        reward_account,
    })
}
