//! In-memory ledger for tests and dry runs.
//!
//! Behaves like the real program where the keeper can observe it: successful
//! liquidations and triggers close the position, closed records stop being
//! listed, and writes against a missing record are rejected.

use super::{
    AddressDeriver, GatewayError, LedgerGateway, LiquidationState, PoolInfo, ProfitAndLoss,
    ValuationOracle,
};
use crate::domain::{Address, Amount, Permissions, PoolName, Position, PositionKey, TxId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Gateway method, used to target injected failures and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockMethod {
    ListPositions,
    PositionExists,
    GetPermissions,
    GetPool,
    ReceivingAccount,
    Liquidate,
    Trigger,
    LiquidationState,
    Pnl,
    ExitPrice,
}

/// Number of calls seen per method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCallCounts {
    pub list_positions: usize,
    pub position_exists: usize,
    pub get_permissions: usize,
    pub get_pool: usize,
    pub receiving_account: usize,
    pub liquidate: usize,
    pub trigger: usize,
    pub liquidation_state: usize,
    pub pnl: usize,
    pub exit_price: usize,
}

impl MockCallCounts {
    /// Calls made by scanning, evaluation or dispatch (everything except the
    /// permission check and bootstrap lookups).
    pub fn cycle_calls(&self) -> usize {
        self.list_positions
            + self.position_exists
            + self.receiving_account
            + self.liquidate
            + self.trigger
            + self.liquidation_state
            + self.pnl
            + self.exit_price
    }
}

#[derive(Debug, Default)]
struct MockState {
    permissions: Permissions,
    pools: Vec<PoolInfo>,
    positions: Vec<Position>,
    missing: HashSet<PositionKey>,
    liquidation: HashMap<PositionKey, LiquidationState>,
    pnl: HashMap<PositionKey, ProfitAndLoss>,
    exit_price: HashMap<PositionKey, Amount>,
    failures: HashMap<(MockMethod, Option<PositionKey>), GatewayError>,
    latency: HashMap<MockMethod, Duration>,
    pool_lookup_failures: usize,
    calls: MockCallCounts,
    liquidated: Vec<PositionKey>,
    triggered: Vec<(PositionKey, Amount)>,
    next_tx: u64,
}

impl MockState {
    fn failure(&self, method: MockMethod, key: Option<&PositionKey>) -> Option<GatewayError> {
        key.and_then(|k| self.failures.get(&(method, Some(k.clone()))))
            .or_else(|| self.failures.get(&(method, None)))
            .cloned()
    }

    fn is_live(&self, key: &PositionKey) -> bool {
        !self.missing.contains(key) && self.positions.iter().any(|p| &p.key() == key)
    }

    fn close(&mut self, key: &PositionKey) {
        self.positions.retain(|p| &p.key() != key);
    }

    fn next_tx(&mut self, prefix: &str) -> TxId {
        self.next_tx += 1;
        TxId::new(format!("{}-{}", prefix, self.next_tx))
    }
}

/// Mock ledger that serves both gateway traits from in-memory state.
#[derive(Debug)]
pub struct MockLedger {
    deriver: AddressDeriver,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Create an empty ledger with every permission enabled.
    pub fn new() -> Self {
        Self {
            deriver: AddressDeriver::new(Address::from_bytes([0x11; 32])),
            state: Mutex::new(MockState {
                permissions: Permissions::all(),
                ..MockState::default()
            }),
        }
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    fn state_mut(&mut self) -> &mut MockState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.state_mut().permissions = permissions;
        self
    }

    /// Register a pool whose addresses are derived from `name` and `mints`.
    pub fn with_pool(mut self, name: &str, mints: &[Address]) -> Self {
        let name = PoolName::new(name);
        let address = self.deriver.pool(&name);
        let custodies = mints
            .iter()
            .map(|mint| self.deriver.custody(&address, mint))
            .collect();
        self.state_mut().pools.push(PoolInfo {
            name,
            address,
            custodies,
        });
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.state_mut().positions.push(position);
        self
    }

    /// A position that is still listed but whose account is already gone.
    pub fn with_stale_position(mut self, position: Position) -> Self {
        let state = self.state_mut();
        state.missing.insert(position.key());
        state.positions.push(position);
        self
    }

    pub fn with_liquidation_state(mut self, key: &PositionKey, state: LiquidationState) -> Self {
        self.state_mut().liquidation.insert(key.clone(), state);
        self
    }

    pub fn with_pnl(mut self, key: &PositionKey, pnl: ProfitAndLoss) -> Self {
        self.state_mut().pnl.insert(key.clone(), pnl);
        self
    }

    pub fn with_exit_price(mut self, key: &PositionKey, price: Amount) -> Self {
        self.state_mut().exit_price.insert(key.clone(), price);
        self
    }

    /// Fail `method` for `key`, or for every call when `key` is `None`.
    pub fn with_failure(
        mut self,
        method: MockMethod,
        key: Option<&PositionKey>,
        error: GatewayError,
    ) -> Self {
        self.state_mut()
            .failures
            .insert((method, key.cloned()), error);
        self
    }

    pub fn with_latency(mut self, method: MockMethod, latency: Duration) -> Self {
        self.state_mut().latency.insert(method, latency);
        self
    }

    /// Fail the next `count` pool lookups with a network error.
    pub fn with_pool_lookup_failures(mut self, count: usize) -> Self {
        self.state_mut().pool_lookup_failures = count;
        self
    }

    pub fn set_permissions(&self, permissions: Permissions) {
        self.lock().permissions = permissions;
    }

    pub fn set_liquidation_state(&self, key: &PositionKey, state: LiquidationState) {
        self.lock().liquidation.insert(key.clone(), state);
    }

    /// Close a position as its owner would, outside the keeper.
    pub fn close_position(&self, key: &PositionKey) {
        self.lock().close(key);
    }

    pub fn calls(&self) -> MockCallCounts {
        self.lock().calls
    }

    pub fn liquidated(&self) -> Vec<PositionKey> {
        self.lock().liquidated.clone()
    }

    pub fn triggered(&self) -> Vec<(PositionKey, Amount)> {
        self.lock().triggered.clone()
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.lock().positions.clone()
    }

    async fn simulate_latency(&self, method: MockMethod) {
        let latency = self.lock().latency.get(&method).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn rejected(message: &str) -> GatewayError {
        GatewayError::Rejected {
            code: 3012,
            message: message.to_string(),
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    fn custody_address(&self, pool: &Address, mint: &Address) -> Address {
        self.deriver.custody(pool, mint)
    }

    fn position_address(&self, key: &PositionKey) -> Address {
        self.deriver.position(key)
    }

    async fn list_positions(
        &self,
        pool: &Address,
        custody: &Address,
    ) -> Result<Vec<Position>, GatewayError> {
        self.simulate_latency(MockMethod::ListPositions).await;
        let mut state = self.lock();
        state.calls.list_positions += 1;
        if let Some(err) = state.failure(MockMethod::ListPositions, None) {
            return Err(err);
        }
        Ok(state
            .positions
            .iter()
            .filter(|p| &p.pool == pool && &p.custody == custody)
            .cloned()
            .collect())
    }

    async fn position_exists(&self, position: &Address) -> Result<bool, GatewayError> {
        self.simulate_latency(MockMethod::PositionExists).await;
        let mut state = self.lock();
        state.calls.position_exists += 1;
        let key = state
            .positions
            .iter()
            .map(Position::key)
            .find(|k| &self.deriver.position(k) == position);
        if let Some(err) = state.failure(MockMethod::PositionExists, key.as_ref()) {
            return Err(err);
        }
        Ok(key.map(|k| !state.missing.contains(&k)).unwrap_or(false))
    }

    async fn get_permissions(&self) -> Result<Permissions, GatewayError> {
        self.simulate_latency(MockMethod::GetPermissions).await;
        let mut state = self.lock();
        state.calls.get_permissions += 1;
        if let Some(err) = state.failure(MockMethod::GetPermissions, None) {
            return Err(err);
        }
        Ok(state.permissions)
    }

    async fn get_pool(&self, name: &PoolName) -> Result<PoolInfo, GatewayError> {
        self.simulate_latency(MockMethod::GetPool).await;
        let mut state = self.lock();
        state.calls.get_pool += 1;
        if state.pool_lookup_failures > 0 {
            state.pool_lookup_failures -= 1;
            return Err(GatewayError::Network("connection refused".to_string()));
        }
        state
            .pools
            .iter()
            .find(|p| &p.name == name)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("pool {}", name)))
    }

    async fn receiving_account(
        &self,
        owner: &Address,
        mint: &Address,
    ) -> Result<Address, GatewayError> {
        self.simulate_latency(MockMethod::ReceivingAccount).await;
        let mut state = self.lock();
        state.calls.receiving_account += 1;
        if let Some(err) = state.failure(MockMethod::ReceivingAccount, None) {
            return Err(err);
        }
        Ok(self.deriver.token_account(owner, mint))
    }

    async fn liquidate(
        &self,
        key: &PositionKey,
        _receiving_account: &Address,
        _reward_account: &Address,
    ) -> Result<TxId, GatewayError> {
        self.simulate_latency(MockMethod::Liquidate).await;
        let mut state = self.lock();
        state.calls.liquidate += 1;
        if let Some(err) = state.failure(MockMethod::Liquidate, Some(key)) {
            return Err(err);
        }
        if !state.is_live(key) {
            return Err(Self::rejected("AccountNotInitialized"));
        }
        if state.liquidation.get(key) != Some(&LiquidationState::LIQUIDATABLE) {
            return Err(Self::rejected("InvalidPositionState"));
        }
        state.close(key);
        state.liquidated.push(key.clone());
        Ok(state.next_tx("liq"))
    }

    async fn trigger(
        &self,
        key: &PositionKey,
        _receiving_account: &Address,
        _reward_account: &Address,
        price: Amount,
    ) -> Result<TxId, GatewayError> {
        self.simulate_latency(MockMethod::Trigger).await;
        let mut state = self.lock();
        state.calls.trigger += 1;
        if let Some(err) = state.failure(MockMethod::Trigger, Some(key)) {
            return Err(err);
        }
        if !state.is_live(key) {
            return Err(Self::rejected("AccountNotInitialized"));
        }
        state.close(key);
        state.triggered.push((key.clone(), price));
        Ok(state.next_tx("trg"))
    }
}

#[async_trait]
impl ValuationOracle for MockLedger {
    async fn get_liquidation_state(
        &self,
        key: &PositionKey,
    ) -> Result<LiquidationState, GatewayError> {
        self.simulate_latency(MockMethod::LiquidationState).await;
        let mut state = self.lock();
        state.calls.liquidation_state += 1;
        if let Some(err) = state.failure(MockMethod::LiquidationState, Some(key)) {
            return Err(err);
        }
        if !state.is_live(key) {
            return Err(Self::rejected("AccountNotInitialized"));
        }
        Ok(state
            .liquidation
            .get(key)
            .copied()
            .unwrap_or(LiquidationState::HEALTHY))
    }

    async fn get_pnl(&self, key: &PositionKey) -> Result<ProfitAndLoss, GatewayError> {
        self.simulate_latency(MockMethod::Pnl).await;
        let mut state = self.lock();
        state.calls.pnl += 1;
        if let Some(err) = state.failure(MockMethod::Pnl, Some(key)) {
            return Err(err);
        }
        if !state.is_live(key) {
            return Err(Self::rejected("AccountNotInitialized"));
        }
        Ok(state.pnl.get(key).copied().unwrap_or_default())
    }

    async fn get_exit_price(&self, key: &PositionKey) -> Result<Amount, GatewayError> {
        self.simulate_latency(MockMethod::ExitPrice).await;
        let mut state = self.lock();
        state.calls.exit_price += 1;
        if let Some(err) = state.failure(MockMethod::ExitPrice, Some(key)) {
            return Err(err);
        }
        if let Some(price) = state.exit_price.get(key) {
            return Ok(*price);
        }
        state
            .positions
            .iter()
            .find(|p| &p.key() == key)
            .map(|p| p.price)
            .ok_or_else(|| Self::rejected("AccountNotInitialized"))
    }
}
