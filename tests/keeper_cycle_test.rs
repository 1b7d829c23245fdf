use perp_keeper::domain::{Address, Amount, Permissions, PoolName, Position, Side};
use perp_keeper::engine::CycleOutcome;
use perp_keeper::gateway::mock::MockMethod;
use perp_keeper::gateway::{GatewayError, LiquidationState, MockLedger, ProfitAndLoss};
use perp_keeper::orchestration::{
    MonitorTarget, Scheduler, SchedulerSettings, SchedulerState, Tick, TickResult,
};
use std::sync::Arc;
use std::time::Duration;

const CYCLE_INTERVAL: Duration = Duration::from_millis(5_000);
const PAUSED_BACKOFF: Duration = Duration::from_millis(10_000);

fn mint() -> Address {
    Address::from_bytes([5; 32])
}

fn settings(max_concurrency: usize) -> SchedulerSettings {
    SchedulerSettings {
        cycle_interval: CYCLE_INTERVAL,
        paused_backoff: PAUSED_BACKOFF,
        call_timeout: Duration::from_secs(1),
        max_concurrency,
    }
}

fn target(ledger: &MockLedger) -> MonitorTarget {
    let name = PoolName::new("main");
    let pool = ledger.deriver().pool(&name);
    let custody = ledger.deriver().custody(&pool, &mint());
    MonitorTarget {
        pool_name: name,
        pool,
        mint: mint(),
        custody,
        reward_account: Address::from_bytes([0xee; 32]),
    }
}

fn position(
    target: &MonitorTarget,
    owner: u8,
    side: Side,
    stop_loss: Option<u64>,
    take_profit: Option<u64>,
) -> Position {
    Position {
        owner: Address::from_bytes([owner; 32]),
        pool: target.pool.clone(),
        custody: target.custody.clone(),
        side,
        open_time: 1_700_000_000,
        update_time: 1_700_000_000,
        price: Amount::from_units(100),
        size_usd: Amount::from_units(1_000),
        collateral_usd: Amount::from_units(100),
        collateral_amount: Amount::from_units(1),
        stop_loss: stop_loss.map(Amount::from_units),
        take_profit: take_profit.map(Amount::from_units),
    }
}

fn profit(units: u64) -> ProfitAndLoss {
    ProfitAndLoss {
        profit: Amount::from_units(units),
        loss: Amount::zero(),
    }
}

fn loss(units: u64) -> ProfitAndLoss {
    ProfitAndLoss {
        profit: Amount::zero(),
        loss: Amount::from_units(units),
    }
}

fn scheduler(ledger: &Arc<MockLedger>, target: MonitorTarget, max_concurrency: usize) -> Scheduler {
    Scheduler::new(ledger.clone(), ledger.clone(), target, settings(max_concurrency))
}

fn completed(tick: Tick) -> CycleOutcome {
    assert_eq!(tick.sleep, CYCLE_INTERVAL);
    match tick.result {
        TickResult::Completed(outcome) => outcome,
        other => panic!("Expected a completed cycle, got {:?}", other),
    }
}

/// Position 1 under-collateralized, position 2 past its take-profit,
/// position 3 healthy without limits.
fn scenario_a() -> (Arc<MockLedger>, MonitorTarget, [Position; 3]) {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p1 = position(&t, 1, Side::Long, None, None);
    let p2 = position(&t, 2, Side::Short, None, Some(40));
    let p3 = position(&t, 3, Side::Long, None, None);
    let ledger = base
        .with_position(p1.clone())
        .with_position(p2.clone())
        .with_position(p3.clone())
        .with_liquidation_state(&p1.key(), LiquidationState::LIQUIDATABLE)
        .with_pnl(&p2.key(), profit(55));
    (Arc::new(ledger), t, [p1, p2, p3])
}

#[tokio::test]
async fn test_scenario_a_liquidates_and_triggers() {
    let (ledger, t, [p1, p2, _]) = scenario_a();
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.undercollateralized, 1);
    assert_eq!(outcome.liquidated, 1);
    assert_eq!(outcome.trigger_eligible, 1);
    assert_eq!(outcome.triggered, 1);
    assert_eq!(outcome.not_exist, 0);
    assert_eq!(outcome.dispatch_failures(), 0);

    assert_eq!(ledger.liquidated(), vec![p1.key()]);
    let triggered = ledger.triggered();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].0, p2.key());
    assert_eq!(ledger.open_positions().len(), 1);
}

#[tokio::test]
async fn test_scenario_a_same_outcome_with_concurrency() {
    let (ledger, t, _) = scenario_a();
    let mut s = scheduler(&ledger, t, 4);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.liquidated, 1);
    assert_eq!(outcome.triggered, 1);
    assert_eq!(outcome.undercollateralized, 1);
}

#[tokio::test]
async fn test_scenario_b_oracle_failure_is_isolated() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p1 = position(&t, 1, Side::Long, None, None);
    let p2 = position(&t, 2, Side::Short, None, Some(40));
    let p3 = position(&t, 3, Side::Long, None, None);
    let ledger = Arc::new(
        base.with_position(p1.clone())
            .with_position(p2.clone())
            .with_position(p3)
            .with_failure(
                MockMethod::LiquidationState,
                Some(&p1.key()),
                GatewayError::Other("oracle unavailable".to_string()),
            )
            .with_pnl(&p2.key(), profit(40)),
    );
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.liquidation_state_errors, 1);
    assert_eq!(outcome.undercollateralized, 0);
    assert_eq!(outcome.triggered, 1);
    assert_eq!(ledger.calls().liquidation_state, 3);
    assert_eq!(ledger.calls().liquidate, 0);
}

#[tokio::test]
async fn test_scenario_c_paused_makes_no_cycle_calls() {
    let (ledger, t, _) = scenario_a();
    ledger.set_permissions(Permissions {
        allow_liquidation: false,
        ..Permissions::all()
    });
    let mut s = scheduler(&ledger, t, 1);

    let tick = s.tick().await;
    assert!(matches!(tick.result, TickResult::Paused));
    assert_eq!(tick.state, SchedulerState::Paused);
    assert_eq!(tick.sleep, PAUSED_BACKOFF);
    assert_eq!(ledger.calls().cycle_calls(), 0);
    assert_eq!(ledger.calls().get_permissions, 1);

    // Still paused on re-check: still no work.
    let tick = s.tick().await;
    assert!(matches!(tick.result, TickResult::Paused));
    assert_eq!(ledger.calls().cycle_calls(), 0);
}

#[tokio::test]
async fn test_missing_record_counts_once_as_not_exist() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let stale = position(&t, 1, Side::Long, Some(10), None);
    let ledger = Arc::new(
        base.with_stale_position(stale.clone())
            .with_liquidation_state(&stale.key(), LiquidationState::LIQUIDATABLE)
            .with_pnl(&stale.key(), loss(50)),
    );
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.not_exist, 1);
    assert_eq!(outcome.undercollateralized, 0);
    assert_eq!(outcome.trigger_eligible, 0);
    assert_eq!(ledger.calls().liquidation_state, 0);
    assert_eq!(ledger.calls().pnl, 0);
    assert_eq!(ledger.calls().liquidate, 0);
}

#[tokio::test]
async fn test_no_double_liquidation_across_cycles() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p = position(&t, 1, Side::Long, None, None);
    let ledger = Arc::new(
        base.with_position(p.clone())
            .with_liquidation_state(&p.key(), LiquidationState::LIQUIDATABLE),
    );
    let mut s = scheduler(&ledger, t, 1);

    let first = completed(s.tick().await);
    assert_eq!(first.liquidated, 1);

    let second = completed(s.tick().await);
    assert_eq!(second.total, 0);
    assert_eq!(second.liquidated, 0);
    assert_eq!(ledger.calls().liquidate, 1);
    assert_eq!(ledger.liquidated(), vec![p.key()]);
}

#[tokio::test]
async fn test_rescan_without_changes_is_idempotent() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p1 = position(&t, 1, Side::Long, Some(60), Some(60));
    let p2 = position(&t, 2, Side::Short, None, None);
    let ledger = Arc::new(
        base.with_position(p1.clone())
            .with_position(p2)
            .with_pnl(&p1.key(), loss(10)),
    );
    let mut s = scheduler(&ledger, t, 1);

    let first = completed(s.tick().await);
    let second = completed(s.tick().await);
    assert_eq!(first, second);
    assert_eq!(first.total, 2);
    assert_eq!(first.trigger_eligible, 0);
    assert_eq!(ledger.calls().liquidate + ledger.calls().trigger, 0);
}

#[tokio::test]
async fn test_thresholds_met_exactly_trigger() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let stop = position(&t, 1, Side::Long, Some(30), None);
    let take = position(&t, 2, Side::Short, None, Some(30));
    let ledger = Arc::new(
        base.with_position(stop.clone())
            .with_position(take.clone())
            .with_pnl(&stop.key(), loss(30))
            .with_pnl(&take.key(), profit(30)),
    );
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.trigger_eligible, 2);
    assert_eq!(outcome.triggered, 2);
}

#[tokio::test]
async fn test_positions_without_limits_never_fetch_prices() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let ledger = Arc::new(
        base.with_position(position(&t, 1, Side::Long, None, None))
            .with_position(position(&t, 2, Side::Short, None, None)),
    );
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.total, 2);
    assert_eq!(ledger.calls().pnl, 0);
    assert_eq!(ledger.calls().exit_price, 0);
    assert_eq!(ledger.calls().trigger, 0);
}

#[tokio::test]
async fn test_rejected_dispatch_does_not_abort_cycle() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p1 = position(&t, 1, Side::Long, None, None);
    let p2 = position(&t, 2, Side::Long, None, None);
    let ledger = Arc::new(
        base.with_position(p1.clone())
            .with_position(p2.clone())
            .with_liquidation_state(&p1.key(), LiquidationState::LIQUIDATABLE)
            .with_liquidation_state(&p2.key(), LiquidationState::LIQUIDATABLE)
            .with_failure(
                MockMethod::Liquidate,
                Some(&p1.key()),
                GatewayError::Rejected {
                    code: 6001,
                    message: "StalePrice".to_string(),
                },
            ),
    );
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.undercollateralized, 2);
    assert_eq!(outcome.liquidated, 1);
    assert_eq!(outcome.liquidation_failures, 1);
    assert_eq!(ledger.liquidated(), vec![p2.key()]);
}

#[tokio::test]
async fn test_list_failure_fails_cycle_but_not_scheduler() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let ledger = Arc::new(base.with_failure(
        MockMethod::ListPositions,
        None,
        GatewayError::Network("connection refused".to_string()),
    ));
    let mut s = scheduler(&ledger, t, 1);

    let tick = s.tick().await;
    assert!(matches!(tick.result, TickResult::ScanFailed(_)));
    assert_eq!(tick.state, SchedulerState::Active);
    assert_eq!(tick.sleep, CYCLE_INTERVAL);

    let tick = s.tick().await;
    assert!(matches!(tick.result, TickResult::ScanFailed(_)));
}

#[tokio::test]
async fn test_liquidation_state_failure_does_not_block_trigger() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p = position(&t, 1, Side::Long, Some(20), None);
    let ledger = Arc::new(
        base.with_position(p.clone())
            .with_failure(
                MockMethod::LiquidationState,
                Some(&p.key()),
                GatewayError::Timeout { after_ms: 1_000 },
            )
            .with_pnl(&p.key(), loss(35)),
    );
    let mut s = scheduler(&ledger, t, 1);

    let outcome = completed(s.tick().await);
    assert_eq!(outcome.liquidation_state_errors, 1);
    assert_eq!(outcome.trigger_eligible, 1);
    assert_eq!(outcome.triggered, 1);
    assert_eq!(ledger.calls().liquidate, 0);
    assert_eq!(ledger.triggered()[0].0, p.key());
}

#[tokio::test]
async fn test_position_closed_by_owner_drops_out_of_next_cycle() {
    let base = MockLedger::new().with_pool("main", &[mint()]);
    let t = target(&base);
    let p1 = position(&t, 1, Side::Long, None, None);
    let p2 = position(&t, 2, Side::Short, None, None);
    let ledger = Arc::new(base.with_position(p1.clone()).with_position(p2));
    let mut s = scheduler(&ledger, t, 1);

    assert_eq!(completed(s.tick().await).total, 2);

    ledger.close_position(&p1.key());
    let outcome = completed(s.tick().await);
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.not_exist, 0);
    assert_eq!(ledger.open_positions().len(), 1);
}
