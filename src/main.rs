use anyhow::Context;
use clap::{Parser, Subcommand};
use perp_keeper::domain::{Address, Amount, PoolName, Position, Side};
use perp_keeper::gateway::{
    AddressDeriver, HttpLedgerClient, LedgerGateway, LiquidationState, MockLedger, ProfitAndLoss,
    ValuationOracle,
};
use perp_keeper::orchestration::{
    resolve_target, LookupPolicy, Scheduler, SchedulerSettings, StatusBoard,
};
use perp_keeper::{api, Config};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "perp-keeper")]
#[command(about = "Liquidation and stop-loss/take-profit keeper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor one pool custody until interrupted
    Run {
        /// Pool name, as registered on the ledger
        pool_name: String,
        /// Mint of the custody to monitor (hex)
        custody_mint: String,
        /// Run against an in-memory ledger seeded with demo positions
        #[arg(long, env = "KEEPER_DRY_RUN")]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            pool_name,
            custody_mint,
            dry_run,
        } => run(PoolName::new(pool_name), &custody_mint, dry_run).await,
    }
}

async fn run(pool_name: PoolName, custody_mint: &str, dry_run: bool) -> anyhow::Result<()> {
    let mint = Address::parse(custody_mint).context("Invalid custody mint")?;

    let config;
    let ledger: Arc<dyn LedgerGateway>;
    let oracle: Arc<dyn ValuationOracle>;
    if dry_run {
        tracing::info!("Dry run: using in-memory ledger");
        let mock = Arc::new(demo_ledger(&pool_name, &mint));
        config = Config::dry_run();
        ledger = mock.clone();
        oracle = mock;
    } else {
        config = Config::from_env().context("Configuration error")?;
        let client = Arc::new(HttpLedgerClient::new(
            config.ledger_rpc_url.clone(),
            AddressDeriver::new(config.program_id.clone()),
            config.call_timeout,
        ));
        ledger = client.clone();
        oracle = client;
    }

    let target = match resolve_target(
        ledger.as_ref(),
        &pool_name,
        &mint,
        &config.keeper_address,
        LookupPolicy::from_config(&config),
    )
    .await
    {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(error = %e, "Bootstrap failed");
            return Err(e.into());
        }
    };

    let status = StatusBoard::new(&target);
    if let Some(port) = config.status_port {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        let app = api::create_router(api::AppState::new(status.clone()));
        tracing::info!("Status API listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Status API stopped");
            }
        });
    }

    let mut scheduler = Scheduler::new(
        ledger,
        oracle,
        target,
        SchedulerSettings::from_config(&config),
    )
    .with_status(status);
    scheduler.run_until(tokio::signal::ctrl_c()).await;
    Ok(())
}

/// In-memory ledger with one healthy, one under-collateralized and one
/// stop-loss-crossed position.
fn demo_ledger(pool_name: &PoolName, mint: &Address) -> MockLedger {
    let ledger = MockLedger::new().with_pool(pool_name.as_str(), std::slice::from_ref(mint));
    let pool = ledger.deriver().pool(pool_name);
    let custody = ledger.deriver().custody(&pool, mint);

    let position = |owner: u8, side: Side, stop_loss: Option<u64>| Position {
        owner: Address::from_bytes([owner; 32]),
        pool: pool.clone(),
        custody: custody.clone(),
        side,
        open_time: 1_700_000_000,
        update_time: 1_700_000_000,
        price: Amount::from_units(100),
        size_usd: Amount::from_units(1_000),
        collateral_usd: Amount::from_units(100),
        collateral_amount: Amount::from_units(1),
        stop_loss: stop_loss.map(Amount::from_units),
        take_profit: None,
    };
    let healthy = position(1, Side::Long, None);
    let underwater = position(2, Side::Short, None);
    let stopped = position(3, Side::Long, Some(20));

    ledger
        .with_liquidation_state(&underwater.key(), LiquidationState::LIQUIDATABLE)
        .with_pnl(
            &stopped.key(),
            ProfitAndLoss {
                profit: Amount::zero(),
                loss: Amount::from_units(25),
            },
        )
        .with_position(healthy)
        .with_position(underwater)
        .with_position(stopped)
}
