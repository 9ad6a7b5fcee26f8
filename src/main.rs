// =============================================================================
// warchest-core — autonomous trade-management daemon entry point
// =============================================================================
//
// Bootstraps the hub coordinator, loads strategy documents, and starts one
// SellOps controller per wallet declared on the CLI. Runs until SIGINT or
// SIGTERM (spec §4.1, §6).
// =============================================================================

mod chain;
mod cli;
mod config;
mod decision;
mod error;
mod evaluation;
mod hub;
mod indicators;
mod sellops;
mod store;
mod strategy;
mod tx_monitor;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::chain::data::DexscreenerDataClient;
use crate::chain::rpc::JsonRpcChainClient;
use crate::chain::swap::HttpSwapExecutor;
use crate::cli::Cli;
use crate::config::DaemonConfig;
use crate::hub::coordinator::HubCoordinator;
use crate::hub::events::FileHudSink;
use crate::sellops::controller::SellOpsController;
use crate::store::sqlite::SqliteStore;
use crate::strategy::document::StrategyBook;

const DEFAULT_RPC_ENDPOINT: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_SWAP_ENDPOINT: &str = "http://127.0.0.1:8899/swap";
const DEFAULT_DB_PATH: &str = "warchest.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "fatal error during bootstrap");
        std::process::exit(1);
    }

    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args()?;

    info!(
        wallets = cli.wallets.len(),
        hud = cli.hud,
        follow_hub = cli.follow_hub,
        "warchest-core starting"
    );

    let mut config = DaemonConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, path = %cli.config.display(), "failed to load daemon config, using defaults");
        DaemonConfig::default()
    });
    config.apply_env_overrides();
    let config = Arc::new(config);

    let book = Arc::new(StrategyBook::load_dir(&cli.strategy_dir)?);

    let db_path = config.status_dir.join(DEFAULT_DB_PATH);
    let store: Arc<dyn store::Store> = Arc::new(SqliteStore::open(&db_path)?);

    // WARCHEST_DATA_ENDPOINT / WARCHEST_WALLET_IDS / WARCHEST_BOOTYBOX_PATH
    // are recognised worker-task env vars (spec §6) with no daemon-side
    // plumbing of their own; they are read by the collaborators they name
    // when those collaborators need them.
    let data_client = Arc::new(DexscreenerDataClient::new());

    let rpc_endpoint =
        std::env::var("WARCHEST_RPC_ENDPOINT").unwrap_or_else(|_| DEFAULT_RPC_ENDPOINT.to_string());
    let chain_client = Arc::new(JsonRpcChainClient::new(rpc_endpoint));

    let swap_endpoint =
        std::env::var("WARCHEST_SWAP_ENDPOINT").unwrap_or_else(|_| DEFAULT_SWAP_ENDPOINT.to_string());
    let swap_executor = Arc::new(HttpSwapExecutor::new(swap_endpoint));

    let hud = Arc::new(FileHudSink::new(
        cli.hub_events.clone(),
        cli.hud_state.clone(),
        config.hud_max_events,
    ));

    let job_payload_dir = config.status_dir.join(&config.job_payload_dir);
    let hub_coordinator = HubCoordinator::with_payload_dir(hud.clone(), job_payload_dir);

    let mut controllers = Vec::with_capacity(cli.wallets.len());
    for wallet in &cli.wallets {
        let controller = Arc::new(SellOpsController::new(
            wallet.clone(),
            Arc::clone(&config),
            Arc::clone(&book),
            Arc::clone(&store),
            data_client.clone() as Arc<dyn chain::PriceFeed>,
            data_client.clone() as Arc<dyn chain::ChartFeed>,
            chain_client.clone() as Arc<dyn chain::ChainClient>,
            swap_executor.clone() as Arc<dyn chain::SwapExecutor>,
            hud.clone() as Arc<dyn hub::events::HudEventSink>,
            Arc::clone(&hub_coordinator),
        ));
        controller.start();
        controllers.push(controller);
    }

    info!(count = controllers.len(), "sellops controllers started, running until shutdown signal");

    for controller in &controllers {
        let controller = Arc::clone(controller);
        hub_coordinator
            .register_cleanup(move || {
                let controller = Arc::clone(&controller);
                async move {
                    controller.stop("shutdown").await;
                }
            })
            .await;
    }

    hub_coordinator.run_until_signal().await;

    info!("warchest-core shut down complete");
    Ok(())
}
