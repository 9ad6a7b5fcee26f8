//! The `Store` trait — the daemon's only persistence seam (spec §1's
//! out-of-scope collaborators list; spec §3).
//!
//! Every subsystem reads and writes through this trait rather than touching
//! a database directly, so the evaluation engine and sellops controller can
//! be tested against [`memory::MemoryStore`] without a real database.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::evaluation::snapshot::{CoinInfo, EventsSnapshot, PoolInfo, RiskInfo};
use crate::error::Result;
use crate::types::PositionSummary;

/// A single recovered trade event, persisted after a transaction resolves
/// (spec §4.6's "Recovered insight" row and §4.6 step 2's `buildTradeEvent`).
#[derive(Debug, Clone)]
pub struct TradeEventRecord {
    pub wallet_id: i64,
    pub wallet_alias: String,
    pub mint: String,
    pub trade_uuid: String,
    pub side: crate::types::Side,
    pub token_delta: f64,
    pub sol_delta: f64,
    pub txid: String,
    /// `solDelta / tokenDelta`, when both are known and non-zero.
    pub price_sol_per_token: Option<f64>,
    pub price_usd_per_token: Option<f64>,
    pub sol_usd_price: Option<f64>,
    pub fees_sol: Option<f64>,
    pub fees_usd: Option<f64>,
    pub slippage_pct: Option<f64>,
    pub price_impact_pct: Option<f64>,
    /// `blockTime * 1000`, when the chain client surfaced a block time.
    pub executed_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

/// The narrow persistence seam every subsystem reads and writes through.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_coin(&self, mint: &str) -> Result<Option<CoinInfo>>;
    async fn load_best_pool(&self, mint: &str) -> Result<Option<PoolInfo>>;
    async fn load_events(&self, mint: &str) -> Result<Option<EventsSnapshot>>;
    async fn load_risk(&self, mint: &str) -> Result<Option<RiskInfo>>;
    async fn load_pnl(
        &self,
        wallet_id: i64,
        mint: &str,
    ) -> Result<Option<crate::evaluation::snapshot::PnlInfo>>;

    /// All currently open positions for a wallet.
    async fn load_open_positions(&self, wallet_id: i64) -> Result<Vec<PositionSummary>>;

    /// Persist a fully composed evaluation snapshot, keyed by tradeUuid.
    async fn insert_evaluation(
        &self,
        snapshot: &crate::evaluation::snapshot::EvaluationSnapshot,
    ) -> Result<()>;

    /// Record a recovered trade event. Best-effort: failures are logged by
    /// the caller, not propagated as fatal.
    async fn record_trade_event(&self, event: &TradeEventRecord) -> Result<()>;

    /// Ensure a position row exists and is marked open for `trade_uuid`,
    /// returning its current summary.
    async fn ensure_open_position_run(
        &self,
        wallet_id: i64,
        mint: &str,
        trade_uuid: &str,
    ) -> Result<PositionSummary>;

    /// Mark a position closed (spec §4.2's close-detection diff).
    async fn close_position(&self, trade_uuid: &str) -> Result<()>;
}
