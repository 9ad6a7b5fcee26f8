//! Collaborator traits the daemon depends on but treats as out of scope
//! (spec §1): chain reads, price/chart feeds, and swap submission. These are
//! the seams real infrastructure plugs into; this module ships thin,
//! reqwest-based defaults behind them.

pub mod data;
pub mod rpc;
pub mod swap;

use async_trait::async_trait;

use crate::error::Result;
use crate::evaluation::snapshot::Candle;

/// Read-only access to confirmed on-chain transactions, used by the
/// transaction monitor's polling fallback.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch the confirmation status of `txid`. `Ok(None)` means the
    /// transaction has not landed yet (keep polling); `Ok(Some(true))` means
    /// it landed successfully; `Ok(Some(false))` means it landed but failed.
    async fn get_confirmation_status(&self, txid: &str) -> Result<Option<bool>>;

    /// Fetch the slot, on-chain error (if any), and wallet/token balance
    /// deltas a transaction produced. Called once a terminal status is known
    /// so the monitor can attach `slot`/`err` to the HUD event and recover
    /// buy/sell/transfer insight from the deltas.
    async fn get_transaction_detail(&self, txid: &str) -> Result<TransactionDetail>;
}

/// One balance-changing effect of a confirmed transaction.
#[derive(Debug, Clone)]
pub struct BalanceDelta {
    pub mint: String,
    pub amount: f64,
    pub is_sol: bool,
}

/// Detail recovered about a terminal transaction: its slot, block time, the
/// on-chain error message when it failed, and the balance deltas it
/// produced (empty when it failed, since a failed transaction has no
/// settled deltas).
#[derive(Debug, Clone, Default)]
pub struct TransactionDetail {
    pub slot: Option<u64>,
    /// Unix seconds the block was produced at, used as `executedAt` (spec
    /// §4.6 step 2: `executedAt=blockTime·1000`).
    pub block_time: Option<i64>,
    pub err: Option<String>,
    pub deltas: Vec<BalanceDelta>,
}

/// Live price/metadata lookups for a mint.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price_usd(&self, mint: &str) -> Result<Option<f64>>;

    /// Fetch prices for a batch of mints in one logical call (spec §4.5 fast
    /// loop step 3: "single batch call"). The default falls back to one
    /// `get_price_usd` call per mint for implementations that have no
    /// cheaper batched endpoint; a real price API client should override
    /// this with its actual multi-mint request.
    async fn get_prices_usd(&self, mints: &[String]) -> Result<Vec<(String, Option<f64>)>> {
        let mut out = Vec::with_capacity(mints.len());
        for mint in mints {
            let price = self.get_price_usd(mint).await.unwrap_or(None);
            out.push((mint.clone(), price));
        }
        Ok(out)
    }
}

/// OHLCV chart data for a mint, used to compute indicators.
#[async_trait]
pub trait ChartFeed: Send + Sync {
    async fn get_candles(&self, mint: &str, limit: usize) -> Result<Vec<Candle>>;
}

/// Submits a trim/exit swap for a position. Execution is out of scope for
/// this daemon's own retry/backoff policy — the implementation behind this
/// trait owns transaction construction, signing, and submission.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn submit_sell(
        &self,
        wallet_pubkey: &str,
        mint: &str,
        token_amount: f64,
    ) -> Result<SwapSubmission>;
}

/// The txid plus the opaque quote blob a swap submission produced (spec §3's
/// "Tx-monitor job" row: `swapQuote (opaque)`). The quote is forwarded
/// untouched into the persisted trade event's pricing fields and the HUD
/// payload; this daemon never interprets its shape.
#[derive(Debug, Clone)]
pub struct SwapSubmission {
    pub txid: String,
    pub quote: Option<serde_json::Value>,
}
