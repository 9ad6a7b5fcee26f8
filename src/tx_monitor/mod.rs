//! The transaction monitor (spec §4.6): a subscribed -> polling -> terminal
//! state machine watching one submitted transaction to resolution.

pub mod insight;

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use chrono::{TimeZone, Utc};
use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::error::{CoreError, Result};
use crate::hub::events::{HudEventSink, HudPayload};
use crate::store::{Store, TradeEventRecord};
use crate::tx_monitor::insight::recover_insight;
use crate::types::Side;

const DEFAULT_MAX_ATTEMPTS: u32 = 40;
const DEFAULT_POLL_GAP: Duration = Duration::from_millis(1_500);

/// Terminal outcome of watching a transaction to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed,
    Failed,
    /// Polling was exhausted without a terminal status — treated as
    /// "processed" for HUD purposes, not as an error (spec §4.6).
    TimedOut,
}

impl TxOutcome {
    pub fn status_category(self) -> &'static str {
        match self {
            TxOutcome::Confirmed => "confirmed",
            TxOutcome::Failed => "failed",
            TxOutcome::TimedOut => "processed",
        }
    }
}

/// Validate a transaction id as a base58 string of plausible Solana
/// signature length (spec §4.6).
pub fn validate_txid(txid: &str) -> Result<()> {
    if !(32..=88).contains(&txid.len()) {
        return Err(CoreError::InvalidInput(format!(
            "txid length {} outside the valid 32-88 char range",
            txid.len()
        )));
    }
    bs58::decode(txid)
        .into_vec()
        .map_err(|e| CoreError::InvalidInput(format!("txid is not valid base58: {e}")))?;
    Ok(())
}

/// Identifies the position a watched transaction belongs to, carried through
/// to the persisted trade event and the HUD `TxStatus` payload (spec §3's
/// "Tx-monitor job" row: `walletPubkey, walletId, mint, side, size`).
#[derive(Debug, Clone)]
pub struct TxContext {
    pub wallet_id: i64,
    pub wallet_alias: String,
    pub mint: String,
    pub trade_uuid: String,
    pub side: Side,
    pub size: f64,
}

/// Watches `txid` to a terminal outcome, recovers trade insight on success,
/// and persists a best-effort record via `store`.
pub struct TxMonitor {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    hud: Arc<dyn HudEventSink>,
    max_attempts: u32,
}

impl TxMonitor {
    pub fn new(chain: Arc<dyn ChainClient>, store: Arc<dyn Store>, hud: Arc<dyn HudEventSink>) -> Self {
        Self {
            chain,
            store,
            hud,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the polling attempt budget (default 40). Exposed mainly for
    /// tests that need retry exhaustion to happen quickly.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Watch `txid` to resolution. `context` identifies the position the
    /// transaction belongs to, used for persistence and for the HUD event's
    /// `context` fields; `swap_quote` is the opaque quote blob the swap
    /// submission path returned, forwarded best-effort into both the
    /// persisted trade event's pricing fields and the HUD payload.
    pub async fn watch(
        &self,
        txid: &str,
        context: &TxContext,
        swap_quote: Option<serde_json::Value>,
    ) -> Result<TxOutcome> {
        validate_txid(txid)?;

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(DEFAULT_POLL_GAP)
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(None)
            .build();

        let mut attempts = 0u32;
        let outcome = loop {
            attempts += 1;
            match self.chain.get_confirmation_status(txid).await {
                Ok(Some(true)) => break TxOutcome::Confirmed,
                Ok(Some(false)) => break TxOutcome::Failed,
                Ok(None) => {
                    if attempts >= self.max_attempts {
                        break TxOutcome::TimedOut;
                    }
                    tokio::time::sleep(DEFAULT_POLL_GAP).await;
                }
                Err(e) if e.is_retryable() => {
                    if attempts >= self.max_attempts {
                        // Every attempt in this run ended in a transient error —
                        // this is retry-budget exhaustion, not a quiet timeout
                        // waiting for an event that never arrived (spec §7/§8 S6).
                        return Err(CoreError::RetryExhausted {
                            attempts,
                            last: e.to_string(),
                        });
                    }
                    let delay = backoff.next_backoff().unwrap_or(DEFAULT_POLL_GAP);
                    warn!(txid, attempt = attempts, error = %e, "transient error polling tx status, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        // Fetch slot/err/deltas for both terminal statuses that actually
        // landed on chain; a timeout never reached a terminal RPC result.
        let detail = if outcome != TxOutcome::TimedOut {
            self.chain.get_transaction_detail(txid).await.ok()
        } else {
            None
        };

        let insight = detail
            .as_ref()
            .filter(|_| outcome == TxOutcome::Confirmed)
            .and_then(|d| recover_insight(&d.deltas));

        if outcome == TxOutcome::Confirmed {
            match &insight {
                Some(insight) => {
                    let quote_f64 = |key: &str| swap_quote.as_ref().and_then(|q| q.get(key)).and_then(|v| v.as_f64());
                    let price_sol_per_token = if insight.token_delta.abs() > f64::EPSILON {
                        Some((insight.sol_delta / insight.token_delta).abs())
                    } else {
                        None
                    };
                    let executed_at = detail
                        .as_ref()
                        .and_then(|d| d.block_time)
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
                    let record = TradeEventRecord {
                        wallet_id: context.wallet_id,
                        wallet_alias: context.wallet_alias.clone(),
                        mint: context.mint.clone(),
                        trade_uuid: context.trade_uuid.clone(),
                        side: insight.side,
                        token_delta: insight.token_delta,
                        sol_delta: insight.sol_delta,
                        txid: txid.to_string(),
                        price_sol_per_token,
                        price_usd_per_token: quote_f64("priceUsdPerToken"),
                        sol_usd_price: quote_f64("solUsdPrice"),
                        fees_sol: quote_f64("feesSol"),
                        fees_usd: quote_f64("feesUsd"),
                        slippage_pct: quote_f64("slippagePct"),
                        price_impact_pct: quote_f64("priceImpactPct"),
                        executed_at,
                        recorded_at: Utc::now(),
                    };
                    if let Err(e) = self.store.record_trade_event(&record).await {
                        warn!(txid, error = %e, "failed to persist recovered trade event");
                    }
                }
                None => info!(txid, "transaction confirmed but no tradeable insight recovered"),
            }
        }

        self.hud.emit(HudPayload::TxStatus {
            txid: txid.to_string(),
            status_category: outcome.status_category().to_string(),
            trade_uuid: Some(context.trade_uuid.clone()),
            wallet_alias: context.wallet_alias.clone(),
            mint: context.mint.clone(),
            side: context.side,
            size: context.size,
            slot: detail.as_ref().and_then(|d| d.slot),
            err: detail.as_ref().and_then(|d| d.err.clone()),
            insight,
            swap_quote,
            at: Utc::now(),
        });

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TransactionDetail;
    use crate::hub::events::HudPayload;
    use crate::store::memory::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn validate_txid_rejects_too_short() {
        assert!(validate_txid("short").is_err());
    }

    #[test]
    fn validate_txid_rejects_non_base58() {
        let candidate = "0".repeat(44); // '0' is not in the base58 alphabet
        assert!(validate_txid(&candidate).is_err());
    }

    #[test]
    fn validate_txid_accepts_plausible_signature() {
        let sig = bs58::encode(vec![7u8; 64]).into_string();
        assert!(validate_txid(&sig).is_ok());
    }

    struct AlwaysTransientChain {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ChainClient for AlwaysTransientChain {
        async fn get_confirmation_status(&self, _txid: &str) -> Result<Option<bool>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Transient("rpc node overloaded".to_string()))
        }

        async fn get_transaction_detail(&self, _txid: &str) -> Result<TransactionDetail> {
            Ok(TransactionDetail::default())
        }
    }

    struct NullHud;
    impl HudEventSink for NullHud {
        fn emit(&self, _payload: HudPayload) {}
    }

    #[tokio::test]
    async fn retry_exhaustion_propagates_after_exact_attempt_count() {
        let chain = Arc::new(AlwaysTransientChain {
            calls: AtomicU32::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let hud = Arc::new(NullHud);
        let monitor = TxMonitor::new(chain.clone(), store, hud).with_max_attempts(2);

        let sig = bs58::encode(vec![9u8; 64]).into_string();
        let context = TxContext {
            wallet_id: 1,
            wallet_alias: "w1".to_string(),
            mint: "MintAAA".to_string(),
            trade_uuid: "trade-1".to_string(),
            side: Side::Sell,
            size: 100.0,
        };
        let result = monitor.watch(&sig, &context, None).await;

        assert!(matches!(result, Err(CoreError::RetryExhausted { attempts: 2, .. })));
        assert_eq!(chain.calls.load(Ordering::SeqCst), 2);
    }

    struct ConfirmedChain;

    #[async_trait::async_trait]
    impl ChainClient for ConfirmedChain {
        async fn get_confirmation_status(&self, _txid: &str) -> Result<Option<bool>> {
            Ok(Some(true))
        }

        async fn get_transaction_detail(&self, _txid: &str) -> Result<TransactionDetail> {
            Ok(TransactionDetail {
                slot: Some(42),
                block_time: Some(1_700_000_000),
                err: None,
                deltas: vec![
                    crate::chain::BalanceDelta { mint: "SOL".to_string(), amount: 1.0, is_sol: true },
                    crate::chain::BalanceDelta { mint: "MintAAA".to_string(), amount: -1000.0, is_sol: false },
                ],
            })
        }
    }

    #[derive(Default)]
    struct CapturingHud {
        last: parking_lot::Mutex<Option<HudEvent>>,
    }

    impl HudEventSink for CapturingHud {
        fn emit(&self, payload: HudPayload) {
            *self.last.lock() = Some((&payload).into());
        }
    }

    #[tokio::test]
    async fn confirmed_tx_persists_trade_event_and_embeds_insight_in_hud() {
        use crate::hub::events::HudEvent;

        let chain = Arc::new(ConfirmedChain);
        let store = Arc::new(MemoryStore::new());
        let hud = Arc::new(CapturingHud::default());
        let monitor = TxMonitor::new(chain, store.clone(), hud.clone());

        let sig = bs58::encode(vec![3u8; 64]).into_string();
        let context = TxContext {
            wallet_id: 1,
            wallet_alias: "w1".to_string(),
            mint: "MintAAA".to_string(),
            trade_uuid: "trade-1".to_string(),
            side: Side::Sell,
            size: 1000.0,
        };
        let quote = serde_json::json!({"slippagePct": 0.5, "feesSol": 0.001});
        let outcome = monitor.watch(&sig, &context, Some(quote)).await.unwrap();
        assert_eq!(outcome, TxOutcome::Confirmed);

        let events = store.trade_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].wallet_alias, "w1");
        assert_eq!(events[0].slippage_pct, Some(0.5));
        assert!(events[0].price_sol_per_token.unwrap() > 0.0);

        let last = hud.last.lock().clone().unwrap();
        assert_eq!(last.payload["slot"], 42);
        assert!(last.payload["insight"].is_object());
    }
}
