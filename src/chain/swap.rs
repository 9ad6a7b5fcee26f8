//! A thin [`SwapExecutor`] that delegates to an external swap-submission
//! service over HTTP. Transaction construction, signing, and submission are
//! explicitly out of scope for this daemon (spec §1) — this client only
//! shapes the request and reports back the resulting txid.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{CoreError, Result};

use super::{SwapExecutor, SwapSubmission};

#[derive(Debug, Deserialize)]
struct SubmitSellResponse {
    txid: String,
    #[serde(default)]
    quote: Option<serde_json::Value>,
}

pub struct HttpSwapExecutor {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSwapExecutor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SwapExecutor for HttpSwapExecutor {
    async fn submit_sell(
        &self,
        wallet_pubkey: &str,
        mint: &str,
        token_amount: f64,
    ) -> Result<SwapSubmission> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "wallet": wallet_pubkey,
                "mint": mint,
                "side": "sell",
                "tokenAmount": token_amount,
            }))
            .send()
            .await
            .map_err(|e| CoreError::SideEffectFailure(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CoreError::SideEffectFailure(format!(
                "swap submission returned status {}",
                resp.status()
            )));
        }

        let parsed: SubmitSellResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::SideEffectFailure(e.to_string()))?;
        Ok(SwapSubmission { txid: parsed.txid, quote: parsed.quote })
    }
}
