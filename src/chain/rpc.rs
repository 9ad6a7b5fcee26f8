//! A raw JSON-RPC [`ChainClient`], grounded on the teacher pack's own
//! hand-rolled JSON-RPC request bodies (e.g. `tom14cat14-elite-mev-bot`'s
//! Jito bundle client) but speaking the standard Solana `getSignatureStatuses`
//! / `getTransaction` methods over plain `reqwest`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{CoreError, Result};

use super::{BalanceDelta, ChainClient, TransactionDetail};

pub struct JsonRpcChainClient {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonRpcChainClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        if let Some(err) = value.get("error") {
            return Err(CoreError::Transient(format!("rpc error: {err}")));
        }
        value
            .get("result")
            .cloned()
            .ok_or_else(|| CoreError::Transient("rpc response missing result".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenBalance {
    mint: String,
    owner: Option<String>,
    #[serde(rename = "uiTokenAmount")]
    ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
struct UiTokenAmount {
    #[serde(rename = "uiAmount")]
    ui_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    err: Option<serde_json::Value>,
    #[serde(rename = "preBalances")]
    pre_balances: Option<Vec<i64>>,
    #[serde(rename = "postBalances")]
    post_balances: Option<Vec<i64>>,
    #[serde(rename = "preTokenBalances")]
    pre_token_balances: Option<Vec<TokenBalance>>,
    #[serde(rename = "postTokenBalances")]
    post_token_balances: Option<Vec<TokenBalance>>,
}

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn get_confirmation_status(&self, txid: &str) -> Result<Option<bool>> {
        let result = self
            .call("getSignatureStatuses", json!([[txid], {"searchTransactionHistory": true}]))
            .await?;
        let status = result
            .get("value")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        if status.is_null() {
            return Ok(None);
        }
        let err = status.get("err").filter(|e| !e.is_null());
        Ok(Some(err.is_none()))
    }

    async fn get_transaction_detail(&self, txid: &str) -> Result<TransactionDetail> {
        let result = self
            .call(
                "getTransaction",
                json!([txid, {"encoding": "json", "maxSupportedTransactionVersion": 0}]),
            )
            .await?;
        let slot = result.get("slot").and_then(|v| v.as_u64());
        let block_time = result.get("blockTime").and_then(|v| v.as_i64());
        let meta: Option<Meta> = result
            .get("meta")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| CoreError::Transient(e.to_string()))?;
        let Some(meta) = meta else {
            return Ok(TransactionDetail { slot, block_time, err: None, deltas: Vec::new() });
        };
        let err = meta
            .err
            .as_ref()
            .filter(|e| !e.is_null())
            .map(|e| e.to_string());
        if err.is_some() {
            return Ok(TransactionDetail { slot, block_time, err, deltas: Vec::new() });
        }

        let mut deltas = Vec::new();

        if let (Some(pre), Some(post)) = (&meta.pre_balances, &meta.post_balances) {
            if let (Some(pre0), Some(post0)) = (pre.first(), post.first()) {
                let delta_sol = (post0 - pre0) as f64 / LAMPORTS_PER_SOL;
                if delta_sol.abs() > f64::EPSILON {
                    deltas.push(BalanceDelta {
                        mint: "SOL".to_string(),
                        amount: delta_sol,
                        is_sol: true,
                    });
                }
            }
        }

        if let (Some(pre), Some(post)) = (&meta.pre_token_balances, &meta.post_token_balances) {
            for post_bal in post {
                let pre_amount = pre
                    .iter()
                    .find(|p| p.mint == post_bal.mint && p.owner == post_bal.owner)
                    .and_then(|p| p.ui_token_amount.ui_amount)
                    .unwrap_or(0.0);
                let post_amount = post_bal.ui_token_amount.ui_amount.unwrap_or(0.0);
                let delta = post_amount - pre_amount;
                if delta.abs() > f64::EPSILON {
                    deltas.push(BalanceDelta {
                        mint: post_bal.mint.clone(),
                        amount: delta,
                        is_sol: false,
                    });
                }
            }
        }

        Ok(TransactionDetail { slot, block_time, err: None, deltas })
    }
}
