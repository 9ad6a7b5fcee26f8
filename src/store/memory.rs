//! An in-memory [`Store`] implementation, used by tests and by `--observe`
//! runs that have no backing database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::evaluation::snapshot::{
    CoinInfo, EventsSnapshot, EvaluationSnapshot, PnlInfo, PoolInfo, RiskInfo,
};
use crate::types::PositionSummary;

use super::{Store, TradeEventRecord};

/// In-memory reference store. Concurrent-safe via `DashMap`/`Mutex`, not
/// durable across process restarts.
#[derive(Default)]
pub struct MemoryStore {
    coins: DashMap<String, CoinInfo>,
    pools: DashMap<String, PoolInfo>,
    events: DashMap<String, EventsSnapshot>,
    risk: DashMap<String, RiskInfo>,
    pnl: DashMap<(i64, String), PnlInfo>,
    positions: DashMap<String, PositionSummary>,
    trade_events: Mutex<Vec<TradeEventRecord>>,
    evaluations: Mutex<HashMap<String, EvaluationSnapshot>>,
    next_position_id: Mutex<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_position_id: Mutex::new(1),
            ..Default::default()
        }
    }

    pub fn set_coin(&self, mint: &str, coin: CoinInfo) {
        self.coins.insert(mint.to_string(), coin);
    }

    pub fn set_pool(&self, mint: &str, pool: PoolInfo) {
        self.pools.insert(mint.to_string(), pool);
    }

    pub fn set_events(&self, mint: &str, events: EventsSnapshot) {
        self.events.insert(mint.to_string(), events);
    }

    pub fn set_risk(&self, mint: &str, risk: RiskInfo) {
        self.risk.insert(mint.to_string(), risk);
    }

    pub fn set_pnl(&self, wallet_id: i64, mint: &str, pnl: PnlInfo) {
        self.pnl.insert((wallet_id, mint.to_string()), pnl);
    }

    pub fn seed_open_position(&self, position: PositionSummary) {
        self.positions
            .insert(position.trade_uuid.clone(), position);
    }

    /// Snapshot of every recorded trade event, for callers that need to
    /// assert on what was persisted.
    pub fn trade_events(&self) -> Vec<TradeEventRecord> {
        self.trade_events.lock().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_coin(&self, mint: &str) -> Result<Option<CoinInfo>> {
        Ok(self.coins.get(mint).map(|v| v.clone()))
    }

    async fn load_best_pool(&self, mint: &str) -> Result<Option<PoolInfo>> {
        Ok(self.pools.get(mint).map(|v| v.clone()))
    }

    async fn load_events(&self, mint: &str) -> Result<Option<EventsSnapshot>> {
        Ok(self.events.get(mint).map(|v| v.clone()))
    }

    async fn load_risk(&self, mint: &str) -> Result<Option<RiskInfo>> {
        Ok(self.risk.get(mint).map(|v| v.clone()))
    }

    async fn load_pnl(&self, wallet_id: i64, mint: &str) -> Result<Option<PnlInfo>> {
        Ok(self.pnl.get(&(wallet_id, mint.to_string())).map(|v| v.value().clone()))
    }

    async fn load_open_positions(&self, wallet_id: i64) -> Result<Vec<PositionSummary>> {
        Ok(self
            .positions
            .iter()
            .filter(|e| e.value().wallet_id == wallet_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn insert_evaluation(&self, snapshot: &EvaluationSnapshot) -> Result<()> {
        self.evaluations
            .lock()
            .insert(snapshot.trade_uuid.clone(), snapshot.clone());
        Ok(())
    }

    async fn record_trade_event(&self, event: &TradeEventRecord) -> Result<()> {
        let mut events = self.trade_events.lock();
        if events.iter().any(|e| e.txid == event.txid) {
            return Ok(());
        }
        events.push(event.clone());
        Ok(())
    }

    async fn ensure_open_position_run(
        &self,
        wallet_id: i64,
        mint: &str,
        trade_uuid: &str,
    ) -> Result<PositionSummary> {
        if let Some(existing) = self.positions.get(trade_uuid) {
            return Ok(existing.clone());
        }
        let mut next_id = self.next_position_id.lock();
        let position_id = *next_id;
        *next_id += 1;
        let now = Utc::now();
        let position = PositionSummary {
            position_id,
            wallet_id,
            mint: mint.to_string(),
            trade_uuid: trade_uuid.to_string(),
            strategy_name: None,
            opened_at: now,
            last_trade_at: now,
            current_token_amount: 0.0,
            entry_price_sol: 0.0,
            entry_price_usd: 0.0,
            source: "memory".to_string(),
        };
        self.positions.insert(trade_uuid.to_string(), position.clone());
        Ok(position)
    }

    async fn close_position(&self, trade_uuid: &str) -> Result<()> {
        self.positions.remove(trade_uuid);
        Ok(())
    }
}
