//! A `rusqlite`-backed [`Store`] implementation for durable single-node
//! deployments.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::evaluation::snapshot::{
    CoinInfo, EventsSnapshot, EvaluationSnapshot, PnlInfo, PoolInfo, RiskInfo,
};
use crate::types::PositionSummary;

use super::{Store, TradeEventRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS coins (
    mint TEXT PRIMARY KEY,
    price_usd REAL NOT NULL,
    price_sol REAL,
    last_updated INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS pools (
    mint TEXT PRIMARY KEY,
    address TEXT NOT NULL,
    liquidity_usd REAL NOT NULL,
    last_updated INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS pnl (
    wallet_id INTEGER NOT NULL,
    mint TEXT NOT NULL,
    avg_cost_usd REAL NOT NULL,
    realized_usd REAL NOT NULL,
    PRIMARY KEY (wallet_id, mint)
);
CREATE TABLE IF NOT EXISTS positions (
    position_id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet_id INTEGER NOT NULL,
    mint TEXT NOT NULL,
    trade_uuid TEXT NOT NULL UNIQUE,
    strategy_name TEXT,
    opened_at INTEGER NOT NULL,
    last_trade_at INTEGER NOT NULL,
    current_token_amount REAL NOT NULL,
    entry_price_sol REAL NOT NULL,
    entry_price_usd REAL NOT NULL,
    is_open INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS trade_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet_id INTEGER NOT NULL,
    wallet_alias TEXT NOT NULL,
    mint TEXT NOT NULL,
    trade_uuid TEXT NOT NULL,
    side TEXT NOT NULL,
    token_delta REAL NOT NULL,
    sol_delta REAL NOT NULL,
    txid TEXT NOT NULL,
    price_sol_per_token REAL,
    price_usd_per_token REAL,
    sol_usd_price REAL,
    fees_sol REAL,
    fees_usd REAL,
    slippage_pct REAL,
    price_impact_pct REAL,
    executed_at INTEGER,
    recorded_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS trade_events_txid_idx ON trade_events (txid);
CREATE TABLE IF NOT EXISTS evaluations (
    trade_uuid TEXT PRIMARY KEY,
    snapshot_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
";

/// SQLite-backed store, guarded by a single mutex the same way the teacher's
/// `DatabaseTracker` wraps its `Connection`.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::StoreUnavailable(format!("failed to create data directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CoreError::StoreUnavailable(format!("failed to open database: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| CoreError::StoreUnavailable(format!("failed to init schema: {e}")))?;
        info!(path = %path.display(), "sqlite store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn map_rusqlite<T>(result: rusqlite::Result<T>) -> Result<T> {
        result.map_err(|e| CoreError::StoreUnavailable(e.to_string()))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load_coin(&self, mint: &str) -> Result<Option<CoinInfo>> {
        let conn = self.conn.lock();
        let row = Self::map_rusqlite(
            conn.query_row(
                "SELECT price_usd, price_sol, last_updated FROM coins WHERE mint = ?1",
                params![mint],
                |r| {
                    let ts: i64 = r.get(2)?;
                    Ok(CoinInfo {
                        price_usd: r.get(0)?,
                        price_sol: r.get(1)?,
                        last_updated: Utc.timestamp_millis_opt(ts).single().unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional(),
        )?;
        Ok(row)
    }

    async fn load_best_pool(&self, mint: &str) -> Result<Option<PoolInfo>> {
        let conn = self.conn.lock();
        let row = Self::map_rusqlite(
            conn.query_row(
                "SELECT address, liquidity_usd, last_updated FROM pools WHERE mint = ?1",
                params![mint],
                |r| {
                    let ts: i64 = r.get(2)?;
                    Ok(PoolInfo {
                        address: r.get(0)?,
                        liquidity_usd: r.get(1)?,
                        last_updated: Utc.timestamp_millis_opt(ts).single().unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional(),
        )?;
        Ok(row)
    }

    async fn load_events(&self, _mint: &str) -> Result<Option<EventsSnapshot>> {
        // Interval event counters are sourced from the chain data feed, not
        // persisted locally; the store has no events table to query.
        Ok(None)
    }

    async fn load_risk(&self, _mint: &str) -> Result<Option<RiskInfo>> {
        // Risk metadata is sourced live from the chain data feed.
        Ok(None)
    }

    async fn load_pnl(&self, wallet_id: i64, mint: &str) -> Result<Option<PnlInfo>> {
        let conn = self.conn.lock();
        let row = Self::map_rusqlite(
            conn.query_row(
                "SELECT avg_cost_usd, realized_usd FROM pnl WHERE wallet_id = ?1 AND mint = ?2",
                params![wallet_id, mint],
                |r| {
                    Ok(PnlInfo {
                        avg_cost_usd: r.get(0)?,
                        realized_usd: r.get(1)?,
                    })
                },
            )
            .optional(),
        )?;
        Ok(row)
    }

    async fn load_open_positions(&self, wallet_id: i64) -> Result<Vec<PositionSummary>> {
        let conn = self.conn.lock();
        let mut stmt = Self::map_rusqlite(conn.prepare(
            "SELECT position_id, wallet_id, mint, trade_uuid, strategy_name, opened_at,
                    last_trade_at, current_token_amount, entry_price_sol, entry_price_usd
             FROM positions WHERE wallet_id = ?1 AND is_open = 1",
        ))?;
        let rows = Self::map_rusqlite(
            stmt.query_map(params![wallet_id], |r| {
                let opened_at: i64 = r.get(5)?;
                let last_trade_at: i64 = r.get(6)?;
                Ok(PositionSummary {
                    position_id: r.get(0)?,
                    wallet_id: r.get(1)?,
                    mint: r.get(2)?,
                    trade_uuid: r.get(3)?,
                    strategy_name: r.get(4)?,
                    opened_at: Utc
                        .timestamp_millis_opt(opened_at)
                        .single()
                        .unwrap_or_else(Utc::now),
                    last_trade_at: Utc
                        .timestamp_millis_opt(last_trade_at)
                        .single()
                        .unwrap_or_else(Utc::now),
                    current_token_amount: r.get(7)?,
                    entry_price_sol: r.get(8)?,
                    entry_price_usd: r.get(9)?,
                    source: "sqlite".to_string(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>(),
        )?;
        Ok(rows)
    }

    async fn insert_evaluation(&self, snapshot: &EvaluationSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| CoreError::InvalidInput(format!("failed to serialize snapshot: {e}")))?;
        let conn = self.conn.lock();
        Self::map_rusqlite(conn.execute(
            "INSERT INTO evaluations (trade_uuid, snapshot_json, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(trade_uuid) DO UPDATE SET snapshot_json = excluded.snapshot_json,
                                                    created_at = excluded.created_at",
            params![snapshot.trade_uuid, json, Utc::now().timestamp_millis()],
        ))?;
        Ok(())
    }

    async fn record_trade_event(&self, event: &TradeEventRecord) -> Result<()> {
        let conn = self.conn.lock();
        // Idempotent on `txid` (spec's round-trip property: replaying the
        // same confirmed monitor result does not double-record, and the
        // original pricing fields/wallet_alias are preserved on a duplicate).
        Self::map_rusqlite(conn.execute(
            "INSERT INTO trade_events (wallet_id, wallet_alias, mint, trade_uuid, side,
                                        token_delta, sol_delta, txid, price_sol_per_token,
                                        price_usd_per_token, sol_usd_price, fees_sol, fees_usd,
                                        slippage_pct, price_impact_pct, executed_at, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(txid) DO NOTHING",
            params![
                event.wallet_id,
                event.wallet_alias,
                event.mint,
                event.trade_uuid,
                event.side.to_string(),
                event.token_delta,
                event.sol_delta,
                event.txid,
                event.price_sol_per_token,
                event.price_usd_per_token,
                event.sol_usd_price,
                event.fees_sol,
                event.fees_usd,
                event.slippage_pct,
                event.price_impact_pct,
                event.executed_at.map(|t| t.timestamp_millis()),
                event.recorded_at.timestamp_millis(),
            ],
        ))?;
        Ok(())
    }

    async fn ensure_open_position_run(
        &self,
        wallet_id: i64,
        mint: &str,
        trade_uuid: &str,
    ) -> Result<PositionSummary> {
        let now = Utc::now();
        let conn = self.conn.lock();
        Self::map_rusqlite(conn.execute(
            "INSERT OR IGNORE INTO positions
                (wallet_id, mint, trade_uuid, opened_at, last_trade_at,
                 current_token_amount, entry_price_sol, entry_price_usd, is_open)
             VALUES (?1, ?2, ?3, ?4, ?4, 0.0, 0.0, 0.0, 1)",
            params![wallet_id, mint, trade_uuid, now.timestamp_millis()],
        ))?;
        let row = Self::map_rusqlite(conn.query_row(
            "SELECT position_id, wallet_id, mint, trade_uuid, strategy_name, opened_at,
                    last_trade_at, current_token_amount, entry_price_sol, entry_price_usd
             FROM positions WHERE trade_uuid = ?1",
            params![trade_uuid],
            |r| {
                let opened_at: i64 = r.get(5)?;
                let last_trade_at: i64 = r.get(6)?;
                Ok(PositionSummary {
                    position_id: r.get(0)?,
                    wallet_id: r.get(1)?,
                    mint: r.get(2)?,
                    trade_uuid: r.get(3)?,
                    strategy_name: r.get(4)?,
                    opened_at: Utc
                        .timestamp_millis_opt(opened_at)
                        .single()
                        .unwrap_or(now),
                    last_trade_at: Utc
                        .timestamp_millis_opt(last_trade_at)
                        .single()
                        .unwrap_or(now),
                    current_token_amount: r.get(7)?,
                    entry_price_sol: r.get(8)?,
                    entry_price_usd: r.get(9)?,
                    source: "sqlite".to_string(),
                })
            },
        ))?;
        Ok(row)
    }

    async fn close_position(&self, trade_uuid: &str) -> Result<()> {
        let conn = self.conn.lock();
        Self::map_rusqlite(conn.execute(
            "UPDATE positions SET is_open = 0 WHERE trade_uuid = ?1",
            params![trade_uuid],
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_open_position_run_persists_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        let first = store
            .ensure_open_position_run(1, "MintAAA", "trade-1")
            .await
            .unwrap();
        let again = store
            .ensure_open_position_run(1, "MintAAA", "trade-1")
            .await
            .unwrap();
        assert_eq!(first.position_id, again.position_id);
    }

    #[tokio::test]
    async fn close_position_removes_it_from_open_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        store
            .ensure_open_position_run(1, "MintAAA", "trade-1")
            .await
            .unwrap();
        store.close_position("trade-1").await.unwrap();
        let open = store.load_open_positions(1).await.unwrap();
        assert!(open.is_empty());
    }

    fn trade_event(txid: &str, sol_delta: f64) -> TradeEventRecord {
        TradeEventRecord {
            wallet_id: 1,
            wallet_alias: "w1".to_string(),
            mint: "MintAAA".to_string(),
            trade_uuid: "trade-1".to_string(),
            side: crate::types::Side::Buy,
            token_delta: 100.0,
            sol_delta,
            txid: txid.to_string(),
            price_sol_per_token: Some(0.01),
            price_usd_per_token: None,
            sol_usd_price: None,
            fees_sol: None,
            fees_usd: None,
            slippage_pct: None,
            price_impact_pct: None,
            executed_at: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_trade_event_is_idempotent_on_txid() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        store.record_trade_event(&trade_event("sig-1", -1.0)).await.unwrap();
        store.record_trade_event(&trade_event("sig-1", -2.0)).await.unwrap();

        let conn = store.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trade_events WHERE txid = 'sig-1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let stored_sol_delta: f64 = conn
            .query_row("SELECT sol_delta FROM trade_events WHERE txid = 'sig-1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored_sol_delta, -1.0);
    }
}
