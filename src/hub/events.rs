//! HUD event log and status snapshot (spec §4.1, §4.6): every subsystem
//! reports through a narrow [`HudEventSink`] rather than writing files
//! directly, so the hub coordinator can be the single place that owns the
//! on-disk layout.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::evaluation::snapshot::EvaluationSnapshot;
use crate::sellops::autopsy::AutopsyReport;
use crate::tx_monitor::insight::RecoveredInsight;
use crate::types::Side;

/// The set of HUD payloads a sellops controller or tx monitor can emit.
/// Kept as an enum (rather than a raw `serde_json::Value`) so callers get
/// compile-time checking of the shapes the HUD actually understands.
pub enum HudPayload {
    Evaluation(Box<EvaluationSnapshot>),
    Autopsy(Box<AutopsyReport>),
    TrailingStopHeartbeat {
        wallet_alias: String,
        /// `"trailing_stop_idle"` when nothing is watched, else
        /// `"trailing_stop"` / `"trailing_stop_armed"` (spec §4.5 step 5).
        category: &'static str,
        watched_mints: usize,
        active_stops: usize,
        stale_price_skips: usize,
        missing_cost_skips: usize,
        at: DateTime<Utc>,
    },
    TxStatus {
        txid: String,
        status_category: String,
        trade_uuid: Option<String>,
        wallet_alias: String,
        mint: String,
        side: Side,
        size: f64,
        /// Slot the transaction landed in, when a terminal status reached
        /// the chain (absent on a timeout that never resolved).
        slot: Option<u64>,
        /// The on-chain error message, present only for a failed tx.
        err: Option<String>,
        /// Recovered trade insight, present only when the tx confirmed and
        /// a tradeable balance delta was found.
        insight: Option<RecoveredInsight>,
        /// The opaque swap-quote blob the submission path returned, carried
        /// through best-effort for HUD consumers.
        swap_quote: Option<serde_json::Value>,
        at: DateTime<Utc>,
    },
    Job {
        namespace: String,
        command: String,
        phase: &'static str,
        detail: Option<String>,
        at: DateTime<Utc>,
    },
}

/// One entry in the HUD event log, the JSON shape written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HudEvent {
    pub category: String,
    pub at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl From<&HudPayload> for HudEvent {
    fn from(payload: &HudPayload) -> Self {
        match payload {
            HudPayload::Evaluation(snapshot) => HudEvent {
                category: "evaluation".to_string(),
                at: snapshot.created_at,
                payload: serde_json::to_value(snapshot.as_ref()).unwrap_or(serde_json::Value::Null),
            },
            HudPayload::Autopsy(report) => HudEvent {
                category: "autopsy".to_string(),
                at: report.closed_at,
                payload: serde_json::to_value(report.as_ref()).unwrap_or(serde_json::Value::Null),
            },
            HudPayload::TrailingStopHeartbeat {
                wallet_alias,
                category,
                watched_mints,
                active_stops,
                stale_price_skips,
                missing_cost_skips,
                at,
            } => HudEvent {
                category: category.to_string(),
                at: *at,
                payload: serde_json::json!({
                    "walletAlias": wallet_alias,
                    "watchedMints": watched_mints,
                    "activeStops": active_stops,
                    "stalePriceSkips": stale_price_skips,
                    "missingCostSkips": missing_cost_skips,
                }),
            },
            HudPayload::TxStatus {
                txid,
                status_category,
                trade_uuid,
                wallet_alias,
                mint,
                side,
                size,
                slot,
                err,
                insight,
                swap_quote,
                at,
            } => HudEvent {
                category: status_category.clone(),
                at: *at,
                payload: serde_json::json!({
                    "txid": txid,
                    "tradeUuid": trade_uuid,
                    "slot": slot,
                    "err": err,
                    "insight": insight,
                    "swapQuote": swap_quote,
                    "context": {
                        "walletAlias": wallet_alias,
                        "mint": mint,
                        "side": side,
                        "size": size,
                    },
                }),
            },
            HudPayload::Job {
                namespace,
                command,
                phase,
                detail,
                at,
            } => HudEvent {
                category: format!("job_{phase}"),
                at: *at,
                payload: serde_json::json!({
                    "namespace": namespace,
                    "command": command,
                    "detail": detail,
                }),
            },
        }
    }
}

/// The seam every subsystem emits HUD events through.
pub trait HudEventSink: Send + Sync {
    fn emit(&self, payload: HudPayload);
}

/// A snapshot of overall daemon status, written to `status.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub updated_at: Option<DateTime<Utc>>,
    pub wallets: Vec<String>,
    pub running_jobs: Vec<String>,
}

/// File-backed HUD sink: appends to a capped, newest-first JSON array using
/// the write-tmp-then-rename pattern so a reader never observes a
/// half-written file.
pub struct FileHudSink {
    events_path: PathBuf,
    status_path: PathBuf,
    max_events: usize,
    events: Mutex<VecDeque<HudEvent>>,
}

impl FileHudSink {
    pub fn new(events_path: PathBuf, status_path: PathBuf, max_events: usize) -> Self {
        Self {
            events_path,
            status_path,
            max_events,
            events: Mutex::new(VecDeque::with_capacity(max_events)),
        }
    }

    fn persist_events(&self, events: &VecDeque<HudEvent>) {
        let list: Vec<&HudEvent> = events.iter().collect();
        if let Err(e) = atomic_write_json(&self.events_path, &list) {
            warn!(path = %self.events_path.display(), error = %e, "failed to persist HUD event log");
        }
    }

    pub fn write_status(&self, status: &StatusSnapshot) {
        if let Err(e) = atomic_write_json(&self.status_path, status) {
            warn!(path = %self.status_path.display(), error = %e, "failed to persist status snapshot");
        }
    }
}

impl HudEventSink for FileHudSink {
    fn emit(&self, payload: HudPayload) {
        let event: HudEvent = (&payload).into();
        let mut events = self.events.lock();
        events.push_front(event);
        while events.len() > self.max_events {
            events.pop_back();
        }
        self.persist_events(&events);
    }
}

fn atomic_write_json<T: Serialize>(path: &std::path::Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_is_capped_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileHudSink::new(
            dir.path().join("events.json"),
            dir.path().join("status.json"),
            2,
        );
        for i in 0..5 {
            sink.emit(HudPayload::TrailingStopHeartbeat {
                wallet_alias: format!("w{i}"),
                category: "trailing_stop",
                watched_mints: i,
                active_stops: 0,
                stale_price_skips: 0,
                missing_cost_skips: 0,
                at: Utc::now(),
            });
        }
        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload["walletAlias"], "w4");
    }

    #[test]
    fn status_write_is_atomic_write_then_rename() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileHudSink::new(
            dir.path().join("events.json"),
            dir.path().join("status.json"),
            50,
        );
        sink.write_status(&StatusSnapshot {
            updated_at: Some(Utc::now()),
            wallets: vec!["w1".to_string()],
            running_jobs: Vec::new(),
        });
        assert!(dir.path().join("status.json").exists());
        assert!(!dir.path().join("status.tmp").exists());
    }
}
