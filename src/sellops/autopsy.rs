//! Autopsy reporting: run exactly once per closed tradeUuid (spec §4.2),
//! grounded on the teacher's `reconcile.rs` set-diff idiom — here the "drift"
//! being detected is a position present in last tick's open set but absent
//! from this tick's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::evaluation::snapshot::EvaluationSnapshot;
use crate::types::PositionSummary;

/// A single closed-position autopsy, built from the position's last known
/// state and its last recorded evaluation snapshot (if any).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopsyReport {
    pub trade_uuid: String,
    pub wallet_id: i64,
    pub mint: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub hold_duration_secs: i64,
    pub entry_price_usd: f64,
    pub last_known_price_usd: Option<f64>,
    pub roi_unrealized_pct_at_close: Option<f64>,
    pub last_recommendation: Option<String>,
}

/// Build the autopsy report for a position observed open on the previous
/// slow-loop tick but missing from the current open-position set.
///
/// Called exactly once per tradeUuid by the caller's dedup tracking — this
/// function itself is pure and has no memory of which tradeUuids it has
/// already reported on.
pub fn run_autopsy(
    position: &PositionSummary,
    last_snapshot: Option<&EvaluationSnapshot>,
) -> AutopsyReport {
    let closed_at = Utc::now();
    let hold_duration_secs = (closed_at - position.opened_at).num_seconds().max(0);

    let report = AutopsyReport {
        trade_uuid: position.trade_uuid.clone(),
        wallet_id: position.wallet_id,
        mint: position.mint.clone(),
        opened_at: position.opened_at,
        closed_at,
        hold_duration_secs,
        entry_price_usd: position.entry_price_usd,
        last_known_price_usd: last_snapshot.and_then(|s| s.coin.as_ref()).map(|c| c.price_usd),
        roi_unrealized_pct_at_close: last_snapshot.and_then(|s| s.derived.roi_unrealized_pct),
        last_recommendation: last_snapshot
            .and_then(|s| s.recommendation)
            .map(|r| r.to_string()),
    };

    info!(
        trade_uuid = %report.trade_uuid,
        mint = %report.mint,
        hold_duration_secs = report.hold_duration_secs,
        roi_at_close = ?report.roi_unrealized_pct_at_close,
        "autopsy recorded for closed position"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> PositionSummary {
        PositionSummary {
            position_id: 1,
            wallet_id: 1,
            mint: "MintAAA".to_string(),
            trade_uuid: "t1".to_string(),
            strategy_name: None,
            opened_at: Utc::now() - chrono::Duration::minutes(10),
            last_trade_at: Utc::now(),
            current_token_amount: 0.0,
            entry_price_sol: 0.01,
            entry_price_usd: 1.0,
            source: "db".to_string(),
        }
    }

    #[test]
    fn autopsy_without_snapshot_has_no_roi() {
        let report = run_autopsy(&position(), None);
        assert!(report.roi_unrealized_pct_at_close.is_none());
        assert!(report.hold_duration_secs >= 599);
    }
}
