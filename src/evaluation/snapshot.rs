//! The evaluation snapshot — the sole input to the decision engine (spec §3,
//! "Evaluation snapshot" row).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Recommendation, Severity, StrategySource};

/// A single OHLCV candle, normalised to `{t,o,h,l,c,v}` with ascending time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

/// Price/metadata snapshot for the mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinInfo {
    pub price_usd: f64,
    #[serde(default)]
    pub price_sol: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/// The best liquidity pool known for this mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub address: String,
    pub liquidity_usd: f64,
    pub last_updated: DateTime<Utc>,
}

/// Aggregated trade-event counts over one interval window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalEvents {
    pub buys: u64,
    pub sells: u64,
    pub volume_usd: f64,
}

/// Per-interval event counters, keyed by the configured intervals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSnapshot {
    #[serde(rename = "5m", default)]
    pub m5: Option<IntervalEvents>,
    #[serde(rename = "15m", default)]
    pub m15: Option<IntervalEvents>,
    #[serde(rename = "1h", default)]
    pub h1: Option<IntervalEvents>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Risk metadata for the mint (e.g. holder concentration, mint authority).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInfo {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub last_updated: DateTime<Utc>,
}

/// Realised PnL view for the position, if the store has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlInfo {
    pub avg_cost_usd: f64,
    pub realized_usd: f64,
}

/// Derived metrics computed from coin/pool/position data (spec §4.4 step 3).
/// All fields are `None` rather than a fabricated default when an input is
/// missing or non-finite.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Derived {
    pub position_value_usd: Option<f64>,
    pub cost_basis_usd: Option<f64>,
    pub roi_unrealized_pct: Option<f64>,
    pub roi_total_pct: Option<f64>,
    pub liquidity_to_position_ratio: Option<f64>,
}

/// MACD triple (line, signal, histogram).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macd {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub hist: Option<f64>,
}

/// Indicator ensemble computed from normalised OHLCV candles (spec §4.4
/// step 4).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub slope_pct: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub macd: Macd,
    pub vwap: Option<f64>,
    pub vwap_volume: Option<f64>,
    pub last_close: Option<f64>,
}

/// Chart payload attached to the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub points: usize,
    pub time_from: i64,
    pub time_to: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candles: Option<Vec<Candle>>,
}

/// Which strategy document was selected and how (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySelection {
    pub id: String,
    pub name: String,
    pub source: StrategySource,
}

/// The outcome of a single gate evaluation (spec §3, "Qualify result" row).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifyResult {
    pub gate_id: String,
    pub outcome: QualifyOutcome,
    pub severity_on_fail: Severity,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualifyOutcome {
    Pass,
    Fail,
}

/// The aggregated qualify-gate outcome attached to the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifySummary {
    pub worst_severity: Severity,
    pub failed_count: usize,
    pub results: Vec<QualifyResult>,
}

/// Coarse market-state classification (spec §4.4 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeStatus {
    TrendUp,
    TrendDown,
    BiasUp,
    BiasDown,
    Chop,
}

impl std::fmt::Display for RegimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TrendUp => "trend_up",
            Self::TrendDown => "trend_down",
            Self::BiasUp => "bias_up",
            Self::BiasDown => "bias_down",
            Self::Chop => "chop",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeSnapshot {
    pub status: RegimeStatus,
    pub reasons: Vec<String>,
}

/// The complete, immutable evaluation snapshot fed into the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSnapshot {
    pub wallet_alias: String,
    pub mint: String,
    pub trade_uuid: String,
    pub created_at: DateTime<Utc>,

    pub coin: Option<CoinInfo>,
    pub best_pool: Option<PoolInfo>,
    pub events: EventsSnapshot,
    pub risk: Option<RiskInfo>,
    pub pnl: Option<PnlInfo>,

    pub derived: Derived,
    pub chart: Option<ChartInfo>,
    pub indicators: Indicators,

    pub strategy: Option<StrategySelection>,
    pub qualify: Option<QualifySummary>,
    pub recommendation: Option<Recommendation>,
    pub regime: Option<RegimeSnapshot>,

    pub warnings: Vec<String>,
}

impl EvaluationSnapshot {
    /// Resolve a dotted field path (e.g. `"derived.roiUnrealizedPct"`)
    /// against the snapshot, for use by the `field_equals` gate. Returns
    /// `serde_json::Value::Null` when the path does not resolve.
    pub fn resolve_path(&self, path: &str) -> serde_json::Value {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        let mut cur = &value;
        for segment in path.split('.') {
            match cur.get(segment) {
                Some(next) => cur = next,
                None => return serde_json::Value::Null,
            }
        }
        cur.clone()
    }
}
