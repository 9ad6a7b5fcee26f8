//! Daemon configuration — loop periods, freshness windows, and file
//! locations, loaded once at startup and passed down as an explicit
//! dependency (spec §9: no `getHubCoordinator()` singleton).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_slow_loop_ms() -> u64 {
    60_000
}

fn default_fast_loop_ms() -> u64 {
    5_000
}

fn default_decision_debounce_ms() -> u64 {
    30_000
}

fn default_coin_freshness_ms() -> i64 {
    120_000
}

fn default_pool_freshness_ms() -> i64 {
    120_000
}

fn default_events_freshness_ms() -> i64 {
    120_000
}

fn default_risk_freshness_ms() -> i64 {
    600_000
}

fn default_hud_max_events() -> usize {
    50
}

fn default_hud_emit_throttle_ms() -> u64 {
    100
}

fn default_heartbeat_throttle_ms() -> u64 {
    15_000
}

fn default_allow_trim() -> bool {
    true
}

fn default_trim_pct() -> f64 {
    50.0
}

fn default_monitor_timeout_ms() -> u64 {
    120_000
}

fn default_true() -> bool {
    true
}

/// Top-level daemon configuration. Every field carries a `#[serde(default)]`
/// so adding new fields never breaks an older config file on disk (same
/// forward-compatibility posture the teacher's `RuntimeConfig` takes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Slow-loop period in milliseconds (spec §4.5, default 60s).
    #[serde(default = "default_slow_loop_ms")]
    pub slow_loop_ms: u64,

    /// Fast-loop period in milliseconds (spec §4.5, default 5s, floor 1s).
    #[serde(default = "default_fast_loop_ms")]
    pub fast_loop_ms: u64,

    /// Minimum time between decision-driven actions for a single tradeUuid.
    #[serde(default = "default_decision_debounce_ms")]
    pub decision_debounce_ms: u64,

    /// Whether the evaluation engine runs in observe-only mode (decision is
    /// always `hold`) or execute mode (decision equals recommendation).
    /// Spec §9 records this as an open question with two divergent upstream
    /// defaults; this daemon defaults to the safe one.
    #[serde(default = "default_true")]
    pub observe_only: bool,

    /// Whether a `trim` recommendation is allowed to submit a partial sell.
    #[serde(default = "default_allow_trim")]
    pub allow_trim: bool,

    /// Percentage of the position closed on a `trim` recommendation.
    #[serde(default = "default_trim_pct")]
    pub trim_pct: f64,

    /// Freshness window for coin/price data (ms).
    #[serde(default = "default_coin_freshness_ms")]
    pub coin_freshness_ms: i64,

    /// Freshness window for pool/liquidity data (ms).
    #[serde(default = "default_pool_freshness_ms")]
    pub pool_freshness_ms: i64,

    /// Freshness window for interval events (ms).
    #[serde(default = "default_events_freshness_ms")]
    pub events_freshness_ms: i64,

    /// Freshness window for risk data (ms).
    #[serde(default = "default_risk_freshness_ms")]
    pub risk_freshness_ms: i64,

    /// Max HUD event log length.
    #[serde(default = "default_hud_max_events")]
    pub hud_max_events: usize,

    /// Minimum gap between HUD heartbeat emissions.
    #[serde(default = "default_hud_emit_throttle_ms")]
    pub hud_emit_throttle_ms: u64,

    /// Minimum gap between `trailing_stop_idle` / `trailing_stop` heartbeats.
    #[serde(default = "default_heartbeat_throttle_ms")]
    pub heartbeat_throttle_ms: u64,

    /// Timeout applied to a `txMonitor` job spawned after a swap submission.
    #[serde(default = "default_monitor_timeout_ms")]
    pub monitor_timeout_ms: u64,

    /// Directory status.json and the HUD event file are written to.
    #[serde(default)]
    pub status_dir: PathBuf,

    /// Path to the HUD event log file.
    #[serde(default)]
    pub hud_events_path: PathBuf,

    /// Directory detached job payloads are written to before the job is
    /// spawned (spec §4.1's detached-job descriptor).
    #[serde(default = "default_job_payload_dir")]
    pub job_payload_dir: PathBuf,
}

fn default_job_payload_dir() -> PathBuf {
    PathBuf::from("jobs")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            slow_loop_ms: default_slow_loop_ms(),
            fast_loop_ms: default_fast_loop_ms(),
            decision_debounce_ms: default_decision_debounce_ms(),
            observe_only: true,
            allow_trim: default_allow_trim(),
            trim_pct: default_trim_pct(),
            coin_freshness_ms: default_coin_freshness_ms(),
            pool_freshness_ms: default_pool_freshness_ms(),
            events_freshness_ms: default_events_freshness_ms(),
            risk_freshness_ms: default_risk_freshness_ms(),
            hud_max_events: default_hud_max_events(),
            hud_emit_throttle_ms: default_hud_emit_throttle_ms(),
            heartbeat_throttle_ms: default_heartbeat_throttle_ms(),
            monitor_timeout_ms: default_monitor_timeout_ms(),
            status_dir: PathBuf::from("."),
            hud_events_path: PathBuf::from("tx-events.json"),
            job_payload_dir: default_job_payload_dir(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a JSON file at `path`, falling back to
    /// defaults with a warning if the file is absent (caller decides).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read daemon config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse daemon config from {}", path.display()))?;
        info!(path = %path.display(), "daemon config loaded");
        Ok(config)
    }

    /// Apply the `WARCHEST_HUD_MAX_TX` / `WARCHEST_HUD_EMIT_THROTTLE_MS`
    /// style env var overrides (spec §6).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WARCHEST_HUD_MAX_TX") {
            if let Ok(n) = v.parse() {
                self.hud_max_events = n;
            }
        }
        if let Ok(v) = std::env::var("WARCHEST_HUD_EMIT_THROTTLE_MS") {
            if let Ok(n) = v.parse() {
                self.hud_emit_throttle_ms = n;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_fallbacks() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.slow_loop_ms, 60_000);
        assert_eq!(cfg.fast_loop_ms, 5_000);
        assert_eq!(cfg.hud_max_events, 50);
        assert!(cfg.observe_only);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = DaemonConfig::load("/nonexistent/path/daemon.json");
        assert!(result.is_err());
    }
}
