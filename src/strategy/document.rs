//! Strategy documents — versioned JSON configuration loaded once per process
//! (spec §3, "Strategy document" row; spec §4.3).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::Severity;

/// One of the three strategy documents the engine recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyKind {
    Flash,
    Hybrid,
    Campaign,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flash => write!(f, "FLASH"),
            Self::Hybrid => write!(f, "HYBRID"),
            Self::Campaign => write!(f, "CAMPAIGN"),
        }
    }
}

impl StrategyKind {
    /// Strictest-first fallback order used by strategy selection (spec
    /// §4.3): FLASH, then HYBRID, then CAMPAIGN.
    pub const STRICTEST_FIRST: [StrategyKind; 3] =
        [StrategyKind::Flash, StrategyKind::Hybrid, StrategyKind::Campaign];

    /// Token-priority order used when a position's `strategyName` is
    /// inspected for an explicit name: FLASH, CAMPAIGN, HYBRID (spec §4.3).
    pub const EXPLICIT_PRIORITY: [StrategyKind; 3] =
        [StrategyKind::Flash, StrategyKind::Campaign, StrategyKind::Hybrid];
}

/// A single gate definition within a strategy document's qualify section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDef {
    pub id: String,
    #[serde(rename = "type")]
    pub gate_type: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub severity_on_fail: Severity,
}

/// Trailing-stop configuration block (spec §3, "Trailing-stop state" row and
/// §4.5's defaults table).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingStopConfig {
    #[serde(default = "default_activation_pct")]
    pub activation_pct: f64,
    #[serde(default = "default_trail_pct")]
    pub trail_pct: f64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_breach_confirmations")]
    pub breach_confirmations: u32,
    #[serde(default = "default_action_debounce_ms")]
    pub action_debounce_ms: u64,
    #[serde(default = "default_hard_stop_loss_pct")]
    pub hard_stop_loss_pct: f64,
}

fn default_activation_pct() -> f64 {
    10.0
}
fn default_trail_pct() -> f64 {
    8.0
}
fn default_poll_ms() -> u64 {
    5000
}
fn default_breach_confirmations() -> u32 {
    2
}
fn default_action_debounce_ms() -> u64 {
    30_000
}
fn default_hard_stop_loss_pct() -> f64 {
    25.0
}

impl Default for TrailingStopConfig {
    /// Resolved per SPEC_FULL §12: the spec body's defaults table wins over
    /// the conflicting values only mentioned in passing under Open
    /// Questions.
    fn default() -> Self {
        Self {
            activation_pct: default_activation_pct(),
            trail_pct: default_trail_pct(),
            poll_ms: default_poll_ms(),
            breach_confirmations: default_breach_confirmations(),
            action_debounce_ms: default_action_debounce_ms(),
            hard_stop_loss_pct: default_hard_stop_loss_pct(),
        }
    }
}

/// The `defaults` (or legacy `manage`) block of a strategy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDefaults {
    #[serde(default)]
    pub trailing_stop: TrailingStopConfig,
}

/// The qualify section: an ordered list of gates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Qualify {
    #[serde(default)]
    pub gates: Vec<GateDef>,
}

/// A fully loaded and validated strategy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDocument {
    pub schema_version: u32,
    pub strategy_id: String,
    pub name: String,
    #[serde(default)]
    pub defaults: StrategyDefaults,
    #[serde(default)]
    pub qualify: Qualify,
}

impl StrategyDocument {
    /// Load and validate a single strategy document from a JSON file.
    ///
    /// Validation is intentionally narrow: schema_version must be present
    /// and non-zero, and every gate must carry a non-empty id. Unknown gate
    /// *types* are allowed to load (they fail closed at evaluation time per
    /// spec §4.3) — only structurally malformed documents are rejected here.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::StoreUnavailable(format!(
                "failed to read strategy document {}: {e}",
                path.display()
            ))
        })?;
        let doc: Self = serde_json::from_str(&content).map_err(|e| {
            CoreError::PolicyViolation(format!(
                "failed to parse strategy document {}: {e}",
                path.display()
            ))
        })?;
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> Result<()> {
        if self.schema_version == 0 {
            return Err(CoreError::PolicyViolation(format!(
                "strategy document {} has schemaVersion 0",
                self.strategy_id
            )));
        }
        for gate in &self.qualify.gates {
            if gate.id.trim().is_empty() {
                return Err(CoreError::PolicyViolation(format!(
                    "strategy document {} has a gate with an empty id",
                    self.strategy_id
                )));
            }
        }
        Ok(())
    }
}

/// The three loaded strategy documents, keyed by kind.
#[derive(Debug, Clone)]
pub struct StrategyBook {
    docs: HashMap<StrategyKind, StrategyDocument>,
}

impl StrategyBook {
    pub fn new(
        flash: StrategyDocument,
        hybrid: StrategyDocument,
        campaign: StrategyDocument,
    ) -> Self {
        let mut docs = HashMap::with_capacity(3);
        docs.insert(StrategyKind::Flash, flash);
        docs.insert(StrategyKind::Hybrid, hybrid);
        docs.insert(StrategyKind::Campaign, campaign);
        Self { docs }
    }

    /// Load all three documents from `dir`, expecting files named
    /// `flash.json`, `hybrid.json`, `campaign.json`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let flash = StrategyDocument::load(dir.join("flash.json"))?;
        let hybrid = StrategyDocument::load(dir.join("hybrid.json"))?;
        let campaign = StrategyDocument::load(dir.join("campaign.json"))?;
        Ok(Self::new(flash, hybrid, campaign))
    }

    pub fn get(&self, kind: StrategyKind) -> &StrategyDocument {
        self.docs
            .get(&kind)
            .expect("StrategyBook is always fully populated for all three kinds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> StrategyDocument {
        StrategyDocument {
            schema_version: 1,
            strategy_id: id.to_string(),
            name: id.to_string(),
            defaults: StrategyDefaults::default(),
            qualify: Qualify::default(),
        }
    }

    #[test]
    fn validate_rejects_zero_schema_version() {
        let mut d = doc("x");
        d.schema_version = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_gate_id() {
        let mut d = doc("x");
        d.qualify.gates.push(GateDef {
            id: "".to_string(),
            gate_type: "number_lte".to_string(),
            params: serde_json::json!({}),
            severity_on_fail: Severity::Warn,
        });
        assert!(d.validate().is_err());
    }

    #[test]
    fn trailing_stop_defaults_match_spec_body() {
        let t = TrailingStopConfig::default();
        assert_eq!(t.activation_pct, 10.0);
        assert_eq!(t.trail_pct, 8.0);
        assert_eq!(t.poll_ms, 5000);
        assert_eq!(t.breach_confirmations, 2);
        assert_eq!(t.action_debounce_ms, 30_000);
        assert_eq!(t.hard_stop_loss_pct, 25.0);
    }
}
