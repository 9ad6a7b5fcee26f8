//! Shared data-model types used across the core subsystems (spec §3).

use serde::{Deserialize, Serialize};

/// A managed wallet, declared on the CLI as `alias:pubkey[:color]` and
/// reconciled against the store's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSpec {
    pub alias: String,
    pub pubkey: String,
    #[serde(default)]
    pub wallet_id: Option<i64>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Trade side, as recovered from a confirmed transaction's balance deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
    Transfer,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// Per-gate failure seriousness, ordered `none < warn < trim < degrade <
/// exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Warn,
    Trim,
    Degrade,
    Exit,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Warn => write!(f, "warn"),
            Self::Trim => write!(f, "trim"),
            Self::Degrade => write!(f, "degrade"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// The decision engine's output mapping of worst severity to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Hold,
    Trim,
    Exit,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hold => write!(f, "hold"),
            Self::Trim => write!(f, "trim"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

impl Severity {
    /// Map the worst qualify severity onto a recommendation (spec §4.3).
    pub fn recommendation(self) -> Recommendation {
        match self {
            Severity::Exit => Recommendation::Exit,
            Severity::Trim => Recommendation::Trim,
            Severity::Degrade | Severity::Warn | Severity::None => Recommendation::Hold,
        }
    }
}

/// Where a position's effective strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategySource {
    Db,
    Inferred,
}

/// A summary of an open position, derived each tick from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub position_id: i64,
    pub wallet_id: i64,
    pub mint: String,
    pub trade_uuid: String,
    #[serde(default)]
    pub strategy_name: Option<String>,
    pub opened_at: chrono::DateTime<chrono::Utc>,
    pub last_trade_at: chrono::DateTime<chrono::Utc>,
    pub current_token_amount: f64,
    pub entry_price_sol: f64,
    pub entry_price_usd: f64,
    pub source: String,
}

/// Mints treated as numeraires: entry-price recovery short-circuits to zero
/// for these and no external API call is made (spec S2).
pub const NUMERAIRE_MINTS: &[&str] = &["USDC", "USDT", "USD1"];

/// Whether `mint` is one of the numeraire/stable mints.
pub fn is_numeraire_mint(mint: &str) -> bool {
    NUMERAIRE_MINTS.iter().any(|m| m.eq_ignore_ascii_case(mint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_monotone() {
        assert!(Severity::None < Severity::Warn);
        assert!(Severity::Warn < Severity::Trim);
        assert!(Severity::Trim < Severity::Degrade);
        assert!(Severity::Degrade < Severity::Exit);
    }

    #[test]
    fn recommendation_map_matches_spec() {
        assert_eq!(Severity::Exit.recommendation(), Recommendation::Exit);
        assert_eq!(Severity::Trim.recommendation(), Recommendation::Trim);
        assert_eq!(Severity::Degrade.recommendation(), Recommendation::Hold);
        assert_eq!(Severity::Warn.recommendation(), Recommendation::Hold);
        assert_eq!(Severity::None.recommendation(), Recommendation::Hold);
    }

    #[test]
    fn numeraire_mints_recognised_case_insensitively() {
        assert!(is_numeraire_mint("usdc"));
        assert!(is_numeraire_mint("USDT"));
        assert!(is_numeraire_mint("USD1"));
        assert!(!is_numeraire_mint("BONK"));
    }
}
