//! Recovered trade insight from a confirmed transaction's balance deltas
//! (spec §4.6), grounded on the teacher pack's `screenerbotio-ScreenerBot`
//! balance-change model.

use serde::Serialize;

use crate::chain::BalanceDelta;
use crate::types::{is_numeraire_mint, Side};

/// The trade insight recovered from a transaction's balance deltas: which
/// mint moved, how much of it, how much SOL moved, and what side the trade
/// was on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredInsight {
    pub mint: String,
    pub token_delta: f64,
    pub sol_delta: f64,
    pub side: Side,
}

/// Recover trade insight from a transaction's balance deltas.
///
/// The mint with the largest absolute delta, excluding SOL and numeraire
/// mints, is taken as the traded asset (spec §4.6). Returns `None` when no
/// non-numeraire token delta is present (e.g. a SOL-only transfer with no
/// discernible trade).
pub fn recover_insight(deltas: &[BalanceDelta]) -> Option<RecoveredInsight> {
    let sol_delta = deltas
        .iter()
        .find(|d| d.is_sol)
        .map(|d| d.amount)
        .unwrap_or(0.0);

    let traded = deltas
        .iter()
        .filter(|d| !d.is_sol && !is_numeraire_mint(&d.mint))
        .max_by(|a, b| a.amount.abs().total_cmp(&b.amount.abs()))?;

    let side = if traded.amount > 0.0 && sol_delta < 0.0 {
        Side::Buy
    } else if traded.amount < 0.0 && sol_delta > 0.0 {
        Side::Sell
    } else {
        Side::Transfer
    };

    Some(RecoveredInsight {
        mint: traded.mint.clone(),
        token_delta: traded.amount,
        sol_delta,
        side,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_recognised_from_token_in_sol_out() {
        let deltas = vec![
            BalanceDelta { mint: "SOL".to_string(), amount: -1.0, is_sol: true },
            BalanceDelta { mint: "MintAAA".to_string(), amount: 1000.0, is_sol: false },
        ];
        let insight = recover_insight(&deltas).unwrap();
        assert_eq!(insight.side, Side::Buy);
        assert_eq!(insight.mint, "MintAAA");
    }

    #[test]
    fn sell_recognised_from_token_out_sol_in() {
        let deltas = vec![
            BalanceDelta { mint: "SOL".to_string(), amount: 1.0, is_sol: true },
            BalanceDelta { mint: "MintAAA".to_string(), amount: -1000.0, is_sol: false },
        ];
        let insight = recover_insight(&deltas).unwrap();
        assert_eq!(insight.side, Side::Sell);
    }

    #[test]
    fn numeraire_mints_are_excluded_from_candidate_selection() {
        let deltas = vec![
            BalanceDelta { mint: "USDC".to_string(), amount: -500.0, is_sol: false },
            BalanceDelta { mint: "MintAAA".to_string(), amount: 200.0, is_sol: false },
        ];
        let insight = recover_insight(&deltas).unwrap();
        assert_eq!(insight.mint, "MintAAA");
    }

    #[test]
    fn largest_absolute_delta_wins_among_multiple_tokens() {
        let deltas = vec![
            BalanceDelta { mint: "Dust".to_string(), amount: 0.01, is_sol: false },
            BalanceDelta { mint: "MintAAA".to_string(), amount: -5000.0, is_sol: false },
        ];
        let insight = recover_insight(&deltas).unwrap();
        assert_eq!(insight.mint, "MintAAA");
    }

    #[test]
    fn sol_only_transfer_returns_none() {
        let deltas = vec![BalanceDelta { mint: "SOL".to_string(), amount: -1.0, is_sol: true }];
        assert!(recover_insight(&deltas).is_none());
    }
}
