//! The evaluation engine (spec §4.4): composes a full [`EvaluationSnapshot`]
//! from store reads and a chart feed, then hands it to the decision engine.

use std::sync::Arc;

use chrono::Utc;

use crate::chain::ChartFeed;
use crate::decision::decide;
use crate::error::Result;
use crate::evaluation::regime::classify_regime;
use crate::evaluation::snapshot::{
    ChartInfo, Derived, EvaluationSnapshot, Indicators, Macd,
};
use crate::indicators::{atr, ema, macd as macd_ind, rsi, slope, vwap};
use crate::store::Store;
use crate::strategy::document::StrategyBook;
use crate::types::PositionSummary;

const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const SLOPE_PERIOD: usize = 20;
const EMA_FAST_PERIOD: usize = 12;
const EMA_SLOW_PERIOD: usize = 26;
const MACD_SIGNAL_PERIOD: usize = 9;
const VWAP_ROLLING_PERIODS: usize = 20;
const CHART_CANDLE_LIMIT: usize = 200;

/// Composes evaluation snapshots. Holds no mutable state of its own — every
/// call reads fresh from the store and chart feed.
pub struct EvaluationEngine {
    store: Arc<dyn Store>,
    chart_feed: Arc<dyn ChartFeed>,
    book: Arc<StrategyBook>,
    coin_freshness_ms: i64,
    pool_freshness_ms: i64,
    events_freshness_ms: i64,
    risk_freshness_ms: i64,
}

impl EvaluationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        chart_feed: Arc<dyn ChartFeed>,
        book: Arc<StrategyBook>,
        coin_freshness_ms: i64,
        pool_freshness_ms: i64,
        events_freshness_ms: i64,
        risk_freshness_ms: i64,
    ) -> Self {
        Self {
            store,
            chart_feed,
            book,
            coin_freshness_ms,
            pool_freshness_ms,
            events_freshness_ms,
            risk_freshness_ms,
        }
    }

    /// Build and evaluate a full snapshot for `position` (spec §4.4).
    pub async fn evaluate(
        &self,
        wallet_alias: &str,
        position: &PositionSummary,
    ) -> Result<EvaluationSnapshot> {
        let mint = position.mint.as_str();
        let now = Utc::now();

        let coin = self.store.load_coin(mint).await?;
        let best_pool = self.store.load_best_pool(mint).await?;
        let events = self.store.load_events(mint).await?.unwrap_or_default();
        let risk = self.store.load_risk(mint).await?;
        let pnl = self.store.load_pnl(position.wallet_id, mint).await?;

        let mut warnings = Vec::new();
        match &coin {
            Some(c) if (now - c.last_updated).num_milliseconds() > self.coin_freshness_ms => {
                warnings.push("coin_stale".to_string())
            }
            None => warnings.push("coin_missing".to_string()),
            _ => {}
        }
        match &best_pool {
            Some(p) if (now - p.last_updated).num_milliseconds() > self.pool_freshness_ms => {
                warnings.push("pool_stale".to_string())
            }
            None => warnings.push("pool_missing".to_string()),
            _ => {}
        }
        match events.last_updated {
            Some(ts) if (now - ts).num_milliseconds() > self.events_freshness_ms => {
                warnings.push("events_stale".to_string())
            }
            None => warnings.push("events_missing".to_string()),
            _ => {}
        }
        match &risk {
            Some(r) if (now - r.last_updated).num_milliseconds() > self.risk_freshness_ms => {
                warnings.push("risk_stale".to_string())
            }
            None => warnings.push("risk_missing".to_string()),
            _ => {}
        }

        let derived = compute_derived(position, coin.as_ref().map(|c| c.price_usd), pnl.as_ref(), best_pool.as_ref());

        let candles = self.chart_feed.get_candles(mint, CHART_CANDLE_LIMIT).await?;
        let indicators = compute_indicators(&candles);
        let chart = if candles.is_empty() {
            None
        } else {
            Some(ChartInfo {
                kind: "ohlcv".to_string(),
                points: candles.len(),
                time_from: candles.first().map(|c| c.t).unwrap_or_default(),
                time_to: candles.last().map(|c| c.t).unwrap_or_default(),
                candles: None,
            })
        };

        let regime = classify_regime(&indicators);

        let mut snapshot = EvaluationSnapshot {
            wallet_alias: wallet_alias.to_string(),
            mint: mint.to_string(),
            trade_uuid: position.trade_uuid.clone(),
            created_at: now,
            coin,
            best_pool,
            events,
            risk,
            pnl,
            derived,
            chart,
            indicators,
            strategy: None,
            qualify: None,
            recommendation: None,
            regime: Some(regime),
            warnings,
        };

        let decision = decide(position, &snapshot, &self.book);
        snapshot.strategy = Some(decision.strategy);
        snapshot.qualify = Some(decision.qualify);
        snapshot.recommendation = Some(decision.recommendation);

        Ok(snapshot)
    }
}

fn compute_derived(
    position: &PositionSummary,
    price_usd: Option<f64>,
    pnl: Option<&crate::evaluation::snapshot::PnlInfo>,
    best_pool: Option<&crate::evaluation::snapshot::PoolInfo>,
) -> Derived {
    let position_value_usd = price_usd.map(|p| p * position.current_token_amount);

    let avg_cost = pnl.map(|p| p.avg_cost_usd).unwrap_or(position.entry_price_usd);
    let cost_basis_usd = if avg_cost > 0.0 {
        Some(avg_cost * position.current_token_amount)
    } else {
        None
    };

    let roi_unrealized_pct = match (position_value_usd, cost_basis_usd) {
        (Some(value), Some(cost)) if cost > 0.0 => Some(((value - cost) / cost) * 100.0),
        _ => None,
    };

    let roi_total_pct = match (roi_unrealized_pct, pnl.map(|p| p.realized_usd)) {
        (Some(unrealized), Some(realized)) => {
            cost_basis_usd.filter(|c| *c > 0.0).map(|cost| unrealized + (realized / cost) * 100.0)
        }
        (Some(unrealized), None) => Some(unrealized),
        _ => None,
    };

    let liquidity_to_position_ratio = match (best_pool.map(|p| p.liquidity_usd), position_value_usd) {
        (Some(liquidity), Some(value)) if value > 0.0 => Some(liquidity / value),
        _ => None,
    };

    Derived {
        position_value_usd,
        cost_basis_usd,
        roi_unrealized_pct,
        roi_total_pct,
        liquidity_to_position_ratio,
    }
}

fn compute_indicators(candles: &[crate::evaluation::snapshot::Candle]) -> Indicators {
    let closes: Vec<f64> = candles.iter().map(|c| c.c).collect();

    let rsi_value = rsi::current_rsi(&closes, RSI_PERIOD).map(|(value, _)| value);
    let atr_value = atr::calculate_atr(candles, ATR_PERIOD);
    let slope_value = slope::calculate_slope_pct(&closes, SLOPE_PERIOD);
    let ema_fast = ema::calculate_ema(&closes, EMA_FAST_PERIOD).last().copied();
    let ema_slow = ema::calculate_ema(&closes, EMA_SLOW_PERIOD).last().copied();
    let macd_value = macd_ind::calculate_macd(&closes, EMA_FAST_PERIOD, EMA_SLOW_PERIOD, MACD_SIGNAL_PERIOD);
    let vwap_value = vwap::calculate_vwap_rolling(candles, VWAP_ROLLING_PERIODS);

    Indicators {
        rsi: rsi_value,
        atr: atr_value,
        slope_pct: slope_value,
        ema_fast,
        ema_slow,
        macd: Macd {
            macd: macd_value.map(|m| m.macd),
            signal: macd_value.map(|m| m.signal),
            hist: macd_value.map(|m| m.hist),
        },
        vwap: vwap_value.map(|(v, _)| v),
        vwap_volume: vwap_value.map(|(_, vol)| vol),
        last_close: closes.last().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::snapshot::{PnlInfo, PoolInfo};

    fn position() -> PositionSummary {
        PositionSummary {
            position_id: 1,
            wallet_id: 1,
            mint: "MintAAA".to_string(),
            trade_uuid: "t1".to_string(),
            strategy_name: None,
            opened_at: Utc::now(),
            last_trade_at: Utc::now(),
            current_token_amount: 100.0,
            entry_price_sol: 0.01,
            entry_price_usd: 1.0,
            source: "db".to_string(),
        }
    }

    #[test]
    fn derived_metrics_are_none_when_price_missing() {
        let derived = compute_derived(&position(), None, None, None);
        assert!(derived.position_value_usd.is_none());
        assert!(derived.roi_unrealized_pct.is_none());
    }

    #[test]
    fn derived_roi_uses_pnl_avg_cost_when_present() {
        let pnl = PnlInfo {
            avg_cost_usd: 0.5,
            realized_usd: 10.0,
        };
        let derived = compute_derived(&position(), Some(1.0), Some(&pnl), None);
        assert_eq!(derived.position_value_usd, Some(100.0));
        assert_eq!(derived.cost_basis_usd, Some(50.0));
        assert_eq!(derived.roi_unrealized_pct, Some(100.0));
    }

    #[test]
    fn liquidity_ratio_requires_both_inputs() {
        let pool = PoolInfo {
            address: "pool1".to_string(),
            liquidity_usd: 500.0,
            last_updated: Utc::now(),
        };
        let derived = compute_derived(&position(), Some(1.0), None, Some(&pool));
        assert_eq!(derived.liquidity_to_position_ratio, Some(5.0));
    }

    #[test]
    fn compute_indicators_on_empty_candles_is_all_none() {
        let indicators = compute_indicators(&[]);
        assert!(indicators.rsi.is_none());
        assert!(indicators.atr.is_none());
        assert!(indicators.last_close.is_none());
    }
}
