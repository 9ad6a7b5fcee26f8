//! Market regime classification (spec §4.4 step 5).
//!
//! Trend comes from the EMA-fast/EMA-slow relationship, momentum from the
//! sign of the MACD histogram; the two combine into a five-way status.
//! RSI bands, price-vs-VWAP, and ATR-vs-price each contribute a textual
//! reason but never affect the classification themselves.

use crate::evaluation::snapshot::{Indicators, RegimeSnapshot, RegimeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Momentum {
    Bullish,
    Bearish,
    Neutral,
    Unknown,
}

fn classify_trend(indicators: &Indicators) -> Trend {
    match (indicators.ema_fast, indicators.ema_slow) {
        (Some(fast), Some(slow)) if fast > slow => Trend::Up,
        (Some(fast), Some(slow)) if fast < slow => Trend::Down,
        (Some(_), Some(_)) => Trend::Unknown,
        _ => Trend::Unknown,
    }
}

fn classify_momentum(indicators: &Indicators) -> Momentum {
    match indicators.macd.hist {
        Some(hist) if hist > 0.0 => Momentum::Bullish,
        Some(hist) if hist < 0.0 => Momentum::Bearish,
        Some(_) => Momentum::Neutral,
        None => Momentum::Unknown,
    }
}

/// Classify the market regime from an already-computed indicator battery.
pub fn classify_regime(indicators: &Indicators) -> RegimeSnapshot {
    let trend = classify_trend(indicators);
    let momentum = classify_momentum(indicators);

    let status = match (trend, momentum) {
        (Trend::Up, Momentum::Bullish) => RegimeStatus::TrendUp,
        (Trend::Down, Momentum::Bearish) => RegimeStatus::TrendDown,
        (Trend::Up, _) => RegimeStatus::BiasUp,
        (Trend::Down, _) => RegimeStatus::BiasDown,
        (Trend::Unknown, _) => RegimeStatus::Chop,
    };

    let mut reasons = Vec::new();

    match indicators.rsi {
        Some(rsi) if rsi >= 70.0 => reasons.push(format!("rsi {rsi:.1} overbought")),
        Some(rsi) if rsi <= 30.0 => reasons.push(format!("rsi {rsi:.1} oversold")),
        Some(rsi) => reasons.push(format!("rsi {rsi:.1} neutral")),
        None => {}
    }

    match (indicators.last_close, indicators.vwap) {
        (Some(close), Some(vwap)) if close > vwap => {
            reasons.push("price above vwap".to_string())
        }
        (Some(close), Some(vwap)) if close < vwap => {
            reasons.push("price below vwap".to_string())
        }
        (Some(_), Some(_)) => reasons.push("price at vwap".to_string()),
        _ => {}
    }

    match (indicators.atr, indicators.last_close) {
        (Some(atr), Some(close)) if close > 0.0 => {
            let atr_pct = (atr / close) * 100.0;
            if atr_pct >= 5.0 {
                reasons.push(format!("atr {atr_pct:.1}% of price: volatile"));
            } else {
                reasons.push(format!("atr {atr_pct:.1}% of price: calm"));
            }
        }
        _ => {}
    }

    RegimeSnapshot { status, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators(ema_fast: Option<f64>, ema_slow: Option<f64>, hist: Option<f64>) -> Indicators {
        Indicators {
            ema_fast,
            ema_slow,
            macd: crate::evaluation::snapshot::Macd {
                hist,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn trend_up_requires_both_trend_and_bullish_momentum() {
        let i = indicators(Some(110.0), Some(100.0), Some(0.5));
        assert_eq!(classify_regime(&i).status, RegimeStatus::TrendUp);
    }

    #[test]
    fn bias_up_when_trend_up_but_momentum_not_bullish() {
        let i = indicators(Some(110.0), Some(100.0), Some(-0.5));
        assert_eq!(classify_regime(&i).status, RegimeStatus::BiasUp);
    }

    #[test]
    fn trend_down_requires_both_trend_and_bearish_momentum() {
        let i = indicators(Some(90.0), Some(100.0), Some(-0.5));
        assert_eq!(classify_regime(&i).status, RegimeStatus::TrendDown);
    }

    #[test]
    fn missing_emas_yield_chop() {
        let i = indicators(None, None, Some(0.5));
        assert_eq!(classify_regime(&i).status, RegimeStatus::Chop);
    }

    #[test]
    fn rsi_reason_present_when_overbought() {
        let mut i = indicators(Some(110.0), Some(100.0), Some(0.5));
        i.rsi = Some(75.0);
        let regime = classify_regime(&i);
        assert!(regime.reasons.iter().any(|r| r.contains("overbought")));
    }
}
