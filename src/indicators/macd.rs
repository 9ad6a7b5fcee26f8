// =============================================================================
// Moving Average Convergence/Divergence (MACD)
// =============================================================================
//
// MACD line   = EMA(fast) - EMA(slow)
// Signal line = EMA(signal_period) of the MACD line
// Histogram   = MACD line - signal line
//
// Built on the same EMA building block as `indicators::ema`, seeded and
// smoothed the same way.
// =============================================================================

use crate::indicators::ema::calculate_ema;

/// MACD output for the most recent candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub hist: f64,
}

/// Compute the most recent MACD triple from a `closes` series.
///
/// Returns `None` when there is insufficient data to seed both EMAs and the
/// signal line, or when any intermediate value is non-finite.
pub fn calculate_macd(
    closes: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || fast_period >= slow_period {
        return None;
    }

    let ema_fast = calculate_ema(closes, fast_period);
    let ema_slow = calculate_ema(closes, slow_period);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return None;
    }

    // Align the two EMA series on their shared tail: `ema_fast` starts
    // `slow_period - fast_period` candles earlier than `ema_slow`.
    let offset = ema_fast.len().checked_sub(ema_slow.len())?;
    let macd_series: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, &slow)| ema_fast[i + offset] - slow)
        .collect();

    if macd_series.len() < signal_period {
        return None;
    }

    let signal_series = calculate_ema(&macd_series, signal_period);
    let signal = *signal_series.last()?;
    let macd = *macd_series.last()?;
    let hist = macd - signal;

    if !macd.is_finite() || !signal.is_finite() || !hist.is_finite() {
        return None;
    }

    Some(MacdValue { macd, signal, hist })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_returns_none() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert!(calculate_macd(&closes, 12, 26, 9).is_none());
    }

    #[test]
    fn uptrend_has_positive_macd_hist_mix() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64 * 0.5).collect();
        let macd = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(macd.macd.is_finite());
        assert!(macd.signal.is_finite());
        assert!((macd.hist - (macd.macd - macd.signal)).abs() < 1e-9);
        // A steady uptrend should produce a positive MACD line.
        assert!(macd.macd > 0.0);
    }

    #[test]
    fn fast_must_be_shorter_than_slow() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        assert!(calculate_macd(&closes, 26, 12, 9).is_none());
    }
}
