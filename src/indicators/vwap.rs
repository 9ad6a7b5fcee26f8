// =============================================================================
// Volume-Weighted Average Price (VWAP)
// =============================================================================
//
// VWAP = Σ(typical_price_i * volume_i) / Σ(volume_i)
// typical_price = (high + low + close) / 3
//
// Computed over the full lookback window, or over the last `vwap_periods`
// candles when the caller wants a rolling window instead (spec §4.4 step 4).
// =============================================================================

use crate::evaluation::snapshot::Candle;

/// Compute VWAP and total volume over the given `candles` slice.
///
/// Returns `None` when `candles` is empty or total volume is zero/non-finite.
pub fn calculate_vwap(candles: &[Candle]) -> Option<(f64, f64)> {
    if candles.is_empty() {
        return None;
    }

    let mut sum_pv = 0.0;
    let mut sum_v = 0.0;
    for c in candles {
        let typical = (c.h + c.l + c.c) / 3.0;
        sum_pv += typical * c.v;
        sum_v += c.v;
    }

    if sum_v <= 0.0 || !sum_pv.is_finite() || !sum_v.is_finite() {
        return None;
    }

    let vwap = sum_pv / sum_v;
    if !vwap.is_finite() {
        return None;
    }
    Some((vwap, sum_v))
}

/// Compute VWAP over only the last `periods` candles (a rolling window).
pub fn calculate_vwap_rolling(candles: &[Candle], periods: usize) -> Option<(f64, f64)> {
    if periods == 0 || candles.is_empty() {
        return None;
    }
    let start = candles.len().saturating_sub(periods);
    calculate_vwap(&candles[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle { t: 0, o: c, h, l, c, v }
    }

    #[test]
    fn empty_candles_returns_none() {
        assert!(calculate_vwap(&[]).is_none());
    }

    #[test]
    fn zero_volume_returns_none() {
        let candles = vec![candle(105.0, 95.0, 100.0, 0.0); 5];
        assert!(calculate_vwap(&candles).is_none());
    }

    #[test]
    fn constant_price_vwap_equals_price() {
        let candles = vec![candle(100.0, 100.0, 100.0, 50.0); 10];
        let (vwap, vol) = calculate_vwap(&candles).unwrap();
        assert!((vwap - 100.0).abs() < 1e-9);
        assert!((vol - 500.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_window_uses_only_recent_candles() {
        let mut candles = vec![candle(10.0, 10.0, 10.0, 100.0); 20];
        candles.extend(vec![candle(200.0, 200.0, 200.0, 100.0); 5]);
        let (vwap_full, _) = calculate_vwap(&candles).unwrap();
        let (vwap_rolling, _) = calculate_vwap_rolling(&candles, 5).unwrap();
        assert!((vwap_rolling - 200.0).abs() < 1e-9);
        assert!(vwap_rolling > vwap_full);
    }
}
