//! Per-position trailing-stop state machine (spec §3 "Trailing-stop state"
//! row; spec §4.5), grounded on the teacher's `PositionManager` highest-price
//! tracking idiom but simplified to the long-only, USD-denominated case this
//! daemon manages.

use chrono::{DateTime, Utc};

use crate::strategy::document::TrailingStopConfig;

/// Per-tradeUuid trailing-stop state.
#[derive(Debug, Clone)]
pub struct TrailingStopState {
    pub trade_uuid: String,
    pub config: TrailingStopConfig,
    pub active: bool,
    pub high_water_usd: f64,
    pub stop_usd: f64,
    pub breach_count: u32,
    pub last_price_usd: Option<f64>,
    pub last_price_ts_ms: Option<i64>,
    pub last_action_ts_ms: Option<i64>,
}

/// What the trailing-stop tick decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingAction {
    /// No action: either not yet armed, or price moved favourably.
    None,
    /// The hard stop-loss floor was breached — exit immediately regardless of
    /// breach-confirmation count.
    HardStop,
    /// The trailing stop has been breached `breachConfirmations` times in a
    /// row and the action debounce window has elapsed.
    TrailBreach,
}

impl TrailingStopState {
    pub fn new(trade_uuid: impl Into<String>, config: TrailingStopConfig) -> Self {
        Self {
            trade_uuid: trade_uuid.into(),
            config,
            active: false,
            high_water_usd: 0.0,
            stop_usd: 0.0,
            breach_count: 0,
            last_price_usd: None,
            last_price_ts_ms: None,
            last_action_ts_ms: None,
        }
    }

    /// Feed a fresh price observation into the state machine and decide
    /// whether an exit action is warranted.
    ///
    /// `entry_price_usd` is the position's cost basis, used to determine
    /// activation (price must be up `activationPct` from entry before the
    /// trail arms) and the hard stop-loss floor (down `hardStopLossPct` from
    /// entry, checked unconditionally once a price is known).
    pub fn on_price(
        &mut self,
        entry_price_usd: f64,
        price_usd: f64,
        now_ms: i64,
    ) -> TrailingAction {
        self.last_price_usd = Some(price_usd);
        self.last_price_ts_ms = Some(now_ms);

        if entry_price_usd <= 0.0 || price_usd <= 0.0 {
            return TrailingAction::None;
        }

        let hard_stop_floor =
            entry_price_usd * (1.0 - self.config.hard_stop_loss_pct / 100.0);
        if price_usd <= hard_stop_floor {
            if self.debounce_elapsed(now_ms) {
                self.last_action_ts_ms = Some(now_ms);
                return TrailingAction::HardStop;
            }
            return TrailingAction::None;
        }

        if !self.active {
            let activation_price =
                entry_price_usd * (1.0 + self.config.activation_pct / 100.0);
            if price_usd >= activation_price {
                self.active = true;
                self.high_water_usd = price_usd;
                self.stop_usd = price_usd * (1.0 - self.config.trail_pct / 100.0);
            }
            return TrailingAction::None;
        }

        if price_usd > self.high_water_usd {
            self.high_water_usd = price_usd;
            self.stop_usd = price_usd * (1.0 - self.config.trail_pct / 100.0);
            self.breach_count = 0;
            return TrailingAction::None;
        }

        if price_usd <= self.stop_usd {
            self.breach_count += 1;
            if self.breach_count >= self.config.breach_confirmations
                && self.debounce_elapsed(now_ms)
            {
                self.last_action_ts_ms = Some(now_ms);
                return TrailingAction::TrailBreach;
            }
        } else {
            self.breach_count = 0;
        }

        TrailingAction::None
    }

    fn debounce_elapsed(&self, now_ms: i64) -> bool {
        match self.last_action_ts_ms {
            Some(last) => now_ms - last >= self.config.action_debounce_ms as i64,
            None => true,
        }
    }

    /// Whether `ts` is stale relative to `poll_ms` — used by the controller
    /// to decide whether to skip a position whose price quote is too old.
    pub fn is_price_stale(&self, now_ms: i64, max_age_ms: i64) -> bool {
        match self.last_price_ts_ms {
            Some(ts) => now_ms - ts > max_age_ms,
            None => true,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch, for callers that need a
/// plain `i64` rather than a `DateTime`.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrailingStopConfig {
        TrailingStopConfig {
            activation_pct: 10.0,
            trail_pct: 8.0,
            poll_ms: 5000,
            breach_confirmations: 2,
            action_debounce_ms: 30_000,
            hard_stop_loss_pct: 25.0,
        }
    }

    #[test]
    fn does_not_arm_before_activation_threshold() {
        let mut state = TrailingStopState::new("t1", config());
        let action = state.on_price(1.0, 1.05, 0);
        assert_eq!(action, TrailingAction::None);
        assert!(!state.active);
    }

    #[test]
    fn arms_once_activation_threshold_is_crossed() {
        let mut state = TrailingStopState::new("t1", config());
        state.on_price(1.0, 1.11, 0);
        assert!(state.active);
        assert_eq!(state.high_water_usd, 1.11);
    }

    #[test]
    fn raises_stop_as_high_water_rises() {
        let mut state = TrailingStopState::new("t1", config());
        state.on_price(1.0, 1.11, 0);
        let first_stop = state.stop_usd;
        state.on_price(1.0, 1.30, 1000);
        assert!(state.stop_usd > first_stop);
    }

    #[test]
    fn trail_breach_requires_confirmations_and_debounce() {
        let mut state = TrailingStopState::new("t1", config());
        state.on_price(1.0, 1.20, 0);
        let stop = state.stop_usd;
        let breach_price = stop - 0.001;

        let first = state.on_price(1.0, breach_price, 1000);
        assert_eq!(first, TrailingAction::None);
        assert_eq!(state.breach_count, 1);

        let second = state.on_price(1.0, breach_price, 2000);
        assert_eq!(second, TrailingAction::TrailBreach);
    }

    #[test]
    fn hard_stop_fires_regardless_of_activation() {
        let mut state = TrailingStopState::new("t1", config());
        let action = state.on_price(1.0, 0.70, 0);
        assert_eq!(action, TrailingAction::HardStop);
    }

    #[test]
    fn hard_stop_does_not_refire_within_the_debounce_window() {
        let mut state = TrailingStopState::new("t1", config());
        let first = state.on_price(1.0, 0.70, 0);
        assert_eq!(first, TrailingAction::HardStop);

        // Price stays under the floor on every subsequent fast-loop tick;
        // without the debounce this would fire again on every call.
        let second = state.on_price(1.0, 0.69, 1_000);
        assert_eq!(second, TrailingAction::None);
        let third = state.on_price(1.0, 0.68, 5_000);
        assert_eq!(third, TrailingAction::None);

        let after_debounce = state.on_price(1.0, 0.68, 30_000);
        assert_eq!(after_debounce, TrailingAction::HardStop);
    }

    #[test]
    fn recovering_above_stop_resets_breach_count() {
        let mut state = TrailingStopState::new("t1", config());
        state.on_price(1.0, 1.20, 0);
        let stop = state.stop_usd;
        state.on_price(1.0, stop - 0.001, 1000);
        assert_eq!(state.breach_count, 1);
        state.on_price(1.0, stop + 0.10, 2000);
        assert_eq!(state.breach_count, 0);
    }
}
