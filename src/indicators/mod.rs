// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the core technical indicators used
// by the evaluation engine.  Every public function returns `Option<T>` so
// callers are forced to handle insufficient-data and numerical-edge-case
// scenarios rather than fabricating a default.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod slope;
pub mod vwap;
