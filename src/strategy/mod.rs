pub mod document;
pub mod gates;

pub use document::{GateDef, Qualify, StrategyBook, StrategyDefaults, StrategyDocument, StrategyKind, TrailingStopConfig};
pub use gates::evaluate_gates;
