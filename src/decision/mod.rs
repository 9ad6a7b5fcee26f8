//! The decision engine (spec §4.3): pure, synchronous strategy selection and
//! gate evaluation over an already-composed [`EvaluationSnapshot`].

use crate::evaluation::snapshot::{EvaluationSnapshot, QualifySummary, StrategySelection};
use crate::strategy::document::{StrategyBook, StrategyKind};
use crate::strategy::gates::evaluate_gates;
use crate::types::{PositionSummary, Recommendation, StrategySource};

/// The outcome of running the decision engine once for a position: which
/// strategy was selected, the qualify summary it produced, and the
/// recommendation derived from the worst severity.
#[derive(Debug, Clone)]
pub struct Decision {
    pub strategy: StrategySelection,
    pub qualify: QualifySummary,
    pub recommendation: Recommendation,
}

/// Select the effective strategy for `position` (spec §4.3).
///
/// An explicit `strategyName` on the position is matched, case-insensitively,
/// against FLASH, then CAMPAIGN, then HYBRID (in that priority order) — the
/// first token match wins and the source is `db`. When no explicit name
/// matches, the engine runs qualify against FLASH first; if all its gates
/// pass against `snapshot`, FLASH is picked; else HYBRID is tried the same
/// way; else CAMPAIGN is the final fallback regardless of its own qualify
/// result. Source is `inferred` in every fallback branch.
fn select_strategy_kind(
    position: &PositionSummary,
    snapshot: &EvaluationSnapshot,
    book: &StrategyBook,
) -> (StrategyKind, StrategySource) {
    if let Some(name) = position.strategy_name.as_deref() {
        let upper = name.to_ascii_uppercase();
        for kind in StrategyKind::EXPLICIT_PRIORITY {
            if upper.contains(&kind.to_string()) {
                return (kind, StrategySource::Db);
            }
        }
    }

    let fallback = StrategyKind::STRICTEST_FIRST;
    for kind in &fallback[..fallback.len() - 1] {
        let doc = book.get(*kind);
        let qualify = evaluate_gates(snapshot, &doc.qualify.gates);
        if qualify.failed_count == 0 {
            return (*kind, StrategySource::Inferred);
        }
    }
    (fallback[fallback.len() - 1], StrategySource::Inferred)
}

/// Run the full decision pipeline for a position: select a strategy,
/// evaluate its qualify gates against `snapshot`, and derive a
/// recommendation from the worst severity observed.
pub fn decide(
    position: &PositionSummary,
    snapshot: &EvaluationSnapshot,
    book: &StrategyBook,
) -> Decision {
    let (kind, source) = select_strategy_kind(position, snapshot, book);
    let doc = book.get(kind);
    let qualify = evaluate_gates(snapshot, &doc.qualify.gates);
    let recommendation = qualify.worst_severity.recommendation();
    let strategy = StrategySelection {
        id: doc.strategy_id.clone(),
        name: doc.name.clone(),
        source,
    };

    Decision {
        strategy,
        qualify,
        recommendation,
    }
}
