//! Pure qualify-gate evaluation (spec §4.3).
//!
//! Every gate function takes an [`EvaluationSnapshot`] and a [`GateDef`] and
//! returns a [`QualifyResult`]. Evaluation never mutates state and never
//! performs I/O — the whole module is a pure function of its inputs, which
//! is what lets the decision engine call it synchronously on every tick.

use serde_json::Value;

use crate::evaluation::snapshot::{EvaluationSnapshot, QualifyOutcome, QualifyResult, QualifySummary};
use crate::strategy::document::GateDef;
use crate::types::Severity;

/// Evaluate every gate in `gates` against `snapshot` and aggregate the
/// result. Unknown gate types fail closed: they count as a failure at the
/// gate's declared severity rather than being silently skipped.
pub fn evaluate_gates(snapshot: &EvaluationSnapshot, gates: &[GateDef]) -> QualifySummary {
    let mut results = Vec::with_capacity(gates.len());
    let mut worst = Severity::None;
    let mut failed_count = 0usize;

    for gate in gates {
        let result = evaluate_one(snapshot, gate);
        if result.outcome == QualifyOutcome::Fail {
            failed_count += 1;
            if result.severity_on_fail > worst {
                worst = result.severity_on_fail;
            }
        }
        results.push(result);
    }

    // Spec §4.3: "Results are returned sorted with failures first, then by
    // descending severity, original order within ties." `sort_by_key` is
    // stable, so ties keep their original gate order.
    results.sort_by_key(|r| {
        let fail_rank = if r.outcome == QualifyOutcome::Fail { 0 } else { 1 };
        (fail_rank, std::cmp::Reverse(r.severity_on_fail))
    });

    QualifySummary {
        worst_severity: worst,
        failed_count,
        results,
    }
}

fn evaluate_one(snapshot: &EvaluationSnapshot, gate: &GateDef) -> QualifyResult {
    let (outcome, reasons) = match gate.gate_type.as_str() {
        "warnings_forbidden_absent" => warnings_forbidden_absent(snapshot, &gate.params),
        "warnings_contains_any" => warnings_contains_any(snapshot, &gate.params),
        "field_equals" => field_equals(snapshot, &gate.params),
        "number_lte" => number_lte(snapshot, &gate.params),
        "number_gte" => number_gte(snapshot, &gate.params),
        "pnl_lte" => pnl_lte(snapshot, &gate.params),
        other => (
            QualifyOutcome::Fail,
            vec![format!("unsupported gate type: {other}")],
        ),
    };

    QualifyResult {
        gate_id: gate.id.clone(),
        outcome,
        severity_on_fail: gate.severity_on_fail,
        reasons,
    }
}

fn str_array_param(params: &Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Passes when none of `params.forbidden` appear in `snapshot.warnings`.
fn warnings_forbidden_absent(
    snapshot: &EvaluationSnapshot,
    params: &Value,
) -> (QualifyOutcome, Vec<String>) {
    let forbidden = str_array_param(params, "forbidden");
    let present: Vec<String> = forbidden
        .into_iter()
        .filter(|w| snapshot.warnings.contains(w))
        .collect();
    if present.is_empty() {
        (QualifyOutcome::Pass, Vec::new())
    } else {
        let reasons = present
            .iter()
            .map(|w| format!("forbidden warning present: {w}"))
            .collect();
        (QualifyOutcome::Fail, reasons)
    }
}

/// Fails when any of `params.anyOf` appears in `snapshot.warnings` (spec
/// §4.3: `warnings_contains_any`) — the mirror image of
/// `warnings_forbidden_absent`'s param name, same fail-on-presence
/// semantics.
fn warnings_contains_any(
    snapshot: &EvaluationSnapshot,
    params: &Value,
) -> (QualifyOutcome, Vec<String>) {
    let candidates = str_array_param(params, "anyOf");
    let present: Vec<String> = candidates
        .into_iter()
        .filter(|w| snapshot.warnings.contains(w))
        .collect();
    if present.is_empty() {
        (QualifyOutcome::Pass, Vec::new())
    } else {
        let reasons = present
            .iter()
            .map(|w| format!("warning present: {w}"))
            .collect();
        (QualifyOutcome::Fail, reasons)
    }
}

/// Passes when the value at `params.path` (dotted, camelCase) equals
/// `params.value`.
fn field_equals(snapshot: &EvaluationSnapshot, params: &Value) -> (QualifyOutcome, Vec<String>) {
    let Some(path) = params.get("path").and_then(Value::as_str) else {
        return (
            QualifyOutcome::Fail,
            vec!["field_equals gate missing params.path".to_string()],
        );
    };
    let expected = params.get("value").cloned().unwrap_or(Value::Null);
    let actual = snapshot.resolve_path(path);
    if actual == expected {
        (QualifyOutcome::Pass, Vec::new())
    } else {
        (
            QualifyOutcome::Fail,
            vec![format!(
                "{path} = {actual}, expected {expected}"
            )],
        )
    }
}

/// Fails if the numeric value at `params.path` is non-finite (missing, null,
/// or otherwise unresolvable) or `> params.max` (spec §4.3: `number_lte`).
fn number_lte(snapshot: &EvaluationSnapshot, params: &Value) -> (QualifyOutcome, Vec<String>) {
    let Some(path) = params.get("path").and_then(Value::as_str) else {
        return (
            QualifyOutcome::Fail,
            vec!["number_lte gate missing params.path".to_string()],
        );
    };
    let Some(threshold) = params.get("max").and_then(Value::as_f64) else {
        return (
            QualifyOutcome::Fail,
            vec!["number_lte gate missing params.max".to_string()],
        );
    };
    let resolved = snapshot.resolve_path(path);
    let Some(actual) = resolved.as_f64().filter(|v| v.is_finite()) else {
        return (
            QualifyOutcome::Fail,
            vec![format!("{path} is non-finite or missing")],
        );
    };
    if actual <= threshold {
        (QualifyOutcome::Pass, Vec::new())
    } else {
        (
            QualifyOutcome::Fail,
            vec![format!("{path} = {actual} exceeds ceiling {threshold}")],
        )
    }
}

/// Fails if the numeric value at `params.path` is non-finite (missing, null,
/// or otherwise unresolvable) or `< params.min` (spec §4.3: `number_gte`).
fn number_gte(snapshot: &EvaluationSnapshot, params: &Value) -> (QualifyOutcome, Vec<String>) {
    let Some(path) = params.get("path").and_then(Value::as_str) else {
        return (
            QualifyOutcome::Fail,
            vec!["number_gte gate missing params.path".to_string()],
        );
    };
    let Some(threshold) = params.get("min").and_then(Value::as_f64) else {
        return (
            QualifyOutcome::Fail,
            vec!["number_gte gate missing params.min".to_string()],
        );
    };
    let resolved = snapshot.resolve_path(path);
    let Some(actual) = resolved.as_f64().filter(|v| v.is_finite()) else {
        return (
            QualifyOutcome::Fail,
            vec![format!("{path} is non-finite or missing")],
        );
    };
    if actual >= threshold {
        (QualifyOutcome::Pass, Vec::new())
    } else {
        (
            QualifyOutcome::Fail,
            vec![format!("{path} = {actual} below floor {threshold}")],
        )
    }
}

/// Fails if `derived.roiUnrealizedPct` is non-finite (missing) or `>
/// params.maxPnlPct` (spec §4.3: `pnl_lte`).
fn pnl_lte(snapshot: &EvaluationSnapshot, params: &Value) -> (QualifyOutcome, Vec<String>) {
    let Some(threshold) = params.get("maxPnlPct").and_then(Value::as_f64) else {
        return (
            QualifyOutcome::Fail,
            vec!["pnl_lte gate missing params.maxPnlPct".to_string()],
        );
    };
    let Some(actual) = snapshot.derived.roi_unrealized_pct.filter(|v| v.is_finite()) else {
        return (
            QualifyOutcome::Fail,
            vec!["roiUnrealizedPct is non-finite or missing".to_string()],
        );
    };
    if actual <= threshold {
        (QualifyOutcome::Pass, Vec::new())
    } else {
        (
            QualifyOutcome::Fail,
            vec![format!(
                "unrealized roi {actual}% exceeds pnl ceiling {threshold}%"
            )],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::snapshot::{Derived, EventsSnapshot, Indicators};

    fn base_snapshot() -> EvaluationSnapshot {
        EvaluationSnapshot {
            wallet_alias: "w1".to_string(),
            mint: "MintAAA".to_string(),
            trade_uuid: "t1".to_string(),
            created_at: chrono::Utc::now(),
            coin: None,
            best_pool: None,
            events: EventsSnapshot::default(),
            risk: None,
            pnl: None,
            derived: Derived::default(),
            chart: None,
            indicators: Indicators::default(),
            strategy: None,
            qualify: None,
            recommendation: None,
            regime: None,
            warnings: vec!["coin_stale".to_string()],
        }
    }

    fn gate(id: &str, gate_type: &str, params: Value, sev: Severity) -> GateDef {
        GateDef {
            id: id.to_string(),
            gate_type: gate_type.to_string(),
            params,
            severity_on_fail: sev,
        }
    }

    #[test]
    fn warnings_forbidden_absent_fails_when_present() {
        let snap = base_snapshot();
        let g = gate(
            "g1",
            "warnings_forbidden_absent",
            serde_json::json!({"forbidden": ["coin_stale"]}),
            Severity::Degrade,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.worst_severity, Severity::Degrade);
    }

    #[test]
    fn warnings_contains_any_fails_when_one_of_the_listed_warnings_is_present() {
        let snap = base_snapshot();
        let g = gate(
            "g1b",
            "warnings_contains_any",
            serde_json::json!({"anyOf": ["coin_stale", "risk_stale"]}),
            Severity::Warn,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn warnings_contains_any_passes_when_none_of_the_listed_warnings_is_present() {
        let snap = base_snapshot();
        let g = gate(
            "g1c",
            "warnings_contains_any",
            serde_json::json!({"anyOf": ["events_stale", "risk_stale"]}),
            Severity::Warn,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 0);
    }

    #[test]
    fn number_lte_fails_closed_when_field_missing() {
        let snap = base_snapshot();
        let g = gate(
            "g2",
            "number_lte",
            serde_json::json!({"path": "derived.roiUnrealizedPct", "max": 10.0}),
            Severity::Warn,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn number_lte_passes_when_within_ceiling() {
        let mut snap = base_snapshot();
        snap.derived.roi_unrealized_pct = Some(5.0);
        let g = gate(
            "g2b",
            "number_lte",
            serde_json::json!({"path": "derived.roiUnrealizedPct", "max": 10.0}),
            Severity::Warn,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 0);
    }

    #[test]
    fn pnl_lte_fails_when_roi_exceeds_ceiling() {
        let mut snap = base_snapshot();
        snap.derived.roi_unrealized_pct = Some(50.0);
        let g = gate(
            "g3",
            "pnl_lte",
            serde_json::json!({"maxPnlPct": 20.0}),
            Severity::Exit,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.worst_severity, Severity::Exit);
    }

    #[test]
    fn pnl_lte_fails_closed_when_roi_missing() {
        let snap = base_snapshot();
        let g = gate(
            "g3b",
            "pnl_lte",
            serde_json::json!({"maxPnlPct": 20.0}),
            Severity::Exit,
        );
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 1);
    }

    #[test]
    fn unknown_gate_type_fails_closed() {
        let snap = base_snapshot();
        let g = gate("g4", "made_up_gate", serde_json::json!({}), Severity::Trim);
        let summary = evaluate_gates(&snap, &[g]);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.worst_severity, Severity::Trim);
    }

    #[test]
    fn worst_severity_is_max_over_failed_gates() {
        let snap = base_snapshot();
        let gates = vec![
            gate(
                "g1",
                "warnings_forbidden_absent",
                serde_json::json!({"forbidden": ["coin_stale"]}),
                Severity::Warn,
            ),
            gate("g2", "made_up", serde_json::json!({}), Severity::Exit),
        ];
        let summary = evaluate_gates(&snap, &gates);
        assert_eq!(summary.failed_count, 2);
        assert_eq!(summary.worst_severity, Severity::Exit);
    }

    #[test]
    fn results_are_sorted_failures_first_then_by_descending_severity() {
        let snap = base_snapshot();
        let gates = vec![
            gate("pass-1", "number_gte", serde_json::json!({"path": "derived.roiUnrealizedPct", "min": -1000.0}), Severity::Warn),
            gate("fail-warn", "made_up", serde_json::json!({}), Severity::Warn),
            gate("fail-exit", "made_up", serde_json::json!({}), Severity::Exit),
            gate("fail-trim-a", "made_up", serde_json::json!({}), Severity::Trim),
            gate("fail-trim-b", "made_up", serde_json::json!({}), Severity::Trim),
        ];
        // `pass-1` actually fails (missing roi field fails closed), so give
        // it a real passing gate instead: field_equals matching a real value.
        let mut snap_with_roi = snap.clone();
        snap_with_roi.derived.roi_unrealized_pct = Some(5.0);
        let summary = evaluate_gates(&snap_with_roi, &gates);

        let ids: Vec<&str> = summary.results.iter().map(|r| r.gate_id.as_str()).collect();
        assert_eq!(ids, vec!["fail-exit", "fail-trim-a", "fail-trim-b", "fail-warn", "pass-1"]);
        assert_eq!(summary.results[0].outcome, QualifyOutcome::Fail);
        assert_eq!(summary.results[4].outcome, QualifyOutcome::Pass);
    }
}
