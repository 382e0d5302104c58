use crate::cache::ReportCache;
use crate::calc::{self, ClassStatistics};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    calc_err, required_f64, required_param, required_str, resolve_class_inputs, resolve_config,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{LearnerId, SubjectId};
use serde_json::{json, Value};

fn handle_class_stats(_state: &mut AppState, req: &Request) -> Value {
    let scores: Vec<f64> = match required_param(req, "scores") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(calc::compute_class_statistics(&scores)))
}

fn handle_subject_score(state: &mut AppState, req: &Request) -> Value {
    let config = match resolve_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (roster, subjects) = match resolve_class_inputs(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let learner_id = match required_str(req, "learnerId") {
        Ok(v) => LearnerId::new(v),
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => SubjectId::new(v),
        Err(e) => return e,
    };
    let Some(learner) = roster.learner(&learner_id) else {
        return err(&req.id, "not_found", "learner not found", None);
    };
    let Some(subject) = subjects.iter().find(|s| s.id == subject_id) else {
        return err(&req.id, "unknown_subject", format!("unknown subject: {}", subject_id), None);
    };

    let breakdown = calc::component_breakdown(learner, subject, &roster, &config);
    ok(
        &req.id,
        json!({ "score": breakdown.total, "breakdown": breakdown }),
    )
}

fn handle_resolve_grade(state: &mut AppState, req: &Request) -> Value {
    let config = match resolve_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let parsed = (|| {
        Ok::<_, Value>((
            required_f64(req, "score")?,
            required_f64(req, "mean")?,
            required_f64(req, "stdDev")?,
        ))
    })();
    let (score, mean, std_dev) = match parsed {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(class_size) = req.params.get("classSize").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "classSize must be a non-negative integer", None);
    };

    let stats = ClassStatistics { mean, std_dev };
    let grade = calc::resolve_grade(score, &stats, &config, class_size as usize);
    ok(&req.id, json!(grade))
}

fn handle_validate(state: &mut AppState, req: &Request) -> Value {
    let config = match resolve_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (roster, subjects) = match resolve_class_inputs(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match config.validate_roster(&roster, &subjects) {
        Ok(()) => ok(&req.id, json!({ "valid": true })),
        Err(e) => calc_err(req, e),
    }
}

fn handle_process_roster(state: &mut AppState, req: &Request) -> Value {
    let config = match resolve_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (roster, subjects) = match resolve_class_inputs(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let key = match ReportCache::key_for(&(&roster, &config, &subjects)) {
        Ok(k) => k,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    if let Some(hit) = state.cache.get(&key) {
        tracing::debug!(key = %key, "roster report cache hit");
        return ok(&req.id, hit.clone());
    }

    let report = match calc::process_roster(&roster, &config, &subjects) {
        Ok(r) => r,
        Err(e) => return calc_err(req, e),
    };
    let value = json!(report);
    state.cache.insert(key, value.clone());
    tracing::debug!(cached = state.cache.cached_reports(), "roster report cached");
    ok(&req.id, value)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grading.classStats" => Some(handle_class_stats(state, req)),
        "grading.subjectScore" => Some(handle_subject_score(state, req)),
        "grading.resolveGrade" => Some(handle_resolve_grade(state, req)),
        "grading.validate" => Some(handle_validate(state, req)),
        "grading.processRoster" => Some(handle_process_roster(state, req)),
        _ => None,
    }
}
