use crate::calc::CalcError;
use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{Roster, Subject};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;

pub const GRADING_SETTINGS_KEY: &str = "setup.grading";

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a number", key), None))
}

pub fn required_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None))
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn calc_err(req: &Request, e: CalcError) -> serde_json::Value {
    tracing::warn!(code = %e.code, message = %e.message, method = %req.method, "calc rejected request");
    err(&req.id, &e.code, e.message, e.details)
}

/// Institution config saved in the workspace, or the built-in defaults when
/// none is saved. A saved value that no longer parses is `config_invalid`.
pub fn stored_config(conn: &Connection, req: &Request) -> Result<EngineConfig, serde_json::Value> {
    let saved = db::settings_get_json(conn, GRADING_SETTINGS_KEY)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    let Some(saved) = saved else {
        return Ok(EngineConfig::default());
    };
    serde_json::from_value(saved).map_err(|e| {
        tracing::warn!(error = %e, "saved grading config is unreadable");
        err(
            &req.id,
            "config_invalid",
            format!("saved grading config is invalid: {}", e),
            Some(json!({ "key": GRADING_SETTINGS_KEY })),
        )
    })
}

/// Inline `params.config` wins over the workspace setting, which wins over
/// defaults.
pub fn resolve_config(state: &AppState, req: &Request) -> Result<EngineConfig, serde_json::Value> {
    if let Some(raw) = req.params.get("config").filter(|v| !v.is_null()) {
        return serde_json::from_value(raw.clone())
            .map_err(|e| err(&req.id, "config_invalid", e.to_string(), None));
    }
    match state.db.as_ref() {
        Some(conn) => stored_config(conn, req),
        None => Ok(EngineConfig::default()),
    }
}

/// Roster and subjects from a stored class (`classId`) or inline params.
pub fn resolve_class_inputs(
    state: &AppState,
    req: &Request,
) -> Result<(Roster, Vec<Subject>), serde_json::Value> {
    if let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) {
        let conn = db_conn(state, req)?;
        let stored = db::class_load(conn, class_id)
            .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?
            .ok_or_else(|| err(&req.id, "not_found", "class not found", None))?;
        return Ok((stored.roster, stored.subjects));
    }
    let roster: Roster = required_param(req, "roster")?;
    let subjects: Vec<Subject> = required_param(req, "subjects")?;
    Ok((roster, subjects))
}
