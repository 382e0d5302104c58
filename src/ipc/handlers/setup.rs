use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, stored_config, GRADING_SETTINGS_KEY};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            _ => None,
        }
    }
}

const GRADING_FIELDS: &[&str] = &[
    "weights",
    "scale",
    "distribution",
    "terminalMax",
    "science",
    "coreSubjects",
    "remarkOverrides",
    "policy",
];

/// Applies a top-level patch and re-validates the whole config.
fn merge_grading_patch(current: &EngineConfig, patch: &Map<String, Value>) -> Result<EngineConfig, String> {
    let mut merged = serde_json::to_value(current).map_err(|e| e.to_string())?;
    let Some(obj) = merged.as_object_mut() else {
        return Err("grading config did not serialize to an object".into());
    };
    for (k, v) in patch {
        if !GRADING_FIELDS.contains(&k.as_str()) {
            return Err(format!("unknown grading field: {}", k));
        }
        obj.insert(k.clone(), v.clone());
    }
    serde_json::from_value(merged).map_err(|e| e.to_string())
}

/// Base for a patch. An unreadable saved config is replaced from defaults so
/// the workspace can be repaired through `setup.update`.
fn config_for_update(conn: &rusqlite::Connection) -> anyhow::Result<EngineConfig> {
    let Some(saved) = db::settings_get_json(conn, GRADING_SETTINGS_KEY)? else {
        return Ok(EngineConfig::default());
    };
    Ok(serde_json::from_value(saved).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "replacing unreadable grading config");
        EngineConfig::default()
    }))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grading = match stored_config(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "grading": grading }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(SetupSection::Grading) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let current = match config_for_update(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let updated = match merge_grading_patch(&current, patch_obj) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "config_invalid", msg, None),
    };
    let value = match serde_json::to_value(&updated) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "config_invalid", e.to_string(), None),
    };
    if let Err(e) = db::settings_set_json(conn, GRADING_SETTINGS_KEY, &value) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    state.cache.clear();
    tracing::info!(fields = ?patch_obj.keys().collect::<Vec<_>>(), "grading config updated");
    ok(&req.id, json!({ "grading": value }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_replaces_only_named_fields() {
        let current = EngineConfig::default();
        let patch = json!({ "distribution": "normal", "coreSubjects": ["eng", "math"] });
        let updated = merge_grading_patch(&current, patch.as_object().expect("object"))
            .expect("merge");
        assert_eq!(updated.core_subjects.len(), 2);
        assert_eq!(updated.weights, current.weights);
        assert_eq!(updated.scale, current.scale);
    }

    #[test]
    fn patch_rejects_unknown_fields_and_bad_scales() {
        let current = EngineConfig::default();
        let unknown = json!({ "colour": "red" });
        assert!(merge_grading_patch(&current, unknown.as_object().expect("object")).is_err());

        let empty_scale = json!({ "scale": [] });
        assert!(merge_grading_patch(&current, empty_scale.as_object().expect("object")).is_err());
    }
}
