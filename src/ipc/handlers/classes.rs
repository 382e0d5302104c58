use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{calc_err, db_conn, required_param, required_str, resolve_config};
use crate::ipc::types::{AppState, Request};
use crate::model::{Roster, Subject};
use serde_json::json;
use uuid::Uuid;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match db::class_list(conn) {
        Ok(rows) => {
            let classes: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|r| json!({ "id": r.id, "name": r.name, "updatedAt": r.updated_at }))
                .collect();
            ok(&req.id, json!({ "classes": classes }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster: Roster = match required_param(req, "roster") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects: Vec<Subject> = match required_param(req, "subjects") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let config = match resolve_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = config.validate_roster(&roster, &subjects) {
        return calc_err(req, e);
    }

    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = req
        .params
        .get("classId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    match db::class_store(conn, &class_id, &subjects, &roster) {
        Ok(updated_at) => ok(
            &req.id,
            json!({ "classId": class_id, "updatedAt": updated_at }),
        ),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_classes_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::class_load(conn, &class_id) {
        Ok(Some(stored)) => ok(
            &req.id,
            json!({
                "classId": stored.id,
                "roster": stored.roster,
                "subjects": stored.subjects,
                "updatedAt": stored.updated_at,
            }),
        ),
        Ok(None) => err(&req.id, "not_found", "class not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::class_delete(conn, &class_id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "class not found", None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.save" => Some(handle_classes_save(state, req)),
        "classes.open" => Some(handle_classes_open(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
