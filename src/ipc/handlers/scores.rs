use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_f64, required_param, required_str, resolve_config};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    CatConfig, CatSlot, ExerciseEntry, LearnerId, Subject, SubjectId, TerminalScoreDetail,
};
use serde_json::{json, Value};
use uuid::Uuid;

type Edit = Result<Value, Value>;

/// Loads a stored class, applies `edit`, and writes the class back when the
/// edit succeeds.
fn edit_class<F>(state: &mut AppState, req: &Request, edit: F) -> Value
where
    F: FnOnce(&mut db::StoredClass, &EngineConfig) -> Edit,
{
    let config = match resolve_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let mut stored = match db::class_load(conn, &class_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let result = match edit(&mut stored, &config) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = db::class_store(conn, &stored.id, &stored.subjects, &stored.roster) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, result)
}

fn find_subject<'a>(req: &Request, subjects: &'a [Subject], id: &SubjectId) -> Result<&'a Subject, Value> {
    subjects.iter().find(|s| &s.id == id).ok_or_else(|| {
        err(
            &req.id,
            "unknown_subject",
            format!("unknown subject: {}", id),
            Some(json!({ "subjectId": id.as_str() })),
        )
    })
}

fn require_learner(req: &Request, stored: &db::StoredClass, id: &LearnerId) -> Result<(), Value> {
    if stored.roster.learner(id).is_some() {
        Ok(())
    } else {
        Err(err(&req.id, "not_found", format!("learner not found: {}", id), None))
    }
}

fn parse_slot(req: &Request) -> Result<CatSlot, Value> {
    req.params
        .get("slot")
        .and_then(|v| v.as_i64())
        .and_then(CatSlot::from_index)
        .ok_or_else(|| err(&req.id, "bad_params", "slot must be 1, 2 or 3", None))
}

fn handle_set_cat(state: &mut AppState, req: &Request) -> Value {
    let parsed = (|| {
        Ok::<_, Value>((
            SubjectId::new(required_str(req, "subjectId")?),
            LearnerId::new(required_str(req, "learnerId")?),
            parse_slot(req)?,
            required_f64(req, "score")?,
        ))
    })();
    let (subject_id, learner_id, slot, score) = match parsed {
        Ok(v) => v,
        Err(e) => return e,
    };

    edit_class(state, req, |stored, _config| {
        find_subject(req, &stored.subjects, &subject_id)?;
        require_learner(req, stored, &learner_id)?;
        let Some(cat) = stored.roster.cats.iter_mut().find(|c| c.subject == subject_id) else {
            return Err(err(
                &req.id,
                "not_found",
                "no CAT configuration for subject; set the CAT maxima first",
                None,
            ));
        };
        let stored_score = cat.record(slot, learner_id.clone(), score);
        Ok(json!({ "score": stored_score }))
    })
}

fn handle_set_cat_max(state: &mut AppState, req: &Request) -> Value {
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => SubjectId::new(v),
        Err(e) => return e,
    };
    let slot = match parse_slot(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max = match required_f64(req, "max") {
        Ok(v) => v,
        Err(e) => return e,
    };

    edit_class(state, req, |stored, _config| {
        find_subject(req, &stored.subjects, &subject_id)?;
        let idx = match stored.roster.cats.iter().position(|c| c.subject == subject_id) {
            Some(i) => i,
            None => {
                stored
                    .roster
                    .cats
                    .push(CatConfig::new(subject_id.clone(), 0.0, 0.0, 0.0));
                stored.roster.cats.len() - 1
            }
        };
        let cat = &mut stored.roster.cats[idx];
        cat.set_max(slot, max);
        Ok(json!({ "cat": cat }))
    })
}

fn handle_set_terminal(state: &mut AppState, req: &Request) -> Value {
    let parsed = (|| {
        Ok::<_, Value>((
            SubjectId::new(required_str(req, "subjectId")?),
            LearnerId::new(required_str(req, "learnerId")?),
            required_f64(req, "objective")?,
            required_f64(req, "theory")?,
        ))
    })();
    let (subject_id, learner_id, objective, theory) = match parsed {
        Ok(v) => v,
        Err(e) => return e,
    };
    let remark = req
        .params
        .get("remark")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    edit_class(state, req, |stored, config| {
        let subject = find_subject(req, &stored.subjects, &subject_id)?;
        let maxima = config.terminal_maxima_for(subject, &stored.roster);
        require_learner(req, stored, &learner_id)?;
        let detail = TerminalScoreDetail::clamped(
            objective,
            theory,
            remark,
            maxima.section_a,
            maxima.section_b,
        );
        let out = json!({ "detail": detail, "maxA": maxima.section_a, "maxB": maxima.section_b });
        if let Some(learner) = stored.roster.learner_mut(&learner_id) {
            learner.terminal.insert(subject_id.clone(), detail);
        }
        Ok(out)
    })
}

fn handle_upsert_exercise(state: &mut AppState, req: &Request) -> Value {
    let mut entry: ExerciseEntry = match required_param(req, "entry") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if entry.id.trim().is_empty() {
        entry.id = Uuid::new_v4().to_string();
    }
    entry.clamp_scores();

    edit_class(state, req, |stored, _config| {
        find_subject(req, &stored.subjects, &entry.subject)?;
        let out = json!({ "entry": &entry });
        match stored.roster.exercises.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => stored.roster.exercises.push(entry),
        }
        Ok(out)
    })
}

fn handle_delete_exercise(state: &mut AppState, req: &Request) -> Value {
    let entry_id = match required_str(req, "entryId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_class(state, req, |stored, _config| {
        let before = stored.roster.exercises.len();
        stored.roster.exercises.retain(|e| e.id != entry_id);
        if stored.roster.exercises.len() == before {
            return Err(err(&req.id, "not_found", "exercise entry not found", None));
        }
        Ok(json!({ "deleted": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "scores.setCat" => Some(handle_set_cat(state, req)),
        "scores.setCatMax" => Some(handle_set_cat_max(state, req)),
        "scores.setTerminal" => Some(handle_set_terminal(state, req)),
        "scores.upsertExercise" => Some(handle_upsert_exercise(state, req)),
        "scores.deleteExercise" => Some(handle_delete_exercise(state, req)),
        _ => None,
    }
}
