use crate::model::{Roster, Subject};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "nrtgraded.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subjects_json TEXT NOT NULL,
            roster_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    ensure_classes_updated_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_name ON classes(name)",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("corrupt setting {}", key))?,
        )),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ClassRow {
    pub id: String,
    pub name: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredClass {
    pub id: String,
    pub subjects: Vec<Subject>,
    pub roster: Roster,
    pub updated_at: Option<String>,
}

pub fn class_list(conn: &Connection) -> anyhow::Result<Vec<ClassRow>> {
    let mut stmt = conn.prepare("SELECT id, name, updated_at FROM classes ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassRow {
                id: r.get(0)?,
                name: r.get(1)?,
                updated_at: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn class_load(conn: &Connection, class_id: &str) -> anyhow::Result<Option<StoredClass>> {
    let row: Option<(String, String, Option<String>)> = conn
        .query_row(
            "SELECT subjects_json, roster_json, updated_at FROM classes WHERE id = ?",
            [class_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((subjects_json, roster_json, updated_at)) = row else {
        return Ok(None);
    };
    let subjects: Vec<Subject> = serde_json::from_str(&subjects_json)
        .with_context(|| format!("corrupt subjects for class {}", class_id))?;
    let roster: Roster = serde_json::from_str(&roster_json)
        .with_context(|| format!("corrupt roster for class {}", class_id))?;
    Ok(Some(StoredClass {
        id: class_id.to_string(),
        subjects,
        roster,
        updated_at,
    }))
}

/// Inserts or replaces a class snapshot and returns its `updated_at`.
pub fn class_store(
    conn: &Connection,
    class_id: &str,
    subjects: &[Subject],
    roster: &Roster,
) -> anyhow::Result<String> {
    let updated_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO classes(id, name, subjects_json, roster_json, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            subjects_json = excluded.subjects_json,
            roster_json = excluded.roster_json,
            updated_at = excluded.updated_at",
        (
            class_id,
            &roster.class_name,
            serde_json::to_string(subjects)?,
            serde_json::to_string(roster)?,
            &updated_at,
        ),
    )?;
    Ok(updated_at)
}

pub fn class_delete(conn: &Connection, class_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    Ok(n > 0)
}

fn ensure_classes_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "classes", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE classes ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Learner;

    fn temp_workspace(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let ws = temp_workspace("nrtgraded-db-settings");
        let conn = open_db(&ws).expect("open db");
        assert!(settings_get_json(&conn, "setup.grading")
            .expect("get")
            .is_none());
        settings_set_json(&conn, "setup.grading", &serde_json::json!({ "a": 1 })).expect("set");
        settings_set_json(&conn, "setup.grading", &serde_json::json!({ "a": 2 })).expect("set");
        let v = settings_get_json(&conn, "setup.grading")
            .expect("get")
            .expect("present");
        assert_eq!(v["a"], 2);
    }

    #[test]
    fn class_store_load_delete() {
        let ws = temp_workspace("nrtgraded-db-classes");
        let conn = open_db(&ws).expect("open db");
        let roster = Roster {
            class_name: "Basic 9".to_string(),
            learners: vec![Learner::new("l1", "Esi")],
            ..Roster::default()
        };
        let subjects = vec![Subject::new("math", "Mathematics")];
        class_store(&conn, "c1", &subjects, &roster).expect("store");

        let list = class_list(&conn).expect("list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Basic 9");

        let loaded = class_load(&conn, "c1").expect("load").expect("present");
        assert_eq!(loaded.roster, roster);
        assert_eq!(loaded.subjects, subjects);
        assert!(loaded.updated_at.is_some());

        assert!(class_delete(&conn, "c1").expect("delete"));
        assert!(class_load(&conn, "c1").expect("load").is_none());
        assert!(!class_delete(&conn, "c1").expect("delete again"));
    }
}
