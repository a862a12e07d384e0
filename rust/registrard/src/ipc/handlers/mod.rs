pub mod backup;
pub mod config;
pub mod core;
pub mod courses;
pub mod enrollments;
pub mod export;
pub mod grades;
pub mod programs;
pub mod scales;
pub mod semesters;
pub mod students;
pub mod views;

use crate::config::WorkspaceConfig;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};

/// Runs `f` against the open workspace and wraps the outcome in a response.
pub(crate) fn with_db<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr::new("no_workspace", "select a workspace first").response(&req.id);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub(crate) fn load_config(conn: &Connection) -> Result<WorkspaceConfig, HandlerErr> {
    WorkspaceConfig::load(conn).map_err(HandlerErr::db_query)
}

pub(crate) fn row_exists(
    conn: &Connection,
    table: &str,
    id: &str,
) -> Result<bool, HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    conn.query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
        .map_err(HandlerErr::db_query)
}

pub(crate) fn count_where(
    conn: &Connection,
    table: &str,
    column: &str,
    value: &str,
) -> Result<i64, HandlerErr> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", table, column);
    conn.query_row(&sql, [value], |r| r.get(0))
        .map_err(HandlerErr::db_query)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Accumulates `column = ?` assignments for a patch-style UPDATE.
#[derive(Default)]
pub(crate) struct SetClause {
    sets: Vec<&'static str>,
    values: Vec<rusqlite::types::Value>,
}

impl SetClause {
    pub fn push(&mut self, assignment: &'static str, value: impl Into<rusqlite::types::Value>) {
        self.sets.push(assignment);
        self.values.push(value.into());
    }

    /// Empty text clears the column.
    pub fn push_opt_text(&mut self, assignment: &'static str, value: String) {
        if value.is_empty() {
            self.push(assignment, rusqlite::types::Value::Null);
        } else {
            self.push(assignment, value);
        }
    }

    pub fn execute(self, conn: &Connection, table: &str, id: &str) -> Result<usize, HandlerErr> {
        if self.sets.is_empty() {
            return Ok(0);
        }
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, self.sets.join(", "));
        let mut values = self.values;
        values.push(id.to_string().into());
        conn.execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|e| HandlerErr::db_write("db_update_failed", table, e))
    }
}
