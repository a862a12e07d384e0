use super::{load_config, with_db};
use crate::config::ConfigPatch;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn config_get(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    Ok(json!({ "config": cfg }))
}

fn config_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let patch: ConfigPatch = if params.is_null() {
        ConfigPatch::default()
    } else {
        serde_json::from_value(params.clone())
            .map_err(|e| HandlerErr::bad_params(e.to_string()))?
    };
    let current = load_config(conn)?;
    let next = current
        .apply(patch)
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    next.save(conn)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tracing::info!(
        midterm = next.weights.midterm,
        coursework = next.weights.coursework,
        final_exam = next.weights.final_exam,
        default_page_size = next.default_page_size,
        "config updated"
    );

    // Stored totals are only recomputed on each grade's next upsert.
    let stale_grades = if next.weights != current.weights {
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))
            .map_err(HandlerErr::db_query)?;
        if n > 0 {
            tracing::info!(grades = n, "stored grades keep totals from the previous weights");
        }
        n
    } else {
        0
    };
    Ok(json!({ "config": next, "staleGrades": stale_grades }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(with_db(state, req, config_get)),
        "config.update" => Some(with_db(state, req, config_update)),
        _ => None,
    }
}
