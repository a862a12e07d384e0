use super::views::{list_screen, Screen};
use super::{count_where, load_config, new_id, row_exists, with_db, SetClause};
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_opt_bool, get_opt_str, get_patch, get_required_str, parse_list_query};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), HandlerErr> {
    if start > end {
        return Err(HandlerErr::bad_params("startDate must not be after endDate"));
    }
    Ok(())
}

fn semesters_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;
    list_screen(conn, Screen::Semesters, &q)
}

fn semesters_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let academic_year = get_required_str(params, "academicYear")?;
    let start = parse_date("startDate", &get_required_str(params, "startDate")?)?;
    let end = parse_date("endDate", &get_required_str(params, "endDate")?)?;
    check_range(start, end)?;
    let is_current = get_opt_bool(params, "isCurrent")?.unwrap_or(false);

    let id = new_id();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    if is_current {
        tx.execute("UPDATE semesters SET is_current = 0", [])
            .map_err(|e| HandlerErr::db_write("db_update_failed", "semesters", e))?;
    }
    tx.execute(
        "INSERT INTO semesters(id, name, academic_year, start_date, end_date, is_current)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            &name,
            &academic_year,
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
            is_current as i64,
        ),
    )
    .map_err(|e| HandlerErr::db_write("db_insert_failed", "semesters", e))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "semesterId": id }))
}

fn semesters_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    let current: Option<(String, String)> = conn
        .query_row(
            "SELECT start_date, end_date FROM semesters WHERE id = ?",
            [&semester_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    let Some((cur_start, cur_end)) = current else {
        return Err(HandlerErr::not_found("semester"));
    };
    let patch = get_patch(params)?;

    let mut set = SetClause::default();
    if let Some(name) = get_opt_str(&patch, "name")? {
        if name.is_empty() {
            return Err(HandlerErr::bad_params("name must not be empty"));
        }
        set.push("name = ?", name);
    }
    if let Some(year) = get_opt_str(&patch, "academicYear")? {
        if year.is_empty() {
            return Err(HandlerErr::bad_params("academicYear must not be empty"));
        }
        set.push("academic_year = ?", year);
    }
    let start = match get_opt_str(&patch, "startDate")? {
        Some(s) => {
            let d = parse_date("startDate", &s)?;
            set.push("start_date = ?", d.format("%Y-%m-%d").to_string());
            d
        }
        None => parse_date("startDate", &cur_start)?,
    };
    let end = match get_opt_str(&patch, "endDate")? {
        Some(s) => {
            let d = parse_date("endDate", &s)?;
            set.push("end_date = ?", d.format("%Y-%m-%d").to_string());
            d
        }
        None => parse_date("endDate", &cur_end)?,
    };
    check_range(start, end)?;
    let make_current = get_opt_bool(&patch, "isCurrent")?;
    if let Some(flag) = make_current {
        set.push("is_current = ?", flag as i64);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    if make_current == Some(true) {
        tx.execute(
            "UPDATE semesters SET is_current = 0 WHERE id <> ?",
            [&semester_id],
        )
        .map_err(|e| HandlerErr::db_write("db_update_failed", "semesters", e))?;
    }
    let changed = set.execute(&tx, "semesters", &semester_id)?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "changed": changed }))
}

fn semesters_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let semester_id = get_required_str(params, "semesterId")?;
    if !row_exists(conn, "semesters", &semester_id)? {
        return Err(HandlerErr::not_found("semester"));
    }
    let enrollments = count_where(conn, "enrollments", "semester_id", &semester_id)?;
    if enrollments > 0 {
        return Err(HandlerErr::conflict("semester has enrollments")
            .with_details(json!({ "enrollments": enrollments })));
    }
    conn.execute("DELETE FROM semesters WHERE id = ?", [&semester_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "semesters", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "semesters.list" => Some(with_db(state, req, semesters_list)),
        "semesters.create" => Some(with_db(state, req, semesters_create)),
        "semesters.update" => Some(with_db(state, req, semesters_update)),
        "semesters.delete" => Some(with_db(state, req, semesters_delete)),
        _ => None,
    }
}
