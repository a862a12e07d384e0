use super::views::{list_screen, Screen};
use super::{count_where, load_config, new_id, row_exists, with_db, SetClause};
use crate::db::now_timestamp;
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{
    get_opt_bool, get_opt_f64, get_opt_str, get_patch, get_required_str, parse_list_query,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn check_credits(credits: f64) -> Result<f64, HandlerErr> {
    if credits.is_finite() && credits > 0.0 && credits <= 30.0 {
        Ok(credits)
    } else {
        Err(HandlerErr::bad_params("credits must be greater than 0 and at most 30"))
    }
}

/// Blank clears the link; anything else must name an existing program.
fn check_program(conn: &Connection, program_id: Option<String>) -> Result<Option<String>, HandlerErr> {
    match program_id {
        Some(id) if !id.is_empty() => {
            if !row_exists(conn, "programs", &id)? {
                return Err(HandlerErr::not_found("program"));
            }
            Ok(Some(id))
        }
        _ => Ok(None),
    }
}

fn courses_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;
    list_screen(conn, Screen::Courses, &q)
}

fn courses_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let code = get_required_str(params, "code")?.to_ascii_uppercase();
    let name_en = get_required_str(params, "nameEn")?;
    let name_ar = get_opt_str(params, "nameAr")?.filter(|s| !s.is_empty());
    let Some(credits) = get_opt_f64(params, "credits")? else {
        return Err(HandlerErr::bad_params("missing credits"));
    };
    let credits = check_credits(credits)?;
    let program_id = check_program(conn, get_opt_str(params, "programId")?)?;
    let is_active = get_opt_bool(params, "isActive")?.unwrap_or(true);

    let id = new_id();
    conn.execute(
        "INSERT INTO courses(id, code, name_en, name_ar, credits, program_id, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &code,
            &name_en,
            &name_ar,
            credits,
            &program_id,
            is_active as i64,
            now_timestamp(),
        ),
    )
    .map_err(|e| HandlerErr::db_write("db_insert_failed", "courses", e))?;
    Ok(json!({ "courseId": id }))
}

fn courses_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    if !row_exists(conn, "courses", &course_id)? {
        return Err(HandlerErr::not_found("course"));
    }
    let patch = get_patch(params)?;

    let mut set = SetClause::default();
    if let Some(code) = get_opt_str(&patch, "code")? {
        if code.is_empty() {
            return Err(HandlerErr::bad_params("code must not be empty"));
        }
        set.push("code = ?", code.to_ascii_uppercase());
    }
    if let Some(name) = get_opt_str(&patch, "nameEn")? {
        if name.is_empty() {
            return Err(HandlerErr::bad_params("nameEn must not be empty"));
        }
        set.push("name_en = ?", name);
    }
    if let Some(name) = get_opt_str(&patch, "nameAr")? {
        set.push_opt_text("name_ar = ?", name);
    }
    if let Some(credits) = get_opt_f64(&patch, "credits")? {
        set.push("credits = ?", check_credits(credits)?);
    }
    if let Some(program) = get_opt_str(&patch, "programId")? {
        match check_program(conn, Some(program))? {
            Some(id) => set.push("program_id = ?", id),
            None => set.push("program_id = ?", rusqlite::types::Value::Null),
        }
    }
    if let Some(active) = get_opt_bool(&patch, "isActive")? {
        set.push("is_active = ?", active as i64);
    }
    let changed = set.execute(conn, "courses", &course_id)?;
    Ok(json!({ "ok": true, "changed": changed }))
}

fn courses_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    if !row_exists(conn, "courses", &course_id)? {
        return Err(HandlerErr::not_found("course"));
    }
    let enrollments = count_where(conn, "enrollments", "course_id", &course_id)?;
    if enrollments > 0 {
        return Err(HandlerErr::conflict("course has enrollments")
            .with_details(json!({ "enrollments": enrollments })));
    }
    conn.execute("DELETE FROM courses WHERE id = ?", [&course_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "courses", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(with_db(state, req, courses_list)),
        "courses.create" => Some(with_db(state, req, courses_create)),
        "courses.update" => Some(with_db(state, req, courses_update)),
        "courses.delete" => Some(with_db(state, req, courses_delete)),
        _ => None,
    }
}
