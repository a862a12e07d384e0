use super::views::{list_screen, Screen};
use super::{count_where, load_config, new_id, row_exists, with_db, SetClause};
use crate::db::now_timestamp;
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_opt_bool, get_opt_str, get_patch, get_required_str, parse_list_query};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

const DEGREE_LEVELS: &[&str] = &["bachelor", "master", "doctorate", "diploma"];

fn parse_degree_level(raw: &str) -> Result<String, HandlerErr> {
    let t = raw.trim().to_ascii_lowercase();
    if DEGREE_LEVELS.contains(&t.as_str()) {
        Ok(t)
    } else {
        Err(HandlerErr::bad_params(format!(
            "degreeLevel must be one of {}",
            DEGREE_LEVELS.join(", ")
        )))
    }
}

fn programs_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;
    list_screen(conn, Screen::Programs, &q)
}

fn programs_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let code = get_required_str(params, "code")?.to_ascii_uppercase();
    let name_en = get_required_str(params, "nameEn")?;
    let name_ar = get_opt_str(params, "nameAr")?.filter(|s| !s.is_empty());
    let degree_level = match get_opt_str(params, "degreeLevel")? {
        Some(v) => parse_degree_level(&v)?,
        None => "bachelor".to_string(),
    };
    let is_active = get_opt_bool(params, "isActive")?.unwrap_or(true);

    let id = new_id();
    conn.execute(
        "INSERT INTO programs(id, code, name_en, name_ar, degree_level, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &code,
            &name_en,
            &name_ar,
            &degree_level,
            is_active as i64,
            now_timestamp(),
        ),
    )
    .map_err(|e| HandlerErr::db_write("db_insert_failed", "programs", e))?;
    Ok(json!({ "programId": id }))
}

fn programs_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program_id = get_required_str(params, "programId")?;
    if !row_exists(conn, "programs", &program_id)? {
        return Err(HandlerErr::not_found("program"));
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
    if let Some(level) = get_opt_str(&patch, "degreeLevel")? {
        set.push("degree_level = ?", parse_degree_level(&level)?);
    }
    if let Some(active) = get_opt_bool(&patch, "isActive")? {
        set.push("is_active = ?", active as i64);
    }
    let changed = set.execute(conn, "programs", &program_id)?;
    Ok(json!({ "ok": true, "changed": changed }))
}

fn programs_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program_id = get_required_str(params, "programId")?;
    if !row_exists(conn, "programs", &program_id)? {
        return Err(HandlerErr::not_found("program"));
    }
    let courses = count_where(conn, "courses", "program_id", &program_id)?;
    let students = count_where(conn, "students", "program_id", &program_id)?;
    if courses > 0 || students > 0 {
        return Err(HandlerErr::conflict("program is still referenced")
            .with_details(json!({ "courses": courses, "students": students })));
    }
    conn.execute("DELETE FROM programs WHERE id = ?", [&program_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "programs", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "programs.list" => Some(with_db(state, req, programs_list)),
        "programs.create" => Some(with_db(state, req, programs_create)),
        "programs.update" => Some(with_db(state, req, programs_update)),
        "programs.delete" => Some(with_db(state, req, programs_delete)),
        _ => None,
    }
}
