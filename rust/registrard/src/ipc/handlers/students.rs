use super::views::{list_screen, Screen};
use super::{count_where, load_config, new_id, row_exists, with_db, SetClause};
use crate::db::now_timestamp;
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_opt_str, get_patch, get_required_str, parse_list_query};
use crate::ipc::types::{AppState, Request};
use crate::status::StudentStatus;
use rusqlite::Connection;
use serde_json::json;

fn parse_student_status(raw: &str) -> Result<StudentStatus, HandlerErr> {
    raw.parse::<StudentStatus>()
        .map_err(|e| HandlerErr::bad_params(e.to_string()))
}

fn check_email(email: &str) -> Result<(), HandlerErr> {
    if email.is_empty() {
        return Ok(());
    }
    let valid = email
        .split_once('@')
        .map(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(HandlerErr::bad_params("email is not a valid address"))
    }
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;
    list_screen(conn, Screen::Students, &q)
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_no = get_required_str(params, "studentNo")?;
    let name_en = get_required_str(params, "nameEn")?;
    let name_ar = get_opt_str(params, "nameAr")?.filter(|s| !s.is_empty());
    let email = get_opt_str(params, "email")?.filter(|s| !s.is_empty());
    if let Some(e) = &email {
        check_email(e)?;
    }
    let program_id = get_opt_str(params, "programId")?.filter(|s| !s.is_empty());
    if let Some(p) = &program_id {
        if !row_exists(conn, "programs", p)? {
            return Err(HandlerErr::not_found("program"));
        }
    }
    let status = match get_opt_str(params, "status")? {
        Some(s) => parse_student_status(&s)?,
        None => StudentStatus::Active,
    };

    let id = new_id();
    conn.execute(
        "INSERT INTO students(id, student_no, name_en, name_ar, email, program_id, status, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &student_no,
            &name_en,
            &name_ar,
            &email,
            &program_id,
            status.as_str(),
            now_timestamp(),
        ),
    )
    .map_err(|e| HandlerErr::db_write("db_insert_failed", "students", e))?;
    Ok(json!({ "studentId": id }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !row_exists(conn, "students", &student_id)? {
        return Err(HandlerErr::not_found("student"));
    }
    let patch = get_patch(params)?;

    let mut set = SetClause::default();
    if let Some(no) = get_opt_str(&patch, "studentNo")? {
        if no.is_empty() {
            return Err(HandlerErr::bad_params("studentNo must not be empty"));
        }
        set.push("student_no = ?", no);
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
    if let Some(email) = get_opt_str(&patch, "email")? {
        check_email(&email)?;
        set.push_opt_text("email = ?", email);
    }
    if let Some(program) = get_opt_str(&patch, "programId")? {
        if !program.is_empty() && !row_exists(conn, "programs", &program)? {
            return Err(HandlerErr::not_found("program"));
        }
        set.push_opt_text("program_id = ?", program);
    }
    if let Some(status) = get_opt_str(&patch, "status")? {
        set.push("status = ?", parse_student_status(&status)?.as_str().to_string());
    }
    let changed = set.execute(conn, "students", &student_id)?;
    Ok(json!({ "ok": true, "changed": changed }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !row_exists(conn, "students", &student_id)? {
        return Err(HandlerErr::not_found("student"));
    }
    let enrollments = count_where(conn, "enrollments", "student_id", &student_id)?;
    if enrollments > 0 {
        return Err(HandlerErr::conflict("student has enrollments")
            .with_details(json!({ "enrollments": enrollments })));
    }
    conn.execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "students", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_db(state, req, students_list)),
        "students.create" => Some(with_db(state, req, students_create)),
        "students.update" => Some(with_db(state, req, students_update)),
        "students.delete" => Some(with_db(state, req, students_delete)),
        _ => None,
    }
}
