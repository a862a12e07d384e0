use super::views::{list_screen, Screen};
use super::{load_config, new_id, row_exists, with_db};
use crate::db::now_timestamp;
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_opt_str, get_required_str, parse_list_query};
use crate::ipc::types::{AppState, Request};
use crate::records::load_enrollments_where;
use crate::status::EnrollmentStatus;
use rusqlite::{Connection, OptionalExtension, ToSql};
use serde_json::json;

fn parse_enrollment_status(raw: &str) -> Result<EnrollmentStatus, HandlerErr> {
    raw.parse::<EnrollmentStatus>()
        .map_err(|e| HandlerErr::bad_params(e.to_string()))
}

/// Another enrollment for the same student, course and semester that still
/// holds the slot.
fn find_live_duplicate(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    semester_id: &str,
    except_id: Option<&str>,
) -> Result<Option<String>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, status FROM enrollments
             WHERE student_id = ? AND course_id = ? AND semester_id = ?",
        )
        .map_err(HandlerErr::db_query)?;
    let rows = stmt
        .query_map((student_id, course_id, semester_id), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .map_err(HandlerErr::db_query)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(HandlerErr::db_query)?;
    for (id, status) in rows {
        if Some(id.as_str()) == except_id {
            continue;
        }
        let live = status
            .parse::<EnrollmentStatus>()
            .map(EnrollmentStatus::counts_toward_gpa)
            .unwrap_or(true);
        if live {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

fn enrollments_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;
    list_screen(conn, Screen::Enrollments, &q)
}

fn enrollments_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let course_id = get_required_str(params, "courseId")?;
    let semester_id = get_required_str(params, "semesterId")?;
    let status = match get_opt_str(params, "status")? {
        Some(s) => parse_enrollment_status(&s)?,
        None => EnrollmentStatus::Enrolled,
    };

    if !row_exists(conn, "students", &student_id)? {
        return Err(HandlerErr::not_found("student"));
    }
    if !row_exists(conn, "courses", &course_id)? {
        return Err(HandlerErr::not_found("course"));
    }
    if !row_exists(conn, "semesters", &semester_id)? {
        return Err(HandlerErr::not_found("semester"));
    }
    if status.counts_toward_gpa() {
        if let Some(existing) = find_live_duplicate(conn, &student_id, &course_id, &semester_id, None)? {
            return Err(HandlerErr::conflict("student is already enrolled in this course for the semester")
                .with_details(json!({ "enrollmentId": existing })));
        }
    }

    let id = new_id();
    conn.execute(
        "INSERT INTO enrollments(id, student_id, course_id, semester_id, status, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            &student_id,
            &course_id,
            &semester_id,
            status.as_str(),
            now_timestamp(),
        ),
    )
    .map_err(|e| HandlerErr::db_write("db_insert_failed", "enrollments", e))?;
    Ok(json!({ "enrollmentId": id, "status": status }))
}

fn enrollments_set_status(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let enrollment_id = get_required_str(params, "enrollmentId")?;
    let status = parse_enrollment_status(&get_required_str(params, "status")?)?;

    let key: Option<(String, String, String)> = conn
        .query_row(
            "SELECT student_id, course_id, semester_id FROM enrollments WHERE id = ?",
            [&enrollment_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    let Some((student_id, course_id, semester_id)) = key else {
        return Err(HandlerErr::not_found("enrollment"));
    };
    if status.counts_toward_gpa() {
        if let Some(existing) = find_live_duplicate(
            conn,
            &student_id,
            &course_id,
            &semester_id,
            Some(&enrollment_id),
        )? {
            return Err(HandlerErr::conflict("another live enrollment exists")
                .with_details(json!({ "enrollmentId": existing })));
        }
    }

    conn.execute(
        "UPDATE enrollments SET status = ? WHERE id = ?",
        (status.as_str(), &enrollment_id),
    )
    .map_err(|e| HandlerErr::db_write("db_update_failed", "enrollments", e))?;

    let enrollment = load_enrollments_where(conn, "WHERE e.id = ?", &[&enrollment_id as &dyn ToSql])
        .map_err(HandlerErr::db_query)?
        .into_iter()
        .next()
        .ok_or_else(|| HandlerErr::not_found("enrollment"))?;
    Ok(json!({ "enrollment": enrollment }))
}

/// Removes the enrollment together with its grade.
fn enrollments_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let enrollment_id = get_required_str(params, "enrollmentId")?;
    if !row_exists(conn, "enrollments", &enrollment_id)? {
        return Err(HandlerErr::not_found("enrollment"));
    }
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let grades_deleted = tx
        .execute("DELETE FROM grades WHERE enrollment_id = ?", [&enrollment_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "grades", e))?;
    tx.execute("DELETE FROM enrollments WHERE id = ?", [&enrollment_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "enrollments", e))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true, "gradesDeleted": grades_deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.list" => Some(with_db(state, req, enrollments_list)),
        "enrollments.create" => Some(with_db(state, req, enrollments_create)),
        "enrollments.setStatus" => Some(with_db(state, req, enrollments_set_status)),
        "enrollments.delete" => Some(with_db(state, req, enrollments_delete)),
        _ => None,
    }
}
