use super::views::{list_screen, Screen};
use super::{load_config, new_id, with_db};
use crate::db::{load_grading_scales, now_timestamp};
use crate::grading::{
    compute_gpa, compute_grade, GpaCourse, GradingScale, ProgramType, ScoreError, ScoreInput,
};
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_opt_f64, get_opt_str, get_required_str, parse_list_query};
use crate::ipc::types::{AppState, Request};
use crate::records::{load_grades_where, parse_status};
use crate::status::GradeStatus;
use rusqlite::{Connection, OptionalExtension, ToSql};
use serde_json::json;

pub(crate) fn load_scale(conn: &Connection, program_type: ProgramType) -> Result<GradingScale, HandlerErr> {
    let entries = load_grading_scales(conn, Some(program_type)).map_err(HandlerErr::db_query)?;
    Ok(GradingScale::from_entries(program_type, entries))
}

/// `params[key]` as a program type; absent means bachelor.
pub(crate) fn read_program_type(params: &serde_json::Value, key: &str) -> Result<ProgramType, HandlerErr> {
    match get_opt_str(params, key)? {
        Some(raw) if !raw.is_empty() => raw
            .parse::<ProgramType>()
            .map_err(|e| HandlerErr::bad_params(e.to_string())),
        _ => Ok(ProgramType::default()),
    }
}

/// The scale a student's grades map against, from their program's degree
/// level. `None` when the student does not exist.
fn student_program_type(conn: &Connection, student_id: &str) -> Result<Option<ProgramType>, HandlerErr> {
    let level: Option<Option<String>> = conn
        .query_row(
            "SELECT p.degree_level
             FROM students s
             LEFT JOIN programs p ON p.id = s.program_id
             WHERE s.id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    Ok(level.map(|l| ProgramType::for_degree_level(l.as_deref())))
}

fn enrollment_program_type(conn: &Connection, enrollment_id: &str) -> Result<Option<ProgramType>, HandlerErr> {
    let student_id: Option<String> = conn
        .query_row(
            "SELECT student_id FROM enrollments WHERE id = ?",
            [enrollment_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db_query)?;
    match student_id {
        Some(id) => student_program_type(conn, &id),
        None => Ok(None),
    }
}

fn score_err(e: ScoreError) -> HandlerErr {
    let field = match &e {
        ScoreError::NotFinite { field } | ScoreError::OutOfRange { field, .. } => *field,
    };
    HandlerErr::bad_params(e.to_string()).with_details(json!({ "field": field }))
}

fn read_scores(params: &serde_json::Value) -> Result<ScoreInput, HandlerErr> {
    let input = ScoreInput {
        midterm: get_opt_f64(params, "midterm")?,
        coursework: get_opt_f64(params, "coursework")?,
        final_exam: get_opt_f64(params, "final")?,
    };
    input.validate().map_err(score_err)?;
    Ok(input)
}

fn parse_grade_status(raw: &str) -> Result<GradeStatus, HandlerErr> {
    raw.parse::<GradeStatus>()
        .map_err(|e| HandlerErr::bad_params(e.to_string()))
}

fn grade_by_id(conn: &Connection, grade_id: &str) -> Result<serde_json::Value, HandlerErr> {
    let grade = load_grades_where(conn, "WHERE g.id = ?", &[&grade_id as &dyn ToSql])
        .map_err(HandlerErr::db_query)?
        .into_iter()
        .next()
        .ok_or_else(|| HandlerErr::not_found("grade"))?;
    serde_json::to_value(grade).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

/// Computes a grade from the request's components without touching storage.
fn grades_preview(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let input = read_scores(params)?;
    let program_type = read_program_type(params, "programType")?;
    let cfg = load_config(conn)?;
    let scale = load_scale(conn, program_type)?;
    let result = compute_grade(&input, &cfg.weights, &scale);
    Ok(json!({
        "input": input,
        "weights": cfg.weights,
        "programType": program_type,
        "result": result,
    }))
}

fn grades_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;
    list_screen(conn, Screen::Grades, &q)
}

struct StoredGrade {
    id: String,
    scores: ScoreInput,
    status: GradeStatus,
    remarks: Option<String>,
}

fn stored_grade(conn: &Connection, enrollment_id: &str) -> Result<Option<StoredGrade>, HandlerErr> {
    conn.query_row(
        "SELECT id, midterm, coursework, final, status, remarks FROM grades WHERE enrollment_id = ?",
        [enrollment_id],
        |r| {
            Ok(StoredGrade {
                id: r.get(0)?,
                scores: ScoreInput {
                    midterm: r.get(1)?,
                    coursework: r.get(2)?,
                    final_exam: r.get(3)?,
                },
                status: parse_status(r, 4)?,
                remarks: r.get(5)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::db_query)
}

/// Creates or edits the grade of one enrollment. Components missing from
/// the request keep their stored value; the total, letter and points are
/// always recomputed from the merged components against the scale of the
/// student's program type. Editing the scores of an approved grade sends it
/// back to `submitted` unless a status is given.
fn grades_upsert(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let enrollment_id = get_required_str(params, "enrollmentId")?;
    let Some(program_type) = enrollment_program_type(conn, &enrollment_id)? else {
        return Err(HandlerErr::not_found("enrollment"));
    };
    let patch = read_scores(params)?;
    let explicit_status = match get_opt_str(params, "status")? {
        Some(s) => Some(parse_grade_status(&s)?),
        None => None,
    };
    let remarks_patch = get_opt_str(params, "remarks")?;

    let cfg = load_config(conn)?;
    let scale = load_scale(conn, program_type)?;
    let existing = stored_grade(conn, &enrollment_id)?;

    let (grade_id, scores, status, remarks) = match existing {
        Some(prev) => {
            let merged = prev.scores.merged_with(&patch);
            let status = explicit_status.unwrap_or(
                if prev.status == GradeStatus::Approved && merged != prev.scores {
                    GradeStatus::Submitted
                } else {
                    prev.status
                },
            );
            let remarks = match remarks_patch {
                Some(r) if r.is_empty() => None,
                Some(r) => Some(r),
                None => prev.remarks,
            };
            (prev.id, merged, status, remarks)
        }
        None => (
            new_id(),
            patch,
            explicit_status.unwrap_or(GradeStatus::Pending),
            remarks_patch.filter(|r| !r.is_empty()),
        ),
    };
    let result = compute_grade(&scores, &cfg.weights, &scale);

    conn.execute(
        "INSERT INTO grades(id, enrollment_id, midterm, coursework, final, total, letter_grade,
                            grade_points, is_passing, status, remarks, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(enrollment_id) DO UPDATE SET
           midterm = excluded.midterm,
           coursework = excluded.coursework,
           final = excluded.final,
           total = excluded.total,
           letter_grade = excluded.letter_grade,
           grade_points = excluded.grade_points,
           is_passing = excluded.is_passing,
           status = excluded.status,
           remarks = excluded.remarks,
           updated_at = excluded.updated_at",
        (
            &grade_id,
            &enrollment_id,
            scores.midterm,
            scores.coursework,
            scores.final_exam,
            result.total,
            &result.letter_grade,
            result.grade_points,
            result.is_passing as i64,
            status.as_str(),
            &remarks,
            now_timestamp(),
        ),
    )
    .map_err(|e| HandlerErr::db_write("db_update_failed", "grades", e))?;

    tracing::debug!(
        enrollment_id = %enrollment_id,
        program_type = %program_type,
        total = result.total,
        letter = %result.letter_grade,
        "grade recomputed"
    );
    Ok(json!({
        "grade": grade_by_id(conn, &grade_id)?,
        "programType": program_type,
    }))
}

fn grades_approve(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = get_required_str(params, "gradeId")?;
    let changed = conn
        .execute(
            "UPDATE grades SET status = ?, updated_at = ? WHERE id = ?",
            (GradeStatus::Approved.as_str(), now_timestamp(), &grade_id),
        )
        .map_err(|e| HandlerErr::db_write("db_update_failed", "grades", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("grade"));
    }
    Ok(json!({ "grade": grade_by_id(conn, &grade_id)? }))
}

fn grades_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = get_required_str(params, "gradeId")?;
    let changed = conn
        .execute("DELETE FROM grades WHERE id = ?", [&grade_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "grades", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("grade"));
    }
    Ok(json!({ "ok": true }))
}

/// Credit-weighted GPA over graded enrollments that still count. Points and
/// passing were fixed by the student's program-type scale at upsert, so a
/// graduate C- counts its points but not its credits.
fn grades_gpa(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(program_type) = student_program_type(conn, &student_id)? else {
        return Err(HandlerErr::not_found("student"));
    };
    let semester_id = get_opt_str(params, "semesterId")?.filter(|s| !s.is_empty());

    let grades = match &semester_id {
        Some(sem) => load_grades_where(
            conn,
            "WHERE e.student_id = ? AND e.semester_id = ?",
            &[&student_id as &dyn ToSql, sem as &dyn ToSql],
        ),
        None => load_grades_where(conn, "WHERE e.student_id = ?", &[&student_id as &dyn ToSql]),
    }
    .map_err(HandlerErr::db_query)?;

    let summary = compute_gpa(
        grades
            .iter()
            .filter(|g| g.enrollment_status.counts_toward_gpa())
            .map(|g| GpaCourse {
                credits: g.credits,
                grade_points: g.grade_points,
                is_passing: g.is_passing,
            }),
    );
    Ok(json!({
        "studentId": student_id,
        "semesterId": semester_id,
        "programType": program_type,
        "summary": summary,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.preview" => Some(with_db(state, req, grades_preview)),
        "grades.list" => Some(with_db(state, req, grades_list)),
        "grades.upsert" => Some(with_db(state, req, grades_upsert)),
        "grades.approve" => Some(with_db(state, req, grades_approve)),
        "grades.delete" => Some(with_db(state, req, grades_delete)),
        "grades.gpa" => Some(with_db(state, req, grades_gpa)),
        _ => None,
    }
}
