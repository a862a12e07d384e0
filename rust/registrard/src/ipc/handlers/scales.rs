use super::grades::{load_scale, read_program_type};
use super::{new_id, with_db};
use crate::db::{load_grading_scales, replace_grading_scales};
use crate::grading::{
    fallback_scale, find_overlap, GradingScaleEntry, ProgramType, MAX_SCORE, MIN_SCORE,
};
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_opt_bool, get_opt_f64, get_opt_str, get_patch, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

const MAX_GRADE_POINTS: f64 = 4.0;
const MAX_LETTER_LEN: usize = 5;

fn validate_entry(e: &GradingScaleEntry) -> Result<(), HandlerErr> {
    if e.letter_grade.is_empty() || e.letter_grade.chars().count() > MAX_LETTER_LEN {
        return Err(HandlerErr::bad_params("letterGrade must be 1 to 5 characters"));
    }
    for (field, v) in [("minScore", e.min_score), ("maxScore", e.max_score)] {
        if !v.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&v) {
            return Err(HandlerErr::bad_params(format!("{} must be between 0 and 100", field)));
        }
    }
    if e.min_score > e.max_score {
        return Err(HandlerErr::bad_params("minScore must not exceed maxScore"));
    }
    if !e.grade_points.is_finite() || !(0.0..=MAX_GRADE_POINTS).contains(&e.grade_points) {
        return Err(HandlerErr::bad_params("gradePoints must be between 0 and 4"));
    }
    Ok(())
}

/// Rejects `candidate` if it overlaps any other active band of its
/// program type.
fn check_overlap(
    existing: &[GradingScaleEntry],
    candidate: &GradingScaleEntry,
) -> Result<(), HandlerErr> {
    let mut all: Vec<GradingScaleEntry> = existing
        .iter()
        .filter(|e| e.id.is_none() || e.id != candidate.id)
        .cloned()
        .collect();
    all.push(candidate.clone());
    match find_overlap(&all) {
        Some((upper, lower)) => Err(HandlerErr::conflict(format!(
            "band {} overlaps band {}",
            upper, lower
        ))
        .with_details(json!({ "upper": upper, "lower": lower }))),
        None => Ok(()),
    }
}

fn required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    get_opt_f64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn opt_text(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn write_entry(conn: &Connection, e: &GradingScaleEntry, insert: bool) -> Result<usize, HandlerErr> {
    let sql = if insert {
        "INSERT INTO grading_scales(program_type, letter_grade, min_score, max_score, grade_points,
                                    description_en, description_ar, is_passing, is_active, sort_order, id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    } else {
        "UPDATE grading_scales SET program_type = ?, letter_grade = ?, min_score = ?, max_score = ?,
                grade_points = ?, description_en = ?, description_ar = ?, is_passing = ?, is_active = ?,
                sort_order = ?
         WHERE id = ?"
    };
    let code = if insert { "db_insert_failed" } else { "db_update_failed" };
    conn.execute(
        sql,
        (
            e.program_type.as_str(),
            &e.letter_grade,
            e.min_score,
            e.max_score,
            e.grade_points,
            &e.description_en,
            &e.description_ar,
            e.is_passing as i64,
            e.is_active as i64,
            e.sort_order,
            &e.id,
        ),
    )
    .map_err(|err| HandlerErr::db_write(code, "grading_scales", err))
}

/// `params.programType` when given; `None` means every program type.
fn opt_program_type(params: &serde_json::Value) -> Result<Option<ProgramType>, HandlerErr> {
    match get_opt_str(params, "programType")? {
        Some(raw) if !raw.is_empty() => read_program_type(params, "programType").map(Some),
        _ => Ok(None),
    }
}

fn scales_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let active_only = get_opt_bool(params, "activeOnly")?.unwrap_or(false);
    let program_type = opt_program_type(params)?;
    let entries: Vec<GradingScaleEntry> = load_grading_scales(conn, program_type)
        .map_err(HandlerErr::db_query)?
        .into_iter()
        .filter(|e| !active_only || e.is_active)
        .collect();
    Ok(json!({ "entries": entries }))
}

fn scales_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_points = required_f64(params, "gradePoints")?;
    let entry = GradingScaleEntry {
        id: Some(new_id()),
        program_type: read_program_type(params, "programType")?,
        letter_grade: get_required_str(params, "letterGrade")?.to_ascii_uppercase(),
        min_score: required_f64(params, "minScore")?,
        max_score: required_f64(params, "maxScore")?,
        grade_points,
        is_passing: get_opt_bool(params, "isPassing")?.unwrap_or(grade_points > 0.0),
        is_active: get_opt_bool(params, "isActive")?.unwrap_or(true),
        description_en: opt_text(get_opt_str(params, "descriptionEn")?),
        description_ar: opt_text(get_opt_str(params, "descriptionAr")?),
        sort_order: get_opt_f64(params, "sortOrder")?.map(|v| v as i64).unwrap_or(0),
    };
    validate_entry(&entry)?;
    let existing = load_grading_scales(conn, Some(entry.program_type)).map_err(HandlerErr::db_query)?;
    check_overlap(&existing, &entry)?;
    write_entry(conn, &entry, true)?;
    Ok(json!({ "entry": entry }))
}

fn scales_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let scale_id = get_required_str(params, "scaleId")?;
    let existing = load_grading_scales(conn, None).map_err(HandlerErr::db_query)?;
    let Some(mut entry) = existing
        .iter()
        .find(|e| e.id.as_deref() == Some(scale_id.as_str()))
        .cloned()
    else {
        return Err(HandlerErr::not_found("grading scale entry"));
    };
    let patch = get_patch(params)?;

    if get_opt_str(&patch, "programType")?.is_some_and(|raw| !raw.is_empty()) {
        entry.program_type = read_program_type(&patch, "programType")?;
    }
    if let Some(letter) = get_opt_str(&patch, "letterGrade")? {
        entry.letter_grade = letter.to_ascii_uppercase();
    }
    if let Some(v) = get_opt_f64(&patch, "minScore")? {
        entry.min_score = v;
    }
    if let Some(v) = get_opt_f64(&patch, "maxScore")? {
        entry.max_score = v;
    }
    if let Some(v) = get_opt_f64(&patch, "gradePoints")? {
        entry.grade_points = v;
    }
    if let Some(v) = get_opt_bool(&patch, "isPassing")? {
        entry.is_passing = v;
    }
    if let Some(v) = get_opt_bool(&patch, "isActive")? {
        entry.is_active = v;
    }
    if let Some(v) = get_opt_str(&patch, "descriptionEn")? {
        entry.description_en = opt_text(Some(v));
    }
    if let Some(v) = get_opt_str(&patch, "descriptionAr")? {
        entry.description_ar = opt_text(Some(v));
    }
    if let Some(v) = get_opt_f64(&patch, "sortOrder")? {
        entry.sort_order = v as i64;
    }

    validate_entry(&entry)?;
    check_overlap(&existing, &entry)?;
    write_entry(conn, &entry, false)?;
    Ok(json!({ "entry": entry }))
}

fn scales_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let scale_id = get_required_str(params, "scaleId")?;
    let changed = conn
        .execute("DELETE FROM grading_scales WHERE id = ?", [&scale_id])
        .map_err(|e| HandlerErr::db_write("db_delete_failed", "grading_scales", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("grading scale entry"));
    }
    Ok(json!({ "ok": true }))
}

/// Restores the built-in table of one program type, or of all of them.
/// Stored grades keep their computed letters until their next edit.
fn scales_reset(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program_type = opt_program_type(params)?;
    let targets: Vec<ProgramType> = match program_type {
        Some(pt) => vec![pt],
        None => ProgramType::ALL.to_vec(),
    };
    for pt in targets {
        let entries = fallback_scale(pt);
        replace_grading_scales(conn, pt, &entries)
            .map_err(|e| HandlerErr::new("db_update_failed", format!("{:#}", e)))?;
        tracing::info!(program_type = %pt, bands = entries.len(), "grading scale reset to defaults");
    }
    let stored = load_grading_scales(conn, program_type).map_err(HandlerErr::db_query)?;
    Ok(json!({ "entries": stored }))
}

/// The active band covering `score`. Scores below every active band have no
/// band and are `not_found`.
fn scales_for_score(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let score = required_f64(params, "score")?;
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(HandlerErr::bad_params("score must be between 0 and 100"));
    }
    let program_type = read_program_type(params, "programType")?;
    let scale = load_scale(conn, program_type)?;
    let Some(band) = scale.band_for(score) else {
        return Err(HandlerErr::not_found("grade band")
            .with_details(json!({ "score": score, "programType": program_type })));
    };
    Ok(json!({
        "programType": scale.program_type(),
        "result": scale.grade(score),
        "band": band,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gradingScales.list" => Some(with_db(state, req, scales_list)),
        "gradingScales.create" => Some(with_db(state, req, scales_create)),
        "gradingScales.update" => Some(with_db(state, req, scales_update)),
        "gradingScales.delete" => Some(with_db(state, req, scales_delete)),
        "gradingScales.reset" => Some(with_db(state, req, scales_reset)),
        "gradingScales.forScore" => Some(with_db(state, req, scales_for_score)),
        _ => None,
    }
}
