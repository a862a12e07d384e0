use crate::grading::{fallback_scale, GradingScaleEntry, ProgramType};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "registrar.sqlite3";

const GRADING_SCALES_TABLE: &str = "CREATE TABLE IF NOT EXISTS grading_scales(
            id TEXT PRIMARY KEY,
            program_type TEXT NOT NULL DEFAULT 'bachelor',
            letter_grade TEXT NOT NULL,
            min_score REAL NOT NULL,
            max_score REAL NOT NULL,
            grade_points REAL NOT NULL,
            description_en TEXT,
            description_ar TEXT,
            is_passing INTEGER NOT NULL DEFAULT 1,
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE(program_type, letter_grade)
        )";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS programs(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name_en TEXT NOT NULL,
            name_ar TEXT,
            degree_level TEXT NOT NULL DEFAULT 'bachelor',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name_en TEXT NOT NULL,
            name_ar TEXT,
            credits REAL NOT NULL,
            program_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            FOREIGN KEY(program_id) REFERENCES programs(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_program ON courses(program_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            student_no TEXT NOT NULL UNIQUE,
            name_en TEXT NOT NULL,
            name_ar TEXT,
            email TEXT,
            program_id TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            FOREIGN KEY(program_id) REFERENCES programs(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_program ON students(program_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS semesters(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            semester_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(semester_id) REFERENCES semesters(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_semester ON enrollments(semester_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL UNIQUE,
            midterm REAL,
            coursework REAL,
            final REAL,
            total REAL NOT NULL,
            letter_grade TEXT NOT NULL,
            grade_points REAL NOT NULL,
            is_passing INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            remarks TEXT,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(id)
        )",
        [],
    )?;

    conn.execute(GRADING_SCALES_TABLE, [])?;
    ensure_grading_scales_program_type(&conn)?;
    seed_grading_scales(&conn)?;

    Ok(conn)
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

/// Workspaces created before scales were split by program type keep their
/// bands as the bachelor scale. The table is rebuilt because the letter
/// uniqueness moves from one column to two.
fn ensure_grading_scales_program_type(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grading_scales", "program_type")? {
        return Ok(());
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("ALTER TABLE grading_scales RENAME TO grading_scales_single", [])?;
    tx.execute(GRADING_SCALES_TABLE, [])?;
    tx.execute(
        "INSERT INTO grading_scales(id, program_type, letter_grade, min_score, max_score, grade_points,
                                    description_en, description_ar, is_passing, is_active, sort_order)
         SELECT id, 'bachelor', letter_grade, min_score, max_score, grade_points,
                description_en, description_ar, is_passing, is_active, sort_order
         FROM grading_scales_single",
        [],
    )?;
    tx.execute("DROP TABLE grading_scales_single", [])?;
    tx.commit()?;
    Ok(())
}

/// Each program type starts with its built-in scale.
fn seed_grading_scales(conn: &Connection) -> anyhow::Result<()> {
    for program_type in ProgramType::ALL {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM grading_scales WHERE program_type = ?",
            [program_type.as_str()],
            |r| r.get(0),
        )?;
        if count == 0 {
            replace_grading_scales(conn, program_type, &fallback_scale(program_type))?;
        }
    }
    Ok(())
}

/// Replaces every band of `program_type` with `entries`.
pub fn replace_grading_scales(
    conn: &Connection,
    program_type: ProgramType,
    entries: &[GradingScaleEntry],
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM grading_scales WHERE program_type = ?",
        [program_type.as_str()],
    )?;
    for e in entries {
        let id = e
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tx.execute(
            "INSERT INTO grading_scales(id, program_type, letter_grade, min_score, max_score, grade_points, description_en, description_ar, is_passing, is_active, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                program_type.as_str(),
                &e.letter_grade,
                e.min_score,
                e.max_score,
                e.grade_points,
                &e.description_en,
                &e.description_ar,
                e.is_passing as i64,
                e.is_active as i64,
                e.sort_order,
            ),
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Stored bands, optionally of one program type, highest first.
pub fn load_grading_scales(
    conn: &Connection,
    program_type: Option<ProgramType>,
) -> anyhow::Result<Vec<GradingScaleEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, program_type, letter_grade, min_score, max_score, grade_points, description_en, description_ar, is_passing, is_active, sort_order
         FROM grading_scales
         WHERE ?1 IS NULL OR program_type = ?1
         ORDER BY program_type, min_score DESC",
    )?;
    let rows = stmt
        .query_map([program_type.map(ProgramType::as_str)], |r| {
            let raw: String = r.get(1)?;
            let program_type = raw.parse::<ProgramType>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
            })?;
            Ok(GradingScaleEntry {
                id: Some(r.get(0)?),
                program_type,
                letter_grade: r.get(2)?,
                min_score: r.get(3)?,
                max_score: r.get(4)?,
                grade_points: r.get(5)?,
                description_en: r.get(6)?,
                description_ar: r.get(7)?,
                is_passing: r.get::<_, i64>(8)? != 0,
                is_active: r.get::<_, i64>(9)? != 0,
                sort_order: r.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
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
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
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

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
