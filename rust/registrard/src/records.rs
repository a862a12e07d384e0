//! Record types as served to the front-end, their row loaders, and how each
//! one is searched, filtered and exported.

use crate::export::{fmt_opt_f64, CsvRow};
use crate::listing::Listable;
use crate::status::{EnrollmentStatus, GradeStatus, StatusParseError, StudentStatus};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, ToSql};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

fn bool_str(v: bool) -> Cow<'static, str> {
    Cow::Borrowed(if v { "true" } else { "false" })
}

fn opt_str(v: &Option<String>) -> Option<Cow<'_, str>> {
    v.as_deref().map(Cow::Borrowed)
}

/// Status column `idx` of `r`; unknown stored values fail the row.
pub(crate) fn parse_status<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = StatusParseError>,
{
    let raw: String = r.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn canonical_status<T>(value: &str) -> Result<String, String>
where
    T: FromStr<Err = StatusParseError> + Display,
{
    value
        .parse::<T>()
        .map(|s| s.to_string())
        .map_err(|e| e.to_string())
}

fn canonical_bool(value: &str) -> Result<String, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok("true".to_string()),
        "false" | "0" | "no" => Ok("false".to_string()),
        _ => Err(format!("expected true or false, got {}", value)),
    }
}

/// Programs and courses only know active and inactive.
fn canonical_active(value: &str) -> Result<String, String> {
    match value.to_ascii_lowercase().as_str() {
        "active" => Ok("active".to_string()),
        "inactive" => Ok("inactive".to_string()),
        _ => Err(format!("expected active or inactive, got {}", value)),
    }
}

/// Numbers compare in their shortest form, so 3, 3.0 and "3.00" agree.
fn canonical_number(value: &str) -> Result<String, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n.to_string())
        .ok_or_else(|| format!("expected a number, got {}", value))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub code: String,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub degree_level: String,
    pub is_active: bool,
    pub created_at: String,
}

pub fn load_programs(conn: &Connection) -> rusqlite::Result<Vec<Program>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name_en, name_ar, degree_level, is_active, created_at
         FROM programs
         ORDER BY code",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(Program {
            id: r.get(0)?,
            code: r.get(1)?,
            name_en: r.get(2)?,
            name_ar: r.get(3)?,
            degree_level: r.get(4)?,
            is_active: r.get::<_, i64>(5)? != 0,
            created_at: r.get(6)?,
        })
    })?;
    rows.collect()
}

impl Listable for Program {
    const SEARCH_FIELDS: &'static [&'static str] = &["code", "nameEn", "nameAr"];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "code" => Some(Cow::Borrowed(&self.code)),
            "nameEn" => Some(Cow::Borrowed(&self.name_en)),
            "nameAr" => opt_str(&self.name_ar),
            "degreeLevel" => Some(Cow::Borrowed(&self.degree_level)),
            _ => None,
        }
    }

    fn category(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "isActive" => Some(bool_str(self.is_active)),
            "status" => Some(Cow::Borrowed(if self.is_active { "active" } else { "inactive" })),
            "degreeLevel" => Some(Cow::Borrowed(&self.degree_level)),
            _ => None,
        }
    }

    fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
        match key {
            "isActive" => canonical_bool(value),
            "status" => canonical_active(value),
            "degreeLevel" => Ok(value.to_ascii_lowercase()),
            _ => Ok(value.to_string()),
        }
    }
}

impl CsvRow for Program {
    const HEADERS: &'static [&'static str] =
        &["id", "code", "name_en", "name_ar", "degree_level", "is_active"];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.code.clone(),
            self.name_en.clone(),
            self.name_ar.clone().unwrap_or_default(),
            self.degree_level.clone(),
            self.is_active.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub credits: f64,
    pub program_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

pub fn load_courses(conn: &Connection) -> rusqlite::Result<Vec<Course>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name_en, name_ar, credits, program_id, is_active, created_at
         FROM courses
         ORDER BY code",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(Course {
            id: r.get(0)?,
            code: r.get(1)?,
            name_en: r.get(2)?,
            name_ar: r.get(3)?,
            credits: r.get(4)?,
            program_id: r.get(5)?,
            is_active: r.get::<_, i64>(6)? != 0,
            created_at: r.get(7)?,
        })
    })?;
    rows.collect()
}

impl Listable for Course {
    const SEARCH_FIELDS: &'static [&'static str] = &["code", "nameEn", "nameAr"];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "code" => Some(Cow::Borrowed(&self.code)),
            "nameEn" => Some(Cow::Borrowed(&self.name_en)),
            "nameAr" => opt_str(&self.name_ar),
            _ => None,
        }
    }

    fn category(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "isActive" => Some(bool_str(self.is_active)),
            "status" => Some(Cow::Borrowed(if self.is_active { "active" } else { "inactive" })),
            "programId" => opt_str(&self.program_id),
            "credits" => Some(Cow::Owned(self.credits.to_string())),
            _ => None,
        }
    }

    fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
        match key {
            "isActive" => canonical_bool(value),
            "status" => canonical_active(value),
            "credits" => canonical_number(value),
            _ => Ok(value.to_string()),
        }
    }
}

impl CsvRow for Course {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "code",
        "name_en",
        "name_ar",
        "credits",
        "program_id",
        "is_active",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.code.clone(),
            self.name_en.clone(),
            self.name_ar.clone().unwrap_or_default(),
            self.credits.to_string(),
            self.program_id.clone().unwrap_or_default(),
            self.is_active.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_no: String,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub email: Option<String>,
    pub program_id: Option<String>,
    pub status: StudentStatus,
    pub created_at: String,
}

pub fn load_students(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_no, name_en, name_ar, email, program_id, status, created_at
         FROM students
         ORDER BY student_no",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(Student {
            id: r.get(0)?,
            student_no: r.get(1)?,
            name_en: r.get(2)?,
            name_ar: r.get(3)?,
            email: r.get(4)?,
            program_id: r.get(5)?,
            status: parse_status(r, 6)?,
            created_at: r.get(7)?,
        })
    })?;
    rows.collect()
}

impl Listable for Student {
    const SEARCH_FIELDS: &'static [&'static str] = &["studentNo", "nameEn", "nameAr", "email"];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "studentNo" => Some(Cow::Borrowed(&self.student_no)),
            "nameEn" => Some(Cow::Borrowed(&self.name_en)),
            "nameAr" => opt_str(&self.name_ar),
            "email" => opt_str(&self.email),
            _ => None,
        }
    }

    fn category(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            "programId" => opt_str(&self.program_id),
            _ => None,
        }
    }

    fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
        match key {
            "status" => canonical_status::<StudentStatus>(value),
            _ => Ok(value.to_string()),
        }
    }
}

impl CsvRow for Student {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "student_no",
        "name_en",
        "name_ar",
        "email",
        "program_id",
        "status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.student_no.clone(),
            self.name_en.clone(),
            self.name_ar.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            self.program_id.clone().unwrap_or_default(),
            self.status.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    pub id: String,
    pub name: String,
    pub academic_year: String,
    pub start_date: String,
    pub end_date: String,
    pub is_current: bool,
}

pub fn load_semesters(conn: &Connection) -> rusqlite::Result<Vec<Semester>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, academic_year, start_date, end_date, is_current
         FROM semesters
         ORDER BY start_date DESC",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(Semester {
            id: r.get(0)?,
            name: r.get(1)?,
            academic_year: r.get(2)?,
            start_date: r.get(3)?,
            end_date: r.get(4)?,
            is_current: r.get::<_, i64>(5)? != 0,
        })
    })?;
    rows.collect()
}

impl Listable for Semester {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "academicYear"];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "name" => Some(Cow::Borrowed(&self.name)),
            "academicYear" => Some(Cow::Borrowed(&self.academic_year)),
            _ => None,
        }
    }

    fn category(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "academicYear" => Some(Cow::Borrowed(&self.academic_year)),
            "isCurrent" => Some(bool_str(self.is_current)),
            _ => None,
        }
    }

    fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
        match key {
            "isCurrent" => canonical_bool(value),
            _ => Ok(value.to_string()),
        }
    }
}

impl CsvRow for Semester {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "academic_year",
        "start_date",
        "end_date",
        "is_current",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.academic_year.clone(),
            self.start_date.clone(),
            self.end_date.clone(),
            self.is_current.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub student_no: String,
    pub student_name: String,
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub credits: f64,
    pub semester_id: String,
    pub semester_name: String,
    pub status: EnrollmentStatus,
    pub created_at: String,
}

/// `clause` is appended after the joins, e.g. `"WHERE e.id = ?"`.
pub fn load_enrollments_where(
    conn: &Connection,
    clause: &str,
    params: &[&dyn ToSql],
) -> rusqlite::Result<Vec<Enrollment>> {
    let sql = format!(
        "SELECT e.id, e.student_id, s.student_no, s.name_en, e.course_id, c.code, c.name_en, c.credits,
                e.semester_id, sem.name, e.status, e.created_at
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         JOIN courses c ON c.id = e.course_id
         JOIN semesters sem ON sem.id = e.semester_id
         {}
         ORDER BY sem.start_date DESC, c.code, s.student_no",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |r| {
        Ok(Enrollment {
            id: r.get(0)?,
            student_id: r.get(1)?,
            student_no: r.get(2)?,
            student_name: r.get(3)?,
            course_id: r.get(4)?,
            course_code: r.get(5)?,
            course_name: r.get(6)?,
            credits: r.get(7)?,
            semester_id: r.get(8)?,
            semester_name: r.get(9)?,
            status: parse_status(r, 10)?,
            created_at: r.get(11)?,
        })
    })?;
    rows.collect()
}

pub fn load_enrollments(conn: &Connection) -> rusqlite::Result<Vec<Enrollment>> {
    load_enrollments_where(conn, "", &[])
}

impl Listable for Enrollment {
    const SEARCH_FIELDS: &'static [&'static str] =
        &["studentNo", "studentName", "courseCode", "courseName"];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "studentNo" => Some(Cow::Borrowed(&self.student_no)),
            "studentName" => Some(Cow::Borrowed(&self.student_name)),
            "courseCode" => Some(Cow::Borrowed(&self.course_code)),
            "courseName" => Some(Cow::Borrowed(&self.course_name)),
            "semesterName" => Some(Cow::Borrowed(&self.semester_name)),
            _ => None,
        }
    }

    fn category(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "studentId" => Some(Cow::Borrowed(&self.student_id)),
            "courseId" => Some(Cow::Borrowed(&self.course_id)),
            "semesterId" => Some(Cow::Borrowed(&self.semester_id)),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            _ => None,
        }
    }

    fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
        match key {
            "status" => canonical_status::<EnrollmentStatus>(value),
            _ => Ok(value.to_string()),
        }
    }
}

impl CsvRow for Enrollment {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "student_no",
        "student_name",
        "course_code",
        "course_name",
        "credits",
        "semester",
        "status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.student_no.clone(),
            self.student_name.clone(),
            self.course_code.clone(),
            self.course_name.clone(),
            self.credits.to_string(),
            self.semester_name.clone(),
            self.status.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub enrollment_id: String,
    pub student_id: String,
    pub student_no: String,
    pub student_name: String,
    pub course_id: String,
    pub course_code: String,
    pub credits: f64,
    pub semester_id: String,
    pub enrollment_status: EnrollmentStatus,
    pub midterm: Option<f64>,
    pub coursework: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
    pub total: f64,
    pub letter_grade: String,
    pub grade_points: f64,
    pub is_passing: bool,
    pub status: GradeStatus,
    pub remarks: Option<String>,
    pub updated_at: String,
}

/// `clause` is appended after the joins, e.g. `"WHERE g.id = ?"`.
pub fn load_grades_where(
    conn: &Connection,
    clause: &str,
    params: &[&dyn ToSql],
) -> rusqlite::Result<Vec<Grade>> {
    let sql = format!(
        "SELECT g.id, g.enrollment_id, e.student_id, s.student_no, s.name_en, e.course_id, c.code, c.credits,
                e.semester_id, e.status, g.midterm, g.coursework, g.final, g.total, g.letter_grade,
                g.grade_points, g.is_passing, g.status, g.remarks, g.updated_at
         FROM grades g
         JOIN enrollments e ON e.id = g.enrollment_id
         JOIN students s ON s.id = e.student_id
         JOIN courses c ON c.id = e.course_id
         {}
         ORDER BY c.code, s.student_no",
        clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |r| {
        Ok(Grade {
            id: r.get(0)?,
            enrollment_id: r.get(1)?,
            student_id: r.get(2)?,
            student_no: r.get(3)?,
            student_name: r.get(4)?,
            course_id: r.get(5)?,
            course_code: r.get(6)?,
            credits: r.get(7)?,
            semester_id: r.get(8)?,
            enrollment_status: parse_status(r, 9)?,
            midterm: r.get(10)?,
            coursework: r.get(11)?,
            final_exam: r.get(12)?,
            total: r.get(13)?,
            letter_grade: r.get(14)?,
            grade_points: r.get(15)?,
            is_passing: r.get::<_, i64>(16)? != 0,
            status: parse_status(r, 17)?,
            remarks: r.get(18)?,
            updated_at: r.get(19)?,
        })
    })?;
    rows.collect()
}

pub fn load_grades(conn: &Connection) -> rusqlite::Result<Vec<Grade>> {
    load_grades_where(conn, "", &[])
}

impl Listable for Grade {
    const SEARCH_FIELDS: &'static [&'static str] =
        &["studentNo", "studentName", "courseCode", "letterGrade"];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "studentNo" => Some(Cow::Borrowed(&self.student_no)),
            "studentName" => Some(Cow::Borrowed(&self.student_name)),
            "courseCode" => Some(Cow::Borrowed(&self.course_code)),
            "letterGrade" => Some(Cow::Borrowed(&self.letter_grade)),
            "remarks" => opt_str(&self.remarks),
            _ => None,
        }
    }

    fn category(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "studentId" => Some(Cow::Borrowed(&self.student_id)),
            "courseId" => Some(Cow::Borrowed(&self.course_id)),
            "semesterId" => Some(Cow::Borrowed(&self.semester_id)),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            "letterGrade" => Some(Cow::Borrowed(&self.letter_grade)),
            "isPassing" => Some(bool_str(self.is_passing)),
            _ => None,
        }
    }

    fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
        match key {
            "status" => canonical_status::<GradeStatus>(value),
            "isPassing" => canonical_bool(value),
            "letterGrade" => Ok(value.to_ascii_uppercase()),
            _ => Ok(value.to_string()),
        }
    }
}

impl CsvRow for Grade {
    const HEADERS: &'static [&'static str] = &[
        "student_no",
        "student_name",
        "course_code",
        "midterm",
        "coursework",
        "final",
        "total",
        "letter_grade",
        "grade_points",
        "status",
    ];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.student_no.clone(),
            self.student_name.clone(),
            self.course_code.clone(),
            fmt_opt_f64(self.midterm),
            fmt_opt_f64(self.coursework),
            fmt_opt_f64(self.final_exam),
            format!("{:.2}", self.total),
            self.letter_grade.clone(),
            format!("{:.2}", self.grade_points),
            self.status.to_string(),
        ]
    }
}
