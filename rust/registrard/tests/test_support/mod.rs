#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_registrard");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn registrard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Error code of a failed response; panics if the call succeeded.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}

/// Handles for one student enrolled in one course for one semester.
pub struct Seeded {
    pub program_id: String,
    pub student_id: String,
    pub course_id: String,
    pub semester_id: String,
    pub enrollment_id: String,
}

/// Opens `workspace` and creates the minimum records a grade needs.
pub fn seed_enrollment(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> Seeded {
    let _ = request_ok(
        stdin,
        reader,
        "seed-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let program = request_ok(
        stdin,
        reader,
        "seed-program",
        "programs.create",
        json!({ "code": "cs", "nameEn": "Computer Science", "degreeLevel": "Bachelor" }),
    );
    let program_id = str_field(&program, "programId");
    let student = request_ok(
        stdin,
        reader,
        "seed-student",
        "students.create",
        json!({ "studentNo": "S-1001", "nameEn": "Layla Hassan", "programId": program_id }),
    );
    let course = request_ok(
        stdin,
        reader,
        "seed-course",
        "courses.create",
        json!({ "code": "cs101", "nameEn": "Intro to Programming", "credits": 3, "programId": program_id }),
    );
    let semester = request_ok(
        stdin,
        reader,
        "seed-semester",
        "semesters.create",
        json!({
            "name": "Fall 2025",
            "academicYear": "2025-2026",
            "startDate": "2025-09-01",
            "endDate": "2026-01-15",
            "isCurrent": true
        }),
    );
    let student_id = str_field(&student, "studentId");
    let course_id = str_field(&course, "courseId");
    let semester_id = str_field(&semester, "semesterId");
    let enrollment = request_ok(
        stdin,
        reader,
        "seed-enrollment",
        "enrollments.create",
        json!({ "studentId": student_id, "courseId": course_id, "semesterId": semester_id }),
    );
    Seeded {
        program_id,
        student_id,
        course_id,
        semester_id,
        enrollment_id: str_field(&enrollment, "enrollmentId"),
    }
}
