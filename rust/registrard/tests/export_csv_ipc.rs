mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_enrollment, spawn_sidecar, temp_dir};

#[test]
fn grade_sheet_exports_every_matching_row() {
    let workspace = temp_dir("registrar-export-grades");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_enrollment(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.upsert",
        json!({ "enrollmentId": seeded.enrollment_id, "midterm": 80, "coursework": 90, "final": 70 }),
    );

    let out = workspace.join("exports/grades.csv");
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.csv",
        json!({ "screen": "grades", "outPath": out.to_string_lossy() }),
    );
    assert_eq!(res.get("rowCount").and_then(|v| v.as_u64()), Some(1));

    let text = std::fs::read_to_string(&out).expect("read csv");
    let lines: Vec<&str> = text.split('\n').collect();
    assert_eq!(
        lines[0],
        "student_no,student_name,course_code,midterm,coursework,final,total,letter_grade,grade_points,status"
    );
    assert_eq!(lines[1], "S-1001,Layla Hassan,CS101,80,90,70,77.00,B,3.00,pending");
    assert_eq!(lines.len(), 2);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn export_quotes_fields_and_writes_header_when_empty() {
    let workspace = temp_dir("registrar-export-students");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (i, name) in ["Hassan, Layla", "Said \"Omar\"", "Plain Name"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({ "studentNo": format!("X-{}", i), "nameEn": name }),
        );
    }

    let out = workspace.join("students.csv");
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.csv",
        json!({ "screen": "students", "outPath": out.to_string_lossy(), "query": "a", "pageSize": 1 }),
    );
    // Export ignores paging.
    assert_eq!(res.get("rowCount").and_then(|v| v.as_u64()), Some(3));
    let text = std::fs::read_to_string(&out).expect("read csv");
    assert!(text.contains(",\"Hassan, Layla\","));
    assert!(text.contains(",\"Said \"\"Omar\"\"\","));

    let empty_out = workspace.join("none.csv");
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "export.csv",
        json!({ "screen": "students", "outPath": empty_out.to_string_lossy(), "filters": { "status": "graduated" } }),
    );
    assert_eq!(res.get("rowCount").and_then(|v| v.as_u64()), Some(0));
    let text = std::fs::read_to_string(&empty_out).expect("read csv");
    assert_eq!(text, "id,student_no,name_en,name_ar,email,program_id,status");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "export.csv",
        json!({ "screen": "timetable", "outPath": empty_out.to_string_lossy() }),
    );
    assert_eq!(code, "bad_params");

    let _ = std::fs::remove_dir_all(workspace);
}
