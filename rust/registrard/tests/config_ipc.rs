mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_enrollment, spawn_sidecar, temp_dir};

#[test]
fn weights_and_page_size_persist_per_workspace() {
    let workspace = temp_dir("registrar-config");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let cfg = request_ok(&mut stdin, &mut reader, "2", "config.get", json!({}));
    assert_eq!(cfg["config"]["weights"]["midterm"].as_f64(), Some(0.3));
    assert_eq!(cfg["config"]["weights"]["coursework"].as_f64(), Some(0.2));
    assert_eq!(cfg["config"]["weights"]["final"].as_f64(), Some(0.5));
    assert_eq!(cfg["config"]["defaultPageSize"].as_u64(), Some(10));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "config.update",
        json!({ "weights": { "midterm": 0.5, "coursework": 0.5, "final": 0.5 } }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "config.update",
        json!({ "defaultPageSize": 501 }),
    );
    assert_eq!(code, "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "config.update",
        json!({
            "weights": { "midterm": 0.4, "coursework": 0.2, "final": 0.4 },
            "defaultPageSize": 3
        }),
    );

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.preview",
        json!({ "midterm": 80, "coursework": 90, "final": 70 }),
    );
    assert_eq!(preview["result"]["total"].as_f64(), Some(78.0));
    assert_eq!(preview["result"]["letterGrade"].as_str(), Some("B"));

    for i in 1..=5 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "courses.create",
            json!({ "code": format!("C{}", i), "nameEn": format!("Course {}", i), "credits": 3 }),
        );
    }

    // Survives reopening the workspace.
    let (_child2, mut stdin2, mut reader2) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin2,
        &mut reader2,
        "7",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let listed = request_ok(&mut stdin2, &mut reader2, "8", "courses.list", json!({}));
    assert_eq!(listed["pageSize"].as_u64(), Some(3));
    assert_eq!(listed["totalPages"].as_u64(), Some(2));
    let cfg = request_ok(&mut stdin2, &mut reader2, "9", "config.get", json!({}));
    assert_eq!(cfg["config"]["weights"]["final"].as_f64(), Some(0.4));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn weight_changes_report_grades_left_on_old_totals() {
    let workspace = temp_dir("registrar-config-stale");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_enrollment(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.upsert",
        json!({ "enrollmentId": seeded.enrollment_id, "midterm": 80, "coursework": 90, "final": 70 }),
    );

    let paging_only = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "config.update",
        json!({ "defaultPageSize": 20 }),
    );
    assert_eq!(paging_only["staleGrades"].as_i64(), Some(0));

    let reweighted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "config.update",
        json!({ "weights": { "midterm": 0.4, "coursework": 0.2, "final": 0.4 } }),
    );
    assert_eq!(reweighted["staleGrades"].as_i64(), Some(1));

    // The stored total stays at its old value until the grade is edited.
    let grades = request_ok(&mut stdin, &mut reader, "4", "grades.list", json!({}));
    assert_eq!(grades["items"][0]["total"].as_f64(), Some(77.0));

    let _ = std::fs::remove_dir_all(workspace);
}
