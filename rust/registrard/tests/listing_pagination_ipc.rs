mod test_support;

use serde_json::json;
use std::collections::BTreeSet;
use test_support::{request_ok, spawn_sidecar, str_field, temp_dir};

fn count(v: &serde_json::Value, key: &str) -> u64 {
    v.get(key)
        .and_then(|x| x.as_u64())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
}

fn student_nos(page: &serde_json::Value) -> Vec<String> {
    page.get("items")
        .and_then(|v| v.as_array())
        .expect("items")
        .iter()
        .map(|s| str_field(s, "studentNo"))
        .collect()
}

#[test]
fn student_list_pages_filters_and_clamps() {
    let workspace = temp_dir("registrar-listing");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for i in 1..=23 {
        let status = if i % 3 == 0 { "Suspended" } else { "ACTIVE" };
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({
                "studentNo": format!("S-{:03}", i),
                "nameEn": format!("Student {}", i),
                "status": status
            }),
        );
    }

    let last = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.list",
        json!({ "page": 3, "pageSize": 10 }),
    );
    assert_eq!(count(&last, "total"), 23);
    assert_eq!(count(&last, "totalPages"), 3);
    assert_eq!(student_nos(&last), vec!["S-021", "S-022", "S-023"]);

    let beyond = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.list",
        json!({ "page": 99, "pageSize": 10 }),
    );
    assert_eq!(count(&beyond, "page"), 3);

    let below = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "page": 0 }),
    );
    assert_eq!(count(&below, "page"), 1);
    assert_eq!(count(&below, "pageSize"), 10);

    let suspended = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.list",
        json!({ "filters": { "status": "suspended" }, "pageSize": 50 }),
    );
    assert_eq!(count(&suspended, "total"), 7);

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.list",
        json!({ "filters": { "status": "All" } }),
    );
    assert_eq!(count(&all, "total"), 23);

    // "student 1" hits 1 and 10..=19; with the filter only 12, 15, 18 remain.
    let searched = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.list",
        json!({ "query": "STUDENT 1", "pageSize": 50 }),
    );
    assert_eq!(count(&searched, "total"), 11);
    let both = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.list",
        json!({ "query": "student 1", "filters": { "status": "suspended" }, "pageSize": 50 }),
    );
    assert_eq!(student_nos(&both), vec!["S-012", "S-015", "S-018"]);

    let none = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.list",
        json!({ "query": "zzz", "page": 4 }),
    );
    assert_eq!(count(&none, "total"), 0);
    assert_eq!(count(&none, "page"), 1);
    assert_eq!(count(&none, "totalPages"), 0);
    assert!(student_nos(&none).is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn concatenated_pages_cover_each_match_once() {
    let workspace = temp_dir("registrar-listing-cover");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for i in 1..=17 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({ "studentNo": format!("N-{:02}", i), "nameEn": format!("Name {}", i) }),
        );
    }

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.list",
        json!({ "pageSize": 4 }),
    );
    let pages = count(&first, "totalPages");
    assert_eq!(pages, 5);

    let mut seen: Vec<String> = Vec::new();
    for p in 1..=pages {
        let page = request_ok(
            &mut stdin,
            &mut reader,
            &format!("p{}", p),
            "students.list",
            json!({ "page": p, "pageSize": 4 }),
        );
        seen.extend(student_nos(&page));
    }
    assert_eq!(seen.len(), 17);
    let unique: BTreeSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 17);

    let _ = std::fs::remove_dir_all(workspace);
}
