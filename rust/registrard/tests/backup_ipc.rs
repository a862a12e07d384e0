mod test_support;

use serde_json::json;
use std::fs::File;
use std::io::Read;
use test_support::{request, request_ok, seed_enrollment, spawn_sidecar, str_field, temp_dir};

#[test]
fn workspace_bundle_roundtrip_restores_records() {
    let workspace = temp_dir("registrar-backup-ipc");
    let out_dir = temp_dir("registrar-backup-ipc-out");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = seed_enrollment(&mut stdin, &mut reader, &workspace);

    let bundle = out_dir.join("workspace.zip");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "backup.exportWorkspace",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(str_field(&exported, "bundleFormat"), "registrar-workspace-v1");
    let sha = str_field(&exported, "dbSha256");
    assert_eq!(sha.len(), 64);

    let f = File::open(&bundle).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(&sha));
    archive
        .by_name("db/registrar.sqlite3")
        .expect("database entry in bundle");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "studentNo": "S-2002", "nameEn": "Added After Backup" }),
    );
    let before = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(before.get("total").and_then(|v| v.as_u64()), Some(2));

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.importWorkspace",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(str_field(&imported, "dbSha256"), sha);

    let after = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(after.get("total").and_then(|v| v.as_u64()), Some(1));

    // The restored file is a real workspace database.
    let conn = rusqlite::Connection::open(workspace.join("registrar.sqlite3")).expect("open db");
    let enrollments: i64 = conn
        .query_row("SELECT COUNT(*) FROM enrollments", [], |r| r.get(0))
        .expect("count enrollments");
    assert_eq!(enrollments, 1);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn rejected_bundle_leaves_workspace_usable() {
    let workspace = temp_dir("registrar-backup-bad");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = seed_enrollment(&mut stdin, &mut reader, &workspace);

    let junk = workspace.join("junk.zip");
    std::fs::write(&junk, b"definitely not a zip").expect("write junk");
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "backup.importWorkspace",
        json!({ "inPath": junk.to_string_lossy() }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(resp["error"]["code"].as_str(), Some("io_failed"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "2",
        "backup.importWorkspace",
        json!({ "inPath": workspace.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(missing["error"]["code"].as_str(), Some("not_found"));

    let students = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(students.get("total").and_then(|v| v.as_u64()), Some(1));

    let _ = std::fs::remove_dir_all(workspace);
}
