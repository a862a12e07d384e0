use super::views::{screen_csv, Screen};
use super::{load_config, with_db};
use crate::export::write_text_file;
use crate::ipc::error::HandlerErr;
use crate::ipc::params::{get_required_str, parse_list_query};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

/// Writes every row of a screen that matches `query`/`filters` (all pages)
/// to `outPath`. An empty match still writes the header line.
fn export_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let screen = Screen::parse(&get_required_str(params, "screen")?)?;
    let out_path = get_required_str(params, "outPath")?;
    let cfg = load_config(conn)?;
    let q = parse_list_query(params, cfg.default_page_size)?;

    let (text, row_count) = screen_csv(conn, screen, &q)?;
    write_text_file(&PathBuf::from(&out_path), &text).map_err(|e| {
        HandlerErr::new("io_failed", format!("{:#}", e)).with_details(json!({ "path": out_path }))
    })?;
    tracing::info!(screen = screen.name(), rows = row_count, path = %out_path, "csv exported");
    Ok(json!({
        "ok": true,
        "screen": screen.name(),
        "path": out_path,
        "rowCount": row_count,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.csv" => Some(with_db(state, req, export_csv)),
        _ => None,
    }
}
