use super::load_config;
use crate::export::{render_csv, CsvRow};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::params::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::listing::{
    canonical_query, filter_items, list, reduce, FilterError, ListAction, ListQuery, ListViewState,
    Listable,
};
use crate::records;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Programs,
    Courses,
    Students,
    Semesters,
    Enrollments,
    Grades,
}

impl Screen {
    pub fn parse(raw: &str) -> Result<Self, HandlerErr> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "programs" => Ok(Screen::Programs),
            "courses" => Ok(Screen::Courses),
            "students" => Ok(Screen::Students),
            "semesters" => Ok(Screen::Semesters),
            "enrollments" => Ok(Screen::Enrollments),
            "grades" => Ok(Screen::Grades),
            other => Err(HandlerErr::bad_params(format!("unknown screen: {}", other))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Screen::Programs => "programs",
            Screen::Courses => "courses",
            Screen::Students => "students",
            Screen::Semesters => "semesters",
            Screen::Enrollments => "enrollments",
            Screen::Grades => "grades",
        }
    }
}

fn filter_err(e: FilterError) -> HandlerErr {
    let key = e.key.clone();
    HandlerErr::bad_params(e.to_string()).with_details(json!({ "filter": key }))
}

fn page_json<T>(items: &[T], q: &ListQuery) -> Result<serde_json::Value, HandlerErr>
where
    T: Listable + Clone + Serialize,
{
    let q = canonical_query::<T>(q).map_err(filter_err)?;
    serde_json::to_value(list(items, &q)).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

fn csv_of<T: Listable + CsvRow>(items: &[T], q: &ListQuery) -> Result<(String, usize), HandlerErr> {
    let q = canonical_query::<T>(q).map_err(filter_err)?;
    let rows = filter_items(items, &q);
    Ok((render_csv(&rows), rows.len()))
}

/// One page of `screen` as `{items, total, page, pageSize, totalPages}`.
pub(crate) fn list_screen(
    conn: &Connection,
    screen: Screen,
    q: &ListQuery,
) -> Result<serde_json::Value, HandlerErr> {
    match screen {
        Screen::Programs => page_json(&records::load_programs(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Courses => page_json(&records::load_courses(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Students => page_json(&records::load_students(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Semesters => page_json(&records::load_semesters(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Enrollments => {
            page_json(&records::load_enrollments(conn).map_err(HandlerErr::db_query)?, q)
        }
        Screen::Grades => page_json(&records::load_grades(conn).map_err(HandlerErr::db_query)?, q),
    }
}

/// Every row of `screen` matching `q`, across all pages, as CSV text.
pub(crate) fn screen_csv(
    conn: &Connection,
    screen: Screen,
    q: &ListQuery,
) -> Result<(String, usize), HandlerErr> {
    match screen {
        Screen::Programs => csv_of(&records::load_programs(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Courses => csv_of(&records::load_courses(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Students => csv_of(&records::load_students(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Semesters => csv_of(&records::load_semesters(conn).map_err(HandlerErr::db_query)?, q),
        Screen::Enrollments => {
            csv_of(&records::load_enrollments(conn).map_err(HandlerErr::db_query)?, q)
        }
        Screen::Grades => csv_of(&records::load_grades(conn).map_err(HandlerErr::db_query)?, q),
    }
}

/// Applies `action` (if any) to the screen's stored view and returns the
/// resulting state with the page it selects. The stored page follows the
/// clamped page actually shown.
fn view_step(
    state: &mut AppState,
    params: &serde_json::Value,
    action: Option<ListAction>,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let screen = Screen::parse(&get_required_str(params, "screen")?)?;
    let cfg = load_config(conn)?;

    let current = state
        .views
        .get(screen.name())
        .cloned()
        .unwrap_or_else(|| ListViewState::new(cfg.default_page_size));
    let mut next = match action {
        Some(a) => reduce(&current, a),
        None => current,
    };
    let page = list_screen(conn, screen, &next.to_query())?;
    if let Some(shown) = page.get("page").and_then(|p| p.as_u64()) {
        next.page = shown as usize;
    }
    state.views.insert(screen.name().to_string(), next.clone());

    Ok(json!({
        "screen": screen.name(),
        "state": next,
        "page": page,
    }))
}

fn views_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match view_step(state, &req.params, None) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn views_dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let action = match req.params.get("action") {
        Some(raw) => serde_json::from_value::<ListAction>(raw.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid action: {}", e))),
        None => Err(HandlerErr::bad_params("missing action")),
    };
    let result = action.and_then(|a| view_step(state, &req.params, Some(a)));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "views.get" => Some(views_get(state, req)),
        "views.dispatch" => Some(views_dispatch(state, req)),
        _ => None,
    }
}
