//! Search, categorical filtering and pagination over in-memory record
//! lists, plus the per-screen view state those lists are driven from.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 500;

/// A record that can be searched and filtered by name.
pub trait Listable {
    /// Fields searched when the caller does not name any.
    const SEARCH_FIELDS: &'static [&'static str];

    fn text_field(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Value compared by exact match against a categorical filter.
    fn category(&self, key: &str) -> Option<Cow<'_, str>>;

    /// Rewrites a caller's filter value into the spelling `category`
    /// reports, or rejects it.
    fn canonical_filter(_key: &str, value: &str) -> Result<String, String> {
        Ok(value.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("filters.{key}: {reason}")]
pub struct FilterError {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub search_fields: Option<Vec<String>>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// `"all"` (any case) and blank values mean "no filter".
pub fn is_wildcard(value: &str) -> bool {
    let t = value.trim();
    t.is_empty() || t.eq_ignore_ascii_case("all")
}

pub fn normalize_filters(raw: BTreeMap<String, String>) -> BTreeMap<String, String> {
    raw.into_iter()
        .filter(|(_, v)| !is_wildcard(v))
        .map(|(k, v)| (k, v.trim().to_string()))
        .collect()
}

pub fn clamp_page_size(page_size: usize) -> usize {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

fn matches_query<T: Listable>(item: &T, needle: &str, fields: &[&str]) -> bool {
    fields.iter().any(|f| {
        item.text_field(f)
            .map(|v| v.to_lowercase().contains(needle))
            .unwrap_or(false)
    })
}

fn matches_filters<T: Listable>(item: &T, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(key, want)| {
        if is_wildcard(want) {
            return true;
        }
        item.category(key)
            .map(|have| have.as_ref() == want.trim())
            .unwrap_or(false)
    })
}

/// `q` with every filter value in canonical form. Wildcards are dropped.
pub fn canonical_query<T: Listable>(q: &ListQuery) -> Result<ListQuery, FilterError> {
    let mut filters = BTreeMap::new();
    for (key, value) in &q.filters {
        if is_wildcard(value) {
            continue;
        }
        let canonical = T::canonical_filter(key, value.trim()).map_err(|reason| FilterError {
            key: key.clone(),
            reason,
        })?;
        filters.insert(key.clone(), canonical);
    }
    Ok(ListQuery {
        filters,
        ..q.clone()
    })
}

/// Items matching both the free-text query and every filter, in input order.
pub fn filter_items<'a, T: Listable>(items: &'a [T], q: &ListQuery) -> Vec<&'a T> {
    let needle = q
        .query
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let fields: Vec<&str> = match &q.search_fields {
        Some(named) if !named.is_empty() => named.iter().map(String::as_str).collect(),
        _ => T::SEARCH_FIELDS.to_vec(),
    };
    items
        .iter()
        .filter(|item| {
            needle
                .as_deref()
                .map(|n| matches_query(*item, n, &fields))
                .unwrap_or(true)
        })
        .filter(|item| matches_filters(*item, &q.filters))
        .collect()
}

/// Slices one page out of `items`. Page numbers are 1-based and clamp to
/// the valid range; an empty list yields page 1 with no items.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = clamp_page_size(page_size);
    let total = items.len();
    let total_pages = total.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));
    let start = (page - 1) * page_size;
    let items: Vec<T> = items.into_iter().skip(start).take(page_size).collect();
    Page {
        items,
        total,
        page,
        page_size,
        total_pages,
    }
}

pub fn list<T: Listable + Clone>(items: &[T], q: &ListQuery) -> Page<T> {
    let matched: Vec<T> = filter_items(items, q).into_iter().cloned().collect();
    paginate(matched, q.page, q.page_size)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewState {
    pub query: String,
    pub filters: BTreeMap<String, String>,
    pub page: usize,
    pub page_size: usize,
}

impl ListViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            filters: BTreeMap::new(),
            page: 1,
            page_size: clamp_page_size(page_size),
        }
    }

    pub fn to_query(&self) -> ListQuery {
        ListQuery {
            query: Some(self.query.clone()),
            search_fields: None,
            filters: self.filters.clone(),
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ListAction {
    SetQuery {
        value: String,
    },
    SetFilter {
        key: String,
        value: String,
    },
    ClearFilter {
        key: String,
    },
    ClearAll,
    SetPage {
        page: usize,
    },
    SetPageSize {
        #[serde(rename = "pageSize")]
        page_size: usize,
    },
}

/// Pure transition. Anything that changes which items match, or how many
/// fit on a page, sends the view back to page 1.
pub fn reduce(state: &ListViewState, action: ListAction) -> ListViewState {
    let mut next = state.clone();
    match action {
        ListAction::SetQuery { value } => {
            next.query = value;
            next.page = 1;
        }
        ListAction::SetFilter { key, value } => {
            if is_wildcard(&value) {
                next.filters.remove(&key);
            } else {
                next.filters.insert(key, value.trim().to_string());
            }
            next.page = 1;
        }
        ListAction::ClearFilter { key } => {
            next.filters.remove(&key);
            next.page = 1;
        }
        ListAction::ClearAll => {
            next.query.clear();
            next.filters.clear();
            next.page = 1;
        }
        ListAction::SetPage { page } => {
            next.page = page.max(1);
        }
        ListAction::SetPageSize { page_size } => {
            next.page_size = clamp_page_size(page_size);
            next.page = 1;
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        code: String,
        name: String,
        active: bool,
        level: &'static str,
    }

    impl Listable for Row {
        const SEARCH_FIELDS: &'static [&'static str] = &["code", "name"];

        fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
            match name {
                "code" => Some(Cow::Borrowed(&self.code)),
                "name" => Some(Cow::Borrowed(&self.name)),
                _ => None,
            }
        }

        fn category(&self, key: &str) -> Option<Cow<'_, str>> {
            match key {
                "isActive" => Some(Cow::Borrowed(if self.active { "true" } else { "false" })),
                "level" => Some(Cow::Borrowed(self.level)),
                _ => None,
            }
        }

        fn canonical_filter(key: &str, value: &str) -> Result<String, String> {
            match key {
                "level" => match value.to_ascii_lowercase().as_str() {
                    l @ ("master" | "bachelor") => Ok(l.to_string()),
                    _ => Err(format!("unknown level {}", value)),
                },
                _ => Ok(value.to_string()),
            }
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| Row {
                code: format!("CS{:03}", i),
                name: if i % 3 == 0 {
                    format!("Intro Topic {i}")
                } else {
                    format!("Advanced Topic {i}")
                },
                active: i % 2 == 0,
                level: if i % 4 == 0 { "master" } else { "bachelor" },
            })
            .collect()
    }

    fn q(query: Option<&str>, filters: &[(&str, &str)], page: usize, page_size: usize) -> ListQuery {
        ListQuery {
            query: query.map(str::to_string),
            search_fields: None,
            filters: filters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            page,
            page_size,
        }
    }

    #[test]
    fn pages_cover_filtered_set_exactly_once() {
        let data = rows(23);
        for page_size in [1usize, 4, 5, 10, 23, 50] {
            let first = list(&data, &q(None, &[], 1, page_size));
            assert_eq!(first.total_pages, data.len().div_ceil(page_size));
            let mut all: Vec<Row> = Vec::new();
            for p in 1..=first.total_pages {
                all.extend(list(&data, &q(None, &[], p, page_size)).items);
            }
            assert_eq!(all, data, "page size {page_size}");
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let data = rows(12);
        let page = list(&data, &q(Some("  INTRO "), &[], 1, 50));
        assert_eq!(page.total, 4);
        assert!(page.items.iter().all(|r| r.name.starts_with("Intro")));

        let by_code = list(&data, &q(Some("cs01"), &[], 1, 50));
        assert_eq!(by_code.total, 2);
    }

    #[test]
    fn named_search_fields_restrict_the_search() {
        let data = rows(12);
        let mut query = q(Some("cs0"), &[], 1, 50);
        query.search_fields = Some(vec!["name".to_string()]);
        assert_eq!(list(&data, &query).total, 0);
    }

    #[test]
    fn search_and_filter_compose_as_intersection() {
        let data = rows(40);
        let both: HashSet<String> = filter_items(&data, &q(Some("advanced"), &[("isActive", "true")], 1, 10))
            .into_iter()
            .map(|r| r.code.clone())
            .collect();
        let search_only: HashSet<String> = filter_items(&data, &q(Some("advanced"), &[], 1, 10))
            .into_iter()
            .map(|r| r.code.clone())
            .collect();
        let filter_only: HashSet<String> = filter_items(&data, &q(None, &[("isActive", "true")], 1, 10))
            .into_iter()
            .map(|r| r.code.clone())
            .collect();
        let expected: HashSet<String> = search_only.intersection(&filter_only).cloned().collect();
        assert!(!both.is_empty());
        assert_eq!(both, expected);
    }

    #[test]
    fn filters_match_exactly_and_all_is_wildcard() {
        let data = rows(8);
        assert_eq!(list(&data, &q(None, &[("level", "master")], 1, 50)).total, 2);
        assert_eq!(list(&data, &q(None, &[("level", "Master")], 1, 50)).total, 0);
        assert_eq!(list(&data, &q(None, &[("level", "ALL")], 1, 50)).total, 8);
        assert_eq!(list(&data, &q(None, &[("unknown", "x")], 1, 50)).total, 0);
    }

    #[test]
    fn canonical_query_rewrites_and_rejects_filter_values() {
        let data = rows(8);
        let raw = q(None, &[("level", "MASTER"), ("isActive", "all")], 1, 50);
        let canon = canonical_query::<Row>(&raw).expect("canonical");
        assert_eq!(canon.filters.get("level").map(String::as_str), Some("master"));
        assert!(!canon.filters.contains_key("isActive"));
        assert_eq!(list(&data, &canon).total, 2);

        let err = canonical_query::<Row>(&q(None, &[("level", "phd")], 1, 50)).unwrap_err();
        assert_eq!(err.key, "level");
    }

    #[test]
    fn out_of_range_pages_clamp() {
        let data = rows(25);
        let last = list(&data, &q(None, &[], 99, 10));
        assert_eq!(last.page, 3);
        assert_eq!(last.items.len(), 5);
        let zero = list(&data, &q(None, &[], 0, 10));
        assert_eq!(zero.page, 1);
        assert_eq!(zero.items.len(), 10);
    }

    #[test]
    fn empty_result_reports_page_one() {
        let page = paginate(Vec::<u8>::new(), 4, 10);
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn page_size_is_clamped() {
        let page = paginate((0..10).collect::<Vec<_>>(), 1, 0);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 10);
        let big = paginate((0..10).collect::<Vec<_>>(), 1, 10_000);
        assert_eq!(big.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn normalize_filters_drops_wildcards() {
        let mut raw = BTreeMap::new();
        raw.insert("status".to_string(), "All".to_string());
        raw.insert("level".to_string(), " master ".to_string());
        raw.insert("college".to_string(), "".to_string());
        let f = normalize_filters(raw);
        assert_eq!(f.len(), 1);
        assert_eq!(f.get("level").map(String::as_str), Some("master"));
    }

    #[test]
    fn reducer_resets_page_on_query_and_filter_changes() {
        let base = ListViewState::new(10);
        let on_page_3 = reduce(&base, ListAction::SetPage { page: 3 });
        assert_eq!(on_page_3.page, 3);

        let searched = reduce(&on_page_3, ListAction::SetQuery { value: "cs".into() });
        assert_eq!(searched.page, 1);
        assert_eq!(searched.query, "cs");

        let paged = reduce(&searched, ListAction::SetPage { page: 2 });
        let filtered = reduce(
            &paged,
            ListAction::SetFilter {
                key: "level".into(),
                value: "master".into(),
            },
        );
        assert_eq!(filtered.page, 1);
        assert_eq!(filtered.filters.get("level").map(String::as_str), Some("master"));

        let cleared = reduce(
            &reduce(&filtered, ListAction::SetPage { page: 4 }),
            ListAction::SetFilter {
                key: "level".into(),
                value: "all".into(),
            },
        );
        assert!(cleared.filters.is_empty());
        assert_eq!(cleared.page, 1);
    }

    #[test]
    fn reducer_does_not_mutate_input() {
        let base = ListViewState::new(10);
        let _ = reduce(&base, ListAction::SetQuery { value: "x".into() });
        assert_eq!(base, ListViewState::new(10));
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let a: ListAction =
            serde_json::from_value(serde_json::json!({ "type": "setPageSize", "pageSize": 25 }))
                .expect("parse action");
        assert_eq!(a, ListAction::SetPageSize { page_size: 25 });
        let b: ListAction =
            serde_json::from_value(serde_json::json!({ "type": "clearAll" })).expect("parse action");
        assert_eq!(b, ListAction::ClearAll);
    }
}
