use crate::ipc::error::HandlerErr;
use crate::listing::{normalize_filters, ListQuery};
use std::collections::BTreeMap;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent and null both read as `None`; a blank string reads as `Some("")`
/// so patches can clear optional text.
pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_opt_f64(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn get_opt_bool(params: &serde_json::Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

/// `params.patch` as an object; missing means an empty patch.
pub fn get_patch(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    match params.get("patch") {
        None => Ok(serde_json::json!({})),
        Some(v) if v.is_object() => Ok(v.clone()),
        Some(_) => Err(HandlerErr::bad_params("patch must be an object")),
    }
}

fn filter_value_to_string(key: &str, v: &serde_json::Value) -> Result<Option<String>, HandlerErr> {
    match v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.clone())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(HandlerErr::bad_params(format!(
            "filters.{} must be a string, number or boolean",
            key
        ))),
    }
}

/// Reads `query`, `searchFields`, `filters`, `page`, `pageSize` off a list
/// request. Scalar filter values arrive as text; each screen puts them in
/// canonical form before matching.
pub fn parse_list_query(
    params: &serde_json::Value,
    default_page_size: usize,
) -> Result<ListQuery, HandlerErr> {
    let query = get_opt_str(params, "query")?;

    let search_fields = match params.get("searchFields") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let Some(arr) = v.as_array() else {
                return Err(HandlerErr::bad_params("searchFields must be an array"));
            };
            Some(
                arr.iter()
                    .filter_map(|f| f.as_str().map(|s| s.to_string()))
                    .collect::<Vec<_>>(),
            )
        }
    };

    let mut filters: BTreeMap<String, String> = BTreeMap::new();
    match params.get("filters") {
        None => {}
        Some(v) if v.is_null() => {}
        Some(v) => {
            let Some(obj) = v.as_object() else {
                return Err(HandlerErr::bad_params("filters must be an object"));
            };
            for (k, raw) in obj {
                if let Some(s) = filter_value_to_string(k, raw)? {
                    filters.insert(k.clone(), s);
                }
            }
        }
    }

    let page = match params.get("page") {
        None => 1,
        Some(v) if v.is_null() => 1,
        Some(v) => {
            let Some(n) = v.as_i64() else {
                return Err(HandlerErr::bad_params("page must be an integer"));
            };
            n.max(1) as usize
        }
    };
    let page_size = match params.get("pageSize") {
        None => default_page_size,
        Some(v) if v.is_null() => default_page_size,
        Some(v) => {
            let Some(n) = v.as_i64() else {
                return Err(HandlerErr::bad_params("pageSize must be an integer"));
            };
            n.max(1) as usize
        }
    };

    Ok(ListQuery {
        query,
        search_fields,
        filters: normalize_filters(filters),
        page,
        page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_query_defaults() {
        let q = parse_list_query(&json!({}), 10).expect("parse");
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 10);
        assert!(q.filters.is_empty());
        assert!(q.query.is_none());
    }

    #[test]
    fn list_query_stringifies_scalar_filters_and_drops_all() {
        let q = parse_list_query(
            &json!({
                "query": " cs ",
                "filters": { "isActive": true, "status": "ALL", "credits": 3, "programId": null },
                "page": 2,
                "pageSize": 25
            }),
            10,
        )
        .expect("parse");
        assert_eq!(q.query.as_deref(), Some("cs"));
        assert_eq!(q.filters.get("isActive").map(String::as_str), Some("true"));
        assert_eq!(q.filters.get("credits").map(String::as_str), Some("3"));
        assert!(!q.filters.contains_key("status"));
        assert!(!q.filters.contains_key("programId"));
        assert_eq!((q.page, q.page_size), (2, 25));
    }

    #[test]
    fn list_query_rejects_bad_shapes() {
        assert!(parse_list_query(&json!({ "filters": [] }), 10).is_err());
        assert!(parse_list_query(&json!({ "page": "two" }), 10).is_err());
        assert!(parse_list_query(&json!({ "filters": { "x": [1] } }), 10).is_err());
    }

    #[test]
    fn required_str_rejects_blank() {
        assert!(get_required_str(&json!({ "code": "  " }), "code").is_err());
        assert_eq!(
            get_required_str(&json!({ "code": " CS101 " }), "code").expect("code"),
            "CS101"
        );
    }
}
