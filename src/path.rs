//! Dotted path lookups into JSON documents
//!
//! Paths look like `additional_data.pagination.next_start` or, for item
//! selectors, `data.*`. A leading `$.` is accepted and ignored. Lookups
//! distinguish a key that is absent from a key that is present but null,
//! because the two mean different things for selectors and page tokens.
//!
//! Plain dotted paths are resolved by hand; wildcard selectors go through
//! `jsonpath-rust` once the collection they expand is known to exist.

use crate::error::{Error, Result};
use jsonpath_rust::JsonPath;
use serde_json::Value;

/// Outcome of resolving a path against a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The path resolved to a non-null value
    Found(&'a Value),
    /// The path resolved, but the value is null
    Null,
    /// Some segment of the path does not exist
    Missing,
}

impl<'a> Lookup<'a> {
    /// The found value, if any
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }

    /// True when the path resolved to nothing usable (null or absent)
    pub fn is_absent(self) -> bool {
        !matches!(self, Lookup::Found(_))
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    path.split('.').filter(|s| !s.is_empty())
}

/// Resolve a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Lookup<'a> {
    let mut current = value;
    for part in segments(path) {
        let next = match current {
            Value::Object(map) => map.get(part),
            Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Lookup::Missing,
        }
    }

    if current.is_null() {
        Lookup::Null
    } else {
        Lookup::Found(current)
    }
}

/// An item selector such as `data.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    base: String,
    /// JSONPath expanding the collection at `base`; `None` for plain paths
    wildcard: Option<String>,
}

impl Selector {
    /// Parse a selector path
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_value("data_selector", "selector is empty"));
        }

        let stripped = trimmed.strip_prefix("$.").unwrap_or(trimmed);
        let (base, expand) = match stripped.strip_suffix(".*") {
            Some(base) => (base.to_string(), true),
            None if stripped == "*" || stripped == "$" => (String::new(), true),
            None => (stripped.to_string(), false),
        };

        if segments(&base).any(|s| s == "*") {
            return Err(Error::invalid_value(
                "data_selector",
                format!("'{trimmed}': wildcards are only supported as the last segment"),
            ));
        }

        let wildcard = if expand {
            let expr = wildcard_expr(&base);
            compile(&expr)
                .map_err(|e| Error::invalid_value("data_selector", format!("'{trimmed}': {e}")))?;
            Some(expr)
        } else {
            None
        };

        Ok(Self {
            raw: trimmed.to_string(),
            base,
            wildcard,
        })
    }

    /// The selector as written in the configuration
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Extract items from a response body.
    ///
    /// A null at the selector path is an empty page; a missing key is a
    /// data shape error.
    pub fn select(&self, body: &Value) -> Result<Vec<Value>> {
        let target = if self.base.is_empty() {
            Lookup::Found(body)
        } else {
            lookup(body, &self.base)
        };

        match target {
            Lookup::Missing => Err(Error::data_shape(
                &self.raw,
                "item selector not present in response",
            )),
            Lookup::Null => Ok(Vec::new()),
            Lookup::Found(found) => match &self.wildcard {
                Some(expr) if matches!(found, Value::Array(_) | Value::Object(_)) => {
                    self.expand(body, expr)
                }
                Some(_) => Err(Error::data_shape(
                    &self.raw,
                    format!("expected a collection, found {}", type_name(found)),
                )),
                None => match found {
                    Value::Array(items) => Ok(items.clone()),
                    other => Ok(vec![other.clone()]),
                },
            },
        }
    }

    fn expand(&self, body: &Value, expr: &str) -> Result<Vec<Value>> {
        let jp = compile(expr).map_err(|e| Error::data_shape(&self.raw, e))?;

        match jp.find(body) {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

/// JSONPath that expands every element (or value) of the collection at `base`
fn wildcard_expr(base: &str) -> String {
    let mut expr = String::from("$");
    for part in segments(base) {
        if part.bytes().all(|b| b.is_ascii_digit()) {
            expr.push_str(&format!("[{part}]"));
        } else {
            expr.push_str(&format!("['{}']", part.replace('\'', "\\'")));
        }
    }
    expr.push_str(".*");
    expr
}

fn compile(expr: &str) -> std::result::Result<JsonPath, String> {
    JsonPath::try_from(expr).map_err(|e| format!("invalid JSONPath '{expr}': {e}"))
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Short JSON type name for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let body = json!({
            "additional_data": {"pagination": {"next_start": 100, "more": true}}
        });

        assert_eq!(
            lookup(&body, "additional_data.pagination.next_start").value(),
            Some(&json!(100))
        );
        assert_eq!(
            lookup(&body, "$.additional_data.pagination.more").value(),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_lookup_null_vs_missing() {
        let body = json!({"data": null, "meta": {}});
        assert_eq!(lookup(&body, "data"), Lookup::Null);
        assert_eq!(lookup(&body, "meta.next"), Lookup::Missing);
        assert_eq!(lookup(&body, "nope.deeper"), Lookup::Missing);
        assert!(lookup(&body, "data").is_absent());
    }

    #[test]
    fn test_lookup_array_index() {
        let body = json!({"items": [{"id": 1}, {"id": 2}]});
        assert_eq!(lookup(&body, "items.1.id").value(), Some(&json!(2)));
        assert_eq!(lookup(&body, "items.5.id"), Lookup::Missing);
    }

    #[test]
    fn test_selector_wildcard_array() {
        let selector = Selector::parse("data.*").unwrap();
        let body = json!({"data": [{"id": 1}, {"id": 2}]});
        assert_eq!(selector.select(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_selector_null_is_empty_page() {
        let selector = Selector::parse("data.*").unwrap();
        let body = json!({"success": true, "data": null});
        assert!(selector.select(&body).unwrap().is_empty());
    }

    #[test]
    fn test_selector_missing_is_data_shape() {
        let selector = Selector::parse("data.*").unwrap();
        let body = json!({"success": true});
        let err = selector.select(&body).unwrap_err();
        assert!(matches!(err, Error::DataShape { ref path, .. } if path == "data.*"));
    }

    #[test]
    fn test_selector_object_values() {
        let selector = Selector::parse("data.*").unwrap();
        let body = json!({"data": {"a": {"id": 1}, "b": {"id": 2}}});
        assert_eq!(selector.select(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_selector_without_wildcard() {
        let selector = Selector::parse("data").unwrap();
        let body = json!({"data": {"id": 7}});
        assert_eq!(selector.select(&body).unwrap(), vec![json!({"id": 7})]);
    }

    #[test]
    fn test_selector_root() {
        let selector = Selector::parse("*").unwrap();
        let body = json!([{"id": 1}]);
        assert_eq!(selector.select(&body).unwrap().len(), 1);
    }

    #[test]
    fn test_wildcard_expr() {
        assert_eq!(wildcard_expr("data"), "$['data'].*");
        assert_eq!(wildcard_expr("result.items"), "$['result']['items'].*");
        assert_eq!(wildcard_expr("pages.0"), "$['pages'][0].*");
        assert_eq!(wildcard_expr(""), "$.*");
    }

    #[test]
    fn test_selector_nested_wildcard() {
        let selector = Selector::parse("$.result.items.*").unwrap();
        let body = json!({"result": {"items": [{"id": 1}, {"id": 2}, {"id": 3}]}});
        let ids: Vec<_> = selector
            .select(&body)
            .unwrap()
            .iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_selector_wildcard_on_scalar_is_data_shape() {
        let selector = Selector::parse("data.*").unwrap();
        let err = selector.select(&json!({"data": 5})).unwrap_err();
        assert!(matches!(err, Error::DataShape { .. }));
    }

    #[test]
    fn test_selector_rejects_inner_wildcard() {
        assert!(Selector::parse("data.*.items").is_err());
        assert!(Selector::parse("").is_err());
    }
}
