//! The closed set of value kinds an expectation can inspect.

use crate::request::{QueryParams, RequestInfo};
use http::Uri;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of value an expectation extracts from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Any,
    String,
    Number,
    Boolean,
    Set,
    Map,
    MultiMap,
    Url,
    Query,
    Request,
}

impl ValueKind {
    pub const ALL: [ValueKind; 10] = [
        ValueKind::Any,
        ValueKind::String,
        ValueKind::Number,
        ValueKind::Boolean,
        ValueKind::Set,
        ValueKind::Map,
        ValueKind::MultiMap,
        ValueKind::Url,
        ValueKind::Query,
        ValueKind::Request,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Set => "set",
            ValueKind::Map => "map",
            ValueKind::MultiMap => "multi_map",
            ValueKind::Url => "url",
            ValueKind::Query => "query",
            ValueKind::Request => "request",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kind name outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported value kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ValueKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A value extracted from a request, one arm per [`ValueKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'r> {
    Any(JsonValue),
    String(String),
    Number(f64),
    Boolean(bool),
    Set(Vec<JsonValue>),
    Map(Map<String, JsonValue>),
    MultiMap(BTreeMap<String, Vec<String>>),
    Url(Uri),
    Query(QueryParams),
    Request(&'r RequestInfo),
}

impl<'r> Value<'r> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Any(_) => ValueKind::Any,
            Value::String(_) => ValueKind::String,
            Value::Number(_) => ValueKind::Number,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Set(_) => ValueKind::Set,
            Value::Map(_) => ValueKind::Map,
            Value::MultiMap(_) => ValueKind::MultiMap,
            Value::Url(_) => ValueKind::Url,
            Value::Query(_) => ValueKind::Query,
            Value::Request(_) => ValueKind::Request,
        }
    }

    /// String content of a `String` value, or of an `Any` holding a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Any(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Any(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Any(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Emptiness of strings and collections. `None` for scalars and requests.
    pub fn is_empty(&self) -> Option<bool> {
        match self {
            Value::String(s) => Some(s.is_empty()),
            Value::Set(v) => Some(v.is_empty()),
            Value::Map(m) => Some(m.is_empty()),
            Value::MultiMap(m) => Some(m.is_empty()),
            Value::Query(q) => Some(q.is_empty()),
            Value::Any(JsonValue::Null) => Some(true),
            Value::Any(JsonValue::String(s)) => Some(s.is_empty()),
            Value::Any(JsonValue::Array(a)) => Some(a.is_empty()),
            Value::Any(JsonValue::Object(o)) => Some(o.is_empty()),
            _ => None,
        }
    }

    /// Project into JSON. Requests have no JSON form.
    pub fn to_json(&self) -> Option<JsonValue> {
        let json = match self {
            Value::Any(v) => v.clone(),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Set(v) => JsonValue::Array(v.clone()),
            Value::Map(m) => JsonValue::Object(m.clone()),
            Value::MultiMap(m) => multi_map_to_json(m),
            Value::Url(u) => JsonValue::String(u.to_string()),
            Value::Query(q) => multi_map_to_json(&q.to_multi_map()),
            Value::Request(_) => return None,
        };
        Some(json)
    }

    /// Equality that lets an `Any` value compare against any typed value
    /// through its JSON form.
    pub fn loosely_equals(&self, other: &Value<'_>) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Any(_), _) | (_, Value::Any(_)) => match (self.to_json(), other.to_json()) {
                (Some(a), Some(b)) => json_equals(&a, &b),
                _ => false,
            },
            (Value::Request(a), Value::Request(b)) => a == b,
            _ => self.kind() == other.kind() && self.to_json() == other.to_json(),
        }
    }
}

fn multi_map_to_json(map: &BTreeMap<String, Vec<String>>) -> JsonValue {
    JsonValue::Object(
        map.iter()
            .map(|(k, vs)| {
                (
                    k.clone(),
                    JsonValue::Array(vs.iter().cloned().map(JsonValue::String).collect()),
                )
            })
            .collect(),
    )
}

/// JSON equality where numbers compare by value (`10` equals `10.0`).
fn json_equals(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equals(a, b))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| json_equals(v, w)))
        }
        _ => a == b,
    }
}

impl From<&str> for Value<'_> {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value<'_> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value<'_> {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value<'_> {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<JsonValue> for Value<'_> {
    fn from(v: JsonValue) -> Self {
        Value::Any(v)
    }
}

impl From<Vec<JsonValue>> for Value<'_> {
    fn from(v: Vec<JsonValue>) -> Self {
        Value::Set(v)
    }
}

impl From<Map<String, JsonValue>> for Value<'_> {
    fn from(m: Map<String, JsonValue>) -> Self {
        Value::Map(m)
    }
}

impl From<BTreeMap<String, Vec<String>>> for Value<'_> {
    fn from(m: BTreeMap<String, Vec<String>>) -> Self {
        Value::MultiMap(m)
    }
}

impl From<Uri> for Value<'_> {
    fn from(u: Uri) -> Self {
        Value::Url(u)
    }
}

impl From<QueryParams> for Value<'_> {
    fn from(q: QueryParams) -> Self {
        Value::Query(q)
    }
}

impl<'r> From<&'r RequestInfo> for Value<'r> {
    fn from(r: &'r RequestInfo) -> Self {
        Value::Request(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names_round_trip_through_from_str() {
        for kind in ValueKind::ALL {
            assert_eq!(kind.to_string().parse::<ValueKind>(), Ok(kind));
        }
        assert_eq!(
            "int32".parse::<ValueKind>(),
            Err(UnknownKind("int32".to_string()))
        );
    }

    #[test]
    fn test_any_compares_through_json() {
        let any = Value::Any(json!("test"));
        assert!(any.loosely_equals(&Value::from("test")));
        assert!(Value::from("test").loosely_equals(&any));
        assert!(!any.loosely_equals(&Value::from("dev")));

        assert!(Value::Any(json!(10)).loosely_equals(&Value::Number(10.0)));
        assert!(Value::Any(json!({"a": [1, 2]})).loosely_equals(&Value::Any(json!({"a": [1.0, 2.0]}))));
    }

    #[test]
    fn test_typed_values_do_not_cross_kinds() {
        assert!(!Value::from("true").loosely_equals(&Value::Boolean(true)));
        assert!(!Value::Number(1.0).loosely_equals(&Value::from("1")));
    }

    #[test]
    fn test_query_and_headers_project_to_json_arrays() {
        let query: QueryParams = [("tag", "a"), ("tag", "b")].into_iter().collect();
        assert_eq!(Value::Query(query).to_json(), Some(json!({"tag": ["a", "b"]})));

        let req = RequestInfo::parse("GET", "/").unwrap();
        assert_eq!(Value::Request(&req).to_json(), None);
        assert_eq!(Value::Request(&req).kind(), ValueKind::Request);
    }

    #[test]
    fn test_url_projects_to_string() {
        let uri: Uri = "http://localhost:8080/path".parse().unwrap();
        assert_eq!(
            Value::Url(uri).to_json(),
            Some(json!("http://localhost:8080/path"))
        );
    }

    #[test]
    fn test_emptiness() {
        assert_eq!(Value::from("").is_empty(), Some(true));
        assert_eq!(Value::Set(vec![json!(1)]).is_empty(), Some(false));
        assert_eq!(Value::Any(JsonValue::Null).is_empty(), Some(true));
        assert_eq!(Value::Number(0.0).is_empty(), None);
    }
}
