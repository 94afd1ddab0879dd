//! JSONPath predicates over request bodies.

use super::{unexpected_kind, Matcher};
use crate::args::Args;
use crate::error::BoxError;
use crate::value::{Value, ValueKind};
use jsonpath_rust::JsonPath;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Matches a JSON document against JSONPath expressions.
///
/// Every expression must hold. An expected `null` only requires the path to
/// resolve; any other expected value must equal one of the resolved values
/// (or the whole result set).
#[derive(Debug, Clone)]
pub struct JsonPathMatcher {
    expressions: Vec<CompiledPath>,
}

/// An expression parsed once at construction, kept with its source text.
#[derive(Clone)]
struct CompiledPath {
    source: String,
    path: Arc<JsonPath>,
    expected: JsonValue,
}

impl fmt::Debug for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPath")
            .field("source", &self.source)
            .field("expected", &self.expected)
            .finish()
    }
}

/// Build a matcher for a single expression. The expression is compiled up
/// front so configuration mistakes surface early.
pub fn json_path(
    expression: impl Into<String>,
    expected: impl Into<JsonValue>,
) -> Result<JsonPathMatcher, BoxError> {
    JsonPathMatcher::new(vec![(expression.into(), expected.into())])
}

impl JsonPathMatcher {
    pub fn new(expressions: Vec<(String, JsonValue)>) -> Result<Self, BoxError> {
        let expressions = expressions
            .into_iter()
            .map(|(source, expected)| {
                let path = compile(&source)?;
                Ok(CompiledPath {
                    source,
                    path: Arc::new(path),
                    expected,
                })
            })
            .collect::<Result<Vec<_>, BoxError>>()?;
        Ok(Self { expressions })
    }

    fn matches_document(&self, json: &JsonValue) -> bool {
        for CompiledPath { path, expected, .. } in &self.expressions {
            let found = match path.find(json) {
                JsonValue::Array(items) => items,
                JsonValue::Null => Vec::new(),
                single => vec![single],
            };

            let matches = if expected.is_null() {
                found.iter().any(|v| !v.is_null())
            } else {
                let expected = Value::Any(expected.clone());
                found
                    .iter()
                    .any(|v| Value::Any(v.clone()).loosely_equals(&expected))
                    || Value::Any(JsonValue::Array(found)).loosely_equals(&expected)
            };
            if !matches {
                return false;
            }
        }
        true
    }
}

fn compile(expr: &str) -> Result<JsonPath, BoxError> {
    JsonPath::try_from(expr).map_err(|e| format!("invalid JSONPath {}: {}", expr, e).into())
}

impl Matcher for JsonPathMatcher {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        match value {
            Value::String(body) => {
                let json: JsonValue = serde_json::from_str(body)
                    .map_err(|e| format!("body is not valid JSON: {}", e))?;
                Ok(self.matches_document(&json))
            }
            Value::Any(json) => Ok(self.matches_document(json)),
            Value::Map(map) => Ok(self.matches_document(&JsonValue::Object(map.clone()))),
            other => Err(unexpected_kind("json_path", other)),
        }
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        let exprs: Vec<&str> = self.expressions.iter().map(|e| e.source.as_str()).collect();
        format!("json_path({})", exprs.join(", "))
    }
}
