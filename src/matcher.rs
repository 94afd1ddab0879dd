//! Matcher predicates evaluated by expectations.
//!
//! A matcher receives the value extracted for an expectation plus the shared
//! per-request [`Args`], and answers matched / not matched, or fails when it
//! cannot interpret its input. Matchers may keep state (see [`Repeat`]); such
//! matchers synchronize themselves, the dispatcher adds no locking.

mod json;
mod repeat;
mod text;

pub use json::{json_path, JsonPathMatcher};
pub use repeat::{repeat, Repeat};
pub use text::{
    contains, equal_ignore_case, glob, has_prefix, has_suffix, regex, Contains, EqualIgnoreCase,
    GlobMatcher, HasPrefix, HasSuffix, RegexMatcher, CAPTURE_PREFIX,
};

use crate::args::Args;
use crate::error::BoxError;
use crate::value::{Value, ValueKind};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A predicate over an extracted [`Value`].
pub trait Matcher: Send + Sync {
    /// Evaluate the predicate.
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError>;

    /// Kind this matcher operates on. `None` means every kind.
    fn kind(&self) -> Option<ValueKind> {
        None
    }

    /// Short description used in diagnostics.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<M: Matcher + ?Sized> Matcher for Arc<M> {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        (**self).matches(value, args)
    }

    fn kind(&self) -> Option<ValueKind> {
        (**self).kind()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        (**self).matches(value, args)
    }

    fn kind(&self) -> Option<ValueKind> {
        (**self).kind()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Error for a matcher that got a value it cannot read.
pub(crate) fn unexpected_kind(matcher: &str, value: &Value<'_>) -> BoxError {
    format!("{} cannot operate on a value of kind {}", matcher, value.kind()).into()
}

/// Read the string content of a value or fail.
pub(crate) fn expect_str<'a>(matcher: &str, value: &'a Value<'_>) -> Result<&'a str, BoxError> {
    value.as_str().ok_or_else(|| unexpected_kind(matcher, value))
}

/// Matches values equal to the expected one.
#[derive(Debug, Clone, PartialEq)]
pub struct Equal {
    expected: Value<'static>,
}

/// Equality against a typed value. The expected value's kind becomes the
/// matcher's kind.
pub fn equal(expected: impl Into<Value<'static>>) -> Equal {
    Equal {
        expected: expected.into(),
    }
}

/// Equality against a JSON value, usable with any value kind.
pub fn equal_any(expected: impl Into<JsonValue>) -> Equal {
    Equal {
        expected: Value::Any(expected.into()),
    }
}

impl Matcher for Equal {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        Ok(self.expected.loosely_equals(value))
    }

    fn kind(&self) -> Option<ValueKind> {
        match self.expected.kind() {
            ValueKind::Any => None,
            kind => Some(kind),
        }
    }

    fn describe(&self) -> String {
        format!("equal({:?})", self.expected)
    }
}

/// Negates another matcher. Errors pass through unchanged.
pub struct Not {
    inner: Box<dyn Matcher>,
}

pub fn not(inner: impl Matcher + 'static) -> Not {
    Not {
        inner: Box::new(inner),
    }
}

impl Matcher for Not {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        self.inner.matches(value, args).map(|matched| !matched)
    }

    fn kind(&self) -> Option<ValueKind> {
        self.inner.kind()
    }

    fn describe(&self) -> String {
        format!("not({})", self.inner.describe())
    }
}

/// Matches when every inner matcher matches. Stops at the first miss.
pub struct AllOf {
    matchers: Vec<Box<dyn Matcher>>,
}

pub fn all_of(matchers: Vec<Box<dyn Matcher>>) -> AllOf {
    AllOf { matchers }
}

impl Matcher for AllOf {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        for m in &self.matchers {
            if !m.matches(value, args)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn kind(&self) -> Option<ValueKind> {
        common_kind(&self.matchers)
    }

    fn describe(&self) -> String {
        format!("all_of({})", describe_all(&self.matchers))
    }
}

/// Matches when any inner matcher matches. Stops at the first hit.
pub struct AnyOf {
    matchers: Vec<Box<dyn Matcher>>,
}

pub fn any_of(matchers: Vec<Box<dyn Matcher>>) -> AnyOf {
    AnyOf { matchers }
}

impl Matcher for AnyOf {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        for m in &self.matchers {
            if m.matches(value, args)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn kind(&self) -> Option<ValueKind> {
        common_kind(&self.matchers)
    }

    fn describe(&self) -> String {
        format!("any_of({})", describe_all(&self.matchers))
    }
}

fn common_kind(matchers: &[Box<dyn Matcher>]) -> Option<ValueKind> {
    let first = matchers.first()?.kind()?;
    matchers
        .iter()
        .all(|m| m.kind() == Some(first))
        .then_some(first)
}

fn describe_all(matchers: &[Box<dyn Matcher>]) -> String {
    matchers
        .iter()
        .map(|m| m.describe())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Matcher backed by a closure.
pub struct Func<F> {
    f: F,
    kind: Option<ValueKind>,
}

/// Wrap a closure that accepts every value kind.
pub fn func<F>(f: F) -> Func<F>
where
    F: Fn(&Value<'_>, &mut Args) -> Result<bool, BoxError> + Send + Sync,
{
    Func { f, kind: None }
}

/// Wrap a closure restricted to one value kind.
pub fn func_of<F>(kind: ValueKind, f: F) -> Func<F>
where
    F: Fn(&Value<'_>, &mut Args) -> Result<bool, BoxError> + Send + Sync,
{
    Func {
        f,
        kind: Some(kind),
    }
}

impl<F> Matcher for Func<F>
where
    F: Fn(&Value<'_>, &mut Args) -> Result<bool, BoxError> + Send + Sync,
{
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        (self.f)(value, args)
    }

    fn kind(&self) -> Option<ValueKind> {
        self.kind
    }

    fn describe(&self) -> String {
        "func".to_string()
    }
}

impl<F> fmt::Debug for Func<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func").field("kind", &self.kind).finish()
    }
}

/// Closure over the string content of a value.
pub fn string_fn<F>(f: F) -> impl Matcher
where
    F: Fn(&str) -> bool + Send + Sync,
{
    func_of(ValueKind::String, move |value, _| {
        Ok(f(expect_str("string_fn", value)?))
    })
}

/// Matches strings and collections with at least one element.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsPresent;

pub fn is_present() -> IsPresent {
    IsPresent
}

impl Matcher for IsPresent {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        match value.is_empty() {
            Some(empty) => Ok(!empty),
            None => Ok(true),
        }
    }

    fn describe(&self) -> String {
        "is_present".to_string()
    }
}

/// Matches empty strings and collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsEmpty;

pub fn is_empty() -> IsEmpty {
    IsEmpty
}

impl Matcher for IsEmpty {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        value
            .is_empty()
            .ok_or_else(|| unexpected_kind("is_empty", value))
    }

    fn describe(&self) -> String {
        "is_empty".to_string()
    }
}

/// Entry of a multi-map, falling back to an ASCII case-insensitive key so
/// lowercased header names still match `Content-Type`.
fn multi_map_get<'a>(map: &'a BTreeMap<String, Vec<String>>, key: &str) -> Option<&'a Vec<String>> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Matches maps, header maps, and query parameters containing a key.
#[derive(Debug, Clone)]
pub struct HasKey {
    key: String,
}

pub fn has_key(key: impl Into<String>) -> HasKey {
    HasKey { key: key.into() }
}

impl Matcher for HasKey {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        match value {
            Value::Map(m) => Ok(m.contains_key(&self.key)),
            Value::MultiMap(m) => Ok(multi_map_get(m, &self.key).is_some()),
            Value::Query(q) => Ok(q.contains(&self.key)),
            Value::Any(JsonValue::Object(o)) => Ok(o.contains_key(&self.key)),
            other => Err(unexpected_kind("has_key", other)),
        }
    }

    fn describe(&self) -> String {
        format!("has_key({})", self.key)
    }
}

/// Applies a matcher to the values stored under one key of a map.
///
/// For header maps and query parameters the entry matches when any of its
/// values matches. A missing key never matches.
pub struct HasEntry {
    key: String,
    inner: Box<dyn Matcher>,
}

pub fn has_entry(key: impl Into<String>, inner: impl Matcher + 'static) -> HasEntry {
    HasEntry {
        key: key.into(),
        inner: Box::new(inner),
    }
}

impl HasEntry {
    fn any_string(
        &self,
        values: impl Iterator<Item = String>,
        args: &mut Args,
    ) -> Result<bool, BoxError> {
        for v in values {
            if self.inner.matches(&Value::String(v), args)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Matcher for HasEntry {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        match value {
            Value::MultiMap(m) => match multi_map_get(m, &self.key) {
                Some(values) => self.any_string(values.iter().cloned(), args),
                None => Ok(false),
            },
            Value::Query(q) => {
                let values: Vec<String> = q.get_all(&self.key).map(str::to_string).collect();
                self.any_string(values.into_iter(), args)
            }
            Value::Map(m) => match m.get(&self.key) {
                Some(v) => self.inner.matches(&Value::Any(v.clone()), args),
                None => Ok(false),
            },
            Value::Any(JsonValue::Object(o)) => match o.get(&self.key) {
                Some(v) => self.inner.matches(&Value::Any(v.clone()), args),
                None => Ok(false),
            },
            other => Err(unexpected_kind("has_entry", other)),
        }
    }

    fn describe(&self) -> String {
        format!("has_entry({}, {})", self.key, self.inner.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::QueryParams;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn eval(m: &dyn Matcher, value: Value<'_>) -> Result<bool, BoxError> {
        m.matches(&value, &mut Args::new())
    }

    #[test]
    fn test_equal_takes_kind_of_expected_value() {
        assert_eq!(equal("test").kind(), Some(ValueKind::String));
        assert_eq!(equal(10.0).kind(), Some(ValueKind::Number));
        assert_eq!(equal(true).kind(), Some(ValueKind::Boolean));
        assert_eq!(equal_any("test").kind(), None);

        assert!(eval(&equal("test"), Value::from("test")).unwrap());
        assert!(!eval(&equal("test"), Value::from("dev")).unwrap());
        assert!(eval(&equal_any("test"), Value::from("test")).unwrap());
        assert!(eval(&equal_any(json!(["test"])), Value::Set(vec![json!("test")])).unwrap());
    }

    #[test]
    fn test_not_negates_and_keeps_errors() {
        assert!(eval(&not(equal("a")), Value::from("b")).unwrap());
        assert!(!eval(&not(equal("a")), Value::from("a")).unwrap());
        assert!(eval(&not(is_empty()), Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_all_of_and_any_of() {
        let both = all_of(vec![Box::new(has_prefix("/api")), Box::new(has_suffix("users"))]);
        assert_eq!(both.kind(), Some(ValueKind::String));
        assert!(eval(&both, Value::from("/api/users")).unwrap());
        assert!(!eval(&both, Value::from("/api/posts")).unwrap());

        let either = any_of(vec![Box::new(equal("GET")), Box::new(equal_any("HEAD"))]);
        assert_eq!(either.kind(), None);
        assert!(eval(&either, Value::from("HEAD")).unwrap());
        assert!(!eval(&either, Value::from("POST")).unwrap());
    }

    #[test]
    fn test_func_can_write_args() {
        let m = func(|value, args| {
            args.insert("seen", value.to_json().unwrap_or_default());
            Ok(true)
        });
        let mut args = Args::new();
        assert!(m.matches(&Value::from("x"), &mut args).unwrap());
        assert_eq!(args.get_str("seen"), Some("x"));
    }

    #[test]
    fn test_func_error_propagates() {
        let m = func(|_, _| Err("fail".into()));
        assert_eq!(eval(&m, Value::Boolean(true)).unwrap_err().to_string(), "fail");
    }

    #[test]
    fn test_string_fn_rejects_non_strings() {
        let m = string_fn(|s| s.len() > 3);
        assert_eq!(m.kind(), Some(ValueKind::String));
        assert!(eval(&m, Value::from("long")).unwrap());
        assert!(eval(&m, Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_presence() {
        assert!(eval(&is_present(), Value::from("x")).unwrap());
        assert!(!eval(&is_present(), Value::from("")).unwrap());
        assert!(eval(&is_present(), Value::Boolean(false)).unwrap());
        assert!(eval(&is_empty(), Value::Set(vec![])).unwrap());
    }

    #[test]
    fn test_has_key_and_has_entry() {
        let mut headers = BTreeMap::new();
        headers.insert(
            "accept".to_string(),
            vec!["text/html".to_string(), "application/json".to_string()],
        );
        let headers = Value::MultiMap(headers);

        assert!(eval(&has_key("accept"), headers.clone()).unwrap());
        assert!(!eval(&has_key("authorization"), headers.clone()).unwrap());
        assert!(eval(&has_entry("accept", contains("json")), headers.clone()).unwrap());
        assert!(!eval(&has_entry("accept", contains("xml")), headers.clone()).unwrap());
        assert!(eval(&has_key("Accept"), headers.clone()).unwrap());
        assert!(eval(&has_entry("ACCEPT", contains("html")), headers).unwrap());

        let mut exact = BTreeMap::new();
        exact.insert("Tag".to_string(), vec!["upper".to_string()]);
        exact.insert("tag".to_string(), vec!["lower".to_string()]);
        let exact = Value::MultiMap(exact);
        assert!(eval(&has_entry("Tag", equal("upper")), exact.clone()).unwrap());
        assert!(eval(&has_entry("tag", equal("lower")), exact).unwrap());

        let query: QueryParams = [("page", "1")].into_iter().collect();
        assert!(eval(&has_entry("page", equal("1")), Value::Query(query)).unwrap());

        let map = json!({"key": "value"}).as_object().cloned().unwrap();
        assert!(eval(&has_entry("key", equal_any("value")), Value::Map(map)).unwrap());

        assert!(eval(&has_key("x"), Value::Number(1.0)).is_err());
    }
}
