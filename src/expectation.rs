//! Expectations and the evaluation pass that turns them into a score.
//!
//! An [`Expectation`] binds an [`Extractor`] (request -> typed [`Value`]), a
//! [`Matcher`] over that kind, a weight, and an optional label. [`evaluate`]
//! runs an ordered list of them against one request:
//!
//! 1. resolve the declared kind against the matcher; a mismatch aborts the pass
//!    before the extractor runs
//! 2. extract the value
//! 3. run the matcher; an error aborts the pass
//! 4. add the weight whether or not the matcher matched, and AND the outcome
//!
//! Summing weights across misses lets the caller rank partial matches.

use crate::args::Args;
use crate::diagnostics::{DiagnosticSink, Failure};
use crate::error::MatchError;
use crate::matcher::Matcher;
use crate::mock::MockId;
use crate::request::RequestInfo;
use crate::value::{Value, ValueKind};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Weight of an expectation that does not declare one.
pub const DEFAULT_WEIGHT: u32 = 1;

type ExtractFn = dyn for<'r> Fn(&'r RequestInfo) -> Value<'r> + Send + Sync;

/// Picks a typed value out of a request. Never mutates the request.
#[derive(Clone)]
pub enum Extractor {
    /// Method name, e.g. `GET`.
    Method,
    /// URI path.
    Path,
    /// Full request URI.
    Url,
    /// Decoded query parameters.
    Query,
    /// First value of a query parameter, empty when absent.
    QueryParam(String),
    /// First value of a header (case-insensitive), empty when absent.
    Header(String),
    /// All headers, lowercase names.
    Headers,
    /// Body as text, lossily decoded.
    BodyText,
    /// Body parsed as JSON, `null` when it does not parse.
    BodyJson,
    /// The request itself.
    Request,
    /// Same value for every request.
    Constant(Value<'static>),
    /// Caller-provided extraction.
    Custom(Arc<ExtractFn>),
}

impl Extractor {
    /// Wrap a closure as an extractor.
    pub fn custom<F>(f: F) -> Self
    where
        F: for<'r> Fn(&'r RequestInfo) -> Value<'r> + Send + Sync + 'static,
    {
        Extractor::Custom(Arc::new(f))
    }

    /// Kind of value this extractor produces. `None` for custom closures.
    pub fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Extractor::Method
            | Extractor::Path
            | Extractor::QueryParam(_)
            | Extractor::Header(_)
            | Extractor::BodyText => ValueKind::String,
            Extractor::Url => ValueKind::Url,
            Extractor::Query => ValueKind::Query,
            Extractor::Headers => ValueKind::MultiMap,
            Extractor::BodyJson => ValueKind::Any,
            Extractor::Request => ValueKind::Request,
            Extractor::Constant(v) => v.kind(),
            Extractor::Custom(_) => return None,
        };
        Some(kind)
    }

    pub fn extract<'r>(&self, request: &'r RequestInfo) -> Value<'r> {
        match self {
            Extractor::Method => Value::String(request.method().as_str().to_string()),
            Extractor::Path => Value::String(request.path().to_string()),
            Extractor::Url => Value::Url(request.uri().clone()),
            Extractor::Query => Value::Query(request.query()),
            Extractor::QueryParam(name) => {
                Value::String(request.query().get(name).unwrap_or_default().to_string())
            }
            Extractor::Header(name) => {
                Value::String(request.header(name).unwrap_or_default().into_owned())
            }
            Extractor::Headers => Value::MultiMap(request.header_map()),
            Extractor::BodyText => {
                Value::String(String::from_utf8_lossy(request.body()).into_owned())
            }
            Extractor::BodyJson => {
                Value::Any(serde_json::from_slice(request.body()).unwrap_or(JsonValue::Null))
            }
            Extractor::Request => Value::Request(request),
            Extractor::Constant(v) => v.clone(),
            Extractor::Custom(f) => f(request),
        }
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::Method => f.write_str("Method"),
            Extractor::Path => f.write_str("Path"),
            Extractor::Url => f.write_str("Url"),
            Extractor::Query => f.write_str("Query"),
            Extractor::QueryParam(name) => f.debug_tuple("QueryParam").field(name).finish(),
            Extractor::Header(name) => f.debug_tuple("Header").field(name).finish(),
            Extractor::Headers => f.write_str("Headers"),
            Extractor::BodyText => f.write_str("BodyText"),
            Extractor::BodyJson => f.write_str("BodyJson"),
            Extractor::Request => f.write_str("Request"),
            Extractor::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Extractor::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// One typed predicate contributing to whether and how strongly a mock applies.
#[derive(Clone)]
pub struct Expectation {
    kind: ValueKind,
    extractor: Extractor,
    matcher: Arc<dyn Matcher>,
    weight: u32,
    label: Option<String>,
}

impl Expectation {
    /// Expectation whose kind is the one the extractor produces. Custom
    /// extractors declare `Any`; use [`Expectation::of`] to be precise.
    pub fn new(extractor: Extractor, matcher: impl Matcher + 'static) -> Self {
        Self::shared(extractor, Arc::new(matcher))
    }

    /// Expectation with an explicitly declared kind.
    pub fn of(kind: ValueKind, extractor: Extractor, matcher: impl Matcher + 'static) -> Self {
        Self::shared(extractor, Arc::new(matcher)).with_kind(kind)
    }

    /// Expectation over a matcher shared with other expectations, e.g. one
    /// [`Repeat`](crate::matcher::Repeat) capping several mocks together.
    pub fn shared(extractor: Extractor, matcher: Arc<dyn Matcher>) -> Self {
        Self {
            kind: extractor.kind().unwrap_or(ValueKind::Any),
            extractor,
            matcher,
            weight: DEFAULT_WEIGHT,
            label: None,
        }
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn matcher(&self) -> &Arc<dyn Matcher> {
        &self.matcher
    }

    /// Check that the matcher can operate on the declared kind.
    fn resolve(&self, index: usize) -> Result<(), MatchError> {
        match self.matcher.kind() {
            Some(expected) if expected != self.kind && self.kind != ValueKind::Any => {
                Err(MatchError::KindMismatch {
                    index,
                    label: self.label.clone(),
                    expected,
                    found: self.kind,
                })
            }
            _ => Ok(()),
        }
    }

    /// Evaluate this expectation alone. `index` is its position in the list
    /// and only feeds error reports.
    pub fn evaluate(
        &self,
        index: usize,
        request: &RequestInfo,
        args: &mut Args,
    ) -> Result<bool, MatchError> {
        self.resolve(index)?;

        let value = self.extractor.extract(request);
        if self.kind != ValueKind::Any && value.kind() != self.kind {
            return Err(MatchError::KindMismatch {
                index,
                label: self.label.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }

        self.matcher
            .matches(&value, args)
            .map_err(|source| MatchError::MatcherFailure {
                index,
                label: self.label.clone(),
                source,
            })
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("kind", &self.kind)
            .field("extractor", &self.extractor)
            .field("matcher", &self.matcher.describe())
            .field("weight", &self.weight)
            .field("label", &self.label)
            .finish()
    }
}

/// Outcome of an error-free evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Every expectation matched.
    pub is_match: bool,
    /// Sum of the weights of every evaluated expectation, matched or not.
    /// Saturates at `u32::MAX`.
    pub weight: u32,
}

impl MatchResult {
    /// Result of evaluating no expectations.
    pub const EMPTY: MatchResult = MatchResult {
        is_match: true,
        weight: 0,
    };

    /// Combine two consecutive passes over one request.
    pub fn and(self, other: MatchResult) -> MatchResult {
        MatchResult {
            is_match: self.is_match && other.is_match,
            weight: self.weight.saturating_add(other.weight),
        }
    }
}

impl Default for MatchResult {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Evaluate `expectations` in order against one request.
///
/// The first kind mismatch or matcher error stops the pass; it is reported to
/// `sink` and returned. Later expectations are not touched.
pub fn evaluate(
    expectations: &[Expectation],
    request: &RequestInfo,
    args: &mut Args,
    sink: &dyn DiagnosticSink,
    mock: Option<&MockId>,
) -> Result<MatchResult, MatchError> {
    let mut result = MatchResult::EMPTY;

    for (index, expectation) in expectations.iter().enumerate() {
        match expectation.evaluate(index, request, args) {
            Ok(matched) => {
                trace!(
                    index,
                    label = expectation.label().unwrap_or(""),
                    matched,
                    "Expectation evaluated"
                );
                result.weight = result.weight.saturating_add(expectation.weight);
                result.is_match &= matched;
            }
            Err(error) => {
                debug!(index, error = %error, "Evaluation aborted");
                sink.report(&Failure::Match {
                    mock,
                    error: &error,
                });
                return Err(error);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, FailureKind, NullSink};
    use crate::error::BoxError;
    use crate::matcher::{equal, equal_any, func, has_entry, has_key, has_prefix, is_present, json_path};
    use crate::request::QueryParams;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> RequestInfo {
        RequestInfo::parse("POST", "http://localhost:8080/api/users?page=2&tag=a&tag=b")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .unwrap()
            .with_body(r#"{"name": "John"}"#)
    }

    fn constant(value: impl Into<Value<'static>>, matcher: impl Matcher + 'static) -> Expectation {
        Expectation::new(Extractor::Constant(value.into()), matcher)
    }

    fn run(expectations: &[Expectation]) -> Result<MatchResult, MatchError> {
        evaluate(expectations, &request(), &mut Args::new(), &NullSink, None)
    }

    /// Matcher returning a fixed outcome and counting its calls.
    struct Stub {
        outcome: Result<bool, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Matcher for Stub {
        fn matches(&self, _value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.map_err(Into::into)
        }
    }

    fn stub(outcome: Result<bool, &'static str>, weight: u32) -> (Expectation, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let exp = Expectation::new(
            Extractor::Constant(Value::Boolean(true)),
            Stub {
                outcome,
                calls: calls.clone(),
            },
        )
        .with_weight(weight);
        (exp, calls)
    }

    #[test]
    fn test_every_supported_kind_matches() {
        let uri: http::Uri = "http://localhost:8080".parse().unwrap();
        let mut multi = BTreeMap::new();
        multi.insert("key".to_string(), vec!["value1".to_string(), "value2".to_string()]);
        let map = json!({"key": "value"}).as_object().cloned().unwrap();
        let query = QueryParams::new();

        let expectations = vec![
            Expectation::of(ValueKind::Any, Extractor::Constant(Value::Any(json!("test"))), equal_any("test")),
            constant("test", equal("test")),
            constant(10.0, equal(10.0)),
            constant(true, equal(true)),
            constant(Value::Set(vec![json!("test")]), equal(Value::Set(vec![json!("test")]))),
            constant(Value::Map(map.clone()), equal(Value::Map(map))),
            constant(Value::MultiMap(multi.clone()), equal(Value::MultiMap(multi))),
            constant(Value::Url(uri.clone()), equal(Value::Url(uri))),
            constant(Value::Query(query.clone()), equal(Value::Query(query))),
            Expectation::new(
                Extractor::Request,
                func(|value, _| Ok(matches!(value, Value::Request(r) if r.path() == "/api/users"))),
            )
            .with_kind(ValueKind::Request),
        ];

        for (i, exp) in expectations.iter().enumerate() {
            let result = run(std::slice::from_ref(exp)).unwrap();
            assert!(result.is_match, "expectation {} should match", i);
        }

        let all = run(&expectations).unwrap();
        assert!(all.is_match);
        assert_eq!(all.weight, 10);
    }

    #[test]
    fn test_request_extractors() {
        let req = request();
        let mut args = Args::new();
        let check = |exp: Expectation, args: &mut Args| exp.evaluate(0, &req, args).unwrap();

        assert!(check(Expectation::new(Extractor::Method, equal("POST")), &mut args));
        assert!(check(Expectation::new(Extractor::Path, has_prefix("/api")), &mut args));
        assert!(check(Expectation::new(Extractor::QueryParam("page".into()), equal("2")), &mut args));
        assert!(check(Expectation::new(Extractor::Query, has_entry("tag", equal("b"))), &mut args));
        assert!(check(
            Expectation::new(Extractor::Header("content-type".into()), equal("application/json")),
            &mut args
        ));
        assert!(!check(Expectation::new(Extractor::Header("x-missing".into()), is_present()), &mut args));
        assert!(check(Expectation::new(Extractor::BodyText, json_path("$.name", "John").unwrap()), &mut args));
        assert!(check(Expectation::new(Extractor::BodyJson, json_path("$.name", "John").unwrap()), &mut args));
        assert!(check(
            Expectation::new(Extractor::Headers, has_entry("content-type", equal("application/json"))),
            &mut args
        ));
        assert!(check(
            Expectation::new(Extractor::Headers, has_entry("Content-Type", equal("application/json"))),
            &mut args
        ));
        assert!(check(Expectation::new(Extractor::Headers, has_key("CONTENT-TYPE")), &mut args));
    }

    #[test]
    fn test_weights_sum_when_all_match() {
        let (a, _) = stub(Ok(true), 2);
        let (b, _) = stub(Ok(true), 1);
        let (c, _) = stub(Ok(true), 2);

        let result = run(&[a, b, c]).unwrap();
        assert_eq!(result, MatchResult { is_match: true, weight: 5 });
    }

    #[test]
    fn test_weights_sum_when_one_does_not_match() {
        let (a, _) = stub(Ok(true), 2);
        let (b, _) = stub(Ok(false), 1);
        let (c, calls) = stub(Ok(true), 2);

        let result = run(&[a, b, c]).unwrap();
        assert_eq!(result, MatchResult { is_match: false, weight: 5 });
        // Evaluation continues past a miss.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_weight_sum_saturates() {
        let (a, _) = stub(Ok(true), u32::MAX);
        let (b, _) = stub(Ok(true), 1);
        assert_eq!(run(&[a, b]).unwrap(), MatchResult { is_match: true, weight: u32::MAX });

        let high = MatchResult { is_match: true, weight: u32::MAX - 1 };
        let low = MatchResult { is_match: false, weight: 5 };
        assert_eq!(high.and(low), MatchResult { is_match: false, weight: u32::MAX });
    }

    #[test]
    fn test_default_weight_is_one() {
        let exps = vec![constant("a", equal("a")), constant("b", equal("b")), constant("c", equal("x"))];
        assert_eq!(run(&exps).unwrap(), MatchResult { is_match: false, weight: 3 });
    }

    #[test]
    fn test_empty_list_matches_with_zero_weight() {
        assert_eq!(run(&[]).unwrap(), MatchResult { is_match: true, weight: 0 });
    }

    #[test]
    fn test_matcher_error_stops_evaluation() {
        let (a, first) = stub(Ok(true), 1);
        let (b, _) = stub(Err("fail"), 1);
        let (c, last) = stub(Ok(true), 1);

        let sink = CollectingSink::new();
        let id = MockId::from("users");
        let err = evaluate(&[a, b, c], &request(), &mut Args::new(), &sink, Some(&id)).unwrap_err();

        assert!(matches!(err, MatchError::MatcherFailure { index: 1, .. }));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 0);

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::MatcherFailure);
        assert_eq!(failures[0].mock, Some(id));
    }

    #[test]
    fn test_kind_mismatch_skips_extractor() {
        let extracted = Arc::new(AtomicUsize::new(0));
        let counter = extracted.clone();
        let exp = Expectation::of(
            ValueKind::Number,
            Extractor::custom(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Value::Number(1.0)
            }),
            equal("test"),
        )
        .with_label("amount");
        let (after, after_calls) = stub(Ok(true), 1);

        let sink = CollectingSink::new();
        let err = evaluate(&[exp, after], &request(), &mut Args::new(), &sink, None).unwrap_err();

        match err {
            MatchError::KindMismatch { index, label, expected, found } => {
                assert_eq!(index, 0);
                assert_eq!(label.as_deref(), Some("amount"));
                assert_eq!(expected, ValueKind::String);
                assert_eq!(found, ValueKind::Number);
            }
            other => panic!("expected kind mismatch, got {:?}", other),
        }
        assert_eq!(extracted.load(Ordering::SeqCst), 0);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.failures()[0].kind, FailureKind::KindMismatch);
    }

    #[test]
    fn test_extractor_producing_wrong_kind_is_a_mismatch() {
        let exp = Expectation::of(
            ValueKind::String,
            Extractor::custom(|_| Value::Boolean(true)),
            func(|_, _| Ok(true)),
        );
        let err = run(&[exp]).unwrap_err();
        assert!(matches!(
            err,
            MatchError::KindMismatch { expected: ValueKind::String, found: ValueKind::Boolean, .. }
        ));
    }

    #[test]
    fn test_any_declared_kind_accepts_typed_matchers() {
        let exp = Expectation::of(ValueKind::Any, Extractor::Constant(Value::Any(json!("test"))), equal("test"));
        assert!(run(&[exp]).unwrap().is_match);
    }

    #[test]
    fn test_matchers_share_args_in_order() {
        let writer = Expectation::new(
            Extractor::Path,
            crate::matcher::regex(r"^/api/(?P<resource>\w+)$").unwrap(),
        );
        let reader = Expectation::new(
            Extractor::Method,
            func(|_, args| Ok(args.get_str("capture.resource") == Some("users"))),
        );

        let mut args = Args::new();
        let result = evaluate(&[writer, reader], &request(), &mut args, &NullSink, None).unwrap();
        assert!(result.is_match);
        assert_eq!(args.get_str("capture.resource"), Some("users"));
    }

    #[test]
    fn test_extractor_kinds() {
        assert_eq!(Extractor::Path.kind(), Some(ValueKind::String));
        assert_eq!(Extractor::Headers.kind(), Some(ValueKind::MultiMap));
        assert_eq!(Extractor::custom(|r| Value::Request(r)).kind(), None);
        assert_eq!(
            Expectation::new(Extractor::custom(|r| Value::Request(r)), is_present()).kind(),
            ValueKind::Any
        );
    }
}
