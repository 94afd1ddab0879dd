//! Mock definitions: expectations plus the mutable bookkeeping shared by
//! concurrent request handlers.

use crate::args::Args;
use crate::diagnostics::{DiagnosticSink, Failure};
use crate::error::{BoxError, MatchError, PostActionError};
use crate::expectation::{evaluate, Expectation, MatchResult};
use crate::request::{RequestInfo, ResponseInfo};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Opaque mock handle, assigned by whoever registers the mock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockId(String);

impl MockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MockId {
    fn from(id: &str) -> Self {
        MockId(id.to_string())
    }
}

impl From<String> for MockId {
    fn from(id: String) -> Self {
        MockId(id)
    }
}

impl From<usize> for MockId {
    fn from(index: usize) -> Self {
        MockId(index.to_string())
    }
}

/// What a post-action sees once the response has been produced.
#[derive(Clone, Copy)]
pub struct PostActionContext<'a> {
    pub mock: &'a Mock,
    pub request: &'a RequestInfo,
    pub response: &'a ResponseInfo,
    pub args: &'a Args,
}

/// Side-effect hook run after a mock was selected and has replied.
pub trait PostAction: Send + Sync {
    fn run(&self, ctx: &PostActionContext<'_>) -> Result<(), BoxError>;

    fn name(&self) -> String {
        "post_action".to_string()
    }
}

impl<F> PostAction for F
where
    F: Fn(&PostActionContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn run(&self, ctx: &PostActionContext<'_>) -> Result<(), BoxError> {
        self(ctx)
    }
}

/// A request-matching rule with its bookkeeping state.
///
/// `hits` and `enabled` are atomics, so a `Mock` shared through `Arc` can be
/// matched, hit, and toggled from any number of threads. Expectation lists
/// are fixed once the mock is built.
pub struct Mock {
    id: Option<MockId>,
    name: Option<String>,
    priority: i32,
    enabled: AtomicBool,
    hits: AtomicUsize,
    expectations: Vec<Expectation>,
    after_expectations: Vec<Expectation>,
    post_actions: Vec<Arc<dyn PostAction>>,
}

impl Default for Mock {
    fn default() -> Self {
        Self::new()
    }
}

impl Mock {
    /// An enabled mock with no expectations and no hits.
    pub fn new() -> Self {
        Self {
            id: None,
            name: None,
            priority: 0,
            enabled: AtomicBool::new(true),
            hits: AtomicUsize::new(0),
            expectations: Vec::new(),
            after_expectations: Vec::new(),
            post_actions: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<MockId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Priority for the selection layer. Not used by matching itself.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Append an expectation. Order is evaluation order.
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    /// Append an expectation evaluated only when every regular expectation
    /// matched, e.g. a [`Repeat`](crate::matcher::Repeat) limit.
    pub fn expect_after(mut self, expectation: Expectation) -> Self {
        self.after_expectations.push(expectation);
        self
    }

    pub fn post_action(mut self, action: impl PostAction + 'static) -> Self {
        self.post_actions.push(Arc::new(action));
        self
    }

    pub fn id(&self) -> Option<&MockId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn expectations(&self) -> &[Expectation] {
        &self.expectations
    }

    pub fn after_expectations(&self) -> &[Expectation] {
        &self.after_expectations
    }

    /// Evaluate this mock against a request.
    ///
    /// After-expectations run only when the regular pass fully matched; their
    /// weight is then added. The first error aborts everything.
    pub fn matches(
        &self,
        request: &RequestInfo,
        args: &mut Args,
        sink: &dyn DiagnosticSink,
    ) -> Result<MatchResult, MatchError> {
        let mut result = evaluate(&self.expectations, request, args, sink, self.id.as_ref())?;

        if result.is_match && !self.after_expectations.is_empty() {
            let after = evaluate(
                &self.after_expectations,
                request,
                args,
                sink,
                self.id.as_ref(),
            )?;
            result = result.and(after);
        }

        debug!(
            mock_id = %self.display_id(),
            is_match = result.is_match,
            weight = result.weight,
            "Mock evaluated"
        );
        sink.evaluated(self.id.as_ref(), &result);

        Ok(result)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Record one hit. Returns the new count.
    pub fn hit(&self) -> usize {
        self.hits.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Undo one hit. Returns the new count.
    ///
    /// Decrementing at zero is a caller error: it is logged and the count
    /// stays at zero.
    pub fn dec(&self) -> usize {
        match self
            .hits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| h.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                warn!(mock_id = %self.display_id(), "Hit count decremented below zero");
                0
            }
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Whether the mock has a positive hit count.
    pub fn called(&self) -> bool {
        self.hits() > 0
    }

    /// Reset the hit count, for test teardown.
    pub fn reset_hits(&self) {
        self.hits.store(0, Ordering::SeqCst);
    }

    /// Run every post-action in order.
    ///
    /// Failures are logged, reported to `sink`, and returned; they never stop
    /// the remaining actions.
    pub fn run_post_actions(
        &self,
        request: &RequestInfo,
        response: &ResponseInfo,
        args: &Args,
        sink: &dyn DiagnosticSink,
    ) -> Vec<PostActionError> {
        let ctx = PostActionContext {
            mock: self,
            request,
            response,
            args,
        };

        let mut errors = Vec::new();
        for (index, action) in self.post_actions.iter().enumerate() {
            if let Err(source) = action.run(&ctx) {
                let error = PostActionError {
                    index,
                    action: action.name(),
                    source,
                };
                warn!(mock_id = %self.display_id(), error = %error, "Post action failed");
                sink.report(&Failure::PostAction {
                    mock: self.id.as_ref(),
                    error: &error,
                });
                errors.push(error);
            }
        }
        errors
    }

    fn display_id(&self) -> String {
        match (&self.id, &self.name) {
            (Some(id), _) => id.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => "<unnamed>".to_string(),
        }
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.is_enabled())
            .field("hits", &self.hits())
            .field("expectations", &self.expectations)
            .field("after_expectations", &self.after_expectations)
            .field("post_actions", &self.post_actions.len())
            .finish()
    }
}
