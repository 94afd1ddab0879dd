//! Diagnostic sinks for evaluation and post-action failures.
//!
//! Sinks only observe: nothing they do feeds back into matching.

use crate::config::{FailureLevel, GlobalSettings};
use crate::error::{MatchError, PostActionError};
use crate::expectation::MatchResult;
use crate::mock::MockId;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A failure observed by the engine.
#[derive(Debug, Clone, Copy)]
pub enum Failure<'a> {
    /// An evaluation pass aborted (kind mismatch or matcher error).
    Match {
        mock: Option<&'a MockId>,
        error: &'a MatchError,
    },
    /// A post-match hook failed.
    PostAction {
        mock: Option<&'a MockId>,
        error: &'a PostActionError,
    },
}

impl Failure<'_> {
    pub fn mock(&self) -> Option<&MockId> {
        match self {
            Failure::Match { mock, .. } | Failure::PostAction { mock, .. } => *mock,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Failure::Match { error, .. } => error.to_string(),
            Failure::PostAction { error, .. } => error.to_string(),
        }
    }
}

/// Receives failure reports.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, failure: &Failure<'_>);

    /// Called after an error-free evaluation pass. Ignored by default.
    fn evaluated(&self, _mock: Option<&MockId>, _result: &MatchResult) {}
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn report(&self, failure: &Failure<'_>) {
        (**self).report(failure)
    }

    fn evaluated(&self, mock: Option<&MockId>, result: &MatchResult) {
        (**self).evaluated(mock, result)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _failure: &Failure<'_>) {}
}

/// Logs reports through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    settings: GlobalSettings,
}

impl TracingSink {
    pub fn new(settings: GlobalSettings) -> Self {
        Self { settings }
    }

    /// Level `failure` is logged at, or `None` when its category is muted.
    pub fn failure_level(&self, failure: &Failure<'_>) -> Option<FailureLevel> {
        let enabled = match failure {
            Failure::Match { .. } => self.settings.log_failures,
            Failure::PostAction { .. } => self.settings.log_post_action_failures,
        };
        enabled.then_some(self.settings.failure_level)
    }

    /// Whether an evaluation with this result is logged.
    pub fn logs_evaluation(&self, result: &MatchResult) -> bool {
        self.settings.log_matches && result.is_match
    }
}

impl DiagnosticSink for TracingSink {
    fn report(&self, failure: &Failure<'_>) {
        let Some(level) = self.failure_level(failure) else {
            return;
        };

        let mock_id = failure.mock().map(|id| id.to_string()).unwrap_or_default();
        let message = failure.message();
        match level {
            FailureLevel::Debug => debug!(mock_id = %mock_id, "{}", message),
            FailureLevel::Warn => warn!(mock_id = %mock_id, "{}", message),
            FailureLevel::Error => error!(mock_id = %mock_id, "{}", message),
        }
    }

    fn evaluated(&self, mock: Option<&MockId>, result: &MatchResult) {
        if self.logs_evaluation(result) {
            info!(
                mock_id = %mock.map(|id| id.to_string()).unwrap_or_default(),
                weight = result.weight,
                "Request matched mock"
            );
        }
    }
}

/// Which kind of failure a [`CollectedFailure`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    KindMismatch,
    MatcherFailure,
    PostAction,
}

/// Owned copy of a reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFailure {
    pub kind: FailureKind,
    pub mock: Option<MockId>,
    pub message: String,
}

/// Keeps every report in memory. Meant for tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    failures: Mutex<Vec<CollectedFailure>>,
    evaluations: Mutex<Vec<MatchResult>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<CollectedFailure> {
        self.failures.lock().clone()
    }

    pub fn evaluations(&self) -> Vec<MatchResult> {
        self.evaluations.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, failure: &Failure<'_>) {
        let kind = match failure {
            Failure::Match { error, .. } if error.is_kind_mismatch() => FailureKind::KindMismatch,
            Failure::Match { .. } => FailureKind::MatcherFailure,
            Failure::PostAction { .. } => FailureKind::PostAction,
        };
        self.failures.lock().push(CollectedFailure {
            kind,
            mock: failure.mock().cloned(),
            message: failure.message(),
        });
    }

    fn evaluated(&self, _mock: Option<&MockId>, result: &MatchResult) {
        self.evaluations.lock().push(*result);
    }
}
