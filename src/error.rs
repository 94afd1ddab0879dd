//! Error types for expectation evaluation and post-match hooks.

use crate::value::ValueKind;
use thiserror::Error;

/// Boxed error returned by matcher predicates and post-actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single evaluation pass.
///
/// Either variant aborts the pass: expectations after the failing one are
/// never evaluated.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The matcher cannot operate on the expectation's value kind, or the
    /// extractor produced a value of a different kind than declared.
    #[error("expectation {index}{}: expected value of kind {expected}, found {found}", label_suffix(.label))]
    KindMismatch {
        index: usize,
        label: Option<String>,
        expected: ValueKind,
        found: ValueKind,
    },

    /// The matcher could not interpret its input.
    #[error("expectation {index}{}: matcher failed: {source}", label_suffix(.label))]
    MatcherFailure {
        index: usize,
        label: Option<String>,
        #[source]
        source: BoxError,
    },
}

impl MatchError {
    /// Position of the failing expectation in its list.
    pub fn index(&self) -> usize {
        match self {
            MatchError::KindMismatch { index, .. } | MatchError::MatcherFailure { index, .. } => {
                *index
            }
        }
    }

    /// Diagnostic label of the failing expectation, if it has one.
    pub fn label(&self) -> Option<&str> {
        match self {
            MatchError::KindMismatch { label, .. } | MatchError::MatcherFailure { label, .. } => {
                label.as_deref()
            }
        }
    }

    pub fn is_kind_mismatch(&self) -> bool {
        matches!(self, MatchError::KindMismatch { .. })
    }
}

/// A post-match hook failed. Never affects the response already produced.
#[derive(Debug, Error)]
#[error("post action {index} ({action}) failed: {source}")]
pub struct PostActionError {
    pub index: usize,
    pub action: String,
    #[source]
    pub source: BoxError,
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(l) => format!(" ({})", l),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_label() {
        let err = MatchError::KindMismatch {
            index: 2,
            label: Some("method".to_string()),
            expected: ValueKind::String,
            found: ValueKind::Number,
        };
        assert_eq!(
            err.to_string(),
            "expectation 2 (method): expected value of kind string, found number"
        );
        assert_eq!(err.index(), 2);
        assert_eq!(err.label(), Some("method"));
        assert!(err.is_kind_mismatch());
    }

    #[test]
    fn test_matcher_failure_keeps_source() {
        let err = MatchError::MatcherFailure {
            index: 0,
            label: None,
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "expectation 0: matcher failed: boom");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_kind_mismatch());
    }
}
