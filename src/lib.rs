//! Mock Match Engine
//!
//! The matching core of an HTTP test-double server. Given a request and the
//! expectations attached to a mock, it decides whether the mock applies,
//! scores how specific the match is, and tracks how often the mock fired.
//!
//! # Features
//!
//! - **Typed Expectations**: Extract strings, numbers, booleans, maps, URLs,
//!   query parameters, or the raw request, and match them with a closed set of
//!   value kinds
//! - **Weighted Scoring**: Weights add up across matched and unmatched
//!   expectations so callers can rank partial matches
//! - **Shared Context**: Matchers pass values to each other through [`Args`]
//! - **Hit Accounting**: Lock-free hit counters and enablement on [`Mock`]
//! - **Stateful Matchers**: Race-free call limits with [`matcher::Repeat`]
//! - **Post Actions**: Hooks after a reply whose failures never affect it
//!
//! # Example
//!
//! ```
//! use mock_match_engine::matcher::{equal, has_prefix};
//! use mock_match_engine::{Args, Expectation, Extractor, Mock, NullSink, RequestInfo};
//!
//! let mock = Mock::new()
//!     .with_id("users")
//!     .expect(Expectation::new(Extractor::Method, equal("GET")).with_weight(3))
//!     .expect(Expectation::new(Extractor::Path, has_prefix("/users")).with_weight(10));
//!
//! let request = RequestInfo::parse("GET", "/users/42").unwrap();
//! let result = mock.matches(&request, &mut Args::new(), &NullSink).unwrap();
//! assert!(result.is_match);
//! assert_eq!(result.weight, 13);
//!
//! mock.hit();
//! assert!(mock.called());
//! ```

pub mod args;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod expectation;
pub mod matcher;
pub mod mock;
pub mod request;
pub mod value;

pub use args::Args;
pub use config::EngineConfig;
pub use diagnostics::{CollectingSink, DiagnosticSink, Failure, NullSink, TracingSink};
pub use error::{BoxError, MatchError, PostActionError};
pub use expectation::{evaluate, Expectation, Extractor, MatchResult, DEFAULT_WEIGHT};
pub use matcher::Matcher;
pub use mock::{Mock, MockId, PostAction, PostActionContext};
pub use request::{QueryParams, RequestInfo, ResponseInfo};
pub use value::{Value, ValueKind};
