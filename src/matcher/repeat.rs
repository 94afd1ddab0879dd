//! Call-limiting matcher.

use super::Matcher;
use crate::args::Args;
use crate::error::BoxError;
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Matches only while its invocation count is at or below `max`.
///
/// The counter is incremented on every invocation, whatever the outcome, with
/// a single atomic `fetch_add`: under concurrent calls exactly `max`
/// invocations see `true`. The count lives in the instance, so sharing one
/// `Repeat` (through `Arc`) between mocks caps their combined calls.
///
/// Place it among a mock's after-expectations to count only requests that
/// matched everything else.
#[derive(Debug)]
pub struct Repeat {
    max: usize,
    count: AtomicUsize,
}

pub fn repeat(max: usize) -> Repeat {
    Repeat::new(max)
}

impl Repeat {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            count: AtomicUsize::new(0),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of invocations so far.
    pub fn invocations(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Invocations left before the matcher starts returning `false`.
    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.invocations())
    }
}

impl Matcher for Repeat {
    fn matches(&self, _value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(n <= self.max)
    }

    fn describe(&self) -> String {
        format!("repeat({})", self.max)
    }
}
