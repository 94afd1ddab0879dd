//! String predicates.

use super::{expect_str, Matcher};
use crate::args::Args;
use crate::error::BoxError;
use crate::value::{Value, ValueKind};
use regex::Regex;

/// Prefix of the [`Args`] keys regex captures are written under.
pub const CAPTURE_PREFIX: &str = "capture.";

/// Case-insensitive string equality.
#[derive(Debug, Clone)]
pub struct EqualIgnoreCase {
    expected: String,
}

pub fn equal_ignore_case(expected: impl Into<String>) -> EqualIgnoreCase {
    EqualIgnoreCase {
        expected: expected.into().to_lowercase(),
    }
}

impl Matcher for EqualIgnoreCase {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        let s = expect_str("equal_ignore_case", value)?;
        Ok(s.to_lowercase() == self.expected)
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        format!("equal_ignore_case({})", self.expected)
    }
}

#[derive(Debug, Clone)]
pub struct Contains {
    needle: String,
}

pub fn contains(needle: impl Into<String>) -> Contains {
    Contains {
        needle: needle.into(),
    }
}

impl Matcher for Contains {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        Ok(expect_str("contains", value)?.contains(&self.needle))
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        format!("contains({})", self.needle)
    }
}

#[derive(Debug, Clone)]
pub struct HasPrefix {
    prefix: String,
}

pub fn has_prefix(prefix: impl Into<String>) -> HasPrefix {
    HasPrefix {
        prefix: prefix.into(),
    }
}

impl Matcher for HasPrefix {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        Ok(expect_str("has_prefix", value)?.starts_with(&self.prefix))
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        format!("has_prefix({})", self.prefix)
    }
}

#[derive(Debug, Clone)]
pub struct HasSuffix {
    suffix: String,
}

pub fn has_suffix(suffix: impl Into<String>) -> HasSuffix {
    HasSuffix {
        suffix: suffix.into(),
    }
}

impl Matcher for HasSuffix {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        Ok(expect_str("has_suffix", value)?.ends_with(&self.suffix))
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        format!("has_suffix({})", self.suffix)
    }
}

/// Regex match. On success, positional and named capture groups are written
/// into [`Args`] as `capture.<index>` / `capture.<name>`.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

pub fn regex(pattern: &str) -> Result<RegexMatcher, regex::Error> {
    Ok(RegexMatcher {
        regex: Regex::new(pattern)?,
    })
}

impl Matcher for RegexMatcher {
    fn matches(&self, value: &Value<'_>, args: &mut Args) -> Result<bool, BoxError> {
        let s = expect_str("regex", value)?;
        let Some(captures) = self.regex.captures(s) else {
            return Ok(false);
        };

        for (i, cap) in captures.iter().enumerate().skip(1) {
            if let Some(m) = cap {
                args.insert(format!("{}{}", CAPTURE_PREFIX, i), m.as_str());
            }
        }
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                args.insert(format!("{}{}", CAPTURE_PREFIX, name), m.as_str());
            }
        }

        Ok(true)
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        format!("regex({})", self.regex.as_str())
    }
}

/// Glob pattern match, e.g. `/static/**/*.js`.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    glob: globset::GlobMatcher,
}

pub fn glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    let glob = globset::Glob::new(pattern)?.compile_matcher();
    Ok(GlobMatcher {
        pattern: pattern.to_string(),
        glob,
    })
}

impl Matcher for GlobMatcher {
    fn matches(&self, value: &Value<'_>, _args: &mut Args) -> Result<bool, BoxError> {
        Ok(self.glob.is_match(expect_str("glob", value)?))
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::String)
    }

    fn describe(&self) -> String {
        format!("glob({})", self.pattern)
    }
}
