//! Record predicates and per-record hooks.
//!
//! A [`Filter`] is a cheap-to-clone predicate over [`Record`]s. Wherever a
//! filter is optional, `None` matches everything. Path predicates look at
//! the resolved path when one is present and at the bare file name
//! otherwise.
//!
//! ```ignore
//! let filter = Filter::is_dir().not().and(Filter::path_regex(Regex::new(r"\.log$")?));
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::attr::FileAttributes;
use crate::error::{Result, UsnError};
use crate::reason::Reason;
use crate::record::Record;

/// A shareable record predicate.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Record) -> bool + Send + Sync>);

impl Filter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Filter(Arc::new(predicate))
    }

    pub fn matches(&self, record: &Record) -> bool {
        (self.0)(record)
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter::new(move |r| self.matches(r) && other.matches(r))
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter::new(move |r| self.matches(r) || other.matches(r))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Filter {
        Filter::new(move |r| !self.matches(r))
    }

    /// Matches everything
    pub fn all() -> Filter {
        Filter::new(|_| true)
    }

    pub fn is_dir() -> Filter {
        Filter::new(|r| r.is_dir())
    }

    /// Records with every attribute in `mask` set
    pub fn attributes(mask: FileAttributes) -> Filter {
        Filter::new(move |r| r.attributes.contains(mask))
    }

    /// Records with none of the attributes in `mask` set
    pub fn without_attributes(mask: FileAttributes) -> Filter {
        Filter::new(move |r| !r.attributes.intersects(mask))
    }

    /// Records with at least one reason in `mask`
    pub fn reason_any(mask: Reason) -> Filter {
        Filter::new(move |r| r.reason.intersects(mask))
    }

    /// Records with every reason in `mask`
    pub fn reason_all(mask: Reason) -> Filter {
        Filter::new(move |r| r.reason.contains(mask))
    }

    /// Records with no reason in `mask`
    pub fn exclude_reason(mask: Reason) -> Filter {
        Filter::new(move |r| !r.reason.intersects(mask))
    }

    pub fn path_regex(re: Regex) -> Filter {
        Filter::new(move |r| re.is_match(r.path_or_name()))
    }

    /// Compile `pattern` and match it against paths.
    pub fn path_pattern(pattern: &str) -> Result<Filter> {
        let re = Regex::new(pattern).map_err(|e| UsnError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Filter::path_regex(re))
    }

    /// Case-insensitive substring match.
    pub fn path_contains(needle: &str) -> Filter {
        let needle = needle.to_lowercase();
        Filter::new(move |r| r.path_or_name().to_lowercase().contains(&needle))
    }

    /// Case-insensitive prefix match.
    pub fn path_prefix(prefix: &str) -> Filter {
        let prefix = prefix.to_lowercase();
        Filter::new(move |r| r.path_or_name().to_lowercase().starts_with(&prefix))
    }

    /// Shell-style wildcard match, ignoring case and treating `\` as a
    /// separator.
    pub fn path_glob(pattern: glob::Pattern) -> Filter {
        let options = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        Filter::new(move |r| {
            let path = r.path_or_name().replace('\\', "/");
            pattern.matches_with(&path, options)
        })
    }

    /// Records timestamped within `start..end`; open bounds are `None`.
    pub fn time_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Filter {
        Filter::new(move |r| {
            start.map_or(true, |s| r.timestamp >= s) && end.map_or(true, |e| r.timestamp < e)
        })
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// Evaluate an optional filter; `None` matches.
pub fn matches(filter: Option<&Filter>, record: &Record) -> bool {
    filter.map_or(true, |f| f.matches(record))
}

/// A per-record hook run before filtering.
#[derive(Clone)]
pub struct Processor(Arc<dyn Fn(&Record) + Send + Sync>);

impl Processor {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        Processor(Arc::new(hook))
    }

    pub fn process(&self, record: &Record) {
        (self.0)(record)
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Processor(..)")
    }
}
