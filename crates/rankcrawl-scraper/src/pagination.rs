//! Offset-based pagination planned from a probe page.
//!
//! Listing pages carry a short description of the visible result window:
//!
//! ```text
//! 1-50 of 250 titles.
//! ```
//!
//! The probe page (fetched without a `start` parameter) is parsed once for the
//! first-result index, the page size, and the total result count. From those
//! three numbers the full offset sequence is computed up front, so no page
//! fetch depends on the state of a previous one.
//!
//! An empty result set may omit the range and only state `"0 titles."`. Any
//! other count-only text is rejected, since the page size cannot be known.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScraperError;
use crate::markup::Document;

/// Class of the element holding the result-count description.
pub const COUNT_DESCRIPTION_CLASS: &str = "desc";

/// `S-E of T` at the start of the text, with optional thousands separators and
/// an en dash allowed.
static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d[\d,]*)\s*[-\u{2013}]\s*(\d[\d,]*)\s+of\s+(\d[\d,]*)")
        .expect("valid range regex")
});

/// `T title(s)` with no range.
static COUNT_ONLY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d[\d,]*)\s+(?:titles?|results?)\b").expect("valid count regex")
});

/// The result window declared by a probe page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// 1-based index of the first result.
    pub start_index: u32,
    /// Results per page; always non-zero.
    pub page_size: u32,
    pub total_count: u32,
}

impl PaginationState {
    /// # Errors
    ///
    /// Returns [`ScraperError::MalformedPage`] if `page_size` is zero or
    /// `start_index` is zero.
    pub fn new(start_index: u32, page_size: u32, total_count: u32) -> Result<Self, ScraperError> {
        if page_size == 0 {
            return Err(ScraperError::malformed("page size must be positive"));
        }
        if start_index == 0 {
            return Err(ScraperError::malformed("start index is 1-based"));
        }
        Ok(Self {
            start_index,
            page_size,
            total_count,
        })
    }

    /// Number of fetches needed: `ceil(total_count / page_size)`.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.total_count.div_ceil(self.page_size)
    }

    /// The fetch offsets: `start_index`, `start_index + page_size`, …, one per
    /// page. Calling this again restarts the sequence.
    #[must_use]
    pub fn offsets(&self) -> Offsets {
        Offsets {
            next: self.start_index,
            step: self.page_size,
            remaining: self.page_count(),
        }
    }
}

/// Lazy, finite iterator over the fetch offsets of a [`PaginationState`].
#[derive(Debug, Clone)]
pub struct Offsets {
    next: u32,
    step: u32,
    remaining: u32,
}

impl Iterator for Offsets {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        self.next = self.next.saturating_add(self.step);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Offsets {}

/// Reads the pagination state off a probe page.
///
/// Looks up the first element with class [`COUNT_DESCRIPTION_CLASS`] and
/// parses the text of its first `span` (or of the element itself when it has
/// no `span`).
///
/// # Errors
///
/// Returns [`ScraperError::MalformedPage`] if the description element is
/// missing or its text does not match an expected shape.
pub fn plan(probe: &Document) -> Result<PaginationState, ScraperError> {
    let desc = probe
        .root()
        .find_first_by_class(COUNT_DESCRIPTION_CLASS)
        .ok_or_else(|| {
            ScraperError::malformed(format!(
                "result-count element '.{COUNT_DESCRIPTION_CLASS}' not found"
            ))
        })?;
    let text = desc
        .find_first_by_tag("span")
        .map_or_else(|| desc.text(), |span| span.text());
    parse_count_text(&text)
}

/// Parses a result-count description into a [`PaginationState`].
///
/// `"S-E of T"` yields `start_index = S`, `page_size = E - S + 1`,
/// `total_count = T`. `"0 titles"` yields an empty plan.
///
/// # Errors
///
/// Returns [`ScraperError::MalformedPage`] when neither shape matches, a
/// number does not fit, the range is inverted, or a non-zero count comes
/// without a range.
pub fn parse_count_text(text: &str) -> Result<PaginationState, ScraperError> {
    if let Some(caps) = RANGE_PATTERN.captures(text) {
        let start = parse_number(&caps[1])?;
        let end = parse_number(&caps[2])?;
        let total = parse_number(&caps[3])?;
        if end < start {
            return Err(ScraperError::malformed(format!(
                "result range {start}-{end} is inverted in {text:?}"
            )));
        }
        return PaginationState::new(start, end - start + 1, total);
    }

    if let Some(caps) = COUNT_ONLY_PATTERN.captures(text) {
        let total = parse_number(&caps[1])?;
        if total > 0 {
            return Err(ScraperError::malformed(format!(
                "result-count text {text:?} states {total} results but no page range"
            )));
        }
        return PaginationState::new(1, 1, 0);
    }

    Err(ScraperError::malformed(format!(
        "result-count text {text:?} does not match 'S-E of T' or '0 titles'"
    )))
}

fn parse_number(raw: &str) -> Result<u32, ScraperError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse::<u32>()
        .map_err(|e| ScraperError::malformed(format!("cannot parse count {raw:?}: {e}")))
}
