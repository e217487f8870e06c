//! The listing record shared by the extractor, staging area, and loader.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column names of a [`Record`], in serialization order.
///
/// Fragment and dataset CSV headers, and the generated table's columns, are
/// all derived from this list.
pub const RECORD_FIELDS: [&str; 8] = [
    "source_id",
    "title",
    "rank",
    "rank_label",
    "year",
    "duration_minutes",
    "genres",
    "collected_at",
];

/// One listing entry extracted from a results page.
///
/// `year`, `duration_minutes` and `genres` hold sanitized raw text rather than
/// parsed values: the source formats them inconsistently (a year may be a
/// range, a runtime carries its unit), so typing is left to downstream
/// transformations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable external identifier, taken from the detail-page path.
    pub source_id: String,
    pub title: String,
    /// 1-based position within the named ranking, when the page carries one.
    pub rank: Option<u32>,
    /// Which ranking `rank` belongs to (e.g. `top_250`).
    pub rank_label: Option<String>,
    pub year: String,
    pub duration_minutes: String,
    /// Comma-delimited genre list.
    pub genres: String,
    /// Extraction time; identical for every record of one page.
    pub collected_at: DateTime<Utc>,
}
