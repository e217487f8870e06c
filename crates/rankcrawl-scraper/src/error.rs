use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid listing URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("malformed page: {reason}")]
    MalformedPage { reason: String },
}

impl ScraperError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPage {
            reason: reason.into(),
        }
    }
}

/// Why a single listing item was left out of an extraction batch.
///
/// Skips are logged and absorbed by the extractor; they never abort a page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionSkip {
    #[error("expected at least 2 detail links, found {found}")]
    MissingLinks { found: usize },

    #[error("detail link has no identifier segment: {href}")]
    EmptySourceId { href: String },

    #[error("title link for {source_id} has no text")]
    EmptyTitle { source_id: String },

    #[error("{source_id} already extracted from this page")]
    DuplicateSourceId { source_id: String },
}
