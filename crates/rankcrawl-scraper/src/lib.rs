pub mod client;
pub mod error;
pub mod extract;
pub mod markup;
pub mod pagination;
pub mod sanitize;

mod retry;

pub use client::{listing_url, HttpFetcher, PageFetcher};
pub use error::{ExtractionSkip, ScraperError};
pub use extract::RecordExtractor;
pub use markup::{Document, Node};
pub use pagination::{plan, Offsets, PaginationState};
