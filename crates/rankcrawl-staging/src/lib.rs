//! Durable staging of extracted records and their merge into canonical
//! datasets.
//!
//! Each fetched page becomes one immutable fragment file in the staging
//! directory. A merge sweeps every fragment present, writes their
//! concatenation as a new timestamp-named dataset, and only then deletes the
//! fragments it consumed.

pub mod dataset;
pub mod error;
pub mod merge;
pub mod writer;

mod naming;

pub use dataset::{latest_dataset, CanonicalDataset, DATASET_FILE_NAME};
pub use error::StagingError;
pub use merge::{dedup_by_source_id, Merger};
pub use writer::{list_fragments, FragmentHandle, StagingWriter};
