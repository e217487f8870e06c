//! Folding staged fragments into a canonical dataset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rankcrawl_core::{DedupPolicy, Record};

use crate::dataset::{write_dataset, CanonicalDataset};
use crate::error::StagingError;
use crate::writer::{list_fragments, FragmentHandle};

/// Sweeps a staging directory into timestamp-named datasets.
#[derive(Debug, Clone)]
pub struct Merger {
    staging_dir: PathBuf,
    output_dir: PathBuf,
    dedup: DedupPolicy,
}

impl Merger {
    #[must_use]
    pub fn new(
        staging_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        dedup: DedupPolicy,
    ) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            output_dir: output_dir.into(),
            dedup,
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Merges every fragment present in the staging directory right now.
    ///
    /// Fragments staged after the sweep are left alone for the next merge.
    /// With nothing staged the result is an empty (header-only) dataset.
    ///
    /// # Errors
    ///
    /// See [`Merger::merge_fragments`].
    pub fn merge(&self) -> Result<CanonicalDataset, StagingError> {
        let fragments = list_fragments(&self.staging_dir)?;
        self.merge_fragments(&fragments)
    }

    /// Concatenates `fragments` in order into a new dataset, then deletes them.
    ///
    /// If any fragment cannot be read, or the dataset cannot be written and
    /// synced, nothing is deleted and the fragments remain for a later merge.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError`] on read, write, or delete failure. A delete
    /// failure is reported after every deletion has been attempted; the
    /// dataset is complete at that point.
    pub fn merge_fragments(
        &self,
        fragments: &[FragmentHandle],
    ) -> Result<CanonicalDataset, StagingError> {
        let mut records = Vec::new();
        for fragment in fragments {
            records.extend(fragment.read_records()?);
        }

        let records = match self.dedup {
            DedupPolicy::None => records,
            DedupPolicy::SourceId => {
                let before = records.len();
                let kept = dedup_by_source_id(records);
                if kept.len() < before {
                    tracing::info!(
                        dropped = before - kept.len(),
                        "dropped duplicate source ids during merge"
                    );
                }
                kept
            }
        };

        let path = write_dataset(&self.output_dir, &records, Utc::now())?;
        let dataset = CanonicalDataset {
            path,
            record_count: records.len(),
            fragments_merged: fragments.len(),
        };
        tracing::info!(
            dataset = %dataset.path.display(),
            records = dataset.record_count,
            fragments = dataset.fragments_merged,
            "merged staged fragments"
        );

        let mut first_failure = None;
        for fragment in fragments {
            if let Err(e) = std::fs::remove_file(fragment.path()) {
                tracing::error!(
                    fragment = %fragment.path().display(),
                    error = %e,
                    "merged fragment could not be deleted"
                );
                first_failure.get_or_insert(StagingError::io(fragment.path(), e));
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(dataset),
        }
    }
}

/// Keeps one record per `source_id`.
///
/// The survivor is the one with the lowest `rank`; a ranked record beats an
/// unranked one and ties keep the earliest. It takes the position of the
/// first occurrence of its `source_id`.
#[must_use]
pub fn dedup_by_source_id(records: Vec<Record>) -> Vec<Record> {
    let mut slot_of: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut kept: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        match slot_of.get(&record.source_id) {
            Some(&slot) => {
                if outranks(&record, &kept[slot]) {
                    kept[slot] = record;
                }
            }
            None => {
                slot_of.insert(record.source_id.clone(), kept.len());
                kept.push(record);
            }
        }
    }
    kept
}

fn outranks(candidate: &Record, incumbent: &Record) -> bool {
    match (candidate.rank, incumbent.rank) {
        (Some(c), Some(i)) => c < i,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod tests;
