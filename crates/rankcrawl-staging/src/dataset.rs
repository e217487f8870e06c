//! Canonical datasets: one timestamp-named directory per merge, each holding
//! a single [`DATASET_FILE_NAME`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rankcrawl_core::Record;

use crate::error::StagingError;
use crate::naming::{
    create_partial, read_records, sync_dir, timestamp, write_records_atomically,
    MAX_NAME_ATTEMPTS,
};

/// File name of the merged CSV inside each dataset directory.
pub const DATASET_FILE_NAME: &str = "data.csv";

/// A fully written merge result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDataset {
    /// Path of the dataset's CSV file.
    pub path: PathBuf,
    pub record_count: usize,
    /// Number of fragments folded into this dataset.
    pub fragments_merged: usize,
}

impl CanonicalDataset {
    /// Name of the enclosing dataset directory.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns [`StagingError`] if the file cannot be read or parsed.
    pub fn read_records(&self) -> Result<Vec<Record>, StagingError> {
        read_records(&self.path)
    }
}

/// Writes `records` as a new dataset under `output_dir`, named after `now`.
///
/// Names collide only when two merges land in the same clock tick; the later
/// one gets a `-001`, `-002`, ... suffix, which still sorts after the bare
/// name. The CSV is written to a partial file, synced, then renamed; both the
/// dataset directory and `output_dir` are synced before this returns.
pub(crate) fn write_dataset(
    output_dir: &Path,
    records: &[Record],
    now: DateTime<Utc>,
) -> Result<PathBuf, StagingError> {
    std::fs::create_dir_all(output_dir).map_err(|e| StagingError::io(output_dir, e))?;

    let stem = timestamp(now);
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            stem.clone()
        } else {
            format!("{stem}-{attempt:03}")
        };
        let dir = output_dir.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StagingError::io(&dir, e)),
        }

        let path = dir.join(DATASET_FILE_NAME);
        let Some((partial, file)) = create_partial(&path)? else {
            continue;
        };
        if let Err(e) = write_records_atomically(&partial, file, &path, records) {
            if let Err(cleanup) = std::fs::remove_dir(&dir) {
                tracing::warn!(dir = %dir.display(), error = %cleanup, "could not remove empty dataset directory");
            }
            return Err(e);
        }
        sync_dir(output_dir)?;
        return Ok(path);
    }

    Err(StagingError::NoFreeName {
        dir: output_dir.to_path_buf(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

/// Path of the newest dataset's CSV under `output_dir`.
///
/// "Newest" is the lexicographically greatest directory name that contains a
/// [`DATASET_FILE_NAME`]; timestamp naming makes that the most recent merge.
/// Returns `Ok(None)` when there is no dataset (or no output directory).
///
/// # Errors
///
/// Returns [`StagingError::Io`] if the directory exists but cannot be read.
pub fn latest_dataset(output_dir: &Path) -> Result<Option<PathBuf>, StagingError> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StagingError::io(output_dir, e)),
    };

    let mut latest: Option<String> = None;
    for entry in entries {
        let entry = entry.map_err(|e| StagingError::io(output_dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !entry.path().join(DATASET_FILE_NAME).is_file() {
            continue;
        }
        if latest.as_deref().is_none_or(|current| name.as_str() > current) {
            latest = Some(name);
        }
    }

    Ok(latest.map(|name| output_dir.join(name).join(DATASET_FILE_NAME)))
}
