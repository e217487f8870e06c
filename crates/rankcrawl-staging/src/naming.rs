//! Timestamp-based names and crash-safe CSV writes shared by fragments and
//! datasets.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rankcrawl_core::{Record, RECORD_FIELDS};

use crate::error::StagingError;

/// Extension of staged fragment files.
pub(crate) const FRAGMENT_EXTENSION: &str = "csv";

/// Appended to a file name while it is being written.
pub(crate) const PARTIAL_SUFFIX: &str = ".partial";

/// Attempts at finding an unused name before giving up.
pub(crate) const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Process-local sequence disambiguating names minted within one clock tick.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Fixed-width UTC timestamp with nanoseconds; sorts lexicographically in
/// chronological order.
pub(crate) fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%S%.9fZ").to_string()
}

/// `<timestamp>-<sequence>.csv`
pub(crate) fn fragment_file_name(now: DateTime<Utc>) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq:06}.{FRAGMENT_EXTENSION}", timestamp(now))
}

pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Creates `path` + [`PARTIAL_SUFFIX`] exclusively. Returns `Ok(None)` if it
/// (or `path` itself) already exists so the caller can pick another name.
pub(crate) fn create_partial(path: &Path) -> Result<Option<(PathBuf, File)>, StagingError> {
    if path.exists() {
        return Ok(None);
    }
    let partial = partial_path(path);
    match OpenOptions::new().write(true).create_new(true).open(&partial) {
        Ok(file) => Ok(Some((partial, file))),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(StagingError::io(partial, e)),
    }
}

/// Writes `records` as CSV into the already-created partial file, flushes and
/// syncs it, renames it to `path`, then syncs the parent directory so the new
/// name survives a crash.
///
/// The header row is always written, even for an empty batch. On any failure
/// the partial file is removed and `path` is never created.
pub(crate) fn write_records_atomically(
    partial: &Path,
    file: File,
    path: &Path,
    records: &[Record],
) -> Result<(), StagingError> {
    let result = write_and_sync(partial, file, records)
        .and_then(|()| std::fs::rename(partial, path).map_err(|e| StagingError::io(path, e)))
        .and_then(|()| path.parent().map_or(Ok(()), sync_dir));
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(partial) {
            tracing::warn!(path = %partial.display(), error = %e, "could not remove partial file");
        }
    }
    result
}

fn write_and_sync(partial: &Path, file: File, records: &[Record]) -> Result<(), StagingError> {
    let mut writer = csv::Writer::from_writer(file);
    if records.is_empty() {
        writer
            .write_record(RECORD_FIELDS)
            .map_err(|e| StagingError::csv(partial, e))?;
    }
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| StagingError::csv(partial, e))?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| StagingError::io(partial, e.into_error()))?;
    file.sync_all().map_err(|e| StagingError::io(partial, e))
}

/// Flushes a directory's entries to disk.
pub(crate) fn sync_dir(dir: &Path) -> Result<(), StagingError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StagingError::io(dir, e))
}

/// Reads every record from a fragment or dataset CSV file.
pub(crate) fn read_records(path: &Path) -> Result<Vec<Record>, StagingError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| StagingError::csv(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<Record>, _>>()
        .map_err(|e| StagingError::csv(path, e))
}
