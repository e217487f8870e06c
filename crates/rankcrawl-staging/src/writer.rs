//! Per-page fragment files in the staging directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rankcrawl_core::Record;

use crate::error::StagingError;
use crate::naming::{
    create_partial, fragment_file_name, read_records, write_records_atomically,
    FRAGMENT_EXTENSION, MAX_NAME_ATTEMPTS,
};

/// A committed, immutable fragment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHandle {
    path: PathBuf,
}

impl FragmentHandle {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without the directory, e.g. `20240301T120000.000000000Z-000003.csv`.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns [`StagingError`] if the file is missing or not valid record CSV.
    pub fn read_records(&self) -> Result<Vec<Record>, StagingError> {
        read_records(&self.path)
    }
}

/// Writes one fragment per staged batch into a single directory.
#[derive(Debug, Clone)]
pub struct StagingWriter {
    dir: PathBuf,
}

impl StagingWriter {
    /// Creates the staging directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StagingError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StagingError::io(&dir, e))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists `records` as a new fragment under a fresh unique name.
    ///
    /// The fragment becomes visible to [`list_fragments`] only once it is
    /// fully written and synced; a crash mid-write leaves at most a
    /// `.partial` file that merges ignore. An empty batch still produces a
    /// header-only fragment.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError`] on any I/O or CSV failure, or
    /// [`StagingError::NoFreeName`] if no unused name could be found.
    pub fn stage(&self, records: &[Record]) -> Result<FragmentHandle, StagingError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(fragment_file_name(Utc::now()));
            let Some((partial, file)) = create_partial(&path)? else {
                continue;
            };
            write_records_atomically(&partial, file, &path, records)?;
            tracing::debug!(
                fragment = %path.display(),
                records = records.len(),
                "staged fragment"
            );
            return Ok(FragmentHandle { path });
        }
        Err(StagingError::NoFreeName {
            dir: self.dir.clone(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// Every committed fragment currently in the staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] if the directory cannot be read.
    pub fn fragments(&self) -> Result<Vec<FragmentHandle>, StagingError> {
        list_fragments(&self.dir)
    }
}

/// Committed fragments in `dir`, ordered by name (and therefore by staging
/// time). In-progress `.partial` files are excluded. A missing directory has
/// no fragments.
///
/// # Errors
///
/// Returns [`StagingError::Io`] if the directory exists but cannot be read.
pub fn list_fragments(dir: &Path) -> Result<Vec<FragmentHandle>, StagingError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StagingError::io(dir, e)),
    };

    let mut fragments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StagingError::io(dir, e))?;
        let path = entry.path();
        let is_file = entry
            .file_type()
            .map_err(|e| StagingError::io(&path, e))?
            .is_file();
        let is_fragment = path
            .extension()
            .is_some_and(|ext| ext == FRAGMENT_EXTENSION);
        if is_file && is_fragment {
            fragments.push(FragmentHandle { path });
        }
    }
    fragments.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(fragments)
}
