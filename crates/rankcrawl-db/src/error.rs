use std::fmt;
use std::path::PathBuf;

use rankcrawl_staging::StagingError;
use thiserror::Error;

/// The load step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Generate,
    CreateDatabase,
    CreateTable,
    BulkLoad,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generate => "generate",
            Self::CreateDatabase => "create-database",
            Self::CreateTable => "create-table",
            Self::BulkLoad => "bulk-load",
        })
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid connection string: {reason}")]
    InvalidConnectionString { reason: String },

    #[error("no canonical dataset found under {}", output_dir.display())]
    NoDataset { output_dir: PathBuf },

    #[error("could not locate dataset: {0}")]
    DatasetLookup(#[from] StagingError),

    #[error("could not write load script {}: {source}", path.display())]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not connect to database {database}: {source}")]
    Connect {
        stage: LoadStage,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("statement failed: {statement}: {source}")]
    Execute {
        stage: LoadStage,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("could not read dataset {}: {source}", path.display())]
    ReadDataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bulk load into {table} failed: {source}")]
    BulkLoad {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

impl LoadError {
    /// Which step of generate/apply produced this error.
    #[must_use]
    pub fn stage(&self) -> LoadStage {
        match self {
            Self::InvalidConnectionString { .. }
            | Self::NoDataset { .. }
            | Self::DatasetLookup(_)
            | Self::ScriptWrite { .. } => LoadStage::Generate,
            Self::Connect { stage, .. } | Self::Execute { stage, .. } => *stage,
            Self::ReadDataset { .. } | Self::BulkLoad { .. } => LoadStage::BulkLoad,
        }
    }
}
