//! Recreates the target database and table, then loads the newest dataset.

use std::path::{Path, PathBuf};

use rankcrawl_core::{AppConfig, BulkLoadMode};
use rankcrawl_staging::{latest_dataset, StagingError};

use crate::connection::ConnectionParams;
use crate::error::{LoadError, LoadStage};
use crate::scripts::LoadScriptSet;
use crate::store::{RelationalStore, StoreConnection};

const DEFAULT_TABLE: &str = "listings";
const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";

/// Outcome of a successful [`SchemaLoader::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub database: String,
    pub table: String,
    /// Rows reported by the store; `None` when the server-side script ran.
    pub rows_loaded: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SchemaLoader {
    fields: Vec<String>,
    output_dir: PathBuf,
    scripts_dir: PathBuf,
    connection: ConnectionParams,
    table: String,
    maintenance_database: String,
    bulk_load_mode: BulkLoadMode,
}

impl SchemaLoader {
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidConnectionString`] if `connection_string`
    /// cannot be parsed.
    pub fn new(
        connection_string: &str,
        fields: &[&str],
        output_dir: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
    ) -> Result<Self, LoadError> {
        Ok(Self {
            fields: fields.iter().map(|f| (*f).to_owned()).collect(),
            output_dir: output_dir.into(),
            scripts_dir: scripts_dir.into(),
            connection: ConnectionParams::parse(connection_string)?,
            table: DEFAULT_TABLE.to_owned(),
            maintenance_database: DEFAULT_MAINTENANCE_DATABASE.to_owned(),
            bulk_load_mode: BulkLoadMode::Client,
        })
    }

    /// Builds a loader from the directories and load options in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidConnectionString`] if `connection_string`
    /// cannot be parsed or names the maintenance database as the target.
    pub fn from_config(
        config: &AppConfig,
        connection_string: &str,
        fields: &[&str],
    ) -> Result<Self, LoadError> {
        let loader = Self::new(
            connection_string,
            fields,
            &config.output_dir,
            &config.scripts_dir,
        )?
        .with_table(&config.table)
        .with_maintenance_database(&config.maintenance_database)
        .with_bulk_load_mode(config.bulk_load_mode);
        loader.check_distinct_databases()?;
        Ok(loader)
    }

    #[must_use]
    pub fn with_table(mut self, table: &str) -> Self {
        table.clone_into(&mut self.table);
        self
    }

    /// Database to connect to while dropping and recreating the target.
    #[must_use]
    pub fn with_maintenance_database(mut self, database: &str) -> Self {
        database.clone_into(&mut self.maintenance_database);
        self
    }

    #[must_use]
    pub fn with_bulk_load_mode(mut self, mode: BulkLoadMode) -> Self {
        self.bulk_load_mode = mode;
        self
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionParams {
        &self.connection
    }

    #[must_use]
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// The target is dropped while connected to the maintenance database, so
    /// the two must differ.
    fn check_distinct_databases(&self) -> Result<(), LoadError> {
        if self.connection.database == self.maintenance_database {
            return Err(LoadError::InvalidConnectionString {
                reason: format!(
                    "target database '{}' is also the maintenance database; \
                     point the connection string at another database",
                    self.connection.database
                ),
            });
        }
        Ok(())
    }

    /// Builds the three load scripts against the newest canonical dataset and
    /// writes them to the scripts directory.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NoDataset`] if the output directory holds no
    /// dataset, [`LoadError::DatasetLookup`] if it cannot be read, or
    /// [`LoadError::ScriptWrite`] if a script cannot be written.
    pub fn generate(&self) -> Result<LoadScriptSet, LoadError> {
        let dataset = latest_dataset(&self.output_dir)?.ok_or_else(|| LoadError::NoDataset {
            output_dir: self.output_dir.clone(),
        })?;
        // The server resolves the seed script's path itself.
        let dataset = std::fs::canonicalize(&dataset).map_err(|source| StagingError::Io {
            path: dataset.clone(),
            source,
        })?;

        let scripts = LoadScriptSet::build(
            &self.connection.database,
            &self.table,
            &self.fields,
            &dataset,
        );
        let written = scripts.write_to(&self.scripts_dir)?;
        tracing::info!(
            dataset = %dataset.display(),
            scripts = written.len(),
            dir = %self.scripts_dir.display(),
            "generated load scripts"
        );
        Ok(scripts)
    }

    /// Drops and recreates the database, reconnects to it, drops and
    /// recreates the table, then bulk-loads the dataset.
    ///
    /// There is no rollback: a failure leaves whatever the completed steps
    /// built, and the next run starts from scratch anyway.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] whose [`LoadError::stage`] names the failing
    /// step, or [`LoadError::InvalidConnectionString`] before connecting if
    /// the target is the maintenance database.
    pub async fn apply<S: RelationalStore>(
        &self,
        store: &S,
        scripts: &LoadScriptSet,
    ) -> Result<LoadReport, LoadError> {
        self.check_distinct_databases()?;
        let maintenance = self
            .connection
            .with_database(&self.maintenance_database);
        let mut conn = connect(store, &maintenance, LoadStage::CreateDatabase).await?;
        run_statements(&mut conn, &scripts.create_database.statements, LoadStage::CreateDatabase)
            .await?;
        close(conn).await;
        tracing::info!(database = %self.connection.database, "recreated database");

        let mut conn = connect(store, &self.connection, LoadStage::CreateTable).await?;
        run_statements(&mut conn, &scripts.create_table.statements, LoadStage::CreateTable).await?;
        tracing::info!(table = %self.table, columns = self.fields.len(), "recreated table");

        let rows_loaded = match self.bulk_load_mode {
            BulkLoadMode::Client => {
                let data = std::fs::read(&scripts.dataset_path).map_err(|source| {
                    LoadError::ReadDataset {
                        path: scripts.dataset_path.clone(),
                        source,
                    }
                })?;
                let rows = conn
                    .copy_in(&scripts.copy_from_stdin, &data)
                    .await
                    .map_err(|source| LoadError::BulkLoad {
                        table: self.table.clone(),
                        source,
                    })?;
                Some(rows)
            }
            BulkLoadMode::Server => {
                for statement in &scripts.seed.statements {
                    conn.execute(statement)
                        .await
                        .map_err(|source| LoadError::BulkLoad {
                            table: self.table.clone(),
                            source,
                        })?;
                }
                None
            }
        };
        close(conn).await;

        tracing::info!(
            table = %self.table,
            mode = %self.bulk_load_mode,
            rows = ?rows_loaded,
            dataset = %scripts.dataset_path.display(),
            "bulk load complete"
        );
        Ok(LoadReport {
            database: self.connection.database.clone(),
            table: self.table.clone(),
            rows_loaded,
        })
    }
}

async fn connect<S: RelationalStore>(
    store: &S,
    params: &ConnectionParams,
    stage: LoadStage,
) -> Result<S::Connection, LoadError> {
    tracing::debug!(host = %params.host, database = %params.database, "connecting");
    store
        .connect(params)
        .await
        .map_err(|source| LoadError::Connect {
            stage,
            database: params.database.clone(),
            source,
        })
}

async fn run_statements<C: StoreConnection>(
    conn: &mut C,
    statements: &[String],
    stage: LoadStage,
) -> Result<(), LoadError> {
    for statement in statements {
        tracing::debug!(%stage, statement = %statement, "executing");
        conn.execute(statement)
            .await
            .map_err(|source| LoadError::Execute {
                stage,
                statement: statement.clone(),
                source,
            })?;
    }
    Ok(())
}

async fn close<C: StoreConnection>(conn: C) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "error closing store connection");
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
