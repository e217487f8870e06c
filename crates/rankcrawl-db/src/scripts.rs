//! Generated SQL: drop-and-recreate database and table, then bulk load.

use std::path::{Path, PathBuf};

use crate::error::LoadError;

pub const CREATE_DATABASE_FILE: &str = "create_database.sql";
pub const CREATE_TABLE_FILE: &str = "create_table.sql";
pub const SEED_FILE: &str = "seed.sql";

/// An ordered list of statements, each executed on its own.
///
/// `DROP DATABASE`/`CREATE DATABASE` cannot run inside a transaction block,
/// so statements are never batched into one round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: &'static str,
    pub statements: Vec<String>,
}

impl Script {
    /// File contents: one statement per line, each `;`-terminated.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.statements.iter().map(|s| format!("{s};\n")).collect()
    }
}

/// The three generated scripts plus the dataset they load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadScriptSet {
    pub create_database: Script,
    pub create_table: Script,
    /// Server-side `COPY ... FROM '<path>'`.
    pub seed: Script,
    /// Client-side equivalent of `seed`, fed the dataset bytes.
    pub copy_from_stdin: String,
    pub dataset_path: PathBuf,
}

impl LoadScriptSet {
    #[must_use]
    pub fn build(database: &str, table: &str, fields: &[String], dataset_path: &Path) -> Self {
        let db = quote_ident(database);
        let tbl = quote_ident(table);
        let column_list = fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(", ");
        let column_defs = fields
            .iter()
            .map(|f| format!("{} TEXT", quote_ident(f)))
            .collect::<Vec<_>>()
            .join(", ");
        let csv_options = "WITH (FORMAT csv, HEADER true)";

        Self {
            create_database: Script {
                name: CREATE_DATABASE_FILE,
                statements: vec![
                    format!("DROP DATABASE IF EXISTS {db} WITH (FORCE)"),
                    format!("CREATE DATABASE {db}"),
                ],
            },
            create_table: Script {
                name: CREATE_TABLE_FILE,
                statements: vec![
                    format!("DROP TABLE IF EXISTS {tbl}"),
                    format!("CREATE TABLE {tbl} ({column_defs})"),
                ],
            },
            seed: Script {
                name: SEED_FILE,
                statements: vec![format!(
                    "COPY {tbl} ({column_list}) FROM {} {csv_options}",
                    quote_literal(&dataset_path.to_string_lossy())
                )],
            },
            copy_from_stdin: format!("COPY {tbl} ({column_list}) FROM STDIN {csv_options}"),
            dataset_path: dataset_path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn scripts(&self) -> [&Script; 3] {
        [&self.create_database, &self.create_table, &self.seed]
    }

    /// Writes each script to `<dir>/<name>`, replacing previous versions.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::ScriptWrite`] on the first file that cannot be
    /// written.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        std::fs::create_dir_all(dir).map_err(|source| LoadError::ScriptWrite {
            path: dir.to_path_buf(),
            source,
        })?;
        self.scripts()
            .into_iter()
            .map(|script| {
                let path = dir.join(script.name);
                std::fs::write(&path, script.to_sql())
                    .map_err(|source| LoadError::ScriptWrite {
                        path: path.clone(),
                        source,
                    })
                    .map(|()| path)
            })
            .collect()
    }
}

/// `listings` → `"listings"`; embedded quotes are doubled.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
