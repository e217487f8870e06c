use std::path::PathBuf;

/// How records sharing a `source_id` are treated when fragments are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Pass duplicates through unchanged.
    None,
    /// Keep one record per `source_id`, preferring the lowest rank.
    SourceId,
}

impl std::fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupPolicy::None => write!(f, "none"),
            DedupPolicy::SourceId => write!(f, "source-id"),
        }
    }
}

/// Where the bulk-load step reads the canonical dataset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkLoadMode {
    /// Stream the file from this process over `COPY ... FROM STDIN`.
    Client,
    /// Execute the generated `COPY ... FROM '<path>'`; the server reads the file.
    Server,
}

impl std::fmt::Display for BulkLoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BulkLoadMode::Client => write!(f, "client"),
            BulkLoadMode::Server => write!(f, "server"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub log_level: String,
    pub base_url: String,
    /// Listing query parameters, in the order they appear in the URL.
    pub query: Vec<(String, String)>,
    /// Ranking name stamped on every record. `Some` switches the extractor
    /// into ranked mode.
    pub rank_label: Option<String>,
    pub locale: String,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub table: String,
    pub maintenance_database: String,
    pub bulk_load_mode: BulkLoadMode,
    pub dedup: DedupPolicy,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub inter_request_delay_ms: u64,
    pub fetch_concurrency: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("log_level", &self.log_level)
            .field("base_url", &self.base_url)
            .field("query", &self.query)
            .field("rank_label", &self.rank_label)
            .field("locale", &self.locale)
            .field("staging_dir", &self.staging_dir)
            .field("output_dir", &self.output_dir)
            .field("scripts_dir", &self.scripts_dir)
            .field("table", &self.table)
            .field("maintenance_database", &self.maintenance_database)
            .field("bulk_load_mode", &self.bulk_load_mode)
            .field("dedup", &self.dedup)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish()
    }
}

impl AppConfig {
    /// Returns the database URL, or an error naming the missing variable.
    ///
    /// Crawling and merging run without a database; only the load stage
    /// needs one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::MissingEnvVar`] when `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, crate::ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| crate::ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}
