use crate::app_config::{AppConfig, BulkLoadMode, DedupPolicy};
use crate::ConfigError;

const DEFAULT_BASE_URL: &str = "https://www.imdb.com/search/title/";
const DEFAULT_QUERY: &str = "groups=top_250&sort=user_rating,desc";

/// Query parameter whose value names the ranking when no explicit
/// `RANKCRAWL_RANK_LABEL` is configured.
const RANK_GROUP_PARAM: &str = "groups";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|v| !v.is_empty());
    let log_level = or_default("RANKCRAWL_LOG_LEVEL", "info");

    let base_url = or_default("RANKCRAWL_BASE_URL", DEFAULT_BASE_URL);
    if base_url.is_empty() {
        return Err(invalid("RANKCRAWL_BASE_URL", "must not be empty".to_string()));
    }
    let query = parse_query(&or_default("RANKCRAWL_QUERY", DEFAULT_QUERY))
        .map_err(|reason| invalid("RANKCRAWL_QUERY", reason))?;

    let rank_label = match lookup("RANKCRAWL_RANK_LABEL") {
        Ok(label) if label.is_empty() => None,
        Ok(label) => Some(label),
        Err(_) => query
            .iter()
            .find(|(key, _)| key == RANK_GROUP_PARAM)
            .map(|(_, value)| value.clone()),
    };

    let locale = or_default("RANKCRAWL_LOCALE", "en-US");

    let staging_dir = PathBuf::from(or_default("RANKCRAWL_STAGING_DIR", "./data/staging"));
    let output_dir = PathBuf::from(or_default("RANKCRAWL_OUTPUT_DIR", "./data/datasets"));
    let scripts_dir = PathBuf::from(or_default("RANKCRAWL_SCRIPTS_DIR", "./data/scripts"));

    let table = or_default("RANKCRAWL_TABLE", "listings");
    if !is_identifier(&table) {
        return Err(invalid(
            "RANKCRAWL_TABLE",
            format!("'{table}' is not a plain SQL identifier"),
        ));
    }
    let maintenance_database = or_default("RANKCRAWL_MAINTENANCE_DB", "postgres");

    let bulk_load_mode = parse_bulk_load_mode(&or_default("RANKCRAWL_BULK_LOAD_MODE", "client"))?;
    let dedup = parse_dedup_policy(&or_default("RANKCRAWL_DEDUP", "none"))?;

    let request_timeout_secs = parse_u64("RANKCRAWL_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("RANKCRAWL_USER_AGENT", "rankcrawl/0.1 (listing-crawler)");
    let max_retries = parse_u32("RANKCRAWL_MAX_RETRIES", "0")?;
    let retry_backoff_ms = parse_u64("RANKCRAWL_RETRY_BACKOFF_MS", "1000")?;
    let inter_request_delay_ms = parse_u64("RANKCRAWL_INTER_REQUEST_DELAY_MS", "0")?;
    let fetch_concurrency = parse_usize("RANKCRAWL_FETCH_CONCURRENCY", "1")?;
    if fetch_concurrency == 0 {
        return Err(invalid(
            "RANKCRAWL_FETCH_CONCURRENCY",
            "must be at least 1".to_string(),
        ));
    }

    Ok(AppConfig {
        database_url,
        log_level,
        base_url,
        query,
        rank_label,
        locale,
        staging_dir,
        output_dir,
        scripts_dir,
        table,
        maintenance_database,
        bulk_load_mode,
        dedup,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_ms,
        inter_request_delay_ms,
        fetch_concurrency,
    })
}

/// Splits `k=v&k=v` into ordered pairs. An empty string yields no pairs.
fn parse_query(raw: &str) -> Result<Vec<(String, String)>, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("'{pair}' is not a key=value pair"))?;
            if key.is_empty() {
                return Err(format!("'{pair}' has an empty key"));
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_dedup_policy(s: &str) -> Result<DedupPolicy, ConfigError> {
    match s {
        "none" => Ok(DedupPolicy::None),
        "source-id" => Ok(DedupPolicy::SourceId),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RANKCRAWL_DEDUP".to_string(),
            reason: format!("expected 'none' or 'source-id', got '{other}'"),
        }),
    }
}

fn parse_bulk_load_mode(s: &str) -> Result<BulkLoadMode, ConfigError> {
    match s {
        "client" => Ok(BulkLoadMode::Client),
        "server" => Ok(BulkLoadMode::Server),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RANKCRAWL_BULK_LOAD_MODE".to_string(),
            reason: format!("expected 'client' or 'server', got '{other}'"),
        }),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
