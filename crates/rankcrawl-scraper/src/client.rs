//! Page fetching: the [`PageFetcher`] seam and its reqwest implementation.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;

use crate::error::ScraperError;
use crate::retry::retry_with_backoff;

/// Query parameter carrying the 1-based index of the first result on a page.
pub const START_PARAM: &str = "start";

/// Turns a URL into raw page markup.
///
/// The pipeline depends only on this seam, so tests can serve fixture pages
/// without a network.
pub trait PageFetcher {
    /// Fetches `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns a [`ScraperError`] transport variant when the request fails or
    /// the server answers with a non-2xx status.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, ScraperError>> + Send;
}

/// HTTP fetcher for listing pages.
///
/// Every request carries an `Accept-Language` header pinned to the configured
/// locale: extraction parses natural-language text and assumes one language.
///
/// Transient failures (429, 5xx, timeouts, connect errors) are retried with
/// exponential backoff up to `max_retries` additional attempts; with the
/// default of `0` the first failure is returned as-is.
pub struct HttpFetcher {
    client: Client,
    /// Maximum number of retry attempts after the first failure.
    max_retries: u32,
    /// Base delay for exponential backoff: `backoff_base_ms * 2^(retry-1)`.
    backoff_base_ms: u64,
}

impl HttpFetcher {
    /// Creates an `HttpFetcher` with configured timeout, `User-Agent`, locale,
    /// and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if `locale` cannot be sent as a
    /// header value, or [`ScraperError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        locale: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        let language =
            HeaderValue::from_str(locale).map_err(|e| ScraperError::InvalidUrl {
                url: locale.to_owned(),
                reason: format!("locale is not a valid header value: {e}"),
            })?;
        headers.insert(reqwest::header::ACCEPT_LANGUAGE, language);
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScraperError::RateLimited {
                url: url.to_owned(),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response.text().await?)
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        tracing::debug!(url, "fetching page");
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.fetch_once(url)).await
    }
}

/// Builds a listing URL from the base URL, ordered query parameters, and an
/// optional `start` offset.
///
/// Without a `start` the URL addresses the probe page.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if `base_url` is not an absolute URL.
pub fn listing_url(
    base_url: &str,
    query: &[(String, String)],
    start: Option<u32>,
) -> Result<String, ScraperError> {
    let mut url = reqwest::Url::parse(base_url).map_err(|e| ScraperError::InvalidUrl {
        url: base_url.to_owned(),
        reason: e.to_string(),
    })?;

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
        if let Some(offset) = start {
            pairs.append_pair(START_PARAM, &offset.to_string());
        }
    }

    // `query_pairs_mut` leaves a dangling `?` when nothing was appended.
    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url.to_string())
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
