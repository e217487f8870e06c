//! plan → crawl → stage → merge → load, wired from an [`AppConfig`].

use std::pin::pin;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rankcrawl_core::{AppConfig, RECORD_FIELDS};
use rankcrawl_db::{LoadError, LoadReport, RelationalStore, SchemaLoader};
use rankcrawl_scraper::{
    listing_url, plan, Document, PageFetcher, PaginationState, RecordExtractor, ScraperError,
};
use rankcrawl_staging::{CanonicalDataset, FragmentHandle, Merger, StagingError, StagingWriter};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error("could not plan pagination: {0}")]
    Plan(#[source] ScraperError),

    #[error("fetch failed at offset {offset}: {source}")]
    Fetch {
        offset: u32,
        #[source]
        source: ScraperError,
    },

    #[error("could not stage records: {0}")]
    Stage(#[source] StagingError),

    #[error("merge failed: {0}")]
    Merge(#[source] StagingError),

    #[error("load failed during {}: {}", .0.stage(), .0)]
    Load(#[source] LoadError),
}

impl PipelineError {
    /// Short label of the failing stage, printed in the final diagnostic.
    pub(crate) fn stage(&self) -> &'static str {
        match self {
            Self::Plan(_) => "plan",
            Self::Fetch { .. } => "fetch",
            Self::Stage(_) => "stage",
            Self::Merge(_) => "merge",
            Self::Load(_) => "load",
        }
    }
}

#[derive(Debug)]
pub(crate) struct CrawlSummary {
    pub pages: usize,
    pub records: usize,
    pub fragments: Vec<FragmentHandle>,
}

#[derive(Debug)]
pub(crate) struct RunSummary {
    pub state: PaginationState,
    pub crawl: CrawlSummary,
    pub dataset: CanonicalDataset,
    pub load: LoadReport,
}

pub(crate) struct Pipeline<F> {
    fetcher: F,
    config: AppConfig,
    extractor: RecordExtractor,
}

impl<F: PageFetcher> Pipeline<F> {
    pub(crate) fn new(fetcher: F, config: AppConfig) -> Self {
        let extractor = RecordExtractor::new(config.rank_label.clone());
        Self {
            fetcher,
            config,
            extractor,
        }
    }

    pub(crate) fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Fetches the probe page (no `start` parameter) and reads its
    /// pagination description. Its records are not staged.
    pub(crate) async fn plan(&self) -> Result<PaginationState, PipelineError> {
        let url = listing_url(&self.config.base_url, &self.config.query, None)
            .map_err(PipelineError::Plan)?;
        tracing::info!(url = %url, "fetching probe page");
        let body = self.fetcher.fetch(&url).await.map_err(PipelineError::Plan)?;
        let state = plan(&Document::parse(&body)).map_err(PipelineError::Plan)?;
        tracing::info!(
            start_index = state.start_index,
            page_size = state.page_size,
            total_count = state.total_count,
            pages = state.page_count(),
            "planned pagination"
        );
        Ok(state)
    }

    /// Fetches every planned offset and stages one fragment per page, in
    /// offset order. The first fetch or staging failure aborts the crawl;
    /// fragments already staged stay for the next merge.
    pub(crate) async fn crawl(&self, state: &PaginationState) -> Result<CrawlSummary, PipelineError> {
        let writer =
            StagingWriter::new(&self.config.staging_dir).map_err(PipelineError::Stage)?;
        let concurrency = self.config.fetch_concurrency.max(1);

        let mut pages = pin!(stream::iter(state.offsets().enumerate())
            .map(|(index, offset)| self.fetch_page(index, offset))
            .buffered(concurrency));

        let mut summary = CrawlSummary {
            pages: 0,
            records: 0,
            fragments: Vec::with_capacity(state.offsets().len()),
        };
        while let Some(page) = pages.next().await {
            let (offset, body) = page?;
            let records = self.extractor.extract(&Document::parse(&body));
            let fragment = writer.stage(&records).map_err(PipelineError::Stage)?;
            tracing::info!(
                offset,
                records = records.len(),
                fragment = %fragment.file_name(),
                "staged page"
            );
            summary.pages += 1;
            summary.records += records.len();
            summary.fragments.push(fragment);
        }

        tracing::info!(
            pages = summary.pages,
            records = summary.records,
            "crawl complete"
        );
        Ok(summary)
    }

    async fn fetch_page(&self, index: usize, offset: u32) -> Result<(u32, String), PipelineError> {
        let delay = Duration::from_millis(self.config.inter_request_delay_ms);
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let fetch_error = |source| PipelineError::Fetch { offset, source };
        let url = listing_url(&self.config.base_url, &self.config.query, Some(offset))
            .map_err(fetch_error)?;
        tracing::debug!(offset, url = %url, "fetching page");
        let body = self.fetcher.fetch(&url).await.map_err(fetch_error)?;
        Ok((offset, body))
    }

    /// Sweeps every fragment in the staging directory into a new dataset.
    pub(crate) fn merge(&self) -> Result<CanonicalDataset, PipelineError> {
        Merger::new(
            &self.config.staging_dir,
            &self.config.output_dir,
            self.config.dedup,
        )
        .merge()
        .map_err(PipelineError::Merge)
    }

    /// Regenerates the load scripts for the newest dataset and applies them.
    pub(crate) async fn load<S: RelationalStore>(
        &self,
        store: &S,
        connection_string: &str,
    ) -> Result<LoadReport, PipelineError> {
        let loader = SchemaLoader::from_config(&self.config, connection_string, &RECORD_FIELDS)
            .map_err(PipelineError::Load)?;
        let scripts = loader.generate().map_err(PipelineError::Load)?;
        loader
            .apply(store, &scripts)
            .await
            .map_err(PipelineError::Load)
    }

    /// The full run: plan, crawl, merge, load.
    pub(crate) async fn run<S: RelationalStore>(
        &self,
        store: &S,
        connection_string: &str,
    ) -> Result<RunSummary, PipelineError> {
        let state = self.plan().await?;
        let crawl = self.crawl(&state).await?;
        let dataset = self.merge()?;
        let load = self.load(store, connection_string).await?;
        Ok(RunSummary {
            state,
            crawl,
            dataset,
            load,
        })
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
