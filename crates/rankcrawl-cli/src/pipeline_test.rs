use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rankcrawl_core::{BulkLoadMode, DedupPolicy, Record};
use rankcrawl_db::{ConnectionParams, StoreConnection};
use rankcrawl_staging::list_fragments;

use super::*;

const BASE_URL: &str = "https://listings.test/search/title/";
const DATABASE_URL: &str = "postgres://crawler:pw@db.test/movies";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Serves canned pages by URL and records every request.
#[derive(Default)]
struct FakeFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn serve(mut self, url: String, body: String) -> Self {
        self.pages.insert(url, body);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        self.requests.lock().unwrap().push(url.to_owned());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::UnexpectedStatus {
                status: 404,
                url: url.to_owned(),
            })
    }
}

#[derive(Default, Clone)]
struct FakeStore {
    statements: Arc<Mutex<Vec<String>>>,
    fail_on: Option<&'static str>,
}

struct FakeConnection {
    statements: Arc<Mutex<Vec<String>>>,
    fail_on: Option<&'static str>,
}

impl FakeStore {
    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

impl RelationalStore for FakeStore {
    type Connection = FakeConnection;

    async fn connect(&self, _params: &ConnectionParams) -> Result<FakeConnection, sqlx::Error> {
        Ok(FakeConnection {
            statements: Arc::clone(&self.statements),
            fail_on: self.fail_on,
        })
    }
}

impl FakeConnection {
    fn record(&self, sql: &str) -> Result<(), sqlx::Error> {
        self.statements.lock().unwrap().push(sql.to_owned());
        match self.fail_on {
            Some(pattern) if sql.contains(pattern) => {
                Err(sqlx::Error::Protocol("simulated failure".to_owned()))
            }
            _ => Ok(()),
        }
    }
}

impl StoreConnection for FakeConnection {
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.record(sql)
    }

    async fn copy_in(&mut self, statement: &str, data: &[u8]) -> Result<u64, sqlx::Error> {
        self.record(statement)?;
        let rows = String::from_utf8_lossy(data).lines().count().saturating_sub(1);
        Ok(u64::try_from(rows).unwrap())
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn item(id: &str, rank: u32, genre: Option<&str>) -> String {
    let genre = genre
        .map(|g| format!("<span class=\"genre\">\n{g}            </span>"))
        .unwrap_or_default();
    format!(
        r#"<div class="lister-item mode-advanced">
             <div class="lister-item-image"><a href="/title/{id}/"><img alt=""></a></div>
             <div class="lister-item-content">
               <h3 class="lister-item-header">
                 <span class="lister-item-index unbold text-primary">{rank}.</span>
                 <a href="/title/{id}/?ref_=adv_li_tt">Title {id}</a>
                 <span class="lister-item-year text-muted unbold">(1994)</span>
               </h3>
               <p class="text-muted"><span class="runtime">142 min</span>{genre}</p>
             </div>
           </div>"#
    )
}

fn listing_page(description: &str, items: &[String]) -> String {
    format!(
        r#"<html><body>
             <div class="nav"><div class="desc"><span>{description}</span></div></div>
             <div class="lister list detail sub-list">{}</div>
           </body></html>"#,
        items.join("\n")
    )
}

fn query() -> Vec<(String, String)> {
    vec![
        ("groups".to_owned(), "top_250".to_owned()),
        ("sort".to_owned(), "user_rating,desc".to_owned()),
    ]
}

fn url(start: Option<u32>) -> String {
    listing_url(BASE_URL, &query(), start).unwrap()
}

fn config(root: &Path) -> AppConfig {
    AppConfig {
        database_url: Some(DATABASE_URL.to_owned()),
        log_level: "info".to_owned(),
        base_url: BASE_URL.to_owned(),
        query: query(),
        rank_label: Some("top_250".to_owned()),
        locale: "en-US".to_owned(),
        staging_dir: root.join("staging"),
        output_dir: root.join("datasets"),
        scripts_dir: root.join("scripts"),
        table: "listings".to_owned(),
        maintenance_database: "postgres".to_owned(),
        bulk_load_mode: BulkLoadMode::Client,
        dedup: DedupPolicy::None,
        request_timeout_secs: 5,
        user_agent: "rankcrawl-test".to_owned(),
        max_retries: 0,
        retry_backoff_ms: 0,
        inter_request_delay_ms: 0,
        fetch_concurrency: 1,
    }
}

/// Probe and single offset page for "1-4 of 4 titles".
fn four_title_fetcher() -> FakeFetcher {
    let items: Vec<String> = (1..=4).map(|n| item(&format!("tt{n}"), n, Some("Drama"))).collect();
    let page = listing_page("1-4 of 4 titles.", &items);
    FakeFetcher::default()
        .serve(url(None), page.clone())
        .serve(url(Some(1)), page)
}

fn ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.source_id.clone()).collect()
}

fn staged(root: &Path) -> usize {
    list_fragments(&root.join("staging")).unwrap().len()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_page_run_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(four_title_fetcher(), config(root.path()));
    let store = FakeStore::default();

    let summary = pipeline.run(&store, DATABASE_URL).await.unwrap();

    assert_eq!(pipeline.fetcher.requests(), vec![url(None), url(Some(1))]);
    assert_eq!(summary.state.page_size, 4);
    assert_eq!(summary.crawl.pages, 1);
    assert_eq!(summary.crawl.records, 4);
    assert_eq!(summary.crawl.fragments.len(), 1);
    assert_eq!(summary.dataset.record_count, 4);
    assert_eq!(summary.dataset.fragments_merged, 1);
    assert_eq!(summary.load.rows_loaded, Some(4));
    assert_eq!(staged(root.path()), 0);

    let records = summary.dataset.read_records().unwrap();
    assert_eq!(ids(&records), vec!["tt1", "tt2", "tt3", "tt4"]);
    assert!(records.iter().all(|r| r.rank_label.as_deref() == Some("top_250")));

    let expected_columns = RECORD_FIELDS
        .iter()
        .map(|f| format!("\"{f}\" TEXT"))
        .collect::<Vec<_>>()
        .join(", ");
    let statements = store.statements();
    assert!(
        statements.contains(&format!("CREATE TABLE \"listings\" ({expected_columns})")),
        "no matching CREATE TABLE in {statements:?}"
    );
}

#[tokio::test]
async fn missing_genre_still_yields_a_full_record() {
    let root = tempfile::tempdir().unwrap();
    let page = listing_page(
        "1-2 of 2 titles.",
        &[item("tt1", 1, Some("Crime, Drama")), item("tt2", 2, None)],
    );
    let fetcher = FakeFetcher::default()
        .serve(url(None), page.clone())
        .serve(url(Some(1)), page);
    let pipeline = Pipeline::new(fetcher, config(root.path()));

    let summary = pipeline.run(&FakeStore::default(), DATABASE_URL).await.unwrap();
    let records = summary.dataset.read_records().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].genres, "Crime,Drama");
    let r = &records[1];
    assert_eq!(r.genres, "");
    assert_eq!(r.source_id, "tt2");
    assert_eq!(r.title, "Title tt2");
    assert_eq!(r.rank, Some(2));
    assert_eq!(r.year, "1994");
    assert_eq!(r.duration_minutes, "142min");
}

#[tokio::test]
async fn failed_merge_keeps_fragments_for_the_next_run() {
    let root = tempfile::tempdir().unwrap();
    let cfg = config(root.path());
    // A regular file where the output directory belongs makes the merge fail.
    std::fs::write(&cfg.output_dir, "blocked").unwrap();
    let pipeline = Pipeline::new(four_title_fetcher(), cfg.clone());

    let err = pipeline.run(&FakeStore::default(), DATABASE_URL).await.unwrap_err();
    assert_eq!(err.stage(), "merge");
    assert_eq!(staged(root.path()), 1);

    std::fs::remove_file(&cfg.output_dir).unwrap();
    let rerun = Pipeline::new(four_title_fetcher(), cfg);
    let summary = rerun.run(&FakeStore::default(), DATABASE_URL).await.unwrap();

    assert_eq!(summary.dataset.fragments_merged, 2);
    assert_eq!(summary.dataset.record_count, 8);
    assert_eq!(staged(root.path()), 0);
}

#[tokio::test]
async fn zero_results_produce_an_empty_dataset() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::default().serve(url(None), listing_page("0 titles.", &[]));
    let pipeline = Pipeline::new(fetcher, config(root.path()));

    let state = pipeline.plan().await.unwrap();
    let crawl = pipeline.crawl(&state).await.unwrap();
    let dataset = pipeline.merge().unwrap();

    assert_eq!(pipeline.fetcher.requests(), vec![url(None)]);
    assert_eq!(crawl.pages, 0);
    assert_eq!(dataset.record_count, 0);
    assert!(dataset.read_records().unwrap().is_empty());
}

fn three_page_fetcher() -> FakeFetcher {
    let probe = listing_page("1-2 of 5 titles.", &[]);
    FakeFetcher::default()
        .serve(url(None), probe)
        .serve(
            url(Some(1)),
            listing_page("1-2 of 5 titles.", &[item("tt1", 1, None), item("tt2", 2, None)]),
        )
        .serve(
            url(Some(3)),
            listing_page("3-4 of 5 titles.", &[item("tt3", 3, None), item("tt4", 4, None)]),
        )
        .serve(
            url(Some(5)),
            listing_page("5-5 of 5 titles.", &[item("tt5", 5, None)]),
        )
}

#[tokio::test]
async fn pages_are_staged_in_offset_order() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(three_page_fetcher(), config(root.path()));

    let state = pipeline.plan().await.unwrap();
    let crawl = pipeline.crawl(&state).await.unwrap();
    let dataset = pipeline.merge().unwrap();

    assert_eq!(state.offsets().collect::<Vec<_>>(), vec![1, 3, 5]);
    assert_eq!(crawl.pages, 3);
    assert_eq!(crawl.fragments.len(), 3);
    assert_eq!(
        ids(&dataset.read_records().unwrap()),
        vec!["tt1", "tt2", "tt3", "tt4", "tt5"]
    );
}

#[tokio::test]
async fn concurrent_fetches_still_stage_in_offset_order() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = config(root.path());
    cfg.fetch_concurrency = 3;
    let pipeline = Pipeline::new(three_page_fetcher(), cfg);

    let state = pipeline.plan().await.unwrap();
    let crawl = pipeline.crawl(&state).await.unwrap();

    let per_fragment: Vec<Vec<String>> = crawl
        .fragments
        .iter()
        .map(|f| ids(&f.read_records().unwrap()))
        .collect();
    assert_eq!(
        per_fragment,
        vec![vec!["tt1", "tt2"], vec!["tt3", "tt4"], vec!["tt5"]]
    );
    let mut names: Vec<&str> = crawl.fragments.iter().map(|f| f.file_name()).collect();
    let in_staging_order = names.clone();
    names.sort_unstable();
    assert_eq!(names, in_staging_order);
}

#[tokio::test]
async fn fetch_failure_aborts_and_keeps_earlier_fragments() {
    let root = tempfile::tempdir().unwrap();
    let probe = listing_page("1-2 of 4 titles.", &[]);
    let fetcher = FakeFetcher::default()
        .serve(url(None), probe)
        .serve(
            url(Some(1)),
            listing_page("1-2 of 4 titles.", &[item("tt1", 1, None), item("tt2", 2, None)]),
        );
    let pipeline = Pipeline::new(fetcher, config(root.path()));

    let err = pipeline
        .run(&FakeStore::default(), DATABASE_URL)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "fetch");
    assert!(matches!(err, PipelineError::Fetch { offset: 3, .. }));
    assert_eq!(staged(root.path()), 1);
}

#[tokio::test]
async fn malformed_probe_fails_in_plan_stage() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::default().serve(url(None), "<html><body>nothing</body></html>".to_owned());
    let pipeline = Pipeline::new(fetcher, config(root.path()));

    let err = pipeline
        .run(&FakeStore::default(), DATABASE_URL)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "plan");
    assert!(matches!(err, PipelineError::Plan(ScraperError::MalformedPage { .. })));
}

#[tokio::test]
async fn count_without_page_range_aborts_before_any_fetch() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::default().serve(url(None), listing_page("250 titles.", &[]));
    let pipeline = Pipeline::new(fetcher, config(root.path()));

    let err = pipeline
        .run(&FakeStore::default(), DATABASE_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Plan(ScraperError::MalformedPage { .. })));
    assert_eq!(pipeline.fetcher.requests(), vec![url(None)]);
    assert_eq!(staged(root.path()), 0);
}

#[tokio::test]
async fn load_failure_leaves_dataset_reloadable_without_recrawl() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(four_title_fetcher(), config(root.path()));
    let broken = FakeStore {
        fail_on: Some("CREATE TABLE"),
        ..FakeStore::default()
    };

    let err = pipeline.run(&broken, DATABASE_URL).await.unwrap_err();
    assert_eq!(err.stage(), "load");
    assert!(err.to_string().contains("create-table"));
    let requests_after_crawl = pipeline.fetcher.requests().len();

    let report = pipeline
        .load(&FakeStore::default(), DATABASE_URL)
        .await
        .unwrap();
    assert_eq!(report.rows_loaded, Some(4));
    assert_eq!(pipeline.fetcher.requests().len(), requests_after_crawl);
}

#[tokio::test]
async fn source_id_dedup_collapses_overlapping_pages() {
    let root = tempfile::tempdir().unwrap();
    let probe = listing_page("1-2 of 4 titles.", &[]);
    // Re-ranking between fetches moved tt2 onto the second page as well.
    let fetcher = FakeFetcher::default()
        .serve(url(None), probe)
        .serve(
            url(Some(1)),
            listing_page("1-2 of 4 titles.", &[item("tt1", 1, None), item("tt2", 2, None)]),
        )
        .serve(
            url(Some(3)),
            listing_page("3-4 of 4 titles.", &[item("tt2", 3, None), item("tt4", 4, None)]),
        );
    let mut cfg = config(root.path());
    cfg.dedup = DedupPolicy::SourceId;
    let pipeline = Pipeline::new(fetcher, cfg);

    let summary = pipeline.run(&FakeStore::default(), DATABASE_URL).await.unwrap();
    let records = summary.dataset.read_records().unwrap();

    assert_eq!(ids(&records), vec!["tt1", "tt2", "tt4"]);
    assert_eq!(records[1].rank, Some(2));
}

#[tokio::test]
async fn unranked_configuration_leaves_rank_empty() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = config(root.path());
    cfg.rank_label = None;
    let pipeline = Pipeline::new(four_title_fetcher(), cfg);

    let state = pipeline.plan().await.unwrap();
    pipeline.crawl(&state).await.unwrap();
    let records = pipeline.merge().unwrap().read_records().unwrap();

    assert!(records.iter().all(|r| r.rank.is_none() && r.rank_label.is_none()));
}

#[test]
fn stage_labels_match_variants() {
    let merge = PipelineError::Merge(rankcrawl_staging::StagingError::NoFreeName {
        dir: PathBuf::from("/out"),
        attempts: 1,
    });
    assert_eq!(merge.stage(), "merge");
    let fetch = PipelineError::Fetch {
        offset: 51,
        source: ScraperError::UnexpectedStatus {
            status: 500,
            url: "https://listings.test".to_owned(),
        },
    };
    assert_eq!(fetch.stage(), "fetch");
    assert!(fetch.to_string().contains("offset 51"));
}

#[test]
fn load_error_message_names_the_load_step() {
    let err = PipelineError::Load(LoadError::NoDataset {
        output_dir: PathBuf::from("/out"),
    });
    assert_eq!(err.stage(), "load");
    assert_eq!(
        err.to_string(),
        "load failed during generate: no canonical dataset found under /out"
    );
}
