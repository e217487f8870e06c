use super::*;

fn top_250_query() -> Vec<(String, String)> {
    vec![
        ("groups".to_owned(), "top_250".to_owned()),
        ("sort".to_owned(), "user_rating,desc".to_owned()),
    ]
}

#[test]
fn listing_url_probe_has_no_start() {
    let url = listing_url("https://www.imdb.com/search/title/", &top_250_query(), None).unwrap();
    assert_eq!(
        url,
        "https://www.imdb.com/search/title/?groups=top_250&sort=user_rating%2Cdesc"
    );
}

#[test]
fn listing_url_appends_start_after_query() {
    let url =
        listing_url("https://www.imdb.com/search/title/", &top_250_query(), Some(51)).unwrap();
    assert_eq!(
        url,
        "https://www.imdb.com/search/title/?groups=top_250&sort=user_rating%2Cdesc&start=51"
    );
}

#[test]
fn listing_url_keeps_existing_query_on_base() {
    let url = listing_url(
        "https://listing.test/search?title_type=feature",
        &[("sort".to_owned(), "rank".to_owned())],
        Some(1),
    )
    .unwrap();
    assert_eq!(
        url,
        "https://listing.test/search?title_type=feature&sort=rank&start=1"
    );
}

#[test]
fn listing_url_without_query_or_start_has_no_question_mark() {
    let url = listing_url("https://listing.test/search", &[], None).unwrap();
    assert_eq!(url, "https://listing.test/search");
}

#[test]
fn listing_url_start_only() {
    let url = listing_url("https://listing.test/search", &[], Some(1)).unwrap();
    assert_eq!(url, "https://listing.test/search?start=1");
}

#[test]
fn listing_url_rejects_relative_base() {
    let err = listing_url("search/title", &[], None).unwrap_err();
    assert!(
        matches!(err, ScraperError::InvalidUrl { .. }),
        "expected InvalidUrl, got: {err:?}"
    );
}

#[test]
fn http_fetcher_rejects_unsendable_locale() {
    let result = HttpFetcher::new(5, "rankcrawl-test/0.1", "en-US\n", 0, 0);
    assert!(matches!(result, Err(ScraperError::InvalidUrl { .. })));
}
