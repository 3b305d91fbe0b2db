//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the catalog site and run both stages
//! end-to-end, including interrupted runs that resume from their snapshots.

use catalog_trawler::checkpoint::Checkpoint;
use catalog_trawler::config::{parse_config, Config};
use catalog_trawler::crawler::{RunOptions, Trawler, DETAIL_STAGE, LISTING_STAGE};
use catalog_trawler::state::{DetailState, ListingState, UnitStatus};
use catalog_trawler::{FetchError, TrawlError, UnitKey};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, checkpoint_dir: &TempDir) -> Config {
    let toml = format!(
        r#"
[dispatcher]
min-interval-ms = 5
safety-margin-ms = 1
min-sleep-ms = 10
max-sleep-ms = 40
timeout-secs = 5

[search]
url = "{base_url}/search"
text-param = "SearchText"

[search.extra-params]
tab = "supplier"

[listing]
kind = "selector"
card = "div.card"
detail-url = "a.title"
name = "a.title"
description = "p.products"

[detail]
address = ["td.address", "div.addr"]
volume = ["td.volume"]
orders = ["td.orders"]

[checkpoint]
directory = "{dir}"

[[area]]
address = "taizhou"
name = "Taizhou"
children = [
    {{ address = "hailing", name = "Hailing" }},
    {{ address = "gaogang", name = "Gaogang" }},
]
"#,
        base_url = base_url,
        dir = checkpoint_dir.path().display()
    );
    parse_config(&toml).expect("Failed to parse test config")
}

fn listing_page(base_url: &str, companies: &[(&str, &str)]) -> String {
    let cards: String = companies
        .iter()
        .map(|(slug, name)| {
            format!(
                r#"<div class="card"><a class="title" href="{}/company/{}">{}</a><p class="products">Valves</p></div>"#,
                base_url, slug, name
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

fn detail_page(address: &str) -> String {
    format!(
        r#"<html><body><table>
            <tr><td class="address">{}</td></tr>
            <tr><td class="volume">US$ 50,000+</td></tr>
            <tr><td class="orders">12</td></tr>
        </table></body></html>"#,
        address
    )
}

async fn mount_search(server: &MockServer, text: &str, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("SearchText", text))
        .and(query_param("page", page.to_string().as_str()))
        .and(query_param("tab", "supplier"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Hailing has two companies on one page, Gaogang has one
async fn mount_listings(server: &MockServer) {
    let base_url = server.uri();
    mount_search(
        server,
        "hailing",
        1,
        listing_page(&base_url, &[("acme", "Acme Valves"), ("bolt", "Bolt Co")]),
    )
    .await;
    mount_search(server, "hailing", 2, listing_page(&base_url, &[])).await;
    mount_search(
        server,
        "gaogang",
        1,
        listing_page(&base_url, &[("cog", "Cog Works")]),
    )
    .await;
    mount_search(server, "gaogang", 2, listing_page(&base_url, &[])).await;
}

async fn mount_detail(server: &MockServer, slug: &str, address: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/company/{}", slug)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(address)))
        .expect(1)
        .mount(server)
        .await;
}

fn load_listing(config: &Config, fingerprint: &str) -> ListingState {
    Checkpoint::<ListingState>::load(config.checkpoint.listing_path(), LISTING_STAGE, fingerprint)
        .expect("Failed to load listing snapshot")
        .into_state()
}

fn load_details(config: &Config, fingerprint: &str) -> DetailState {
    Checkpoint::<DetailState>::load(config.checkpoint.detail_path(), DETAIL_STAGE, fingerprint)
        .expect("Failed to load detail snapshot")
        .into_state()
}

#[tokio::test]
async fn test_full_run_both_stages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_listings(&server).await;
    mount_detail(&server, "acme", "No. 1 Road, Hailing District, Taizhou").await;
    mount_detail(&server, "bolt", "Shenzhen, Guangdong").await;
    mount_detail(&server, "cog", "Gaogang, Taizhou, Jiangsu").await;

    let mut trawler = Trawler::from_config(config.clone()).expect("Failed to build trawler");
    let fingerprint = trawler.taxonomy().fingerprint();
    let summaries = trawler.run(RunOptions::default()).await.expect("Run failed");

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].records, 3);
    assert!(summaries[0].is_finished());
    assert_eq!(summaries[1].records, 3);
    assert_eq!(summaries[1].resolved, Some(2));

    let listing = load_listing(&config, &fingerprint);
    let hailing = UnitKey::new("hailing", "Hailing");
    assert_eq!(listing.status(&hailing), UnitStatus::Complete);
    assert_eq!(listing.items(&hailing)[1].display_name, "Bolt Co");

    let details = load_details(&config, &fingerprint);
    let acme = &details.items(&hailing)[0];
    assert_eq!(
        acme.resolved_address_path,
        Some(vec!["Taizhou".to_string(), "Hailing".to_string()])
    );
    assert_eq!(acme.volume, "US$ 50,000+");
    assert_eq!(acme.orders, "12");
    assert_eq!(acme.record.short_description, "Valves");

    let gaogang = UnitKey::new("gaogang", "Gaogang");
    assert_eq!(
        details.items(&gaogang)[0].resolved_address_path,
        Some(vec!["Taizhou".to_string(), "Gaogang".to_string()])
    );
}

#[tokio::test]
async fn test_interrupted_detail_stage_resumes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_listings(&server).await;
    mount_detail(&server, "acme", "Hailing, Taizhou").await;

    // The first request for bolt fails, the retry in the next run succeeds
    Mock::given(method("GET"))
        .and(path("/company/bolt"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_detail(&server, "bolt", "Hailing, Taizhou").await;
    mount_detail(&server, "cog", "Gaogang, Taizhou").await;

    let mut first = Trawler::from_config(config.clone()).unwrap();
    let err = first.run(RunOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        TrawlError::Fetch(FetchError::FetchFailed { status: 500, .. })
    ));

    let fingerprint = first.taxonomy().fingerprint();
    let hailing = UnitKey::new("hailing", "Hailing");
    assert_eq!(
        load_details(&config, &fingerprint).status(&hailing),
        UnitStatus::InProgress(1)
    );

    // Listing is complete, so only the detail stage has work left
    let mut second = Trawler::from_config(config.clone()).unwrap();
    let summaries = second.run(RunOptions::default()).await.expect("Resume failed");
    assert_eq!(summaries[1].records, 3);
    assert!(summaries[1].is_finished());

    let details = load_details(&config, &fingerprint);
    let names: Vec<_> = details
        .items(&hailing)
        .iter()
        .map(|record| record.record.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Acme Valves", "Bolt Co"]);
}

#[tokio::test]
async fn test_persistent_block_is_exhausted_and_snapshot_kept() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_search(
        &server,
        "hailing",
        1,
        listing_page(&server.uri(), &[("acme", "Acme Valves")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("SearchText", "hailing"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><div id=\"captcha\"></div></html>"),
        )
        .mount(&server)
        .await;

    let mut trawler = Trawler::from_config(config.clone()).unwrap();
    let options = RunOptions {
        listing: true,
        detail: false,
        fresh: false,
    };
    let err = trawler.run(options).await.unwrap_err();
    assert!(matches!(
        err,
        TrawlError::Fetch(FetchError::Exhausted { .. })
    ));

    let listing = load_listing(&config, &trawler.taxonomy().fingerprint());
    let hailing = UnitKey::new("hailing", "Hailing");
    assert_eq!(listing.status(&hailing), UnitStatus::InProgress(1));
    assert_eq!(listing.items(&hailing).len(), 1);
}

#[tokio::test]
async fn test_detail_stage_skips_incomplete_listings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    // Hailing completes, Gaogang fails on its first page
    mount_search(
        &server,
        "hailing",
        1,
        listing_page(&server.uri(), &[("acme", "Acme Valves")]),
    )
    .await;
    mount_search(&server, "hailing", 2, listing_page(&server.uri(), &[])).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("SearchText", "gaogang"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_detail(&server, "acme", "Hailing, Taizhou").await;

    let mut trawler = Trawler::from_config(config.clone()).unwrap();
    assert!(trawler.run(RunOptions::default()).await.is_err());

    let detail_only = RunOptions {
        listing: false,
        detail: true,
        fresh: false,
    };
    let summaries = trawler.run(detail_only).await.expect("Detail stage failed");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].records, 1);
    assert_eq!(summaries[0].units_complete, 1);
    assert_eq!(summaries[0].units_not_started, 1);
}

#[tokio::test]
async fn test_fresh_run_ignores_snapshot() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    // Every listing page is served twice: once per run
    for (text, companies) in [("hailing", vec![("acme", "Acme Valves")]), ("gaogang", vec![])] {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("SearchText", text))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&server.uri(), &companies)),
            )
            .expect(2)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("SearchText", "hailing"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&server.uri(), &[])))
        .expect(2)
        .mount(&server)
        .await;

    let listing_only = RunOptions {
        listing: true,
        detail: false,
        fresh: false,
    };
    let mut trawler = Trawler::from_config(config.clone()).unwrap();
    trawler.run(listing_only).await.unwrap();

    // A resumed run fetches nothing; a fresh run starts over
    trawler.run(listing_only).await.unwrap();
    let summaries = trawler
        .run(RunOptions {
            fresh: true,
            ..listing_only
        })
        .await
        .unwrap();
    assert_eq!(summaries[0].records, 1);
}

/// Serves `body` for one search page a fixed number of times
async fn mount_search_times(server: &MockServer, text: &str, page: u32, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("SearchText", text))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fresh_listing_restarts_stale_details() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);
    let base_url = server.uri();

    // Hailing lists acme on the first run and bolt after the fresh listing
    let before = listing_page(&base_url, &[("acme", "Acme Valves")]);
    let after = listing_page(&base_url, &[("bolt", "Bolt Co")]);
    mount_search_times(&server, "hailing", 1, before, 1).await;
    mount_search_times(&server, "hailing", 1, after, 1).await;
    mount_search_times(&server, "hailing", 2, listing_page(&base_url, &[]), 2).await;
    mount_search_times(&server, "gaogang", 1, listing_page(&base_url, &[]), 2).await;
    mount_detail(&server, "acme", "Hailing, Taizhou").await;
    mount_detail(&server, "bolt", "Hailing, Taizhou").await;

    let mut trawler = Trawler::from_config(config.clone()).unwrap();
    trawler.run(RunOptions::default()).await.expect("Full run failed");

    trawler
        .run(RunOptions {
            listing: true,
            detail: false,
            fresh: true,
        })
        .await
        .expect("Fresh listing failed");
    let summaries = trawler
        .run(RunOptions {
            listing: false,
            detail: true,
            fresh: false,
        })
        .await
        .expect("Detail stage failed");
    assert!(summaries[0].is_finished());

    let details = load_details(&config, &trawler.taxonomy().fingerprint());
    let names: Vec<_> = details
        .items(&UnitKey::new("hailing", "Hailing"))
        .iter()
        .map(|record| record.record.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Bolt Co"]);
}

#[tokio::test]
async fn test_unit_without_records_finishes_detail_stage() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);

    mount_search(
        &server,
        "hailing",
        1,
        listing_page(&server.uri(), &[("acme", "Acme Valves")]),
    )
    .await;
    mount_search(&server, "hailing", 2, listing_page(&server.uri(), &[])).await;
    mount_search(&server, "gaogang", 1, listing_page(&server.uri(), &[])).await;
    mount_detail(&server, "acme", "Hailing, Taizhou").await;

    let mut trawler = Trawler::from_config(config.clone()).unwrap();
    let summaries = trawler.run(RunOptions::default()).await.expect("Run failed");
    assert_eq!(summaries[1].units_complete, 2);
    assert_eq!(summaries[1].units_not_started, 0);
    assert!(summaries[1].is_finished());

    // Nothing is left to fetch on a rerun
    let summaries = trawler.run(RunOptions::default()).await.expect("Rerun failed");
    assert!(summaries[1].is_finished());
    assert_eq!(summaries[1].records, 1);

    let details = load_details(&config, &trawler.taxonomy().fingerprint());
    assert_eq!(
        details.status(&UnitKey::new("gaogang", "Gaogang")),
        UnitStatus::Complete
    );
}
