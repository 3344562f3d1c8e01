use mockito::{Matcher, Mock, ServerGuard};
use skillstat::{
    config::{HarvestConfig, PacingPolicy},
    export,
    harvest::Harvester,
    HarvestError,
};
use std::time::{Duration, Instant};

fn test_config(server: &ServerGuard, queries: &[&str], pages: u32) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.queries = queries.iter().map(|q| q.to_string()).collect();
    config.pages_per_query = pages;
    config.api.listing_endpoint = format!("{}/vacancies", server.url());
    config.api.detail_endpoint = format!("{}/vacancies", server.url());
    config.pacing = PacingPolicy::none();
    config.report.show_progress = false;
    config
}

async fn listing(
    server: &mut ServerGuard,
    query: &str,
    page: u32,
    status: usize,
    body: &str,
) -> Mock {
    server
        .mock("GET", "/vacancies")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("text".into(), query.into()),
            Matcher::UrlEncoded("page".into(), page.to_string()),
            Matcher::UrlEncoded("per_page".into(), "20".into()),
        ]))
        .with_status(status)
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

async fn detail(
    server: &mut ServerGuard,
    id: &str,
    status: usize,
    body: &str,
    hits: usize,
) -> Mock {
    server
        .mock("GET", format!("/vacancies/{}", id).as_str())
        .with_status(status)
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn test_full_harvest_workflow() {
    let mut server = mockito::Server::new_async().await;

    let pages = vec![
        listing(&mut server, "rust", 0, 200, r#"{"items":[{"id":"1"},{"id":"2"}]}"#).await,
        listing(&mut server, "rust", 1, 200, r#"{"items":[{"id":"3"}]}"#).await,
        // The same posting comes back for another query and is counted again.
        listing(&mut server, "go", 0, 200, r#"{"items":[{"id":"1"},{"id":null}]}"#).await,
        listing(&mut server, "go", 1, 200, r#"{"items":null}"#).await,
    ];
    let details = vec![
        detail(&mut server, "1", 200, r#"{"key_skills":[{"name":"SQL"},{"name":"Git"}]}"#, 2).await,
        detail(
            &mut server,
            "2",
            200,
            r#"{"key_skills":[{"name":"Git"},{"name":"SQL"},{"name":"SQL"}]}"#,
            1,
        )
        .await,
        detail(&mut server, "3", 500, "", 1).await,
    ];

    let harvester = Harvester::new(test_config(&server, &["rust", "go"], 2)).unwrap();
    let run = harvester.run().await.unwrap();

    // Four detail fetches were started, one of them failed.
    assert_eq!(run.total_count, 4);
    assert_eq!(run.stats.details_attempted, 4);
    assert_eq!(run.stats.details_failed, 1);
    assert_eq!(run.stats.pages_requested, 4);
    assert_eq!(run.stats.pages_failed, 0);

    assert_eq!(run.table.get("SQL"), Some(4));
    assert_eq!(run.table.get("Git"), Some(3));

    let report = run.report(20);
    assert_eq!(report.distinct_skills, 2);
    assert_eq!(report.entries[0].name, "SQL");
    assert_eq!(report.entries[0].percent, 100.0);
    assert_eq!(report.entries[1].name, "Git");
    assert_eq!(report.entries[1].percent, 75.0);

    for mock in pages.iter().chain(details.iter()) {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_forbidden_page_backs_off_and_continues() {
    let mut server = mockito::Server::new_async().await;

    let forbidden = listing(&mut server, "rust", 0, 403, r#"{"errors":[{"type":"forbidden"}]}"#).await;
    let ok = listing(&mut server, "rust", 1, 200, r#"{"items":[{"id":"9"}]}"#).await;
    let vacancy = detail(&mut server, "9", 200, r#"{"key_skills":[{"name":"Rust"}]}"#, 1).await;

    let mut config = test_config(&server, &["rust"], 2);
    config.pacing.forbidden_backoff_ms = 300;
    let harvester = Harvester::new(config).unwrap();

    let start = Instant::now();
    let run = harvester.run().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(run.stats.pages_failed, 1);
    assert_eq!(run.total_count, 1);
    assert_eq!(run.table.get("Rust"), Some(1));

    forbidden.assert_async().await;
    ok.assert_async().await;
    vacancy.assert_async().await;
}

#[tokio::test]
async fn test_no_items_gives_empty_report() {
    let mut server = mockito::Server::new_async().await;
    let _page = listing(&mut server, "rust", 0, 200, r#"{"items":[]}"#).await;

    let harvester = Harvester::new(test_config(&server, &["rust"], 1)).unwrap();
    let report = harvester.harvest().await.unwrap();

    assert_eq!(report.total_count, 0);
    assert!(report.entries.is_empty());
}

#[tokio::test]
async fn test_malformed_listing_aborts_run() {
    let mut server = mockito::Server::new_async().await;
    let _page = listing(&mut server, "rust", 0, 200, "<html>maintenance</html>").await;

    let harvester = Harvester::new(test_config(&server, &["rust"], 1)).unwrap();
    let result = harvester.run().await;

    assert!(matches!(result, Err(HarvestError::Parse { .. })));
}

#[tokio::test]
async fn test_harvest_to_csv() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = vec![
        listing(&mut server, "rust", 0, 200, r#"{"items":[{"id":"1"},{"id":"2"}]}"#).await,
        detail(&mut server, "1", 200, r#"{"key_skills":[{"name":"Rust"},{"name":"Tokio"}]}"#, 1).await,
        detail(&mut server, "2", 200, r#"{"key_skills":[{"name":"Rust"}]}"#, 1).await,
    ];

    let harvester = Harvester::new(test_config(&server, &["rust"], 1)).unwrap();
    let report = harvester.harvest().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("competencies.csv");
    export::write_csv(&path, &report.entries).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content.lines().collect::<Vec<_>>(),
        vec![
            "skill,mention_count,frequency_percent,source",
            "Rust,2,100.00,hh.ru",
            "Tokio,1,50.00,hh.ru",
        ]
    );
}

#[tokio::test]
async fn test_malformed_detail_aborts_run() {
    let mut server = mockito::Server::new_async().await;
    let mocks = vec![
        listing(&mut server, "rust", 0, 200, r#"{"items":[{"id":"1"},{"id":"2"}]}"#).await,
        detail(&mut server, "1", 200, "<html>nope</html>", 1).await,
        detail(&mut server, "2", 200, r#"{"key_skills":[{"name":"Rust"}]}"#, 0).await,
    ];

    let harvester = Harvester::new(test_config(&server, &["rust"], 1)).unwrap();
    let result = harvester.harvest().await;

    match result {
        Err(HarvestError::Parse { context, .. }) => assert_eq!(context, "vacancy 1"),
        other => panic!("expected a parse error, got {:?}", other.map(|r| r.total_count)),
    }
    for mock in &mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_forbidden_detail_backs_off_and_counts_failure() {
    let mut server = mockito::Server::new_async().await;
    let mocks = vec![
        listing(&mut server, "rust", 0, 200, r#"{"items":[{"id":"4"}]}"#).await,
        detail(&mut server, "4", 403, "", 1).await,
    ];

    let mut config = test_config(&server, &["rust"], 1);
    config.pacing.forbidden_backoff_ms = 300;
    let harvester = Harvester::new(config).unwrap();

    let start = Instant::now();
    let run = harvester.run().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(run.table.is_empty());
    assert_eq!(run.total_count, 1);
    assert_eq!(run.stats.details_failed, 1);
    for mock in &mocks {
        mock.assert_async().await;
    }
}
