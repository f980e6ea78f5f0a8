// tests/ingest_e2e.rs

mod common;

use std::sync::Arc;

use common::{FixtureServer, local_guard, rss, test_config};
use veille::models::{ContentStatus, Source, SourceKind, Watch, WatchKind};
use veille::pipeline::Ingestor;
use veille::services::{Fetcher, ScraperRegistry, UrlGuard};
use veille::storage::{ContentStore, LocalStorage, MemoryStore};

fn ingestor(store: Arc<dyn ContentStore>, guard: UrlGuard) -> Ingestor {
    let config = test_config();
    let fetcher = Arc::new(Fetcher::new(&config.fetcher, guard).unwrap());
    Ingestor::new(ScraperRegistry::standard(fetcher, &config.ingest), store, &config)
}

#[tokio::test]
async fn feed_run_creates_rows_and_alerts() {
    let server = FixtureServer::start().await;
    server.serve(
        "/feed.xml",
        "application/rss+xml",
        rss(&[
            ("Solar Update", "https://news.example.org/solar", "New solar farm"),
            ("Wind News", "https://news.example.org/wind", "Offshore turbines"),
        ]),
    );

    let store = Arc::new(MemoryStore::with_watches(vec![Watch::new(
        "u1",
        WatchKind::Keyword,
        "solar",
    )]));
    let ingestor = ingestor(store.clone(), local_guard());
    let sources = vec![Source::new("energy", server.url("/feed.xml"), SourceKind::Feed)];

    let stats = ingestor.run(&sources).await;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.scraped, 1);
    assert_eq!(stats.new_items, 2);

    let solar = store
        .content_by_url("https://news.example.org/solar")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(solar.title, "Solar Update");
    assert_eq!(solar.status, ContentStatus::New);

    let alerts = store.alerts_for_user("u1", false).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].content_id, Some(solar.id));

    // identical second run
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let again = ingestor.run(&sources).await;
    assert_eq!(again.new_items, 0);
    assert_eq!(again.changed_items, 0);
    assert_eq!(store.alerts_for_user("u1", false).await.unwrap().len(), 1);

    let rechecked = store
        .content_by_url("https://news.example.org/solar")
        .await
        .unwrap()
        .unwrap();
    assert!(rechecked.last_checked > solar.last_checked);
    assert_eq!(rechecked.last_changed, solar.last_changed);
}

#[tokio::test]
async fn changed_feed_item_is_reported() {
    let server = FixtureServer::start().await;
    server.serve(
        "/feed.xml",
        "application/rss+xml",
        rss(&[("Solar Update", "https://news.example.org/solar", "Draft")]),
    );

    let store = Arc::new(MemoryStore::new());
    let ingestor = ingestor(store.clone(), local_guard());
    let sources = vec![Source::new("energy", server.url("/feed.xml"), SourceKind::Feed)];
    ingestor.run(&sources).await;
    let before = store
        .content_by_url("https://news.example.org/solar")
        .await
        .unwrap()
        .unwrap();

    server.serve(
        "/feed.xml",
        "application/rss+xml",
        rss(&[("Solar Update", "https://news.example.org/solar", "Final text")]),
    );
    let stats = ingestor.run(&sources).await;
    assert_eq!(stats.changed_items, 1);
    assert_eq!(stats.new_items, 0);

    let after = store
        .content_by_url("https://news.example.org/solar")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.body, "Final text");
    assert_ne!(after.content_hash, before.content_hash);
    assert!(after.last_changed >= before.last_changed);
    assert_eq!(after.first_seen, before.first_seen);
}

#[tokio::test]
async fn api_and_html_sources_ingest() {
    let server = FixtureServer::start().await;
    server.serve(
        "/api",
        "application/json",
        r#"{"data": {"items": [{"title": "Permit 12", "description": "Granted", "url": "https://registry.example.org/12"}]}}"#,
    );
    server.serve(
        "/page",
        "text/html",
        r#"<html><head><title>Notices</title></head><body><nav>Menu</nav><main><p>Hearing on Monday</p><a href="/notice/7">Notice 7</a></main></body></html>"#,
    );

    let store = Arc::new(MemoryStore::new());
    let ingestor = ingestor(store.clone(), local_guard());

    let mut api = Source::new("registry", server.url("/api"), SourceKind::StructuredApi);
    api.options.items_path = Some("data.items".into());
    let mut page = Source::new("council", server.url("/page"), SourceKind::Html);
    page.options.link_selector = Some("main a".into());

    let stats = ingestor.run(&[api, page]).await;
    assert_eq!(stats.scraped, 2);
    assert_eq!(stats.new_items, 3);

    let permit = store
        .content_by_url("https://registry.example.org/12")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(permit.body, "Granted");

    let page_row = store.content_by_url(&server.url("/page")).await.unwrap().unwrap();
    assert_eq!(page_row.title, "Notices");
    assert!(page_row.body.contains("Hearing on Monday"));
    assert!(!page_row.body.contains("Menu"));

    let link = store
        .content_by_url(&server.url("/notice/7"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.title, "Notice 7");
}

#[tokio::test]
async fn guarded_source_yields_nothing() {
    let server = FixtureServer::start().await;
    server.serve("/feed.xml", "application/rss+xml", rss(&[("Secret", "https://internal/x", "x")]));

    let store = Arc::new(MemoryStore::new());
    // default guard refuses loopback
    let ingestor = ingestor(store.clone(), UrlGuard::new());
    let stats = ingestor
        .run(&[Source::new("internal", server.url("/feed.xml"), SourceKind::Feed)])
        .await;

    assert_eq!(stats.scraped, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.new_items, 0);
    assert!(store.latest_content(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_page_counts_as_empty_scrape() {
    let server = FixtureServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let ingestor = ingestor(store.clone(), local_guard());

    let stats = ingestor
        .run(&[Source::new("gone", server.url("/missing.xml"), SourceKind::Feed)])
        .await;
    assert_eq!(stats.scraped, 1);
    assert_eq!(stats.new_items, 0);
}

#[tokio::test]
async fn linkless_entries_do_not_flip_between_runs() {
    let server = FixtureServer::start().await;
    let feed = r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Fixture</title><link>http://127.0.0.1/</link><description>d</description><item><title>First</title><description>one</description></item><item><title>Second</title><description>two</description></item></channel></rss>"#;
    server.serve("/feed.xml", "application/rss+xml", feed);

    let store = Arc::new(MemoryStore::new());
    let ingestor = ingestor(store.clone(), local_guard());
    let sources = vec![Source::new("energy", server.url("/feed.xml"), SourceKind::Feed)];

    let first = ingestor.run(&sources).await;
    assert_eq!((first.new_items, first.changed_items), (1, 0));
    for _ in 0..2 {
        let again = ingestor.run(&sources).await;
        assert_eq!((again.new_items, again.changed_items), (0, 0));
    }
    let rows = store.latest_content(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, server.url("/feed.xml"));
}

#[tokio::test]
async fn oversized_feed_still_yields_items() {
    let server = FixtureServer::start().await;
    let filler = "y".repeat(2_000);
    let items: Vec<(String, String, String)> = (0..400)
        .map(|i| (format!("Item {i}"), format!("https://news.example.org/{i}"), filler.clone()))
        .collect();
    let borrowed: Vec<(&str, &str, &str)> = items
        .iter()
        .map(|(t, l, d)| (t.as_str(), l.as_str(), d.as_str()))
        .collect();
    server.serve("/big.xml", "application/rss+xml", rss(&borrowed));

    let store = Arc::new(MemoryStore::new());
    let stats = ingestor(store.clone(), local_guard())
        .run(&[Source::new("big", server.url("/big.xml"), SourceKind::Feed)])
        .await;

    assert!(stats.new_items > 200);
    assert!(stats.new_items < 400);
    assert!(store.content_by_url("https://news.example.org/0").await.unwrap().is_some());
}

#[tokio::test]
async fn local_storage_persists_between_runs() {
    let tmp = tempfile::TempDir::new().unwrap();
    let server = FixtureServer::start().await;
    server.serve(
        "/feed.xml",
        "application/rss+xml",
        rss(&[("Solar Update", "https://news.example.org/solar", "Body")]),
    );
    let sources = vec![Source::new("energy", server.url("/feed.xml"), SourceKind::Feed)];

    let store = Arc::new(LocalStorage::open(tmp.path()).await.unwrap());
    let first = ingestor(store, local_guard()).run(&sources).await;
    assert_eq!(first.new_items, 1);

    let reopened = Arc::new(LocalStorage::open(tmp.path()).await.unwrap());
    let second = ingestor(reopened, local_guard()).run(&sources).await;
    assert_eq!(second.new_items, 0);
    assert_eq!(second.changed_items, 0);
}
