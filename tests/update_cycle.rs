//! End-to-end update cycle tests against a mock HTTP server.
//!
//! Each test gets its own scratch output directory and wiremock server, so
//! cycles can be driven repeatedly and the rendered pages inspected on disk.

use chrono::TimeZone;
use gazette::config::Config;
use gazette::engine::Aggregator;
use gazette::render::{Page, PageTemplate, RenderError};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss_feed(count: usize) -> String {
    let mut items = String::new();
    for i in 0..count {
        let date = chrono::Utc
            .timestamp_opt(1_700_000_000 + i as i64 * 3600, 0)
            .unwrap()
            .to_rfc2822();
        items.push_str(&format!(
            "<item><guid>guid-{i:03}</guid><title>item-{i:03}</title>\
             <link>https://example.com/{i}</link><pubDate>{date}</pubDate></item>"
        ));
    }
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test Feed</title>{items}</channel></rss>"#
    )
}

fn rss_response(count: usize) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(rss_feed(count))
        .insert_header("Content-Type", "application/xml")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gazette_cycle_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn test_config(dir: &Path, items_per_page: usize) -> Config {
    Config {
        output_dir: dir.to_path_buf(),
        fetch_timeout_secs: 5,
        update_interval_mins: 1,
        items_per_page,
        // The engine trusts the shell's clamping; zero keeps tests fast.
        min_domain_interval_secs: 0,
        template_file: None,
        opml_file: None,
    }
}

#[tokio::test]
async fn test_cycle_merges_items_from_all_feeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(rss_response(2))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(rss_response(3))
        .mount(&server)
        .await;

    let dir = scratch_dir("merges");
    let mut agg = Aggregator::new(&test_config(&dir, 100)).unwrap();
    agg.add_feed(&format!("{}/a", server.uri()), "A").unwrap();
    agg.add_feed(&format!("{}/b", server.uri()), "B").unwrap();

    let report = agg.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 2);
    // Same guids from two different feed URLs are distinct items.
    assert_eq!(report.merged, 5);
    assert!(report.failed.is_empty());
    assert_eq!(agg.history_len(), 5);
    assert!(dir.join("index.html").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_one_failing_feed_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(rss_response(2))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = scratch_dir("partial_failure");
    let mut agg = Aggregator::new(&test_config(&dir, 100)).unwrap();
    let good_url = format!("{}/good", server.uri());
    let bad_url = format!("{}/bad", server.uri());
    agg.add_feed(&good_url, "Good").unwrap();
    agg.add_feed(&bad_url, "Bad").unwrap();

    let report = agg.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.merged, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].url, bad_url);

    // Failure recorded on the source; success cleared state on the other.
    let sources = agg.sources();
    let good = sources.iter().find(|s| s.url == good_url).unwrap();
    let bad = sources.iter().find(|s| s.url == bad_url).unwrap();
    assert!(good.last_error.is_none());
    assert!(good.last_fetched_at.is_some());
    assert!(bad.last_error.as_deref().unwrap().contains("500"));
    assert!(bad.last_fetched_at.is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_refetch_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(rss_response(3))
        .mount(&server)
        .await;

    let dir = scratch_dir("idempotent");
    let mut agg = Aggregator::new(&test_config(&dir, 100)).unwrap();
    agg.add_feed(&format!("{}/feed", server.uri()), "Feed")
        .unwrap();

    let first = agg.run_cycle().await.unwrap();
    assert_eq!(first.merged, 3);

    let second = agg.run_cycle().await.unwrap();
    assert_eq!(second.fetched, 1);
    assert_eq!(second.merged, 0);
    assert_eq!(agg.history_len(), 3);

    let _ = std::fs::remove_dir_all(&dir);
}

struct FailingTemplate;

impl PageTemplate for FailingTemplate {
    fn render(&self, _page: &Page<'_>) -> Result<String, RenderError> {
        Err(RenderError::Template("render exploded".to_string()))
    }
}

#[tokio::test]
async fn test_render_failure_fails_cycle_but_keeps_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(rss_response(3))
        .mount(&server)
        .await;

    let dir = scratch_dir("render_failure");
    let mut agg =
        Aggregator::with_template(&test_config(&dir, 100), Box::new(FailingTemplate)).unwrap();
    agg.add_feed(&format!("{}/feed", server.uri()), "Feed")
        .unwrap();

    let err = agg.run_cycle().await.unwrap_err();
    assert!(matches!(err, RenderError::Template(_)));
    // The merge already happened; the next cycle retries from this state.
    assert_eq!(agg.history_len(), 3);

    let err = agg.run_cycle().await.unwrap_err();
    assert!(matches!(err, RenderError::Template(_)));
    assert_eq!(agg.history_len(), 3);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_last_fetched_at_is_per_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(rss_response(1))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(rss_response(1).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;

    let dir = scratch_dir("timestamps");
    let mut agg = Aggregator::new(&test_config(&dir, 100)).unwrap();
    let fast_url = format!("{}/fast", server.uri());
    let slow_url = format!("{}/slow", server.uri());
    agg.add_feed(&fast_url, "Fast").unwrap();
    agg.add_feed(&slow_url, "Slow").unwrap();

    agg.run_cycle().await.unwrap();

    let sources = agg.sources();
    let fast = sources.iter().find(|s| s.url == fast_url).unwrap();
    let slow = sources.iter().find(|s| s.url == slow_url).unwrap();
    // Each feed is stamped when its own fetch completes.
    assert!(slow.last_fetched_at.unwrap() > fast.last_fetched_at.unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_empty_registry_renders_empty_index() {
    let dir = scratch_dir("empty");
    let mut agg = Aggregator::new(&test_config(&dir, 2)).unwrap();

    let report = agg.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert!(report.failed.is_empty());
    assert!(dir.join("index.html").exists());
    assert!(!dir.join("page1.html").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_pagination_scenario_across_cycles() {
    let server = MockServer::start().await;

    // The feed grows across cycles: 5 items, then 6, then 8.
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(rss_response(5))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(rss_response(6))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(rss_response(8))
        .mount(&server)
        .await;

    let dir = scratch_dir("pagination");
    let mut agg = Aggregator::new(&test_config(&dir, 2)).unwrap();
    agg.add_feed(&format!("{}/feed", server.uri()), "Feed")
        .unwrap();

    // Cycle 1: five items — index only, no archive yet.
    agg.run_cycle().await.unwrap();
    assert!(dir.join("index.html").exists());
    assert!(!dir.join("page1.html").exists());

    // Cycle 2: sixth item tips the index past 2x items-per-page; the two
    // oldest items are archived into page 1.
    let report = agg.run_cycle().await.unwrap();
    assert_eq!(report.merged, 1);
    let page1 = std::fs::read_to_string(dir.join("page1.html")).unwrap();
    assert!(page1.contains("item-000"));
    assert!(page1.contains("item-001"));
    assert!(!page1.contains("item-002"));
    let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(index.contains("item-005"));
    assert!(!index.contains("item-001"));

    // Cycle 3: two more items; page 2 appears, page 1 is untouched bytes.
    agg.run_cycle().await.unwrap();
    let page2 = std::fs::read_to_string(dir.join("page2.html")).unwrap();
    assert!(page2.contains("item-002"));
    assert!(page2.contains("item-003"));
    let page1_after = std::fs::read_to_string(dir.join("page1.html")).unwrap();
    assert_eq!(page1, page1_after);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_opml_import_then_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(rss_response(1))
        .mount(&server)
        .await;

    let dir = scratch_dir("opml");
    let mut agg = Aggregator::new(&test_config(&dir, 100)).unwrap();

    // Loopback URLs are screened out of untrusted OPML; public ones import.
    let opml = format!(
        r#"<?xml version="1.0"?><opml version="2.0"><body>
            <outline title="Public" xmlUrl="https://feeds.example.com/rss"/>
            <outline title="Loopback" xmlUrl="{}/feed"/>
        </body></opml>"#,
        server.uri()
    );
    let imported = agg.import_opml(&opml).unwrap();
    assert_eq!(imported, 1);
    assert_eq!(agg.feed_count(), 1);
    assert_eq!(agg.sources()[0].url, "https://feeds.example.com/rss");

    let _ = std::fs::remove_dir_all(&dir);
}
