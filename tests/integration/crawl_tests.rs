//! Whole-crawl tests against scripted in-memory capabilities

use crate::common::{create_test_config, links_to, FailingExtractor, ScriptedFetcher};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sumi_crawl::config::Config;
use sumi_crawl::crawler::{
    Coordinator, ExtractError, FetchError, Fetcher, HtmlLinkExtractor, LinkExtractor,
    MemorySink, Page,
};
use sumi_crawl::{CrawlReport, CrawlState, ErrorKind};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Answers every URL as if it had been redirected to `served_from`
struct RedirectingFetcher {
    served_from: Url,
}

#[async_trait]
impl Fetcher for RedirectingFetcher {
    async fn fetch(&self, _url: &Url) -> Result<Page, FetchError> {
        Ok(Page {
            final_url: self.served_from.clone(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: r#"<a href="/more">more</a>"#.to_string(),
        })
    }
}

/// Gives up on every fetch as a cancelled one
struct AbortingFetcher;

#[async_trait]
impl Fetcher for AbortingFetcher {
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        Err(FetchError::cancelled(format!("fetch of {} aborted", url)))
    }
}

/// Raises cancellation while extracting, then extracts normally
struct CancellingExtractor {
    cancel: CancellationToken,
}

impl LinkExtractor for CancellingExtractor {
    fn extract_links(&self, page: &Page) -> Result<Vec<String>, ExtractError> {
        self.cancel.cancel();
        HtmlLinkExtractor.extract_links(page)
    }
}

fn page(url: &str, body: &str) -> (String, String) {
    (url.to_string(), body.to_string())
}

async fn run_crawl(
    config: Config,
    fetcher: Arc<ScriptedFetcher>,
    extractor: Arc<dyn LinkExtractor>,
) -> (CrawlReport, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, fetcher, extractor, sink.clone())
        .expect("Failed to create coordinator");
    let report = coordinator.run().await.expect("Crawl failed");
    (report, sink)
}

#[tokio::test]
async fn test_crawl_fetches_each_page_once() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        page(
            "https://a.test/",
            r#"<a href="/b">B</a> <a href="/c">C</a> <a href="https://a.test/">home</a>"#,
        ),
        page("https://a.test/b", r#"<a href="/c">C</a> <a href="/">home</a>"#),
        page("https://a.test/c", r#"<a href="/b#section">B</a>"#),
    ]));

    let (report, sink) = run_crawl(
        create_test_config(vec!["https://a.test/".to_string()], 5),
        fetcher.clone(),
        Arc::new(HtmlLinkExtractor),
    )
    .await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.visited, 3);
    assert_eq!(report.successes, 3);
    assert_eq!(report.failures, 0);
    assert_eq!(report.abandoned, 0);

    let mut fetched = fetcher.fetched();
    fetched.sort();
    assert_eq!(
        fetched,
        vec!["https://a.test/", "https://a.test/b", "https://a.test/c"]
    );
    assert_eq!(sink.len(), 3);
}

#[tokio::test]
async fn test_max_depth_zero_fetches_only_seeds() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        page("https://a.test/", r#"<a href="/b">B</a>"#),
        page("https://a.test/b", "<p>B</p>"),
    ]));

    let (report, _) = run_crawl(
        create_test_config(vec!["https://a.test/".to_string()], 0),
        fetcher.clone(),
        Arc::new(HtmlLinkExtractor),
    )
    .await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.visited, 1);
    assert_eq!(report.successes, 1);
    assert_eq!(fetcher.fetched(), vec!["https://a.test/"]);
    // links are still reported even when they are too deep to follow
    assert_eq!(report.links_discovered, 1);
}

#[tokio::test]
async fn test_depth_limit_stops_at_boundary() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        page("https://a.test/", r#"<a href="/1">1</a>"#),
        page("https://a.test/1", r#"<a href="/2">2</a>"#),
        page("https://a.test/2", r#"<a href="/3">3</a>"#),
        page("https://a.test/3", "<p>end</p>"),
    ]));

    let (report, _) = run_crawl(
        create_test_config(vec!["https://a.test/".to_string()], 2),
        fetcher.clone(),
        Arc::new(HtmlLinkExtractor),
    )
    .await;

    assert_eq!(report.visited, 3);
    assert!(!fetcher.fetched().contains(&"https://a.test/3".to_string()));
}

#[tokio::test]
async fn test_fetch_failure_is_a_result() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![]));

    let (report, sink) = run_crawl(
        create_test_config(vec!["https://unreachable.test/".to_string()], 3),
        fetcher,
        Arc::new(HtmlLinkExtractor),
    )
    .await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.visited, 1);
    assert_eq!(report.successes, 0);
    assert_eq!(report.failures, 1);
    assert_eq!(report.failures_of(ErrorKind::Network), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_failures_do_not_stop_the_crawl() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        page(
            "https://a.test/",
            r#"<a href="/missing">x</a> <a href="/ok">ok</a>"#,
        ),
        page("https://a.test/ok", "<p>fine</p>"),
    ]));

    let (report, _) = run_crawl(
        create_test_config(vec!["https://a.test/".to_string()], 1),
        fetcher,
        Arc::new(HtmlLinkExtractor),
    )
    .await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.successes, 2);
    assert_eq!(report.failures_of(ErrorKind::Network), 1);
    assert_eq!(report.resolved(), report.visited as u64);
}

#[tokio::test]
async fn test_slow_fetch_times_out() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(vec![page("https://slow.test/", "<p>late</p>")])
            .with_delay(Duration::from_secs(5)),
    );
    let mut config = create_test_config(vec!["https://slow.test/".to_string()], 1);
    config.crawler.fetch_timeout_ms = 50;

    let (report, sink) = run_crawl(config, fetcher, Arc::new(HtmlLinkExtractor)).await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.failures_of(ErrorKind::Timeout), 1);
    assert!(sink.is_empty());
    assert!(report.elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn test_extractor_failure_is_parse_error() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![page(
        "https://a.test/",
        r#"<a href="/b">B</a>"#,
    )]));

    let (report, sink) = run_crawl(
        create_test_config(vec!["https://a.test/".to_string()], 3),
        fetcher,
        Arc::new(FailingExtractor),
    )
    .await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.visited, 1);
    assert_eq!(report.failures_of(ErrorKind::Parse), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_out_of_scope_links_are_not_fetched() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        page(
            "https://a.test/",
            r#"<a href="https://b.test/x">b</a> <a href="/in">in</a>"#,
        ),
        page("https://a.test/in", "<p>in</p>"),
        page("https://b.test/x", "<p>out</p>"),
    ]));
    let mut config = create_test_config(vec!["https://a.test/".to_string()], 2);
    config.scope.allowed_domains = vec!["a.test".to_string()];

    let (report, _) = run_crawl(config, fetcher.clone(), Arc::new(HtmlLinkExtractor)).await;

    assert_eq!(report.successes, 2);
    assert_eq!(report.failures_of(ErrorKind::DisallowedDomain), 1);
    assert!(!fetcher.fetched().contains(&"https://b.test/x".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_domain_parallelism_never_exceeded() {
    let a_pages: Vec<String> = (0..10).map(|i| format!("https://a.test/p{}", i)).collect();
    let b_pages: Vec<String> = (0..10).map(|i| format!("https://b.test/p{}", i)).collect();
    let targets: Vec<String> = a_pages.iter().chain(b_pages.iter()).cloned().collect();

    let mut pages = vec![page("https://a.test/", &links_to(&targets))];
    for url in &targets {
        pages.push(page(url, "<p>leaf</p>"));
    }
    let fetcher = Arc::new(ScriptedFetcher::new(pages).with_delay(Duration::from_millis(30)));

    let mut config = create_test_config(vec!["https://a.test/".to_string()], 1);
    config.crawler.workers = 8;
    config.crawler.per_domain_parallelism = 2;

    let (report, _) = run_crawl(config, fetcher.clone(), Arc::new(HtmlLinkExtractor)).await;

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.successes, 21);
    assert!(fetcher.peak_for("a.test") <= 2);
    assert!(fetcher.peak_for("b.test") <= 2);
    assert!(fetcher.peak_total() <= 8);
    assert_eq!(report.requests_by_domain.get("a.test"), Some(&11));
    assert_eq!(report.requests_by_domain.get("b.test"), Some(&10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_mid_run_stops_new_fetches() {
    let domains = ["a.test", "b.test", "c.test", "d.test"];
    let targets: Vec<String> = (0..40)
        .map(|i| format!("https://{}/p{}", domains[i % domains.len()], i))
        .collect();

    let mut pages = vec![page("https://hub.test/", &links_to(&targets))];
    for url in &targets {
        pages.push(page(url, "<p>leaf</p>"));
    }
    let fetcher = Arc::new(ScriptedFetcher::new(pages).with_delay(Duration::from_millis(100)));

    let mut config = create_test_config(vec!["https://hub.test/".to_string()], 1);
    config.crawler.workers = 2;
    config.crawler.per_domain_parallelism = 1;

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(
        config,
        fetcher.clone(),
        Arc::new(HtmlLinkExtractor),
        sink.clone(),
    )
    .unwrap();

    let cancel = coordinator.cancel_token();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
        Instant::now()
    });

    let report = coordinator.run().await.unwrap();
    let cancelled_at = canceller.await.unwrap();
    let finished_at = Instant::now();

    assert_eq!(report.state, CrawlState::Cancelled);
    assert!(report.abandoned > 0);

    // in-flight fetches finish, but nothing new starts after the signal
    let late = fetcher
        .call_times()
        .into_iter()
        .filter(|at| *at > cancelled_at + Duration::from_millis(20))
        .count();
    assert_eq!(late, 0);
    assert!(finished_at.duration_since(cancelled_at) < Duration::from_millis(600));

    // every dispatched task resolved; everything else was abandoned
    assert_eq!(report.resolved(), fetcher.fetched().len() as u64);
    assert_eq!(report.visited as u64, report.resolved() + report.abandoned as u64);
}

#[tokio::test]
async fn test_crawl_helper_honors_external_token() {
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();

    // the HTTP fetcher is never reached: cancellation wins before dispatch
    let report = sumi_crawl::crawler::crawl(
        create_test_config(vec!["http://127.0.0.1:9/".to_string()], 1),
        cancel,
    )
    .await
    .unwrap();

    assert_eq!(report.state, CrawlState::Cancelled);
    assert_eq!(report.resolved(), 0);
    assert_eq!(report.abandoned, 1);
}

#[tokio::test]
async fn test_page_served_from_blocked_domain_rejected() {
    let fetcher = Arc::new(RedirectingFetcher {
        served_from: Url::parse("https://tracker.test/landing").unwrap(),
    });
    let mut config = create_test_config(vec!["https://a.test/".to_string()], 2);
    config.scope.blocked_domains = vec!["tracker.test".to_string()];

    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(
        config,
        fetcher,
        Arc::new(HtmlLinkExtractor),
        sink.clone(),
    )
    .unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.visited, 1);
    assert_eq!(report.successes, 0);
    assert_eq!(report.failures_of(ErrorKind::DisallowedDomain), 1);
    assert_eq!(report.links_discovered, 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_cancelled_fetch_counted_by_kind() {
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(
        create_test_config(vec!["https://a.test/".to_string()], 1),
        Arc::new(AbortingFetcher),
        Arc::new(HtmlLinkExtractor),
        sink.clone(),
    )
    .unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.state, CrawlState::Done);
    assert_eq!(report.failures, 1);
    assert_eq!(report.failures_of(ErrorKind::Cancelled), 1);
    assert_eq!(report.failures_by_kind.len(), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_links_found_after_cancel_not_enqueued() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![page(
        "https://a.test/",
        r#"<a href="/b">B</a> <a href="/c">C</a> <a href="/d">D</a>"#,
    )]));

    let sink = Arc::new(MemorySink::new());
    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(
        create_test_config(vec!["https://a.test/".to_string()], 3),
        fetcher.clone(),
        Arc::new(CancellingExtractor {
            cancel: cancel.clone(),
        }),
        sink.clone(),
    )
    .unwrap()
    .with_cancel_token(cancel);
    let report = coordinator.run().await.unwrap();

    // the in-flight page still resolves, but none of its links enter the frontier
    assert_eq!(report.successes, 1);
    assert_eq!(report.links_discovered, 3);
    assert_eq!(report.visited, 1);
    assert_eq!(report.abandoned, 0);
    assert_eq!(fetcher.fetched(), vec!["https://a.test/"]);
    assert_eq!(sink.len(), 1);
}
