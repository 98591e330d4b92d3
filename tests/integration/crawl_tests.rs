//! Integration tests for the download engine
//!
//! Most scenarios run against an in-memory transport that counts requests;
//! the last ones use wiremock to exercise the real HTTP transport end-to-end.

use async_trait::async_trait;
use comic_dl::config::HttpConfig;
use comic_dl::crawler::parser::{attr, selector};
use comic_dl::crawler::{FetchError, HttpTransport, RetryPolicy, Transport};
use comic_dl::sites::{Crawler, ExtractError};
use comic_dl::state::{FileJob, JobStatus, PageJob, QueueState, RelativePath};
use comic_dl::storage::{load_snapshot, save_snapshot, state_file, StorageError};
use comic_dl::{ComicError, CrawlerRegistry, Engine};
use reqwest::header::HeaderMap;
use scraper::Html;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Follows `a.next` links and downloads `img[data-path]` images
struct TestCrawler {
    domain: &'static str,
}

impl Crawler for TestCrawler {
    fn name(&self) -> &'static str {
        "test"
    }

    fn domain(&self) -> &str {
        self.domain
    }

    fn extract_pages(&self, document: &Html, page_url: &Url) -> Result<Vec<PageJob>, ExtractError> {
        let mut pages = Vec::new();
        for a in document.select(&selector("a.next")?) {
            let href = attr(a, "href")?;
            let url = page_url
                .join(href)
                .map_err(|_| ExtractError::InvalidUrl(href.to_string()))?;
            pages.push(PageJob::new(url));
        }
        Ok(pages)
    }

    fn extract_files(&self, document: &Html, page_url: &Url) -> Result<Vec<FileJob>, ExtractError> {
        let mut files = Vec::new();
        for img in document.select(&selector("img[data-path]")?) {
            let src = attr(img, "src")?;
            let url = page_url
                .join(src)
                .map_err(|_| ExtractError::InvalidUrl(src.to_string()))?;
            files.push(FileJob::new(url, RelativePath::parse(attr(img, "data-path")?)?));
        }
        Ok(files)
    }
}

fn registry(domain: &'static str) -> CrawlerRegistry {
    let mut registry = CrawlerRegistry::new();
    registry.register(TestCrawler { domain });
    registry
}

/// In-memory site that counts requests per URL
///
/// Optionally signals `trigger` once a given URL has been served, after a
/// short pause, to simulate a shutdown request arriving mid-run.
#[derive(Default)]
struct StubTransport {
    bodies: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
    trigger: Option<(String, Arc<Notify>)>,
}

impl StubTransport {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    fn signal_after(mut self, url: &str, notify: Arc<Notify>) -> Self {
        self.trigger = Some((url.to_string(), notify));
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, url: &Url, _headers: &HeaderMap) -> Result<Vec<u8>, FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;

        if let Some((trigger_url, notify)) = &self.trigger {
            if trigger_url == url.as_str() {
                notify.notify_one();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }

        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

const CH1: &str = "https://example.com/ch1";
const CH2: &str = "https://example.com/ch2";
const IMG1: &str = "https://example.com/img1.jpg";

fn comic_site() -> StubTransport {
    StubTransport::default()
        .with(
            CH1,
            r#"<html><body>
               <img src="/img1.jpg" data-path="ch1/001.jpg">
               <a class="next" href="/ch2">next</a>
               </body></html>"#,
        )
        .with(CH2, "<html><body><p>to be continued</p></body></html>")
        .with(IMG1, "JPEGDATA")
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 2,
        delay: Duration::from_millis(10),
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn test_two_chapter_download() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("output");
    let transport = Arc::new(comic_site());

    let engine = Engine::start(
        &registry("example.com"),
        url(CH1),
        &output,
        transport.clone(),
        fast_retry(),
    )
    .unwrap();
    let summary = engine.run(1).await.unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.stats.pages_parsed, 2);
    assert_eq!(summary.stats.files_downloaded, 1);
    assert_eq!(summary.stats.jobs_failed, 0);
    assert_eq!(
        std::fs::read(output.join("ch1").join("001.jpg")).unwrap(),
        b"JPEGDATA"
    );
    assert_eq!(transport.hits(CH1), 1);
    assert_eq!(transport.hits(CH2), 1);
    assert_eq!(transport.hits(IMG1), 1);
    assert!(engine.queue().is_quiescent());

    let state = load_snapshot(&output).unwrap().state;
    assert_eq!(state.len(), 3);
    assert!(state.values().all(|status| status.is_done()));
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_refetching() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("output");
    let shutdown = Arc::new(Notify::new());
    let transport = Arc::new(comic_site().signal_after(CH1, shutdown.clone()));

    let engine = Engine::start(
        &registry("example.com"),
        url(CH1),
        &output,
        transport.clone(),
        fast_retry(),
    )
    .unwrap();
    let summary = engine
        .run_until(1, async move { shutdown.notified().await })
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.stats.pages_parsed, 1);
    assert!(!output.join("ch1").join("001.jpg").exists());

    let state = load_snapshot(&output).unwrap().state;
    assert_eq!(state.get(&PageJob::new(url(CH1)).into()), Some(&JobStatus::Done));
    assert_eq!(
        state.get(&PageJob::new(url(CH2)).into()),
        Some(&JobStatus::Pending)
    );
    assert_eq!(state.values().filter(|status| status.is_pending()).count(), 2);

    let resumed = Engine::load(
        &registry("example.com"),
        &output,
        transport.clone(),
        fast_retry(),
    )
    .unwrap();
    let summary = resumed.run(1).await.unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.stats.files_downloaded, 1);
    assert_eq!(
        std::fs::read(output.join("ch1").join("001.jpg")).unwrap(),
        b"JPEGDATA"
    );
    assert_eq!(transport.hits(CH1), 1);
    assert_eq!(transport.hits(CH2), 1);
    assert_eq!(transport.hits(IMG1), 1);

    let state = load_snapshot(&output).unwrap().state;
    assert!(state.values().all(|status| status.is_done()));
}

#[tokio::test]
async fn test_repeated_resume_fetches_files_once() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(comic_site());

    Engine::start(
        &registry("example.com"),
        url(CH1),
        dir.path(),
        transport.clone(),
        fast_retry(),
    )
    .unwrap()
    .run(2)
    .await
    .unwrap();

    // Nothing is pending, so resume restarts from the first page; what it
    // finds there is already known
    let summary = Engine::load(
        &registry("example.com"),
        dir.path(),
        transport.clone(),
        fast_retry(),
    )
    .unwrap()
    .run(2)
    .await
    .unwrap();

    assert_eq!(summary.stats.pages_parsed, 1);
    assert_eq!(transport.hits(CH1), 2);
    assert_eq!(transport.hits(IMG1), 1);
}

#[tokio::test]
async fn test_resume_with_single_pending_page() {
    let dir = TempDir::new().unwrap();
    let mut state = QueueState::new();
    state.insert(PageJob::new(url(CH1)).into(), JobStatus::Pending);
    save_snapshot(dir.path(), &state).unwrap();

    let transport = Arc::new(comic_site());
    let engine = Engine::load(
        &registry("example.com"),
        dir.path(),
        transport.clone(),
        fast_retry(),
    )
    .unwrap();

    assert_eq!(engine.queue().pending_len(), 1);
    let summary = engine.run(3).await.unwrap();

    assert_eq!(summary.stats.pages_parsed, 2);
    assert_eq!(transport.hits(CH1), 1);
    assert!(dir.path().join("ch1").join("001.jpg").exists());
}

#[tokio::test]
async fn test_download_refuses_existing_snapshot() {
    let dir = TempDir::new().unwrap();
    save_snapshot(dir.path(), &QueueState::new()).unwrap();

    let result = Engine::start(
        &registry("example.com"),
        url(CH1),
        dir.path(),
        Arc::new(comic_site()),
        fast_retry(),
    );
    assert!(matches!(result, Err(ComicError::SnapshotExists(_))));
}

#[tokio::test]
async fn test_unsupported_site_is_rejected_before_any_work() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(comic_site());

    let result = Engine::start(
        &registry("example.com"),
        url("https://unknown.test/ch1"),
        dir.path(),
        transport.clone(),
        fast_retry(),
    );

    assert!(matches!(result, Err(ComicError::NoCrawlerAvailable { .. })));
    assert!(!state_file(dir.path()).exists());
    assert_eq!(transport.hits("https://unknown.test/ch1"), 0);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let path = state_file(dir.path());
    std::fs::write(&path, "{ truncated").unwrap();

    let result = Engine::load(
        &registry("example.com"),
        dir.path(),
        Arc::new(comic_site()),
        fast_retry(),
    );

    assert!(matches!(
        result,
        Err(ComicError::Storage(StorageError::Corrupt { .. }))
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ truncated");
}

#[tokio::test]
async fn test_http_transport_fetches_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
    let url = url(&format!("{}/page", mock_server.uri()));
    let body = transport.fetch(&url, &HeaderMap::new()).await.unwrap();

    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn test_http_status_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
    let url = url(&format!("{}/missing", mock_server.uri()));
    let result = comic_dl::crawler::fetch_with_retry(
        &transport,
        &url,
        &HeaderMap::new(),
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(10),
        },
    )
    .await;

    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_full_download_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/ch1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><body>
                    <img src="/img/1.png" data-path="ch1/001.png">
                    <img src="/img/2.png" data-path="ch1/002.png">
                    <a class="next" href="/ch2">next</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ch2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><body>
                    <img src="/img/3.png" data-path="ch2/001.png">
                    <a class="next" href="/ch1">back</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    for image in ["1", "2", "3"] {
        Mock::given(method("GET"))
            .and(path(format!("/img/{}.png", image)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(image.as_bytes().to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let transport = Arc::new(HttpTransport::new(&HttpConfig::default()).unwrap());
    let engine = Engine::start(
        &registry("127.0.0.1"),
        url(&format!("{}/ch1", base_url)),
        dir.path(),
        transport,
        fast_retry(),
    )
    .unwrap();

    let summary = engine.run(3).await.unwrap();

    assert_eq!(summary.stats.pages_parsed, 2);
    assert_eq!(summary.stats.files_downloaded, 3);
    assert_eq!(
        std::fs::read(dir.path().join("ch1").join("002.png")).unwrap(),
        b"2"
    );
    assert_eq!(
        std::fs::read(dir.path().join("ch2").join("001.png")).unwrap(),
        b"3"
    );
}
