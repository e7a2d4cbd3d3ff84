//! End-to-end run tests: driver, orchestrator, pipeline, store, and parser
//! exercised together against a mock remote.

use std::sync::Arc;
use std::time::Duration;

use mangagrab_core::{
    EndChapter, FetchClient, FetchLimiter, MangaReaderParser, PageContext, RetryPolicy, RunDriver,
    RunReport, SeriesSource, SeriesStore,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Page markup in the structure the parser expects: a page selector whose
/// text ends in the total page count, and the image holder.
fn page_body(server_uri: &str, chapter: u32, page: u32, total: u32) -> String {
    format!(
        r##"<html><body>
<div id="selectpage"><select name="pages"></select> {page} of {total}</div>
<div id="imgholder"><a href="#"><img src="{server_uri}/cdn/{chapter}/p{page}.jpg"></a></div>
</body></html>"##
    )
}

/// Series page markup: the chapter listing is the third list, newest first.
fn series_body(latest: u32) -> String {
    format!(
        r#"<html><body>
<ul><li><a href="/">home</a></li></ul>
<ul><li><a href="/about">about</a></li></ul>
<ul><li><a href="/series/{latest}">Chapter {latest}</a></li><li><a href="/series/1">Chapter 1</a></li></ul>
</body></html>"#
    )
}

/// Mounts the page body and its image for one page of one chapter.
async fn mount_page(server: &MockServer, chapter: u32, page: u32, total: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/series/{chapter}/{page}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(&server.uri(), chapter, page, total)),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cdn/{chapter}/p{page}.jpg")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("b{page}").into_bytes()))
        .mount(server)
        .await;
}

fn test_context(tmp: &TempDir, max_attempts: u32) -> PageContext {
    PageContext {
        client: FetchClient::new(FetchLimiter::new(8).unwrap()),
        parser: Arc::new(MangaReaderParser::new().unwrap()),
        store: SeriesStore::open(tmp.path(), "Test Series", "Test").unwrap(),
        policy: RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        ),
        politeness_delay: Duration::ZERO,
        persist: true,
    }
}

async fn run_driver(tmp: &TempDir, server: &MockServer, end: EndChapter) -> RunReport {
    let ctx = test_context(tmp, 3);
    let source = SeriesSource::new(&server.uri(), "/series");
    RunDriver::new(ctx, source, end).run().await.unwrap()
}

#[tokio::test]
async fn test_fresh_store_downloads_single_chapter() {
    let server = MockServer::start().await;
    for page in 1..=3 {
        mount_page(&server, 1, page, 3).await;
    }

    let tmp = TempDir::new().unwrap();
    let report = run_driver(&tmp, &server, EndChapter::Fixed(1)).await;

    assert_eq!(report.initial_chapter, 1);
    assert_eq!(report.end_chapter, 1);
    assert_eq!(report.pages_completed, 3);
    assert!(report.missing_chapters.is_empty());
    assert!(report.abandoned_pages.is_empty());

    let chapter_dir = tmp.path().join("Test Series/Chapter 1");
    for page in 1..=3u32 {
        let file = chapter_dir.join(format!("Test.ch1.p{page:03}.jpg"));
        assert_eq!(
            std::fs::read(&file).unwrap(),
            format!("b{page}").into_bytes(),
            "unexpected contents at {}",
            file.display()
        );
    }
    // Exactly the three page files, nothing else.
    assert_eq!(std::fs::read_dir(&chapter_dir).unwrap().count(), 3);
}

#[tokio::test]
async fn test_resume_skips_completed_chapter_pages() {
    let server = MockServer::start().await;

    // Chapter 1 discovery still needs the first page body; the page pipelines
    // themselves must not fetch anything for chapter 1.
    Mock::given(method("GET"))
        .and(path("/series/1/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(&server.uri(), 1, 1, 2)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/series/1/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(&server.uri(), 1, 2, 2)),
        )
        .expect(0)
        .mount(&server)
        .await;
    for page in 1..=2 {
        Mock::given(method("GET"))
            .and(path(format!("/cdn/1/p{page}.jpg")))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    }
    for page in 1..=2 {
        mount_page(&server, 2, page, 2).await;
    }

    let tmp = TempDir::new().unwrap();
    {
        let store = SeriesStore::open(tmp.path(), "Test Series", "Test").unwrap();
        store.write_resource(1, 1, "jpg", b"old1").await.unwrap();
        store.write_resource(1, 2, "jpg", b"old2").await.unwrap();
    }

    let report = run_driver(&tmp, &server, EndChapter::Fixed(2)).await;

    assert_eq!(report.initial_chapter, 1);
    assert_eq!(report.end_chapter, 2);
    assert_eq!(report.pages_already_present, 2);
    assert_eq!(report.pages_completed, 2);

    // Chapter 1 files untouched, chapter 2 downloaded.
    assert_eq!(
        std::fs::read(tmp.path().join("Test Series/Chapter 1/Test.ch1.p001.jpg")).unwrap(),
        b"old1"
    );
    assert!(
        tmp.path()
            .join("Test Series/Chapter 2/Test.ch2.p002.jpg")
            .exists()
    );
}

#[tokio::test]
async fn test_latest_chapter_probe_and_missing_chapter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/series"))
        .respond_with(ResponseTemplate::new(200).set_body_string(series_body(3)))
        .mount(&server)
        .await;
    // Chapter 1 already archived; its discovery fetch still succeeds.
    Mock::given(method("GET"))
        .and(path("/series/1/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(page_body(&server.uri(), 1, 1, 1)),
        )
        .mount(&server)
        .await;
    mount_page(&server, 2, 1, 1).await;
    // Chapter 3 is listed but not mirrored yet.
    Mock::given(method("GET"))
        .and(path("/series/3/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    {
        let store = SeriesStore::open(tmp.path(), "Test Series", "Test").unwrap();
        store.write_resource(1, 1, "jpg", b"old").await.unwrap();
    }

    let report = run_driver(&tmp, &server, EndChapter::Discover).await;

    assert_eq!(report.initial_chapter, 1);
    assert_eq!(report.end_chapter, 3);
    assert_eq!(report.missing_chapters, vec![3]);
    assert_eq!(report.pages_completed, 1);
    assert_eq!(report.pages_already_present, 1);
    assert!(
        !tmp.path().join("Test Series/Chapter 3").exists(),
        "a 404 chapter must not create a directory"
    );
}

#[tokio::test]
async fn test_transient_failure_retried_and_counted_once() {
    let server = MockServer::start().await;

    // First fetch of the page body fails with 503, then recovers.
    Mock::given(method("GET"))
        .and(path("/series/1/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, 1, 1).await;

    let tmp = TempDir::new().unwrap();
    let report = run_driver(&tmp, &server, EndChapter::Fixed(1)).await;

    assert_eq!(report.pages_completed, 1);
    assert!(report.abandoned_pages.is_empty());
    assert_eq!(
        std::fs::read(tmp.path().join("Test Series/Chapter 1/Test.ch1.p001.jpg")).unwrap(),
        b"b1"
    );
}

#[tokio::test]
async fn test_abandoned_page_listed_in_report_and_log() {
    let server = MockServer::start().await;

    for page in 1..=2 {
        Mock::given(method("GET"))
            .and(path(format!("/series/1/{page}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_body(&server.uri(), 1, page, 2)),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/cdn/1/p1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"b1".to_vec()))
        .mount(&server)
        .await;
    // Page 2's resource never recovers.
    Mock::given(method("GET"))
        .and(path("/cdn/1/p2.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let ctx = test_context(&tmp, 2);
    let source = SeriesSource::new(&server.uri(), "/series");
    let report = RunDriver::new(ctx, source, EndChapter::Fixed(1))
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages_completed, 1);
    assert_eq!(report.abandoned_pages.len(), 1);
    assert_eq!(report.abandoned_pages[0].chapter, 1);
    assert_eq!(report.abandoned_pages[0].page, 2);
    assert!(report.abandoned_pages[0].last_error.contains("500"));

    // The summary also lands in the series log as JSON.
    let log = std::fs::read_to_string(tmp.path().join("Test Series/error.log")).unwrap();
    assert!(log.contains("\"abandoned_pages\""));
    assert!(log.contains("HTTP 500"));
}

#[tokio::test]
async fn test_nothing_new_performs_no_network_activity() {
    let server = MockServer::start().await;

    let tmp = TempDir::new().unwrap();
    {
        let store = SeriesStore::open(tmp.path(), "Test Series", "Test").unwrap();
        store.write_resource(2, 1, "jpg", b"x").await.unwrap();
    }

    let report = run_driver(&tmp, &server, EndChapter::Fixed(2)).await;

    assert!(report.nothing_new());
    assert_eq!(report.pages_completed, 0);
    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "nothing-new run must not touch the network"
    );
}

#[tokio::test]
async fn test_run_report_written_even_when_nothing_new() {
    let server = MockServer::start().await;

    let tmp = TempDir::new().unwrap();
    {
        let store = SeriesStore::open(tmp.path(), "Test Series", "Test").unwrap();
        store.write_resource(1, 1, "jpg", b"x").await.unwrap();
    }

    let report = run_driver(&tmp, &server, EndChapter::Fixed(1)).await;
    assert!(report.nothing_new());

    let log = std::fs::read_to_string(tmp.path().join("Test Series/error.log")).unwrap();
    assert!(log.contains("\"pages_completed\":0"));
}
