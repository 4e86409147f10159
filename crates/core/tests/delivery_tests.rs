use std::time::Duration;

use faultline_core::{
    BrowserReport, CaptureContext, CaptureOutcome, CapturedException, DeliveryClient, Dsn, Event,
    FaultlineError, Level, NativeErrorKind, RawError, Reporter, Settings,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, header_regex, method, path},
};

const PROJECT: u64 = 42;

fn dsn_for(server: &MockServer) -> String {
    let host = server.uri().trim_start_matches("http://").to_string();
    format!("http://pub:secret@{host}/{PROJECT}")
}

fn reporter(dsn: Option<String>, dir: &TempDir) -> Reporter {
    Reporter::new(Settings {
        dsn,
        environment: Some("testing".to_string()),
        cache_dir: dir.path().join("pending"),
        timeout_secs: 1,
        ..Default::default()
    })
    .unwrap()
}

async fn mount_store(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("/api/{PROJECT}/store/")))
        .and(header("content-type", "application/json"))
        .and(header_regex(
            "x-sentry-auth",
            r"^Sentry sentry_version=7, sentry_client=faultline/\S+, sentry_timestamp=\d+, sentry_key=pub, sentry_secret=secret$",
        ))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"id": "x"})))
        .mount(server)
        .await;
}

fn exception() -> CapturedException {
    CapturedException::new("RuntimeException", "database unavailable")
}

#[tokio::test]
async fn test_send_posts_event_to_store_endpoint() {
    let server = MockServer::start().await;
    mount_store(&server, 200).await;

    let client = DeliveryClient::new(Duration::from_secs(2)).unwrap();
    let dsn = Dsn::parse(&dsn_for(&server)).unwrap();
    let event = Event::new(&CaptureContext::default());

    client.send(&event, &dsn).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["event_id"], json!(event.id()));
    assert_eq!(
        requests[0].headers.get("user-agent").unwrap().to_str().unwrap(),
        format!("faultline/{}", env!("CARGO_PKG_VERSION"))
    );
}

#[tokio::test]
async fn test_send_reports_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = DeliveryClient::new(Duration::from_secs(2)).unwrap();
    let dsn = Dsn::parse(&dsn_for(&server)).unwrap();
    let err = client
        .send(&Event::new(&CaptureContext::default()), &dsn)
        .await
        .unwrap_err();

    match err {
        FaultlineError::Delivery { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected delivery failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delivered_event_is_not_queued() {
    let server = MockServer::start().await;
    mount_store(&server, 200).await;
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(Some(dsn_for(&server)), &dir);

    let outcome = reporter
        .capture_exception(&CaptureContext::default(), &exception())
        .await;

    assert_eq!(outcome, CaptureOutcome::Delivered);
    assert!(reporter.queue().list_pending().await.unwrap().is_empty());

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["environment"], json!("testing"));
    assert_eq!(body["exception"]["values"][0]["type"], json!("RuntimeException"));
}

#[tokio::test]
async fn test_failed_delivery_queues_then_retry_removes_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(Some(dsn_for(&server)), &dir);

    let outcome = reporter
        .capture_exception(&CaptureContext::default(), &exception())
        .await;
    assert_eq!(outcome, CaptureOutcome::Queued);

    let pending = reporter.queue().list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    let files: Vec<String> = std::fs::read_dir(dir.path().join("pending"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files, vec![format!("{}.json", pending[0])]);

    mount_store(&server, 200).await;
    let summary = reporter.retry_pending().await.unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.delivered, 1);
    assert!(reporter.queue().list_pending().await.unwrap().is_empty());

    let requests = server.received_requests().await.unwrap();
    let retried: Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    assert_eq!(retried["event_id"], json!(pending[0]));
}

#[tokio::test]
async fn test_retry_keeps_events_that_still_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(Some(dsn_for(&server)), &dir);

    let first = Event::new(&CaptureContext::default());
    let second = Event::new(&CaptureContext::default());
    reporter.queue().persist(&first).await.unwrap();
    reporter.queue().persist(&second).await.unwrap();

    let summary = reporter.retry_pending().await.unwrap();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.failed, 2);
    assert_eq!(reporter.queue().list_pending().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(Some(dsn_for(&server)), &dir);

    let outcome = reporter
        .capture_exception(&CaptureContext::default(), &exception())
        .await;

    assert_eq!(outcome, CaptureOutcome::Queued);
    assert_eq!(reporter.queue().list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_dsn_still_queues() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(Some("not a dsn".to_string()), &dir);

    let outcome = reporter
        .capture_exception(&CaptureContext::default(), &exception())
        .await;

    assert_eq!(outcome, CaptureOutcome::Queued);
    let summary = reporter.retry_pending().await.unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(reporter.queue().list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_dsn_counts_pending_as_attempted() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(None, &dir);
    reporter
        .queue()
        .persist(&Event::new(&CaptureContext::default()))
        .await
        .unwrap();

    let summary = reporter.retry_pending().await.unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_retry_removes_only_delivered_events() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(Some(dsn_for(&server)), &dir);

    let accepted = Event::new(&CaptureContext::default());
    let rejected = Event::new(&CaptureContext::default());
    reporter.queue().persist(&accepted).await.unwrap();
    reporter.queue().persist(&rejected).await.unwrap();

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"event_id": rejected.id()})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_store(&server, 200).await;

    let summary = reporter.retry_pending().await.unwrap();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.failed, 1);

    let remaining = reporter.queue().list_pending().await.unwrap();
    assert_eq!(remaining, vec![rejected.id().to_string()]);
    let files: Vec<String> = std::fs::read_dir(dir.path().join("pending"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files, vec![format!("{}.json", rejected.id())]);
}

#[tokio::test]
async fn test_unwritable_queue_reports_lost() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("pending");
    std::fs::write(&blocker, "not a directory").unwrap();
    let reporter = reporter(None, &dir);

    let outcome = reporter
        .capture_exception(&CaptureContext::default(), &exception())
        .await;

    assert_eq!(outcome, CaptureOutcome::Lost);
}

#[tokio::test]
async fn test_native_errors_respect_mask_and_fatal_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings {
        cache_dir: dir.path().join("pending"),
        ..Default::default()
    };
    settings.error_mask = NativeErrorKind::Warning.code();
    let reporter = Reporter::new(settings).unwrap();
    let ctx = CaptureContext::default();

    let notice = RawError {
        code: NativeErrorKind::Notice.code(),
        message: "Undefined variable".into(),
        file: "a.php".into(),
        line: 1,
    };
    assert_eq!(reporter.capture_native_error(&ctx, notice.clone()).await, None);

    let warning = RawError {
        code: NativeErrorKind::Warning.code(),
        message: "fopen(): failed".into(),
        file: "b.php".into(),
        line: 2,
    };
    assert_eq!(
        reporter.capture_native_error(&ctx, warning.clone()).await,
        Some(CaptureOutcome::Queued)
    );

    // The shutdown hook sees the same error again and must not report it twice.
    assert_eq!(reporter.capture_fatal(&ctx, Some(warning)).await, None);
    assert_eq!(reporter.capture_fatal(&ctx, None).await, None);

    let fatal = RawError {
        code: NativeErrorKind::Error.code(),
        message: "Allowed memory size exhausted".into(),
        file: "c.php".into(),
        line: 3,
    };
    assert_eq!(
        reporter.capture_fatal(&ctx, Some(fatal)).await,
        Some(CaptureOutcome::Queued)
    );

    let ids = reporter.queue().list_pending().await.unwrap();
    assert_eq!(ids.len(), 2);
    let mut levels = Vec::new();
    for id in ids {
        levels.push(reporter.queue().load(&id).await.unwrap().unwrap().level);
    }
    levels.sort_by_key(|l| format!("{l:?}"));
    assert_eq!(levels, [Level::Error, Level::Warning]);
}

#[tokio::test]
async fn test_browser_report_becomes_javascript_event() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = reporter(None, &dir);
    let stack = "TypeError: x is undefined\n    at render (https://wiki.example/lib/app.js:10:15)";

    let report: BrowserReport = serde_json::from_value(json!({
        "name": "TypeError",
        "message": "x is undefined",
        "stack": stack,
        "additionalData": {
            "event_id": "forged",
            "tags": {"page": "start"},
            "extra": {"id": "start"}
        }
    }))
    .unwrap();

    let event = reporter.browser_event(&CaptureContext::default(), report);

    assert_eq!(event.logger, "javascript");
    assert_ne!(event.id(), "forged");
    assert_eq!(event.environment.as_deref(), Some("testing"));
    let record = &event.exception.as_ref().unwrap().values[0];
    assert_eq!(record.kind, "TypeError");
    assert_eq!(record.value, "x is undefined");
    assert_eq!(record.stacktrace.frames.len(), 1);
    assert_eq!(record.stacktrace.frames[0].function, "render");
    assert_eq!(event.other["tags"], json!({"page": "start"}));
    assert_eq!(event.extra["id"], json!("start"));
    assert_eq!(event.extra["original_stack"], json!(stack));
}
