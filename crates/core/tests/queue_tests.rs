use faultline_core::{CaptureContext, Event, PendingQueue};

fn event() -> Event {
    Event::new(&CaptureContext::default())
}

#[tokio::test]
async fn test_empty_queue_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path().join("pending"));

    assert!(queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_persist_and_list_pending() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path().join("nested/pending"));

    let events = [event(), event(), event()];
    for e in &events {
        let path = queue.persist(e).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("{}.json", e.id())
        );
    }

    let mut expected: Vec<String> = events.iter().map(|e| e.id().to_string()).collect();
    expected.sort();
    assert_eq!(queue.list_pending().await.unwrap(), expected);
}

#[tokio::test]
async fn test_persist_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path());

    let mut e = event();
    queue.persist(&e).await.unwrap();
    e.logger = "javascript".to_string();
    queue.persist(&e).await.unwrap();

    assert_eq!(queue.list_pending().await.unwrap(), vec![e.id().to_string()]);
    let loaded = queue.load(e.id()).await.unwrap().unwrap();
    assert_eq!(loaded.logger, "javascript");

    let files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(files, 1, "no temporary files left behind");
}

#[tokio::test]
async fn test_load_round_trips_event() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path());

    let e = event();
    queue.persist(&e).await.unwrap();

    let loaded = queue.load(e.id()).await.unwrap().unwrap();
    assert_eq!(loaded, e);
}

#[tokio::test]
async fn test_missing_events_are_benign() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path());

    assert!(queue.load("0123456789abcdef").await.unwrap().is_none());
    queue.delete("0123456789abcdef").await.unwrap();
}

#[tokio::test]
async fn test_delete_removes_only_that_event() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path());

    let keep = event();
    let gone = event();
    queue.persist(&keep).await.unwrap();
    queue.persist(&gone).await.unwrap();

    queue.delete(gone.id()).await.unwrap();
    queue.delete(gone.id()).await.unwrap();

    assert_eq!(queue.list_pending().await.unwrap(), vec![keep.id().to_string()]);
}

#[tokio::test]
async fn test_list_ignores_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path());

    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("bad name.json"), "{}").unwrap();
    let e = event();
    queue.persist(&e).await.unwrap();

    assert_eq!(queue.list_pending().await.unwrap(), vec![e.id().to_string()]);
}

#[test]
fn test_persist_blocking_writes_same_layout() {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path());

    let e = event();
    let path = queue.persist_blocking(&e).unwrap();
    assert_eq!(path, dir.path().join(format!("{}.json", e.id())));

    let json = std::fs::read_to_string(path).unwrap();
    assert_eq!(Event::from_json(&json).unwrap(), e);
}
