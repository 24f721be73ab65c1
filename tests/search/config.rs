//! Engine configured from `termdex.toml`

use std::sync::Arc;
use std::time::Duration;

use crate::common::*;
use tempfile::TempDir;

#[test]
fn test_engine_uses_queue_name_from_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "queue_name = \"search\"\n\n[retry]\nmax_retries = 3\n",
    )
    .unwrap();
    let config = SearchConfig::load_or_default(dir.path()).unwrap();
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.base_delay_ms, 1000);

    let queue = Arc::new(RecordingQueue::new());
    let store = Arc::new(MemoryStore::new());
    let engine = SearchEngine::builder(store, Arc::new(MemoryRepository::new()))
        .config(config)
        .job_queue(queue.clone())
        .build()
        .unwrap();
    engine
        .index(&item(1, "Banana", ""), &parse(&["field1"]), true)
        .unwrap();

    assert_eq!(queue.jobs()[0].queue, "search");
}

#[test]
fn test_missing_file_gets_defaults() {
    let dir = TempDir::new().unwrap();
    let config = SearchConfig::load_or_default(dir.path()).unwrap();

    assert_eq!(config, SearchConfig::default());
    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
}

#[test]
fn test_invalid_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "worker_threads = 0\n").unwrap();

    let err = SearchConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_exponential_backoff_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "[retry]\nbackoff = \"exponential\"\nbase_delay_ms = 10\nmax_delay_ms = 25\nmax_retries = 5\n",
    )
    .unwrap();
    let config = SearchConfig::from_file(&path).unwrap();

    let t = TestEngine::with_config(config);
    t.store.inject_conflicts(3);
    t.index(item(1, "Banana", ""), &["field1"]);

    assert_eq!(
        t.sleeper.delays(),
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(25),
        ]
    );
    assert_eq!(t.count("banana"), 1);
}
