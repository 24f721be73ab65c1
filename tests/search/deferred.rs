//! Deferred jobs: recording, transactional and background queues

use std::sync::Arc;

use crate::common::*;

#[test]
fn test_save_schedules_job_on_default_queue() {
    let queue = Arc::new(RecordingQueue::new());
    let t = TestEngine::with_queue(queue.clone());
    t.engine.register("items", ["field1"]).unwrap();
    t.save(item(1, "Banana", ""));

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].queue, DEFAULT_QUEUE);
    assert!(!jobs[0].transactional);
    assert_eq!(jobs[0].job.entity, EntityRef::new("items", 1));
    assert_eq!(t.engine.posting_count().unwrap(), 0);

    assert_eq!(queue.run_pending(&**t.engine.indexer()).unwrap(), 1);
    assert_eq!(t.search("items", "banana"), vec![1]);
}

#[test]
fn test_latest_job_wins() {
    let queue = Arc::new(RecordingQueue::new());
    let t = TestEngine::with_queue(queue.clone());
    t.engine.register("items", ["field1"]).unwrap();
    t.save(item(1, "Banana", ""));
    t.save(item(1, "Cherry", ""));

    assert_eq!(queue.run_pending(&**t.engine.indexer()).unwrap(), 2);
    assert!(t.search("items", "banana").is_empty());
    assert_eq!(t.search("items", "cherry"), vec![1]);
    assert_eq!(t.count("banana"), 0);
}

#[test]
fn test_deferred_index_matches_inline_index() {
    // Neither record is in the repository; both must be indexed as passed
    let t = TestEngine::inline();
    let fields = parse(&["field1"]);
    t.engine.index(&item(1, "Kiwi", ""), &fields, true).unwrap();
    t.engine.index(&item(2, "Kiwi", ""), &fields, false).unwrap();

    assert_eq!(t.count("kiwi"), 2);
    assert_eq!(t.postings_of("items", "kiwi"), 2);
}

#[test]
fn test_delete_after_job_retracts() {
    let queue = Arc::new(RecordingQueue::new());
    let t = TestEngine::with_queue(queue.clone());
    t.engine.register("items", ["field1"]).unwrap();
    t.save(item(1, "Banana", ""));
    queue.run_pending(&**t.engine.indexer()).unwrap();

    t.delete(&EntityRef::new("items", 1));
    assert_eq!(t.engine.posting_count().unwrap(), 0);
    assert_eq!(t.count("banana"), 0);
}

#[test]
fn test_job_survives_json_round_trip() {
    let queue = Arc::new(RecordingQueue::new());
    let t = TestEngine::with_queue(queue.clone());
    t.repo.insert_document(item(1, "Banana", "Apple"));
    t.engine
        .index(&item(1, "Banana", "Apple"), &parse(&["field1", "field2"]), true)
        .unwrap();

    let json = queue.jobs()[0].job.to_json().unwrap();
    let job = IndexJob::from_json(&json).unwrap();
    t.engine.run_job(&job).unwrap();

    assert_eq!(t.count("banana"), 1);
    assert_eq!(t.count("apple"), 1);
}

#[test]
fn test_open_scope_defers_until_commit() {
    let t = TestEngine::inline();
    t.engine.register("items", ["field1"]).unwrap();

    t.store
        .scope(|| {
            t.save(item(1, "Banana", ""));
            assert_eq!(t.engine.posting_count()?, 0);
            Ok(())
        })
        .unwrap();

    assert_eq!(t.search("items", "banana"), vec![1]);
}

#[test]
fn test_aborted_scope_drops_job() {
    let t = TestEngine::inline();
    t.engine.register("items", ["field1"]).unwrap();

    let result: Result<()> = t.store.scope(|| {
        t.save(item(1, "Banana", ""));
        Err(Error::invalid_input("host rolled back"))
    });
    assert!(result.is_err());
    assert_eq!(t.engine.posting_count().unwrap(), 0);
}

#[test]
fn test_scope_forces_deferral_of_undeferred_index() {
    let queue = Arc::new(RecordingQueue::new());
    let t = TestEngine::with_queue(queue.clone());

    t.store
        .scope(|| t.engine.index(&item(1, "Banana", ""), &parse(&["field1"]), false))
        .unwrap();

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].transactional);
}

#[test]
fn test_background_queue_indexes_after_drain() {
    let t = TestEngine::background();
    t.engine.register("items", ["field1"]).unwrap();
    for id in 1..=20 {
        t.save(item(id, &format!("banana number{id}"), ""));
    }
    t.engine.drain();

    assert_eq!(t.count("banana"), 20);
    assert_eq!(
        t.search_request(&SearchRequest::new("items", "banana").per_page(100))
            .len(),
        20
    );
    assert_eq!(t.search("items", "number7"), vec![7]);
    t.engine.shutdown();
}

#[test]
fn test_background_queue_waits_for_scope_commit() {
    let t = TestEngine::background();
    t.engine.register("items", ["field1"]).unwrap();

    t.store
        .scope(|| {
            t.save(item(1, "Banana", ""));
            Ok(())
        })
        .unwrap();
    t.engine.drain();

    assert_eq!(t.search("items", "banana"), vec![1]);
}

#[test]
fn test_background_queue_honors_custom_name() {
    let store: Arc<dyn IndexStore> = Arc::new(MemoryStore::new());
    let indexer = Arc::new(Indexer::new(store.clone(), RetryPolicy::default()));
    let background = BackgroundQueue::new(store.clone(), indexer, &SearchConfig::default());
    let job = IndexJob::from_record(&item(1, "Banana", ""), &parse(&["field1"])).unwrap();
    background.enqueue("reindex", job, false).unwrap();
    background.drain_queue("reindex");

    assert_eq!(background.queue_names(), vec!["reindex".to_string()]);
    let stats = background.stats("reindex").unwrap();
    assert_eq!(stats.jobs_completed, 1);
    assert_eq!(store.term_count("banana").unwrap(), Some(1));
    background.shutdown();
}
