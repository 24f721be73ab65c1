//! Concurrent indexers and conflict retry

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crate::common::*;

#[test]
fn test_parallel_indexers_converge_on_shared_counter() {
    let t = Arc::new(TestEngine::inline());
    let threads = 8u64;
    let per_thread = 25u64;
    let barrier = Arc::new(Barrier::new(threads as usize));

    let handles: Vec<_> = (0..threads)
        .map(|n| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    let id = n * per_thread + i;
                    t.index(item(id, &format!("common term{id}"), ""), &["field1"]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = threads * per_thread;
    assert_eq!(t.count("common"), total as i64);
    assert_eq!(t.engine.posting_count().unwrap(), (total * 3) as usize);
    assert_eq!(
        t.search_request(&SearchRequest::new("items", "common").per_page(1000))
            .len(),
        total as usize
    );
}

#[test]
fn test_racing_reindex_of_one_entity_keeps_counts_exact() {
    let t = Arc::new(TestEngine::inline());
    let record = t.repo.insert_document(item(1, "Banana", "Apple"));
    let fields = parse(&["field1", "field2"]);
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let t = Arc::clone(&t);
            let record = Arc::clone(&record);
            let fields = fields.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..20 {
                    t.engine.index(record.as_ref(), &fields, false).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(t.count("banana"), 1);
    assert_eq!(t.count("apple"), 1);
    assert_eq!(t.engine.posting_count().unwrap(), 2);
}

#[test]
fn test_concurrent_index_and_unindex_never_go_negative() {
    let t = Arc::new(TestEngine::inline());
    for id in 0..10 {
        t.index(item(id, "shared", ""), &["field1"]);
    }

    let handles: Vec<_> = (0..10u64)
        .map(|id| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                let entity = EntityRef::new("items", id);
                for _ in 0..10 {
                    t.engine.unindex(&entity).unwrap();
                    t.index(item(id, "shared", ""), &["field1"]);
                }
                if id % 2 == 0 {
                    t.engine.unindex(&entity).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(t.count("shared"), 5);
    assert_eq!(sorted(t.search("items", "shared")), vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_conflicts_are_retried_with_fixed_delay() {
    let t = TestEngine::inline();
    t.store.inject_conflicts(3);
    t.index(item(1, "Banana", ""), &["field1"]);

    assert_eq!(t.sleeper.delays(), vec![Duration::from_secs(1); 3]);
    assert_eq!(t.count("banana"), 1);
    assert_eq!(t.store.stats().conflicts, 3);
}

#[test]
fn test_exhausted_retries_surface_conflict() {
    let t = TestEngine::with_config(
        SearchConfig::default().with_retry(RetryConfig::new().with_max_retries(2)),
    );
    t.store.inject_conflicts(5);

    let err = t
        .engine
        .index(&item(1, "Banana", ""), &parse(&["field1"]), false)
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(t.sleeper.delays().len(), 2);
    assert_eq!(t.engine.posting_count().unwrap(), 0);
}
