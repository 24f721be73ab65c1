//! Change hook behavior and counter anomalies

use std::sync::Arc;

use crate::common::*;

fn registered() -> TestEngine {
    let t = TestEngine::inline();
    t.engine.register("items", ["field1", "field2"]).unwrap();
    t
}

#[test]
fn test_save_indexes_registered_table() {
    let t = registered();
    t.save(item(1, "Banana", "Apple"));

    assert_eq!(t.search("items", "banana"), vec![1]);
    assert_eq!(t.count("apple"), 1);
}

#[test]
fn test_update_replaces_terms() {
    let t = registered();
    t.save(item(1, "Banana", "Apple"));
    t.save(item(1, "Banana", "Cherry"));

    assert_eq!(t.count("banana"), 1);
    assert_eq!(t.count("apple"), 0);
    assert_eq!(t.count("cherry"), 1);
    assert!(t.search("items", "apple").is_empty());
    assert_eq!(t.search("items", "cherry"), vec![1]);
}

#[test]
fn test_delete_unindexes() {
    let t = registered();
    t.save(item(1, "Banana", "Apple"));
    t.save(item(2, "Banana", "Cherry"));
    t.delete(&EntityRef::new("items", 1));

    assert_eq!(t.search("items", "banana"), vec![2]);
    assert_eq!(t.count("banana"), 1);
    assert_eq!(t.count("apple"), 0);
    assert!(t.engine.postings_for(&EntityRef::new("items", 1)).unwrap().is_empty());
}

#[test]
fn test_delete_of_unindexed_entity_is_noop() {
    let t = registered();
    t.delete(&EntityRef::new("items", 42));
    assert_eq!(t.engine.posting_count().unwrap(), 0);
}

#[test]
fn test_unregistered_table_is_ignored() {
    let t = registered();
    t.save(Document::new("films", 1).with("title", "Banana Split"));

    assert_eq!(t.engine.posting_count().unwrap(), 0);
    assert!(t.search("films", "banana").is_empty());
}

#[test]
fn test_raw_load_bypasses_queue() {
    let queue = Arc::new(RecordingQueue::new());
    let t = TestEngine::with_queue(queue.clone());
    t.engine.register("items", ["field1"]).unwrap();

    let record = t.repo.insert_document(item(1, "Banana", ""));
    t.hook.on_entity_saved(record.as_ref(), true, true).unwrap();

    assert!(queue.is_empty());
    assert_eq!(t.search("items", "banana"), vec![1]);
}

#[test]
fn test_unregister_stops_indexing() {
    let t = registered();
    assert!(t.engine.registry().unregister("items"));
    t.save(item(1, "Banana", "Apple"));
    assert_eq!(t.engine.posting_count().unwrap(), 0);
}

#[test]
fn test_unindex_with_missing_counter_still_deletes() {
    let t = TestEngine::inline();
    t.index(item(1, "Banana", "Apple"), &["field1", "field2"]);
    t.store.remove_term_count("banana");

    let report = t.engine.unindex(&EntityRef::new("items", 1)).unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(report.missing_counters, 1);
    assert_eq!(report.negative_counters, 0);
    assert_eq!(t.engine.posting_count().unwrap(), 0);
    assert_eq!(t.engine.term_count("banana").unwrap(), None);
    assert_eq!(t.count("apple"), 0);
}

#[test]
fn test_unindex_surfaces_negative_counter() {
    let t = TestEngine::inline();
    t.index(item(1, "Banana", ""), &["field1"]);
    t.store.set_term_count("banana", 0);

    let report = t.engine.unindex(&EntityRef::new("items", 1)).unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.negative_counters, 1);
    assert_eq!(t.engine.term_count("banana").unwrap(), Some(-1));
}

#[test]
fn test_search_skips_terms_without_counter() {
    let t = TestEngine::inline();
    t.index(item(1, "Banana", "Cherry"), &["field1", "field2"]);
    t.index(item(2, "Banana", ""), &["field1"]);
    t.store.remove_term_count("cherry");

    assert!(t.search("items", "cherry").is_empty());
    assert_eq!(sorted(t.search("items", "banana cherry")), vec![1, 2]);
}
