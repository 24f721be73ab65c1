//! Query evaluation, ordering, filters and paging

use crate::common::*;

fn fruit_basket() -> TestEngine {
    let t = TestEngine::inline();
    t.index(item(1, "Banana", "Apple"), &["field1", "field2"]);
    t.index(item(2, "banana", "Cherry"), &["field1", "field2"]);
    t.index(Document::new("items", 3).with("field1", "BANANA"), &["field1"]);
    t
}

#[test]
fn test_ordering_prefers_uncommon_words() {
    let t = TestEngine::inline();
    t.index(item(1, "eat a fish", ""), &["field1"]);
    t.index(item(2, "eat a chicken", ""), &["field1"]);
    t.index(item(3, "sleep a lot", ""), &["field1"]);

    // 3 only contains "a"
    let results = t.search("items", "eat a");
    assert_eq!(results.len(), 3);
    assert_eq!(results[2], 3);

    // 1 matches two uncommon words, 2 only one
    let results = t.search("items", "eat fish");
    assert_eq!(results[0], 1);
    assert_eq!(results[1], 2);
}

#[test]
fn test_basic_searching() {
    let t = fruit_basket();

    assert_eq!(sorted(t.search("items", "banana")), vec![1, 2, 3]);
    assert_eq!(t.search("items", "cherry"), vec![2]);

    t.engine.unindex(&EntityRef::new("items", 1)).unwrap();

    assert_eq!(sorted(t.search("items", "banana")), vec![2, 3]);
    assert_eq!(t.search("items", "cherry"), vec![2]);
    assert!(t.search("items", "apple").is_empty());
}

#[test]
fn test_additional_filters() {
    let t = TestEngine::inline();
    t.index(item(1, "banana", "apple"), &["field2"]);
    t.index(item(2, "banana", "cherry"), &["field2"]);
    t.index(item(3, "pineapple", "apple"), &["field2"]);

    assert_eq!(sorted(t.search("items", "apple")), vec![1, 3]);

    let request = SearchRequest::new("items", "apple").filter("field1", "banana");
    assert_eq!(t.search_request(&request), vec![1]);

    let request = SearchRequest::new("items", "apple").filter("field1", "kiwi");
    assert!(t.search_request(&request).is_empty());
}

#[test]
fn test_non_ascii_characters_in_search_string() {
    let t = TestEngine::inline();
    t.index(item(1, "Banana", "čherry"), &["field1", "field2"]);

    assert_eq!(t.search("items", "čherry"), vec![1]);
    assert_eq!(t.search("items", "ČHERRY"), vec![1]);
}

#[test]
fn test_quoted_phrase_is_one_term() {
    let t = TestEngine::inline();
    t.index(item(1, "eat a fish", ""), &["field1"]);
    t.index(item(2, "a fish to eat", ""), &["field1"]);

    assert_eq!(t.search("items", "\"eat a\""), vec![1]);
    assert_eq!(sorted(t.search("items", "eat")), vec![1, 2]);
}

#[test]
fn test_search_is_scoped_to_table() {
    let t = TestEngine::inline();
    t.index(item(1, "apple", ""), &["field1"]);
    t.index(Document::new("books", 1).with("title", "apple"), &["title"]);
    t.index(Document::new("books", 2).with("title", "apple pie"), &["title"]);

    assert_eq!(t.search("items", "apple"), vec![1]);
    assert_eq!(sorted(t.search("books", "apple")), vec![1, 2]);
    // the counter is global across tables
    assert_eq!(t.count("apple"), 3);
}

#[test]
fn test_scores_follow_global_counts() {
    let t = TestEngine::inline();
    t.index(item(1, "eat fish", ""), &["field1"]);
    t.index(item(2, "eat", ""), &["field1"]);

    let ranked = t.engine.rank(&SearchRequest::new("items", "eat fish")).unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].id, EntityId(1));
    assert_eq!(ranked[0].matched, 2);
    assert_eq!(ranked[0].score, (2.0 + 1.0) / 2.5);
    assert_eq!(ranked[1].id, EntityId(2));
    assert_eq!(ranked[1].score, 2.0);
}

#[test]
fn test_paging() {
    let t = TestEngine::inline();
    for id in 1..=7 {
        t.index(item(id, "apple", ""), &["field1"]);
    }

    let page = |current: usize, total: usize| {
        t.search_request(
            &SearchRequest::new("items", "apple")
                .per_page(3)
                .page(current)
                .total_pages(total),
        )
    };
    assert_eq!(page(1, 10), vec![1, 2, 3]);
    assert_eq!(page(2, 10), vec![4, 5, 6]);
    assert_eq!(page(3, 10), vec![7]);
    assert!(page(4, 10).is_empty());
    assert_eq!(page(2, 2), vec![4, 5, 6]);
    assert!(page(3, 2).is_empty());
}

#[test]
fn test_page_zero_is_empty() {
    let t = fruit_basket();
    assert!(!t.search("items", "banana").is_empty());
    assert!(t
        .search_request(&SearchRequest::new("items", "banana").page(0))
        .is_empty());
}

#[test]
fn test_unbalanced_quotes_are_rejected() {
    let t = fruit_basket();
    let err = t
        .engine
        .search(&SearchRequest::new("items", "\"banana"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_empty_query_matches_nothing() {
    let t = fruit_basket();
    assert!(t.search("items", "").is_empty());
    assert!(t.search("items", "   ").is_empty());
    assert!(t.search("items", "durian").is_empty());
}

#[test]
fn test_records_missing_from_repository_are_dropped() {
    let t = fruit_basket();
    t.repo.remove(&EntityRef::new("items", 2));

    assert_eq!(sorted(t.search("items", "banana")), vec![1, 3]);
}

#[test]
fn test_hashtag_terms_are_searchable() {
    let t = TestEngine::inline();
    t.index(item(1, "#rust tips", ""), &["field1"]);
    t.index(item(2, "rust tips", ""), &["field1"]);

    assert_eq!(t.search("items", "#rust"), vec![1]);
    assert_eq!(t.search("items", "tips #rust"), vec![1, 2]);
    assert_eq!(t.search("items", "\"#rust tips\""), vec![1]);
}
