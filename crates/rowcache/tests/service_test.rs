//! Integration tests for the overlay-aware service and its read-through
//! and write-through combinators.

mod common;

use common::{memory_service, opts, record};
use rowcache::{
    Cached, CacheBackend, Increment, Payload, Record, RequestContext, RowCacheError, Shape,
    UpdateOutcome,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_overlay_serves_repeat_reads() {
    let (service, backend) = memory_service();
    let mut ctx = RequestContext::new();
    let row = record(&[("id", json!(7))]);

    service
        .put(
            "Vo:users:7",
            Payload::from(row.clone()),
            opts(Shape::Single, 600),
            Some(&mut ctx),
        )
        .await
        .unwrap();

    // Remove the durable copy; the overlay still answers within the request.
    backend.del("Vo:users:7").await.unwrap();

    let cached = service
        .get("Vo:users:7", Shape::Single, "default", Some(&mut ctx))
        .await
        .unwrap();
    assert_eq!(cached, Cached::Single(row));
}

#[tokio::test]
async fn test_opting_out_of_the_overlay_reads_the_store() {
    let (service, backend) = memory_service();
    let mut ctx = RequestContext::new();

    service
        .put(
            "Vo:users:7",
            Payload::from(record(&[("id", json!(7))])),
            opts(Shape::Single, 600),
            Some(&mut ctx),
        )
        .await
        .unwrap();
    backend.del("Vo:users:7").await.unwrap();

    let cached = service
        .get("Vo:users:7", Shape::Single, "default", None)
        .await
        .unwrap();
    assert_eq!(cached, Cached::Miss);
}

#[tokio::test]
async fn test_a_recorded_miss_falls_through_to_the_store() {
    let (service, _) = memory_service();
    let mut ctx = RequestContext::new();

    // First read records the miss in the overlay.
    let cached = service
        .get("Vo:users:7", Shape::Single, "default", Some(&mut ctx))
        .await
        .unwrap();
    assert_eq!(cached, Cached::Miss);

    // A write lands after the miss was recorded; the next overlay-backed
    // read must still see it.
    service
        .put(
            "Vo:users:7",
            Payload::from(record(&[("id", json!(7))])),
            opts(Shape::Single, 600),
            None,
        )
        .await
        .unwrap();

    let cached = service
        .get("Vo:users:7", Shape::Single, "default", Some(&mut ctx))
        .await
        .unwrap();
    assert!(cached.is_hit());
}

#[tokio::test]
async fn test_get_or_load_populates_and_then_short_circuits() {
    let (service, _) = memory_service();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let cached = service
            .get_or_load(
                "Vo:users:7",
                "uid",
                Shape::Single,
                "default",
                600,
                None,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(vec![record(&[("uid", json!(7)), ("name", json!("alice"))])]) }
                },
            )
            .await
            .unwrap();
        assert!(cached.is_hit());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_or_load_negative_caches_an_empty_load() {
    let (service, backend) = memory_service();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let cached = service
            .get_or_load(
                "Vo:users:404",
                "uid",
                Shape::Single,
                "default",
                600,
                None,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(Vec::new()) }
                },
            )
            .await
            .unwrap();
        assert_eq!(cached, Cached::Miss);
    }

    // The second call was answered by the null marker, not the loader.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The marker carries the configured negative-cache TTL (3600) plus jitter.
    let ttl = backend.ttl("Vo:users:404").await.unwrap();
    assert!(
        (3700..=13_598).contains(&ttl),
        "null marker ttl {} outside expected range",
        ttl
    );
}

#[tokio::test]
async fn test_get_or_load_bypasses_the_cache_on_zero_ttl() {
    let (service, _) = memory_service();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        service
            .get_or_load("Vo:users:7", "uid", Shape::Single, "default", 0, None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![record(&[("uid", json!(7))])]) }
            })
            .await
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_get_or_load_indexes_list_results_by_sub_key() {
    let (service, _) = memory_service();

    let cached = service
        .get_or_load(
            "VoList:scores:9",
            "uid",
            Shape::List,
            "default",
            600,
            None,
            || {
                async {
                    Ok(vec![
                        record(&[("uid", json!(1)), ("score", json!(10))]),
                        record(&[("uid", json!(2)), ("score", json!(20))]),
                    ])
                }
            },
        )
        .await
        .unwrap();

    let set = cached.into_list().expect("Expected a collection");
    assert_eq!(set.len(), 2);
    assert_eq!(set.get("2").and_then(|r| r.get("score")), Some(&json!(20)));
}

#[tokio::test]
async fn test_update_merges_and_mirrors_into_the_overlay() {
    let (service, backend) = memory_service();
    let mut ctx = RequestContext::new();

    service
        .put(
            "Vo:stats:3",
            Payload::from(record(&[("count", json!(5))])),
            opts(Shape::Single, 600),
            None,
        )
        .await
        .unwrap();

    let outcome = service
        .update(
            "Vo:stats:3",
            Payload::from(Record::new()),
            Some(&Increment::new("count", 3)),
            &Record::new(),
            opts(Shape::Single, 600),
            Some(&mut ctx),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Merged(_)));

    // The overlay holds the merged value even after the durable copy goes.
    backend.del("Vo:stats:3").await.unwrap();
    let cached = service
        .get("Vo:stats:3", Shape::Single, "default", Some(&mut ctx))
        .await
        .unwrap();
    let merged = cached.into_single().expect("Expected a record");
    assert_eq!(merged.get("count"), Some(&json!(8)));
}

#[tokio::test]
async fn test_race_guard_destroy_evicts_the_overlay_entry() {
    let (service, backend) = memory_service();
    let mut ctx = RequestContext::new();
    let row = record(&[("count", json!(5))]);

    backend
        .set("Vo:stats:3", &serde_json::to_string(&row).unwrap(), 10)
        .await
        .unwrap();

    // Seed the overlay with the about-to-expire value.
    service
        .get("Vo:stats:3", Shape::Single, "default", Some(&mut ctx))
        .await
        .unwrap();

    let outcome = service
        .update(
            "Vo:stats:3",
            Payload::from(record(&[("count", json!(9))])),
            None,
            &Record::new(),
            opts(Shape::Single, 600),
            Some(&mut ctx),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Destroyed);

    let cached = service
        .get("Vo:stats:3", Shape::Single, "default", Some(&mut ctx))
        .await
        .unwrap();
    assert_eq!(cached, Cached::Miss);
}

#[tokio::test]
async fn test_delete_evicts_the_whole_overlay_entry() {
    let (service, _) = memory_service();
    let mut ctx = RequestContext::new();
    let rows = vec![
        record(&[("uid", json!(1)), ("score", json!(10))]),
        record(&[("uid", json!(2)), ("score", json!(20))]),
    ];

    service
        .put(
            "VoList:scores:9",
            Payload::from(rows),
            opts(Shape::List, 600),
            Some(&mut ctx),
        )
        .await
        .unwrap();

    service
        .delete(
            "VoList:scores:9",
            &["1".to_string()],
            Shape::List,
            "default",
            Some(&mut ctx),
        )
        .await
        .unwrap();

    // The overlay entry is gone as a whole; the store still has the sibling.
    let cached = service
        .get("VoList:scores:9", Shape::List, "default", Some(&mut ctx))
        .await
        .unwrap();
    let set = cached.into_list().expect("Expected a collection");
    assert!(set.get("1").is_none());
    assert!(set.get("2").is_some());
}

#[tokio::test]
async fn test_update_through_applies_the_merge_after_the_mutation() {
    let (service, _) = memory_service();

    service
        .put(
            "Vo:stats:3",
            Payload::from(record(&[("count", json!(5))])),
            opts(Shape::Single, 600),
            None,
        )
        .await
        .unwrap();

    let affected: u64 = service
        .update_through(
            "Vo:stats:3",
            Payload::from(Record::new()),
            Some(&Increment::new("count", 3)),
            &Record::new(),
            opts(Shape::Single, 600),
            None,
            || async { Ok(1) },
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let cached = service
        .get("Vo:stats:3", Shape::Single, "default", None)
        .await
        .unwrap()
        .into_single()
        .expect("Expected a record");
    assert_eq!(cached.get("count"), Some(&json!(8)));
}

#[tokio::test]
async fn test_update_through_destroys_the_key_when_the_mutation_fails() {
    let (service, _) = memory_service();

    service
        .put(
            "Vo:stats:3",
            Payload::from(record(&[("count", json!(5))])),
            opts(Shape::Single, 600),
            None,
        )
        .await
        .unwrap();

    let result: Result<u64, _> = service
        .update_through(
            "Vo:stats:3",
            Payload::from(record(&[("count", json!(9))])),
            None,
            &Record::new(),
            opts(Shape::Single, 600),
            None,
            || async { Err(RowCacheError::cache("source of truth unreachable")) },
        )
        .await;
    assert!(result.is_err());

    // The cached copy is gone: its relation to the source is unknown.
    assert_eq!(
        service
            .get("Vo:stats:3", Shape::Single, "default", None)
            .await
            .unwrap(),
        Cached::Miss
    );
}
