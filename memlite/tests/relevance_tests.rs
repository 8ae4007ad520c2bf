//! Context retrieval tests
//!
//! Scoring over real stores: recency ordering, confidence floors, type
//! filters, and the subset guarantee that results come from active records.

#[path = "testutils/mod.rs"]
mod testutils;

use chrono::{Duration, Utc};
use memlite::{ConfidenceLevel, ContextOptions, MemoryType, QueryOptions};
use testutils::test_fixture::{fact, TestFixture};

#[tokio::test]
async fn identical_content_ranks_by_recency() {
    let fixture = TestFixture::new();
    let adapter = fixture.adapter("sess-A").await;
    let now = Utc::now();

    // Five facts with identical content, five weeks apart.
    for week in 0..5i64 {
        let mut record = fact(
            &format!("mem-{week}"),
            "sess-A",
            "deployment steps for kubernetes",
        );
        record.created_at = now - Duration::weeks(week);
        adapter.persist(&record).unwrap();
    }

    let results = adapter
        .get_context(
            "sess-A",
            "kubernetes deployment",
            &ContextOptions {
                recency_weight: 0.6,
                ..ContextOptions::default()
            },
        )
        .unwrap();

    assert_eq!(results.len(), 5);
    assert_eq!(results[0].record.id, "mem-0");
    assert_eq!(results[4].record.id, "mem-4");
    for scored in &results {
        assert!(scored.score > 0.0 && scored.score <= 1.0);
    }
    // The five-week-old record decayed by roughly exp(-5).
    assert!(results[4].score < results[0].score);
}

#[tokio::test]
async fn results_are_a_subset_of_active_matching_records() {
    let fixture = TestFixture::new();
    let adapter = fixture.adapter("sess-A").await;

    adapter
        .persist(&fact("mem-live", "sess-A", "kubernetes deployment notes"))
        .unwrap();
    adapter
        .persist(&fact("mem-gone", "sess-A", "kubernetes deployment history"))
        .unwrap();
    adapter.delete("sess-A", "mem-gone").unwrap();

    let mut weak = fact("mem-weak", "sess-A", "kubernetes speculation");
    weak.confidence = 0.3;
    adapter.persist(&weak).unwrap();

    let results = adapter
        .get_context(
            "sess-A",
            "kubernetes",
            &ContextOptions {
                min_confidence: Some(ConfidenceLevel::Medium),
                ..ContextOptions::default()
            },
        )
        .unwrap();

    let ids: Vec<&str> = results.iter().map(|s| s.record.id.as_str()).collect();
    assert!(ids.contains(&"mem-live"));
    assert!(!ids.contains(&"mem-gone"), "superseded records never score");
    assert!(!ids.contains(&"mem-weak"), "below the confidence floor");

    // Spot-check the subset against the plain query surface.
    let active = adapter
        .query_by_session(
            "sess-A",
            &QueryOptions {
                min_confidence: Some(ConfidenceLevel::Medium),
                ..QueryOptions::default()
            },
        )
        .unwrap();
    let active_ids: Vec<&str> = active.iter().map(|r| r.id.as_str()).collect();
    for id in ids {
        assert!(active_ids.contains(&id));
    }
}

#[tokio::test]
async fn type_filter_excludes_before_scoring() {
    let fixture = TestFixture::new();
    let adapter = fixture.adapter("sess-A").await;

    adapter.persist(&fact("mem-f", "sess-A", "redis cache")).unwrap();
    let mut risk = fact("mem-r", "sess-A", "redis cache eviction risk");
    risk.memory_type = MemoryType::Risk;
    adapter.persist(&risk).unwrap();

    let results = adapter
        .get_context(
            "sess-A",
            "redis cache",
            &ContextOptions {
                include_types: Some(vec![MemoryType::Risk]),
                ..ContextOptions::default()
            },
        )
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, "mem-r");
}

#[tokio::test]
async fn limit_keeps_only_the_top_scores() {
    let fixture = TestFixture::new();
    let adapter = fixture.adapter("sess-A").await;

    for i in 0..8 {
        adapter
            .persist(&fact(&format!("mem-{i}"), "sess-A", "postgres vacuum tuning"))
            .unwrap();
    }
    let results = adapter
        .get_context(
            "sess-A",
            "postgres vacuum",
            &ContextOptions {
                limit: 3,
                ..ContextOptions::default()
            },
        )
        .unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn rationale_participates_in_text_similarity() {
    let fixture = TestFixture::new();
    let adapter = fixture.adapter("sess-A").await;

    let mut with_rationale = fact("mem-a", "sess-A", "service latency doubled");
    with_rationale.rationale = Some("grpc retries amplify load".to_string());
    adapter.persist(&with_rationale).unwrap();
    adapter
        .persist(&fact("mem-b", "sess-A", "service latency doubled"))
        .unwrap();

    let results = adapter
        .get_context("sess-A", "grpc retries", &ContextOptions::default())
        .unwrap();
    assert_eq!(results[0].record.id, "mem-a");
    assert!(results[0].score > results.last().unwrap().score || results.len() == 1);
}

#[tokio::test]
async fn access_frequency_breaks_otherwise_even_fields() {
    let fixture = TestFixture::new();
    let adapter = fixture.adapter("sess-A").await;
    let now = Utc::now();

    for id in ["mem-hot", "mem-cold"] {
        let mut record = fact(id, "sess-A", "ci pipeline caching");
        record.created_at = now;
        adapter.persist(&record).unwrap();
    }
    for _ in 0..5 {
        adapter.record_access("sess-A", "mem-hot").unwrap();
    }

    let results = adapter
        .get_context("sess-A", "ci caching", &ContextOptions::default())
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].record.id, "mem-hot");
}
