//! Ontology loader tests
//!
//! Probe semantics, ordered loading with aggregated failures, reload, and
//! the namespace-scoped listings.

#[path = "testutils/mod.rs"]
mod testutils;

use memlite::ontology;
use memlite::{MemoryRecord, MemoryType, OntologyError, QueryOptions, NAMESPACE};
use std::path::Path;
use testutils::test_fixture::TestFixture;

/// Copy the shipped ontology documents into a scratch directory.
fn copy_ontology_to(dir: &Path) {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("ontology");
    for name in ontology::ONTOLOGY_DOCUMENTS {
        std::fs::copy(source.join(name), dir.join(name)).expect("copy ontology document");
    }
}

#[tokio::test]
async fn fresh_stores_satisfy_the_probe() {
    let fixture = TestFixture::new();
    let store = fixture.open("sess-A").await;
    assert!(ontology::is_loaded(&store).unwrap());
}

#[tokio::test]
async fn ensure_loaded_is_one_shot() {
    let fixture = TestFixture::new();
    let store = fixture.open("sess-A").await;
    // The manager already bootstrapped the store; a second ensure is a no-op.
    assert_eq!(ontology::ensure_loaded(&store).unwrap(), 0);
}

#[tokio::test]
async fn listings_are_scoped_to_the_namespace() {
    let fixture = TestFixture::new();
    let store = fixture.open("sess-A").await;

    let classes = ontology::classes(&store).unwrap();
    for expected in ["MemoryItem", "Fact", "Decision", "Convention", "Session"] {
        let iri = format!("{NAMESPACE}{expected}");
        assert!(classes.contains(&iri), "missing class {expected}");
    }
    // Nothing from the OWL namespace leaks into the listing.
    assert!(classes.iter().all(|iri| iri.starts_with(NAMESPACE)));

    let individuals = ontology::individuals(&store).unwrap();
    for expected in ["HighConfidence", "AgentSource", "DeletedMarker"] {
        let iri = format!("{NAMESPACE}{expected}");
        assert!(individuals.contains(&iri), "missing individual {expected}");
    }

    let properties = ontology::properties(&store).unwrap();
    for expected in ["content", "supersededBy", "belongsToSession", "accessCount"] {
        let iri = format!("{NAMESPACE}{expected}");
        assert!(properties.contains(&iri), "missing property {expected}");
    }
}

#[tokio::test]
async fn missing_first_document_fails_the_whole_load() {
    let scratch = tempfile::tempdir().unwrap();
    copy_ontology_to(scratch.path());
    std::fs::remove_file(scratch.path().join("core.ttl")).unwrap();

    let store =
        memlite::TripleStore::open("unused", true, memlite::StorageType::Memory).unwrap();
    let result = ontology::load_from_dir(&store, scratch.path());
    match result {
        Err(OntologyError::LoadFailed { failures }) => {
            assert!(failures.iter().any(|f| f.starts_with("core.ttl")));
        }
        other => panic!("expected LoadFailed, got {:?}", other.map(|_| ())),
    }
    // The partial store does not satisfy the probe.
    assert!(!ontology::is_loaded(&store).unwrap());
}

#[tokio::test]
async fn unparseable_documents_are_all_reported() {
    let scratch = tempfile::tempdir().unwrap();
    copy_ontology_to(scratch.path());
    std::fs::write(scratch.path().join("decisions.ttl"), "jido:broken withno").unwrap();
    std::fs::write(scratch.path().join("tasks.ttl"), "also broken {{{{").unwrap();

    let store =
        memlite::TripleStore::open("unused", true, memlite::StorageType::Memory).unwrap();
    match ontology::load_from_dir(&store, scratch.path()) {
        Err(OntologyError::LoadFailed { failures }) => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().any(|f| f.starts_with("decisions.ttl")));
            assert!(failures.iter().any(|f| f.starts_with("tasks.ttl")));
        }
        other => panic!("expected LoadFailed, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn load_counts_every_document_triple() {
    let store =
        memlite::TripleStore::open("unused", true, memlite::StorageType::Memory).unwrap();
    let count = ontology::load(&store).unwrap();
    assert!(count > 100, "ten documents should carry real schema: {count}");
    assert_eq!(store.triple_count(), count);
    assert!(ontology::is_loaded(&store).unwrap());
}

#[tokio::test]
async fn reload_purges_namespace_subjects_and_restores_schema() {
    let fixture = TestFixture::new();
    let store = fixture.open("sess-A").await;
    let adapter = memlite::MemoryAdapter::new(store.clone());
    adapter
        .persist(&MemoryRecord::new("mem-a", "sess-A", MemoryType::Fact, "x"))
        .unwrap();

    let reloaded = ontology::reload(&store).unwrap();
    assert!(reloaded > 0);
    assert!(ontology::is_loaded(&store).unwrap());

    // Record subjects live in the ontology namespace, so the destructive
    // repair clears them too.
    assert_eq!(
        adapter.count(
            "sess-A",
            &QueryOptions {
                include_superseded: true,
                ..QueryOptions::default()
            }
        ),
        0
    );
}
