//! Test fixture for MemLite integration tests
//!
//! Provides an isolated session store manager rooted in a temporary
//! directory, using ONLY the public API. The in-memory storage backend is
//! the default for speed; tests that exercise durability ask for sled.

use memlite::{
    MemoryAdapter, MemoryRecord, MemoryType, SessionStoreConfig, SessionStoreManager, StorageType,
    TripleStore,
};
use std::sync::Arc;

/// Isolated manager instance over a temporary base directory.
pub struct TestFixture {
    pub manager: Arc<SessionStoreManager>,
    _temp_dir: tempfile::TempDir,
}

impl TestFixture {
    /// Fixture with the in-memory storage backend.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Fixture with config overrides applied on top of the test defaults.
    pub fn with_config(customize: impl FnOnce(&mut SessionStoreConfig)) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let mut config = SessionStoreConfig {
            base_path: temp_dir.path().join("stores"),
            storage_type: StorageType::Memory,
            ..SessionStoreConfig::default()
        };
        customize(&mut config);
        let manager = SessionStoreManager::new(config).expect("create manager");
        TestFixture {
            manager,
            _temp_dir: temp_dir,
        }
    }

    /// Open a session store and wrap it in an adapter.
    pub async fn adapter(&self, session_id: &str) -> MemoryAdapter {
        let store = self.open(session_id).await;
        MemoryAdapter::new(store)
    }

    pub async fn open(&self, session_id: &str) -> Arc<TripleStore> {
        self.manager
            .open_or_create(session_id)
            .await
            .expect("open session store")
    }
}

/// A fact record with a fixed, microsecond-aligned creation timestamp so
/// persist-then-read comparisons are exact.
pub fn fact(id: &str, session_id: &str, content: &str) -> MemoryRecord {
    let mut record = MemoryRecord::new(id, session_id, MemoryType::Fact, content);
    record.created_at = chrono::DateTime::parse_from_rfc3339("2025-05-01T10:00:00.000000Z")
        .expect("valid timestamp")
        .with_timezone(&chrono::Utc);
    record.confidence = 0.9;
    record
}
