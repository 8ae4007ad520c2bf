// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session store models: configuration, metadata, health

use crate::store::{StorageType, TripleStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the session store manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStoreConfig {
    /// Root directory holding one `session_<id>` store per session.
    pub base_path: PathBuf,
    /// Open-set budget; the LRU entry is evicted when it is full.
    pub max_open_stores: usize,
    /// Entries idle longer than this are closed by the reaper.
    pub idle_timeout_ms: u64,
    /// Reaper period.
    pub cleanup_interval_ms: u64,
    /// Per-store bound on close during shutdown and explicit close.
    pub close_timeout_ms: u64,
    pub storage_type: StorageType,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        SessionStoreConfig {
            base_path: default_base_path(),
            max_open_stores: 100,
            idle_timeout_ms: 30 * 60 * 1000,
            cleanup_interval_ms: 60 * 1000,
            close_timeout_ms: 5 * 1000,
            storage_type: StorageType::Sled,
        }
    }
}

/// Per-user hidden directory, with a relative fallback when no home
/// directory is resolvable.
fn default_base_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".memlite").join("stores"))
        .unwrap_or_else(|| PathBuf::from(".memlite").join("stores"))
}

/// Observable metadata for one open session store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionMetadata {
    pub opened_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub ontology_loaded: bool,
}

/// Result of a session store health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { detail: String },
}

/// One open entry in the manager's registry.
pub(crate) struct SessionEntry {
    pub store: Arc<TripleStore>,
    pub opened_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Monotonic microseconds for LRU ordering; never derived from the
    /// wall clock.
    pub last_accessed_micros: u64,
    pub ontology_loaded: bool,
}

impl SessionEntry {
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            opened_at: self.opened_at,
            last_accessed: self.last_accessed,
            ontology_loaded: self.ontology_loaded,
        }
    }
}
