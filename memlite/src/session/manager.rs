// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session store manager
//!
//! Process-wide registry of per-session triple stores: opens, shares,
//! ages out, and closes them. All mutations of the open-set serialize on a
//! single async mutex - the mailbox of the design - so open, close, health,
//! and the idle sweep never interleave. Long I/O (store open, ontology load)
//! deliberately holds the mailbox for the duration of one request; callers
//! set their own timeouts.

use crate::model::is_safe_identifier;
use crate::ontology;
use crate::session::models::{HealthStatus, SessionEntry, SessionMetadata, SessionStoreConfig};
use crate::store::TripleStore;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Session store manager errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session id")]
    InvalidSessionId,

    #[error("Store path escapes the base directory")]
    PathTraversalDetected,

    #[error("Store open failed: {0}")]
    StoreOpenFailed(String),

    #[error("Ontology load failed: {0}")]
    OntologyLoadFailed(String),

    #[error("Session is not open")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide registry of open session stores.
pub struct SessionStoreManager {
    config: SessionStoreConfig,
    /// Canonicalized base path all session paths must stay inside.
    base_path: PathBuf,
    /// Monotonic origin for LRU ordering.
    epoch: Instant,
    state: Mutex<HashMap<String, SessionEntry>>,
    reaper: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionStoreManager {
    /// Create a manager, creating the base directory if missing, and start
    /// the idle reaper when an async runtime is available.
    pub fn new(config: SessionStoreConfig) -> Result<Arc<Self>, SessionError> {
        std::fs::create_dir_all(&config.base_path)?;
        let base_path = config.base_path.canonicalize()?;

        let manager = Arc::new(SessionStoreManager {
            config,
            base_path,
            epoch: Instant::now(),
            state: Mutex::new(HashMap::new()),
            reaper: std::sync::Mutex::new(None),
        });
        Self::spawn_reaper(&manager);
        Ok(manager)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn touch(&self, entry: &mut SessionEntry) {
        entry.last_accessed = Utc::now();
        entry.last_accessed_micros = self.now_micros();
    }

    /// Open a session store, creating it if missing, loading the ontology
    /// into fresh stores, and evicting the LRU entry when the open-set is
    /// full. Failures leave the registry unchanged and close any
    /// partially-opened store.
    pub async fn open_or_create(&self, session_id: &str) -> Result<Arc<TripleStore>, SessionError> {
        if !is_safe_identifier(session_id) {
            return Err(SessionError::InvalidSessionId);
        }

        let mut state = self.state.lock().await;
        if let Some(entry) = state.get_mut(session_id) {
            self.touch(entry);
            return Ok(entry.store.clone());
        }

        if state.len() >= self.config.max_open_stores {
            self.evict_lru(&mut state);
        }

        let path = resolve_session_path(&self.base_path, session_id)?;
        let storage_type = self.config.storage_type;
        let store = tokio::task::spawn_blocking(move || TripleStore::open(path, true, storage_type))
            .await
            .map_err(|e| SessionError::StoreOpenFailed(e.to_string()))?
            .map_err(|e| SessionError::StoreOpenFailed(e.to_string()))?;
        let store = Arc::new(store);

        let probe = store.clone();
        let loaded = tokio::task::spawn_blocking(move || ontology::ensure_loaded(&probe))
            .await
            .map_err(|e| SessionError::OntologyLoadFailed(e.to_string()));
        match loaded {
            Ok(Ok(count)) => {
                if count > 0 {
                    debug!("Session {} bootstrapped with {} ontology triples", session_id, count);
                }
            }
            Ok(Err(e)) => {
                if let Err(close_err) = store.close() {
                    warn!("Error closing partial store {}: {}", session_id, close_err);
                }
                return Err(SessionError::OntologyLoadFailed(e.to_string()));
            }
            Err(e) => {
                if let Err(close_err) = store.close() {
                    warn!("Error closing partial store {}: {}", session_id, close_err);
                }
                return Err(e);
            }
        }

        let now = Utc::now();
        state.insert(
            session_id.to_string(),
            SessionEntry {
                store: store.clone(),
                opened_at: now,
                last_accessed: now,
                last_accessed_micros: self.now_micros(),
                ontology_loaded: true,
            },
        );
        info!("Opened session store {} ({} open)", session_id, state.len());
        Ok(store)
    }

    /// Fetch an open store, refreshing its recency. Never creates.
    pub async fn get(&self, session_id: &str) -> Result<Arc<TripleStore>, SessionError> {
        if !is_safe_identifier(session_id) {
            return Err(SessionError::InvalidSessionId);
        }
        let mut state = self.state.lock().await;
        match state.get_mut(session_id) {
            Some(entry) => {
                self.touch(entry);
                Ok(entry.store.clone())
            }
            None => Err(SessionError::NotFound),
        }
    }

    pub async fn metadata(&self, session_id: &str) -> Result<SessionMetadata, SessionError> {
        if !is_safe_identifier(session_id) {
            return Err(SessionError::InvalidSessionId);
        }
        let state = self.state.lock().await;
        state
            .get(session_id)
            .map(SessionEntry::metadata)
            .ok_or(SessionError::NotFound)
    }

    /// Probe the underlying store. Runs on the mailbox like every other
    /// operation; an unhealthy store stays open for the caller to decide.
    pub async fn health(&self, session_id: &str) -> Result<HealthStatus, SessionError> {
        if !is_safe_identifier(session_id) {
            return Err(SessionError::InvalidSessionId);
        }
        let store = {
            let state = self.state.lock().await;
            state
                .get(session_id)
                .map(|entry| entry.store.clone())
                .ok_or(SessionError::NotFound)?
        };
        let probed = tokio::task::spawn_blocking(move || store.health())
            .await
            .map_err(|e| SessionError::StoreOpenFailed(e.to_string()))?;
        Ok(match probed {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy {
                detail: e.to_string(),
            },
        })
    }

    /// Close one session store. Closing an unknown session is a success.
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        if !is_safe_identifier(session_id) {
            return Err(SessionError::InvalidSessionId);
        }
        let entry = {
            let mut state = self.state.lock().await;
            state.remove(session_id)
        };
        let Some(entry) = entry else {
            return Ok(());
        };
        self.close_with_timeout(session_id, entry.store).await;
        Ok(())
    }

    /// Close every open store in parallel with a per-store timeout.
    /// Stragglers are logged and abandoned so shutdown cannot deadlock.
    pub async fn close_all(&self) {
        let entries: Vec<(String, Arc<TripleStore>)> = {
            let mut state = self.state.lock().await;
            state.drain().map(|(id, entry)| (id, entry.store)).collect()
        };
        if entries.is_empty() {
            return;
        }
        info!("Closing {} session stores", entries.len());

        let handles: Vec<(String, tokio::task::JoinHandle<_>)> = entries
            .into_iter()
            .map(|(id, store)| {
                let handle = tokio::task::spawn_blocking(move || store.close());
                (id, handle)
            })
            .collect();

        let timeout = Duration::from_millis(self.config.close_timeout_ms);
        for (id, handle) in handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!("Error closing store {}: {}", id, e),
                Ok(Err(e)) => warn!("Close task for store {} failed: {}", id, e),
                Err(_) => warn!(
                    "Store {} did not close within {:?}; abandoning",
                    id, timeout
                ),
            }
        }
    }

    /// Stop the reaper and close everything.
    pub async fn shutdown(&self) {
        match self.reaper.lock() {
            Ok(mut guard) => {
                if let Some(task) = guard.take() {
                    task.abort();
                }
            }
            // A poisoned handle slot cannot stop the reaper, but the task
            // only holds a weak reference and dies with the manager.
            Err(_) => warn!("Reaper handle lock poisoned; skipping abort"),
        }
        self.close_all().await;
        info!("Session store manager shut down");
    }

    pub async fn list_open(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn is_open(&self, session_id: &str) -> bool {
        let state = self.state.lock().await;
        state.contains_key(session_id)
    }

    pub async fn open_count(&self) -> usize {
        let state = self.state.lock().await;
        state.len()
    }

    /// Close every entry idle longer than the configured timeout. Runs on
    /// the reaper schedule; exposed for deterministic tests.
    pub async fn reap_idle(&self) -> usize {
        let idle_micros = self.config.idle_timeout_ms.saturating_mul(1000);
        let now = self.now_micros();
        let mut state = self.state.lock().await;

        let expired: Vec<String> = state
            .iter()
            .filter(|(_, entry)| now.saturating_sub(entry.last_accessed_micros) > idle_micros)
            .map(|(id, _)| id.clone())
            .collect();

        let count = expired.len();
        for session_id in expired {
            if let Some(entry) = state.remove(&session_id) {
                info!("Reaping idle session store {}", session_id);
                if let Err(e) = entry.store.close() {
                    warn!("Error closing reaped store {}: {}", session_id, e);
                }
            }
        }
        count
    }

    /// Evict the least-recently-accessed entry. Ties break toward the
    /// lexicographically smallest id, which is arbitrary but deterministic.
    fn evict_lru(&self, state: &mut HashMap<String, SessionEntry>) {
        let victim = state
            .iter()
            .min_by_key(|(id, entry)| (entry.last_accessed_micros, (*id).clone()))
            .map(|(id, _)| id.clone());
        if let Some(victim) = victim {
            if let Some(entry) = state.remove(&victim) {
                info!("Evicting LRU session store {}", victim);
                if let Err(e) = entry.store.close() {
                    warn!("Error closing evicted store {}: {}", victim, e);
                }
            }
        }
    }

    async fn close_with_timeout(&self, session_id: &str, store: Arc<TripleStore>) {
        let timeout = Duration::from_millis(self.config.close_timeout_ms);
        let handle = tokio::task::spawn_blocking(move || store.close());
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(()))) => debug!("Closed session store {}", session_id),
            Ok(Ok(Err(e))) => warn!("Error closing store {}: {}", session_id, e),
            Ok(Err(e)) => warn!("Close task for store {} failed: {}", session_id, e),
            Err(_) => warn!(
                "Store {} did not close within {:?}; abandoning",
                session_id, timeout
            ),
        }
    }

    fn spawn_reaper(manager: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime at construction; idle reaping disabled");
            return;
        };
        let weak = Arc::downgrade(manager);
        let period = Duration::from_millis(manager.config.cleanup_interval_ms.max(1));
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick carries no work
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let reaped = manager.reap_idle().await;
                if reaped > 0 {
                    debug!("Idle reaper closed {} stores", reaped);
                }
            }
        });
        if let Ok(mut guard) = manager.reaper.lock() {
            *guard = Some(task);
        }
    }
}

/// Compute and verify the store path for a session: the directory name must
/// be a single normal path component, and the created directory must
/// re-expand to a location strictly inside the base path. Defense in depth
/// on top of identifier validation.
fn resolve_session_path(base_path: &Path, session_id: &str) -> Result<PathBuf, SessionError> {
    let dir_name = format!("session_{}", session_id);
    let mut components = Path::new(&dir_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err(SessionError::PathTraversalDetected),
    }

    let candidate = base_path.join(&dir_name);
    std::fs::create_dir_all(&candidate)?;
    let resolved = candidate.canonicalize()?;
    if !resolved.starts_with(base_path) || resolved == *base_path {
        let _ = std::fs::remove_dir(&candidate);
        return Err(SessionError::PathTraversalDetected);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_components_are_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        for bad in ["../escape", "a/b", "x/../../y"] {
            assert!(matches!(
                resolve_session_path(&base, bad),
                Err(SessionError::PathTraversalDetected)
            ));
        }
        // Nothing was created outside or inside the base directory.
        assert_eq!(std::fs::read_dir(&base).unwrap().count(), 0);
    }

    #[test]
    fn plain_ids_resolve_inside_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let resolved = resolve_session_path(&base, "sess-A").unwrap();
        assert!(resolved.starts_with(&base));
        assert!(resolved.ends_with("session_sess-A"));
    }

    #[test]
    fn symlinked_session_dir_escaping_base_is_rejected() {
        #[cfg(unix)]
        {
            let outside = tempfile::tempdir().unwrap();
            let dir = tempfile::tempdir().unwrap();
            let base = dir.path().canonicalize().unwrap();
            std::os::unix::fs::symlink(outside.path(), base.join("session_evil")).unwrap();
            assert!(matches!(
                resolve_session_path(&base, "evil"),
                Err(SessionError::PathTraversalDetected)
            ));
        }
    }
}
