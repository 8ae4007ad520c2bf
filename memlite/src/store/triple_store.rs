// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-session triple store
//!
//! One store holds one session's knowledge graph: an in-memory triple index
//! for query evaluation, backed by a sequence-keyed durable log in the
//! storage driver. Writes go through both synchronously; the log is replayed
//! into the index on open, preserving insertion order across restarts.
//!
//! Concurrent readers are safe; writes serialize on the index lock.

use crate::rdf::term::Triple;
use crate::rdf::turtle::{self, TurtleError};
use crate::sparql::eval::{evaluate_query, plan_update, QueryResults, QuerySolution};
use crate::sparql::{parse_query, parse_update, SparqlError};
use crate::store::index::TripleIndex;
use crate::store::persistent::{
    create_storage_driver, StorageDriver, StorageDriverError, StorageTree, StorageType,
};
use log::{debug, warn};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Tree holding the durable triple log (seq -> bincode triple).
const TRIPLES_TREE: &str = "triples";

/// Tree used for health probes.
const HEALTH_TREE: &str = "health";

/// Triple store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store handle is closed")]
    InvalidStore,

    #[error("Store does not exist at {0}")]
    DoesNotExist(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage driver error: {0}")]
    Driver(#[from] StorageDriverError),

    #[error("SPARQL error: {0}")]
    Sparql(#[from] SparqlError),

    #[error("Turtle error: {0}")]
    Turtle(#[from] TurtleError),

    #[error("Health probe failed: {0}")]
    Unhealthy(String),
}

/// A session's durable RDF store.
pub struct TripleStore {
    path: PathBuf,
    driver: Box<dyn StorageDriver<Tree = Box<dyn StorageTree>>>,
    log: Box<dyn StorageTree>,
    index: RwLock<TripleIndex>,
    closed: AtomicBool,
}

impl TripleStore {
    /// Open a store at `path`, replaying the durable log into memory.
    pub fn open(
        path: impl AsRef<Path>,
        create_if_missing: bool,
        storage_type: StorageType,
    ) -> Result<TripleStore, StoreError> {
        let path = path.as_ref().to_path_buf();

        if storage_type == StorageType::Sled {
            if !create_if_missing && !path.exists() {
                return Err(StoreError::DoesNotExist(path));
            }
            std::fs::create_dir_all(&path)?;
        }

        let driver = create_storage_driver(storage_type, &path)?;
        let log = driver.open_tree(TRIPLES_TREE)?;

        let mut index = TripleIndex::new();
        let mut replayed = 0usize;
        for entry in log.iter()? {
            let (key, value) = entry?;
            let seq = match <[u8; 8]>::try_from(key.as_slice()) {
                Ok(bytes) => u64::from_be_bytes(bytes),
                Err(_) => {
                    warn!("Skipping log entry with malformed key in {:?}", path);
                    continue;
                }
            };
            let triple: Triple = bincode::deserialize(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            index.insert_with_seq(seq, triple);
            replayed += 1;
        }
        debug!("Opened store at {:?} with {} triples", path, replayed);

        Ok(TripleStore {
            path,
            driver,
            log,
            index: RwLock::new(index),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::InvalidStore)
        } else {
            Ok(())
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    pub fn triple_count(&self) -> usize {
        self.index.read().len()
    }

    /// Evaluate a SPARQL query (SELECT or ASK).
    pub fn query(&self, sparql: &str) -> Result<QueryResults, StoreError> {
        self.ensure_open()?;
        let query = parse_query(sparql)?;
        let index = self.index.read();
        Ok(evaluate_query(&index, &query)?)
    }

    /// Evaluate a SELECT query and return its rows.
    pub fn select(&self, sparql: &str) -> Result<Vec<QuerySolution>, StoreError> {
        match self.query(sparql)? {
            QueryResults::Solutions { rows, .. } => Ok(rows),
            QueryResults::Boolean(_) => Err(StoreError::Sparql(SparqlError::Parse(
                "expected a SELECT query".to_string(),
            ))),
        }
    }

    /// Evaluate an ASK query and return its answer.
    pub fn ask(&self, sparql: &str) -> Result<bool, StoreError> {
        match self.query(sparql)? {
            QueryResults::Boolean(answer) => Ok(answer),
            QueryResults::Solutions { .. } => Err(StoreError::Sparql(SparqlError::Parse(
                "expected an ASK query".to_string(),
            ))),
        }
    }

    /// Apply a SPARQL update: removes first, then inserts, written through
    /// to the durable log under the index write lock.
    pub fn update(&self, sparql: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let op = parse_update(sparql)?;
        let mut index = self.index.write();
        let plan = plan_update(&index, &op)?;

        for triple in &plan.removes {
            if let Some(seq) = index.remove(triple) {
                self.log.remove(&seq.to_be_bytes())?;
            }
        }
        for triple in plan.inserts {
            if let Some(seq) = index.insert(triple.clone()) {
                let value = bincode::serialize(&triple)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                self.log.insert(&seq.to_be_bytes(), &value)?;
            }
        }
        Ok(())
    }

    /// Insert parsed triples directly (ontology ingestion path).
    pub fn insert_triples(&self, triples: Vec<Triple>) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let mut index = self.index.write();
        let mut inserted = 0usize;
        for triple in triples {
            if let Some(seq) = index.insert(triple.clone()) {
                let value = bincode::serialize(&triple)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                self.log.insert(&seq.to_be_bytes(), &value)?;
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Parse a Turtle document and ingest its triples. Returns the number of
    /// triples the document contains; re-loading the same document is a
    /// no-op for triples already present.
    pub fn load(&self, ttl_path: &Path) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let text = std::fs::read_to_string(ttl_path)?;
        let triples = turtle::parse_document(&text)?;
        let total = triples.len();
        self.insert_triples(triples)?;
        debug!("Loaded {} triples from {:?}", total, ttl_path);
        Ok(total)
    }

    /// Probe the backing driver with a write/read/remove cycle.
    pub fn health(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let tree = self.driver.open_tree(HEALTH_TREE)?;
        let stamp = chrono::Utc::now().timestamp_micros().to_be_bytes();
        tree.insert(b"probe", &stamp)?;
        match tree.get(b"probe")? {
            Some(read) if read == stamp => {}
            other => {
                return Err(StoreError::Unhealthy(format!(
                    "probe read back {:?}",
                    other.map(|v| v.len())
                )))
            }
        }
        tree.remove(b"probe")?;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.log.flush()?;
        self.driver.flush()?;
        Ok(())
    }

    /// Flush and mark the handle unusable. Idempotent.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.log.flush()?;
        self.driver.flush()?;
        debug!("Closed store at {:?}", self.path);
        Ok(())
    }
}

impl std::fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleStore")
            .field("path", &self.path)
            .field("triples", &self.triple_count())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
