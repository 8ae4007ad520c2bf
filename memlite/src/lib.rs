// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! MemLite - A lightweight RDF-backed session memory store
//!
//! MemLite is the persistent long-term memory subsystem of a coding-assistant
//! runtime: a session-isolated knowledge store that records facts,
//! assumptions, decisions, conventions, risks, and lessons - and their
//! relationships - over the life of many concurrent interactive sessions.
//!
//! # Features
//!
//! - **Session isolation**: one durable RDF store per session under a shared
//!   base directory; retrieval by id never crosses sessions
//! - **Managed open-set**: LRU eviction and idle reaping keep the number of
//!   open stores within a configured budget
//! - **Ontology bootstrap**: a fixed schema of classes, properties, and
//!   individuals is materialized into each fresh store exactly once
//! - **SPARQL subset**: the store parses and evaluates exactly the queries
//!   and updates the record adapter emits
//! - **Relevance scoring**: context retrieval blends text similarity,
//!   recency, confidence, and access frequency
//! - **Bounded traversal**: cycle-safe breadth-first walks over id-valued
//!   relationships between records
//!
//! # Usage
//!
//! ```ignore
//! let manager = SessionStoreManager::new(SessionStoreConfig::default())?;
//! let store = manager.open_or_create("sess-A").await?;
//! let adapter = MemoryAdapter::new(store);
//!
//! let record = MemoryRecord::new("mem-aaa", "sess-A", MemoryType::Fact, "uses HTTP/2");
//! adapter.persist(&record)?;
//! let context = adapter.get_context("sess-A", "http server", &ContextOptions::default())?;
//! ```

// Public modules - the API surface external users work with
pub mod memory;
pub mod ontology;
pub mod session;

// Internal modules - exposed types are re-exported below
pub(crate) mod model;
pub(crate) mod rdf;
pub(crate) mod sparql;
pub(crate) mod store;

// Re-export the public API
pub use memory::{
    ContextOptions, MemoryAdapter, MemoryError, MemoryStats, QueryOptions, Relationship,
    ScoredMemory, TraversalOptions, UpdateFields, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT,
};
pub use model::{
    is_safe_identifier, ConfidenceLevel, MemoryRecord, MemoryType, SourceType, DELETED_SENTINEL,
    MAX_CONTENT_BYTES, MAX_EVIDENCE_REFS, MAX_RATIONALE_BYTES,
};
pub use ontology::{OntologyError, NAMESPACE, ONTOLOGY_DOCUMENTS};
pub use session::{
    HealthStatus, SessionError, SessionMetadata, SessionStoreConfig, SessionStoreManager,
};
pub use rdf::turtle::TurtleError;
pub use rdf::{Literal, Term, Triple};
pub use sparql::{QueryResults, QuerySolution, SparqlError};
pub use store::persistent::StorageDriverError;
pub use store::{StorageType, StoreError, TripleStore};

/// MemLite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// MemLite crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
