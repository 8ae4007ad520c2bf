// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The triple store adapter and the relevance & graph engine
//!
//! `adapter` is the record-level API; `compose` and `decode` are its SPARQL
//! composition and solution decoding halves. `relevance` and `graph` host
//! the read-only scoring and traversal engine.

pub mod adapter;
pub mod compose;
pub mod decode;
pub mod graph;
pub mod relevance;

pub use adapter::{
    MemoryAdapter, MemoryError, MemoryStats, QueryOptions, UpdateFields, DEFAULT_QUERY_LIMIT,
    MAX_QUERY_LIMIT,
};
pub use graph::{Relationship, TraversalOptions};
pub use relevance::{ContextOptions, ScoredMemory};
