// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-session triple storage
//!
//! This module provides:
//! - An insertion-ordered in-memory triple index for query evaluation
//! - A durable, sequence-keyed triple log behind pluggable storage drivers
//! - The per-session [`TripleStore`] combining both, with SPARQL query and
//!   update entry points

pub mod index;
pub mod persistent;
pub mod triple_store;

pub use persistent::StorageType;
pub use triple_store::{StoreError, TripleStore};
