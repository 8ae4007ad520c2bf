// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Domain model: memory records, closed enumerations, identifier validation.

pub mod ident;
pub mod record;

pub use ident::is_safe_identifier;
pub use record::{
    ConfidenceLevel, MemoryRecord, MemoryType, SourceType, DELETED_SENTINEL, MAX_CONTENT_BYTES,
    MAX_EVIDENCE_REFS, MAX_RATIONALE_BYTES,
};
