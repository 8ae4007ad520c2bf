// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded relationship traversal
//!
//! Breadth-first walk over id-valued edges between records. Edges are ids,
//! not pointers, so cycles are natural; the visited set keyed by id keeps
//! the walk terminating. `same_type` and `same_project` scan the session's
//! active records and are O(n) in the session's record count; per-session
//! scale keeps that bounded.

use crate::memory::adapter::{MemoryAdapter, MemoryError, QueryOptions, MAX_QUERY_LIMIT};
use crate::memory::compose;
use crate::memory::decode::memory_id_from_iri;
use crate::model::{is_safe_identifier, MemoryRecord};
use std::collections::HashSet;

/// Depth bound for traversal.
const MAX_DEPTH: usize = 5;

/// Per-level result bound.
const MAX_LEVEL_LIMIT: usize = 100;
const DEFAULT_LEVEL_LIMIT: usize = 10;

/// Relationship tags the traversal understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// Record -> records named in its evidence references.
    DerivedFrom,
    /// Record -> the record that replaced it.
    SupersededBy,
    /// Record -> records it replaced.
    Supersedes,
    /// Record -> other records of the same memory type.
    SameType,
    /// Record -> other records sharing its project.
    SameProject,
}

impl std::str::FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "derived_from" => Ok(Relationship::DerivedFrom),
            "superseded_by" => Ok(Relationship::SupersededBy),
            "supersedes" => Ok(Relationship::Supersedes),
            "same_type" => Ok(Relationship::SameType),
            "same_project" => Ok(Relationship::SameProject),
            _ => Err(format!("unknown relationship: {}", s)),
        }
    }
}

/// Traversal options. Depth is clamped to `[1, 5]`, the per-level limit to
/// `[1, 100]`.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub depth: usize,
    pub limit: usize,
    pub include_superseded: bool,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        TraversalOptions {
            depth: 1,
            limit: DEFAULT_LEVEL_LIMIT,
            include_superseded: false,
        }
    }
}

/// Breadth-first traversal from `start_id`. Results never include the start
/// record, are deduplicated across levels, and number at most depth * limit.
pub(crate) fn traverse(
    adapter: &MemoryAdapter,
    session_id: &str,
    start_id: &str,
    relationship: Relationship,
    opts: &TraversalOptions,
) -> Result<Vec<MemoryRecord>, MemoryError> {
    let depth = opts.depth.clamp(1, MAX_DEPTH);
    let limit = opts.limit.clamp(1, MAX_LEVEL_LIMIT);

    let start = adapter
        .fetch_in_session(session_id, start_id)?
        .ok_or(MemoryError::NotFound)?;

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.id.clone());

    let mut results: Vec<MemoryRecord> = Vec::new();
    let mut frontier = vec![start];

    for _ in 0..depth {
        let mut level: Vec<MemoryRecord> = Vec::new();
        'frontier: for record in &frontier {
            for neighbor in neighbors(adapter, session_id, record, relationship, opts)? {
                if !visited.insert(neighbor.id.clone()) {
                    continue;
                }
                level.push(neighbor);
                if level.len() >= limit {
                    break 'frontier;
                }
            }
        }
        if level.is_empty() {
            break;
        }
        results.extend(level.iter().cloned());
        frontier = level;
    }

    Ok(results)
}

fn neighbors(
    adapter: &MemoryAdapter,
    session_id: &str,
    record: &MemoryRecord,
    relationship: Relationship,
    opts: &TraversalOptions,
) -> Result<Vec<MemoryRecord>, MemoryError> {
    match relationship {
        Relationship::DerivedFrom => {
            let mut out = Vec::new();
            for reference in &record.evidence_refs {
                if !looks_like_memory_id(reference) {
                    continue;
                }
                if let Some(target) = adapter.fetch_in_session(session_id, reference)? {
                    if target.is_active() || opts.include_superseded {
                        out.push(target);
                    }
                }
            }
            Ok(out)
        }
        Relationship::SupersededBy => {
            // The chain is followed regardless of include_superseded; links
            // past the first are superseded by definition.
            if record.is_deleted() {
                return Ok(Vec::new());
            }
            let Some(target_id) = record.superseded_by.as_deref() else {
                return Ok(Vec::new());
            };
            if !is_safe_identifier(target_id) {
                return Ok(Vec::new());
            }
            match adapter.fetch_in_session(session_id, target_id)? {
                Some(target) => Ok(vec![target]),
                None => Ok(Vec::new()),
            }
        }
        Relationship::Supersedes => {
            let rows = adapter
                .store()
                .select(&compose::select_supersedes(session_id, &record.id))?;
            let mut out = Vec::new();
            for row in rows {
                let Some(id) = row
                    .get("memory")
                    .and_then(|t| t.as_iri())
                    .and_then(memory_id_from_iri)
                else {
                    continue;
                };
                if let Some(target) = adapter.fetch_in_session(session_id, id)? {
                    out.push(target);
                }
            }
            Ok(out)
        }
        Relationship::SameType => {
            let peers = adapter.query_by_type(
                session_id,
                record.memory_type,
                &QueryOptions {
                    limit: Some(MAX_QUERY_LIMIT),
                    include_superseded: opts.include_superseded,
                    ..QueryOptions::default()
                },
            )?;
            Ok(peers.into_iter().filter(|p| p.id != record.id).collect())
        }
        Relationship::SameProject => {
            let Some(project_id) = record.project_id.as_deref() else {
                return Ok(Vec::new());
            };
            let peers = adapter.query_by_project(
                session_id,
                project_id,
                &QueryOptions {
                    limit: Some(MAX_QUERY_LIMIT),
                    include_superseded: opts.include_superseded,
                    ..QueryOptions::default()
                },
            )?;
            Ok(peers.into_iter().filter(|p| p.id != record.id).collect())
        }
    }
}

/// Evidence entries that denote intra-store edges: a `mem-` prefix and a
/// shape that passes the identifier predicate.
fn looks_like_memory_id(reference: &str) -> bool {
    reference.starts_with("mem-") && is_safe_identifier(reference)
}
