// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Solution-row decoding
//!
//! Maps SPARQL solutions back onto [`MemoryRecord`]s. Decoding is lenient at
//! the literal level: a literal that does not parse degrades to a safe
//! default (zero, empty string, the current timestamp) rather than failing
//! the whole query. Structural problems - a subject outside the record IRI
//! space, an unknown class - drop the row with a warning instead.

use crate::model::{MemoryRecord, MemoryType, SourceType, DELETED_SENTINEL};
use crate::ontology::NAMESPACE;
use crate::rdf::term::Term;
use crate::sparql::QuerySolution;
use chrono::{DateTime, Utc};
use log::warn;

/// Strip the ontology namespace from an IRI.
pub fn local_name(iri: &str) -> Option<&str> {
    iri.strip_prefix(NAMESPACE)
}

/// `jido:memory_<id>` -> `<id>`
pub fn memory_id_from_iri(iri: &str) -> Option<&str> {
    local_name(iri)?.strip_prefix("memory_")
}

/// `jido:session_<id>` -> `<id>`
pub fn session_id_from_iri(iri: &str) -> Option<&str> {
    local_name(iri)?.strip_prefix("session_")
}

/// `jido:project_<id>` -> `<id>`
pub fn project_id_from_iri(iri: &str) -> Option<&str> {
    local_name(iri)?.strip_prefix("project_")
}

/// Lenient string view of an optional binding.
fn term_string(term: Option<&Term>) -> String {
    term.map(|t| t.lexical().to_string()).unwrap_or_default()
}

/// Lenient float view; undecodable values degrade to 0.0.
fn term_f64(term: Option<&Term>) -> f64 {
    term.and_then(Term::as_f64).unwrap_or(0.0)
}

/// Lenient counter view; undecodable values degrade to 0.
fn term_u64(term: Option<&Term>) -> u64 {
    term.and_then(Term::as_f64)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .unwrap_or(0)
}

/// Lenient timestamp view; undecodable values degrade to now.
fn term_datetime(term: Option<&Term>) -> DateTime<Utc> {
    term.and_then(|t| DateTime::parse_from_rfc3339(t.lexical()).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn term_datetime_opt(term: Option<&Term>) -> Option<DateTime<Utc>> {
    term.and_then(|t| DateTime::parse_from_rfc3339(t.lexical()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Decode the supersession target: a replacement id or the deleted sentinel.
fn superseded_by(term: Option<&Term>) -> Option<String> {
    let iri = term?.as_iri()?;
    if let Some(id) = memory_id_from_iri(iri) {
        return Some(id.to_string());
    }
    // Anything else in supersededBy position is the deletion marker.
    Some(DELETED_SENTINEL.to_string())
}

/// Decode one projection row into a record. Rows that do not describe a
/// well-formed record (foreign subject, unknown class) are dropped.
pub fn record_from_solution(row: &QuerySolution) -> Option<MemoryRecord> {
    let memory_iri = row.get("memory")?.as_iri()?;
    let Some(id) = memory_id_from_iri(memory_iri) else {
        warn!("Skipping row with non-record subject {}", memory_iri);
        return None;
    };

    let type_iri = row.get("type")?.as_iri()?;
    let Some(memory_type) = local_name(type_iri).and_then(MemoryType::from_class_local) else {
        warn!("Skipping record {} with unknown class {}", id, type_iri);
        return None;
    };

    let session_id = row
        .get("session")
        .and_then(|t| t.as_iri())
        .and_then(session_id_from_iri)
        .unwrap_or_default()
        .to_string();

    let source_type = row
        .get("source")
        .and_then(|t| t.as_iri())
        .and_then(local_name)
        .and_then(SourceType::from_individual_local)
        .unwrap_or(SourceType::Agent);

    let project_id = row
        .get("project")
        .and_then(|t| t.as_iri())
        .and_then(project_id_from_iri)
        .map(str::to_string);

    let rationale = row
        .get("rationale")
        .map(|t| t.lexical().to_string())
        .filter(|s| !s.is_empty());

    Some(MemoryRecord {
        id: id.to_string(),
        content: term_string(row.get("content")),
        memory_type,
        confidence: term_f64(row.get("confidence")),
        source_type,
        session_id,
        project_id,
        rationale,
        evidence_refs: Vec::new(),
        created_at: term_datetime(row.get("created")),
        superseded_by: superseded_by(row.get("superseded")),
        access_count: term_u64(row.get("accessCount")),
        last_accessed: term_datetime_opt(row.get("lastAccessed")),
    })
}
