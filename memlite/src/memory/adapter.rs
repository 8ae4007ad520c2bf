// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record-level adapter over a session's triple store
//!
//! The one entry point external code uses to persist, query, supersede, and
//! score memory records. The adapter is stateless aside from the store
//! handle and an optional caller-supplied per-session record cap; it
//! validates every identifier before composition, composes the SPARQL
//! subset, and decodes solutions back into records.

use crate::memory::compose::{self, RecordCount, RecordSelect};
use crate::memory::decode::record_from_solution;
use crate::memory::graph::{self, Relationship, TraversalOptions};
use crate::memory::relevance::{self, ContextOptions, ScoredMemory};
use crate::model::{
    is_safe_identifier, ConfidenceLevel, MemoryRecord, MemoryType, MAX_CONTENT_BYTES,
    MAX_EVIDENCE_REFS, MAX_RATIONALE_BYTES,
};
use crate::store::{StoreError, TripleStore};
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Default ceiling for record queries.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Hard ceiling for record queries.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Candidate-set size fetched for relevance scoring.
const CONTEXT_SCAN_LIMIT: usize = 500;

/// Adapter-level errors.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory id")]
    InvalidMemoryId,

    #[error("Invalid session id")]
    InvalidSessionId,

    #[error("Invalid project id")]
    InvalidProjectId,

    #[error("Invalid memory type: {0}")]
    InvalidMemoryType(String),

    #[error("Invalid confidence {0}; expected a value in [0.0, 1.0]")]
    InvalidConfidence(f64),

    #[error("Record validation failed: {0}")]
    InvalidRecord(String),

    #[error("Update must supply at least one field")]
    InvalidUpdate,

    #[error("Memory {0} already exists")]
    DuplicateMemoryId(String),

    #[error("Memory {0} is superseded and can no longer change")]
    MemorySuperseded(String),

    #[error("Session memory limit of {0} reached")]
    SessionMemoryLimitExceeded(usize),

    #[error("Not found")]
    NotFound,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Query options for record retrieval.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Maximum records to return; defaults to [`DEFAULT_QUERY_LIMIT`],
    /// capped at [`MAX_QUERY_LIMIT`].
    pub limit: Option<usize>,
    pub min_confidence: Option<ConfidenceLevel>,
    pub include_superseded: bool,
    /// Session queries with a type short-circuit into the typed form.
    pub memory_type: Option<MemoryType>,
}

/// Bounded field update: at least one field must be supplied.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub confidence: Option<f64>,
    pub append_evidence: Vec<String>,
    pub append_rationale: Option<String>,
}

/// Aggregate statistics for one session's records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    pub triple_count: u64,
    pub distinct_subjects: u64,
    pub distinct_predicates: u64,
    pub distinct_objects: u64,
    pub by_type: HashMap<String, u64>,
    pub by_confidence: HashMap<String, u64>,
    pub with_evidence: u64,
    pub with_rationale: u64,
    pub active: u64,
    pub superseded: u64,
}

impl MemoryStats {
    /// JSON snapshot for diagnostics and logging sinks.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Record-level API over a session's triple store.
pub struct MemoryAdapter {
    store: Arc<TripleStore>,
    session_limit: Option<usize>,
}

impl MemoryAdapter {
    pub fn new(store: Arc<TripleStore>) -> Self {
        MemoryAdapter {
            store,
            session_limit: None,
        }
    }

    /// Apply a caller-supplied per-session record cap. The cap counts every
    /// stored record, superseded ones included.
    pub fn with_session_limit(mut self, limit: Option<usize>) -> Self {
        self.session_limit = limit;
        self
    }

    pub(crate) fn store(&self) -> &TripleStore {
        &self.store
    }

    // === Validation helpers ===

    fn validate_memory_id(id: &str) -> Result<(), MemoryError> {
        if is_safe_identifier(id) {
            Ok(())
        } else {
            Err(MemoryError::InvalidMemoryId)
        }
    }

    fn validate_session_id(id: &str) -> Result<(), MemoryError> {
        if is_safe_identifier(id) {
            Ok(())
        } else {
            Err(MemoryError::InvalidSessionId)
        }
    }

    /// Parse a memory type tag, surfacing the adapter's typed error.
    pub fn parse_memory_type(tag: &str) -> Result<MemoryType, MemoryError> {
        tag.parse::<MemoryType>()
            .map_err(|_| MemoryError::InvalidMemoryType(tag.to_string()))
    }

    // === Persist ===

    /// Persist a new record. The record becomes observable to queries from
    /// the same session immediately.
    pub fn persist(&self, record: &MemoryRecord) -> Result<String, MemoryError> {
        Self::validate_memory_id(&record.id)?;
        Self::validate_session_id(&record.session_id)?;
        if let Some(project_id) = &record.project_id {
            if !is_safe_identifier(project_id) {
                return Err(MemoryError::InvalidProjectId);
            }
        }
        if !(0.0..=1.0).contains(&record.confidence) {
            return Err(MemoryError::InvalidConfidence(record.confidence));
        }
        if record.content.len() > MAX_CONTENT_BYTES {
            return Err(MemoryError::InvalidRecord(format!(
                "content exceeds {} bytes",
                MAX_CONTENT_BYTES
            )));
        }
        if let Some(rationale) = &record.rationale {
            if rationale.len() > MAX_RATIONALE_BYTES {
                return Err(MemoryError::InvalidRecord(format!(
                    "rationale exceeds {} bytes",
                    MAX_RATIONALE_BYTES
                )));
            }
        }
        if record.evidence_refs.len() > MAX_EVIDENCE_REFS {
            return Err(MemoryError::InvalidRecord(format!(
                "evidence_refs exceeds {} entries",
                MAX_EVIDENCE_REFS
            )));
        }

        if self.fetch_by_id(&record.id)?.is_some() {
            return Err(MemoryError::DuplicateMemoryId(record.id.clone()));
        }

        if let Some(limit) = self.session_limit {
            let stored = self.count(
                &record.session_id,
                &QueryOptions {
                    include_superseded: true,
                    ..QueryOptions::default()
                },
            );
            if stored >= limit {
                return Err(MemoryError::SessionMemoryLimitExceeded(limit));
            }
        }

        self.store.update(&compose::insert_record(record))?;
        Ok(record.id.clone())
    }

    // === Queries ===

    /// Active records of one session, most recent first.
    pub fn query_by_session(
        &self,
        session_id: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        if let Some(memory_type) = opts.memory_type {
            return self.query_by_type(session_id, memory_type, opts);
        }
        Self::validate_session_id(session_id)?;
        self.run_record_select(RecordSelect {
            session_id: Some(session_id),
            min_confidence: opts.min_confidence,
            include_superseded: opts.include_superseded,
            limit: Some(effective_limit(opts.limit)),
            order_by_created: true,
            ..RecordSelect::default()
        })
    }

    /// Active records of one session and type, most recent first.
    pub fn query_by_type(
        &self,
        session_id: &str,
        memory_type: MemoryType,
        opts: &QueryOptions,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        Self::validate_session_id(session_id)?;
        self.run_record_select(RecordSelect {
            session_id: Some(session_id),
            memory_type: Some(memory_type),
            min_confidence: opts.min_confidence,
            include_superseded: opts.include_superseded,
            limit: Some(effective_limit(opts.limit)),
            order_by_created: true,
            ..RecordSelect::default()
        })
    }

    /// Active records of one session and project, most recent first.
    pub(crate) fn query_by_project(
        &self,
        session_id: &str,
        project_id: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        Self::validate_session_id(session_id)?;
        if !is_safe_identifier(project_id) {
            return Err(MemoryError::InvalidProjectId);
        }
        self.run_record_select(RecordSelect {
            session_id: Some(session_id),
            project_id: Some(project_id),
            min_confidence: opts.min_confidence,
            include_superseded: opts.include_superseded,
            limit: Some(effective_limit(opts.limit)),
            order_by_created: true,
            ..RecordSelect::default()
        })
    }

    /// Internal id lookup with no ownership check. Superseded records are
    /// found too.
    pub(crate) fn fetch_by_id(
        &self,
        memory_id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        Self::validate_memory_id(memory_id)?;
        let mut records = self.run_record_select(RecordSelect {
            memory_id: Some(memory_id),
            include_superseded: true,
            limit: Some(1),
            ..RecordSelect::default()
        })?;
        Ok(records.pop())
    }

    /// Id lookup scoped to a session; `None` when the record does not exist
    /// or belongs to another session.
    pub(crate) fn fetch_in_session(
        &self,
        session_id: &str,
        memory_id: &str,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        Self::validate_session_id(session_id)?;
        let record = self.fetch_by_id(memory_id)?;
        Ok(record.filter(|r| r.session_id == session_id))
    }

    /// Public id lookup. A record owned by another session is
    /// indistinguishable from a missing one.
    pub fn query_by_id(
        &self,
        session_id: &str,
        memory_id: &str,
    ) -> Result<MemoryRecord, MemoryError> {
        self.fetch_in_session(session_id, memory_id)?
            .ok_or(MemoryError::NotFound)
    }

    fn run_record_select(
        &self,
        spec: RecordSelect<'_>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let rows = self.store.select(&compose::select_records(&spec))?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(mut record) = record_from_solution(row) {
                record.evidence_refs = self.fetch_evidence(&record.id)?;
                records.push(record);
            }
        }
        Ok(records)
    }

    fn fetch_evidence(&self, memory_id: &str) -> Result<Vec<String>, MemoryError> {
        let rows = self.store.select(&compose::select_evidence(memory_id))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("ref"))
            .map(|term| term.lexical().to_string())
            .collect())
    }

    // === Lifecycle ===

    /// Mark a record as replaced by `new_id`, or soft-deleted when absent.
    /// Re-superseding an already-superseded record is a no-op success.
    pub fn supersede(
        &self,
        session_id: &str,
        old_id: &str,
        new_id: Option<&str>,
    ) -> Result<(), MemoryError> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(old_id)?;
        if let Some(new_id) = new_id {
            Self::validate_memory_id(new_id)?;
        }

        let record = self
            .fetch_in_session(session_id, old_id)?
            .ok_or(MemoryError::NotFound)?;
        if !record.is_active() {
            return Ok(());
        }

        self.store
            .update(&compose::insert_supersession(old_id, new_id))?;
        Ok(())
    }

    /// Soft delete: supersession by the deletion marker. Deleting a record
    /// that does not exist is a success.
    pub fn delete(&self, session_id: &str, memory_id: &str) -> Result<(), MemoryError> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(memory_id)?;

        match self.fetch_in_session(session_id, memory_id)? {
            None => Ok(()),
            Some(record) if !record.is_active() => Ok(()),
            Some(_) => {
                self.store
                    .update(&compose::insert_supersession(memory_id, None))?;
                Ok(())
            }
        }
    }

    /// Bounded field update of an active record.
    pub fn update(
        &self,
        session_id: &str,
        memory_id: &str,
        fields: &UpdateFields,
    ) -> Result<(), MemoryError> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(memory_id)?;

        if fields.confidence.is_none()
            && fields.append_evidence.is_empty()
            && fields.append_rationale.is_none()
        {
            return Err(MemoryError::InvalidUpdate);
        }

        let record = self
            .fetch_in_session(session_id, memory_id)?
            .ok_or(MemoryError::NotFound)?;
        if !record.is_active() {
            return Err(MemoryError::MemorySuperseded(memory_id.to_string()));
        }

        if let Some(confidence) = fields.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(MemoryError::InvalidConfidence(confidence));
            }
        }
        if record.evidence_refs.len() + fields.append_evidence.len() > MAX_EVIDENCE_REFS {
            return Err(MemoryError::InvalidRecord(format!(
                "evidence_refs exceeds {} entries",
                MAX_EVIDENCE_REFS
            )));
        }
        let combined_rationale = fields.append_rationale.as_ref().map(|appended| {
            match &record.rationale {
                Some(existing) => format!("{}\n\n{}", existing, appended),
                None => appended.clone(),
            }
        });
        if let Some(combined) = &combined_rationale {
            if combined.len() > MAX_RATIONALE_BYTES {
                return Err(MemoryError::InvalidRecord(format!(
                    "rationale exceeds {} bytes",
                    MAX_RATIONALE_BYTES
                )));
            }
        }

        if let Some(confidence) = fields.confidence {
            self.store
                .update(&compose::delete_property(memory_id, "confidenceScore"))?;
            self.store
                .update(&compose::delete_property(memory_id, "confidenceLevel"))?;
            self.store
                .update(&compose::insert_confidence(memory_id, confidence))?;
        }
        if !fields.append_evidence.is_empty() {
            self.store
                .update(&compose::insert_evidence(memory_id, &fields.append_evidence))?;
        }
        if let Some(combined) = combined_rationale {
            self.store
                .update(&compose::delete_property(memory_id, "rationale"))?;
            self.store
                .update(&compose::insert_rationale(memory_id, &combined))?;
        }
        Ok(())
    }

    /// Advance `last_accessed` and `access_count`. Best effort: missing
    /// records and backend failures are silent (logged, not surfaced).
    pub fn record_access(&self, session_id: &str, memory_id: &str) -> Result<(), MemoryError> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(memory_id)?;

        let record = match self.fetch_in_session(session_id, memory_id) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("record_access lookup failed for {}: {}", memory_id, e);
                return Ok(());
            }
        };

        let next_count = record.access_count.saturating_add(1);
        let now = chrono::Utc::now();
        let updates = [
            compose::delete_property(memory_id, "accessCount"),
            compose::delete_property(memory_id, "lastAccessed"),
            compose::insert_access(memory_id, next_count, &now),
        ];
        for sparql in updates {
            if let Err(e) = self.store.update(&sparql) {
                warn!("record_access update failed for {}: {}", memory_id, e);
                return Ok(());
            }
        }
        Ok(())
    }

    // === Aggregates ===

    /// Count records matching the options. Backend errors degrade to 0.
    pub fn count(&self, session_id: &str, opts: &QueryOptions) -> usize {
        if !is_safe_identifier(session_id) {
            warn!("count called with invalid session id");
            return 0;
        }
        let sparql = compose::count_records(&RecordCount {
            session_id,
            memory_type: opts.memory_type,
            min_confidence: opts.min_confidence,
            include_superseded: opts.include_superseded,
            ..RecordCount::default()
        });
        self.count_scalar(&sparql) as usize
    }

    fn count_scalar(&self, sparql: &str) -> u64 {
        match self.store.select(sparql) {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(|term| term.as_f64())
                .map(|v| v as u64)
                .unwrap_or(0),
            Err(e) => {
                warn!("count query failed: {}", e);
                0
            }
        }
    }

    /// Aggregate statistics for one session. Individual failures degrade to
    /// zero counts rather than failing the whole call.
    pub fn get_stats(&self, session_id: &str) -> MemoryStats {
        if !is_safe_identifier(session_id) {
            warn!("get_stats called with invalid session id");
            return MemoryStats::default();
        }

        let mut stats = MemoryStats {
            triple_count: self.count_scalar(&compose::count_triples()),
            distinct_subjects: self.count_scalar(&compose::count_distinct_position('s')),
            distinct_predicates: self.count_scalar(&compose::count_distinct_position('p')),
            distinct_objects: self.count_scalar(&compose::count_distinct_position('o')),
            ..MemoryStats::default()
        };

        for memory_type in MemoryType::ALL {
            let count = self.count_scalar(&compose::count_records(&RecordCount {
                session_id,
                memory_type: Some(memory_type),
                include_superseded: true,
                ..RecordCount::default()
            }));
            if count > 0 {
                stats.by_type.insert(memory_type.as_str().to_string(), count);
            }
        }

        let buckets = [
            ("high", Some(ConfidenceLevel::High), None),
            ("medium", Some(ConfidenceLevel::Medium), Some(0.8)),
            ("low", None, Some(0.5)),
        ];
        for (label, min_confidence, max_confidence_exclusive) in buckets {
            let count = self.count_scalar(&compose::count_records(&RecordCount {
                session_id,
                min_confidence,
                max_confidence_exclusive,
                include_superseded: true,
                ..RecordCount::default()
            }));
            if count > 0 {
                stats.by_confidence.insert(label.to_string(), count);
            }
        }

        stats.with_evidence = self.count_scalar(&compose::count_records(&RecordCount {
            session_id,
            requires_property: Some("evidenceRef"),
            include_superseded: true,
            ..RecordCount::default()
        }));
        stats.with_rationale = self.count_scalar(&compose::count_records(&RecordCount {
            session_id,
            requires_property: Some("rationale"),
            include_superseded: true,
            ..RecordCount::default()
        }));
        stats.active = self.count_scalar(&compose::count_records(&RecordCount {
            session_id,
            ..RecordCount::default()
        }));
        stats.superseded = self.count_scalar(&compose::count_records(&RecordCount {
            session_id,
            only_superseded: true,
            ..RecordCount::default()
        }));

        stats
    }

    // === Relevance & graph engine ===

    /// Top-N active records scored against a free-text hint.
    pub fn get_context(
        &self,
        session_id: &str,
        hint: &str,
        opts: &ContextOptions,
    ) -> Result<Vec<ScoredMemory>, MemoryError> {
        Self::validate_session_id(session_id)?;
        let candidates = self.query_by_session(
            session_id,
            &QueryOptions {
                limit: Some(CONTEXT_SCAN_LIMIT),
                min_confidence: opts.min_confidence,
                include_superseded: false,
                memory_type: None,
            },
        )?;
        Ok(relevance::rank(candidates, hint, opts))
    }

    /// Bounded breadth-first relationship traversal from `start_id`.
    pub fn query_related(
        &self,
        session_id: &str,
        start_id: &str,
        relationship: Relationship,
        opts: &TraversalOptions,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        Self::validate_session_id(session_id)?;
        Self::validate_memory_id(start_id)?;
        graph::traverse(self, session_id, start_id, relationship, opts)
    }
}

fn effective_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_QUERY_LIMIT)
}
