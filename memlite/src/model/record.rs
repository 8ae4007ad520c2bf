// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Domain model for memory records
//!
//! A memory record is one domain-level knowledge item (a fact, a decision, a
//! risk, ...) owned by a single session. The record type, source type, and
//! confidence level are closed enumerations: unknown tags are parse errors,
//! never synthesized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on `content`, in bytes.
pub const MAX_CONTENT_BYTES: usize = 64 * 1024;

/// Upper bound on `rationale`, in bytes.
pub const MAX_RATIONALE_BYTES: usize = 16 * 1024;

/// Upper bound on the number of evidence references.
pub const MAX_EVIDENCE_REFS: usize = 100;

/// Sentinel value recorded in `superseded_by` for soft-deleted records.
pub const DELETED_SENTINEL: &str = "deleted";

/// Kind of knowledge a memory record captures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MemoryType {
    Fact,
    Assumption,
    Hypothesis,
    Discovery,
    Risk,
    Decision,
    ArchitecturalDecision,
    ImplementationDecision,
    Convention,
    CodingStandard,
    Alternative,
    LessonLearned,
}

impl MemoryType {
    /// All memory types, in declaration order.
    pub const ALL: [MemoryType; 12] = [
        MemoryType::Fact,
        MemoryType::Assumption,
        MemoryType::Hypothesis,
        MemoryType::Discovery,
        MemoryType::Risk,
        MemoryType::Decision,
        MemoryType::ArchitecturalDecision,
        MemoryType::ImplementationDecision,
        MemoryType::Convention,
        MemoryType::CodingStandard,
        MemoryType::Alternative,
        MemoryType::LessonLearned,
    ];

    /// Tag used at the API surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Assumption => "assumption",
            MemoryType::Hypothesis => "hypothesis",
            MemoryType::Discovery => "discovery",
            MemoryType::Risk => "risk",
            MemoryType::Decision => "decision",
            MemoryType::ArchitecturalDecision => "architectural_decision",
            MemoryType::ImplementationDecision => "implementation_decision",
            MemoryType::Convention => "convention",
            MemoryType::CodingStandard => "coding_standard",
            MemoryType::Alternative => "alternative",
            MemoryType::LessonLearned => "lesson_learned",
        }
    }

    /// Local name of the ontology class this type maps to.
    pub fn class_local(&self) -> &'static str {
        match self {
            MemoryType::Fact => "Fact",
            MemoryType::Assumption => "Assumption",
            MemoryType::Hypothesis => "Hypothesis",
            MemoryType::Discovery => "Discovery",
            MemoryType::Risk => "Risk",
            MemoryType::Decision => "Decision",
            MemoryType::ArchitecturalDecision => "ArchitecturalDecision",
            MemoryType::ImplementationDecision => "ImplementationDecision",
            MemoryType::Convention => "Convention",
            MemoryType::CodingStandard => "CodingStandard",
            MemoryType::Alternative => "Alternative",
            MemoryType::LessonLearned => "LessonLearned",
        }
    }

    /// Reverse mapping from an ontology class local name.
    pub fn from_class_local(local: &str) -> Option<MemoryType> {
        MemoryType::ALL
            .iter()
            .copied()
            .find(|t| t.class_local() == local)
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown memory type: {}", s))
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Origin of a memory record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceType {
    User,
    Agent,
    Tool,
    ExternalDocument,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::User => "user",
            SourceType::Agent => "agent",
            SourceType::Tool => "tool",
            SourceType::ExternalDocument => "external_document",
        }
    }

    /// Local name of the ontology individual this source maps to.
    pub fn individual_local(&self) -> &'static str {
        match self {
            SourceType::User => "UserSource",
            SourceType::Agent => "AgentSource",
            SourceType::Tool => "ToolSource",
            SourceType::ExternalDocument => "ExternalDocumentSource",
        }
    }

    pub fn from_individual_local(local: &str) -> Option<SourceType> {
        [
            SourceType::User,
            SourceType::Agent,
            SourceType::Tool,
            SourceType::ExternalDocument,
        ]
        .into_iter()
        .find(|s| s.individual_local() == local)
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SourceType::User),
            "agent" => Ok(SourceType::Agent),
            "tool" => Ok(SourceType::Tool),
            "external_document" => Ok(SourceType::ExternalDocument),
            _ => Err(format!("unknown source type: {}", s)),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discrete projection of a confidence score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Project a score in `[0, 1]` onto its level: high >= 0.8, medium >= 0.5.
    pub fn from_score(score: f64) -> ConfidenceLevel {
        if score >= 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// Minimum score a record must carry to satisfy this level.
    pub fn threshold(&self) -> f64 {
        match self {
            ConfidenceLevel::High => 0.8,
            ConfidenceLevel::Medium => 0.5,
            ConfidenceLevel::Low => 0.0,
        }
    }

    /// Local name of the ontology individual this level maps to.
    pub fn individual_local(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HighConfidence",
            ConfidenceLevel::Medium => "MediumConfidence",
            ConfidenceLevel::Low => "LowConfidence",
        }
    }
}

impl std::str::FromStr for ConfidenceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(ConfidenceLevel::High),
            "medium" => Ok(ConfidenceLevel::Medium),
            "low" => Ok(ConfidenceLevel::Low),
            _ => Err(format!("unknown confidence level: {}", s)),
        }
    }
}

/// One domain-level knowledge item, represented in the store as a connected
/// subgraph of triples rooted at the record's IRI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Opaque identifier, unique within a store.
    pub id: String,
    /// Free-text summary.
    pub content: String,
    pub memory_type: MemoryType,
    /// Confidence in `[0.0, 1.0]`; validated at persist time.
    pub confidence: f64,
    pub source_type: SourceType,
    /// Owning session; equals the store's session identifier.
    pub session_id: String,
    /// Optional grouping scope.
    pub project_id: Option<String>,
    pub rationale: Option<String>,
    /// Ordered evidence references; entries starting with `mem-` denote
    /// intra-store edges.
    pub evidence_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Replacement record id, or [`DELETED_SENTINEL`]. Terminal once set.
    pub superseded_by: Option<String>,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Create an active record with the required fields and server defaults.
    pub fn new(
        id: impl Into<String>,
        session_id: impl Into<String>,
        memory_type: MemoryType,
        content: impl Into<String>,
    ) -> Self {
        MemoryRecord {
            id: id.into(),
            content: content.into(),
            memory_type,
            confidence: 1.0,
            source_type: SourceType::Agent,
            session_id: session_id.into(),
            project_id: None,
            rationale: None,
            evidence_refs: Vec::new(),
            created_at: Utc::now(),
            superseded_by: None,
            access_count: 0,
            last_accessed: None,
        }
    }

    /// Discrete confidence level of this record.
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    /// A record is active until it is superseded or soft-deleted.
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// True when the record was soft-deleted rather than replaced.
    pub fn is_deleted(&self) -> bool {
        self.superseded_by.as_deref() == Some(DELETED_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn memory_type_round_trips_through_tags() {
        for t in MemoryType::ALL {
            assert_eq!(MemoryType::from_str(t.as_str()).unwrap(), t);
            assert_eq!(MemoryType::from_class_local(t.class_local()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_memory_type_is_an_error() {
        assert!(MemoryType::from_str("opinion").is_err());
        assert!(MemoryType::from_str("").is_err());
        assert!(MemoryType::from_class_local("Opinion").is_none());
    }

    #[test]
    fn confidence_level_projection() {
        assert_eq!(ConfidenceLevel::from_score(1.0), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.49), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::Low);
    }

    #[test]
    fn new_records_are_active() {
        let record = MemoryRecord::new("mem-1", "sess-A", MemoryType::Fact, "uses HTTP/2");
        assert!(record.is_active());
        assert!(!record.is_deleted());
        assert_eq!(record.access_count, 0);
    }
}
