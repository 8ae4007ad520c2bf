// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SPARQL composition for memory records
//!
//! Every function here takes identifiers that have already passed the
//! safe-identifier predicate; the `debug_assert`s restate that contract.
//! Free text goes through [`escape_literal`] before interpolation.

use crate::model::{is_safe_identifier, ConfidenceLevel, MemoryRecord, MemoryType};
use crate::ontology::NAMESPACE;
use chrono::{DateTime, Utc};

/// Fixed prefix block for all composed queries.
pub const PREFIX_BLOCK: &str = "\
PREFIX jido: <https://jido.ai/ontology#>\n\
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\
PREFIX owl: <http://www.w3.org/2002/07/owl#>\n\
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n";

/// IRI prefix shared by all memory record subjects.
pub fn memory_iri_prefix() -> String {
    format!("{}memory_", NAMESPACE)
}

pub fn memory_ref(memory_id: &str) -> String {
    debug_assert!(is_safe_identifier(memory_id));
    format!("jido:memory_{}", memory_id)
}

pub fn session_ref(session_id: &str) -> String {
    debug_assert!(is_safe_identifier(session_id));
    format!("jido:session_{}", session_id)
}

pub fn project_ref(project_id: &str) -> String {
    debug_assert!(is_safe_identifier(project_id));
    format!("jido:project_{}", project_id)
}

/// Escape a string for use inside a double-quoted SPARQL literal.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn datetime_literal(when: &DateTime<Utc>) -> String {
    format!(
        "\"{}\"^^xsd:dateTime",
        when.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    )
}

/// Compose the single INSERT that persists a record.
pub fn insert_record(record: &MemoryRecord) -> String {
    let subject = memory_ref(&record.id);
    let mut triples = Vec::new();

    triples.push(format!(
        "{} rdf:type jido:{} .",
        subject,
        record.memory_type.class_local()
    ));
    triples.push(format!(
        "{} jido:content \"{}\" .",
        subject,
        escape_literal(&record.content)
    ));
    triples.push(format!(
        "{} jido:confidenceScore \"{}\"^^xsd:double .",
        subject, record.confidence
    ));
    triples.push(format!(
        "{} jido:confidenceLevel jido:{} .",
        subject,
        record.confidence_level().individual_local()
    ));
    triples.push(format!(
        "{} jido:sourceType jido:{} .",
        subject,
        record.source_type.individual_local()
    ));
    triples.push(format!(
        "{} jido:belongsToSession {} .",
        subject,
        session_ref(&record.session_id)
    ));
    if let Some(project_id) = &record.project_id {
        triples.push(format!(
            "{} jido:belongsToProject {} .",
            subject,
            project_ref(project_id)
        ));
    }
    if let Some(rationale) = &record.rationale {
        triples.push(format!(
            "{} jido:rationale \"{}\" .",
            subject,
            escape_literal(rationale)
        ));
    }
    for evidence in &record.evidence_refs {
        triples.push(format!(
            "{} jido:evidenceRef \"{}\" .",
            subject,
            escape_literal(evidence)
        ));
    }
    triples.push(format!(
        "{} jido:createdAt {} .",
        subject,
        datetime_literal(&record.created_at)
    ));
    triples.push(format!(
        "{} jido:accessCount \"0\"^^xsd:integer .",
        subject
    ));

    format!("{}INSERT DATA {{\n{}\n}}", PREFIX_BLOCK, triples.join("\n"))
}

/// Constraints for a record SELECT.
#[derive(Debug, Clone, Default)]
pub struct RecordSelect<'a> {
    /// Scope to one session.
    pub session_id: Option<&'a str>,
    /// Scope to one record id.
    pub memory_id: Option<&'a str>,
    /// Scope to one type.
    pub memory_type: Option<MemoryType>,
    /// Scope to one project.
    pub project_id: Option<&'a str>,
    pub min_confidence: Option<ConfidenceLevel>,
    pub include_superseded: bool,
    pub limit: Option<usize>,
    /// Most-recent-first unless disabled.
    pub order_by_created: bool,
}

/// Compose the record projection query. One shape serves by-id, by-type,
/// by-session, and by-project lookups so decoding stays in one place.
pub fn select_records(spec: &RecordSelect<'_>) -> String {
    let mut body = String::new();

    if let Some(memory_id) = spec.memory_id {
        body.push_str(&format!(
            "  FILTER (?memory = {})\n",
            memory_ref(memory_id)
        ));
    }
    body.push_str("  ?memory rdf:type ?type .\n");
    if let Some(memory_type) = spec.memory_type {
        body.push_str(&format!(
            "  ?memory rdf:type jido:{} .\n",
            memory_type.class_local()
        ));
    }
    body.push_str("  ?memory jido:belongsToSession ?session .\n");
    if let Some(session_id) = spec.session_id {
        body.push_str(&format!(
            "  ?memory jido:belongsToSession {} .\n",
            session_ref(session_id)
        ));
    }
    if let Some(project_id) = spec.project_id {
        body.push_str(&format!(
            "  ?memory jido:belongsToProject {} .\n",
            project_ref(project_id)
        ));
    }
    body.push_str("  ?memory jido:content ?content .\n");
    body.push_str("  ?memory jido:confidenceScore ?confidence .\n");
    body.push_str("  ?memory jido:sourceType ?source .\n");
    body.push_str("  ?memory jido:createdAt ?created .\n");
    body.push_str("  ?memory jido:accessCount ?accessCount .\n");
    body.push_str("  OPTIONAL { ?memory jido:rationale ?rationale }\n");
    body.push_str("  OPTIONAL { ?memory jido:lastAccessed ?lastAccessed }\n");
    body.push_str("  OPTIONAL { ?memory jido:supersededBy ?superseded }\n");
    body.push_str("  OPTIONAL { ?memory jido:belongsToProject ?project }\n");

    if !spec.include_superseded {
        body.push_str("  FILTER NOT EXISTS { ?memory jido:supersededBy ?replacement }\n");
    }
    if let Some(level) = spec.min_confidence {
        body.push_str(&format!(
            "  FILTER (?confidence >= {})\n",
            level.threshold()
        ));
    }
    body.push_str(&format!(
        "  FILTER (STRSTARTS(STR(?memory), \"{}\"))\n",
        memory_iri_prefix()
    ));

    let mut query = format!(
        "{}SELECT ?memory ?type ?session ?content ?confidence ?source ?created \
         ?accessCount ?rationale ?lastAccessed ?superseded ?project WHERE {{\n{}}}",
        PREFIX_BLOCK, body
    );
    if spec.order_by_created {
        query.push_str(" ORDER BY DESC(?created)");
    }
    if let Some(limit) = spec.limit {
        query.push_str(&format!(" LIMIT {}", limit));
    }
    query
}

/// Evidence references for one record, in insertion order.
pub fn select_evidence(memory_id: &str) -> String {
    format!(
        "{}SELECT ?ref WHERE {{ {} jido:evidenceRef ?ref }}",
        PREFIX_BLOCK,
        memory_ref(memory_id)
    )
}

/// Records that name `memory_id` as their replacement.
pub fn select_supersedes(session_id: &str, memory_id: &str) -> String {
    format!(
        "{}SELECT ?memory WHERE {{\n\
           ?memory jido:supersededBy {} .\n\
           ?memory jido:belongsToSession {} .\n\
         }}",
        PREFIX_BLOCK,
        memory_ref(memory_id),
        session_ref(session_id)
    )
}

/// Mark a record as superseded by `new_id`, or by the deletion marker.
pub fn insert_supersession(old_id: &str, new_id: Option<&str>) -> String {
    let target = match new_id {
        Some(new_id) => memory_ref(new_id),
        None => "jido:DeletedMarker".to_string(),
    };
    format!(
        "{}INSERT DATA {{ {} jido:supersededBy {} . }}",
        PREFIX_BLOCK,
        memory_ref(old_id),
        target
    )
}

/// Remove one single-valued property of a record.
pub fn delete_property(memory_id: &str, property: &str) -> String {
    format!(
        "{}DELETE WHERE {{ {} jido:{} ?value }}",
        PREFIX_BLOCK,
        memory_ref(memory_id),
        property
    )
}

/// Write the access bookkeeping pair.
pub fn insert_access(memory_id: &str, access_count: u64, when: &DateTime<Utc>) -> String {
    let subject = memory_ref(memory_id);
    format!(
        "{}INSERT DATA {{\n\
           {} jido:accessCount \"{}\"^^xsd:integer .\n\
           {} jido:lastAccessed {} .\n\
         }}",
        PREFIX_BLOCK,
        subject,
        access_count,
        subject,
        datetime_literal(when)
    )
}

/// Write a new confidence score and its projected level.
pub fn insert_confidence(memory_id: &str, confidence: f64) -> String {
    let subject = memory_ref(memory_id);
    format!(
        "{}INSERT DATA {{\n\
           {} jido:confidenceScore \"{}\"^^xsd:double .\n\
           {} jido:confidenceLevel jido:{} .\n\
         }}",
        PREFIX_BLOCK,
        subject,
        confidence,
        subject,
        ConfidenceLevel::from_score(confidence).individual_local()
    )
}

/// Append evidence references.
pub fn insert_evidence(memory_id: &str, entries: &[String]) -> String {
    let subject = memory_ref(memory_id);
    let triples: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "{} jido:evidenceRef \"{}\" .",
                subject,
                escape_literal(entry)
            )
        })
        .collect();
    format!("{}INSERT DATA {{\n{}\n}}", PREFIX_BLOCK, triples.join("\n"))
}

/// Write a replacement rationale.
pub fn insert_rationale(memory_id: &str, rationale: &str) -> String {
    format!(
        "{}INSERT DATA {{ {} jido:rationale \"{}\" . }}",
        PREFIX_BLOCK,
        memory_ref(memory_id),
        escape_literal(rationale)
    )
}

/// Constraints for a COUNT query.
#[derive(Debug, Clone, Default)]
pub struct RecordCount<'a> {
    pub session_id: &'a str,
    pub memory_type: Option<MemoryType>,
    pub min_confidence: Option<ConfidenceLevel>,
    /// Upper bound on confidence, exclusive (by-level bucketing).
    pub max_confidence_exclusive: Option<f64>,
    pub include_superseded: bool,
    /// Count only superseded records instead of excluding them.
    pub only_superseded: bool,
    /// Require at least one value of this property (e.g. evidenceRef).
    pub requires_property: Option<&'a str>,
}

/// Compose a `COUNT(DISTINCT ?memory)` query.
pub fn count_records(spec: &RecordCount<'_>) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "  ?memory jido:belongsToSession {} .\n",
        session_ref(spec.session_id)
    ));
    if let Some(memory_type) = spec.memory_type {
        body.push_str(&format!(
            "  ?memory rdf:type jido:{} .\n",
            memory_type.class_local()
        ));
    }
    if spec.min_confidence.is_some() || spec.max_confidence_exclusive.is_some() {
        body.push_str("  ?memory jido:confidenceScore ?confidence .\n");
    }
    if let Some(level) = spec.min_confidence {
        body.push_str(&format!(
            "  FILTER (?confidence >= {})\n",
            level.threshold()
        ));
    }
    if let Some(bound) = spec.max_confidence_exclusive {
        body.push_str(&format!("  FILTER (?confidence < {})\n", bound));
    }
    if let Some(property) = spec.requires_property {
        body.push_str(&format!("  ?memory jido:{} ?required .\n", property));
    }
    if spec.only_superseded {
        body.push_str("  ?memory jido:supersededBy ?replacement .\n");
    } else if !spec.include_superseded {
        body.push_str("  FILTER NOT EXISTS { ?memory jido:supersededBy ?replacement }\n");
    }

    format!(
        "{}SELECT (COUNT(DISTINCT ?memory) AS ?count) WHERE {{\n{}}}",
        PREFIX_BLOCK, body
    )
}

/// Store-wide triple statistics.
pub fn count_triples() -> String {
    format!(
        "{}SELECT (COUNT(*) AS ?count) WHERE {{ ?s ?p ?o }}",
        PREFIX_BLOCK
    )
}

pub fn count_distinct_position(position: char) -> String {
    debug_assert!(matches!(position, 's' | 'p' | 'o'));
    format!(
        "{}SELECT (COUNT(DISTINCT ?{}) AS ?count) WHERE {{ ?s ?p ?o }}",
        PREFIX_BLOCK, position
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;
    use crate::sparql::{parse_query, parse_update};

    fn sample_record() -> MemoryRecord {
        let mut record = MemoryRecord::new("mem-aaa", "sess-A", MemoryType::Fact, "uses HTTP/2");
        record.confidence = 0.9;
        record.source_type = SourceType::Agent;
        record.project_id = Some("proj-1".to_string());
        record.rationale = Some("observed in traffic\ncapture".to_string());
        record.evidence_refs = vec!["mem-bbb".to_string(), "doc \"42\"".to_string()];
        record
    }

    #[test]
    fn insert_record_parses_and_covers_all_fields() {
        let sparql = insert_record(&sample_record());
        let op = parse_update(&sparql).expect("composed insert must parse");
        match op {
            crate::sparql::UpdateOp::InsertData(triples) => {
                // type, content, score, level, source, session, project,
                // rationale, 2x evidence, createdAt, accessCount
                assert_eq!(triples.len(), 12);
            }
            other => panic!("unexpected op: {:?}", other),
        }
    }

    #[test]
    fn escape_literal_neutralizes_quotes_and_newlines() {
        assert_eq!(escape_literal("a\"b"), "a\\\"b");
        assert_eq!(escape_literal("a\nb"), "a\\nb");
        assert_eq!(escape_literal("a\\b"), "a\\\\b");
    }

    #[test]
    fn select_records_parses_in_every_shape() {
        for spec in [
            RecordSelect {
                session_id: Some("sess-A"),
                limit: Some(100),
                order_by_created: true,
                ..RecordSelect::default()
            },
            RecordSelect {
                session_id: Some("sess-A"),
                memory_type: Some(MemoryType::Decision),
                min_confidence: Some(ConfidenceLevel::High),
                include_superseded: true,
                ..RecordSelect::default()
            },
            RecordSelect {
                memory_id: Some("mem-aaa"),
                ..RecordSelect::default()
            },
            RecordSelect {
                session_id: Some("sess-A"),
                project_id: Some("proj-1"),
                ..RecordSelect::default()
            },
        ] {
            let sparql = select_records(&spec);
            parse_query(&sparql).unwrap_or_else(|e| panic!("{e}: {sparql}"));
        }
    }

    #[test]
    fn count_records_parses_in_every_shape() {
        for spec in [
            RecordCount {
                session_id: "sess-A",
                ..RecordCount::default()
            },
            RecordCount {
                session_id: "sess-A",
                memory_type: Some(MemoryType::Fact),
                min_confidence: Some(ConfidenceLevel::Medium),
                max_confidence_exclusive: Some(0.8),
                ..RecordCount::default()
            },
            RecordCount {
                session_id: "sess-A",
                only_superseded: true,
                ..RecordCount::default()
            },
            RecordCount {
                session_id: "sess-A",
                requires_property: Some("evidenceRef"),
                include_superseded: false,
                ..RecordCount::default()
            },
        ] {
            let sparql = count_records(&spec);
            parse_query(&sparql).unwrap_or_else(|e| panic!("{e}: {sparql}"));
        }
    }

    #[test]
    fn supersession_and_access_updates_parse() {
        parse_update(&insert_supersession("mem-a", Some("mem-b"))).unwrap();
        parse_update(&insert_supersession("mem-a", None)).unwrap();
        parse_update(&delete_property("mem-a", "accessCount")).unwrap();
        parse_update(&insert_access("mem-a", 3, &Utc::now())).unwrap();
        parse_update(&insert_confidence("mem-a", 0.75)).unwrap();
        parse_update(&insert_evidence("mem-a", &["x".to_string()])).unwrap();
        parse_update(&insert_rationale("mem-a", "because")).unwrap();
        parse_query(&select_evidence("mem-a")).unwrap();
        parse_query(&select_supersedes("sess-A", "mem-a")).unwrap();
        parse_query(&count_triples()).unwrap();
        parse_query(&count_distinct_position('s')).unwrap();
    }
}
