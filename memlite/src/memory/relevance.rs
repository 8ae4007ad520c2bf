// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Relevance scoring for context retrieval
//!
//! Scores active records in `[0, 1]` against a free-text hint:
//!
//! ```text
//! score = w_text * text_similarity + w_rec * recency
//!       + w_conf * confidence      + w_acc * access_factor
//! ```
//!
//! The caller may shift weight between text and recency; the other two
//! weights are fixed. Scoring never issues writes.

use crate::model::{ConfidenceLevel, MemoryRecord, MemoryType};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Seconds in the recency decay constant (one week).
const RECENCY_DECAY_SECONDS: f64 = 604_800.0;

/// Hard cap on tokens considered per text, per call.
const MAX_TOKENS: usize = 500;

/// Default share of the score driven by recency.
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.3;

/// Default share of the score driven by text similarity.
const DEFAULT_TEXT_WEIGHT: f64 = 0.4;

const CONFIDENCE_WEIGHT: f64 = 0.2;
const ACCESS_WEIGHT: f64 = 0.1;

/// Weight of hint-word coverage vs memory-word coverage in similarity.
const HINT_COVERAGE_WEIGHT: f64 = 0.7;
const MEMORY_COVERAGE_WEIGHT: f64 = 0.3;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has",
        "have", "how", "in", "is", "it", "its", "may", "not", "of", "on", "or", "our", "should",
        "than", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was",
        "we", "were", "what", "when", "where", "which", "while", "who", "why", "will", "with",
        "would", "you",
    ]
    .into_iter()
    .collect()
});

/// Options for context retrieval.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Maximum number of scored records to return.
    pub limit: usize,
    /// Recency weight in `[0, 1]`; out-of-range values are coerced back to
    /// the default. Extra recency weight is taken from the text weight,
    /// which never goes below zero.
    pub recency_weight: f64,
    pub min_confidence: Option<ConfidenceLevel>,
    /// When present, only these types are scored.
    pub include_types: Option<Vec<MemoryType>>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            limit: 10,
            recency_weight: DEFAULT_RECENCY_WEIGHT,
            min_confidence: None,
            include_types: None,
        }
    }
}

/// A record together with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    pub score: f64,
}

/// Lowercase, strip punctuation, drop stop-words and one-character tokens,
/// cap the token budget.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= 2)
        .filter(|token| !STOP_WORDS.contains(token))
        .take(MAX_TOKENS)
        .map(str::to_string)
        .collect()
}

/// Jaccard-like blend of hint coverage and memory coverage.
pub fn text_similarity(hint_tokens: &HashSet<String>, memory_text: &str) -> f64 {
    if hint_tokens.is_empty() {
        return 0.0;
    }
    let memory_tokens: HashSet<String> = tokenize(memory_text).into_iter().collect();
    if memory_tokens.is_empty() {
        return 0.0;
    }
    let overlap = hint_tokens.intersection(&memory_tokens).count() as f64;
    let hint_coverage = overlap / hint_tokens.len() as f64;
    let memory_coverage = overlap / memory_tokens.len() as f64;
    HINT_COVERAGE_WEIGHT * hint_coverage + MEMORY_COVERAGE_WEIGHT * memory_coverage
}

/// `exp(-age_seconds / one_week)`, using `last_accessed` when present and
/// `created_at` otherwise.
pub fn recency_factor(record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
    let reference = record.last_accessed.unwrap_or(record.created_at);
    let age_seconds = (now - reference).num_seconds().max(0) as f64;
    (-age_seconds / RECENCY_DECAY_SECONDS).exp()
}

/// Resolved scoring weights `(text, recency, confidence, access)`.
pub fn resolve_weights(recency_weight: f64) -> (f64, f64, f64, f64) {
    let recency = if (0.0..=1.0).contains(&recency_weight) {
        recency_weight
    } else {
        DEFAULT_RECENCY_WEIGHT
    };
    let text = (DEFAULT_TEXT_WEIGHT - (recency - DEFAULT_RECENCY_WEIGHT)).max(0.0);
    (text, recency, CONFIDENCE_WEIGHT, ACCESS_WEIGHT)
}

/// Score the candidate set against the hint and keep the top `limit`.
/// Zero-scored records are discarded; ties break toward higher recency.
pub fn rank(candidates: Vec<MemoryRecord>, hint: &str, opts: &ContextOptions) -> Vec<ScoredMemory> {
    let now = Utc::now();
    let (w_text, w_rec, w_conf, w_acc) = resolve_weights(opts.recency_weight);
    let hint_tokens: HashSet<String> = tokenize(hint).into_iter().collect();

    let max_access = candidates
        .iter()
        .map(|r| r.access_count)
        .max()
        .unwrap_or(0);

    let mut scored: Vec<(ScoredMemory, f64)> = candidates
        .into_iter()
        .filter(|record| match &opts.include_types {
            Some(types) => types.contains(&record.memory_type),
            None => true,
        })
        .map(|record| {
            let mut text_basis = record.content.clone();
            if let Some(rationale) = &record.rationale {
                text_basis.push(' ');
                text_basis.push_str(rationale);
            }
            let similarity = text_similarity(&hint_tokens, &text_basis);
            let recency = recency_factor(&record, now);
            let access = if max_access > 0 {
                record.access_count as f64 / max_access as f64
            } else {
                0.0
            };
            // High caller recency weights can push the raw blend past 1.0;
            // the score contract is [0, 1].
            let score = (w_text * similarity
                + w_rec * recency
                + w_conf * record.confidence
                + w_acc * access)
                .min(1.0);
            (ScoredMemory { record, score }, recency)
        })
        .filter(|(scored, _)| scored.score > 0.0)
        .collect();

    scored.sort_by(|(a, recency_a), (b, recency_b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                recency_b
                    .partial_cmp(recency_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    scored
        .into_iter()
        .take(opts.limit)
        .map(|(scored, _)| scored)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, content: &str) -> MemoryRecord {
        MemoryRecord::new(id, "sess", MemoryType::Fact, content)
    }

    #[test]
    fn tokenize_strips_punctuation_and_stopwords() {
        let tokens = tokenize("The deployment, for Kubernetes; is READY!");
        assert_eq!(tokens, vec!["deployment", "kubernetes", "ready"]);
    }

    #[test]
    fn tokenize_drops_short_tokens() {
        let tokens = tokenize("a b c db io");
        assert_eq!(tokens, vec!["db", "io"]);
    }

    #[test]
    fn similarity_blends_both_coverages() {
        let hint: HashSet<String> = tokenize("kubernetes deployment").into_iter().collect();
        // Full hint coverage, memory has one extra token.
        let similarity = text_similarity(&hint, "deployment steps kubernetes");
        let expected = 0.7 * 1.0 + 0.3 * (2.0 / 3.0);
        assert!((similarity - expected).abs() < 1e-9);
        // Disjoint texts score zero.
        assert_eq!(text_similarity(&hint, "postgres tuning"), 0.0);
    }

    #[test]
    fn recency_decays_by_one_week_constant() {
        let now = Utc::now();
        let mut r = record("m", "x");
        r.created_at = now - Duration::weeks(1);
        let factor = recency_factor(&r, now);
        assert!((factor - (-1.0f64).exp()).abs() < 1e-3);

        r.created_at = now - Duration::weeks(5);
        let factor = recency_factor(&r, now);
        assert!((factor - (-5.0f64).exp()).abs() < 1e-3);
    }

    #[test]
    fn last_accessed_takes_precedence_over_created_at() {
        let now = Utc::now();
        let mut r = record("m", "x");
        r.created_at = now - Duration::weeks(10);
        r.last_accessed = Some(now);
        assert!(recency_factor(&r, now) > 0.99);
    }

    #[test]
    fn weights_shift_from_text_to_recency() {
        assert_eq!(resolve_weights(0.3), (0.4, 0.3, 0.2, 0.1));
        let (text, recency, _, _) = resolve_weights(0.6);
        assert!((text - 0.1).abs() < 1e-9);
        assert_eq!(recency, 0.6);
        // Text weight is clamped at zero, not negative.
        let (text, _, _, _) = resolve_weights(1.0);
        assert_eq!(text, 0.0);
        // Out-of-range recency falls back to the default.
        assert_eq!(resolve_weights(1.5), (0.4, 0.3, 0.2, 0.1));
        assert_eq!(resolve_weights(-0.1), (0.4, 0.3, 0.2, 0.1));
    }

    #[test]
    fn rank_orders_by_score_and_drops_zero() {
        let mut relevant = record("m1", "kubernetes deployment steps");
        relevant.confidence = 0.9;
        let mut unrelated = record("m2", "");
        unrelated.confidence = 0.0;
        unrelated.created_at = Utc::now() - Duration::weeks(5200);

        let results = rank(
            vec![unrelated, relevant],
            "kubernetes deployment",
            &ContextOptions::default(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "m1");
        assert!(results[0].score > 0.0 && results[0].score <= 1.0);
    }

    #[test]
    fn rank_prefers_recent_among_equal_text() {
        let now = Utc::now();
        let mut old = record("old", "deployment steps for kubernetes");
        old.created_at = now - Duration::weeks(5);
        let mut fresh = record("fresh", "deployment steps for kubernetes");
        fresh.created_at = now;

        let results = rank(
            vec![old, fresh],
            "kubernetes deployment",
            &ContextOptions {
                recency_weight: 0.6,
                ..ContextOptions::default()
            },
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "fresh");
        assert_eq!(results[1].record.id, "old");
    }

    #[test]
    fn include_types_filters_before_scoring() {
        let fact = record("f", "kubernetes");
        let mut risk = record("r", "kubernetes");
        risk.memory_type = MemoryType::Risk;

        let results = rank(
            vec![fact, risk],
            "kubernetes",
            &ContextOptions {
                include_types: Some(vec![MemoryType::Risk]),
                ..ContextOptions::default()
            },
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "r");
    }
}
