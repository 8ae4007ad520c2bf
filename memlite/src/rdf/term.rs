// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! RDF term and triple value model
//!
//! Subjects and predicates are always IRIs in the subset this store speaks;
//! objects are IRIs or literals (plain, language-tagged, or typed). Terms are
//! compared with type awareness so that ORDER BY behaves sensibly for
//! numerics and timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// A literal term: lexical form plus an optional datatype or language tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

impl Literal {
    pub fn plain(lexical: impl Into<String>) -> Self {
        Literal {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn tagged(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Literal {
            lexical: lexical.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    /// Numeric view of the lexical form, independent of the datatype tag.
    pub fn as_f64(&self) -> Option<f64> {
        self.lexical.trim().parse::<f64>().ok()
    }
}

/// An RDF term in object position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn plain(lexical: impl Into<String>) -> Self {
        Term::Literal(Literal::plain(lexical))
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Literal::typed(lexical, datatype))
    }

    pub fn integer(value: i64) -> Self {
        Term::typed(value.to_string(), XSD_INTEGER)
    }

    pub fn double(value: f64) -> Self {
        Term::typed(value.to_string(), XSD_DOUBLE)
    }

    pub fn datetime(value: &DateTime<Utc>) -> Self {
        Term::typed(
            value.to_rfc3339_opts(SecondsFormat::Micros, true),
            XSD_DATETIME,
        )
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Iri(_) => None,
            Term::Literal(lit) => Some(lit),
        }
    }

    /// Lexical view of the term: the IRI text or the literal's lexical form.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Literal(lit) => &lit.lexical,
        }
    }

    /// Numeric view where one exists.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_literal().and_then(Literal::as_f64)
    }

    /// Type-aware comparison used for ORDER BY: IRIs sort before literals,
    /// two numerics compare numerically, everything else lexically.
    pub fn compare(&self, other: &Term) -> Ordering {
        match (self, other) {
            (Term::Iri(a), Term::Iri(b)) => a.cmp(b),
            (Term::Iri(_), Term::Literal(_)) => Ordering::Less,
            (Term::Literal(_), Term::Iri(_)) => Ordering::Greater,
            (Term::Literal(a), Term::Literal(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.lexical.cmp(&b.lexical),
            },
        }
    }
}

/// One RDF triple. Subject and predicate are IRI strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Triple {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_literals_compare_numerically() {
        let a = Term::integer(9);
        let b = Term::integer(10);
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn datetime_literals_compare_chronologically() {
        let early = Term::typed("2024-01-01T00:00:00.000000Z", XSD_DATETIME);
        let late = Term::typed("2025-06-01T00:00:00.000000Z", XSD_DATETIME);
        assert_eq!(early.compare(&late), Ordering::Less);
    }

    #[test]
    fn iris_sort_before_literals() {
        let iri = Term::iri("https://jido.ai/ontology#Fact");
        let lit = Term::plain("fact");
        assert_eq!(iri.compare(&lit), Ordering::Less);
    }

    #[test]
    fn datetime_round_trip_is_fixed_width() {
        let now = Utc::now();
        let term = Term::datetime(&now);
        let lit = term.as_literal().unwrap();
        assert!(lit.lexical.ends_with('Z'));
        assert_eq!(lit.datatype.as_deref(), Some(XSD_DATETIME));
    }
}
