// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! AST for the SPARQL subset

use crate::rdf::term::{Literal, Term, Triple};

/// A subject, predicate, or object position in a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePattern {
    Var(String),
    Iri(String),
    Literal(Literal),
}

impl NodePattern {
    /// Ground this position, if it is not a variable.
    pub fn as_term(&self) -> Option<Term> {
        match self {
            NodePattern::Var(_) => None,
            NodePattern::Iri(iri) => Some(Term::Iri(iri.clone())),
            NodePattern::Literal(lit) => Some(Term::Literal(lit.clone())),
        }
    }
}

/// One triple pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: NodePattern,
    pub predicate: NodePattern,
    pub object: NodePattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Filter expressions the subset supports.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `STRSTARTS(STR(?var), "prefix")`
    StrStarts { var: String, prefix: String },
    /// `?var <op> constant`
    Compare {
        var: String,
        op: CompareOp,
        value: Term,
    },
}

/// A group graph pattern: triples plus OPTIONAL / FILTER NOT EXISTS / FILTER.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPattern {
    pub triples: Vec<TriplePattern>,
    pub optionals: Vec<Vec<TriplePattern>>,
    pub not_exists: Vec<Vec<TriplePattern>>,
    pub filters: Vec<FilterExpr>,
}

/// SELECT projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    All,
    /// `SELECT ?a ?b`
    Vars(Vec<String>),
    /// `SELECT (COUNT(*) AS ?alias)` / `SELECT (COUNT(DISTINCT ?v) AS ?alias)`
    Count {
        distinct_var: Option<String>,
        alias: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub var: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projection: Projection,
    pub pattern: GroupPattern,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Ask(GroupPattern),
}

/// A single SPARQL Update operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    InsertData(Vec<Triple>),
    DeleteData(Vec<Triple>),
    DeleteWhere(Vec<TriplePattern>),
    Modify {
        delete: Vec<TriplePattern>,
        insert: Vec<TriplePattern>,
        pattern: GroupPattern,
    },
}
