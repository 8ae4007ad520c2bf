// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SPARQL subset: lexer, parser, and evaluator
//!
//! The store does not aim for SPARQL 1.1 compliance. It speaks exactly the
//! subset the record adapter and the ontology loader compose: SELECT/ASK with
//! basic graph patterns, OPTIONAL, FILTER (comparisons, STRSTARTS,
//! NOT EXISTS), ORDER BY, LIMIT, DISTINCT, COUNT aggregates, and the
//! INSERT DATA / DELETE DATA / DELETE WHERE / DELETE-INSERT-WHERE updates.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{Query, UpdateOp};
pub use eval::{QueryResults, QuerySolution, UpdatePlan};
pub use parser::{parse_query, parse_update};

use thiserror::Error;

/// SPARQL processing errors.
#[derive(Error, Debug)]
pub enum SparqlError {
    #[error("Lex error near: {0}")]
    Lex(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown prefix '{0}:'")]
    UnknownPrefix(String),
}
