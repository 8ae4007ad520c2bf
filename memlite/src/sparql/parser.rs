// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parser for the SPARQL subset using nom parsers
//!
//! The grammar runs over the token stream: leaf parsers lift single tokens,
//! nom combinators (`opt`, `many0`, `many1`, `delimited`, `preceded`)
//! compose them into clauses, and a custom error type carries
//! unknown-prefix failures out of the combinator chain. The grammar covers exactly what
//! the adapter and the ontology loader compose; anything else is a parse
//! error surfaced to the caller, never silently substituted.

use super::ast::*;
use super::lexer::{tokenize, Token};
use super::SparqlError;
use crate::rdf::term::{Literal, Term, Triple, XSD_DOUBLE, XSD_INTEGER};
use crate::rdf::vocab::RDF_TYPE;
use nom::combinator::opt;
use nom::error::{ErrorKind, ParseError};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{Err as NomErr, IResult};
use std::collections::HashMap;

type Tokens<'a> = &'a [Token];

/// Error carried through the token-stream combinators.
#[derive(Debug)]
enum TokenError {
    Unexpected(Option<Token>),
    UnknownPrefix(String),
    Message(String),
}

impl<'a> ParseError<Tokens<'a>> for TokenError {
    fn from_error_kind(input: Tokens<'a>, _kind: ErrorKind) -> Self {
        TokenError::Unexpected(input.first().cloned())
    }

    fn append(_input: Tokens<'a>, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<Tokens<'a>, T, TokenError>;

fn unexpected(input: Tokens<'_>) -> NomErr<TokenError> {
    NomErr::Error(TokenError::Unexpected(input.first().cloned()))
}

/// Surface a token parse result as the crate's typed error.
fn finish<T>(result: PResult<'_, T>) -> Result<(Tokens<'_>, T), SparqlError> {
    result.map_err(|err| match err {
        NomErr::Error(e) | NomErr::Failure(e) => match e {
            TokenError::UnknownPrefix(prefix) => SparqlError::UnknownPrefix(prefix),
            TokenError::Message(message) => SparqlError::Parse(message),
            TokenError::Unexpected(Some(token)) => {
                SparqlError::Parse(format!("unexpected token: {:?}", token))
            }
            TokenError::Unexpected(None) => {
                SparqlError::Parse("unexpected end of input".to_string())
            }
        },
        NomErr::Incomplete(_) => SparqlError::Parse("incomplete input".to_string()),
    })
}

fn expect_end(rest: Tokens<'_>) -> Result<(), SparqlError> {
    match rest.first() {
        None => Ok(()),
        Some(token) => Err(SparqlError::Parse(format!("trailing token: {:?}", token))),
    }
}

/// Parse a SELECT or ASK query.
pub fn parse_query(input: &str) -> Result<Query, SparqlError> {
    let tokens = tokenize(input)?;
    let (rest, prefixes) = finish(prologue(&tokens))?;
    let grammar = Grammar { prefixes };
    let (rest, query) = finish(grammar.query(rest))?;
    expect_end(rest)?;
    Ok(query)
}

/// Parse a single update operation.
pub fn parse_update(input: &str) -> Result<UpdateOp, SparqlError> {
    let tokens = tokenize(input)?;
    let (rest, prefixes) = finish(prologue(&tokens))?;
    let grammar = Grammar { prefixes };
    let (rest, op) = finish(grammar.update(rest))?;
    expect_end(rest)?;
    Ok(op)
}

// === Leaf token parsers ===

/// Match one expected token.
fn tok<'a>(expected: Token) -> impl Fn(Tokens<'a>) -> PResult<'a, ()> {
    move |input: Tokens<'a>| match input.split_first() {
        Some((token, rest)) if *token == expected => Ok((rest, ())),
        _ => Err(unexpected(input)),
    }
}

fn var(input: Tokens<'_>) -> PResult<'_, String> {
    match input.split_first() {
        Some((Token::Var(name), rest)) => Ok((rest, name.clone())),
        _ => Err(unexpected(input)),
    }
}

fn string_lit(input: Tokens<'_>) -> PResult<'_, String> {
    match input.split_first() {
        Some((Token::StringLit(text), rest)) => Ok((rest, text.clone())),
        _ => Err(unexpected(input)),
    }
}

fn pname_ns(input: Tokens<'_>) -> PResult<'_, String> {
    match input.split_first() {
        Some((Token::PNameNs(prefix), rest)) => Ok((rest, prefix.clone())),
        _ => Err(unexpected(input)),
    }
}

fn iri_token(input: Tokens<'_>) -> PResult<'_, String> {
    match input.split_first() {
        Some((Token::Iri(iri), rest)) => Ok((rest, iri.clone())),
        _ => Err(unexpected(input)),
    }
}

fn integer(input: Tokens<'_>) -> PResult<'_, i64> {
    match input.split_first() {
        Some((Token::Integer(value), rest)) => Ok((rest, *value)),
        _ => Err(unexpected(input)),
    }
}

// === Clauses without prefix resolution ===

/// `(PREFIX ns: <iri>)*` collected into the prefix table.
fn prologue(input: Tokens<'_>) -> PResult<'_, HashMap<String, String>> {
    let (rest, declarations) =
        many0(preceded(tok(Token::Prefix), pair(pname_ns, iri_token)))(input)?;
    Ok((rest, declarations.into_iter().collect()))
}

fn compare_op(input: Tokens<'_>) -> PResult<'_, CompareOp> {
    match input.split_first() {
        Some((Token::Eq, rest)) => Ok((rest, CompareOp::Eq)),
        Some((Token::Ne, rest)) => Ok((rest, CompareOp::Ne)),
        Some((Token::Lt, rest)) => Ok((rest, CompareOp::Lt)),
        Some((Token::Le, rest)) => Ok((rest, CompareOp::Le)),
        Some((Token::Gt, rest)) => Ok((rest, CompareOp::Gt)),
        Some((Token::Ge, rest)) => Ok((rest, CompareOp::Ge)),
        _ => Err(unexpected(input)),
    }
}

/// `ORDER BY (ASC(?v) | DESC(?v) | ?v)+`, or nothing.
fn order_clause(input: Tokens<'_>) -> PResult<'_, Vec<OrderKey>> {
    if tok(Token::Order)(input).is_err() {
        return Ok((input, Vec::new()));
    }
    let (rest, _) = pair(tok(Token::Order), tok(Token::By))(input)?;
    many1(order_key)(rest)
}

fn order_key(input: Tokens<'_>) -> PResult<'_, OrderKey> {
    match input.first() {
        Some(Token::Asc) | Some(Token::Desc) => {
            let descending = matches!(input.first(), Some(Token::Desc));
            let (rest, name) =
                delimited(tok(Token::LParen), var, tok(Token::RParen))(&input[1..])?;
            Ok((
                rest,
                OrderKey {
                    var: name,
                    descending,
                },
            ))
        }
        Some(Token::Var(_)) => {
            let (rest, name) = var(input)?;
            Ok((
                rest,
                OrderKey {
                    var: name,
                    descending: false,
                },
            ))
        }
        _ => Err(unexpected(input)),
    }
}

fn limit_clause(input: Tokens<'_>) -> PResult<'_, Option<usize>> {
    let (rest, limit) = opt(preceded(tok(Token::Limit), integer))(input)?;
    match limit {
        Some(value) if value >= 0 => Ok((rest, Some(value as usize))),
        Some(_) => Err(unexpected(input)),
        None => Ok((rest, None)),
    }
}

// === The grammar proper ===

/// Token-stream grammar with the query's prefix table in scope.
struct Grammar {
    prefixes: HashMap<String, String>,
}

impl Grammar {
    fn resolve(&self, prefix: &str, local: &str) -> Result<String, NomErr<TokenError>> {
        self.prefixes
            .get(prefix)
            .map(|ns| format!("{}{}", ns, local))
            .ok_or_else(|| NomErr::Failure(TokenError::UnknownPrefix(prefix.to_string())))
    }

    fn query<'a>(&self, input: Tokens<'a>) -> PResult<'a, Query> {
        match input.first() {
            Some(Token::Ask) => {
                let (rest, pattern) =
                    preceded(tok(Token::Ask), |i| self.group_pattern(i))(input)?;
                Ok((rest, Query::Ask(pattern)))
            }
            _ => {
                let (rest, select) = self.select_query(input)?;
                Ok((rest, Query::Select(select)))
            }
        }
    }

    fn select_query<'a>(&self, input: Tokens<'a>) -> PResult<'a, SelectQuery> {
        let (rest, _) = tok(Token::Select)(input)?;
        let (rest, distinct) = opt(tok(Token::Distinct))(rest)?;
        let (rest, projection) = self.projection(rest)?;
        let (rest, _) = tok(Token::Where)(rest)?;
        let (rest, pattern) = self.group_pattern(rest)?;
        let (rest, order_by) = order_clause(rest)?;
        let (rest, limit) = limit_clause(rest)?;
        Ok((
            rest,
            SelectQuery {
                distinct: distinct.is_some(),
                projection,
                pattern,
                order_by,
                limit,
            },
        ))
    }

    fn projection<'a>(&self, input: Tokens<'a>) -> PResult<'a, Projection> {
        match input.first() {
            Some(Token::Star) => Ok((&input[1..], Projection::All)),
            Some(Token::Var(_)) => {
                let (rest, vars) = many1(var)(input)?;
                Ok((rest, Projection::Vars(vars)))
            }
            Some(Token::LParen) => {
                let (rest, _) = pair(tok(Token::LParen), tok(Token::Count))(input)?;
                let (rest, _) = tok(Token::LParen)(rest)?;
                let (rest, distinct_var) = match rest.first() {
                    Some(Token::Star) => (&rest[1..], None),
                    Some(Token::Distinct) => {
                        let (after, name) = var(&rest[1..])?;
                        (after, Some(name))
                    }
                    _ => return Err(unexpected(rest)),
                };
                let (rest, _) = tok(Token::RParen)(rest)?;
                let (rest, _) = tok(Token::As)(rest)?;
                let (rest, alias) = var(rest)?;
                let (rest, _) = tok(Token::RParen)(rest)?;
                Ok((
                    rest,
                    Projection::Count {
                        distinct_var,
                        alias,
                    },
                ))
            }
            _ => Err(unexpected(input)),
        }
    }

    /// `{ (triple . | OPTIONAL {..} | FILTER ..)* }`
    fn group_pattern<'a>(&self, input: Tokens<'a>) -> PResult<'a, GroupPattern> {
        let (mut rest, _) = tok(Token::LBrace)(input)?;
        let mut group = GroupPattern::default();

        loop {
            if let Ok((r, _)) = tok(Token::RBrace)(rest) {
                return Ok((r, group));
            }
            if let Ok((r, _)) = tok(Token::Optional)(rest) {
                let (r, block) = self.pattern_block(r)?;
                group.optionals.push(block);
                rest = r;
                continue;
            }
            if let Ok((r, _)) = tok(Token::Filter)(rest) {
                match r.first() {
                    Some(Token::Not) => {
                        let (r, block) = preceded(
                            pair(tok(Token::Not), tok(Token::Exists)),
                            |i| self.pattern_block(i),
                        )(r)?;
                        group.not_exists.push(block);
                        rest = r;
                    }
                    Some(Token::LParen) => {
                        let (r, filter) = delimited(
                            tok(Token::LParen),
                            |i| self.filter_expr(i),
                            tok(Token::RParen),
                        )(r)?;
                        group.filters.push(filter);
                        rest = r;
                    }
                    Some(Token::StrStarts) => {
                        // FILTER STRSTARTS(...) without outer parentheses.
                        let (r, filter) = self.filter_expr(r)?;
                        group.filters.push(filter);
                        rest = r;
                    }
                    _ => return Err(unexpected(r)),
                }
                continue;
            }

            let (r, pattern) = self.triple_pattern(rest)?;
            group.triples.push(pattern);
            let (r, _) = opt(tok(Token::Dot))(r)?;
            rest = r;
        }
    }

    /// `{ pattern (. pattern)* }` with only triple patterns inside.
    fn pattern_block<'a>(&self, input: Tokens<'a>) -> PResult<'a, Vec<TriplePattern>> {
        delimited(
            tok(Token::LBrace),
            many0(terminated(
                |i| self.triple_pattern(i),
                opt(tok(Token::Dot)),
            )),
            tok(Token::RBrace),
        )(input)
    }

    fn triple_pattern<'a>(&self, input: Tokens<'a>) -> PResult<'a, TriplePattern> {
        let (rest, subject) = self.node_pattern(input, false)?;
        let (rest, predicate) = self.predicate_pattern(rest)?;
        let (rest, object) = self.node_pattern(rest, true)?;
        Ok((
            rest,
            TriplePattern {
                subject,
                predicate,
                object,
            },
        ))
    }

    fn predicate_pattern<'a>(&self, input: Tokens<'a>) -> PResult<'a, NodePattern> {
        if let Ok((rest, _)) = tok(Token::A)(input) {
            return Ok((rest, NodePattern::Iri(RDF_TYPE.to_string())));
        }
        self.node_pattern(input, false)
    }

    fn node_pattern<'a>(
        &self,
        input: Tokens<'a>,
        allow_literal: bool,
    ) -> PResult<'a, NodePattern> {
        match input.split_first() {
            Some((Token::Var(name), rest)) => Ok((rest, NodePattern::Var(name.clone()))),
            Some((Token::Iri(iri), rest)) => Ok((rest, NodePattern::Iri(iri.clone()))),
            Some((Token::PName(prefix, local), rest)) => {
                Ok((rest, NodePattern::Iri(self.resolve(prefix, local)?)))
            }
            Some((Token::StringLit(lexical), rest)) if allow_literal => {
                let (rest, literal) = self.literal_suffix(rest, lexical.clone())?;
                Ok((rest, NodePattern::Literal(literal)))
            }
            Some((Token::Integer(value), rest)) if allow_literal => Ok((
                rest,
                NodePattern::Literal(Literal::typed(value.to_string(), XSD_INTEGER)),
            )),
            Some((Token::Decimal(value), rest)) if allow_literal => Ok((
                rest,
                NodePattern::Literal(Literal::typed(value.to_string(), XSD_DOUBLE)),
            )),
            _ => Err(unexpected(input)),
        }
    }

    /// Optional `^^datatype` or `@lang` after a string literal.
    fn literal_suffix<'a>(&self, input: Tokens<'a>, lexical: String) -> PResult<'a, Literal> {
        match input.split_first() {
            Some((Token::DoubleCaret, rest)) => match rest.split_first() {
                Some((Token::Iri(iri), rest)) => Ok((rest, Literal::typed(lexical, iri.clone()))),
                Some((Token::PName(prefix, local), rest)) => {
                    Ok((rest, Literal::typed(lexical, self.resolve(prefix, local)?)))
                }
                _ => Err(unexpected(rest)),
            },
            Some((Token::LangTag(lang), rest)) => Ok((rest, Literal::tagged(lexical, lang.clone()))),
            _ => Ok((input, Literal::plain(lexical))),
        }
    }

    fn filter_expr<'a>(&self, input: Tokens<'a>) -> PResult<'a, FilterExpr> {
        if let Ok((rest, _)) = tok(Token::StrStarts)(input) {
            let (rest, _) = pair(tok(Token::LParen), tok(Token::Str))(rest)?;
            let (rest, name) = delimited(tok(Token::LParen), var, tok(Token::RParen))(rest)?;
            let (rest, _) = tok(Token::Comma)(rest)?;
            let (rest, prefix) = string_lit(rest)?;
            let (rest, _) = tok(Token::RParen)(rest)?;
            return Ok((rest, FilterExpr::StrStarts { var: name, prefix }));
        }

        let (rest, name) = var(input)?;
        let (rest, op) = compare_op(rest)?;
        let (rest, value) = self.compare_value(rest)?;
        Ok((
            rest,
            FilterExpr::Compare {
                var: name,
                op,
                value,
            },
        ))
    }

    fn compare_value<'a>(&self, input: Tokens<'a>) -> PResult<'a, Term> {
        match input.split_first() {
            Some((Token::Integer(value), rest)) => {
                Ok((rest, Term::typed(value.to_string(), XSD_INTEGER)))
            }
            Some((Token::Decimal(value), rest)) => {
                Ok((rest, Term::typed(value.to_string(), XSD_DOUBLE)))
            }
            Some((Token::StringLit(lexical), rest)) => {
                let (rest, literal) = self.literal_suffix(rest, lexical.clone())?;
                Ok((rest, Term::Literal(literal)))
            }
            Some((Token::Iri(iri), rest)) => Ok((rest, Term::Iri(iri.clone()))),
            Some((Token::PName(prefix, local), rest)) => {
                Ok((rest, Term::Iri(self.resolve(prefix, local)?)))
            }
            _ => Err(unexpected(input)),
        }
    }

    // === Updates ===

    fn update<'a>(&self, input: Tokens<'a>) -> PResult<'a, UpdateOp> {
        match input.first() {
            Some(Token::Insert) => {
                let rest = &input[1..];
                match rest.first() {
                    Some(Token::Data) => {
                        let (rest, triples) = self.ground_block(&rest[1..])?;
                        Ok((rest, UpdateOp::InsertData(triples)))
                    }
                    Some(Token::LBrace) => {
                        let (rest, insert) = self.pattern_block(rest)?;
                        let (rest, pattern) =
                            preceded(tok(Token::Where), |i| self.group_pattern(i))(rest)?;
                        Ok((
                            rest,
                            UpdateOp::Modify {
                                delete: Vec::new(),
                                insert,
                                pattern,
                            },
                        ))
                    }
                    _ => Err(unexpected(rest)),
                }
            }
            Some(Token::Delete) => {
                let rest = &input[1..];
                match rest.first() {
                    Some(Token::Data) => {
                        let (rest, triples) = self.ground_block(&rest[1..])?;
                        Ok((rest, UpdateOp::DeleteData(triples)))
                    }
                    Some(Token::Where) => {
                        let (rest, patterns) = self.pattern_block(&rest[1..])?;
                        Ok((rest, UpdateOp::DeleteWhere(patterns)))
                    }
                    Some(Token::LBrace) => {
                        let (rest, delete) = self.pattern_block(rest)?;
                        let (rest, insert) =
                            opt(preceded(tok(Token::Insert), |i| self.pattern_block(i)))(rest)?;
                        let (rest, pattern) =
                            preceded(tok(Token::Where), |i| self.group_pattern(i))(rest)?;
                        Ok((
                            rest,
                            UpdateOp::Modify {
                                delete,
                                insert: insert.unwrap_or_default(),
                                pattern,
                            },
                        ))
                    }
                    _ => Err(unexpected(rest)),
                }
            }
            _ => Err(unexpected(input)),
        }
    }

    /// A `{ ... }` block of ground triples (no variables).
    fn ground_block<'a>(&self, input: Tokens<'a>) -> PResult<'a, Vec<Triple>> {
        let (rest, patterns) = self.pattern_block(input)?;
        let mut triples = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let subject = match pattern.subject {
                NodePattern::Iri(iri) => iri,
                other => {
                    return Err(NomErr::Failure(TokenError::Message(format!(
                        "non-IRI subject in DATA block: {:?}",
                        other
                    ))))
                }
            };
            let predicate = match pattern.predicate {
                NodePattern::Iri(iri) => iri,
                other => {
                    return Err(NomErr::Failure(TokenError::Message(format!(
                        "non-IRI predicate in DATA block: {:?}",
                        other
                    ))))
                }
            };
            let object = pattern.object.as_term().ok_or_else(|| {
                NomErr::Failure(TokenError::Message(
                    "variable object in DATA block".to_string(),
                ))
            })?;
            triples.push(Triple::new(subject, predicate, object));
        }
        Ok((rest, triples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIXES: &str = "PREFIX jido: <https://jido.ai/ontology#>\n\
                            PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
                            PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n";

    #[test]
    fn parses_select_with_optional_and_not_exists() {
        let query = format!(
            "{PREFIXES}SELECT ?memory ?content WHERE {{\n\
               ?memory rdf:type jido:Fact .\n\
               ?memory jido:content ?content .\n\
               OPTIONAL {{ ?memory jido:rationale ?rationale }}\n\
               FILTER NOT EXISTS {{ ?memory jido:supersededBy ?x }}\n\
               FILTER (?confidence >= 0.8)\n\
             }} ORDER BY DESC(?created) LIMIT 50"
        );
        let parsed = parse_query(&query).unwrap();
        let select = match parsed {
            Query::Select(s) => s,
            other => panic!("expected select, got {:?}", other),
        };
        assert_eq!(select.pattern.triples.len(), 2);
        assert_eq!(select.pattern.optionals.len(), 1);
        assert_eq!(select.pattern.not_exists.len(), 1);
        assert_eq!(select.pattern.filters.len(), 1);
        assert_eq!(select.limit, Some(50));
        assert_eq!(select.order_by.len(), 1);
        assert!(select.order_by[0].descending);
        assert_eq!(
            select.pattern.triples[0].predicate,
            NodePattern::Iri(RDF_TYPE.to_string())
        );
    }

    #[test]
    fn parses_count_projection() {
        let query = format!(
            "{PREFIXES}SELECT (COUNT(DISTINCT ?s) AS ?count) WHERE {{ ?s ?p ?o }}"
        );
        let parsed = parse_query(&query).unwrap();
        match parsed {
            Query::Select(s) => match s.projection {
                Projection::Count {
                    distinct_var: Some(v),
                    alias,
                } => {
                    assert_eq!(v, "s");
                    assert_eq!(alias, "count");
                }
                other => panic!("unexpected projection: {:?}", other),
            },
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn parses_ask() {
        let query = format!(
            "{PREFIXES}ASK {{ jido:MemoryItem rdf:type <http://www.w3.org/2002/07/owl#Class> }}"
        );
        assert!(matches!(parse_query(&query).unwrap(), Query::Ask(_)));
    }

    #[test]
    fn parses_insert_data_with_typed_literals() {
        let update = format!(
            "{PREFIXES}INSERT DATA {{\n\
               jido:memory_mem-001 rdf:type jido:Fact .\n\
               jido:memory_mem-001 jido:confidenceScore \"0.9\"^^xsd:double .\n\
               jido:memory_mem-001 jido:accessCount \"0\"^^xsd:integer .\n\
             }}"
        );
        let parsed = parse_update(&update).unwrap();
        match parsed {
            UpdateOp::InsertData(triples) => {
                assert_eq!(triples.len(), 3);
                assert_eq!(
                    triples[0].subject,
                    "https://jido.ai/ontology#memory_mem-001"
                );
            }
            other => panic!("unexpected op: {:?}", other),
        }
    }

    #[test]
    fn rejects_variables_in_data_blocks() {
        let update = format!("{PREFIXES}INSERT DATA {{ jido:a jido:p ?x }}");
        assert!(parse_update(&update).is_err());
    }

    #[test]
    fn parses_delete_where_and_modify() {
        let delete = format!(
            "{PREFIXES}DELETE WHERE {{ jido:memory_m jido:accessCount ?c }}"
        );
        assert!(matches!(
            parse_update(&delete).unwrap(),
            UpdateOp::DeleteWhere(_)
        ));

        let modify = format!(
            "{PREFIXES}DELETE {{ ?s ?p ?o }} WHERE {{ ?s ?p ?o . \
             FILTER (STRSTARTS(STR(?s), \"https://jido.ai/ontology#\")) }}"
        );
        match parse_update(&modify).unwrap() {
            UpdateOp::Modify {
                delete, pattern, ..
            } => {
                assert_eq!(delete.len(), 1);
                assert_eq!(pattern.filters.len(), 1);
            }
            other => panic!("unexpected op: {:?}", other),
        }
    }

    #[test]
    fn parse_failure_is_a_typed_error() {
        assert!(matches!(
            parse_query("SELECT WHERE"),
            Err(SparqlError::Parse(_))
        ));
        assert!(matches!(
            parse_query("PREFIX jido: <x> SELECT ?a WHERE { unknown:b ?p ?o }"),
            Err(SparqlError::UnknownPrefix(_))
        ));
    }
}
