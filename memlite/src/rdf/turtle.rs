// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Turtle subset parser for ontology documents
//!
//! Supports the shapes the shipped ontology documents use: `@prefix`
//! directives, predicate lists (`;`), object lists (`,`), the `a` keyword,
//! IRIs, prefixed names, string literals with optional language tag or
//! datatype, numbers, and booleans. Comments run from `#` to end of line.

use crate::rdf::term::{Literal, Term, Triple, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER};
use crate::rdf::vocab::RDF_TYPE;
use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    sequence::delimited,
    IResult,
};
use std::collections::HashMap;
use thiserror::Error;

/// Turtle parsing errors.
#[derive(Error, Debug)]
pub enum TurtleError {
    #[error("Turtle syntax error near: {0}")]
    Syntax(String),

    #[error("Unknown prefix '{0}:'")]
    UnknownPrefix(String),

    #[error("Unterminated string literal")]
    UnterminatedString,
}

/// An IRI as written, before prefix resolution.
#[derive(Debug, Clone)]
enum RawIri {
    Full(String),
    Prefixed { prefix: String, local: String },
}

/// An object as written.
#[derive(Debug, Clone)]
enum RawObject {
    Iri(RawIri),
    Literal(Literal),
}

/// Parse a full Turtle document into resolved triples.
pub fn parse_document(input: &str) -> Result<Vec<Triple>, TurtleError> {
    let mut prefixes: HashMap<String, String> = HashMap::new();
    let mut triples = Vec::new();
    let mut rest = input;

    loop {
        rest = skip_ws(rest);
        if rest.is_empty() {
            break;
        }

        if rest.starts_with("@prefix") {
            let (r, (prefix, iri)) = prefix_directive(rest).map_err(|_| syntax_error(rest))?;
            prefixes.insert(prefix, iri);
            rest = r;
            continue;
        }

        let (r, (subject, pairs)) = statement(rest)?;
        let subject = resolve(&subject, &prefixes)?;
        for (verb, objects) in pairs {
            let predicate = match verb {
                None => RDF_TYPE.to_string(),
                Some(raw) => resolve(&raw, &prefixes)?,
            };
            for object in objects {
                let object = match object {
                    RawObject::Iri(raw) => Term::Iri(resolve(&raw, &prefixes)?),
                    RawObject::Literal(lit) => Term::Literal(lit),
                };
                triples.push(Triple::new(subject.clone(), predicate.clone(), object));
            }
        }
        rest = r;
    }

    Ok(triples)
}

fn syntax_error(rest: &str) -> TurtleError {
    TurtleError::Syntax(rest.chars().take(48).collect())
}

/// Consume whitespace and `#` comments.
fn skip_ws(mut input: &str) -> &str {
    loop {
        let trimmed = input.trim_start();
        if let Some(after_hash) = trimmed.strip_prefix('#') {
            match after_hash.find('\n') {
                Some(idx) => input = &after_hash[idx + 1..],
                None => return "",
            }
        } else {
            return trimmed;
        }
    }
}

/// `@prefix jido: <https://...#> .`
fn prefix_directive(input: &str) -> IResult<&str, (String, String)> {
    let (rest, _) = tag("@prefix")(input)?;
    let rest = skip_ws(rest);
    let (rest, prefix) = take_while(is_prefix_char)(rest)?;
    let (rest, _) = char(':')(rest)?;
    let rest = skip_ws(rest);
    let (rest, iri) = iriref(rest)?;
    let rest = skip_ws(rest);
    let (rest, _) = char('.')(rest)?;
    Ok((rest, (prefix.to_string(), iri.to_string())))
}

fn is_prefix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// `<https://...>`
fn iriref(input: &str) -> IResult<&str, &str> {
    delimited(char('<'), take_while(|c| c != '>' && c != '\n'), char('>'))(input)
}

/// `jido:MemoryItem` (the prefix part may be empty)
fn prefixed_name(input: &str) -> IResult<&str, RawIri> {
    let (rest, prefix) = take_while(is_prefix_char)(input)?;
    let (rest, _) = char(':')(rest)?;
    let (rest, local) = take_while1(is_local_char)(rest)?;
    Ok((
        rest,
        RawIri::Prefixed {
            prefix: prefix.to_string(),
            local: local.to_string(),
        },
    ))
}

fn raw_iri(input: &str) -> IResult<&str, RawIri> {
    if input.starts_with('<') {
        let (rest, iri) = iriref(input)?;
        Ok((rest, RawIri::Full(iri.to_string())))
    } else {
        prefixed_name(input)
    }
}

/// One statement: `subject verb objects (; verb objects)* .`
#[allow(clippy::type_complexity)]
fn statement(input: &str) -> Result<(&str, (RawIri, Vec<(Option<RawIri>, Vec<RawObject>)>)), TurtleError> {
    let rest = skip_ws(input);
    let (mut rest, subject) = raw_iri(rest).map_err(|_| syntax_error(rest))?;

    let mut pairs = Vec::new();
    loop {
        let r = skip_ws(rest);
        let (r, verb) = verb(r).map_err(|_| syntax_error(r))?;
        let (r, objects) = object_list(r)?;
        pairs.push((verb, objects));

        let r = skip_ws(r);
        if let Some(after) = r.strip_prefix(';') {
            // A trailing `;` directly before `.` is legal Turtle.
            let peek = skip_ws(after);
            if let Some(done) = peek.strip_prefix('.') {
                return Ok((done, (subject, pairs)));
            }
            rest = after;
            continue;
        }
        if let Some(done) = r.strip_prefix('.') {
            return Ok((done, (subject, pairs)));
        }
        return Err(syntax_error(r));
    }
}

/// Predicate position: `a` or an IRI. `None` encodes `a` (rdf:type).
fn verb(input: &str) -> IResult<&str, Option<RawIri>> {
    if let Some(rest) = input.strip_prefix('a') {
        // `a` only when not the start of a longer name like `agent:x`.
        if rest
            .chars()
            .next()
            .map(|c| c.is_whitespace())
            .unwrap_or(false)
        {
            return Ok((rest, None));
        }
    }
    let (rest, iri) = raw_iri(input)?;
    Ok((rest, Some(iri)))
}

fn object_list(input: &str) -> Result<(&str, Vec<RawObject>), TurtleError> {
    let mut objects = Vec::new();
    let mut rest = input;
    loop {
        let r = skip_ws(rest);
        let (r, object) = object(r)?;
        objects.push(object);
        let r = skip_ws(r);
        match r.strip_prefix(',') {
            Some(after) => rest = after,
            None => return Ok((r, objects)),
        }
    }
}

fn object(input: &str) -> Result<(&str, RawObject), TurtleError> {
    if input.starts_with('"') {
        let (rest, literal) = string_object(input)?;
        return Ok((rest, RawObject::Literal(literal)));
    }
    if let Some(rest) = keyword(input, "true") {
        return Ok((rest, RawObject::Literal(Literal::typed("true", XSD_BOOLEAN))));
    }
    if let Some(rest) = keyword(input, "false") {
        return Ok((
            rest,
            RawObject::Literal(Literal::typed("false", XSD_BOOLEAN)),
        ));
    }
    if input.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
        let (rest, literal) = number(input).map_err(|_| syntax_error(input))?;
        return Ok((rest, RawObject::Literal(literal)));
    }
    let (rest, iri) = raw_iri(input).map_err(|_| syntax_error(input))?;
    Ok((rest, RawObject::Iri(iri)))
}

fn keyword<'a>(input: &'a str, word: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == ';' || c == ',' || c == '.' => Some(rest),
        Some(_) => None,
    }
}

/// `"..."` with optional `@lang` or `^^datatype` suffix.
fn string_object(input: &str) -> Result<(&str, Literal), TurtleError> {
    let (rest, lexical) = string_body(input)?;

    if let Some(after) = rest.strip_prefix("^^") {
        let (after, datatype) = raw_iri(after).map_err(|_| syntax_error(after))?;
        // Datatype IRIs in the shipped documents are always absolute or xsd:.
        let datatype = match datatype {
            RawIri::Full(iri) => iri,
            RawIri::Prefixed { prefix, local } if prefix == "xsd" => {
                format!("{}{}", crate::rdf::vocab::XSD_NS, local)
            }
            RawIri::Prefixed { prefix, .. } => return Err(TurtleError::UnknownPrefix(prefix)),
        };
        return Ok((
            after,
            Literal {
                lexical,
                datatype: Some(datatype),
                language: None,
            },
        ));
    }

    if let Some(after) = rest.strip_prefix('@') {
        let (after, lang) =
            take_while1::<_, _, nom::error::Error<&str>>(|c: char| c.is_ascii_alphanumeric() || c == '-')(after)
                .map_err(|_| syntax_error(after))?;
        return Ok((after, Literal::tagged(lexical, lang)));
    }

    Ok((rest, Literal::plain(lexical)))
}

fn string_body(input: &str) -> Result<(&str, String), TurtleError> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => return Err(syntax_error(input)),
    }

    let mut out = String::new();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((&input[idx + 1..], out)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => out.push(other),
                None => return Err(TurtleError::UnterminatedString),
            },
            other => out.push(other),
        }
    }
    Err(TurtleError::UnterminatedString)
}

fn number(input: &str) -> IResult<&str, Literal> {
    let (rest, sign) = take_while(|c| c == '-' || c == '+')(input)?;
    let (rest, whole) = take_while1(|c: char| c.is_ascii_digit())(rest)?;
    if let Some(frac_input) = rest.strip_prefix('.') {
        if frac_input.starts_with(|c: char| c.is_ascii_digit()) {
            let (rest, frac) = take_while1::<_, _, nom::error::Error<&str>>(|c: char| {
                c.is_ascii_digit()
            })(frac_input)?;
            let lexical = format!("{}{}.{}", sign, whole, frac);
            return Ok((rest, Literal::typed(lexical, XSD_DOUBLE)));
        }
    }
    Ok((rest, Literal::typed(format!("{}{}", sign, whole), XSD_INTEGER)))
}

fn resolve(raw: &RawIri, prefixes: &HashMap<String, String>) -> Result<String, TurtleError> {
    match raw {
        RawIri::Full(iri) => Ok(iri.clone()),
        RawIri::Prefixed { prefix, local } => prefixes
            .get(prefix)
            .map(|ns| format!("{}{}", ns, local))
            .ok_or_else(|| TurtleError::UnknownPrefix(prefix.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::vocab::{OWL_CLASS, RDFS_NS};

    const DOC: &str = r#"
@prefix jido: <https://jido.ai/ontology#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

# The root class.
jido:MemoryItem a owl:Class ;
    rdfs:label "Memory item" ;
    rdfs:comment "A single knowledge item." .

jido:Fact a owl:Class ;
    rdfs:subClassOf jido:MemoryItem ;
    rdfs:label "Fact" .
"#;

    #[test]
    fn parses_classes_and_predicate_lists() {
        let triples = parse_document(DOC).unwrap();
        assert_eq!(triples.len(), 6);
        assert!(triples.iter().any(|t| {
            t.subject == "https://jido.ai/ontology#MemoryItem"
                && t.predicate == RDF_TYPE
                && t.object == Term::iri(OWL_CLASS)
        }));
        assert!(triples.iter().any(|t| {
            t.subject == "https://jido.ai/ontology#Fact"
                && t.predicate == format!("{}subClassOf", RDFS_NS)
                && t.object == Term::iri("https://jido.ai/ontology#MemoryItem")
        }));
    }

    #[test]
    fn parses_object_lists_and_comments() {
        let doc = r#"
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b, ex:c . # trailing comment
"#;
        let triples = parse_document(doc).unwrap();
        assert_eq!(triples.len(), 2);
    }

    #[test]
    fn parses_escaped_strings_and_langtags() {
        let doc = r#"
@prefix ex: <http://example.org/> .
ex:a ex:label "line\nbreak" ;
     ex:note "hello"@en ;
     ex:score "0.9"^^<http://www.w3.org/2001/XMLSchema#double> ;
     ex:count 42 .
"#;
        let triples = parse_document(doc).unwrap();
        assert_eq!(triples.len(), 4);
        assert!(triples
            .iter()
            .any(|t| t.object == Term::Literal(Literal::plain("line\nbreak"))));
        assert!(triples
            .iter()
            .any(|t| t.object == Term::Literal(Literal::tagged("hello", "en"))));
        assert!(triples.iter().any(|t| t.object == Term::integer(42)));
    }

    #[test]
    fn unknown_prefix_is_an_error() {
        let doc = "missing:a missing:p missing:c .";
        assert!(matches!(
            parse_document(doc),
            Err(TurtleError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn truncated_statement_is_an_error() {
        let doc = r#"
@prefix ex: <http://example.org/> .
ex:a ex:p
"#;
        assert!(parse_document(doc).is_err());
    }
}
