// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lexer for the SPARQL subset using nom combinators
//!
//! Each token parser either consumes input or returns an error so the outer
//! tokenize loop can never stall. Parser order in the `alt` chains matters:
//! more specific patterns come before general ones - two-character operators
//! before their one-character prefixes, IRI references before the less-than
//! operator, numbers before bare words. An IRI reference is distinguished
//! from `<` by requiring its closing `>` before any whitespace.

use super::SparqlError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types for the SPARQL subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Prefix,
    Select,
    Distinct,
    Where,
    Filter,
    Not,
    Exists,
    Optional,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Ask,
    Count,
    As,
    Insert,
    Delete,
    Data,
    StrStarts,
    Str,
    /// Lowercase `a`, the rdf:type shorthand.
    A,

    // Terms
    Var(String),
    Iri(String),
    /// `prefix:local`; the prefix may be empty.
    PName(String, String),
    /// `prefix:` as it appears in PREFIX declarations.
    PNameNs(String),
    StringLit(String),
    LangTag(String),
    Integer(i64),
    Decimal(f64),

    // Punctuation and operators
    LBrace,
    RBrace,
    LParen,
    RParen,
    Dot,
    Semicolon,
    Comma,
    Star,
    DoubleCaret,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn keyword(word: &str) -> Option<Token> {
    if word == "a" {
        return Some(Token::A);
    }
    match word.to_ascii_uppercase().as_str() {
        "PREFIX" => Some(Token::Prefix),
        "SELECT" => Some(Token::Select),
        "DISTINCT" => Some(Token::Distinct),
        "WHERE" => Some(Token::Where),
        "FILTER" => Some(Token::Filter),
        "NOT" => Some(Token::Not),
        "EXISTS" => Some(Token::Exists),
        "OPTIONAL" => Some(Token::Optional),
        "ORDER" => Some(Token::Order),
        "BY" => Some(Token::By),
        "ASC" => Some(Token::Asc),
        "DESC" => Some(Token::Desc),
        "LIMIT" => Some(Token::Limit),
        "ASK" => Some(Token::Ask),
        "COUNT" => Some(Token::Count),
        "AS" => Some(Token::As),
        "INSERT" => Some(Token::Insert),
        "DELETE" => Some(Token::Delete),
        "DATA" => Some(Token::Data),
        "STRSTARTS" => Some(Token::StrStarts),
        "STR" => Some(Token::Str),
        _ => None,
    }
}

/// Tokenize a SPARQL string. Any character the subset does not know is a
/// lex error, never silently skipped.
pub fn tokenize(input: &str) -> Result<Vec<Token>, SparqlError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        match token(rest) {
            Ok((next, parsed)) => {
                tokens.push(parsed);
                rest = next;
            }
            Err(_) => return Err(lex_error(rest)),
        }
    }

    Ok(tokens)
}

fn lex_error(rest: &str) -> SparqlError {
    SparqlError::Lex(rest.chars().take(32).collect())
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((
        operator,
        iri_ref,
        variable,
        lang_tag,
        string_literal,
        number,
        word_like,
        empty_pname,
        punctuation,
    ))(input)
}

/// Two-character operators; tried before their one-character prefixes.
fn operator(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Le, tag("<=")),
        value(Token::Ge, tag(">=")),
        value(Token::Ne, tag("!=")),
        value(Token::DoubleCaret, tag("^^")),
    ))(input)
}

fn punctuation(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::LBrace, char('{')),
        value(Token::RBrace, char('}')),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        value(Token::Dot, char('.')),
        value(Token::Semicolon, char(';')),
        value(Token::Comma, char(',')),
        value(Token::Star, char('*')),
        value(Token::Eq, char('=')),
        value(Token::Gt, char('>')),
        value(Token::Lt, char('<')),
    ))(input)
}

/// An IRI reference must close before the next whitespace; otherwise the
/// `<` falls through to the less-than operator.
fn iri_ref(input: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('<'),
            take_while1(|c: char| c != '>' && !c.is_whitespace()),
            char('>'),
        ),
        |iri: &str| Token::Iri(iri.to_string()),
    )(input)
}

fn variable(input: &str) -> IResult<&str, Token> {
    map(preceded(char('?'), take_while1(is_name_char)), |name: &str| {
        Token::Var(name.to_string())
    })(input)
}

fn lang_tag(input: &str) -> IResult<&str, Token> {
    map(
        preceded(
            char('@'),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        ),
        |lang: &str| Token::LangTag(lang.to_string()),
    )(input)
}

/// String literal with escape handling. The body is stepped by hand so the
/// escape table stays in one place; the signature keeps it composable.
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (body, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((&body[idx + 1..], Token::StringLit(out))),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    // Unterminated string; a hard failure, not a backtrack point.
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Escaped,
    )))
}

fn number(input: &str) -> IResult<&str, Token> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)?;
    let token = if text.contains('.') {
        match text.parse::<f64>() {
            Ok(parsed) => Token::Decimal(parsed),
            Err(_) => return Err(numeric_error(input)),
        }
    } else {
        match text.parse::<i64>() {
            Ok(parsed) => Token::Integer(parsed),
            Err(_) => return Err(numeric_error(input)),
        }
    };
    Ok((rest, token))
}

fn numeric_error(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// A bare word: a prefixed name when a colon follows, a keyword otherwise.
/// Unknown bare words are errors, never identifiers.
fn word_like(input: &str) -> IResult<&str, Token> {
    let (rest, word) = take_while1(is_name_char)(input)?;
    if let Ok((after_colon, _)) = char::<_, nom::error::Error<&str>>(':')(rest) {
        let (rest, local) = take_while(is_name_char)(after_colon)?;
        if local.is_empty() {
            return Ok((rest, Token::PNameNs(word.to_string())));
        }
        return Ok((rest, Token::PName(word.to_string(), local.to_string())));
    }
    match keyword(word) {
        Some(token) => Ok((rest, token)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Prefixed name with an empty prefix, e.g. `:local`.
fn empty_pname(input: &str) -> IResult<&str, Token> {
    map(preceded(char(':'), take_while1(is_name_char)), |local: &str| {
        Token::PName(String::new(), local.to_string())
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_select_query() {
        let tokens = tokenize(
            "PREFIX jido: <https://jido.ai/ontology#>\n\
             SELECT ?memory WHERE { ?memory a jido:Fact . FILTER (?conf >= 0.8) } LIMIT 10",
        )
        .unwrap();
        assert!(tokens.contains(&Token::Select));
        assert!(tokens.contains(&Token::Var("memory".to_string())));
        assert!(tokens.contains(&Token::PNameNs("jido".to_string())));
        assert!(tokens.contains(&Token::PName("jido".to_string(), "Fact".to_string())));
        assert!(tokens.contains(&Token::A));
        assert!(tokens.contains(&Token::Ge));
        assert!(tokens.contains(&Token::Decimal(0.8)));
        assert!(tokens.contains(&Token::Integer(10)));
    }

    #[test]
    fn distinguishes_iri_from_less_than() {
        let tokens = tokenize("<https://jido.ai/ontology#x> ?a < 3").unwrap();
        assert_eq!(tokens[0], Token::Iri("https://jido.ai/ontology#x".to_string()));
        assert_eq!(tokens[2], Token::Lt);
    }

    #[test]
    fn lexes_typed_literal_markers() {
        let tokens =
            tokenize("\"0.9\"^^<http://www.w3.org/2001/XMLSchema#double> \"hi\"@en").unwrap();
        assert_eq!(tokens[0], Token::StringLit("0.9".to_string()));
        assert_eq!(tokens[1], Token::DoubleCaret);
        assert_eq!(tokens[3], Token::LangTag("en".to_string()));
    }

    #[test]
    fn escaped_quotes_stay_in_string() {
        let tokens = tokenize(r#""say \"hi\"\n""#).unwrap();
        assert_eq!(tokens[0], Token::StringLit("say \"hi\"\n".to_string()));
    }

    #[test]
    fn unterminated_strings_are_errors() {
        assert!(tokenize("\"no closing quote").is_err());
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(tokenize("SELECT %").is_err());
        assert!(tokenize("bareword").is_err());
    }
}
