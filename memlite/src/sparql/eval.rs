// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Evaluator for the SPARQL subset
//!
//! Solves basic graph patterns against the in-memory triple index by
//! sequential join, extending a set of candidate bindings one pattern at a
//! time. Candidate triples come back in insertion order, so unordered query
//! results are stable across runs and restarts.

use super::ast::*;
use super::SparqlError;
use crate::rdf::term::{Term, Triple};
use crate::store::index::TripleIndex;
use std::collections::{HashMap, HashSet};

/// One solution row: variable name to bound term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySolution {
    bindings: HashMap<String, Term>,
}

impl QuerySolution {
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.bindings.get(var)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.bindings.contains_key(var)
    }
}

/// Result of a query evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResults {
    Solutions {
        variables: Vec<String>,
        rows: Vec<QuerySolution>,
    },
    Boolean(bool),
}

/// Triples an update resolves to, ready for the store to apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    pub inserts: Vec<Triple>,
    pub removes: Vec<Triple>,
}

type Bindings = HashMap<String, Term>;

/// Evaluate a parsed query against the index.
pub fn evaluate_query(index: &TripleIndex, query: &Query) -> Result<QueryResults, SparqlError> {
    match query {
        Query::Ask(pattern) => {
            let solutions = match_group(index, pattern);
            Ok(QueryResults::Boolean(!solutions.is_empty()))
        }
        Query::Select(select) => evaluate_select(index, select),
    }
}

/// Resolve an update operation into concrete inserts and removes.
pub fn plan_update(index: &TripleIndex, update: &UpdateOp) -> Result<UpdatePlan, SparqlError> {
    match update {
        UpdateOp::InsertData(triples) => Ok(UpdatePlan {
            inserts: triples.clone(),
            removes: Vec::new(),
        }),
        UpdateOp::DeleteData(triples) => Ok(UpdatePlan {
            inserts: Vec::new(),
            removes: triples.clone(),
        }),
        UpdateOp::DeleteWhere(patterns) => {
            let group = GroupPattern {
                triples: patterns.clone(),
                ..GroupPattern::default()
            };
            let solutions = match_group(index, &group);
            Ok(UpdatePlan {
                inserts: Vec::new(),
                removes: instantiate_all(patterns, &solutions),
            })
        }
        UpdateOp::Modify {
            delete,
            insert,
            pattern,
        } => {
            let solutions = match_group(index, pattern);
            Ok(UpdatePlan {
                inserts: instantiate_all(insert, &solutions),
                removes: instantiate_all(delete, &solutions),
            })
        }
    }
}

fn evaluate_select(
    index: &TripleIndex,
    select: &SelectQuery,
) -> Result<QueryResults, SparqlError> {
    let mut solutions = match_group(index, &select.pattern);

    if !select.order_by.is_empty() {
        sort_solutions(&mut solutions, &select.order_by);
    }

    match &select.projection {
        Projection::Count {
            distinct_var,
            alias,
        } => {
            let count = match distinct_var {
                None => solutions.len(),
                Some(var) => {
                    let distinct: HashSet<&Term> =
                        solutions.iter().filter_map(|b| b.get(var)).collect();
                    distinct.len()
                }
            };
            let mut bindings = HashMap::new();
            bindings.insert(alias.clone(), Term::integer(count as i64));
            Ok(QueryResults::Solutions {
                variables: vec![alias.clone()],
                rows: vec![QuerySolution { bindings }],
            })
        }
        Projection::All => {
            let variables = collect_variables(&select.pattern);
            let rows = finalize_rows(solutions, &variables, select.distinct, select.limit);
            Ok(QueryResults::Solutions { variables, rows })
        }
        Projection::Vars(vars) => {
            let rows = finalize_rows(solutions, vars, select.distinct, select.limit);
            Ok(QueryResults::Solutions {
                variables: vars.clone(),
                rows,
            })
        }
    }
}

fn finalize_rows(
    solutions: Vec<Bindings>,
    variables: &[String],
    distinct: bool,
    limit: Option<usize>,
) -> Vec<QuerySolution> {
    let mut rows = Vec::with_capacity(solutions.len());
    let mut seen: HashSet<Vec<Option<Term>>> = HashSet::new();

    for solution in solutions {
        let mut bindings = HashMap::with_capacity(variables.len());
        for var in variables {
            if let Some(term) = solution.get(var) {
                bindings.insert(var.clone(), term.clone());
            }
        }
        if distinct {
            let key: Vec<Option<Term>> = variables
                .iter()
                .map(|v| bindings.get(v).cloned())
                .collect();
            if !seen.insert(key) {
                continue;
            }
        }
        rows.push(QuerySolution { bindings });
        if let Some(limit) = limit {
            if rows.len() >= limit {
                break;
            }
        }
    }
    rows
}

fn sort_solutions(solutions: &mut [Bindings], keys: &[OrderKey]) {
    solutions.sort_by(|a, b| {
        for key in keys {
            let ordering = match (a.get(&key.var), b.get(&key.var)) {
                (Some(x), Some(y)) => x.compare(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn collect_variables(pattern: &GroupPattern) -> Vec<String> {
    let mut variables = Vec::new();
    let mut push = |node: &NodePattern, out: &mut Vec<String>| {
        if let NodePattern::Var(name) = node {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
    };
    for block in std::iter::once(&pattern.triples).chain(pattern.optionals.iter()) {
        for triple in block {
            push(&triple.subject, &mut variables);
            push(&triple.predicate, &mut variables);
            push(&triple.object, &mut variables);
        }
    }
    variables
}

/// Solve a group pattern: triples, then OPTIONALs, then NOT EXISTS, then
/// value filters. The adapter's queries are all expressible in this order.
fn match_group(index: &TripleIndex, group: &GroupPattern) -> Vec<Bindings> {
    let mut solutions = vec![Bindings::new()];
    for pattern in &group.triples {
        solutions = extend(index, solutions, pattern);
        if solutions.is_empty() {
            break;
        }
    }

    for optional in &group.optionals {
        solutions = solutions
            .into_iter()
            .flat_map(|binding| {
                let extended = match_block(index, binding.clone(), optional);
                if extended.is_empty() {
                    vec![binding]
                } else {
                    extended
                }
            })
            .collect();
    }

    for absent in &group.not_exists {
        solutions.retain(|binding| match_block(index, binding.clone(), absent).is_empty());
    }

    for filter in &group.filters {
        solutions.retain(|binding| eval_filter(binding, filter));
    }

    solutions
}

fn match_block(index: &TripleIndex, seed: Bindings, patterns: &[TriplePattern]) -> Vec<Bindings> {
    let mut solutions = vec![seed];
    for pattern in patterns {
        solutions = extend(index, solutions, pattern);
        if solutions.is_empty() {
            break;
        }
    }
    solutions
}

fn extend(
    index: &TripleIndex,
    solutions: Vec<Bindings>,
    pattern: &TriplePattern,
) -> Vec<Bindings> {
    let mut next = Vec::new();
    for binding in solutions {
        let subject = concrete(&pattern.subject, &binding);
        let predicate = concrete(&pattern.predicate, &binding);
        let object = concrete(&pattern.object, &binding);

        // A subject or predicate bound to a literal can never match.
        let subject_iri = match &subject {
            Some(Term::Iri(iri)) => Some(iri.as_str()),
            Some(Term::Literal(_)) => continue,
            None => None,
        };
        let predicate_iri = match &predicate {
            Some(Term::Iri(iri)) => Some(iri.as_str()),
            Some(Term::Literal(_)) => continue,
            None => None,
        };

        for triple in index.candidates(subject_iri, predicate_iri, object.as_ref()) {
            if let Some(extended) = unify(&binding, pattern, triple) {
                next.push(extended);
            }
        }
    }
    next
}

fn concrete(node: &NodePattern, binding: &Bindings) -> Option<Term> {
    match node {
        NodePattern::Var(name) => binding.get(name).cloned(),
        _ => node.as_term(),
    }
}

fn unify(binding: &Bindings, pattern: &TriplePattern, triple: &Triple) -> Option<Bindings> {
    let mut out = binding.clone();
    bind(&mut out, &pattern.subject, &Term::Iri(triple.subject.clone()))?;
    bind(
        &mut out,
        &pattern.predicate,
        &Term::Iri(triple.predicate.clone()),
    )?;
    bind(&mut out, &pattern.object, &triple.object)?;
    Some(out)
}

fn bind(binding: &mut Bindings, node: &NodePattern, value: &Term) -> Option<()> {
    match node {
        NodePattern::Var(name) => match binding.get(name) {
            Some(existing) if existing != value => None,
            Some(_) => Some(()),
            None => {
                binding.insert(name.clone(), value.clone());
                Some(())
            }
        },
        _ => match node.as_term() {
            Some(term) if &term == value => Some(()),
            _ => None,
        },
    }
}

fn eval_filter(binding: &Bindings, filter: &FilterExpr) -> bool {
    match filter {
        FilterExpr::StrStarts { var, prefix } => binding
            .get(var)
            .map(|term| term.lexical().starts_with(prefix.as_str()))
            .unwrap_or(false),
        FilterExpr::Compare { var, op, value } => {
            let Some(term) = binding.get(var) else {
                return false;
            };
            let ordering = match (term.as_f64(), value.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(term.lexical().cmp(value.lexical())),
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match op {
                CompareOp::Eq => ordering == std::cmp::Ordering::Equal,
                CompareOp::Ne => ordering != std::cmp::Ordering::Equal,
                CompareOp::Lt => ordering == std::cmp::Ordering::Less,
                CompareOp::Le => ordering != std::cmp::Ordering::Greater,
                CompareOp::Gt => ordering == std::cmp::Ordering::Greater,
                CompareOp::Ge => ordering != std::cmp::Ordering::Less,
            }
        }
    }
}

fn instantiate_all(templates: &[TriplePattern], solutions: &[Bindings]) -> Vec<Triple> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for solution in solutions {
        for template in templates {
            if let Some(triple) = instantiate(template, solution) {
                if seen.insert(triple.clone()) {
                    out.push(triple);
                }
            }
        }
    }
    out
}

/// Ground a template against one solution. Templates mentioning unbound
/// variables, or binding a literal into subject or predicate position,
/// produce no triple for that solution.
fn instantiate(template: &TriplePattern, solution: &Bindings) -> Option<Triple> {
    let subject = match concrete(&template.subject, solution)? {
        Term::Iri(iri) => iri,
        Term::Literal(_) => return None,
    };
    let predicate = match concrete(&template.predicate, solution)? {
        Term::Iri(iri) => iri,
        Term::Literal(_) => return None,
    };
    let object = concrete(&template.object, solution)?;
    Some(Triple::new(subject, predicate, object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::parser::{parse_query, parse_update};

    const NS: &str = "https://jido.ai/ontology#";

    fn sample_index() -> TripleIndex {
        let mut index = TripleIndex::new();
        let type_iri = crate::rdf::vocab::RDF_TYPE;
        for (id, score) in [("m1", 0.9), ("m2", 0.4), ("m3", 0.7)] {
            let subject = format!("{NS}memory_{id}");
            index.insert(Triple::new(
                subject.clone(),
                type_iri,
                Term::iri(format!("{NS}Fact")),
            ));
            index.insert(Triple::new(
                subject.clone(),
                format!("{NS}confidenceScore"),
                Term::double(score),
            ));
        }
        index.insert(Triple::new(
            format!("{NS}memory_m2"),
            format!("{NS}supersededBy"),
            Term::iri(format!("{NS}memory_m3")),
        ));
        index
    }

    fn select(index: &TripleIndex, sparql: &str) -> Vec<QuerySolution> {
        match evaluate_query(index, &parse_query(sparql).unwrap()).unwrap() {
            QueryResults::Solutions { rows, .. } => rows,
            other => panic!("expected solutions, got {:?}", other),
        }
    }

    const PREFIXES: &str = "PREFIX jido: <https://jido.ai/ontology#>\n\
                            PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n";

    #[test]
    fn basic_join_and_filter() {
        let index = sample_index();
        let rows = select(
            &index,
            &format!(
                "{PREFIXES}SELECT ?m ?score WHERE {{\n\
                   ?m rdf:type jido:Fact .\n\
                   ?m jido:confidenceScore ?score .\n\
                   FILTER (?score >= 0.5)\n\
                 }}"
            ),
        );
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn not_exists_excludes_superseded() {
        let index = sample_index();
        let rows = select(
            &index,
            &format!(
                "{PREFIXES}SELECT ?m WHERE {{\n\
                   ?m rdf:type jido:Fact .\n\
                   FILTER NOT EXISTS {{ ?m jido:supersededBy ?x }}\n\
                 }}"
            ),
        );
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_ne!(
                row.get("m").unwrap(),
                &Term::iri(format!("{NS}memory_m2"))
            );
        }
    }

    #[test]
    fn optional_keeps_unmatched_rows() {
        let index = sample_index();
        let rows = select(
            &index,
            &format!(
                "{PREFIXES}SELECT ?m ?next WHERE {{\n\
                   ?m rdf:type jido:Fact .\n\
                   OPTIONAL {{ ?m jido:supersededBy ?next }}\n\
                 }}"
            ),
        );
        assert_eq!(rows.len(), 3);
        let with_next = rows.iter().filter(|r| r.contains("next")).count();
        assert_eq!(with_next, 1);
    }

    #[test]
    fn order_by_descending_score_with_limit() {
        let index = sample_index();
        let rows = select(
            &index,
            &format!(
                "{PREFIXES}SELECT ?m ?score WHERE {{\n\
                   ?m jido:confidenceScore ?score .\n\
                 }} ORDER BY DESC(?score) LIMIT 2"
            ),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("score").unwrap().as_f64(), Some(0.9));
        assert_eq!(rows[1].get("score").unwrap().as_f64(), Some(0.7));
    }

    #[test]
    fn count_and_count_distinct() {
        let index = sample_index();
        let rows = select(
            &index,
            &format!("{PREFIXES}SELECT (COUNT(*) AS ?count) WHERE {{ ?s ?p ?o }}"),
        );
        assert_eq!(rows[0].get("count").unwrap().as_f64(), Some(7.0));

        let rows = select(
            &index,
            &format!(
                "{PREFIXES}SELECT (COUNT(DISTINCT ?s) AS ?count) WHERE {{ ?s ?p ?o }}"
            ),
        );
        assert_eq!(rows[0].get("count").unwrap().as_f64(), Some(3.0));
    }

    #[test]
    fn ask_matches_ground_pattern() {
        let index = sample_index();
        let hit = evaluate_query(
            &index,
            &parse_query(&format!(
                "{PREFIXES}ASK {{ jido:memory_m1 rdf:type jido:Fact }}"
            ))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(hit, QueryResults::Boolean(true));

        let miss = evaluate_query(
            &index,
            &parse_query(&format!(
                "{PREFIXES}ASK {{ jido:memory_zz rdf:type jido:Fact }}"
            ))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(miss, QueryResults::Boolean(false));
    }

    #[test]
    fn delete_where_resolves_bound_triples() {
        let index = sample_index();
        let plan = plan_update(
            &index,
            &parse_update(&format!(
                "{PREFIXES}DELETE WHERE {{ jido:memory_m2 jido:supersededBy ?x }}"
            ))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(plan.removes.len(), 1);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn modify_with_strstarts_scopes_by_namespace() {
        let mut index = sample_index();
        index.insert(Triple::new(
            "http://elsewhere.example/x",
            format!("{NS}content"),
            Term::plain("outside"),
        ));
        let plan = plan_update(
            &index,
            &parse_update(&format!(
                "{PREFIXES}DELETE {{ ?s ?p ?o }} WHERE {{ ?s ?p ?o . \
                 FILTER (STRSTARTS(STR(?s), \"{NS}\")) }}"
            ))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(plan.removes.len(), 7);
    }

    #[test]
    fn same_variable_twice_must_agree() {
        let mut index = TripleIndex::new();
        index.insert(Triple::new(
            format!("{NS}a"),
            format!("{NS}p"),
            Term::iri(format!("{NS}a")),
        ));
        index.insert(Triple::new(
            format!("{NS}b"),
            format!("{NS}p"),
            Term::iri(format!("{NS}c")),
        ));
        let rows = select(
            &index,
            &format!("{PREFIXES}SELECT ?s WHERE {{ ?s jido:p ?s }}"),
        );
        assert_eq!(rows.len(), 1);
    }
}
