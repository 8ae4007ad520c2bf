// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Ontology bootstrap
//!
//! Materializes the fixed schema (classes, properties, named individuals)
//! into a freshly opened store exactly once per store lifetime. Documents
//! load in a fixed order - a document defining a base class precedes the
//! documents that refer to it. The load is not atomic: a store with a
//! partial load must not be served, which the session manager enforces by
//! closing any store whose first load fails.

use crate::store::{StoreError, TripleStore};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The single ontology namespace.
pub const NAMESPACE: &str = "https://jido.ai/ontology#";

/// Ontology documents, in load order.
pub const ONTOLOGY_DOCUMENTS: [&str; 10] = [
    "core.ttl",
    "knowledge.ttl",
    "decisions.ttl",
    "conventions.ttl",
    "errors.ttl",
    "sessions.ttl",
    "agents.ttl",
    "projects.ttl",
    "tasks.ttl",
    "code.ttl",
];

const PREFIXES: &str = "PREFIX jido: <https://jido.ai/ontology#>\n\
                        PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
                        PREFIX owl: <http://www.w3.org/2002/07/owl#>\n";

/// Ontology loading errors.
#[derive(Error, Debug)]
pub enum OntologyError {
    /// One or more documents were missing or failed to parse. Every failure
    /// is listed, not just the first.
    #[error("Ontology load failed: {}", .failures.join("; "))]
    LoadFailed { failures: Vec<String> },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// True iff the probe IRI for the root memory-item class exists as an
/// `owl:Class` in the store.
pub fn is_loaded(store: &TripleStore) -> Result<bool, OntologyError> {
    let answer = store.ask(&format!(
        "{PREFIXES}ASK {{ jido:MemoryItem rdf:type owl:Class }}"
    ))?;
    Ok(answer)
}

/// Load all ontology documents via path discovery. Returns the total number
/// of triples across the documents.
pub fn load(store: &TripleStore) -> Result<usize, OntologyError> {
    load_documents(store, |name| discover(name))
}

/// Load all ontology documents from a fixed directory. Used directly by
/// tests; `load` goes through discovery instead.
pub fn load_from_dir(store: &TripleStore, dir: &Path) -> Result<usize, OntologyError> {
    load_documents(store, |name| {
        let path = dir.join(name);
        path.is_file().then_some(path)
    })
}

fn load_documents<F>(store: &TripleStore, resolve: F) -> Result<usize, OntologyError>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let mut failures = Vec::new();
    let mut total = 0usize;

    for name in ONTOLOGY_DOCUMENTS {
        let Some(path) = resolve(name) else {
            failures.push(format!("{}: not found", name));
            continue;
        };
        match store.load(&path) {
            Ok(count) => {
                debug!("Ontology document {} contributed {} triples", name, count);
                total += count;
            }
            Err(e) => failures.push(format!("{}: {}", name, e)),
        }
    }

    if failures.is_empty() {
        info!("Ontology loaded: {} triples", total);
        Ok(total)
    } else {
        Err(OntologyError::LoadFailed { failures })
    }
}

/// Load the ontology unless the probe already holds. Returns the number of
/// triples loaded (0 when already present).
pub fn ensure_loaded(store: &TripleStore) -> Result<usize, OntologyError> {
    if is_loaded(store)? {
        return Ok(0);
    }
    load(store)
}

/// Best-effort clear of all triples whose subject lies in the ontology
/// namespace, then a fresh load. A failed clear is logged and the load
/// proceeds anyway - the triples it emits are idempotent by IRI.
///
/// Record subjects share the namespace, so the purge clears them too: this
/// is a destructive schema repair for a store the manager would otherwise
/// refuse to serve.
pub fn reload(store: &TripleStore) -> Result<usize, OntologyError> {
    let clear = format!(
        "{PREFIXES}DELETE {{ ?s ?p ?o }} WHERE {{ ?s ?p ?o . \
         FILTER (STRSTARTS(STR(?s), \"{NAMESPACE}\")) }}"
    );
    if let Err(e) = store.update(&clear) {
        warn!("Ontology clear failed, loading over existing triples: {}", e);
    }
    load(store)
}

/// Distinct `owl:Class` IRIs in the ontology namespace.
pub fn classes(store: &TripleStore) -> Result<Vec<String>, OntologyError> {
    scoped_listing(store, "owl:Class")
}

/// Distinct `owl:NamedIndividual` IRIs in the ontology namespace.
pub fn individuals(store: &TripleStore) -> Result<Vec<String>, OntologyError> {
    scoped_listing(store, "owl:NamedIndividual")
}

/// Distinct property IRIs (object and datatype) in the ontology namespace.
pub fn properties(store: &TripleStore) -> Result<Vec<String>, OntologyError> {
    let mut out = scoped_listing(store, "owl:ObjectProperty")?;
    for iri in scoped_listing(store, "owl:DatatypeProperty")? {
        if !out.contains(&iri) {
            out.push(iri);
        }
    }
    Ok(out)
}

fn scoped_listing(store: &TripleStore, class: &str) -> Result<Vec<String>, OntologyError> {
    let rows = store.select(&format!(
        "{PREFIXES}SELECT DISTINCT ?subject WHERE {{\n\
           ?subject rdf:type {class} .\n\
           FILTER (STRSTARTS(STR(?subject), \"{NAMESPACE}\"))\n\
         }}"
    ))?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("subject"))
        .filter_map(|term| term.as_iri())
        .map(str::to_string)
        .collect())
}

/// Locate one ontology document: current working directory first, then the
/// crate manifest directory, then alongside the executable.
fn discover(name: &str) -> Option<PathBuf> {
    let cwd = PathBuf::from("ontology").join(name);
    if cwd.is_file() {
        return Some(cwd);
    }

    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("ontology")
        .join(name);
    if manifest.is_file() {
        return Some(manifest);
    }

    let exe_relative = std::env::current_exe().ok().and_then(|exe| {
        exe.parent()
            .map(|dir| dir.join("..").join("ontology").join(name))
    })?;
    exe_relative.is_file().then_some(exe_relative)
}
