// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Safe-identifier validation
//!
//! Memory ids, session ids, and project ids are interpolated into SPARQL
//! text. The predicate here is the single injection defense: every path that
//! splices a caller-supplied identifier into a query must run it first.

use once_cell::sync::Lazy;
use regex::Regex;

/// Accepted identifier shape for memory, session, and project ids.
static SAFE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("identifier pattern is valid"));

/// Check whether `candidate` is safe to interpolate into SPARQL text.
///
/// Accepts only `[A-Za-z0-9_-]`, between 1 and 128 characters. Everything
/// else (whitespace, quotes, angle brackets, percent escapes, newlines, ...)
/// is rejected.
pub fn is_safe_identifier(candidate: &str) -> bool {
    SAFE_IDENTIFIER.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(is_safe_identifier("mem-001"));
        assert!(is_safe_identifier("sess_A"));
        assert!(is_safe_identifier("a"));
        assert!(is_safe_identifier(&"x".repeat(128)));
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier(&"x".repeat(129)));
    }

    #[test]
    fn rejects_sparql_metacharacters() {
        for bad in [
            "mem 001", "mem\"001", "mem%001", "mem<001", "mem>001", "mem;001", "mem\n001",
            "mem'001", "../escape", "mem.001", "mem{}", "mem?x",
        ] {
            assert!(!is_safe_identifier(bad), "{bad:?} should be rejected");
        }
    }
}
