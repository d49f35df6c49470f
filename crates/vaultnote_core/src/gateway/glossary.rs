//! Local glossary term extraction.
//!
//! # Responsibility
//! - Match a built-in term table against free text and report the first
//!   occurrence of each term with byte positions.
//!
//! # Invariants
//! - Fully local: no network dependency, never fails.
//! - Matches are whole words only; "AI" inside "RAID" does not count.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static GLOSSARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(AI|encryption|database|algorithm)\b").expect("valid glossary regex")
});

const DEFINITIONS: &[(&str, &str)] = &[
    (
        "AI",
        "Machine-generated assistance such as summaries, tags and translations.",
    ),
    (
        "encryption",
        "Password-based protection sealing note content into an unreadable envelope.",
    ),
    (
        "database",
        "The local store holding notes, version history and settings.",
    ),
    (
        "algorithm",
        "A finite step-by-step procedure for computing a result.",
    ),
];

/// One matched glossary term with its first occurrence in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
    /// Byte offset of the first occurrence.
    pub start: usize,
    /// Byte offset one past the end of the first occurrence.
    pub end: usize,
}

/// Extracts known glossary terms from `text`, first occurrence per term,
/// in order of appearance.
pub fn glossary_terms(text: &str) -> Vec<GlossaryTerm> {
    let mut found: Vec<GlossaryTerm> = Vec::new();
    for capture in GLOSSARY_RE.find_iter(text) {
        let term = capture.as_str();
        if found.iter().any(|existing| existing.term == term) {
            continue;
        }
        let definition = DEFINITIONS
            .iter()
            .find(|(name, _)| *name == term)
            .map(|(_, definition)| *definition)
            .unwrap_or_default();
        found.push(GlossaryTerm {
            term: term.to_string(),
            definition: definition.to_string(),
            start: capture.start(),
            end: capture.end(),
        });
    }
    found
}
