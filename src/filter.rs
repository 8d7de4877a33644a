//! Narrowing the working set by search text or keyword selection.
//!
//! Search text always wins: when a query is present, selected keywords are
//! ignored. Both kinds of matching are case-insensitive substring matches
//! and preserve document order. An empty result is a normal outcome.
//!
//! Patterns are compiled with a bounded size. Input too large to compile
//! falls back to a plain lowercase substring check, so any query is
//! answerable.

use regex::{Regex, RegexBuilder};

use crate::models::Document;

/// Session-local filter inputs. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub query: Option<String>,
    pub selected_tags: Vec<String>,
}

impl FilterState {
    /// The search text as typed. Whitespace-only text counts as absent,
    /// but surrounding spaces of a real query are significant.
    pub fn active_query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }

    pub fn active_tags(&self) -> Vec<&str> {
        self.selected_tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// One surviving document and its aligned keyword phrase, if tags exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row<'a> {
    pub document: &'a Document,
    pub tags: Option<&'a str>,
}

/// Apply `filter` to `documents`.
///
/// `tags`, when present, must be aligned 1:1 with `documents`. A keyword
/// selection without tags cannot be evaluated and leaves the set unfiltered.
pub fn apply<'a>(
    documents: &'a [Document],
    tags: Option<&'a [String]>,
    filter: &FilterState,
) -> Vec<Row<'a>> {
    let rows = documents.iter().enumerate().map(|(i, document)| Row {
        document,
        tags: tags.and_then(|t| t.get(i)).map(String::as_str),
    });

    if let Some(query) = filter.active_query() {
        let matcher = query_matcher(query);
        return rows
            .filter(|row| matcher.is_match(&row.document.display_text()))
            .collect();
    }

    let selected = filter.active_tags();
    if !selected.is_empty() && tags.is_some() {
        let matcher = tags_matcher(&selected);
        return rows
            .filter(|row| row.tags.is_some_and(|phrase| matcher.is_match(phrase)))
            .collect();
    }

    rows.collect()
}

/// Compiled pattern size cap.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Case-insensitive text matcher.
#[derive(Debug, Clone)]
pub enum Matcher {
    Pattern(Regex),
    /// Lowercased needles; matches when any occurs in the lowercased text.
    Substrings(Vec<String>),
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Pattern(re) => re.is_match(text),
            Matcher::Substrings(needles) => {
                let text = text.to_lowercase();
                needles.iter().any(|n| text.contains(n.as_str()))
            }
        }
    }
}

/// Compile search text as a case-insensitive pattern. Text that is not a
/// valid pattern (e.g. `(rust`) is matched literally.
pub fn query_matcher(query: &str) -> Matcher {
    if let Some(re) = compile(query) {
        return Matcher::Pattern(re);
    }
    if let Some(re) = compile(&regex::escape(query)) {
        return Matcher::Pattern(re);
    }
    tracing::debug!(len = query.len(), "query too large for a pattern, using substring match");
    substrings(&[query])
}

/// One alternation matching any of the selected keywords.
pub fn tags_matcher(selected: &[&str]) -> Matcher {
    let alternation = selected
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    compile(&format!("({})", alternation)).map_or_else(
        || {
            tracing::debug!(count = selected.len(), "keyword selection too large for a pattern");
            substrings(selected)
        },
        Matcher::Pattern,
    )
}

fn compile(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .ok()
}

fn substrings(needles: &[&str]) -> Matcher {
    Matcher::Substrings(needles.iter().map(|n| n.to_lowercase()).collect())
}
