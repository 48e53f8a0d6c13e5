//! Node resolution: maps a free-text target onto elements of a snapshot.
//!
//! Matching is purely substring and keyword based so that results stay
//! predictable for the language model that produced the target. There is no
//! edit distance and no diacritic folding; comparison is case-insensitive.

use crate::element::{Element, NodeSummary, Walk};

/// Score of a name equal to the whole search string.
pub const EXACT_MATCH_SCORE: u32 = 1000;
/// Name contains the whole search string.
pub const PHRASE_SCORE: u32 = 100;
/// Name contains every search word.
pub const ALL_WORDS_SCORE: u32 = 50;
/// Per search word found in the name.
pub const WORD_SCORE: u32 = 10;
/// Keyword present in both the search string and the name.
pub const KEYWORD_SCORE: u32 = 20;

/// Depth limit of the traversal used for candidate suggestions.
pub const SUGGESTION_DEPTH_LIMIT: usize = 5;
/// Number of candidate names offered when a target matches nothing.
pub const MAX_SUGGESTIONS: usize = 5;

/// `(search keyword, name keywords)` pairs that earn [`KEYWORD_SCORE`].
const KEYWORD_BOOSTS: &[(&str, &[&str])] = &[
    ("button", &["button"]),
    ("header", &["header"]),
    ("text", &["text"]),
    ("image", &["image", "img"]),
];

/// A resolved element and its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub element: &'a Element,
    pub score: u32,
}

/// Normalized search string.
#[derive(Debug, Clone)]
pub struct Query {
    phrase: String,
    words: Vec<String>,
}

impl Query {
    /// Lower-case the target and split it into words.
    #[must_use]
    pub fn new(target: &str) -> Self {
        let phrase = target.trim().to_lowercase();
        let words = phrase.split_whitespace().map(str::to_owned).collect();
        Self { phrase, words }
    }

    /// Whether the query has nothing to match.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.words.is_empty()
    }

    /// Score a single element name.
    #[must_use]
    pub fn score(&self, name: &str) -> u32 {
        if name.is_empty() || self.is_blank() {
            return 0;
        }

        let name = name.to_lowercase();
        if name == self.phrase {
            return EXACT_MATCH_SCORE;
        }

        let mut score = 0;
        if name.contains(&self.phrase) {
            score += PHRASE_SCORE;
        }

        let found = self.words.iter().filter(|w| name.contains(w.as_str())).count();
        if found == self.words.len() {
            score += ALL_WORDS_SCORE;
        }
        // Bounded by the word count of a human utterance.
        score += WORD_SCORE * u32::try_from(found).unwrap_or(u32::MAX / WORD_SCORE);

        for (keyword, name_keywords) in KEYWORD_BOOSTS {
            if self.phrase.contains(keyword) && name_keywords.iter().any(|k| name.contains(k)) {
                score += KEYWORD_SCORE;
            }
        }

        score
    }
}

/// Resolve `target` against a snapshot, most relevant first.
///
/// Elements scoring zero are dropped. Ties keep depth-first, parent-first
/// traversal order.
#[must_use]
pub fn resolve<'a>(roots: &'a [Element], target: &str) -> Vec<Match<'a>> {
    let query = Query::new(target);
    if query.is_blank() {
        return Vec::new();
    }

    let mut matches: Vec<Match<'a>> = Walk::new(roots)
        .filter_map(|(_, element)| {
            let score = query.score(&element.name);
            (score > 0).then_some(Match { element, score })
        })
        .collect();

    // Stable sort keeps traversal order among equal scores.
    matches.sort_by(|a, b| b.score.cmp(&a.score));

    tracing::debug!(target_text = target, matches = matches.len(), "resolved target");
    matches
}

/// Same as [`resolve`], returning only the elements.
#[must_use]
pub fn resolve_elements<'a>(roots: &'a [Element], target: &str) -> Vec<&'a Element> {
    resolve(roots, target).into_iter().map(|m| m.element).collect()
}

/// Summaries of every element shallower than `depth_limit`.
#[must_use]
pub fn context_nodes(roots: &[Element], depth_limit: usize) -> Vec<NodeSummary> {
    let mut out = Vec::new();
    collect_limited(roots, 0, depth_limit, &mut out);
    out
}

fn collect_limited(nodes: &[Element], depth: usize, limit: usize, out: &mut Vec<NodeSummary>) {
    if depth >= limit {
        return;
    }
    for node in nodes {
        out.push(NodeSummary::from(node));
        collect_limited(node.children(), depth + 1, limit, out);
    }
}

/// Names offered to the user when a target resolves to nothing.
#[must_use]
pub fn candidate_names(roots: &[Element]) -> Vec<String> {
    context_nodes(roots, SUGGESTION_DEPTH_LIMIT)
        .into_iter()
        .filter(|n| !n.name.is_empty())
        .take(MAX_SUGGESTIONS)
        .map(|n| n.name)
        .collect()
}
