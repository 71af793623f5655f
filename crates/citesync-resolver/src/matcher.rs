//! Pairing local documents with library entries.

use citesync_core::{BibliographicEntry, Document, MatchState, MatchingConfig};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, unit_interval};
use crate::identifiers::{Identifier, NormalizedTitle, normalize_identifier, normalize_title};
use crate::similarity::similarity;

/// Candidate entries with their identifiers and titles normalized once.
///
/// The index borrows the entries; nothing is mutated while it is alive.
#[derive(Debug, Clone)]
pub struct CandidateIndex<'a> {
    entries: &'a [BibliographicEntry],
    identifiers: Vec<Option<Identifier>>,
    titles: Vec<Option<NormalizedTitle>>,
}

impl<'a> CandidateIndex<'a> {
    pub fn build(entries: &'a [BibliographicEntry]) -> Self {
        let identifiers = entries
            .iter()
            .map(|entry| {
                entry
                    .identifier
                    .as_deref()
                    .and_then(|raw| normalize_identifier(raw).ok())
            })
            .collect();
        let titles = entries
            .iter()
            .map(|entry| {
                entry
                    .title()
                    .map(normalize_title)
                    .filter(|title| !title.is_empty())
            })
            .collect();
        Self {
            entries,
            identifiers,
            titles,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&'a BibliographicEntry> {
        self.entries.get(index)
    }

    pub fn identifier(&self, index: usize) -> Option<&Identifier> {
        self.identifiers.get(index)?.as_ref()
    }

    fn indexes_with_identifier(&self, id: &Identifier) -> Vec<usize> {
        self.identifiers
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.as_ref() == Some(id))
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// The input document with `match_state` filled in.
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<BibliographicEntry>,
    /// Position of the matched entry in the candidate list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<usize>,
    pub match_state: MatchState,
    /// Title similarity; absent for identifier matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Candidates that could not be told apart.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contenders: Vec<usize>,
}

impl MatchResult {
    fn new(document: &Document, state: MatchState) -> Self {
        let mut document = document.clone();
        document.match_state = state;
        Self {
            document,
            entry: None,
            candidate: None,
            match_state: state,
            score: None,
            contenders: Vec::new(),
        }
    }

    fn unmatched(document: &Document) -> Self {
        Self::new(document, MatchState::Unmatched)
    }

    fn matched(
        document: &Document,
        state: MatchState,
        index: &CandidateIndex<'_>,
        candidate: usize,
        score: Option<f64>,
    ) -> Self {
        let mut result = Self::new(document, state);
        result.entry = index.entry(candidate).cloned();
        result.candidate = Some(candidate);
        result.score = score;
        result
    }

    fn ambiguous(document: &Document, contenders: Vec<usize>, score: Option<f64>) -> Self {
        let mut result = Self::new(document, MatchState::Ambiguous);
        result.contenders = contenders;
        result.score = score;
        result
    }

    pub fn is_matched(&self) -> bool {
        self.match_state.is_matched()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentMatcher {
    title_fallback: bool,
    title_threshold: f64,
}

impl Default for DocumentMatcher {
    fn default() -> Self {
        Self {
            title_fallback: true,
            title_threshold: 0.9,
        }
    }
}

impl DocumentMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MatchingConfig) -> Result<Self> {
        Self::new()
            .with_title_fallback(config.title_fallback)
            .with_title_threshold(config.title_threshold)
    }

    pub fn with_title_fallback(mut self, enabled: bool) -> Self {
        self.title_fallback = enabled;
        self
    }

    /// Fails for a threshold outside `[0, 1]` or NaN.
    pub fn with_title_threshold(mut self, threshold: f64) -> Result<Self> {
        self.title_threshold = unit_interval("title threshold", threshold)?;
        Ok(self)
    }

    pub fn title_threshold(&self) -> f64 {
        self.title_threshold
    }

    /// Identifier first, then title similarity when enabled.
    ///
    /// Duplicated identifiers and tied best titles are reported as
    /// [`MatchState::Ambiguous`] with the contenders listed; no candidate is
    /// ever picked arbitrarily.
    pub fn match_document(&self, document: &Document, index: &CandidateIndex<'_>) -> MatchResult {
        if let Some(raw) = document.raw_identifier.as_deref() {
            match normalize_identifier(raw) {
                Ok(id) => {
                    let hits = index.indexes_with_identifier(&id);
                    match hits.as_slice() {
                        [] => {}
                        [single] => {
                            return MatchResult::matched(
                                document,
                                MatchState::MatchedByIdentifier,
                                index,
                                *single,
                                None,
                            );
                        }
                        _ => {
                            warn!(
                                document = %document.id,
                                %id,
                                "identifier shared by {} entries",
                                hits.len()
                            );
                            return MatchResult::ambiguous(document, hits, None);
                        }
                    }
                }
                Err(err) => debug!(document = %document.id, "ignoring identifier: {err}"),
            }
        }

        if self.title_fallback {
            return self.match_by_title(document, index);
        }
        MatchResult::unmatched(document)
    }

    fn match_by_title(&self, document: &Document, index: &CandidateIndex<'_>) -> MatchResult {
        let Some(title) = document
            .raw_title
            .as_deref()
            .map(normalize_title)
            .filter(|title| !title.is_empty())
        else {
            return MatchResult::unmatched(document);
        };

        let mut best_score = f64::NEG_INFINITY;
        let mut best = Vec::new();
        for (idx, candidate) in index.titles.iter().enumerate() {
            let Some(candidate) = candidate else {
                continue;
            };
            let score = similarity(&title, candidate);
            if score > best_score {
                best_score = score;
                best.clear();
                best.push(idx);
            } else if score == best_score {
                best.push(idx);
            }
        }

        if best.is_empty() || best_score < self.title_threshold {
            return MatchResult::unmatched(document);
        }
        if best.len() > 1 {
            debug!(document = %document.id, score = best_score, "title tie between {} entries", best.len());
            return MatchResult::ambiguous(document, best, Some(best_score));
        }
        MatchResult::matched(
            document,
            MatchState::MatchedByTitle,
            index,
            best[0],
            Some(best_score),
        )
    }
}

/// One-shot matching against a plain candidate list.
pub fn match_document(
    document: &Document,
    candidates: &[BibliographicEntry],
    title_fallback: bool,
    threshold: f64,
) -> Result<MatchResult> {
    let index = CandidateIndex::build(candidates);
    let matcher = DocumentMatcher::new()
        .with_title_fallback(title_fallback)
        .with_title_threshold(threshold)?;
    Ok(matcher.match_document(document, &index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use citesync_core::RecordFields;

    fn entry(identifier: Option<&str>, title: &str) -> BibliographicEntry {
        BibliographicEntry::new(
            identifier.map(ToOwned::to_owned),
            RecordFields {
                title: Some(title.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_identifier_match_after_normalization() {
        let candidates = vec![
            entry(Some("10.2000/other"), "Other"),
            entry(Some("doi:10.1000/ABC"), "Some Paper"),
        ];
        let doc = Document::new("note.md").with_identifier("10.1000/ABC");

        let result = match_document(&doc, &candidates, true, 0.8).unwrap();

        assert_eq!(result.match_state, MatchState::MatchedByIdentifier);
        assert_eq!(result.document.match_state, MatchState::MatchedByIdentifier);
        assert_eq!(result.candidate, Some(1));
        assert_eq!(result.score, None);
        assert_eq!(result.entry.as_ref().map(|e| e.id), Some(candidates[1].id));
    }

    #[test]
    fn test_title_fallback_match() {
        let candidates = vec![
            entry(None, "Deep learning for NLP"),
            entry(None, "Shallow Learning"),
        ];
        let doc = Document::new("note.md").with_title("Deep Learning for NLP");

        let result = match_document(&doc, &candidates, true, 0.8).unwrap();

        assert_eq!(result.match_state, MatchState::MatchedByTitle);
        assert_eq!(result.candidate, Some(0));
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn test_identifier_wins_over_title() {
        let candidates = vec![
            entry(None, "Exactly The Document Title"),
            entry(Some("10.1000/xyz"), "Unrelated Wording"),
        ];
        let doc = Document::new("note.md")
            .with_identifier("https://doi.org/10.1000/XYZ")
            .with_title("Exactly The Document Title");

        let result = match_document(&doc, &candidates, true, 0.5).unwrap();

        assert_eq!(result.match_state, MatchState::MatchedByIdentifier);
        assert_eq!(result.candidate, Some(1));
    }

    #[test]
    fn test_duplicate_identifiers_are_ambiguous() {
        let candidates = vec![
            entry(Some("10.1000/dup"), "First"),
            entry(Some("DOI:10.1000/DUP"), "Second"),
        ];
        let doc = Document::new("note.md")
            .with_identifier("10.1000/dup")
            .with_title("First");

        let result = match_document(&doc, &candidates, true, 0.5).unwrap();

        assert_eq!(result.match_state, MatchState::Ambiguous);
        assert_eq!(result.contenders, vec![0, 1]);
        assert!(result.entry.is_none());
    }

    #[test]
    fn test_tied_titles_are_ambiguous() {
        let candidates = vec![
            entry(None, "Attention Is All You Need"),
            entry(None, "Something Else Entirely"),
            entry(None, "attention is all you need"),
        ];
        let doc = Document::new("note.md").with_title("Attention is all you need");

        let result = match_document(&doc, &candidates, true, 0.9).unwrap();

        assert_eq!(result.match_state, MatchState::Ambiguous);
        assert_eq!(result.contenders, vec![0, 2]);
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let candidates = vec![entry(None, "Shallow Learning")];
        let doc = Document::new("note.md").with_title("Deep Learning for NLP");

        let result = match_document(&doc, &candidates, true, 0.8).unwrap();

        assert_eq!(result.match_state, MatchState::Unmatched);
        assert!(result.entry.is_none());
        assert_eq!(result.score, None);
    }

    #[test]
    fn test_title_fallback_disabled() {
        let candidates = vec![entry(None, "Deep learning for NLP")];
        let doc = Document::new("note.md").with_title("Deep Learning for NLP");

        let result = match_document(&doc, &candidates, false, 0.8).unwrap();

        assert_eq!(result.match_state, MatchState::Unmatched);
    }

    #[test]
    fn test_invalid_identifier_falls_through_to_title() {
        let candidates = vec![entry(Some("10.1000/abc"), "A Known Paper")];
        let doc = Document::new("note.md")
            .with_identifier("   ")
            .with_title("A known paper");

        let result = match_document(&doc, &candidates, true, 0.9).unwrap();

        assert_eq!(result.match_state, MatchState::MatchedByTitle);
    }

    #[test]
    fn test_empty_titles_never_match() {
        let candidates = vec![entry(None, "  ")];
        let doc = Document::new("note.md").with_title("{}");

        let result = match_document(&doc, &candidates, true, 0.0).unwrap();

        assert_eq!(result.match_state, MatchState::Unmatched);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let candidates = vec![
            entry(None, "Graph Neural Networks: A Review"),
            entry(None, "Graph Neural Networks, A Survey"),
            entry(Some("10.5555/gnn"), "GNN"),
        ];
        let doc = Document::new("note.md").with_title("Graph neural networks: a review of methods");
        let index = CandidateIndex::build(&candidates);
        let matcher = DocumentMatcher::new().with_title_threshold(0.5).unwrap();

        let first = matcher.match_document(&doc, &index);
        for _ in 0..5 {
            assert_eq!(matcher.match_document(&doc, &index), first);
        }
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        for bad in [f64::NAN, 1.5, -0.2, f64::INFINITY] {
            let err = DocumentMatcher::new().with_title_threshold(bad).unwrap_err();
            assert!(matches!(err, crate::error::ResolveError::ContractViolation(_)));
        }
        assert_eq!(
            DocumentMatcher::new().with_title_threshold(1.0).unwrap().title_threshold(),
            1.0
        );
    }

    #[test]
    fn test_invalid_threshold_refused_before_matching() {
        let candidates = vec![entry(None, "Shallow Learning")];
        let doc = Document::new("note.md").with_title("Deep Learning for NLP");

        assert!(match_document(&doc, &candidates, true, f64::NAN).is_err());
        assert!(match_document(&doc, &candidates, true, 1.5).is_err());
    }
}
