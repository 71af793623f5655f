//! Batch reconciliation: match every document, enrich what is thin, report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use citesync_core::{AppConfig, BibliographicEntry, Document, EntryField, MatchState};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::enrichment::{
    CompletenessPredicate, EnrichmentCoordinator, EnrichmentResult, RequiredFields, SourceReport,
};
use crate::error::{ResolveError, Result, unit_interval};
use crate::identifiers::{Identifier, normalize_identifier};
use crate::matcher::{CandidateIndex, DocumentMatcher, MatchResult};
use crate::sources::{FetchOutcome, SharedSource};

/// What happened to a matched entry during the enrichment phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Already at or above the completeness floor.
    NotNeeded,
    /// The source chain ran to completion.
    Enriched {
        identifier: Identifier,
        fields_added: Vec<EntryField>,
        completeness: f64,
    },
    /// Neither the entry nor its documents carry a usable identifier.
    NoIdentifier,
    /// The pass was cancelled first; the entry was left untouched.
    Cancelled,
    /// Enrichment is switched off.
    Skipped,
}

/// The final triple for one input document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledDocument {
    pub document: Document,
    pub match_state: MatchState,
    /// The matched entry after enrichment, or as found when nothing changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<BibliographicEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contenders: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentStatus>,
}

/// A replacement for the entry at `index` of the candidate list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryUpdate {
    pub index: usize,
    pub entry: BibliographicEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    /// Entries for which the source was asked.
    pub consulted: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Calls made, retries included.
    pub attempts: usize,
}

impl SourceStats {
    pub fn success_rate(&self) -> f64 {
        if self.consulted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.consulted as f64
    }

    fn record(&mut self, report: &SourceReport) {
        self.consulted += 1;
        self.attempts += report.attempts as usize;
        match report.outcome {
            FetchOutcome::Found(_) => self.succeeded += 1,
            FetchOutcome::NotFound => self.not_found += 1,
            FetchOutcome::TransientError(_) | FetchOutcome::PermanentError(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileStats {
    pub documents: usize,
    pub matched_by_identifier: usize,
    pub matched_by_title: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    /// Distinct entries whose source chain completed.
    pub enriched: usize,
    pub no_identifier: usize,
    pub cancelled: usize,
    pub sources: BTreeMap<String, SourceStats>,
}

impl ReconcileStats {
    pub fn success_rates(&self) -> BTreeMap<&str, f64> {
        self.sources
            .iter()
            .map(|(name, stats)| (name.as_str(), stats.success_rate()))
            .collect()
    }

    fn count_match(&mut self, state: MatchState) {
        self.documents += 1;
        match state {
            MatchState::MatchedByIdentifier => self.matched_by_identifier += 1,
            MatchState::MatchedByTitle => self.matched_by_title += 1,
            MatchState::Ambiguous => self.ambiguous += 1,
            MatchState::Unmatched => self.unmatched += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// One per input document, in input order.
    pub outcomes: Vec<ReconciledDocument>,
    pub updated_entries: Vec<EntryUpdate>,
    /// Completed source chains, ordered by candidate index.
    pub enrichments: Vec<EnrichmentResult>,
    pub stats: ReconcileStats,
}

impl ReconcileReport {
    /// Write the enriched entries back into the candidate list the pass ran
    /// against. Returns how many entries were replaced.
    pub fn apply(&self, entries: &mut [BibliographicEntry]) -> usize {
        let mut applied = 0;
        for update in &self.updated_entries {
            let slot = match entries.get(update.index) {
                Some(current) if current.id == update.entry.id => Some(update.index),
                _ => entries.iter().position(|e| e.id == update.entry.id),
            };
            match slot {
                Some(idx) => {
                    entries[idx] = update.entry.clone();
                    applied += 1;
                }
                None => warn!(entry = %update.entry.id, "entry vanished before update"),
            }
        }
        applied
    }
}

/// Runs matching and enrichment over a batch of documents.
pub struct Reconciler {
    matcher: DocumentMatcher,
    coordinator: EnrichmentCoordinator,
    sources: Vec<SharedSource>,
    predicate: Arc<dyn CompletenessPredicate>,
    min_completeness: f64,
    enrichment_enabled: bool,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(
        matcher: DocumentMatcher,
        coordinator: EnrichmentCoordinator,
        sources: Vec<SharedSource>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(ResolveError::ContractViolation(
                "reconciliation requires at least one source".to_string(),
            ));
        }
        Ok(Self {
            matcher,
            coordinator,
            sources,
            predicate: Arc::new(RequiredFields),
            min_completeness: 1.0,
            enrichment_enabled: true,
            concurrency: 4,
        })
    }

    pub fn from_config(config: &AppConfig, sources: Vec<SharedSource>) -> Result<Self> {
        Ok(Self::new(
            DocumentMatcher::from_config(&config.matching)?,
            EnrichmentCoordinator::from_config(&config.enrichment),
            sources,
        )?
        .with_min_completeness(config.enrichment.min_completeness)?
        .with_enrichment(config.enrichment.enabled)
        .with_concurrency(config.enrichment.concurrency))
    }

    pub fn with_predicate(mut self, predicate: impl CompletenessPredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Fails for a floor outside `[0, 1]` or NaN.
    pub fn with_min_completeness(mut self, min: f64) -> Result<Self> {
        self.min_completeness = unit_interval("minimum completeness", min)?;
        Ok(self)
    }

    pub fn with_enrichment(mut self, enabled: bool) -> Self {
        self.enrichment_enabled = enabled;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reconcile `documents` against `entries`.
    ///
    /// `entries` is only read. Replacements produced by enrichment are
    /// returned in the report and written back with
    /// [`ReconcileReport::apply`].
    pub async fn reconcile(
        &self,
        documents: &[Document],
        entries: &[BibliographicEntry],
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport> {
        let index = CandidateIndex::build(entries);
        let matches: Vec<MatchResult> = documents
            .iter()
            .map(|doc| self.matcher.match_document(doc, &index))
            .collect();

        let mut stats = ReconcileStats::default();
        for m in &matches {
            stats.count_match(m.match_state);
        }

        let statuses = self.enrich_matched(&matches, &index, cancel).await?;

        let mut updated: BTreeMap<usize, BibliographicEntry> = BTreeMap::new();
        let mut enrichments = Vec::new();
        let mut per_entry: BTreeMap<usize, EnrichmentStatus> = BTreeMap::new();
        for (idx, outcome) in statuses {
            let status = match outcome {
                EntryOutcome::Status(status) => status,
                EntryOutcome::Finished(result) => {
                    let Some(original) = index.entry(idx) else {
                        continue;
                    };
                    let merged = original.overlaid_with(&result.merged_entry);
                    let fields_added: Vec<EntryField> = EntryField::ALL
                        .into_iter()
                        .filter(|f| merged.fields.is_populated(*f) && !original.fields.is_populated(*f))
                        .collect();
                    for report in &result.per_source {
                        stats
                            .sources
                            .entry(report.source.clone())
                            .or_default()
                            .record(report);
                    }
                    let status = EnrichmentStatus::Enriched {
                        identifier: result.identifier.clone(),
                        fields_added: fields_added.clone(),
                        completeness: merged.completeness_score,
                    };
                    if !fields_added.is_empty() {
                        updated.insert(idx, merged);
                    }
                    enrichments.push(result);
                    status
                }
            };
            match status {
                EnrichmentStatus::Enriched { .. } => stats.enriched += 1,
                EnrichmentStatus::NoIdentifier => stats.no_identifier += 1,
                EnrichmentStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
            per_entry.insert(idx, status);
        }

        let outcomes = matches
            .into_iter()
            .map(|m| {
                let entry = m
                    .candidate
                    .and_then(|idx| updated.get(&idx).cloned())
                    .or(m.entry);
                let enrichment = m.candidate.and_then(|idx| per_entry.get(&idx).cloned());
                ReconciledDocument {
                    document: m.document,
                    match_state: m.match_state,
                    entry,
                    candidate: m.candidate,
                    score: m.score,
                    contenders: m.contenders,
                    enrichment,
                }
            })
            .collect();

        info!(
            documents = stats.documents,
            by_identifier = stats.matched_by_identifier,
            by_title = stats.matched_by_title,
            ambiguous = stats.ambiguous,
            unmatched = stats.unmatched,
            enriched = stats.enriched,
            cancelled = stats.cancelled,
            "reconciliation pass finished"
        );

        Ok(ReconcileReport {
            outcomes,
            updated_entries: updated
                .into_iter()
                .map(|(index, entry)| EntryUpdate { index, entry })
                .collect(),
            enrichments,
            stats,
        })
    }

    /// Decide and run enrichment once per distinct matched entry.
    async fn enrich_matched(
        &self,
        matches: &[MatchResult],
        index: &CandidateIndex<'_>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<usize, EntryOutcome>> {
        let matched: BTreeSet<usize> = matches
            .iter()
            .filter(|m| m.is_matched())
            .filter_map(|m| m.candidate)
            .collect();

        let mut outcomes = BTreeMap::new();
        let mut jobs = Vec::new();
        for idx in matched {
            let Some(entry) = index.entry(idx) else {
                continue;
            };
            if entry.completeness_score >= self.min_completeness {
                outcomes.insert(idx, EntryOutcome::Status(EnrichmentStatus::NotNeeded));
            } else if !self.enrichment_enabled {
                outcomes.insert(idx, EntryOutcome::Status(EnrichmentStatus::Skipped));
            } else {
                match enrichment_identifier(idx, index, matches) {
                    Some(id) => jobs.push((idx, id)),
                    None => {
                        debug!(entry = %entry.id, "no identifier to enrich with");
                        outcomes.insert(idx, EntryOutcome::Status(EnrichmentStatus::NoIdentifier));
                    }
                }
            }
        }

        let predicate = self.predicate.as_ref();
        let finished: Vec<(usize, Option<Result<EnrichmentResult>>)> = futures::stream::iter(jobs)
            .map(move |(idx, id)| async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = self.coordinator.enrich(&id, &self.sources, predicate) => Some(result),
                };
                (idx, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (idx, result) in finished {
            let outcome = match result {
                Some(result) => EntryOutcome::Finished(result?),
                None => EntryOutcome::Status(EnrichmentStatus::Cancelled),
            };
            outcomes.insert(idx, outcome);
        }
        Ok(outcomes)
    }
}

enum EntryOutcome {
    Status(EnrichmentStatus),
    Finished(EnrichmentResult),
}

/// The entry's own identifier, else the first valid one among the documents
/// matched to it.
fn enrichment_identifier(
    idx: usize,
    index: &CandidateIndex<'_>,
    matches: &[MatchResult],
) -> Option<Identifier> {
    if let Some(id) = index.identifier(idx) {
        return Some(id.clone());
    }
    matches
        .iter()
        .filter(|m| m.candidate == Some(idx))
        .filter_map(|m| m.document.raw_identifier.as_deref())
        .find_map(|raw| normalize_identifier(raw).ok())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{ScriptedSource, complete_record, record};
    use citesync_core::{LIBRARY_PROVENANCE, RecordFields};

    fn reconciler(sources: Vec<SharedSource>, max_attempts: u32) -> Reconciler {
        let coordinator = EnrichmentCoordinator::new()
            .with_max_attempts(max_attempts)
            .with_backoff(Duration::ZERO)
            .with_call_timeout(None);
        let matcher = DocumentMatcher::new().with_title_threshold(0.8).unwrap();
        Reconciler::new(matcher, coordinator, sources).unwrap()
    }

    fn entry(identifier: Option<&str>, fields: RecordFields) -> BibliographicEntry {
        BibliographicEntry::new(identifier.map(ToOwned::to_owned), fields)
    }

    #[test]
    fn test_empty_sources_rejected() {
        let result = Reconciler::new(DocumentMatcher::new(), EnrichmentCoordinator::new(), vec![]);
        assert!(matches!(result, Err(ResolveError::ContractViolation(_))));
    }

    #[tokio::test]
    async fn unmatched_documents_are_not_enriched() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::Found(complete_record("X"))));
        let entries = vec![entry(Some("10.1000/known"), record("Known", &[], None, None))];
        let docs = vec![Document::new("lost.md").with_identifier("10.1000/unknown")];

        let report = reconciler(vec![source.clone()], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(report.outcomes[0].match_state, MatchState::Unmatched);
        assert_eq!(report.outcomes[0].enrichment, None);
        assert_eq!(report.stats.unmatched, 1);
        assert!(report.updated_entries.is_empty());
    }

    #[tokio::test]
    async fn complete_entries_are_left_alone() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::NotFound));
        let entries = vec![entry(Some("10.1000/done"), complete_record("Done"))];
        let docs = vec![Document::new("done.md").with_identifier("doi:10.1000/DONE")];

        let report = reconciler(vec![source.clone()], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(report.outcomes[0].enrichment, Some(EnrichmentStatus::NotNeeded));
        assert_eq!(report.outcomes[0].entry.as_ref(), Some(&entries[0]));
    }

    #[tokio::test]
    async fn enrichment_fills_gaps_and_keeps_library_values() {
        let source = Arc::new(ScriptedSource::always(
            "a",
            FetchOutcome::Found(record("Remote Title", &["Doe, Jane"], Some("J. Tests"), Some(2021))),
        ));
        let entries = vec![entry(Some("10.1000/thin"), record("Local Title", &[], None, None))];
        let docs = vec![Document::new("thin.md").with_identifier("10.1000/thin")];

        let report = reconciler(vec![source.clone()], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        let final_entry = report.outcomes[0].entry.as_ref().unwrap();
        assert_eq!(final_entry.id, entries[0].id);
        assert_eq!(final_entry.title(), Some("Local Title"));
        assert_eq!(final_entry.provenance_of(EntryField::Title), Some(LIBRARY_PROVENANCE));
        assert_eq!(final_entry.provenance_of(EntryField::Journal), Some("a"));
        assert_eq!(final_entry.completeness_score, 1.0);
        assert_eq!(entries[0].completeness_score, 0.25, "input is never mutated");

        match report.outcomes[0].enrichment.as_ref() {
            Some(EnrichmentStatus::Enriched { fields_added, .. }) => assert_eq!(
                fields_added,
                &vec![EntryField::Authors, EntryField::Journal, EntryField::Year]
            ),
            other => panic!("unexpected status: {other:?}"),
        }

        let mut library = entries.clone();
        assert_eq!(report.apply(&mut library), 1);
        assert_eq!(library[0].fields.journal.as_deref(), Some("J. Tests"));
    }

    #[tokio::test]
    async fn shared_entry_is_enriched_once() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::Found(complete_record("T"))));
        let entries = vec![entry(Some("10.1000/shared"), RecordFields::default())];
        let docs = vec![
            Document::new("one.md").with_identifier("10.1000/shared"),
            Document::new("two.md").with_identifier("https://doi.org/10.1000/SHARED"),
        ];

        let report = reconciler(vec![source.clone()], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(report.stats.enriched, 1);
        assert_eq!(report.stats.matched_by_identifier, 2);
        assert_eq!(report.outcomes[0].entry, report.outcomes[1].entry);
        assert_eq!(report.outcomes[1].document.id, "two.md");
    }

    #[tokio::test]
    async fn ambiguous_matches_are_not_enriched() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::Found(complete_record("T"))));
        let entries = vec![
            entry(Some("10.1000/dup"), RecordFields::default()),
            entry(Some("10.1000/DUP"), RecordFields::default()),
        ];
        let docs = vec![Document::new("dup.md").with_identifier("10.1000/dup")];

        let report = reconciler(vec![source.clone()], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(report.outcomes[0].match_state, MatchState::Ambiguous);
        assert_eq!(report.outcomes[0].contenders, vec![0, 1]);
        assert_eq!(report.stats.ambiguous, 1);
    }

    #[tokio::test]
    async fn document_identifier_used_when_entry_has_none() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::Found(complete_record("T"))));
        let entries = vec![entry(None, record("Deep learning for NLP", &[], None, None))];
        let docs = vec![
            Document::new("nlp.md")
                .with_identifier("10.1000/NLP")
                .with_title("Deep Learning for NLP"),
        ];

        let report = reconciler(vec![source], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].match_state, MatchState::MatchedByTitle);
        assert_eq!(report.enrichments[0].identifier.as_str(), "10.1000/nlp");
        let final_entry = report.outcomes[0].entry.as_ref().unwrap();
        assert_eq!(final_entry.identifier.as_deref(), Some("10.1000/nlp"));
    }

    #[tokio::test]
    async fn missing_identifier_is_reported() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::Found(complete_record("T"))));
        let entries = vec![entry(None, record("Only A Title", &[], None, None))];
        let docs = vec![Document::new("t.md").with_title("only a title")];

        let report = reconciler(vec![source.clone()], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(report.outcomes[0].enrichment, Some(EnrichmentStatus::NoIdentifier));
        assert_eq!(report.stats.no_identifier, 1);
    }

    #[tokio::test]
    async fn cancelled_pass_discards_partial_merges() {
        let source = Arc::new(
            ScriptedSource::always("a", FetchOutcome::Found(complete_record("T")))
                .with_delay(Duration::from_secs(30)),
        );
        let entries = vec![entry(Some("10.1000/slow"), RecordFields::default())];
        let docs = vec![Document::new("slow.md").with_identifier("10.1000/slow")];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = reconciler(vec![source], 1)
            .reconcile(&docs, &entries, &cancel)
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].enrichment, Some(EnrichmentStatus::Cancelled));
        assert_eq!(report.outcomes[0].entry.as_ref(), Some(&entries[0]));
        assert!(report.updated_entries.is_empty());
        assert!(report.enrichments.is_empty());
        assert_eq!(report.stats.cancelled, 1);
    }

    #[test]
    fn test_invalid_completeness_floor_rejected() {
        let source: SharedSource = Arc::new(ScriptedSource::always("a", FetchOutcome::NotFound));
        for bad in [f64::NAN, 1.01, -0.5] {
            let result = reconciler(vec![source.clone()], 1).with_min_completeness(bad);
            assert!(matches!(result, Err(ResolveError::ContractViolation(_))));
        }
    }

    #[tokio::test]
    async fn cancelling_mid_pass_keeps_finished_work_only() {
        let source = Arc::new(
            ScriptedSource::always("a", FetchOutcome::Found(complete_record("T")))
                .with_delay_for("10.1000/slow", Duration::from_secs(30)),
        );
        let entries = vec![
            entry(Some("10.1000/slow"), RecordFields::default()),
            entry(Some("10.1000/fast"), RecordFields::default()),
        ];
        let docs = vec![
            Document::new("slow.md").with_identifier("10.1000/slow"),
            Document::new("fast.md").with_identifier("10.1000/fast"),
        ];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let report = reconciler(vec![source.clone()], 1)
            .with_concurrency(2)
            .reconcile(&docs, &entries, &cancel)
            .await
            .unwrap();

        assert_eq!(source.calls(), 2, "both chains were in flight");
        assert_eq!(report.outcomes[0].enrichment, Some(EnrichmentStatus::Cancelled));
        assert_eq!(report.outcomes[0].entry.as_ref(), Some(&entries[0]));
        assert!(matches!(
            report.outcomes[1].enrichment,
            Some(EnrichmentStatus::Enriched { .. })
        ));
        let updated: Vec<usize> = report.updated_entries.iter().map(|u| u.index).collect();
        assert_eq!(updated, vec![1]);
        assert_eq!(report.enrichments.len(), 1);
        assert_eq!(report.enrichments[0].identifier.as_str(), "10.1000/fast");
        assert_eq!(report.stats.cancelled, 1);
        assert_eq!(report.stats.enriched, 1);
    }

    #[tokio::test]
    async fn stalled_source_does_not_hold_back_other_entries() {
        let source = Arc::new(
            ScriptedSource::always("a", FetchOutcome::Found(complete_record("T")))
                .with_delay_for("10.1000/stuck", Duration::from_secs(30)),
        );
        let entries = vec![
            entry(Some("10.1000/stuck"), RecordFields::default()),
            entry(Some("10.1000/fine"), RecordFields::default()),
        ];
        let docs = vec![
            Document::new("stuck.md").with_identifier("10.1000/stuck"),
            Document::new("fine.md").with_identifier("10.1000/fine"),
        ];
        let coordinator = EnrichmentCoordinator::new()
            .with_backoff(Duration::ZERO)
            .with_call_timeout(Some(Duration::from_millis(100)));
        let reconciler = Reconciler::new(DocumentMatcher::new(), coordinator, vec![source])
            .unwrap()
            .with_concurrency(2);

        let started = std::time::Instant::now();
        let report = reconciler
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            report.outcomes[1].entry.as_ref().and_then(|e| e.title()),
            Some("T")
        );
        assert_eq!(report.outcomes[0].entry.as_ref(), Some(&entries[0]));
        assert_eq!(report.stats.sources["a"].failed, 1);
        assert_eq!(report.stats.sources["a"].succeeded, 1);
    }

    #[tokio::test]
    async fn source_statistics_track_failures() {
        let a = Arc::new(ScriptedSource::always(
            "a",
            FetchOutcome::TransientError("503".to_string()),
        ));
        let b = Arc::new(ScriptedSource::always("b", FetchOutcome::Found(complete_record("From B"))));
        let entries = vec![entry(Some("10.1000/x"), RecordFields::default())];
        let docs = vec![Document::new("x.md").with_identifier("10.1000/x")];

        let report = reconciler(vec![a, b], 2)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        let stats_a = &report.stats.sources["a"];
        assert_eq!(stats_a.consulted, 1);
        assert_eq!(stats_a.failed, 1);
        assert_eq!(stats_a.attempts, 2);
        assert_eq!(stats_a.success_rate(), 0.0);
        assert_eq!(report.stats.success_rates()["b"], 1.0);
        assert_eq!(
            report.outcomes[0].entry.as_ref().and_then(|e| e.title()),
            Some("From B")
        );
    }

    #[tokio::test]
    async fn outcomes_follow_input_order() {
        let source = Arc::new(ScriptedSource::always("a", FetchOutcome::NotFound));
        let entries = vec![
            entry(Some("10.1000/a"), complete_record("Alpha")),
            entry(Some("10.1000/b"), complete_record("Beta")),
        ];
        let docs = vec![
            Document::new("z.md").with_identifier("10.1000/b"),
            Document::new("y.md").with_title("nothing like it"),
            Document::new("x.md").with_identifier("10.1000/a"),
        ];

        let report = reconciler(vec![source], 1)
            .reconcile(&docs, &entries, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.document.id.as_str()).collect();
        assert_eq!(ids, vec!["z.md", "y.md", "x.md"]);
        assert_eq!(report.outcomes[0].candidate, Some(1));
        assert_eq!(report.outcomes[2].candidate, Some(0));
    }
}
