use std::time::Duration;

use citesync_core::{BibliographicEntry, EnrichmentConfig, EntryField};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::enrichment::completeness::CompletenessPredicate;
use crate::enrichment::merge::merge_partial;
use crate::error::{ResolveError, Result};
use crate::identifiers::Identifier;
use crate::sources::{FetchOutcome, PartialRecord, SharedSource, SourceClient};

/// What one source answered during an enrichment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    /// Calls made, including retries.
    pub attempts: u32,
    /// The final answer; for a source that kept failing, its last error.
    pub outcome: FetchOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_contributed: Vec<EntryField>,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Found(_))
    }

    pub fn failed(&self) -> bool {
        matches!(
            self.outcome,
            FetchOutcome::TransientError(_) | FetchOutcome::PermanentError(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub identifier: Identifier,
    /// Built only from the records in `per_source`.
    pub merged_entry: BibliographicEntry,
    /// Consulted sources in priority order.
    pub per_source: Vec<SourceReport>,
    /// The source whose answer made the entry complete, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_circuited_by: Option<String>,
    pub completeness_score: f64,
}

impl EnrichmentResult {
    pub fn report_for(&self, source: &str) -> Option<&SourceReport> {
        self.per_source.iter().find(|r| r.source == source)
    }

    pub fn record_for(&self, source: &str) -> Option<&PartialRecord> {
        match &self.report_for(source)?.outcome {
            FetchOutcome::Found(record) => Some(record),
            _ => None,
        }
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &str> {
        self.per_source
            .iter()
            .filter(|r| r.failed())
            .map(|r| r.source.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.completeness_score >= 1.0
    }
}

/// Drives an ordered source chain for one identifier.
#[derive(Debug, Clone)]
pub struct EnrichmentCoordinator {
    max_attempts_per_source: u32,
    backoff: Duration,
    call_timeout: Option<Duration>,
}

impl Default for EnrichmentCoordinator {
    fn default() -> Self {
        Self {
            max_attempts_per_source: 1,
            backoff: Duration::from_millis(500),
            call_timeout: Some(Duration::from_secs(20)),
        }
    }
}

impl EnrichmentCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new()
            .with_max_attempts(config.max_attempts_per_source)
            .with_backoff(Duration::from_millis(config.backoff_ms))
            .with_call_timeout(Some(Duration::from_secs(config.request_timeout_secs)))
    }

    /// Total calls per source when it keeps answering with transient errors.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_per_source = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Query `sources` in order until `predicate` accepts the merged entry.
    ///
    /// Per-source failures are recorded in the result, never returned. The
    /// only error is an empty source list.
    pub async fn enrich(
        &self,
        identifier: &Identifier,
        sources: &[SharedSource],
        predicate: &dyn CompletenessPredicate,
    ) -> Result<EnrichmentResult> {
        if sources.is_empty() {
            return Err(ResolveError::ContractViolation(
                "enrichment requires at least one source".to_string(),
            ));
        }

        let mut merged = BibliographicEntry::placeholder(identifier.as_str());
        let mut per_source = Vec::with_capacity(sources.len());
        let mut short_circuited_by = None;

        for source in sources {
            let name = source.name().to_string();
            let (outcome, attempts) = self.fetch_with_retry(source.as_ref(), identifier).await;

            let fields_contributed = match &outcome {
                FetchOutcome::Found(record) => merge_partial(&mut merged, record, &name),
                FetchOutcome::NotFound => {
                    debug!(source = %name, %identifier, "not found");
                    Vec::new()
                }
                FetchOutcome::TransientError(msg) | FetchOutcome::PermanentError(msg) => {
                    warn!(source = %name, %identifier, attempts, "source failed: {msg}");
                    Vec::new()
                }
            };
            let found = matches!(outcome, FetchOutcome::Found(_));

            per_source.push(SourceReport {
                source: name.clone(),
                attempts,
                outcome,
                fields_contributed,
            });

            if found && predicate.is_complete(&merged) {
                debug!(source = %name, %identifier, "entry complete, skipping remaining sources");
                short_circuited_by = Some(name);
                break;
            }
        }

        merged.refresh_completeness();
        let completeness_score = merged.completeness_score;

        Ok(EnrichmentResult {
            identifier: identifier.clone(),
            merged_entry: merged,
            per_source,
            short_circuited_by,
            completeness_score,
        })
    }

    async fn fetch_with_retry(
        &self,
        source: &dyn SourceClient,
        identifier: &Identifier,
    ) -> (FetchOutcome, u32) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = self.fetch_once(source, identifier).await;
            match outcome {
                FetchOutcome::TransientError(ref msg) if attempt < self.max_attempts_per_source => {
                    let delay = self.backoff.saturating_mul(1u32 << (attempt - 1).min(16));
                    debug!(
                        source = source.name(),
                        %identifier,
                        attempt,
                        "transient failure, retrying in {delay:?}: {msg}"
                    );
                    sleep(delay).await;
                }
                other => return (other, attempt),
            }
        }
    }

    async fn fetch_once(&self, source: &dyn SourceClient, identifier: &Identifier) -> FetchOutcome {
        match self.call_timeout {
            Some(limit) => match timeout(limit, source.fetch(identifier)).await {
                Ok(outcome) => outcome,
                Err(_) => FetchOutcome::TransientError(format!(
                    "no answer within {}ms",
                    limit.as_millis()
                )),
            },
            None => source.fetch(identifier).await,
        }
    }
}
