//! Citesync resolver: identifier normalization, source clients, metadata
//! enrichment and document reconciliation.

pub mod enrichment;
pub mod error;
pub mod http;
pub mod identifiers;
pub mod matcher;
pub mod reconcile;
pub mod similarity;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use enrichment::{
    CompletenessPredicate, EnrichmentCoordinator, EnrichmentResult, RequiredFields, SourceReport,
};
pub use error::{ResolveError, Result};
pub use identifiers::{Identifier, NormalizedTitle, normalize_identifier, normalize_title};
pub use matcher::{CandidateIndex, DocumentMatcher, MatchResult, match_document};
pub use reconcile::{
    EnrichmentStatus, EntryUpdate, ReconcileReport, ReconcileStats, ReconciledDocument,
    Reconciler, SourceStats,
};
pub use similarity::similarity;
pub use sources::{FetchOutcome, PartialRecord, SharedSource, SourceClient, build_sources};
