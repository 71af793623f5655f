//! Source clients: one capability, one variant per external service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use citesync_core::{RecordFields, SourcesConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};
use crate::identifiers::Identifier;

pub mod cache;
pub mod crossref;
pub mod openalex;
pub mod semantic_scholar;

pub use cache::RecordCache;
pub use crossref::CrossRefSource;
pub use openalex::OpenAlexSource;
pub use semantic_scholar::SemanticScholarSource;

/// What a source knows about an identifier; any field may be missing.
pub type PartialRecord = RecordFields;

/// The four answers a source can give.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum FetchOutcome {
    Found(PartialRecord),
    /// The source has no record for the identifier. A normal answer.
    NotFound,
    /// Worth retrying: rate limit, timeout, server hiccup.
    TransientError(String),
    /// Retrying is pointless: unsupported identifier, malformed response.
    PermanentError(String),
}

impl FetchOutcome {
    /// Fold a fetch result into an outcome, treating an empty record as
    /// `NotFound`.
    pub fn from_result(result: Result<PartialRecord>) -> Self {
        match result {
            Ok(record) if record.is_empty() => Self::NotFound,
            Ok(record) => Self::Found(record),
            Err(err) => err.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError(_))
    }
}

impl From<ResolveError> for FetchOutcome {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(_) => Self::NotFound,
            e if e.is_transient() => Self::TransientError(e.to_string()),
            e => Self::PermanentError(e.to_string()),
        }
    }
}

/// A bibliographic data source.
///
/// `fetch` never panics or errors for an unknown identifier; it answers
/// [`FetchOutcome::NotFound`]. Implementations enforce their own request
/// spacing, so a call may wait before it is sent.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, identifier: &Identifier) -> FetchOutcome;
}

pub type SharedSource = Arc<dyn SourceClient>;

/// Build the ordered source registry from configured names.
pub fn build_sources(
    names: &[String],
    config: &SourcesConfig,
    timeout: Duration,
) -> Result<Vec<SharedSource>> {
    let cache_ttl = Duration::from_secs(config.cache_ttl_hours * 3600);
    let cache = |source: &str| {
        config
            .cache_enabled
            .then(|| RecordCache::for_source(source, cache_ttl))
    };

    let mut sources: Vec<SharedSource> = Vec::with_capacity(names.len());
    for name in names {
        let source: SharedSource = match name.as_str() {
            crossref::NAME => Arc::new(
                CrossRefSource::new(config.polite_email.clone(), timeout)?
                    .with_cache(cache(crossref::NAME)),
            ),
            openalex::NAME => Arc::new(
                OpenAlexSource::new(config.polite_email.clone(), timeout)?
                    .with_cache(cache(openalex::NAME)),
            ),
            semantic_scholar::NAME => Arc::new(
                SemanticScholarSource::new(config.semantic_scholar_api_key.clone(), timeout)?
                    .with_cache(cache(semantic_scholar::NAME)),
            ),
            other => return Err(ResolveError::UnknownSource(other.to_string())),
        };
        sources.push(source);
    }
    Ok(sources)
}

pub(crate) fn user_agent(polite_email: Option<&str>) -> String {
    match polite_email {
        Some(email) => format!("citesync/{} (mailto:{email})", env!("CARGO_PKG_VERSION")),
        None => format!("citesync/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Identifier escaped for a URL path, `/` separators kept.
pub(crate) fn escape_path(identifier: &Identifier) -> String {
    identifier
        .as_str()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Trimmed non-empty string or nothing.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}
