use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolveError, Result};
use crate::http::RateLimitedClient;
use crate::identifiers::Identifier;
use crate::sources::{
    FetchOutcome, PartialRecord, RecordCache, SourceClient, clean, escape_path, user_agent,
};

pub const NAME: &str = "semantic_scholar";
const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const PAPER_FIELDS: &str = "title,authors,year,venue,journal,abstract,url,externalIds";
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

pub struct SemanticScholarSource {
    client: RateLimitedClient,
    cache: Option<RecordCache>,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    /// Unauthenticated access is limited to roughly one request per second.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let min_interval = if api_key.is_some() {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        Self::with_params(BASE_URL, min_interval, timeout, api_key)
    }

    pub fn with_params(
        base_url: &str,
        min_interval: Duration,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self> {
        let client = RateLimitedClient::new(NAME, min_interval, timeout, &user_agent(None))?;
        Ok(Self {
            client,
            cache: None,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn with_cache(mut self, cache: Option<RecordCache>) -> Self {
        self.cache = cache;
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key
            && let Ok(value) = HeaderValue::from_str(key)
        {
            headers.insert(API_KEY_HEADER, value);
        }
        headers
    }

    pub async fn fetch_paper(&self, doi: &Identifier) -> Result<S2Paper> {
        let url = format!(
            "{}/paper/DOI:{}?fields={}",
            self.base_url,
            escape_path(doi),
            PAPER_FIELDS
        );
        let val: Value = self.client.get_json_with_headers(&url, self.headers()).await?;
        Ok(S2Paper::from_json(&val))
    }
}

#[async_trait]
impl SourceClient for SemanticScholarSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, identifier: &Identifier) -> FetchOutcome {
        if !identifier.is_doi() {
            return ResolveError::Unsupported {
                source_name: NAME.to_string(),
                identifier: identifier.to_string(),
            }
            .into();
        }

        if let Some(cache) = &self.cache
            && let Some(record) = cache.load(identifier).await
        {
            return FetchOutcome::Found(record);
        }

        let result = self.fetch_paper(identifier).await.map(S2Paper::into_record);
        if let (Some(cache), Ok(record)) = (&self.cache, &result) {
            cache.store(identifier, record).await;
        }
        FetchOutcome::from_result(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S2Paper {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub journal_name: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub abstract_text: Option<String>,
    pub url: Option<String>,
}

impl S2Paper {
    pub fn from_json(v: &Value) -> Self {
        let authors = v
            .get("authors")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|author| clean(author["name"].as_str()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let journal = &v["journal"];

        Self {
            title: clean(v["title"].as_str()),
            authors,
            year: v["year"].as_i64().and_then(|n| i32::try_from(n).ok()),
            venue: clean(v["venue"].as_str()),
            journal_name: clean(journal["name"].as_str()),
            volume: clean(journal["volume"].as_str()),
            pages: clean(journal["pages"].as_str()).map(|p| p.replace(' ', "")),
            abstract_text: clean(v["abstract"].as_str()),
            url: clean(v["url"].as_str()),
        }
    }

    pub fn into_record(self) -> PartialRecord {
        PartialRecord {
            title: self.title,
            authors: self.authors,
            journal: self.journal_name.or(self.venue),
            year: self.year,
            volume: self.volume,
            pages: self.pages,
            abstract_text: self.abstract_text,
            url: self.url,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::normalize_identifier;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_s2_fetch_found_with_api_key() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Regex(r"^/paper/DOI:10\.18653/v1/n19-1423".to_string()))
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "paperId": "df2b0e26d0599ce3e70df8a9da02e51594e0e992",
                    "title": "BERT: Pre-training of Deep Bidirectional Transformers",
                    "authors": [{"authorId": "1", "name": "Jacob Devlin"}, {"name": "Ming-Wei Chang"}],
                    "year": 2019,
                    "venue": "North American Chapter of the ACL",
                    "journal": {"name": "", "pages": "4171 - 4186"},
                    "abstract": null
                }"#,
            )
            .create_async()
            .await;

        let s2 = SemanticScholarSource::with_params(
            &server.url(),
            Duration::ZERO,
            Duration::from_secs(5),
            Some("secret".to_string()),
        )
        .unwrap();
        let id = normalize_identifier("10.18653/v1/N19-1423").unwrap();

        let record = match s2.fetch(&id).await {
            FetchOutcome::Found(record) => record,
            other => panic!("expected a record, got {other:?}"),
        };
        assert_eq!(record.authors, vec!["Jacob Devlin", "Ming-Wei Chang"]);
        assert_eq!(record.journal.as_deref(), Some("North American Chapter of the ACL"));
        assert_eq!(record.pages.as_deref(), Some("4171-4186"));
        assert_eq!(record.year, Some(2019));
        assert_eq!(record.abstract_text, None);
    }

    #[tokio::test]
    async fn test_s2_rate_limited_is_transient() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Regex(r"^/paper/DOI:10\.1000/busy".to_string()))
            .with_status(429)
            .with_header("retry-after", "1")
            .create_async()
            .await;

        let s2 = SemanticScholarSource::with_params(&server.url(), Duration::ZERO, Duration::from_secs(5), None)
            .unwrap();
        let id = normalize_identifier("10.1000/busy").unwrap();
        assert!(s2.fetch(&id).await.is_transient());
    }
}
