use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolveError, Result};
use crate::http::RateLimitedClient;
use crate::identifiers::Identifier;
use crate::sources::{
    FetchOutcome, PartialRecord, RecordCache, SourceClient, clean, escape_path, user_agent,
};

pub const NAME: &str = "crossref";
const BASE_URL: &str = "https://api.crossref.org";

static JATS_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)</?jats:[^>]*>").expect("valid regex"));

pub struct CrossRefSource {
    client: RateLimitedClient,
    cache: Option<RecordCache>,
    base_url: String,
}

impl CrossRefSource {
    pub fn new(polite_email: Option<String>, timeout: Duration) -> Result<Self> {
        Self::with_params(BASE_URL, Duration::from_millis(100), timeout, polite_email)
    }

    pub fn with_params(
        base_url: &str,
        min_interval: Duration,
        timeout: Duration,
        polite_email: Option<String>,
    ) -> Result<Self> {
        let client = RateLimitedClient::new(
            NAME,
            min_interval,
            timeout,
            &user_agent(polite_email.as_deref()),
        )?;

        Ok(Self {
            client,
            cache: None,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_cache(mut self, cache: Option<RecordCache>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn fetch_work(&self, doi: &Identifier) -> Result<CrossRefWork> {
        let url = format!("{}/works/{}", self.base_url, escape_path(doi));
        let val: Value = self.client.get_json(&url).await?;
        CrossRefWork::from_json(&val["message"])
    }
}

#[async_trait]
impl SourceClient for CrossRefSource {
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

        let result = self.fetch_work(identifier).await.map(CrossRefWork::into_record);
        if let (Some(cache), Ok(record)) = (&self.cache, &result) {
            cache.store(identifier, record).await;
        }
        FetchOutcome::from_result(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRefWork {
    pub doi: String,
    pub title: Vec<String>,
    pub author: Vec<CrossRefAuthor>,
    pub published_year: Option<i32>,
    pub container_title: Vec<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub page: Option<String>,
    pub publisher: Option<String>,
    pub abstract_text: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRefAuthor {
    pub given: Option<String>,
    pub family: Option<String>,
    pub name: Option<String>,
}

impl CrossRefWork {
    pub fn from_json(v: &Value) -> Result<Self> {
        let doi = v["DOI"]
            .as_str()
            .ok_or_else(|| ResolveError::Parse("Missing DOI in CrossRef response".to_string()))?
            .to_string();

        let title = string_list(&v["title"]);

        let author = v["author"]
            .as_array()
            .map(|a| a.iter().map(CrossRefAuthor::from_json).collect())
            .unwrap_or_default();

        let container_title = string_list(&v["container-title"]);

        Ok(Self {
            doi,
            title,
            author,
            published_year: parse_year(v),
            container_title,
            volume: clean(v["volume"].as_str()),
            issue: clean(v["issue"].as_str()),
            page: clean(v["page"].as_str()),
            publisher: clean(v["publisher"].as_str()),
            abstract_text: v["abstract"].as_str().map(strip_jats),
            url: clean(v["URL"].as_str()),
        })
    }

    pub fn into_record(self) -> PartialRecord {
        PartialRecord {
            title: self.title.into_iter().find(|t| !t.trim().is_empty()),
            authors: self
                .author
                .iter()
                .filter_map(CrossRefAuthor::display_name)
                .collect(),
            journal: self.container_title.into_iter().find(|t| !t.trim().is_empty()),
            year: self.published_year,
            volume: self.volume,
            issue: self.issue,
            pages: self.page,
            publisher: self.publisher,
            abstract_text: self.abstract_text.filter(|a| !a.is_empty()),
            url: self.url,
        }
    }
}

impl CrossRefAuthor {
    fn from_json(v: &Value) -> Self {
        Self {
            given: clean(v["given"].as_str()),
            family: clean(v["family"].as_str()),
            name: clean(v["name"].as_str()),
        }
    }

    /// `"Family, Given"`, or whichever part is present.
    pub fn display_name(&self) -> Option<String> {
        match (&self.family, &self.given) {
            (Some(f), Some(g)) => Some(format!("{f}, {g}")),
            (Some(f), None) => Some(f.clone()),
            (None, Some(g)) => Some(g.clone()),
            (None, None) => self.name.clone(),
        }
    }
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_year(v: &Value) -> Option<i32> {
    // CrossRef date parts: "published-print": {"date-parts": [[2017, 6, 12]]}
    v["published-print"]["date-parts"][0][0]
        .as_i64()
        .or_else(|| v["published-online"]["date-parts"][0][0].as_i64())
        .or_else(|| v["issued"]["date-parts"][0][0].as_i64())
        .or_else(|| v["created"]["date-parts"][0][0].as_i64())
        .and_then(|n| i32::try_from(n).ok())
}

fn strip_jats(text: &str) -> String {
    JATS_TAG_RE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
