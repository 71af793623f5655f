use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolveError, Result};
use crate::http::RateLimitedClient;
use crate::identifiers::Identifier;
use crate::sources::{
    FetchOutcome, PartialRecord, RecordCache, SourceClient, clean, escape_path, user_agent,
};

pub const NAME: &str = "openalex";
const BASE_URL: &str = "https://api.openalex.org";

pub struct OpenAlexSource {
    client: RateLimitedClient,
    cache: Option<RecordCache>,
    base_url: String,
    polite_email: Option<String>,
}

impl OpenAlexSource {
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
            polite_email,
        })
    }

    pub fn with_cache(mut self, cache: Option<RecordCache>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn fetch_work(&self, doi: &Identifier) -> Result<OpenAlexWork> {
        let mut url = format!("{}/works/doi:{}", self.base_url, escape_path(doi));
        if let Some(email) = &self.polite_email {
            url.push_str(&format!("?mailto={}", urlencoding::encode(email)));
        }
        let val: Value = self.client.get_json(&url).await?;
        Ok(OpenAlexWork::from_json(&val))
    }
}

#[async_trait]
impl SourceClient for OpenAlexSource {
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

        let result = self.fetch_work(identifier).await.map(OpenAlexWork::into_record);
        if let (Some(cache), Ok(record)) = (&self.cache, &result) {
            cache.store(identifier, record).await;
        }
        FetchOutcome::from_result(result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAlexWork {
    pub id: String,
    pub doi: Option<String>,
    pub title: Option<String>,
    pub publication_year: Option<i32>,
    pub authors: Vec<String>,
    pub venue: Option<String>,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub first_page: Option<String>,
    pub last_page: Option<String>,
    pub landing_page_url: Option<String>,
    pub abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
}

impl OpenAlexWork {
    pub fn from_json(v: &Value) -> Self {
        let id = v
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let title = clean(
            v.get("title")
                .or_else(|| v.get("display_name"))
                .and_then(Value::as_str),
        );

        let publication_year = v
            .get("publication_year")
            .and_then(Value::as_i64)
            .and_then(|n| i32::try_from(n).ok());

        let authors = v
            .get("authorships")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| clean(a["author"]["display_name"].as_str()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let location_source = &v["primary_location"]["source"];
        let biblio = &v["biblio"];

        let abstract_inverted_index = v
            .get("abstract_inverted_index")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(token, positions)| {
                        let values = positions
                            .as_array()?
                            .iter()
                            .filter_map(Value::as_u64)
                            .filter_map(|n| u32::try_from(n).ok())
                            .collect::<Vec<_>>();
                        if values.is_empty() {
                            None
                        } else {
                            Some((token.clone(), values))
                        }
                    })
                    .collect::<HashMap<_, _>>()
            });

        Self {
            id,
            doi: clean(v["doi"].as_str()),
            title,
            publication_year,
            authors,
            venue: clean(location_source["display_name"].as_str()),
            publisher: clean(location_source["host_organization_name"].as_str()),
            volume: clean(biblio["volume"].as_str()),
            issue: clean(biblio["issue"].as_str()),
            first_page: clean(biblio["first_page"].as_str()),
            last_page: clean(biblio["last_page"].as_str()),
            landing_page_url: clean(v["primary_location"]["landing_page_url"].as_str()),
            abstract_inverted_index,
        }
    }

    /// Rebuild the abstract text from OpenAlex's word-to-positions index.
    pub fn reconstruct_abstract(&self) -> Option<String> {
        let index = self.abstract_inverted_index.as_ref()?;
        let mut tokens: Vec<(u32, &str)> = index
            .iter()
            .flat_map(|(word, positions)| positions.iter().map(move |&pos| (pos, word.as_str())))
            .filter(|(_, word)| !word.is_empty())
            .collect();
        tokens.sort_unstable();
        tokens.dedup_by_key(|(pos, _)| *pos);

        let text = tokens
            .into_iter()
            .map(|(_, word)| word)
            .collect::<Vec<_>>()
            .join(" ");
        (!text.is_empty()).then_some(text)
    }

    fn pages(&self) -> Option<String> {
        match (&self.first_page, &self.last_page) {
            (Some(first), Some(last)) if first != last => Some(format!("{first}-{last}")),
            (Some(first), _) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }

    pub fn into_record(self) -> PartialRecord {
        let abstract_text = self.reconstruct_abstract();
        let pages = self.pages();
        PartialRecord {
            title: self.title,
            authors: self.authors,
            journal: self.venue,
            year: self.publication_year,
            volume: self.volume,
            issue: self.issue,
            pages,
            publisher: self.publisher,
            abstract_text,
            url: self.doi.or(self.landing_page_url),
        }
    }
}
