//! Web search for general questions
//!
//! Provides web search via configurable providers (DuckDuckGo, Brave, Serper)

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::{Error, Result};

/// Text used when a search returns nothing
pub const NO_RESULTS: &str = "No results found";

/// Search provider configuration
#[derive(Debug, Clone)]
pub enum SearchProvider {
    /// DuckDuckGo instant answers (no key)
    DuckDuckGo,
    /// Brave Search API
    Brave {
        /// API key for Brave Search
        api_key: SecretString,
    },
    /// Serper (Google) Search API
    Serper {
        /// API key for Serper
        api_key: SecretString,
    },
}

impl SearchProvider {
    /// Pick a provider by name
    ///
    /// # Errors
    ///
    /// Returns error for an unknown provider or a keyed provider without a key
    pub fn from_name(name: &str, api_key: Option<SecretString>) -> Result<Self> {
        match (name.trim().to_lowercase().as_str(), api_key) {
            ("duckduckgo" | "ddg", _) => Ok(Self::DuckDuckGo),
            ("brave", Some(api_key)) => Ok(Self::Brave { api_key }),
            ("serper", Some(api_key)) => Ok(Self::Serper { api_key }),
            ("brave" | "serper", None) => Err(Error::Config(format!(
                "search provider {name} needs an API key"
            ))),
            (other, _) => Err(Error::Config(format!("unknown search provider: {other}"))),
        }
    }
}

/// Search result from web search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title
    pub title: String,
    /// Result URL
    pub url: String,
    /// Result snippet/description
    pub snippet: String,
}

/// Anything that can answer a search query
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Search for `query`, returning at most `limit` results
    ///
    /// # Errors
    ///
    /// Returns error if the search request fails or response parsing fails
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// DuckDuckGo instant answer response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DuckDuckGoResponse {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    related_topics: Vec<DuckDuckGoTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DuckDuckGoTopic {
    Entry {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<DuckDuckGoTopic>,
    },
}

/// Brave Search API response
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    description: String,
}

/// Serper API response
#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    organic: Option<Vec<SerperResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: String,
    link: String,
    snippet: String,
}

/// Serper API request body
#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

/// Web search tool
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    provider: SearchProvider,
    client: reqwest::Client,
}

impl WebSearchTool {
    /// Create a search tool for the given provider
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(provider: SearchProvider, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Hearth-Gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { provider, client })
    }

    /// Create a search tool from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown, lacks a key, or the client cannot be built
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let provider = SearchProvider::from_name(&config.provider, config.api_key.clone())?;
        Self::new(provider, config.timeout)
    }

    /// Search using DuckDuckGo instant answers
    async fn search_duckduckgo(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await?;
        let response = response.error_for_status().map_err(Error::Http)?;

        // Instant answers are served as application/x-javascript
        let body = response.text().await?;
        let parsed: DuckDuckGoResponse = serde_json::from_str(&body)?;

        Ok(duckduckgo_results(parsed, limit))
    }

    /// Search using Brave Search API
    async fn search_brave(
        &self,
        api_key: &SecretString,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", api_key.expose_secret())
            .query(&[("q", query), ("count", &limit.to_string())])
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;

        let brave_response: BraveSearchResponse = response.json().await?;

        let results = brave_response
            .web
            .map(|web| {
                web.results
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.url,
                        snippet: r.description,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    /// Search using Serper API
    async fn search_serper(
        &self,
        api_key: &SecretString,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let request_body = SerperRequest { q: query, num: limit };

        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key.expose_secret())
            .json(&request_body)
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;

        let serper_response: SerperSearchResponse = response.json().await?;

        let results = serper_response
            .organic
            .map(|organic| {
                organic
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.link,
                        snippet: r.snippet,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

#[async_trait]
impl SearchSource for WebSearchTool {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim().trim_matches(['"', '\'']);
        tracing::info!(%query, "web search");

        let mut results = match &self.provider {
            SearchProvider::DuckDuckGo => self.search_duckduckgo(query, limit).await?,
            SearchProvider::Brave { api_key } => self.search_brave(api_key, query, limit).await?,
            SearchProvider::Serper { api_key } => self.search_serper(api_key, query, limit).await?,
        };
        results.truncate(limit);

        tracing::debug!(count = results.len(), "search results");
        Ok(results)
    }
}

fn duckduckgo_results(response: DuckDuckGoResponse, limit: usize) -> Vec<SearchResult> {
    fn flatten(topics: Vec<DuckDuckGoTopic>, out: &mut Vec<SearchResult>) {
        for topic in topics {
            match topic {
                DuckDuckGoTopic::Entry { text, first_url } => {
                    let title = text.split(" - ").next().unwrap_or(&text).to_string();
                    out.push(SearchResult {
                        title,
                        url: first_url,
                        snippet: text,
                    });
                }
                DuckDuckGoTopic::Group { topics } => flatten(topics, out),
            }
        }
    }

    let mut results = Vec::new();
    if !response.abstract_text.is_empty() {
        results.push(SearchResult {
            title: response.heading,
            url: response.abstract_url,
            snippet: response.abstract_text,
        });
    }
    flatten(response.related_topics, &mut results);
    results.truncate(limit);
    results
}

/// Render results as prompt context
#[must_use]
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    results
        .iter()
        .map(|r| format!("Source: {}\nContent: {}", r.title, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}
