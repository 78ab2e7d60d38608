//! Web search through the Google Custom Search JSON API.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use teller_core::config::{ProxyConfig, SearchSettings};
use teller_core::{AppConfig, AppError, AppResult};

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Result of a web search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Results(Vec<SearchHit>),
    NoResults,
}

impl SearchOutcome {
    /// Plain-text rendering handed to the response step.
    pub fn format(&self) -> String {
        match self {
            SearchOutcome::NoResults => "No relevant search results found".to_string(),
            SearchOutcome::Results(hits) => hits
                .iter()
                .map(|hit| {
                    format!(
                        "Title: {}\nSnippet: {}\nLink: {}\n",
                        hit.title, hit.snippet, hit.link
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A source of web search results.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Whether searches can be sent at all.
    fn is_configured(&self) -> bool;

    /// Search for `query`, asking for up to `num` results.
    async fn search(&self, query: &str, num: u32) -> AppResult<SearchOutcome>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

type CacheKey = (String, u32);

/// Google Custom Search client with an in-memory result cache.
pub struct WebSearchTool {
    client: reqwest::Client,
    settings: SearchSettings,
    ttl: Duration,
    cache: Mutex<HashMap<CacheKey, (Instant, SearchOutcome)>>,
}

impl WebSearchTool {
    /// Build the HTTP client, routed through `proxy` when it is complete.
    pub fn new(settings: SearchSettings, proxy: &ProxyConfig, ttl: Duration) -> AppResult<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs));

        if let Some(url) = proxy.url() {
            tracing::info!("Using proxy for web search: {}", url);
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| AppError::Config(format!("Invalid proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        } else if proxy.host.is_some() || proxy.port.is_some() {
            tracing::warn!("Proxy configuration incomplete or invalid, searching without proxy");
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Search(format!("Failed to create HTTP client: {}", e)))?;

        if settings.is_configured() {
            tracing::info!("Web search initialized");
        } else {
            tracing::warn!("Web search unavailable: GOOGLE_API_KEY or GOOGLE_CSE_ID not set");
        }

        Ok(Self {
            client,
            settings,
            ttl,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::new(
            config.search.clone(),
            &config.proxy,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    /// Results requested when the caller has no preference.
    pub fn default_num_results(&self) -> u32 {
        self.settings.num_results
    }

    fn cached(&self, key: &CacheKey) -> Option<SearchOutcome> {
        let mut cache = self.cache.lock().ok()?;
        match cache.get(key) {
            Some((stored, outcome)) if stored.elapsed() < self.ttl => Some(outcome.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: CacheKey, outcome: &SearchOutcome) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            let ttl = self.ttl;
            cache.retain(|_, (stored, _)| stored.elapsed() < ttl);
            cache.insert(key, (Instant::now(), outcome.clone()));
        }
    }

    async fn fetch(&self, query: &str, num: u32) -> AppResult<SearchOutcome> {
        let (Some(key), Some(cx)) = (
            self.settings.google_api_key.as_deref(),
            self.settings.google_cse_id.as_deref(),
        ) else {
            return Err(AppError::Search(
                "Web search is not configured (GOOGLE_API_KEY, GOOGLE_CSE_ID)".to_string(),
            ));
        };

        let num = num.to_string();
        let response = self
            .client
            .get(&self.settings.endpoint)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", num.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Search(format!("Search request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Search(format!("Failed to read search response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| format!("{} {}", e.error.code, e.error.message))
                .unwrap_or(body);
            return Err(AppError::Search(format!("Google search API error ({}): {}", status, message)));
        }

        parse_response(&body)
    }
}

/// Parse a Custom Search JSON body.
fn parse_response(body: &str) -> AppResult<SearchOutcome> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Search(format!("Failed to parse search response: {}", e)))?;

    let hits: Vec<SearchHit> = parsed
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|item| SearchHit {
            title: item.title.unwrap_or_else(|| "(no title)".to_string()),
            snippet: item.snippet.unwrap_or_else(|| "(no description)".to_string()),
            link: item.link.unwrap_or_default(),
        })
        .collect();

    if hits.is_empty() {
        Ok(SearchOutcome::NoResults)
    } else {
        Ok(SearchOutcome::Results(hits))
    }
}

#[async_trait::async_trait]
impl SearchBackend for WebSearchTool {
    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    async fn search(&self, query: &str, num: u32) -> AppResult<SearchOutcome> {
        let key = (query.to_string(), num);
        if let Some(outcome) = self.cached(&key) {
            tracing::debug!("Search cache hit: {}", query);
            return Ok(outcome);
        }

        tracing::info!("Running web search: {}", query);
        let outcome = self.fetch(query, num).await.map_err(|e| {
            tracing::error!("{}", e);
            e
        })?;

        match &outcome {
            SearchOutcome::Results(hits) => tracing::info!("Search found {} results", hits.len()),
            SearchOutcome::NoResults => tracing::warn!("Search returned no results"),
        }

        self.store(key, &outcome);
        Ok(outcome)
    }
}
