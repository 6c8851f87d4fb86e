//! services/api/src/adapters/search.rs
//!
//! This module contains the adapter for SerpAPI's Google search endpoint.
//! It implements the `SearchService` port from the `core` crate.

use async_trait::async_trait;
use serde::Deserialize;
use study_assistant_core::{
    domain::SearchSnippet,
    ports::{PortError, PortResult, SearchService},
};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SearchService` port using SerpAPI.
#[derive(Clone)]
pub struct SerpApiAdapter {
    http: reqwest::Client,
    api_key: String,
}

impl SerpApiAdapter {
    /// Creates a new `SerpApiAdapter`.
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl OrganicResult {
    /// Results without a snippet carry nothing to ground an answer on.
    fn to_domain(self) -> Option<SearchSnippet> {
        let snippet = self.snippet.filter(|s| !s.trim().is_empty())?;
        let link = self.link.unwrap_or_default();
        let source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| link.clone());
        Some(SearchSnippet {
            snippet,
            source,
            link,
        })
    }
}

fn parse_results(body: SearchResponse) -> Vec<SearchSnippet> {
    body.organic_results
        .into_iter()
        .filter_map(OrganicResult::to_domain)
        .collect()
}

//=========================================================================================
// `SearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SearchService for SerpApiAdapter {
    async fn search(&self, query: &str) -> PortResult<Vec<SearchSnippet>> {
        let response = self
            .http
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PortError::Unexpected(format!("Search request failed: {}", e)))?;

        let body = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Search response was malformed: {}", e)))?;

        Ok(parse_results(body))
    }
}
