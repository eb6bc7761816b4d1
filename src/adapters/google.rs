use crate::domain::ports::ImageSearch;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

/// Google Custom Search image lookup.
#[derive(Debug, Clone)]
pub struct GoogleImageSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    cx: String,
}

impl GoogleImageSearch {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            cx: cx.into(),
        }
    }
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    async fn search_gifs(&self, title: &str) -> Result<Vec<String>> {
        let query = format!("{} exercise gif", title);
        tracing::debug!("Searching images for: {}", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query.as_str()),
                ("searchType", "image"),
                ("num", "10"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Image search returned status {}", response.status());
            return Ok(Vec::new());
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.items.into_iter().map(|item| item.link).collect())
    }
}

/// Used when no search credentials are configured; every lookup finds nothing.
#[derive(Debug, Clone, Default)]
pub struct DisabledImageSearch;

#[async_trait]
impl ImageSearch for DisabledImageSearch {
    async fn search_gifs(&self, title: &str) -> Result<Vec<String>> {
        tracing::warn!("Image search is not configured; no results for '{}'", title);
        Ok(Vec::new())
    }
}
