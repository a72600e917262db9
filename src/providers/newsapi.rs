//! NewsAPI client
//!
//! Recent-headlines collaborator using the "everything" endpoint.
//! Articles without a description fall back to their title so the
//! analysis prompt always has a summary line to work with.

use crate::error::PipelineError;
use crate::models::NewsArticle;
use crate::ports::NewsPort;
use crate::providers::http_client;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://newsapi.org/v2/everything";
const PAGE_SIZE: &str = "10";

pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    description: Option<String>,
    published_at: Option<DateTime<Utc>>,
    source: ArticleSource,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

#[async_trait]
impl NewsPort for NewsApiClient {
    async fn latest_news(&self, symbol: &str, lookback_days: u32) -> Result<Vec<NewsArticle>> {
        let from = (Utc::now() - Duration::days(lookback_days as i64))
            .format("%Y-%m-%d")
            .to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", symbol),
                ("from", from.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", PAGE_SIZE),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Collaborator(format!(
                "NewsAPI returned status {}",
                response.status()
            )));
        }

        let body: EverythingResponse = response.json().await?;
        if body.status != "ok" {
            return Err(PipelineError::Collaborator(format!(
                "NewsAPI status '{}'",
                body.status
            )));
        }

        let articles = body
            .articles
            .into_iter()
            .filter_map(|a| {
                let title = a.title?;
                let summary = a.description.unwrap_or_else(|| title.clone());
                Some(NewsArticle {
                    title,
                    summary,
                    published_at: a.published_at.unwrap_or_else(Utc::now),
                    source: a.source.name.unwrap_or_else(|| "unknown".to_string()),
                    sentiment: None,
                })
            })
            .collect::<Vec<_>>();

        debug!(symbol, count = articles.len(), "NewsAPI articles received");
        Ok(articles)
    }
}
