//! GNews search connector.
//!
//! Pages through `GET /api/v4/search` for the country name within the
//! request window. Paging stops at the first short or empty page, or at
//! `max_pages`. The API token comes from the environment variable named by
//! `sources.gnews.api_key_env` (default `G_NEWS_TOKEN`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{secret, GNewsConfig};
use crate::http::{build_client, join_url, send_with_retry};
use crate::models::{parse_date_prefix, Provenance, ReportRequest, SourceRecord};
use crate::traits::Connector;

pub struct GNewsConnector {
    config: GNewsConfig,
    client: Client,
    max_retries: u32,
}

impl GNewsConnector {
    pub fn new(config: GNewsConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Ok(Self {
            config,
            client: build_client(timeout_secs)?,
            max_retries,
        })
    }

    async fn fetch_page(&self, req: &ReportRequest, token: &str, page: usize) -> Result<Value> {
        let url = join_url(&self.config.base_url, "api/v4/search");
        let request = self.client.get(&url).query(&[
            ("q", req.country.name.to_string()),
            ("lang", self.config.language.clone()),
            ("from", format!("{}T00:00:00Z", req.start())),
            ("to", format!("{}T23:59:59Z", req.end())),
            ("max", self.config.page_size.to_string()),
            ("page", page.to_string()),
            ("token", token.to_string()),
        ]);

        let response = send_with_retry(request, self.max_retries, "GNews").await?;
        response.json().await.context("Invalid GNews response")
    }
}

#[async_trait]
impl Connector for GNewsConnector {
    fn name(&self) -> &str {
        "gnews"
    }

    fn provenance(&self) -> Provenance {
        Provenance::NewsArticle
    }

    async fn scan(&self, req: &ReportRequest) -> Result<Vec<SourceRecord>> {
        let token = secret(&self.config.api_key_env)
            .ok_or_else(|| anyhow::anyhow!("{} not set", self.config.api_key_env))?;

        let mut records = Vec::new();
        for page in 1..=self.config.max_pages {
            let json = self.fetch_page(req, &token, page).await?;
            let (returned, mut batch) = parse_articles(&json)?;
            records.append(&mut batch);

            if returned < self.config.page_size {
                break;
            }
            if page == self.config.max_pages {
                tracing::debug!(
                    source = "gnews",
                    max_pages = self.config.max_pages,
                    "page cap reached"
                );
            }
        }

        Ok(records)
    }

    fn no_data_record(&self, req: &ReportRequest) -> SourceRecord {
        SourceRecord::no_data(
            Provenance::NewsArticle,
            req.end(),
            format!(
                "No Google News articles found for {} between {} and {}.",
                req.country.name,
                req.start(),
                req.end()
            ),
        )
    }
}

/// Convert one search page into records.
///
/// Returns the number of articles the page carried (for the paging
/// decision) alongside the records that survived normalization.
pub fn parse_articles(json: &Value) -> Result<(usize, Vec<SourceRecord>)> {
    if let Some(errors) = json.get("errors") {
        anyhow::bail!("GNews API error: {}", errors);
    }

    let articles = json
        .get("articles")
        .and_then(|a| a.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid GNews response: missing articles array"))?;

    let records = articles
        .iter()
        .filter_map(|article| {
            let date = article
                .get("publishedAt")
                .and_then(|d| d.as_str())
                .and_then(parse_date_prefix)?;
            let title = article
                .get("title")
                .and_then(|t| t.as_str())
                .map(str::to_string);
            let source = article
                .get("source")
                .and_then(|s| s.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or("");
            let body = article
                .get("description")
                .and_then(|d| d.as_str())
                .filter(|d| !d.trim().is_empty())
                .or_else(|| article.get("content").and_then(|c| c.as_str()))
                .unwrap_or("");
            SourceRecord::new(Provenance::NewsArticle, title, date, source, body)
        })
        .collect();

    Ok((articles.len(), records))
}
