//! ReliefWeb situation reports connector.
//!
//! Posts a filtered query to the ReliefWeb v1 reports API: country name,
//! creation date inside the request window, and report language. Each
//! returned report becomes one record with its HTML body flattened to
//! plain text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ReliefWebConfig;
use crate::http::{build_client, join_url, send_with_retry};
use crate::models::{parse_date_prefix, Provenance, ReportRequest, SourceRecord};
use crate::traits::Connector;

/// Wide enough that html2text never wraps a paragraph.
const RENDER_WIDTH: usize = 10_000;

pub struct ReliefWebConnector {
    config: ReliefWebConfig,
    client: Client,
    max_retries: u32,
}

impl ReliefWebConnector {
    pub fn new(config: ReliefWebConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Ok(Self {
            config,
            client: build_client(timeout_secs)?,
            max_retries,
        })
    }

    fn payload(&self, req: &ReportRequest) -> Value {
        json!({
            "filter": {
                "operator": "AND",
                "conditions": [
                    {"field": "country.name", "value": req.country.name},
                    {"field": "date.created", "value": {
                        "from": format!("{}T00:00:00+00:00", req.start()),
                        "to": format!("{}T23:59:59+00:00", req.end()),
                    }},
                    {"field": "language.name", "value": self.config.language},
                ]
            },
            "profile": "full",
            "limit": self.config.limit,
            "offset": 0,
        })
    }
}

#[async_trait]
impl Connector for ReliefWebConnector {
    fn name(&self) -> &str {
        "reliefweb"
    }

    fn provenance(&self) -> Provenance {
        Provenance::SituationReport
    }

    async fn scan(&self, req: &ReportRequest) -> Result<Vec<SourceRecord>> {
        let url = join_url(&self.config.base_url, "v1/reports");
        let request = self
            .client
            .post(&url)
            .query(&[("appname", self.config.appname.as_str())])
            .json(&self.payload(req));

        let response = send_with_retry(request, self.max_retries, "ReliefWeb").await?;
        let json: Value = response
            .json()
            .await
            .context("Invalid ReliefWeb response")?;
        parse_reports(&json)
    }

    fn no_data_record(&self, req: &ReportRequest) -> SourceRecord {
        SourceRecord::no_data(
            Provenance::SituationReport,
            req.end(),
            format!(
                "No ReliefWeb reports found for {} between {} and {}.",
                req.country.name,
                req.start(),
                req.end()
            ),
        )
    }
}

/// Convert a `{"data": [{"fields": {...}}]}` response into records.
///
/// Reports without a parseable date or with an empty body are dropped.
pub fn parse_reports(json: &Value) -> Result<Vec<SourceRecord>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid ReliefWeb response: missing data array"))?;

    let mut records = Vec::with_capacity(data.len());
    for item in data {
        let Some(fields) = item.get("fields") else {
            continue;
        };

        let date = ["original", "created"]
            .iter()
            .filter_map(|key| fields.get("date")?.get(*key)?.as_str())
            .find_map(parse_date_prefix);
        let Some(date) = date else {
            tracing::debug!(source = "reliefweb", "report without a usable date, skipping");
            continue;
        };

        let title = fields
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::to_string);

        let source = fields
            .get("source")
            .and_then(|s| s.as_array())
            .map(|sources| {
                sources
                    .iter()
                    .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        let html = fields
            .get("body-html")
            .or_else(|| fields.get("body"))
            .and_then(|b| b.as_str())
            .unwrap_or("");

        if let Some(record) = SourceRecord::new(
            Provenance::SituationReport,
            title,
            date,
            source,
            &clean_html(html),
        ) {
            records.push(record);
        }
    }

    Ok(records)
}

/// Strip markup and collapse runs of blank lines into single newlines.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = html2text::config::plain()
        .string_from_read(html.as_bytes(), RENDER_WIDTH)
        .unwrap_or_else(|_| html.to_string());

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_clean_html_strips_tags_and_blank_lines() {
        let text = clean_html("<p>Floods hit Garissa.</p>\n\n<p>Aid is arriving.</p><br><br>");
        assert!(text.contains("Floods hit Garissa."));
        assert!(text.contains("Aid is arriving."));
        assert!(!text.contains('<'));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn test_clean_html_empty() {
        assert_eq!(clean_html("   "), "");
    }

    #[test]
    fn test_parse_reports() {
        let json = serde_json::json!({
            "count": 2,
            "data": [
                {"id": 1, "fields": {
                    "title": "Kenya: Floods Flash Update No. 3",
                    "date": {"original": "2024-05-02T00:00:00+00:00", "created": "2024-05-03T08:00:00+00:00"},
                    "source": [{"name": "OCHA"}, {"name": "Kenya Red Cross"}],
                    "body-html": "<p>Over 200,000 people displaced.</p>"
                }},
                {"id": 2, "fields": {
                    "title": "Empty",
                    "date": {"original": "2024-05-01T00:00:00+00:00"},
                    "body": ""
                }}
            ]
        });
        let records = parse_reports(&json).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title.as_deref(), Some("Kenya: Floods Flash Update No. 3"));
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(r.source, "OCHA, Kenya Red Cross");
        assert!(r.body.contains("200,000 people displaced"));
        assert_eq!(r.provenance, Provenance::SituationReport);
    }

    #[test]
    fn test_parse_reports_missing_data() {
        assert!(parse_reports(&serde_json::json!({"error": "bad"})).is_err());
    }
}
