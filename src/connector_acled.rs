//! ACLED conflict events connector.
//!
//! Authenticates with the OAuth password grant, then reads events for the
//! country inside the request window. Only events with recorded fatalities
//! are kept unless `sources.acled.fatal_only` is turned off.
//!
//! Credentials come from the environment variables named by
//! `username_env` / `password_env` (default `ACLED_USERNAME` and
//! `ACLED_PASSWORD`); missing credentials are a scan failure, which the
//! registry turns into the "no recorded fatalities" record.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{secret, AcledConfig};
use crate::http::{build_client, join_url, send_with_retry};
use crate::models::{parse_date_prefix, Provenance, ReportRequest, SourceRecord};
use crate::traits::Connector;

pub struct AcledConnector {
    config: AcledConfig,
    client: Client,
    max_retries: u32,
}

impl AcledConnector {
    pub fn new(config: AcledConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Ok(Self {
            config,
            client: build_client(timeout_secs)?,
            max_retries,
        })
    }

    async fn request_token(&self, username: &str, password: &str) -> Result<String> {
        let url = join_url(&self.config.base_url, "oauth/token");
        let request = self.client.post(&url).form(&[
            ("username", username),
            ("password", password),
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
        ]);

        let response = send_with_retry(request, self.max_retries, "ACLED OAuth").await?;
        let json: Value = response
            .json()
            .await
            .context("Invalid ACLED token response")?;
        json.get("access_token")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("ACLED token response missing access_token"))
    }
}

#[async_trait]
impl Connector for AcledConnector {
    fn name(&self) -> &str {
        "acled"
    }

    fn provenance(&self) -> Provenance {
        Provenance::ConflictEvent
    }

    async fn scan(&self, req: &ReportRequest) -> Result<Vec<SourceRecord>> {
        let username = secret(&self.config.username_env)
            .ok_or_else(|| anyhow::anyhow!("{} not set", self.config.username_env))?;
        let password = secret(&self.config.password_env)
            .ok_or_else(|| anyhow::anyhow!("{} not set", self.config.password_env))?;

        let token = self.request_token(&username, &password).await?;

        let url = join_url(&self.config.base_url, "api/acled/read");
        let request = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .query(&[
                ("_format", "json".to_string()),
                ("country", req.country.name.to_string()),
                ("event_date", format!("{}|{}", req.start(), req.end())),
                ("event_date_where", "BETWEEN".to_string()),
            ]);

        let response = send_with_retry(request, self.max_retries, "ACLED").await?;
        let json: Value = response.json().await.context("Invalid ACLED response")?;
        parse_events(&json, self.config.fatal_only)
    }

    fn no_data_record(&self, req: &ReportRequest) -> SourceRecord {
        SourceRecord::no_data(
            Provenance::ConflictEvent,
            req.end(),
            format!(
                "No recorded fatalities from political violence by ACLED for {} between {} and {}.",
                req.country.name,
                req.start(),
                req.end()
            ),
        )
    }
}

/// Convert an ACLED `read` response into records.
///
/// ACLED serializes numbers as strings, so `fatalities` is accepted in
/// either form.
pub fn parse_events(json: &Value, fatal_only: bool) -> Result<Vec<SourceRecord>> {
    if json.get("success").and_then(|s| s.as_bool()) == Some(false) {
        let message = json
            .get("error")
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        anyhow::bail!("ACLED API error: {}", message);
    }

    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid ACLED response: missing data array"))?;

    Ok(data
        .iter()
        .filter_map(|event| {
            let fatalities = fatalities(event);
            if fatal_only && fatalities == 0 {
                return None;
            }
            let date = event
                .get("event_date")
                .and_then(|d| d.as_str())
                .and_then(parse_date_prefix)?;

            let field = |key: &str| {
                event
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            };
            let title = match (field("event_type"), field("location")) {
                (Some(kind), Some(location)) => Some(format!("{} in {}", kind, location)),
                (Some(kind), None) => Some(kind.to_string()),
                (None, Some(location)) => Some(location.to_string()),
                (None, None) => None,
            };

            let mut body = field("notes").unwrap_or("").to_string();
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(&format!("Fatalities: {}", fatalities));

            SourceRecord::new(
                Provenance::ConflictEvent,
                title,
                date,
                field("source").unwrap_or(""),
                &body,
            )
        })
        .collect())
}

fn fatalities(event: &Value) -> u64 {
    match event.get("fatalities") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "status": 200,
            "success": true,
            "count": 3,
            "data": [
                {
                    "event_date": "2024-03-14",
                    "event_type": "Violence against civilians",
                    "location": "Mandera",
                    "notes": "Suspected militants attacked a bus.",
                    "fatalities": "4",
                    "source": "Daily Nation"
                },
                {
                    "event_date": "2024-03-10",
                    "event_type": "Protests",
                    "location": "Nairobi",
                    "notes": "Peaceful demonstration.",
                    "fatalities": "0"
                },
                {
                    "event_date": "2024-02-01",
                    "event_type": "Battles",
                    "fatalities": 2
                }
            ]
        })
    }

    #[test]
    fn test_parse_events_keeps_fatal_only() {
        let records = parse_events(&sample(), true).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].title.as_deref(),
            Some("Violence against civilians in Mandera")
        );
        assert_eq!(
            records[0].body,
            "Suspected militants attacked a bus.\nFatalities: 4"
        );
        assert_eq!(records[0].source, "Daily Nation");
        assert_eq!(records[1].body, "Fatalities: 2");
        assert_eq!(records[1].source, "ACLED");
    }

    #[test]
    fn test_parse_events_all() {
        assert_eq!(parse_events(&sample(), false).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_events_error() {
        let json = json!({"success": false, "error": {"status": 403, "message": "Access denied"}});
        let err = parse_events(&json, true).unwrap_err();
        assert!(err.to_string().contains("Access denied"));
    }
}
