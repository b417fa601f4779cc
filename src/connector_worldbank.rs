//! World Bank development indicators connector.
//!
//! Queries the v2 indicator API once per configured indicator code, all
//! concurrently, and pivots the results into a single record for the
//! request's country:
//!
//! ```text
//! These are World Bank indicators for Kenya (KEN) as of 2024:
//!   - Total population: 55100586
//!   - GDP growth (annual %): 5.6 (2023)
//! ```
//!
//! Indicator publication lags by a year or more, so each line carries the
//! most recent non-null value inside the requested range and names its
//! year when that is not the end year.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Client;
use serde_json::Value;

use crate::config::{IndicatorConfig, WorldBankConfig};
use crate::http::{build_client, join_url, send_with_retry};
use crate::models::{Provenance, ReportRequest, SourceRecord};
use crate::traits::Connector;

pub struct WorldBankConnector {
    config: WorldBankConfig,
    client: Client,
    max_retries: u32,
}

impl WorldBankConnector {
    pub fn new(config: WorldBankConfig, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        Ok(Self {
            config,
            client: build_client(timeout_secs)?,
            max_retries,
        })
    }

    async fn fetch_indicator(
        &self,
        alpha3: &str,
        indicator: &IndicatorConfig,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<(i32, f64)>> {
        let url = join_url(
            &self.config.base_url,
            &format!("v2/country/{}/indicator/{}", alpha3, indicator.code),
        );
        let request = self.client.get(&url).query(&[
            ("date", format!("{}:{}", start_year, end_year)),
            ("format", "json".to_string()),
            ("per_page", "1000".to_string()),
        ]);

        let response = send_with_retry(request, self.max_retries, "World Bank").await?;
        let json: Value = response
            .json()
            .await
            .with_context(|| format!("Invalid World Bank response for {}", indicator.code))?;
        parse_indicator_rows(&json)
    }
}

#[async_trait]
impl Connector for WorldBankConnector {
    fn name(&self) -> &str {
        "worldbank"
    }

    fn provenance(&self) -> Provenance {
        Provenance::EconomicIndicator
    }

    async fn scan(&self, req: &ReportRequest) -> Result<Vec<SourceRecord>> {
        let start_year = req.start().year();
        let end_year = req.end().year();

        let fetches = self.config.indicators.iter().map(|indicator| async move {
            let result = self
                .fetch_indicator(req.country.alpha3, indicator, start_year, end_year)
                .await;
            (indicator, result)
        });

        let mut lines = Vec::new();
        for (indicator, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(rows) => {
                    if let Some(line) = indicator_line(&indicator.label, &rows, end_year) {
                        lines.push(line);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        source = "worldbank",
                        indicator = %indicator.code,
                        error = %e,
                        "indicator fetch failed, skipping"
                    );
                }
            }
        }

        if lines.is_empty() {
            return Ok(vec![]);
        }

        let body = format!(
            "These are World Bank indicators for {} ({}) as of {}:\n{}",
            req.country.name,
            req.country.alpha3,
            end_year,
            lines.join("\n")
        );
        Ok(SourceRecord::new(
            Provenance::EconomicIndicator,
            Some(format!("World Bank indicators for {}", req.country.name)),
            req.end(),
            "",
            &body,
        )
        .into_iter()
        .collect())
    }

    fn no_data_record(&self, req: &ReportRequest) -> SourceRecord {
        SourceRecord::no_data(
            Provenance::EconomicIndicator,
            req.end(),
            format!(
                "No World Bank data available for {} in {}.",
                req.country.name,
                req.end().year()
            ),
        )
    }
}

/// Extract `(year, value)` pairs from a `[meta, rows]` response, skipping
/// null values.
///
/// The API reports errors as a one-element array holding a `message`
/// object, which is surfaced as an error.
pub fn parse_indicator_rows(json: &Value) -> Result<Vec<(i32, f64)>> {
    let parts = json
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid World Bank response: expected an array"))?;

    if let Some(message) = parts
        .first()
        .and_then(|meta| meta.get("message"))
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
    {
        let text = message
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        bail!("World Bank API error: {}", text);
    }

    let Some(rows) = parts.get(1) else {
        return Ok(vec![]);
    };
    // `null` in place of the rows array means no observations.
    let Some(rows) = rows.as_array() else {
        return Ok(vec![]);
    };

    Ok(rows
        .iter()
        .filter_map(|row| {
            let value = row.get("value")?.as_f64()?;
            let year = row.get("date")?.as_str()?.trim().parse::<i32>().ok()?;
            Some((year, value))
        })
        .collect())
}

/// Render the most recent observation as a bullet line.
fn indicator_line(label: &str, rows: &[(i32, f64)], end_year: i32) -> Option<String> {
    let (year, value) = rows
        .iter()
        .filter(|(year, _)| *year <= end_year)
        .max_by_key(|(year, _)| *year)?;

    let mut line = format!("  - {}: {}", label, format_value(*value));
    if *year != end_year {
        line.push_str(&format!(" ({})", year));
    }
    Some(line)
}

/// Integers print without a fraction; everything else to two decimals.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
