//! Core data models used throughout the report pipeline.
//!
//! These types represent the records, passages, and reports that flow
//! through the fetch → chunk → retrieve → generate pipeline. All of them
//! live for a single report request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::country::Country;

/// The external data source a record came from.
///
/// Declaration order is the corpus order: economic indicators first, then
/// conflict events, situation reports, and news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "World Bank")]
    EconomicIndicator,
    #[serde(rename = "ACLED")]
    ConflictEvent,
    #[serde(rename = "ReliefWeb")]
    SituationReport,
    #[serde(rename = "Google News")]
    NewsArticle,
}

impl Provenance {
    /// All provenances in corpus order.
    pub const ALL: [Provenance; 4] = [
        Provenance::EconomicIndicator,
        Provenance::ConflictEvent,
        Provenance::SituationReport,
        Provenance::NewsArticle,
    ];

    /// The citation label the model is allowed to use for this source.
    pub fn label(self) -> &'static str {
        match self {
            Provenance::EconomicIndicator => "World Bank",
            Provenance::ConflictEvent => "ACLED",
            Provenance::SituationReport => "ReliefWeb",
            Provenance::NewsArticle => "Google News",
        }
    }

    /// The inline citation tag, e.g. `(ReliefWeb)`.
    pub fn citation_tag(self) -> String {
        format!("({})", self.label())
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized unit produced by a source connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub date: NaiveDate,
    /// Publisher label (e.g. `"OCHA, UNHCR"`); the provenance label when
    /// the upstream does not name one.
    pub source: String,
    pub body: String,
    pub provenance: Provenance,
    /// True for the explicit "no data available" placeholder.
    pub no_data: bool,
}

impl SourceRecord {
    /// Build a record, returning `None` when the body is empty after trimming.
    pub fn new(
        provenance: Provenance,
        title: Option<String>,
        date: NaiveDate,
        source: impl Into<String>,
        body: &str,
    ) -> Option<Self> {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let source = source.into();
        let source = if source.trim().is_empty() {
            provenance.label().to_string()
        } else {
            source.trim().to_string()
        };
        Some(Self {
            title,
            date,
            source,
            body: body.to_string(),
            provenance,
            no_data: false,
        })
    }

    /// Build the sentinel record that stands in for a source with no data.
    pub fn no_data(provenance: Provenance, date: NaiveDate, statement: impl Into<String>) -> Self {
        Self {
            title: None,
            date,
            source: provenance.label().to_string(),
            body: statement.into(),
            provenance,
            no_data: true,
        }
    }
}

/// Inclusive calendar date window for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_date <= self.end_date
    }
}

/// A resolved report request handed to every connector.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest {
    pub country: Country,
    pub range: DateRange,
}

impl ReportRequest {
    pub fn start(&self) -> NaiveDate {
        self.range.start_date
    }

    pub fn end(&self) -> NaiveDate {
        self.range.end_date
    }
}

/// A bounded span of corpus text used as the retrieval unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub index: usize,
    /// Byte offset of the first character in the corpus text.
    pub start: usize,
    /// Byte offset one past the last character in the corpus text.
    pub end: usize,
    pub text: String,
    /// Sources whose blocks this span overlaps. Traceability only.
    pub provenance: BTreeSet<Provenance>,
    pub embedding: Option<Vec<f32>>,
}

/// The structured report produced by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: String,
    pub key_events: Vec<String>,
    pub trends: Vec<String>,
    pub risks: Vec<String>,
    /// Sources whose citation tag appears in the generated text.
    pub sources: BTreeSet<Provenance>,
}

impl Report {
    /// Rendered in place of a section that has no supported content.
    pub const NO_DATA: &'static str = "No data available.";

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.key_events.is_empty()
            && self.trends.is_empty()
            && self.risks.is_empty()
    }

    /// List items that carry none of the recognized citation tags.
    pub fn uncited_items(&self) -> Vec<&str> {
        self.key_events
            .iter()
            .chain(self.trends.iter())
            .chain(self.risks.iter())
            .filter(|item| cited_sources(item).is_empty())
            .map(String::as_str)
            .collect()
    }
}

/// Provenances whose citation tag appears in `text`.
pub fn cited_sources(text: &str) -> BTreeSet<Provenance> {
    Provenance::ALL
        .into_iter()
        .filter(|p| text.contains(&p.citation_tag()))
        .collect()
}

/// Parse the `YYYY-MM-DD` prefix of an ISO-8601 timestamp.
pub fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let prefix = s.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// A finished report plus request metadata, as returned by the CLI and HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub report_id: uuid::Uuid,
    pub country: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: Report,
}

impl ReportDocument {
    pub fn new(country: &str, range: DateRange, report: Report) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4(),
            country: country.to_string(),
            start_date: range.start_date,
            end_date: range.end_date,
            generated_at: Utc::now(),
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_record_with_blank_body_is_dropped() {
        let rec = SourceRecord::new(
            Provenance::NewsArticle,
            Some("Title".to_string()),
            date("2024-01-01"),
            "Daily Nation",
            "   \n  ",
        );
        assert!(rec.is_none());
    }

    #[test]
    fn test_record_falls_back_to_provenance_label() {
        let rec = SourceRecord::new(
            Provenance::SituationReport,
            Some("  ".to_string()),
            date("2024-01-01"),
            "",
            "Flooding in the north.",
        )
        .unwrap();
        assert_eq!(rec.source, "ReliefWeb");
        assert_eq!(rec.title, None);
        assert!(!rec.no_data);
    }

    #[test]
    fn test_provenance_order_is_corpus_order() {
        let mut all = vec![
            Provenance::NewsArticle,
            Provenance::SituationReport,
            Provenance::EconomicIndicator,
            Provenance::ConflictEvent,
        ];
        all.sort();
        assert_eq!(all, Provenance::ALL.to_vec());
    }

    #[test]
    fn test_provenance_serializes_as_label() {
        let json = serde_json::to_string(&Provenance::NewsArticle).unwrap();
        assert_eq!(json, "\"Google News\"");
    }

    #[test]
    fn test_uncited_items() {
        let report = Report {
            key_events: vec![
                "Floods displaced 10,000 people (ReliefWeb).".to_string(),
                "Something happened.".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(report.uncited_items(), vec!["Something happened."]);
    }

    #[test]
    fn test_parse_date_prefix() {
        assert_eq!(parse_date_prefix("2024-03-01T10:00:00Z"), Some(date("2024-03-01")));
        assert_eq!(parse_date_prefix("2024-03-01"), Some(date("2024-03-01")));
        assert_eq!(parse_date_prefix("March 1"), None);
    }

    #[test]
    fn test_date_range_validity() {
        assert!(DateRange::new(date("2024-01-01"), date("2024-01-01")).is_valid());
        assert!(!DateRange::new(date("2024-02-01"), date("2024-01-01")).is_valid());
    }
}
