//! Render finished reports for output.
//!
//! Two formats: Markdown for people (the CLI default) and pretty JSON for
//! machines. Both include the request metadata from [`ReportDocument`].

use anyhow::Result;
use std::path::Path;

use crate::models::{Report, ReportDocument};

/// Output format for the `report` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Markdown,
    Json,
}

/// Render a report as Markdown.
///
/// Empty sections are rendered as [`Report::NO_DATA`] rather than omitted,
/// so readers can tell "nothing to report" from a missing section.
pub fn render_markdown(doc: &ReportDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Situation report: {}\n\n", doc.country));
    out.push_str(&format!(
        "_Period: {} to {} · Generated: {}_\n\n",
        doc.start_date,
        doc.end_date,
        doc.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    let report = &doc.report;
    out.push_str("## Executive Summary\n\n");
    if report.summary.is_empty() {
        out.push_str(Report::NO_DATA);
    } else {
        out.push_str(&report.summary);
    }
    out.push_str("\n\n");

    push_list(&mut out, "Key Events", &report.key_events);
    push_list(&mut out, "Trends", &report.trends);
    push_list(&mut out, "Risks", &report.risks);

    out.push_str("## Sources\n\n");
    if report.sources.is_empty() {
        out.push_str(Report::NO_DATA);
        out.push('\n');
    } else {
        for source in &report.sources {
            out.push_str(&format!("- {}\n", source));
        }
    }
    out
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    out.push_str(&format!("## {}\n\n", heading));
    if items.is_empty() {
        out.push_str(Report::NO_DATA);
        out.push('\n');
    } else {
        for item in items {
            out.push_str(&format!("- {}\n", item));
        }
    }
    out.push('\n');
}

/// Render a report as pretty-printed JSON.
pub fn render_json(doc: &ReportDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

pub fn render(doc: &ReportDocument, format: Format) -> Result<String> {
    match format {
        Format::Markdown => Ok(render_markdown(doc)),
        Format::Json => render_json(doc),
    }
}

/// Write rendered output to `path`, creating parent directories.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, Provenance};
    use chrono::NaiveDate;

    fn doc(report: Report) -> ReportDocument {
        ReportDocument::new(
            "Kenya",
            DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            ),
            report,
        )
    }

    #[test]
    fn test_markdown_sections() {
        let report = Report {
            summary: "Floods (ReliefWeb).".to_string(),
            key_events: vec!["200,000 displaced (ReliefWeb).".to_string()],
            sources: [Provenance::SituationReport].into_iter().collect(),
            ..Default::default()
        };
        let md = render_markdown(&doc(report));
        assert!(md.starts_with("# Situation report: Kenya\n"));
        assert!(md.contains("2024-01-01 to 2024-06-30"));
        assert!(md.contains("## Executive Summary\n\nFloods (ReliefWeb).\n"));
        assert!(md.contains("## Key Events\n\n- 200,000 displaced (ReliefWeb).\n"));
        assert!(md.contains(&format!("## Trends\n\n{}\n", Report::NO_DATA)));
        assert!(md.contains("## Sources\n\n- ReliefWeb\n"));
    }

    #[test]
    fn test_empty_report_renders_no_data_everywhere() {
        let md = render_markdown(&doc(Report::default()));
        assert_eq!(md.matches(Report::NO_DATA).count(), 5);
    }

    #[test]
    fn test_json_flattens_report() {
        let json = render_json(&doc(Report {
            risks: vec!["Drought (World Bank)".to_string()],
            sources: [Provenance::EconomicIndicator].into_iter().collect(),
            ..Default::default()
        }))
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["country"], "Kenya");
        assert_eq!(value["start_date"], "2024-01-01");
        assert_eq!(value["risks"][0], "Drought (World Bank)");
        assert_eq!(value["sources"][0], "World Bank");
        assert!(value["report_id"].is_string());
    }

    #[test]
    fn test_write_output_creates_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out/kenya.md");
        write_output(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
