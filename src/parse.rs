//! Best-effort parser from model output to a [`Report`].
//!
//! The model is asked for four bold-headed sections but nothing enforces
//! it, so parsing never fails: lines that do not fit the expected shape
//! are dropped, and output without any header yields an empty report.
//!
//! Rules, applied to each trimmed non-blank line:
//! - a line containing a section header switches to that section,
//!   whatever the order;
//! - in the summary, lines not starting with `**` are joined with spaces;
//! - in list sections, only bullet lines (`-`, `*`, `•`) are kept, with the
//!   marker stripped.

use crate::models::{cited_sources, Report};
use crate::prompt::{KEY_EVENTS_HEADER, RISKS_HEADER, SUMMARY_HEADER, TRENDS_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Unset,
    Summary,
    KeyEvents,
    Trends,
    Risks,
}

fn header_section(line: &str) -> Option<Section> {
    if line.contains(SUMMARY_HEADER) {
        Some(Section::Summary)
    } else if line.contains(KEY_EVENTS_HEADER) {
        Some(Section::KeyEvents)
    } else if line.contains(TRENDS_HEADER) {
        Some(Section::Trends)
    } else if line.contains(RISKS_HEADER) {
        Some(Section::Risks)
    } else {
        None
    }
}

/// Strip a leading bullet marker, returning the item text.
fn bullet_item(line: &str) -> Option<&str> {
    let rest = if let Some(rest) = line.strip_prefix('-') {
        rest
    } else if line.starts_with("**") {
        return None;
    } else if let Some(rest) = line.strip_prefix('*') {
        rest
    } else {
        line.strip_prefix('•')?
    };
    Some(rest.trim())
}

/// Parse generated text into a [`Report`].
///
/// ```rust
/// use ngo_report::parse::parse_report;
///
/// let report = parse_report(
///     "**Executive Summary**\nFloods hit the north (ReliefWeb).\n\n**Risks**\n- Cholera (ReliefWeb)",
/// );
/// assert_eq!(report.summary, "Floods hit the north (ReliefWeb).");
/// assert_eq!(report.risks, vec!["Cholera (ReliefWeb)"]);
/// ```
pub fn parse_report(text: &str) -> Report {
    let mut report = Report::default();
    let mut summary_lines: Vec<&str> = Vec::new();
    let mut section = Section::Unset;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(next) = header_section(line) {
            section = next;
            continue;
        }

        match section {
            Section::Unset => {}
            Section::Summary => {
                if !line.starts_with("**") {
                    summary_lines.push(line);
                }
            }
            Section::KeyEvents | Section::Trends | Section::Risks => {
                let Some(item) = bullet_item(line) else {
                    continue;
                };
                if item.is_empty() {
                    continue;
                }
                let target = match section {
                    Section::KeyEvents => &mut report.key_events,
                    Section::Trends => &mut report.trends,
                    _ => &mut report.risks,
                };
                target.push(item.to_string());
            }
        }
    }

    report.summary = summary_lines.join(" ");

    let mut cited = cited_sources(&report.summary);
    for item in report
        .key_events
        .iter()
        .chain(&report.trends)
        .chain(&report.risks)
    {
        cited.extend(cited_sources(item));
    }
    report.sources = cited;

    report
}
