//! Prompt assembly.
//!
//! The system turn fixes the analyst role, the grounding rules, the
//! citation vocabulary, and the four-section output layout that
//! [`parse_report`](crate::parse::parse_report) expects. The user turn
//! carries the retrieved passages.

use crate::models::Provenance;
use crate::retrieval::RetrievalResult;

/// Section headers, in the order the model is asked to emit them.
pub const SUMMARY_HEADER: &str = "**Executive Summary**";
pub const KEY_EVENTS_HEADER: &str = "**Key Events**";
pub const TRENDS_HEADER: &str = "**Trends**";
pub const RISKS_HEADER: &str = "**Risks**";

/// A two-turn chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the system instruction for reports written in `language`.
pub fn system_instruction(language: &str) -> String {
    let citations: String = Provenance::ALL
        .iter()
        .map(|p| format!("   - {}\n", p.citation_tag()))
        .collect();

    format!(
        "You are a humanitarian data analyst preparing a country situation report for an NGO.\n\
         \n\
         TASK:\n\
         Read the socioeconomic and humanitarian data supplied by the user and write a \
         short, structured analysis.\n\
         \n\
         RULES:\n\
         1. Base every statement only on the supplied data. Do not guess or fill gaps.\n\
         2. Leave out any NaN, null, or missing values entirely.\n\
         3. Cover only the country named in the data.\n\
         4. Give no recommendations, opinions, or projections.\n\
         5. Write the whole report in {language}.\n\
         6. Cite inline after each fact using exactly one of these tags:\n\
         {citations}\
         \x20  Never cite any other source.\n\
         7. Keep a formal, analytical tone.\n\
         8. State each fact once; do not repeat information.\n\
         \n\
         OUTPUT FORMAT (use these headers verbatim):\n\
         {SUMMARY_HEADER}\n\
         One or two paragraphs on the overall humanitarian and socioeconomic situation.\n\
         \n\
         {KEY_EVENTS_HEADER}\n\
         - Four to six major developments (conflict, displacement, disasters, economic \
         shifts, disease), one per bullet, each with a citation.\n\
         \n\
         {TRENDS_HEADER}\n\
         - Observable trends in population, economy, displacement, and aid response, one \
         per bullet, each with a citation.\n\
         \n\
         {RISKS_HEADER}\n\
         - Ongoing or emerging humanitarian risks supported by the data, one per bullet, \
         each with a citation.\n"
    )
}

/// Pair the system instruction with the retrieved passages.
///
/// The user turn is `"Relevant data about {country}:"` followed by the
/// passages in selection order, separated by blank lines.
pub fn assemble(country: &str, retrieved: &RetrievalResult, language: &str) -> Prompt {
    let context = retrieved
        .passages
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    Prompt {
        system: system_instruction(language),
        user: format!("Relevant data about {}:\n\n{}", country, context),
    }
}
