//! Corpus builder.
//!
//! Orders the records returned by the connectors and renders them into one
//! text, remembering which byte span each record occupies so passages cut
//! from the text can be traced back to their sources.
//!
//! Records are ordered by source (World Bank, ACLED, ReliefWeb, Google
//! News) and newest-first within a source. Each block looks like:
//!
//! ```text
//! Title: Kenya: Floods Flash Update No. 3
//! Date: 2024-05-02
//! Source: OCHA (ReliefWeb)
//! Over 200,000 people have been displaced...
//! ```
//!
//! Blocks are separated by one blank line. Nothing is deduplicated.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::models::{Provenance, SourceRecord};

/// Separator between blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Where one record landed in the corpus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub end: usize,
    pub provenance: Provenance,
    pub no_data: bool,
}

/// The concatenated corpus for one report request.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub text: String,
    pub blocks: Vec<Block>,
}

impl Corpus {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Sources whose blocks overlap the byte span `start..end`.
    pub fn provenance_for_span(&self, start: usize, end: usize) -> BTreeSet<Provenance> {
        self.blocks
            .iter()
            .filter(|b| b.start < end && start < b.end)
            .map(|b| b.provenance)
            .collect()
    }

    /// Count of blocks per source, placeholders excluded.
    pub fn record_counts(&self) -> Vec<(Provenance, usize)> {
        Provenance::ALL
            .into_iter()
            .map(|p| {
                let n = self
                    .blocks
                    .iter()
                    .filter(|b| b.provenance == p && !b.no_data)
                    .count();
                (p, n)
            })
            .collect()
    }
}

/// Order records and render them into a [`Corpus`].
pub fn build_corpus(mut records: Vec<SourceRecord>) -> Corpus {
    // Stable: records with equal provenance and date keep fetch order.
    records.sort_by_key(|r| (r.provenance, Reverse(r.date)));

    let mut corpus = Corpus::default();
    for record in &records {
        if !corpus.text.is_empty() {
            corpus.text.push_str(BLOCK_SEPARATOR);
        }
        let start = corpus.text.len();
        render_block(record, &mut corpus.text);
        corpus.blocks.push(Block {
            start,
            end: corpus.text.len(),
            provenance: record.provenance,
            no_data: record.no_data,
        });
    }
    corpus
}

fn render_block(record: &SourceRecord, out: &mut String) {
    if let Some(title) = &record.title {
        out.push_str("Title: ");
        out.push_str(title);
        out.push('\n');
    }
    out.push_str(&format!("Date: {}\n", record.date.format("%Y-%m-%d")));

    let label = record.provenance.label();
    if record.source == label {
        out.push_str(&format!("Source: {}\n", label));
    } else {
        out.push_str(&format!("Source: {} ({})\n", record.source, label));
    }
    out.push_str(&record.body);
}
