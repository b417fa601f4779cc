//! Overlapping boundary-aware text chunker.
//!
//! Splits the corpus into [`Passage`]s of at most `max_chars` bytes. Each
//! passage is an exact slice of the corpus and ends at the best break
//! inside its window, in order of preference:
//!
//! 1. paragraph break (`\n\n`)
//! 2. line break (`\n`)
//! 3. sentence end (`. `, `! `, `? `)
//! 4. space
//! 5. hard cut on a UTF-8 character boundary
//!
//! Consecutive passages overlap by up to `overlap_chars` bytes so a fact
//! that straddles a break survives in at least one passage. Dropping each
//! passage's overlap prefix and concatenating the rest reproduces the
//! corpus exactly.

use crate::corpus::Corpus;
use crate::models::Passage;

/// Split a corpus into passages, tagging each with the sources it overlaps.
pub fn chunk_corpus(corpus: &Corpus, max_chars: usize, overlap_chars: usize) -> Vec<Passage> {
    split_spans(&corpus.text, max_chars, overlap_chars)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Passage {
            index,
            start,
            end,
            text: corpus.text[start..end].to_string(),
            provenance: corpus.provenance_for_span(start, end),
            embedding: None,
        })
        .collect()
}

/// Compute passage byte spans over `text`.
///
/// Returns an empty list for empty input. A window narrower than one
/// character still advances by that character, so callers keep
/// `max_chars` at or above
/// [`MIN_CHUNK_CHARS`](crate::config::MIN_CHUNK_CHARS) for the size bound to hold.
pub fn split_spans(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<(usize, usize)> {
    let len = text.len();
    let mut spans = Vec::new();
    if len == 0 || max_chars == 0 {
        return spans;
    }

    let mut start = 0;
    let mut prev_end = 0;
    loop {
        let mut window_end = floor_char_boundary(text, (start + max_chars).min(len));
        if window_end <= start {
            window_end = ceil_char_boundary(text, start + 1);
        }

        let end = if window_end == len {
            len
        } else {
            // Only breaks past the previous passage make progress.
            let lo = prev_end.max(start);
            if lo < window_end {
                find_break(&text[lo..window_end])
                    .map(|p| lo + p)
                    .unwrap_or(window_end)
            } else {
                window_end
            }
        };

        spans.push((start, end));
        if end >= len {
            break;
        }

        let mut next = ceil_char_boundary(text, end.saturating_sub(overlap_chars));
        if next <= start {
            next = end;
        }
        prev_end = end;
        start = next;
    }

    spans
}

/// Byte offset just past the preferred break in `window`, if any.
fn find_break(window: &str) -> Option<usize> {
    if let Some(p) = window.rfind("\n\n") {
        return Some(p + 2);
    }
    if let Some(p) = window.rfind('\n') {
        return Some(p + 1);
    }
    let sentence_end = [". ", "! ", "? "]
        .iter()
        .filter_map(|pat| window.rfind(pat))
        .max();
    if let Some(p) = sentence_end {
        return Some(p + 2);
    }
    window.rfind(' ').map(|p| p + 1)
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::build_corpus;
    use crate::models::{Provenance, SourceRecord};
    use chrono::NaiveDate;

    /// Rebuild the input from each span's non-overlapping suffix.
    fn reconstruct(text: &str, spans: &[(usize, usize)]) -> String {
        let mut out = String::new();
        let mut prev_end = 0;
        for &(start, end) in spans {
            out.push_str(&text[prev_end.max(start)..end]);
            prev_end = prev_end.max(end);
        }
        out
    }

    fn check_invariants(text: &str, max: usize, overlap: usize) {
        let spans = split_spans(text, max, overlap);
        assert_eq!(reconstruct(text, &spans), text);
        for w in spans.windows(2) {
            assert!(w[1].0 > w[0].0, "starts must increase");
            assert!(w[1].0 <= w[0].1, "no gaps between passages");
            assert!(w[0].1 - w[1].0 <= overlap, "overlap bounded");
        }
        for &(start, end) in &spans {
            assert!(end > start);
            assert!(end - start <= max);
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(split_spans("", 100, 10).is_empty());
    }

    #[test]
    fn test_small_text_single_passage() {
        assert_eq!(split_spans("Hello, world!", 100, 10), vec![(0, 13)]);
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = "First paragraph. It has two sentences.\n\nSecond paragraph is here.";
        let spans = split_spans(text, 50, 0);
        assert_eq!(&text[spans[0].0..spans[0].1], "First paragraph. It has two sentences.\n\n");
    }

    #[test]
    fn test_falls_back_to_sentence_then_space() {
        let text = "One two three. Four five six seven eight nine";
        let spans = split_spans(text, 20, 0);
        assert_eq!(&text[spans[0].0..spans[0].1], "One two three. ");

        let text = "alpha beta gamma delta epsilon";
        let spans = split_spans(text, 12, 0);
        assert_eq!(&text[spans[0].0..spans[0].1], "alpha beta ");
    }

    #[test]
    fn test_hard_cut_without_breaks() {
        let text = "x".repeat(250);
        let spans = split_spans(&text, 100, 10);
        assert_eq!(spans[0], (0, 100));
        assert_eq!(spans[1].0, 90);
        check_invariants(&text, 100, 10);
    }

    #[test]
    fn test_multibyte_text_cut_on_char_boundary() {
        let text = "é".repeat(301);
        check_invariants(&text, 99, 7);
        let text = "日本語のテキスト".repeat(40);
        check_invariants(&text, 64, 16);
    }

    #[test]
    fn test_smallest_window_holds_four_byte_chars() {
        let text = "🌍a🌍 b🌍🌍.".repeat(12);
        for max in 4..=9 {
            check_invariants(&text, max, 0);
            check_invariants(&text, max, 3);
        }
    }

    #[test]
    fn test_invariants_on_mixed_text() {
        let mut text = String::new();
        for i in 0..60 {
            text.push_str(&format!(
                "Report {} says floods displaced {} people. Aid is arriving!\n",
                i,
                i * 100
            ));
            if i % 7 == 0 {
                text.push('\n');
            }
        }
        check_invariants(&text, 1000, 100);
        check_invariants(&text, 120, 30);
        check_invariants(&text, 10, 9);
    }

    #[test]
    fn test_chunk_corpus_tags_provenance() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let records = vec![
            SourceRecord::new(Provenance::EconomicIndicator, None, date, "", &"GDP ".repeat(50))
                .unwrap(),
            SourceRecord::new(Provenance::NewsArticle, None, date, "BBC", &"news ".repeat(50))
                .unwrap(),
        ];
        let corpus = build_corpus(records);
        let passages = chunk_corpus(&corpus, 120, 20);

        assert!(passages.len() > 2);
        assert!(passages
            .first()
            .unwrap()
            .provenance
            .contains(&Provenance::EconomicIndicator));
        assert!(passages
            .last()
            .unwrap()
            .provenance
            .contains(&Provenance::NewsArticle));
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.index, i);
            assert_eq!(p.text, &corpus.text[p.start..p.end]);
        }
    }
}
