//! Candidate merging and the full screen-to-annotations pipeline.

use crate::ansi::{decode, ScreenBuffer};
use crate::color::{classify, ColorLabel};
use crate::highlight::{alternating_candidates, disruption_candidates};
use crate::structure::{colored_candidates, CellGrid, ColumnBaseline, Run};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Which detector produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Signal {
    /// Colored run on plain chrome.
    A,
    /// Break in a colored panel's column color.
    B,
    /// Flanked run in an alternating row.
    C,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub row: usize,
    pub col_start: usize,
    pub col_end: usize,
    pub text: String,
    pub label: ColorLabel,
    pub signal: Signal,
}

impl Candidate {
    /// Builds a candidate from a run; blank runs give nothing to target and
    /// are skipped.
    pub fn from_run(row: usize, run: Run, signal: Signal) -> Option<Candidate> {
        if run.text.trim().is_empty() {
            return None;
        }
        Some(Candidate {
            row,
            col_start: run.col_start,
            col_end: run.col_end,
            label: classify(run.bg),
            text: run.text,
            signal,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// 0-based screen row.
    pub row: usize,
    /// 0-based column of the leftmost merged span.
    pub col: usize,
    pub text: String,
    pub label: ColorLabel,
}

/// Joins one signal's spans on a row into a single text. Touching spans are
/// concatenated; gaps become `", "`.
pub fn join_spans(spans: &[Candidate]) -> String {
    let mut ordered: Vec<&Candidate> = spans.iter().collect();
    ordered.sort_by_key(|c| (c.col_start, c.col_end));
    ordered.dedup_by_key(|c| (c.col_start, c.col_end));

    let mut text = String::new();
    let mut prev_end: Option<usize> = None;
    for span in ordered {
        match prev_end {
            Some(end) if end == span.col_start => text.push_str(&span.text),
            Some(_) => {
                let kept = text.trim_end().len();
                text.truncate(kept);
                text.push_str(", ");
                text.push_str(span.text.trim_start());
            }
            None => text.push_str(&span.text),
        }
        prev_end = Some(span.col_end);
    }
    text.trim().to_string()
}

/// Folds candidates into at most one annotation per `(row, label)`.
///
/// Spans are first joined per signal, then the signals compete and the
/// longest text wins; on equal length the earlier signal is kept.
pub fn merge(candidates: Vec<Candidate>) -> Vec<Annotation> {
    let mut buckets: BTreeMap<(usize, ColorLabel, Signal), Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        buckets
            .entry((candidate.row, candidate.label.clone(), candidate.signal))
            .or_default()
            .push(candidate);
    }

    let mut winners: BTreeMap<(usize, ColorLabel), Annotation> = BTreeMap::new();
    for ((row, label, signal), spans) in buckets {
        let col = spans.iter().map(|c| c.col_start).min().unwrap_or(0);
        let text = join_spans(&spans);
        trace!(row, label = %label, ?signal, %text, "joined candidate spans");

        let key = (row, label.clone());
        let replace = match winners.get(&key) {
            Some(current) => text.chars().count() > current.text.chars().count(),
            None => true,
        };
        if replace {
            winners.insert(key, Annotation { row, col, text, label });
        }
    }

    let mut out: Vec<Annotation> = winners.into_values().collect();
    out.sort_by_key(|a| (a.row, a.col));
    out
}

/// Keeps only annotations whose row is at or after `first_row`.
pub fn retain_from_row(annotations: &mut Vec<Annotation>, first_row: usize) {
    annotations.retain(|a| a.row >= first_row);
}

/// Runs every signal over `buffer` and merges the results.
pub fn annotate(buffer: &ScreenBuffer) -> Vec<Annotation> {
    let grid = CellGrid::from_buffer(buffer);
    if grid.is_uniform() {
        debug!(rows = buffer.len(), "uniform background; no highlights");
        return Vec::new();
    }

    let baseline = ColumnBaseline::compute(&grid);
    let mut candidates = colored_candidates(&grid, &baseline);
    let signal_a = candidates.len();
    candidates.extend(disruption_candidates(&grid, &baseline));
    let signal_b = candidates.len() - signal_a;
    candidates.extend(alternating_candidates(&grid));
    let signal_c = candidates.len() - signal_a - signal_b;

    let annotations = merge(candidates);
    debug!(
        signal_a,
        signal_b,
        signal_c,
        annotations = annotations.len(),
        "annotated screen"
    );
    annotations
}

/// Decodes `raw` at `width` columns and annotates the result.
pub fn annotate_text(raw: &str, width: usize) -> (ScreenBuffer, Vec<Annotation>) {
    let buffer = decode(raw, width);
    let annotations = annotate(&buffer);
    (buffer, annotations)
}
