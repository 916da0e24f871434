//! Highlight signals that look past the structural baseline.
//!
//! Signal B catches cells that break a colored panel's column color, such as
//! a selected row inside a blue file list. Signal C reads a single row as a
//! sequence of background runs and picks out the ones wedged between
//! neighbours: dialog buttons between reverse-video padding, labels in
//! function-key bars, the active tab in a tab strip.

use crate::annotate::{Candidate, Signal};
use crate::color::DEFAULT_BG;
use crate::structure::{background_runs, runs_where, CellGrid, ColumnBaseline};

/// Minimum width of each neighbouring run for a run to count as flanked.
pub const MIN_FLANK_WIDTH: usize = 3;

/// A row with at least this many runs is treated as a bar, and flank widths
/// are no longer checked.
pub const BAR_MODE_MIN_RUNS: usize = 6;

/// Signal B: runs whose background differs from a non-default column
/// baseline. Width is not checked.
pub fn disruption_candidates(grid: &CellGrid, baseline: &ColumnBaseline) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (row, cells) in grid.rows().iter().enumerate() {
        let runs = runs_where(cells, |col, cell| match baseline.at(col) {
            Some(structural) => structural != DEFAULT_BG && cell.bg != structural,
            None => false,
        });
        for run in runs {
            out.extend(Candidate::from_run(row, run, Signal::B));
        }
    }
    out
}

/// Signal C: interior runs flanked on both sides by runs of at least
/// [`MIN_FLANK_WIDTH`] columns. Once the row has [`BAR_MODE_MIN_RUNS`] runs
/// every run counts, the ones at either edge included.
pub fn alternating_candidates(grid: &CellGrid) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (row, cells) in grid.rows().iter().enumerate() {
        let runs = background_runs(cells);
        if runs.len() >= BAR_MODE_MIN_RUNS {
            out.extend(
                runs.into_iter()
                    .filter_map(|run| Candidate::from_run(row, run, Signal::C)),
            );
            continue;
        }
        for window in runs.windows(3) {
            let [left, middle, right] = window else {
                continue;
            };
            if left.width() >= MIN_FLANK_WIDTH && right.width() >= MIN_FLANK_WIDTH {
                out.extend(Candidate::from_run(row, middle.clone(), Signal::C));
            }
        }
    }
    out
}
