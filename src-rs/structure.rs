//! Structural baseline of a screen: the background each column shows in most
//! rows. Backgrounds that match the baseline are panel chrome, not highlights.

use crate::annotate::{Candidate, Signal};
use crate::ansi::{Cell, Row, ScreenBuffer};
use crate::color::{Rgb, DEFAULT_BG};

/// Row-major cell view of a [`ScreenBuffer`], one entry per display column.
#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl CellGrid {
    pub fn from_buffer(buffer: &ScreenBuffer) -> Self {
        let rows: Vec<Vec<Cell>> = buffer.rows.iter().map(Row::cells).collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// True when every cell on screen shares one background.
    pub fn is_uniform(&self) -> bool {
        let mut cells = self.rows.iter().flatten();
        match cells.next() {
            Some(first) => cells.all(|cell| cell.bg == first.bg),
            None => true,
        }
    }
}

/// A maximal stretch of cells on one row, `col_start..col_end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub col_start: usize,
    pub col_end: usize,
    pub bg: Rgb,
    pub text: String,
}

impl Run {
    pub fn width(&self) -> usize {
        self.col_end - self.col_start
    }
}

/// Splits a row into maximal same-background runs.
pub fn background_runs(cells: &[Cell]) -> Vec<Run> {
    runs_where(cells, |_, _| true)
}

/// Maximal same-background runs made only of cells accepted by `keep`.
pub fn runs_where(cells: &[Cell], keep: impl Fn(usize, &Cell) -> bool) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut current: Option<Run> = None;

    for (col, cell) in cells.iter().enumerate() {
        if !keep(col, cell) {
            runs.extend(current.take());
            continue;
        }
        match current.as_mut() {
            Some(run) if run.bg == cell.bg => {
                run.text.push_str(&cell.text);
                run.col_end = col + 1;
            }
            _ => {
                runs.extend(current.take());
                current = Some(Run {
                    col_start: col,
                    col_end: col + 1,
                    bg: cell.bg,
                    text: cell.text.clone(),
                });
            }
        }
    }
    runs.extend(current);
    runs
}

/// Dominant background per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnBaseline {
    columns: Vec<Option<Rgb>>,
}

impl ColumnBaseline {
    /// Counts backgrounds column by column; ties go to the color met first
    /// going down the screen.
    pub fn compute(grid: &CellGrid) -> Self {
        let mut columns = Vec::with_capacity(grid.width());
        for col in 0..grid.width() {
            let mut tally: Vec<(Rgb, usize)> = Vec::new();
            for row in grid.rows() {
                let Some(cell) = row.get(col) else {
                    continue;
                };
                match tally.iter_mut().find(|(bg, _)| *bg == cell.bg) {
                    Some((_, count)) => *count += 1,
                    None => tally.push((cell.bg, 1)),
                }
            }
            let mut best: Option<(Rgb, usize)> = None;
            for (bg, count) in tally {
                if best.map_or(true, |(_, top)| count > top) {
                    best = Some((bg, count));
                }
            }
            columns.push(best.map(|(bg, _)| bg));
        }
        Self { columns }
    }

    pub fn at(&self, col: usize) -> Option<Rgb> {
        self.columns.get(col).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether `bg` is the baseline of any column in `col_start..col_end`.
    pub fn is_structural(&self, bg: Rgb, col_start: usize, col_end: usize) -> bool {
        (col_start..col_end).any(|col| self.at(col) == Some(bg))
    }
}

/// Signal A: colored runs sitting on plain chrome. A run qualifies when its
/// background is not the terminal default and is the baseline of none of
/// its columns.
pub fn colored_candidates(grid: &CellGrid, baseline: &ColumnBaseline) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (row, cells) in grid.rows().iter().enumerate() {
        for run in background_runs(cells) {
            if run.bg == DEFAULT_BG || baseline.is_structural(run.bg, run.col_start, run.col_end) {
                continue;
            }
            out.extend(Candidate::from_run(row, run, Signal::A));
        }
    }
    out
}
