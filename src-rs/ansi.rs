//! Decoding of escape-coded pane text into a grid of styled segments.
//!
//! tmux emits SGR changes only where the style changes, so a color opened on
//! one line is still active on the next. The decoder threads a [`StyleState`]
//! from row to row and only an explicit reset clears it.

use crate::color::{ansi_16, ansi_256, Rgb, DEFAULT_BG, DEFAULT_FG};
use unicode_width::UnicodeWidthChar;

const TAB_STOP: usize = 8;

/// Pending SGR attributes. `None` colors mean "terminal default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleState {
    pub fg: Option<Rgb>,
    pub bg: Option<Rgb>,
    pub bold: bool,
    pub reverse: bool,
}

/// Colors as they appear on screen once reverse video is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveStyle {
    pub fg: Option<Rgb>,
    pub bg: Rgb,
    pub bold: bool,
}

impl Default for EffectiveStyle {
    fn default() -> Self {
        StyleState::default().effective()
    }
}

impl StyleState {
    pub fn effective(self) -> EffectiveStyle {
        if self.reverse {
            EffectiveStyle {
                fg: Some(self.bg.unwrap_or(DEFAULT_BG)),
                bg: self.fg.unwrap_or(DEFAULT_FG),
                bold: self.bold,
            }
        } else {
            EffectiveStyle {
                fg: self.fg,
                bg: self.bg.unwrap_or(DEFAULT_BG),
                bold: self.bold,
            }
        }
    }

    /// Folds the parameter string of one `ESC [ ... m` sequence into the
    /// state. Codes that do not parse, or that are not handled, change
    /// nothing.
    pub fn apply_sgr(self, raw_params: &str) -> StyleState {
        let mut params = sgr_params(raw_params);
        let mut state = self;
        while let Some(param) = params.next() {
            let Some(code) = param else {
                continue;
            };
            state = match code {
                0 => StyleState::default(),
                1 => StyleState { bold: true, ..state },
                7 => StyleState { reverse: true, ..state },
                22 => StyleState { bold: false, ..state },
                27 => StyleState { reverse: false, ..state },
                30..=37 => StyleState { fg: Some(ansi_16((code - 30) as u8)), ..state },
                90..=97 => StyleState { fg: Some(ansi_16((code - 82) as u8)), ..state },
                40..=47 => StyleState { bg: Some(ansi_16((code - 40) as u8)), ..state },
                100..=107 => StyleState { bg: Some(ansi_16((code - 92) as u8)), ..state },
                38 => StyleState { fg: extended_color(&mut params).or(state.fg), ..state },
                48 => StyleState { bg: extended_color(&mut params).or(state.bg), ..state },
                39 => StyleState { fg: None, ..state },
                49 => StyleState { bg: None, ..state },
                _ => state,
            };
        }
        state
    }
}

/// Splits SGR parameters. An empty parameter means 0 (so a bare `ESC [ m`
/// is a reset); one that is not a number is `None`.
fn sgr_params(raw: &str) -> impl Iterator<Item = Option<u32>> + '_ {
    raw.split(';').map(|param| {
        if param.is_empty() {
            Some(0)
        } else {
            param.parse().ok()
        }
    })
}

/// Reads the tail of a `38`/`48` code: `5;N` or `2;R;G;B`. The sub-parameters
/// are consumed even when they are out of range, so they are never read as
/// codes of their own.
fn extended_color(params: &mut impl Iterator<Item = Option<u32>>) -> Option<Rgb> {
    fn channel(params: &mut impl Iterator<Item = Option<u32>>) -> Option<u8> {
        params.next().flatten().and_then(|value| u8::try_from(value).ok())
    }

    match params.next().flatten()? {
        5 => channel(params).map(ansi_256),
        2 => {
            let [r, g, b] = [channel(params), channel(params), channel(params)];
            Some(Rgb::new(r?, g?, b?))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub fg: Option<Rgb>,
    pub bg: Rgb,
    pub bold: bool,
    /// First display column of the segment.
    pub col: usize,
    /// Display width in cells.
    pub width: usize,
}

impl Segment {
    fn style(&self) -> EffectiveStyle {
        EffectiveStyle {
            fg: self.fg,
            bg: self.bg,
            bold: self.bold,
        }
    }
}

/// One screen cell. Wide glyphs occupy a second cell with empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub bg: Rgb,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub segments: Vec<Segment>,
}

impl Row {
    pub fn width(&self) -> usize {
        self.segments.iter().map(|seg| seg.width).sum()
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|seg| seg.text.as_str()).collect()
    }

    pub fn cells(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = Vec::with_capacity(self.width());
        for segment in &self.segments {
            for ch in segment.text.chars() {
                match ch.width().unwrap_or(0) {
                    0 => {
                        if let Some(last) = cells.iter_mut().rev().find(|c| !c.text.is_empty()) {
                            last.text.push(ch);
                        }
                    }
                    w => {
                        cells.push(Cell {
                            text: ch.to_string(),
                            bg: segment.bg,
                        });
                        for _ in 1..w {
                            cells.push(Cell {
                                text: String::new(),
                                bg: segment.bg,
                            });
                        }
                    }
                }
            }
        }
        cells
    }

    fn push_text(&mut self, text: &str, width: usize, style: EffectiveStyle) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if last.style() == style {
                last.text.push_str(text);
                last.width += width;
                return;
            }
        }
        let col = self.width();
        self.segments.push(Segment {
            text: text.to_string(),
            fg: style.fg,
            bg: style.bg,
            bold: style.bold,
            col,
            width,
        });
    }

    fn pad_to(&mut self, width: usize) {
        let current = self.width();
        if current < width {
            let fill = " ".repeat(width - current);
            self.push_text(&fill, width - current, EffectiveStyle::default());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenBuffer {
    pub rows: Vec<Row>,
    width: usize,
}

impl ScreenBuffer {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row, never less than the pane width the buffer was decoded for.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Row::width)
            .max()
            .unwrap_or(0)
            .max(self.width)
    }

    /// Extends the buffer with blank rows up to `rows`.
    pub fn pad_rows(&mut self, rows: usize) {
        while self.rows.len() < rows {
            let mut row = Row::default();
            row.pad_to(self.width);
            self.rows.push(row);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.rows.iter().map(Row::text).collect()
    }
}

/// Decodes `raw` into rows padded to `width` display columns.
pub fn decode(raw: &str, width: usize) -> ScreenBuffer {
    let mut buffer = ScreenBuffer {
        rows: Vec::new(),
        width,
    };
    if raw.is_empty() {
        return buffer;
    }

    let body = raw.strip_suffix('\n').unwrap_or(raw);
    let mut state = StyleState::default();
    for line in body.split('\n') {
        let (row, next) = decode_line(line, state, width);
        buffer.rows.push(row);
        state = next;
    }
    buffer
}

/// Decodes one line starting from `state` and returns the row together with
/// the state left pending at the end of the line.
pub fn decode_line(line: &str, state: StyleState, width: usize) -> (Row, StyleState) {
    let mut row = Row::default();
    let mut state = state;
    let mut pending = String::new();
    let mut pending_width = 0usize;
    let mut chars = line.chars().peekable();

    let flush = |row: &mut Row, pending: &mut String, pending_width: &mut usize, state: StyleState| {
        if pending.is_empty() {
            return;
        }
        let text = std::mem::take(pending);
        row.push_text(&text, *pending_width, state.effective());
        *pending_width = 0;
    };

    while let Some(character) = chars.next() {
        match character {
            '\u{1b}' => {}
            '\t' => {
                let col = row.width() + pending_width;
                let advance = TAB_STOP - (col % TAB_STOP);
                pending.push_str(&" ".repeat(advance));
                pending_width += advance;
                continue;
            }
            c if c.is_control() => continue,
            c => {
                pending.push(c);
                pending_width += c.width().unwrap_or(0);
                continue;
            }
        }

        let Some(next) = chars.next() else {
            break;
        };

        match next {
            '[' => {
                let mut params = String::new();
                let mut final_char: Option<char> = None;
                for value in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&value) {
                        final_char = Some(value);
                        break;
                    }
                    params.push(value);
                }
                let private = params.starts_with(&['?', '>', '<', '='][..]);
                if final_char == Some('m') && !private {
                    flush(&mut row, &mut pending, &mut pending_width, state);
                    state = state.apply_sgr(&params);
                }
            }
            ']' => {
                while let Some(value) = chars.next() {
                    if value == '\u{7}' {
                        break;
                    }
                    if value == '\u{1b}' && chars.next_if_eq(&'\\').is_some() {
                        break;
                    }
                }
            }
            'P' | 'X' | '^' | '_' => {
                while let Some(value) = chars.next() {
                    if value == '\u{1b}' && chars.next_if_eq(&'\\').is_some() {
                        break;
                    }
                }
            }
            '(' | ')' | '*' | '+' | '-' | '.' | '/' | '#' => {
                let _ = chars.next();
            }
            _ => {}
        }
    }

    flush(&mut row, &mut pending, &mut pending_width, state);
    row.pad_to(width);
    (row, state)
}
