//! Text and JSON output for a captured screen.
//!
//! ```text
//!   1│ $ ls                      (prefix only with line numbers)
//!
//! Annotations:
//! Cursor: 3,1
//! Bell: yes (cleared)
//! Screen: alternate
//!  12│ HIGHLIGHTED [bg:green]
//! ```

use crate::annotate::{annotate, retain_from_row, Annotation};
use crate::ansi::ScreenBuffer;
use chrono::Utc;
use serde::Serialize;

pub const ROW_DELIMITER: &str = "│";

/// Pane metadata reported alongside the screen. Cursor is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PaneMeta {
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub bell: bool,
    pub alternate_screen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub annotate: bool,
    pub line_numbers: bool,
    pub tail: Option<usize>,
    pub trim: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            annotate: false,
            line_numbers: false,
            tail: None,
            trim: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberedLine {
    /// 1-based screen row.
    pub row: usize,
    pub text: String,
}

/// The visible part of a capture, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenCapture {
    pub lines: Vec<NumberedLine>,
    pub meta: PaneMeta,
    pub annotations: Option<Vec<Annotation>>,
    pub line_numbers: bool,
}

pub fn row_prefix(row: usize) -> String {
    format!("{row:>3}{ROW_DELIMITER} ")
}

impl ScreenCapture {
    pub fn build(buffer: &ScreenBuffer, meta: PaneMeta, options: &RenderOptions) -> Self {
        let mut lines = buffer.lines();
        if options.trim {
            for line in lines.iter_mut() {
                let kept = line.trim_end().len();
                line.truncate(kept);
            }
            while lines.last().is_some_and(|line| line.is_empty()) {
                lines.pop();
            }
        }

        let first_row = options
            .tail
            .map(|n| lines.len().saturating_sub(n))
            .unwrap_or(0);

        let annotations = options.annotate.then(|| {
            let mut found = annotate(buffer);
            retain_from_row(&mut found, first_row);
            found.retain(|a| a.row < lines.len());
            found
        });

        let lines = lines
            .into_iter()
            .enumerate()
            .skip(first_row)
            .map(|(idx, text)| NumberedLine { row: idx + 1, text })
            .collect();

        Self {
            lines,
            meta,
            annotations,
            line_numbers: options.line_numbers,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            if self.line_numbers {
                out.push_str(&row_prefix(line.row));
            }
            out.push_str(&line.text);
            out.push('\n');
        }

        let Some(annotations) = &self.annotations else {
            return out;
        };

        out.push('\n');
        out.push_str("Annotations:\n");
        out.push_str(&format!(
            "Cursor: {},{}\n",
            self.meta.cursor_row, self.meta.cursor_col
        ));
        if self.meta.bell {
            out.push_str("Bell: yes (cleared)\n");
        }
        if self.meta.alternate_screen {
            out.push_str("Screen: alternate\n");
        }
        for annotation in annotations {
            out.push_str(&format!(
                "{}{} [bg:{}]\n",
                row_prefix(annotation.row + 1),
                annotation.text,
                annotation.label
            ));
        }
        out
    }

    pub fn to_report(&self, session: Option<&str>) -> CaptureReport {
        CaptureReport {
            captured_at: Utc::now().to_rfc3339(),
            session: session.map(ToString::to_string),
            cursor: CursorPosition {
                row: self.meta.cursor_row,
                col: self.meta.cursor_col,
            },
            bell: self.meta.bell,
            alternate_screen: self.meta.alternate_screen,
            lines: self.lines.clone(),
            annotations: self.annotations.as_ref().map(|found| {
                found
                    .iter()
                    .map(|a| AnnotationEntry {
                        row: a.row + 1,
                        col: a.col + 1,
                        text: a.text.clone(),
                        label: a.label.to_string(),
                    })
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CursorPosition {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationEntry {
    pub row: usize,
    pub col: usize,
    pub text: String,
    pub label: String,
}

/// JSON form of a capture. Rows and columns are 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub captured_at: String,
    pub session: Option<String>,
    pub cursor: CursorPosition,
    pub bell: bool,
    pub alternate_screen: bool,
    pub lines: Vec<NumberedLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<AnnotationEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::decode;

    fn screen(rows: usize, highlight_at: usize, width: usize) -> ScreenBuffer {
        let mut raw = String::new();
        for row in 0..rows {
            if row == highlight_at {
                raw.push_str("\x1b[42m  MARK  \x1b[0m\n");
            } else {
                raw.push_str(&format!("line{row}\n"));
            }
        }
        let mut buffer = decode(&raw, width);
        buffer.pad_rows(rows + 4);
        buffer
    }

    fn meta() -> PaneMeta {
        PaneMeta {
            cursor_row: 21,
            cursor_col: 1,
            bell: false,
            alternate_screen: false,
        }
    }

    #[test]
    fn plain_output_has_no_annotation_block() {
        let capture = ScreenCapture::build(&screen(3, 99, 20), meta(), &RenderOptions::default());
        let text = capture.to_text();
        assert_eq!(text, "line0\nline1\nline2\n");
    }

    #[test]
    fn no_trim_keeps_blank_rows_and_padding() {
        let options = RenderOptions {
            trim: false,
            ..RenderOptions::default()
        };
        let capture = ScreenCapture::build(&screen(3, 99, 8), meta(), &options);
        assert_eq!(capture.lines.len(), 7);
        assert_eq!(capture.lines[0].text, "line0   ");
    }

    #[test]
    fn line_numbers_are_one_based_and_padded_to_three() {
        let options = RenderOptions {
            line_numbers: true,
            ..RenderOptions::default()
        };
        let capture = ScreenCapture::build(&screen(2, 99, 10), meta(), &options);
        let text = capture.to_text();
        assert!(text.starts_with("  1│ line0\n  2│ line1\n"));
        assert_eq!(row_prefix(1002), "1002│ ");
    }

    #[test]
    fn annotated_output_orders_metadata_before_highlights() {
        let options = RenderOptions {
            annotate: true,
            ..RenderOptions::default()
        };
        let mut pane = meta();
        pane.bell = true;
        pane.alternate_screen = true;
        let capture = ScreenCapture::build(&screen(5, 2, 20), pane, &options);
        let text = capture.to_text();
        let (content, block) = text.split_once("Annotations:\n").expect("annotation block");
        assert!(content.contains("  MARK"));
        assert!(!content.contains('│'));
        assert_eq!(
            block,
            "Cursor: 21,1\nBell: yes (cleared)\nScreen: alternate\n  3│ MARK [bg:green]\n"
        );
    }

    #[test]
    fn tail_drops_rows_and_annotations_outside_window() {
        let options = RenderOptions {
            annotate: true,
            line_numbers: true,
            tail: Some(3),
            trim: true,
        };
        let capture = ScreenCapture::build(&screen(20, 4, 20), meta(), &options);
        assert_eq!(capture.lines.len(), 3);
        assert_eq!(capture.lines[0].row, 18);
        assert_eq!(capture.annotations.as_deref(), Some(&[][..]));
        assert!(!capture.to_text().contains("MARK"));
    }

    #[test]
    fn tail_keeps_highlight_inside_window() {
        let options = RenderOptions {
            annotate: true,
            tail: Some(5),
            ..RenderOptions::default()
        };
        let capture = ScreenCapture::build(&screen(20, 18, 20), meta(), &options);
        let found = capture.annotations.clone().unwrap_or_default();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row, 18);
    }

    #[test]
    fn report_serializes_one_based_positions() {
        let options = RenderOptions {
            annotate: true,
            ..RenderOptions::default()
        };
        let capture = ScreenCapture::build(&screen(4, 1, 20), meta(), &options);
        let report = serde_json::to_value(capture.to_report(Some("work"))).expect("serialize");
        assert_eq!(report["session"], "work");
        assert_eq!(report["cursor"]["row"], 21);
        assert_eq!(report["lines"][0]["row"], 1);
        assert_eq!(report["annotations"][0]["row"], 2);
        assert_eq!(report["annotations"][0]["col"], 1);
        assert_eq!(report["annotations"][0]["label"], "green");
    }
}
