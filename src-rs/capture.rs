//! Capture flow: flag validation, pane capture and offline annotation.

use crate::ansi::decode;
use crate::render::{PaneMeta, RenderOptions, ScreenCapture};
use crate::tmux::{session_target, TmuxClient, TmuxError, TmuxRunner};
use tracing::{debug, info};

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_TIMEOUT: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("{flag} must be a positive integer (got {value})")]
    NotPositive { flag: &'static str, value: i64 },

    #[error("{0} and {1} are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    #[error("{0} cannot be combined with {1}")]
    Incompatible(&'static str, &'static str),

    #[error(
        "--scrollback is unreliable while the alternate screen is active; \
         pass --force to capture anyway"
    )]
    ScrollbackInAlternate,

    #[error(transparent)]
    Tmux(#[from] TmuxError),
}

impl CaptureError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CaptureError::NotPositive { .. }
            | CaptureError::MutuallyExclusive(..)
            | CaptureError::Incompatible(..)
            | CaptureError::ScrollbackInAlternate
            | CaptureError::Tmux(TmuxError::SessionNotFound(_)) => EXIT_USAGE,
            CaptureError::Tmux(TmuxError::Timeout { .. }) => EXIT_TIMEOUT,
            CaptureError::Tmux(_) => EXIT_FAILURE,
        }
    }
}

fn positive(flag: &'static str, value: Option<i64>) -> Result<Option<usize>, CaptureError> {
    match value {
        None => Ok(None),
        Some(v) if v > 0 => Ok(Some(v as usize)),
        Some(v) => Err(CaptureError::NotPositive { flag, value: v }),
    }
}

/// Flags of `capture`. Counts are signed so negative input reaches
/// validation instead of failing in the argument parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    pub session: String,
    pub annotate: bool,
    pub no_annotate: bool,
    pub line_numbers: bool,
    pub tail: Option<i64>,
    pub scrollback: Option<i64>,
    pub raw: bool,
    pub no_trim: bool,
    pub force: bool,
    pub json: bool,
}

impl CaptureOptions {
    pub fn validate(&self) -> Result<(), CaptureError> {
        positive("--tail", self.tail)?;
        positive("--scrollback", self.scrollback)?;

        let exclusive = [
            (self.tail.is_some() && self.scrollback.is_some(), "--tail", "--scrollback"),
            (self.annotate && self.no_annotate, "--annotate", "--no-annotate"),
            (self.annotate && self.raw, "--annotate", "--raw"),
            (self.tail.is_some() && self.raw, "--tail", "--raw"),
            (self.line_numbers && self.raw, "--line-numbers", "--raw"),
            (self.json && self.raw, "--json", "--raw"),
        ];
        if let Some((_, a, b)) = exclusive.into_iter().find(|(hit, _, _)| *hit) {
            return Err(CaptureError::MutuallyExclusive(a, b));
        }

        if self.scrollback.is_some() {
            if self.annotate {
                return Err(CaptureError::Incompatible("--annotate", "--scrollback"));
            }
            if self.line_numbers {
                return Err(CaptureError::Incompatible("--line-numbers", "--scrollback"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutput {
    /// Escape-coded pane text, printed as is.
    Raw(String),
    Screen(ScreenCapture),
}

/// Trims trailing whitespace per line and trailing blank lines.
fn trim_raw(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

pub fn run_capture<R: TmuxRunner>(
    client: &TmuxClient<R>,
    options: &CaptureOptions,
) -> Result<CaptureOutput, CaptureError> {
    options.validate()?;
    let target = session_target(&options.session);
    let state = client.pane_state(&target)?;
    let trim = !options.no_trim;

    if let Some(lines) = positive("--scrollback", options.scrollback)? {
        if state.alternate && !options.force {
            return Err(CaptureError::ScrollbackInAlternate);
        }
        let text = client.capture_scrollback(&target, lines, options.raw)?;
        info!(session = %options.session, lines, "captured scrollback");
        if options.raw {
            return Ok(CaptureOutput::Raw(if trim { trim_raw(&text) } else { text }));
        }
        let buffer = decode(&text, state.width);
        let render = RenderOptions {
            trim,
            ..RenderOptions::default()
        };
        return Ok(CaptureOutput::Screen(ScreenCapture::build(
            &buffer,
            state.meta(),
            &render,
        )));
    }

    let text = client.capture_visible(&target, true)?;
    if options.raw {
        info!(session = %options.session, "captured raw pane");
        return Ok(CaptureOutput::Raw(if trim { trim_raw(&text) } else { text }));
    }

    let annotate = options.annotate || (state.alternate && !options.no_annotate);
    let mut meta = state.meta();
    meta.bell = state.bell && (annotate || options.json);
    if meta.bell {
        client.clear_bell(&target);
    }
    debug!(annotate, alternate = state.alternate, bell = meta.bell, "capture mode");

    let mut buffer = decode(&text, state.width);
    buffer.pad_rows(state.height);
    let render = RenderOptions {
        annotate,
        line_numbers: options.line_numbers,
        tail: positive("--tail", options.tail)?,
        trim,
    };
    let capture = ScreenCapture::build(&buffer, meta, &render);
    info!(
        session = %options.session,
        rows = capture.lines.len(),
        annotations = capture.annotations.as_ref().map_or(0, Vec::len),
        "captured pane"
    );
    Ok(CaptureOutput::Screen(capture))
}

/// Settings for annotating a saved escape-coded capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedCapture {
    /// Pane width; rows are padded to it. `None` uses the widest row.
    pub cols: Option<usize>,
    /// Pane height; missing rows are added as blank.
    pub rows: Option<usize>,
    pub meta: PaneMeta,
    pub tail: Option<i64>,
    pub line_numbers: bool,
}

pub fn annotate_saved(raw: &str, saved: &SavedCapture) -> Result<ScreenCapture, CaptureError> {
    let tail = positive("--tail", saved.tail)?;
    if saved.cols == Some(0) {
        return Err(CaptureError::NotPositive {
            flag: "--cols",
            value: 0,
        });
    }

    let mut buffer = decode(raw, saved.cols.unwrap_or(0));
    if saved.cols.is_none() {
        let widest = buffer.rows.iter().map(|row| row.width()).max().unwrap_or(0);
        buffer = decode(raw, widest);
    }
    if let Some(rows) = saved.rows {
        buffer.pad_rows(rows);
    }

    let render = RenderOptions {
        annotate: true,
        line_numbers: saved.line_numbers,
        tail,
        trim: true,
    };
    Ok(ScreenCapture::build(&buffer, saved.meta, &render))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::tests::FakeRunner;

    fn options(session: &str) -> CaptureOptions {
        CaptureOptions {
            session: session.to_string(),
            ..CaptureOptions::default()
        }
    }

    fn pane(alternate: bool, bell: bool) -> Result<String, TmuxError> {
        Ok(format!(
            "20\t6\t0\t2\t{}\t{}\n",
            u8::from(alternate),
            u8::from(bell)
        ))
    }

    fn screen() -> Result<String, TmuxError> {
        Ok("$ top\n  \x1b[42m  RUNNING  \x1b[0m\nidle   \n".to_string())
    }

    #[test]
    fn zero_and_negative_counts_are_rejected() {
        for (tail, scrollback) in [(Some(0), None), (Some(-3), None), (None, Some(0))] {
            let opts = CaptureOptions {
                tail,
                scrollback,
                ..options("s")
            };
            let err = opts.validate().expect_err("invalid count");
            assert_eq!(err.exit_code(), EXIT_USAGE);
            assert!(err.to_string().contains("positive"));
        }
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let tail_and_scrollback = CaptureOptions {
            tail: Some(5),
            scrollback: Some(50),
            ..options("s")
        };
        let err = tail_and_scrollback.validate().expect_err("conflict");
        assert!(err.to_string().contains("mutually exclusive"));

        let annotate_raw = CaptureOptions {
            annotate: true,
            raw: true,
            ..options("s")
        };
        assert!(annotate_raw.validate().is_err());

        let numbered_scrollback = CaptureOptions {
            line_numbers: true,
            scrollback: Some(10),
            ..options("s")
        };
        let err = numbered_scrollback.validate().expect_err("conflict");
        assert!(err.to_string().contains("line-numbers"));
        assert!(err.to_string().contains("combined"));
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn raw_scrollback_is_allowed() {
        let opts = CaptureOptions {
            raw: true,
            scrollback: Some(50),
            ..options("s")
        };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn missing_session_exits_with_usage_code() {
        let fake = FakeRunner::with(vec![Err(TmuxError::Failed {
            status: 1,
            stderr: "can't find session: nonexistent_xyz".to_string(),
        })]);
        let err = run_capture(&TmuxClient::new(&fake), &options("nonexistent_xyz"))
            .expect_err("missing session");
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn timeouts_use_their_own_exit_code() {
        let err = CaptureError::from(TmuxError::Timeout { ms: 5000 });
        assert_eq!(err.exit_code(), EXIT_TIMEOUT);
    }

    #[test]
    fn normal_screen_capture_is_plain() {
        let fake = FakeRunner::with(vec![pane(false, true), screen()]);
        let out = run_capture(&TmuxClient::new(&fake), &options("s")).expect("capture");
        let CaptureOutput::Screen(capture) = out else {
            panic!("expected screen output");
        };
        assert!(capture.annotations.is_none());
        assert_eq!(capture.to_text(), "$ top\n    RUNNING\nidle\n");
        // Bell is neither reported nor cleared without annotations.
        assert_eq!(fake.calls.borrow().len(), 2);
    }

    #[test]
    fn alternate_screen_annotates_and_clears_bell() {
        let fake = FakeRunner::with(vec![pane(true, true), screen()]);
        let out = run_capture(&TmuxClient::new(&fake), &options("s")).expect("capture");
        let CaptureOutput::Screen(capture) = out else {
            panic!("expected screen output");
        };
        let text = capture.to_text();
        assert!(text.contains("\nAnnotations:\nCursor: 3,1\nBell: yes (cleared)\nScreen: alternate\n"));
        assert!(text.contains("  2│ RUNNING [bg:green]\n"));
        let calls = fake.calls.borrow();
        assert!(calls.iter().any(|argv| argv[0] == "select-window"));
    }

    #[test]
    fn no_annotate_overrides_alternate_screen() {
        let fake = FakeRunner::with(vec![pane(true, false), screen()]);
        let opts = CaptureOptions {
            no_annotate: true,
            ..options("s")
        };
        let out = run_capture(&TmuxClient::new(&fake), &opts).expect("capture");
        let CaptureOutput::Screen(capture) = out else {
            panic!("expected screen output");
        };
        assert!(!capture.to_text().contains("Annotations:"));
    }

    #[test]
    fn scrollback_refuses_alternate_screen_without_force() {
        let opts = CaptureOptions {
            scrollback: Some(50),
            ..options("s")
        };
        let fake = FakeRunner::with(vec![pane(true, false)]);
        let err = run_capture(&TmuxClient::new(&fake), &opts).expect_err("refused");
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert!(err.to_string().contains("alternate screen"));
        assert!(err.to_string().contains("--force"));

        let forced = CaptureOptions { force: true, ..opts };
        let fake = FakeRunner::with(vec![pane(true, false), Ok("a\nb\n".to_string())]);
        let out = run_capture(&TmuxClient::new(&fake), &forced).expect("forced");
        let CaptureOutput::Screen(capture) = out else {
            panic!("expected screen output");
        };
        assert_eq!(capture.to_text(), "a\nb\n");
    }

    #[test]
    fn raw_capture_keeps_escapes_and_trims_unless_asked() {
        let raw_pane = || -> Result<String, TmuxError> {
            Ok("\x1b[34mBLUE\x1b[0m   \n\n\n".to_string())
        };
        let opts = CaptureOptions {
            raw: true,
            ..options("s")
        };
        let fake = FakeRunner::with(vec![pane(false, false), raw_pane()]);
        let trimmed = run_capture(&TmuxClient::new(&fake), &opts).expect("raw");
        assert_eq!(trimmed, CaptureOutput::Raw("\x1b[34mBLUE\x1b[0m\n".to_string()));

        let untrimmed = CaptureOptions {
            no_trim: true,
            ..opts
        };
        let fake = FakeRunner::with(vec![pane(false, false), raw_pane()]);
        let CaptureOutput::Raw(text) =
            run_capture(&TmuxClient::new(&fake), &untrimmed).expect("raw")
        else {
            panic!("expected raw output");
        };
        assert!(text.len() > "\x1b[34mBLUE\x1b[0m\n".len());
    }

    #[test]
    fn saved_capture_is_annotated_offline() {
        let saved = SavedCapture {
            cols: Some(30),
            rows: Some(10),
            meta: PaneMeta {
                cursor_row: 1,
                cursor_col: 1,
                bell: false,
                alternate_screen: true,
            },
            tail: None,
            line_numbers: true,
        };
        let capture = annotate_saved("menu\n  \x1b[7m  SELECTED  \x1b[0m\nfooter\n", &saved)
            .expect("annotate");
        let text = capture.to_text();
        assert!(text.starts_with("  1│ menu\n"));
        assert!(text.contains("  2│ SELECTED [bg:white]"));
    }

    #[test]
    fn saved_capture_rejects_bad_counts() {
        let saved = SavedCapture {
            tail: Some(0),
            ..SavedCapture::default()
        };
        assert!(annotate_saved("x\n", &saved).is_err());
        let saved = SavedCapture {
            cols: Some(0),
            ..SavedCapture::default()
        };
        assert!(annotate_saved("x\n", &saved).is_err());
    }
}
