//! Terminal pane capture with highlight annotations.
//!
//! The engine turns escape-coded pane text into a styled [`ScreenBuffer`],
//! finds the cells a TUI draws as highlighted, and reports them as
//! [`Annotation`]s labelled by background color. The `tmux` and `capture`
//! modules wire the engine to live tmux sessions.

pub mod annotate;
pub mod ansi;
pub mod capture;
pub mod color;
pub mod config;
pub mod highlight;
pub mod logging;
pub mod render;
pub mod structure;
pub mod tmux;

pub use annotate::{annotate, annotate_text, Annotation, Candidate, Signal};
pub use ansi::{decode, ScreenBuffer};
pub use capture::{annotate_saved, run_capture, CaptureError, CaptureOptions, CaptureOutput};
pub use color::{classify, ColorLabel, Rgb};
pub use config::Settings;
pub use render::{PaneMeta, RenderOptions, ScreenCapture};
pub use tmux::{CommandRunner, PaneState, TmuxClient, TmuxError, TmuxRunner};
