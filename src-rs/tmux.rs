//! Thin tmux client: pane metadata, pane capture and bell clearing.
//!
//! Every call goes through [`TmuxRunner`] so tests can script tmux output.

use crate::config::Settings;
use crate::render::PaneMeta;
use serde::Serialize;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// `display-message` format for [`PaneState`], tab separated.
pub const PANE_STATE_FORMAT: &str =
    "#{pane_width}\t#{pane_height}\t#{cursor_x}\t#{cursor_y}\t#{alternate_on}\t#{window_bell_flag}";

#[derive(Debug, thiserror::Error)]
pub enum TmuxError {
    #[error("failed to run tmux: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("tmux timed out after {ms}ms")]
    Timeout { ms: u128 },

    #[error("tmux exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("Session '{0}' does not exist")]
    SessionNotFound(String),

    #[error("unexpected tmux output: {0}")]
    Parse(String),
}

/// Runs one tmux invocation and returns its stdout.
pub trait TmuxRunner {
    fn run(&self, args: &[String]) -> Result<String, TmuxError>;
}

/// Runs the real tmux binary with a hard timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    binary: String,
    socket: Option<String>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(binary: impl Into<String>, socket: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            socket,
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.tmux_bin.clone(),
            settings.socket.clone(),
            settings.timeout,
        )
    }

    fn argv(&self, args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(socket) = &self.socket {
            argv.push("-L".to_string());
            argv.push(socket.clone());
        }
        argv.extend(args.iter().cloned());
        argv
    }
}

impl TmuxRunner for CommandRunner {
    fn run(&self, args: &[String]) -> Result<String, TmuxError> {
        let argv = self.argv(args);
        debug!(binary = %self.binary, ?argv, "running tmux");
        let started = Instant::now();

        let mut child = Command::new(&self.binary)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes while waiting so neither can fill and stall tmux.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(timeout_ms = self.timeout.as_millis(), ?argv, "tmux timed out");
                return Err(TmuxError::Timeout {
                    ms: self.timeout.as_millis(),
                });
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TmuxError::Spawn(err));
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        debug!(
            elapsed_ms = started.elapsed().as_millis(),
            status = status.code().unwrap_or(-1),
            bytes = stdout.len(),
            "tmux finished"
        );

        if !status.success() {
            return Err(TmuxError::Failed {
                status: status.code().unwrap_or(1),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Pane geometry and flags. Cursor is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PaneState {
    pub width: usize,
    pub height: usize,
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub alternate: bool,
    pub bell: bool,
}

impl PaneState {
    pub fn meta(&self) -> PaneMeta {
        PaneMeta {
            cursor_row: self.cursor_row,
            cursor_col: self.cursor_col,
            bell: self.bell,
            alternate_screen: self.alternate,
        }
    }
}

/// Parses one line produced by [`PANE_STATE_FORMAT`].
pub fn parse_pane_state(line: &str) -> Result<PaneState, TmuxError> {
    let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split('\t').collect();
    let [width, height, cursor_x, cursor_y, alternate, bell] = fields.as_slice() else {
        return Err(TmuxError::Parse(format!(
            "expected 6 pane fields, got {}",
            fields.len()
        )));
    };
    let number = |name: &str, value: &str| {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| TmuxError::Parse(format!("{name} is not a number: {value:?}")))
    };
    Ok(PaneState {
        width: number("pane_width", width)?,
        height: number("pane_height", height)?,
        cursor_col: number("cursor_x", cursor_x)? + 1,
        cursor_row: number("cursor_y", cursor_y)? + 1,
        alternate: alternate.trim() == "1",
        bell: bell.trim() == "1",
    })
}

/// Exact-match target for a session's active pane. Names that already carry
/// a window or pane part are used as given.
pub fn session_target(session: &str) -> String {
    if session.contains(':') || session.contains('.') {
        session.to_string()
    } else {
        format!("={session}:")
    }
}

fn session_name(target: &str) -> &str {
    let name = target.trim_start_matches('=');
    name.split(&[':', '.'][..]).next().unwrap_or(name)
}

fn is_missing_session(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("can't find session")
        || lower.contains("can't find pane")
        || lower.contains("can't find window")
        || lower.contains("no server running")
        || lower.contains("error connecting")
}

pub struct TmuxClient<R> {
    runner: R,
}

impl<R: TmuxRunner> TmuxClient<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn call(&self, target: &str, args: &[&str]) -> Result<String, TmuxError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(&args).map_err(|err| match err {
            TmuxError::Failed { ref stderr, .. } if is_missing_session(stderr) => {
                TmuxError::SessionNotFound(session_name(target).to_string())
            }
            other => other,
        })
    }

    pub fn pane_state(&self, target: &str) -> Result<PaneState, TmuxError> {
        let out = self.call(
            target,
            &["display-message", "-p", "-t", target, PANE_STATE_FORMAT],
        )?;
        let line = out.lines().next().unwrap_or_default();
        let state = parse_pane_state(line)?;
        debug!(?state, "pane state");
        Ok(state)
    }

    /// Visible screen. With `escapes`, SGR sequences are kept.
    pub fn capture_visible(&self, target: &str, escapes: bool) -> Result<String, TmuxError> {
        let mut args = vec!["capture-pane", "-p", "-t", target];
        if escapes {
            args.push("-e");
        }
        self.call(target, &args)
    }

    /// The last `lines` rows of history plus the visible screen, with
    /// wrapped lines joined. Keeps at most `lines` logical lines.
    pub fn capture_scrollback(
        &self,
        target: &str,
        lines: usize,
        escapes: bool,
    ) -> Result<String, TmuxError> {
        let start = format!("-{lines}");
        let mut args = vec!["capture-pane", "-p", "-J", "-t", target, "-S", start.as_str()];
        if escapes {
            args.push("-e");
        }
        let out = self.call(target, &args)?;

        let mut kept: Vec<&str> = out.lines().collect();
        while kept.last().is_some_and(|line| line.trim().is_empty()) {
            kept.pop();
        }
        let first = kept.len().saturating_sub(lines);
        let mut text = kept[first..].join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        Ok(text)
    }

    /// Clears the window bell flag by re-selecting the window. Failures are
    /// logged and ignored.
    pub fn clear_bell(&self, target: &str) {
        if let Err(err) = self.call(target, &["select-window", "-t", target]) {
            debug!(error = %err, "could not clear bell flag");
        }
    }
}
