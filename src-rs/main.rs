use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use term_capture::capture::{
    annotate_saved, run_capture, CaptureError, CaptureOptions, CaptureOutput, SavedCapture,
    EXIT_FAILURE,
};
use term_capture::config::Settings;
use term_capture::logging::{init_logging, LogFormat};
use term_capture::render::{PaneMeta, ScreenCapture};
use term_capture::tmux::{CommandRunner, TmuxClient};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "term-capture",
    version,
    about = "Capture tmux panes as text with highlight annotations for agents"
)]
struct Cli {
    /// tmux server socket name (tmux -L)
    #[arg(short = 'L', long, global = true)]
    socket: Option<String>,
    /// Log filter (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Log format: pretty or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Capture a tmux pane as plain text, raw escapes or an annotated screen
    Capture(CaptureArgs),
    /// Annotate a saved escape-coded capture (file or stdin)
    Annotate(AnnotateArgs),
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Session name, or an explicit tmux target such as work:1.0
    #[arg(short, long)]
    session: String,
    /// Append the annotations block (automatic on the alternate screen)
    #[arg(short, long, action = ArgAction::SetTrue)]
    annotate: bool,
    /// Never annotate, even on the alternate screen
    #[arg(long, action = ArgAction::SetTrue)]
    no_annotate: bool,
    /// Prefix each row with its 1-based row number
    #[arg(long, action = ArgAction::SetTrue)]
    line_numbers: bool,
    /// Keep only the last N rows of the visible screen
    #[arg(short, long, allow_negative_numbers = true)]
    tail: Option<i64>,
    /// Capture N lines of history with wrapped lines joined
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    scrollback: Option<i64>,
    /// Print the pane with its escape sequences
    #[arg(short, long, action = ArgAction::SetTrue)]
    raw: bool,
    /// Keep trailing whitespace and blank rows
    #[arg(long, action = ArgAction::SetTrue)]
    no_trim: bool,
    /// Allow --scrollback while the alternate screen is active
    #[arg(long, action = ArgAction::SetTrue)]
    force: bool,
    /// Print a JSON report instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

impl From<CaptureArgs> for CaptureOptions {
    fn from(args: CaptureArgs) -> Self {
        CaptureOptions {
            session: args.session,
            annotate: args.annotate,
            no_annotate: args.no_annotate,
            line_numbers: args.line_numbers,
            tail: args.tail,
            scrollback: args.scrollback,
            raw: args.raw,
            no_trim: args.no_trim,
            force: args.force,
            json: args.json,
        }
    }
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Capture file produced by `tmux capture-pane -p -e` ("-" or omitted for stdin)
    input: Option<PathBuf>,
    /// Pane width in columns (default: widest row)
    #[arg(long)]
    cols: Option<usize>,
    /// Pane height in rows
    #[arg(long)]
    rows: Option<usize>,
    /// Cursor position as ROW,COL (1-based)
    #[arg(long, value_parser = parse_cursor, default_value = "1,1")]
    cursor: (usize, usize),
    /// Report the window bell as rung
    #[arg(long, action = ArgAction::SetTrue)]
    bell: bool,
    /// Report the alternate screen as active
    #[arg(long, action = ArgAction::SetTrue)]
    alternate: bool,
    /// Keep only the last N rows
    #[arg(short, long, allow_negative_numbers = true)]
    tail: Option<i64>,
    /// Prefix each row with its 1-based row number
    #[arg(long, action = ArgAction::SetTrue)]
    line_numbers: bool,
    /// Print a JSON report instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<CaptureError>()
            .map_or(EXIT_FAILURE, CaptureError::exit_code);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env().with_overrides(cli.socket, cli.log_level, cli.log_format);
    init_logging(&settings.log).context("failed to initialize logging")?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Capture(args) => command_capture(args, &settings),
        Commands::Annotate(args) => command_annotate(args),
    }
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "capture",
            "description": "Capture a tmux pane as text; annotates highlights on the alternate screen.",
            "runner": "tmux"
        }),
        json!({
            "name": "annotate",
            "description": "Annotate a saved escape-coded pane capture without tmux.",
            "runner": "offline"
        }),
        json!({
            "name": "commands",
            "description": "List supported commands.",
            "runner": "offline"
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn command_capture(args: CaptureArgs, settings: &Settings) -> Result<()> {
    let options = CaptureOptions::from(args);
    let client = TmuxClient::new(CommandRunner::from_settings(settings));
    match run_capture(&client, &options)? {
        CaptureOutput::Raw(text) => print!("{text}"),
        CaptureOutput::Screen(capture) => {
            print_screen(&capture, Some(options.session.as_str()), options.json)?
        }
    }
    Ok(())
}

fn command_annotate(args: AnnotateArgs) -> Result<()> {
    let raw = read_input(args.input.as_deref())?;
    let (cursor_row, cursor_col) = args.cursor;
    let saved = SavedCapture {
        cols: args.cols,
        rows: args.rows,
        meta: PaneMeta {
            cursor_row,
            cursor_col,
            bell: args.bell,
            alternate_screen: args.alternate,
        },
        tail: args.tail,
        line_numbers: args.line_numbers,
    };
    let capture = annotate_saved(&raw, &saved)?;
    print_screen(&capture, None, args.json)
}

fn print_screen(capture: &ScreenCapture, session: Option<&str>, as_json: bool) -> Result<()> {
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&capture.to_report(session))?
        );
    } else {
        print!("{}", capture.to_text());
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read capture: {}", path.display())),
        _ => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read capture from stdin")?;
            Ok(raw)
        }
    }
}

fn parse_cursor(value: &str) -> Result<(usize, usize), String> {
    let (row, col) = value
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL, got {value:?}"))?;
    let parse = |part: &str| match part.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("cursor parts must be positive integers, got {value:?}")),
    };
    Ok((parse(row)?, parse(col)?))
}
