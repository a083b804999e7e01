mod clipboard;
mod extract;
mod hooks;
mod metadata;
mod paths;
mod preferences;
mod project;
mod review;
mod transcript;
mod types;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use clipboard::Clipboard;
use extract::{ExtractError, FormatConfig};
use hooks::HookAction;
use preferences::Preferences;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use types::HookInput;

#[derive(Parser)]
#[command(name = "sidekick", about = "Transcript extraction and assistant hooks")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the last turns of a session to ~/copyq and the clipboard
    LastMessages(LastMessagesArgs),
    /// Run a hook; reads one event from stdin
    Hook {
        #[command(subcommand)]
        hook: HookCommand,
    },
    /// Review recent activity in the background (spawned by `hook counter`)
    #[command(hide = true)]
    ReviewWorker {
        #[arg(long)]
        event_file: PathBuf,
    },
}

#[derive(Args)]
struct LastMessagesArgs {
    /// Session id, the transcript's file name without `.jsonl`
    session_id: String,

    /// Number of turns to extract
    #[arg(value_parser = parse_turns)]
    turns: Option<usize>,

    /// Skip copying to the clipboard
    #[arg(long)]
    no_clip: bool,

    /// Read this transcript instead of searching for the session
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy)]
enum HookCommand {
    /// PreToolUse: block npm/npx/bun in pnpm projects
    EnforcePnpm,
    /// PostToolUse: count tool calls and launch periodic reviews
    Counter,
    /// PreToolUse: show a pending review nudge once
    Nudge,
}

fn parse_turns(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("turn count must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .without_time()
        .init();
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Preferences for hooks and the worker: a broken config file must not
/// break the host, so fall back to defaults.
fn load_prefs_lenient(dir: &Path) -> Preferences {
    Preferences::load(dir).unwrap_or_else(|err| {
        tracing::warn!("{err:#}; using default preferences");
        let mut prefs = Preferences::default();
        prefs.apply_env(|key| std::env::var(key).ok());
        prefs
    })
}

// ===================================================================
// last-messages
// ===================================================================

fn last_messages(args: &LastMessagesArgs) -> Result<()> {
    let prefs = Preferences::load(&paths::sidekick_dir())?;
    let path = extract::locate_session(&paths::projects_dir(), &args.session_id, args.path.as_deref())?;
    tracing::debug!(path = %path.display(), "reading transcript");

    let transcript = extract::read_transcript(&path)?;
    let config = FormatConfig::from_prefs(&prefs.transcript, args.turns);
    let formatted = extract::format_transcript(&transcript, &config);
    if formatted.is_empty() {
        return Err(ExtractError::NoMessages { path }.into());
    }

    let header = extract::render_header(&prefs.transcript.header_template, &args.session_id, &formatted)?;
    let file_text = formatted.file_text(&header);
    let dest = extract::write_artifact(&prefs.output_dir(), &args.session_id, &file_text, Utc::now())?;
    eprintln!("✓ Wrote {}", dest.display());

    if !args.no_clip {
        match Clipboard::new().copy_text(&formatted.clipboard_text()) {
            Ok(method) => eprintln!("✓ Copied to clipboard via {}", method.name()),
            Err(err) => tracing::warn!("clipboard copy failed: {err}"),
        }
    }

    print!("{file_text}");
    Ok(())
}

// ===================================================================
// Hooks and the review worker
// ===================================================================

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn dispatch_hook(hook: HookCommand, input: &HookInput) -> Result<HookAction> {
    let base = paths::sidekick_dir();
    let prefs = load_prefs_lenient(&base);
    match (hook, input.common()) {
        (HookCommand::EnforcePnpm, _) => Ok(hooks::pnpm::run(input, &prefs.pnpm)),
        (HookCommand::Counter, Some(common)) => hooks::counter::run(
            common,
            &prefs.review,
            &base,
            epoch_seconds(),
            hooks::counter::spawn_worker,
        ),
        (HookCommand::Nudge, Some(common)) => hooks::nudge::run(common, &base, Utc::now()),
        (_, None) => Ok(HookAction::Continue),
    }
}

/// Hooks never fail the host: bad input or internal errors exit 0.
fn run_hook(hook: HookCommand) -> i32 {
    let input = match read_stdin().and_then(|raw| Ok(HookInput::parse(&raw)?)) {
        Ok(input) => input,
        Err(err) => {
            tracing::debug!("ignoring unreadable hook input: {err:#}");
            return 0;
        }
    };
    match dispatch_hook(hook, &input) {
        Ok(action) => {
            if let Some(text) = action.message() {
                eprintln!("{text}");
            }
            action.exit_code()
        }
        Err(err) => {
            tracing::warn!("hook failed: {err:#}");
            0
        }
    }
}

fn review_worker(event_file: &Path) -> Result<()> {
    let base = paths::sidekick_dir();
    let prefs = load_prefs_lenient(&base);
    let reviewer = review::OpenAiReviewer::from_env(prefs.review.clone(), base.clone());
    review::run(event_file, &prefs.review, &base, &reviewer, Utc::now())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match &cli.command {
        Commands::LastMessages(args) => match last_messages(args) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("sidekick: {err:#}");
                1
            }
        },
        Commands::Hook { hook } => run_hook(*hook),
        Commands::ReviewWorker { event_file } => {
            if let Err(err) = review_worker(event_file) {
                tracing::debug!("review skipped: {err:#}");
            }
            0
        }
    };
    process::exit(code);
}
