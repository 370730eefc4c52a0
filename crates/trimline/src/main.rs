//! Replay a recorded conversation through a history manager.
//!
//! Useful for tuning budgets and cadences against real transcripts before
//! wiring a manager into an agent loop.
//!
//! # Examples
//!
//! ```sh
//! # Trim to 8k tokens before every call
//! trimline --transcript session.json --max-tokens 8000
//!
//! # Trim every 3rd call, simulate provider overflows on turns 5 and 9
//! trimline --transcript session.json --cadence 3 \
//!   --overflow-at-turn 5 --overflow-at-turn 9
//!
//! # Resume counters from a previous run and verify pairing each turn
//! trimline --transcript session.json --state-dir .trimline --session demo --check
//!
//! # Verbose decision log
//! RUST_LOG=trimline=debug trimline --transcript session.json
//! ```
//!
//! A transcript is a JSON array of turns; each turn is an array of messages
//! appended to the buffer before that turn's model call.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trimline::context::pairing::validate_pairing;
use trimline::prelude::*;

/// Replay a recorded conversation through a history manager.
#[derive(Parser)]
#[command(name = "trimline")]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// JSON transcript: an array of turns, each an array of messages
    #[arg(long)]
    transcript: PathBuf,

    /// JSON manager config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    // ── Manager overrides ──────────────────────────────────────
    /// Token budget for the whole history
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Proactive trim cadence: "always", "disabled", or N for every Nth call
    #[arg(long)]
    cadence: Option<Cadence>,

    /// Skip tool-result truncation during overflow recovery
    #[arg(long)]
    no_truncation: bool,

    // ── Simulation ─────────────────────────────────────────────
    /// Simulate a provider overflow after the hook on this turn (1-based)
    #[arg(long = "overflow-at-turn")]
    overflow_turns: Vec<usize>,

    /// Verify tool-use pairing after every turn
    #[arg(long)]
    check: bool,

    // ── Session persistence ────────────────────────────────────
    /// Directory holding saved manager state
    #[arg(long, requires = "session")]
    state_dir: Option<PathBuf>,

    /// Session id within --state-dir
    #[arg(long, requires = "state_dir")]
    session: Option<String>,
}

fn build_config(cli: &Cli) -> Result<ManagerConfig, HistoryError> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::load(path)?,
        None => ManagerConfig::default(),
    };
    if let Some(max_tokens) = cli.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(cadence) = cli.cadence {
        config = config.with_cadence(cadence);
    }
    if cli.no_truncation {
        config = config.without_truncation();
    }
    Ok(config)
}

fn load_transcript(path: &Path) -> Result<Vec<Vec<Message>>, HistoryError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn run(cli: &Cli) -> Result<(), HistoryError> {
    let config = build_config(cli)?;
    let turns = load_transcript(&cli.transcript)?;
    let mut manager = HistoryManager::new(config)?.with_event_handler(LoggingHandler);

    let store = match (&cli.state_dir, &cli.session) {
        (Some(dir), Some(id)) => {
            let store = StateStore::new(dir)?;
            if let Some(state) = store.load(id)? {
                manager.restore_from_session(&state)?;
                info!(session = %id, call_counter = state.call_counter, "resumed session");
            }
            Some((store, id.as_str()))
        }
        _ => None,
    };

    let mut buffer = ConversationBuffer::new();
    for (idx, turn) in turns.into_iter().enumerate() {
        let turn_no = idx + 1;
        buffer.extend(turn);

        let trimmed = manager
            .apply_management(&mut buffer)
            .map_or(0, |r| r.removed_count);

        let recovery = if cli.overflow_turns.contains(&turn_no) {
            match manager.reduce_context(&mut buffer, &"simulated context overflow")? {
                Recovery::Truncated { fragments } => format!(" | truncated {fragments}"),
                Recovery::Trimmed(result) => format!(" | recovered -{}", result.removed_count),
            }
        } else {
            String::new()
        };

        if cli.check
            && let Err(violation) = validate_pairing(buffer.messages())
        {
            return Err(HistoryError::State(format!(
                "pairing broken after turn {turn_no}: {violation}"
            )));
        }

        println!(
            "turn {turn_no:>3}: {:>4} msgs | -{trimmed}{recovery} | {}",
            buffer.len(),
            manager.usage(&buffer).to_log_string()
        );
    }

    if let Some((store, id)) = store {
        let path = store.save(id, &manager.get_state())?;
        info!(path = %path.display(), "saved session state");
    }

    println!(
        "calls: {} | removed: {} | final: {}",
        manager.call_counter(),
        manager.removed_message_count(),
        manager.usage(&buffer).to_log_string()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
