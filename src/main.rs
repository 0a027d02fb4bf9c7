//! keystash - Interactive Shell
//!
//! Runs one in-process store with its expiry sweeper and reads commands
//! from standard input, one per line. Replies go to standard output; logs go
//! to standard error.

use anyhow::Context;
use clap::Parser;
use keystash::commands::CommandHandler;
use keystash::protocol::{parse_line, Reply};
use keystash::storage::{ExpirySweeper, StorageEngine};
use keystash::{StoreConfig, DEFAULT_POOL_CAPACITY};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Shell configuration
#[derive(Debug, Parser)]
#[command(name = "keystash", version, about = "Interactive shell for an in-process keystash store")]
struct Args {
    /// Number of pooled value slots
    #[arg(long, default_value_t = DEFAULT_POOL_CAPACITY)]
    pool_capacity: usize,

    /// Interval between background expiry sweeps, in milliseconds
    #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_ms: u64,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "keystash=debug")
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Do not print the banner
    #[arg(long)]
    no_banner: bool,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        StoreConfig::new()
            .with_pool_capacity(self.pool_capacity)
            .with_sweep_interval(Duration::from_millis(self.sweep_interval_ms))
    }
}

fn print_banner(config: &StoreConfig) {
    println!(
        r#"
keystash v{} - embedded key-value store shell
──────────────────────────────────────────────
pool capacity: {} slots, sweep interval: {}ms
Type COMMAND for the command list, QUIT to exit.
"#,
        keystash::VERSION,
        config.pool_capacity,
        config.sweep_interval.as_millis()
    );
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .with_context(|| format!("invalid log filter '{}'", args.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = args.store_config();
    let interactive = io::stdin().is_terminal();
    if interactive && !args.no_banner {
        print_banner(&config);
    }

    let storage = Arc::new(StorageEngine::with_config(config.clone()));
    info!(pool_capacity = config.pool_capacity, "Storage engine initialized");

    let mut sweeper = ExpirySweeper::start(Arc::clone(&storage), config.sweep_interval);
    let handler = CommandHandler::new(Arc::clone(&storage));

    let result = run_shell(&handler, interactive);

    // The sweeper must be gone before the engine is dropped
    sweeper.stop();
    drop(handler);
    info!("Shell session ended");

    result
}

/// Reads, executes and prints until QUIT/EXIT or end of input.
fn run_shell(handler: &CommandHandler, interactive: bool) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            write!(stdout, "keystash> ")?;
            stdout.flush()?;
        }

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read from stdin")?;

        let args = match parse_line(&line) {
            Ok(args) if args.is_empty() => continue,
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "Rejected input line");
                writeln!(stdout, "{}", Reply::error(format!("ERR {}", e)))?;
                continue;
            }
        };

        let quit = matches!(args[0].to_uppercase().as_str(), "QUIT" | "EXIT");
        let reply = handler.execute(args);
        writeln!(stdout, "{}", reply)?;

        for message in handler.drain_messages() {
            writeln!(stdout, "{}", message.to_reply())?;
        }

        if quit {
            break;
        }
    }

    stdout.flush()?;
    Ok(())
}
