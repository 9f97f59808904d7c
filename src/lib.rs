// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;
pub mod watch;

use std::io::Write;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::engine::{render_status, LoopState, WatchLoop};
use crate::exec::ProcessCounter;
use crate::types::{Status, StatusUpdate};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the production process counter
/// - the watch loop, or a single query with `--once`
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let counter = cfg.counter();

    if args.once {
        return run_once(&cfg, &counter).await;
    }

    let mut watch_loop = WatchLoop::new(cfg.settings.clone(), counter).with_sink(print_update);
    watch_loop.start().await?;

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C; stopping");
            } else {
                info!("Ctrl+C received; stopping");
            }
            LoopState::Stopped
        }
        state = watch_loop.wait() => state,
    };

    watch_loop.stop().await;

    if outcome == LoopState::Errored {
        bail!(
            "watch loop halted: {}",
            render_status(&watch_loop.status())
        );
    }
    Ok(())
}

/// `--once`: one query, every count on its own line.
async fn run_once<C: ProcessCounter>(cfg: &ConfigFile, counter: &C) -> Result<()> {
    let outcome = counter
        .count(cfg.settings.scope, &cfg.settings.pattern)
        .await;
    match outcome {
        Ok(counts) => {
            for count in counts {
                print_update(&StatusUpdate::Count(count));
            }
            Ok(())
        }
        Err(failure) => {
            print_update(&StatusUpdate::Failure(failure.clone()));
            Err(failure.into())
        }
    }
}

/// Write one rendered status line to stdout.
fn print_update(update: &StatusUpdate) {
    let line = render_status(&Status::Latest(update.clone()));
    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{line}").and_then(|_| stdout.flush()).is_err() {
        debug!("stdout closed; status line dropped");
    }
}

fn print_dry_run(cfg: &ConfigFile) {
    let settings = &cfg.settings;
    println!("buildwatch dry-run");
    println!("  watch.debounce = {:?}", settings.debounce.duration());
    println!("  watch.backend = {:?}", settings.watch.backend);
    println!("  watch.retry_interval = {:?}", settings.watch.retry_interval);
    println!("  query.program = {}", cfg.program.display());
    println!("  query.pattern = {}", settings.pattern);
    println!("  query.scope = {}", settings.scope);
    println!("  query.ok_exit_codes = {:?}", cfg.ok_exit_codes);
    println!("  query.on_start = {}", settings.query_on_start);
    println!();

    println!("paths ({}):", settings.paths.len());
    for path in settings.paths.iter() {
        println!("  - {}", path.display());
    }

    debug!("dry-run complete (no execution)");
}
