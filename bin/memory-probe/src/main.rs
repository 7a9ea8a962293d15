//! Reports the memory usage of its own process as seen by the operating system.
//!
//! With `--allocate-mib`, a block of memory is allocated and written to between two readings, which shows the OS-level
//! reading picking up memory the moment it is actually backed by physical pages.

#![deny(missing_docs)]

use std::{
    hint::black_box,
    io::{self, IsTerminal},
};

use anyhow::{Context as _, Result};
use clap::Parser as _;
use process_memory::{MemoryQuery as _, Strategy, StrategyKind};
use tracing::{debug, info};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod cli;
use self::cli::{Cli, OutputFormat};

mod report;
use self::report::{AllocationReport, Report};

const BYTES_PER_MIB: usize = 1024 * 1024;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .with_ansi(ansi_enabled(&io::stderr()))
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let report = run(&cli)?;

    match cli.format {
        OutputFormat::Text => println!("{}", report.to_text()),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report.")?)
        }
    }

    Ok(())
}

/// Colour codes are only emitted when the log stream is a terminal.
fn ansi_enabled<S: IsTerminal>(stream: &S) -> bool {
    stream.is_terminal()
}

fn run(cli: &Cli) -> Result<Report> {
    let strategy = Strategy::global();
    let pid = std::process::id();

    debug!(pid, strategy = ?strategy.kind(), "Querying process memory usage.");

    let usage_bytes = strategy
        .query(pid)
        .context("Failed to query process memory usage.")?;

    let allocation = match cli.allocate_mib {
        Some(mib) => {
            let allocated_bytes = mib
                .checked_mul(BYTES_PER_MIB)
                .context("Requested allocation is too large.")?;

            info!(mib, "Allocating and touching memory before querying again.");

            // A non-zero fill value forces every page to be written.
            let block = black_box(vec![0x5au8; allocated_bytes]);
            let usage_after_bytes = strategy
                .query(pid)
                .context("Failed to query process memory usage after allocating.")?;
            drop(black_box(block));

            Some(AllocationReport::new(allocated_bytes as u64, usage_bytes, usage_after_bytes))
        }
        None => None,
    };

    Ok(Report {
        pid,
        strategy: strategy_name(strategy.kind()),
        usage_bytes,
        allocation,
    })
}

fn strategy_name(kind: StrategyKind) -> &'static str {
    match kind {
        StrategyKind::Unix => "unix",
        StrategyKind::Windows => "windows",
    }
}
