//! trawl - bulk extraction from a cursor-paginated search backend
//!
//! Runs long searches against Elasticsearch, drains them to JSON-lines
//! part files, and resumes interrupted extractions from their checkpoint.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::{Parser, Subcommand};

use trawl_core::shutdown_flag;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "trawl")]
#[command(about = "Bulk extraction from an Elasticsearch scroll")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./trawl.toml or ~/.config/trawl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a fresh long search and write part files
    Search(cmd::search::SearchArgs),
    /// Continue an interrupted long search from its checkpoint
    Resume(cmd::search::ResumeArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(trawl_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    trawl_core::init_logging(quiet, cli.debug, multi);

    setup_signal_handler();

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Search(args) => cmd::search::run_search(args, &config, &progress),
        Command::Resume(args) => cmd::search::run_resume(args, &config, &progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["ES base URL", &config.elasticsearch.base_url]);
            table.add_row(vec![
                "ES username",
                config
                    .elasticsearch
                    .username
                    .as_deref()
                    .unwrap_or("not set"),
            ]);
            table.add_row(vec![
                "ES password",
                if config.elasticsearch.password.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);
            table.add_row(vec![
                "Request timeout",
                &format!("{}s", config.elasticsearch.timeout),
            ]);
            table.add_row(vec![
                "Max retries",
                &config.elasticsearch.max_retries.to_string(),
            ]);
            table.add_row(vec!["Batch size", &config.scroll.batch_size.to_string()]);
            table.add_row(vec!["Scroll duration", &config.scroll.duration]);
            table.add_row(vec![
                "Output directory",
                &config.output.default_dir.display().to_string(),
            ]);
            table.add_row(vec!["Flush after", &config.output.flush_after.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit (default SIGINT behavior restored)
    // SAFETY: AtomicBool::store and process::exit are async-signal-safe
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGTERM handler");
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGINT handler");
    }
}
