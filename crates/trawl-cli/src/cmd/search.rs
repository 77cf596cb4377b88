//! Search and resume subcommands - drain a long search to part files

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use trawl_core::progress::fmt_num;
use trawl_core::{
    Checkpoint, FsStore, LongSearch, SearchRequest, SharedProgress, SinkError,
    is_shutdown_requested,
};
use trawl_es::{EsClient, EsConfig};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Index to search
    #[arg(short, long)]
    pub index: String,

    /// Query body: inline JSON or @path/to/query.json
    #[arg(short, long, default_value = "{}")]
    pub query: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Index the interrupted search ran against
    #[arg(short, long)]
    pub index: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Options shared by `search` and `resume`.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Documents per page
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Cursor lifetime between calls (e.g. "1m")
    #[arg(long)]
    pub scroll: Option<String>,

    /// Stop after this many pages
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,

    /// Output template containing the {part} placeholder
    #[arg(short, long)]
    pub output: Option<String>,

    /// Batches accumulated before each part file is written
    #[arg(short, long)]
    pub flush_after: Option<usize>,

    /// Checkpoint file path
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

/// Resolved per-run settings (CLI overrides on top of config file).
struct Plan {
    request: SearchRequest,
    template: String,
    flush_after: usize,
    checkpoint_path: PathBuf,
}

fn parse_query(query: &str) -> Result<serde_json::Value> {
    let text = if let Some(path) = query.strip_prefix('@') {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file: {path}"))?
    } else {
        query.to_string()
    };
    serde_json::from_str(&text).context("Query body is not valid JSON")
}

fn build_plan(
    index: &str,
    body: serde_json::Value,
    common: &CommonArgs,
    config: &Config,
) -> Plan {
    let mut request = SearchRequest::new(index, body);
    request.batch_size = common.batch_size.unwrap_or(config.scroll.batch_size);
    request.scroll = common
        .scroll
        .clone()
        .unwrap_or_else(|| config.scroll.duration.clone());
    request.batch_limit = common.limit;

    let template = common.output.clone().unwrap_or_else(|| {
        format!(
            "{}/{index}-part-{{part}}.jsonl",
            config.output.default_dir.display()
        )
    });
    let flush_after = common.flush_after.unwrap_or(config.output.flush_after);
    let checkpoint_path = common
        .checkpoint
        .clone()
        .unwrap_or_else(|| config.output.default_dir.join(format!("{index}.cursor")));

    Plan {
        request,
        template,
        flush_after,
        checkpoint_path,
    }
}

fn es_client(config: &Config) -> EsClient {
    EsClient::new(EsConfig {
        base_url: config.elasticsearch.base_url.clone(),
        username: config.elasticsearch.username.clone(),
        password: config.elasticsearch.password.clone(),
        timeout: Duration::from_secs(config.elasticsearch.timeout),
        max_retries: config.elasticsearch.max_retries,
    })
}

/// Print a key-value summary table on stderr
fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

pub fn run_search(args: SearchArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let body = parse_query(&args.query)?;
    let plan = build_plan(&args.index, body, &args.common, config);
    let client = es_client(config);
    let store = FsStore;

    log::info!("Long search on {}", args.index);
    log::info!("  Output: {}", plan.template);
    log::info!("  Checkpoint: {}", plan.checkpoint_path.display());

    let bar = progress.scroll_bar(&args.index);
    let mut search = LongSearch::new(
        &client,
        plan.request.clone(),
        Checkpoint::new(&store, &plan.checkpoint_path),
    )
    .with_progress(bar.clone());

    let outcome = drain_to_parts(search.generate(), &store, &plan);
    bar.finish_and_clear();
    report(outcome, &args.index, &plan)
}

pub fn run_resume(args: ResumeArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let plan = build_plan(&args.index, serde_json::json!({}), &args.common, config);
    let client = es_client(config);
    let store = FsStore;

    log::info!("Resuming long search on {}", args.index);
    log::info!("  Checkpoint: {}", plan.checkpoint_path.display());

    let bar = progress.scroll_bar(&args.index);
    let mut search = LongSearch::new(
        &client,
        plan.request.clone(),
        Checkpoint::new(&store, &plan.checkpoint_path),
    )
    .with_progress(bar.clone());

    let batches = search
        .resume()
        .context("Failed to read checkpoint")?;
    if batches.state() == trawl_core::ScrollState::Exhausted {
        bar.finish_and_clear();
        log::info!(
            "No checkpoint at {}; nothing to resume",
            plan.checkpoint_path.display()
        );
        return Ok(());
    }

    let outcome = drain_to_parts(batches, &store, &plan);
    bar.finish_and_clear();
    report(outcome, &args.index, &plan)
}

struct DrainOutcome {
    result: Result<Vec<PathBuf>, SinkError>,
    batches: usize,
    documents: usize,
}

/// Pull batches through the sink, stopping at the next batch boundary once
/// a shutdown signal arrives.
fn drain_to_parts<I>(batches: I, store: &FsStore, plan: &Plan) -> DrainOutcome
where
    I: Iterator<Item = Result<trawl_core::Batch, trawl_core::ScrollError>>,
{
    let mut batch_count = 0usize;
    let mut doc_count = 0usize;
    let counted = batches
        .take_while(|_| !is_shutdown_requested())
        .inspect(|b| {
            if let Ok(b) = b {
                batch_count += 1;
                doc_count += b.len();
            }
        });
    let result = trawl_core::drain(counted, store, &plan.template, plan.flush_after);
    DrainOutcome {
        result,
        batches: batch_count,
        documents: doc_count,
    }
}

fn report(outcome: DrainOutcome, index: &str, plan: &Plan) -> Result<()> {
    match outcome.result {
        Ok(paths) => {
            print_summary(
                index,
                &[
                    ("Documents", fmt_num(outcome.documents)),
                    ("Batches", fmt_num(outcome.batches)),
                    ("Part files", fmt_num(paths.len())),
                ],
            );
            if is_shutdown_requested() {
                eprintln!(
                    "Interrupted; continue with: trawl resume --index {index} \
                     --checkpoint {}",
                    plan.checkpoint_path.display()
                );
            }
            Ok(())
        }
        Err(SinkError::Scroll(e)) => Err(anyhow::anyhow!(e).context(format!(
            "Scroll failed after {} batches; checkpoint kept at {}, \
             run `trawl resume --index {index}` to continue",
            outcome.batches,
            plan.checkpoint_path.display()
        ))),
        Err(e) => Err(anyhow::anyhow!(e).context("Failed to write part files")),
    }
}
