//! csv-splitter: split one delimited file into many by size, row count or a grouping column.

use anyhow::{bail, Context};
use clap::Parser;
use csv_splitter::{AllowList, ByteSize, SplitConfig, SplitJob};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Flexible CSV splitting tool.
#[derive(Parser, Debug)]
#[command(name = "csv-splitter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input CSV file.
    input: PathBuf,

    /// Folder to save the output CSV files.
    output: PathBuf,

    /// Maximum file size for split files (e.g. 500, 50kB, 200MB, 1GB).
    #[arg(long)]
    size: Option<ByteSize>,

    /// Maximum number of rows per split file.
    #[arg(long)]
    rows: Option<u64>,

    /// Zero-based column index whose value groups rows into files.
    #[arg(long, visible_aliases = ["ext", "extcol"])]
    group_column: Option<usize>,

    /// Comma-separated extensions to keep (e.g. 'txt,xml'); other rows go to the overflow file.
    #[arg(long, visible_alias = "extlist", requires = "group_column")]
    allow: Option<String>,

    /// Prefix for the split file names.
    #[arg(long, default_value = "split")]
    prefix: String,

    /// Field delimiter of the input, reused for the output.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Path to the log file.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Only log how the first N rows would be keyed; no split files are written.
    #[arg(long, num_args = 0..=1, default_missing_value = "20", value_name = "N")]
    inspect: Option<usize>,

    /// Console log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let job = build_job(args)?;
    let outcome = csv_splitter::run(&job)?;

    for file in &outcome.summary.files {
        info!("Created file: {}", file.path.display());
    }
    info!(
        "Split {} rows into {} files ({} overflowed)",
        outcome.summary.rows_read,
        outcome.summary.files.len(),
        outcome.summary.rows_overflowed
    );
    info!("Log written to {}", outcome.log_path.display());

    Ok(())
}

fn build_job(args: Args) -> anyhow::Result<SplitJob> {
    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }

    let mut config = SplitConfig::new()
        .with_prefix(args.prefix)
        .with_delimiter(args.delimiter as u8);

    if let Some(size) = args.size {
        config = config.with_max_size(size);
    }
    if let Some(rows) = args.rows {
        config = config.with_max_rows(rows);
    }
    if let Some(column) = args.group_column {
        config = config.with_group_column(column);
    }
    if let Some(list) = &args.allow {
        let allow = AllowList::parse(list).context("invalid --allow list")?;
        config = config.with_allow_list(allow);
    }

    let mut job = SplitJob::new(args.input, args.output, config);
    if let Some(path) = args.log {
        job = job.with_log_path(path);
    }
    if let Some(rows) = args.inspect {
        job = job.with_inspect(rows);
    }

    Ok(job)
}
