//! tap-qualtrics - Survey response extraction

use anyhow::{Context, Result};
use clap::Parser;
use qualtrics_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use qualtrics_tap::stream::{
    JsonFileStateStore, JsonLinesSink, MemoryStateStore, StateStore, StreamDriver, StreamSchema,
};
use qualtrics_tap::TapConfig;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tap-qualtrics")]
#[command(author, version, about = "Extract Qualtrics survey responses as JSON lines")]
struct Cli {
    /// JSON config file; QUALTRICS_* environment variables are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replication state file, read at start and rewritten after a successful run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Print the stream catalog and exit
    #[arg(long)]
    discover: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("tap-qualtrics")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let schema = StreamSchema::survey_responses();
    if cli.discover {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &schema.catalog())?;
        writeln!(stdout)?;
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => TapConfig::from_file(path)?,
        None => TapConfig::from_env().context("no --config given and environment is incomplete")?,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            on_signal.cancel();
        }
    });

    let driver = StreamDriver::new(config, schema)?.with_cancellation(cancel);
    let store: Box<dyn StateStore> = match cli.state {
        Some(path) => Box::new(JsonFileStateStore::new(path)),
        None => Box::new(MemoryStateStore::default()),
    };
    let mut sink = JsonLinesSink::new(std::io::stdout().lock());

    let summary = driver.run_cycle(store.as_ref(), &mut sink).await?;
    info!(
        records = summary.records_emitted,
        skipped = summary.rows_skipped,
        bookmark = %summary.replication_key_value,
        "Extraction complete"
    );
    Ok(())
}
