mod content;
mod fetch;
mod hits;
mod output;
mod pipeline;
mod qa;
mod settings;
mod structurer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use fetch::cache::{CachedSource, FetchCache};
use fetch::LegislationClient;
use pipeline::checkpoint::CheckpointStore;
use pipeline::{Concurrency, Pipeline};
use settings::Settings;
use structurer::service::ChatStructuringService;
use structurer::Structurer;

#[derive(Parser)]
#[command(name = "legis_qa", about = "Harvest in-force legislation and synthesize QA training pairs")]
struct Cli {
    /// Documents structured concurrently (default: all at once)
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,
    /// JSON Lines output file
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Discard any saved progress and start from the first stage
    #[arg(long)]
    restart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if cli.batch_size.is_some() {
        settings.batch_size = cli.batch_size;
    }
    if let Some(output) = cli.output {
        settings.output_path = output;
    }

    let service = ChatStructuringService::connect(&settings.structuring)
        .await
        .context("Structuring service is not available")?;

    let checkpoints = CheckpointStore::new(&settings.checkpoint_path);
    if cli.restart {
        checkpoints.clear()?;
        println!("Discarded saved progress at {}", checkpoints.path().display());
    }

    let cache = FetchCache::new(&settings.cache.dir, chrono::Duration::hours(settings.cache.ttl_hours));
    let source = CachedSource::new(LegislationClient::new(settings.api.clone())?, cache);

    let mut pipeline = Pipeline::new(
        Arc::new(source),
        Structurer::new(Arc::new(service)),
        checkpoints,
        &settings.output_path,
    )
    .with_concurrency(Concurrency::from_batch_size(settings.batch_size));

    let summary = pipeline.run().await?;

    if let Some(stage) = summary.resumed_after {
        println!("Resumed after: {}", stage.label());
    }
    if let Some(documents) = summary.documents {
        println!("Documents structured: {}", documents);
    }
    println!("Overall progress: {:.1}%", summary.overall_progress);
    println!("Total QA pairs generated: {}", summary.qa_pairs);
    println!("\nDone in {}", format_duration(t0.elapsed()));

    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
