use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use conferix_scraper::apis::create_extractor;
use conferix_scraper::config::Config;
use conferix_scraper::constants;
use conferix_scraper::infra::{HttpIngestClient, HttpPageSession};
use conferix_scraper::observability::{init_logging, init_metrics};
use conferix_scraper::pipeline::orchestrator::{RunOptions, RunSummary};
use conferix_scraper::pipeline::{ExtractorStatus, RunOrchestrator};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "conferix_scraper")]
#[command(about = "Scrapes professional events and posts them to the ingestion endpoint")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extractors and submit their events
    Run {
        /// Extractors to run (comma-separated). Listed extractors run even when disabled in the config.
        #[arg(long)]
        sources: Option<String>,
        /// Extract and normalize but do not POST
        #[arg(long)]
        dry_run: bool,
    },
    /// List extractors and whether they are enabled
    List,
}

/// `(name, enabled)` for every extractor the run should know about.
fn select_extractors(config: &Config, sources: Option<&str>) -> anyhow::Result<Vec<(&'static str, bool)>> {
    let all = constants::get_supported_extractors();
    let Some(list) = sources else {
        return Ok(all.into_iter().map(|name| (name, config.is_enabled(name))).collect());
    };

    let requested: Vec<&str> = list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if let Some(unknown) = requested.iter().find(|r| !all.iter().any(|n| n == *r)) {
        bail!("Unknown extractor '{}'. Available: {}", unknown, all.join(", "));
    }
    Ok(all.into_iter().filter(|name| requested.contains(name)).map(|name| (name, true)).collect())
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Run {} results:", summary.run_id);
    for s in &summary.sources {
        println!("   {:<14} {:<10} {:>4} listings {:>4} events", s.source, s.status.as_str(), s.listings, s.events);
        if let ExtractorStatus::Failed(msg) = &s.status {
            println!("      ⚠️  {}", msg);
        }
    }
    println!("   Total events: {}", summary.total_events);
    println!("   Posted: {} in {} batches", summary.posted, summary.batches);
    println!("   Created: {}  Updated: {}  Skipped: {}", summary.created, summary.updated, summary.skipped);
    println!("   Errors: {}", summary.errors);
    if let Some(path) = &summary.snapshot {
        println!("   Output file: {}", path.display());
    }
    println!("   Elapsed: {:.1}s", summary.elapsed_secs);
}

async fn run(config: Config, sources: Option<String>, dry_run: bool) -> anyhow::Result<()> {
    let selected = select_extractors(&config, sources.as_deref())?;

    let session = HttpPageSession::new(&config.browser.user_agent, config.navigation_timeout())
        .context("Failed to build page session")?;
    let ingest = HttpIngestClient::new(config.webhook_url.clone(), config.navigation_timeout())
        .context("Failed to build ingestion client")?;

    let mut options = RunOptions::from_config(&config);
    options.dry_run = dry_run;

    let mut orchestrator = RunOrchestrator::new(Box::new(session), Box::new(ingest), options);
    for (name, enabled) in selected {
        if let Some(extractor) = create_extractor(name) {
            orchestrator.add_extractor(extractor, enabled);
        }
    }

    info!("Posting to {}", config.webhook_url);
    let summary = orchestrator.run().await.context("Run failed")?;
    print_summary(&summary);
    Ok(())
}

fn list(config: &Config) {
    println!("{:<14} {:<12} {}", "NAME", "SOURCE", "ENABLED");
    for name in constants::get_supported_extractors() {
        if let Some(extractor) = create_extractor(name) {
            println!("{:<14} {:<12} {}", name, extractor.defaults().source, config.is_enabled(name));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config).with_context(|| format!("Loading {}", cli.config.display()))?;

    let _guard = init_logging(&config.run.log_dir);
    if let Some(port) = config.metrics.port {
        init_metrics(port);
    }

    let result = match cli.command {
        Commands::Run { sources, dry_run } => run(config, sources, dry_run).await,
        Commands::List => {
            list(&config);
            Ok(())
        }
    };
    if let Err(e) = &result {
        error!("Fatal: {:#}", e);
    }
    result
}
