//! wingman - dating coach command line
//!
//! Opens (and migrates) the local store, then runs one command: report the
//! schema version, list saved profiles, summarize inference usage, analyze a
//! directory of profile screenshots, or generate an artifact for a profile.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wingman_ai::cache::{
    ArtifactKind, AspectScores, AutoGenerator, DateIdeas, GeneratedArtifactCache, VirtueScores,
    Virtues11, Zodiac,
};
use wingman_ai::inference::{AuditedInference, HttpInferenceService, InferenceService};
use wingman_ai::media::ImageDirectoryExtractor;
use wingman_ai::pipeline::{save_analysis, AnalysisEvent, AnalysisPipeline};
use wingman_common::config::AppConfig;
use wingman_common::{ArtifactStore, SessionGuard};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ", ",
    env!("BUILD_PROFILE"),
    ")"
);

/// Command-line arguments for wingman
#[derive(Parser, Debug)]
#[command(name = "wingman")]
#[command(about = "Dating profile analysis and coaching")]
#[command(version = VERSION)]
struct Args {
    /// Data folder holding the database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `wingman_ai=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the store, apply pending migrations and report the schema version
    Migrate,
    /// List saved match profiles
    Profiles,
    /// Inference calls, failures and tokens per feature
    Usage,
    /// Analyze a directory of profile screenshots and save the result
    Analyze {
        /// Directory of screenshots, read in file-name order
        dir: PathBuf,
    },
    /// Generate (or regenerate) an artifact for a saved profile
    Generate {
        profile_id: i64,
        #[arg(value_enum)]
        kind: Kind,
        /// Replace an artifact that is already stored
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    VirtueScores,
    AspectScores,
    Virtues11,
    Zodiac,
    DateIdeas,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level).context("Invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let db_path = config.database_path(args.data_dir.as_deref());
    info!("Database: {}", db_path.display());

    let store = ArtifactStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open store at {}", db_path.display()))?;

    match args.command {
        Command::Migrate => {
            println!("Schema version {}", store.schema_version());
        }
        Command::Profiles => {
            for profile in store.list_match_profiles().await? {
                println!(
                    "{:>5}  {:<20} {:>4}  {:<8}  {}",
                    profile.id,
                    profile.name,
                    profile.age.map(|a| a.to_string()).unwrap_or_default(),
                    profile.analysis_phase.as_str(),
                    profile.app_source.as_deref().unwrap_or("-")
                );
            }
            let orphaned = store.orphaned_session_count().await?;
            if orphaned > 0 {
                warn!("{} coaching sessions reference deleted profiles", orphaned);
            }
        }
        Command::Usage => {
            for usage in store.inference_usage().await? {
                println!(
                    "{:<16} calls {:>5}  failures {:>4}  tokens in {:>8} out {:>8}",
                    usage.feature, usage.calls, usage.failures, usage.input_tokens, usage.output_tokens
                );
            }
        }
        Command::Analyze { dir } => analyze(&config, store, dir).await?,
        Command::Generate { profile_id, kind, force } => {
            let inference = inference_service(&config, &store)?;
            match kind {
                Kind::VirtueScores => generate::<VirtueScores>(&store, inference, profile_id, force).await?,
                Kind::AspectScores => generate::<AspectScores>(&store, inference, profile_id, force).await?,
                Kind::Virtues11 => generate::<Virtues11>(&store, inference, profile_id, force).await?,
                Kind::Zodiac => generate::<Zodiac>(&store, inference, profile_id, force).await?,
                Kind::DateIdeas => generate::<DateIdeas>(&store, inference, profile_id, force).await?,
            }
        }
    }

    Ok(())
}

fn inference_service(config: &AppConfig, store: &ArtifactStore) -> Result<Arc<dyn InferenceService>> {
    let http = HttpInferenceService::new(&config.inference).context("Failed to build HTTP client")?;
    Ok(Arc::new(AuditedInference::new(Arc::new(http), store.clone())))
}

async fn analyze(config: &AppConfig, store: ArtifactStore, dir: PathBuf) -> Result<()> {
    let inference = inference_service(config, &store)?;
    let identity = store.identity().get().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = AnalysisPipeline::new(
        inference.clone(),
        Arc::new(ImageDirectoryExtractor::new()),
        config.pipeline.clone(),
    )
    .with_events(tx);

    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AnalysisEvent::QuickRead { basics, .. } => info!(
                    "Quick read: {} {}",
                    basics.name.as_deref().unwrap_or("?"),
                    basics.age.map(|a| a.to_string()).unwrap_or_default()
                ),
                AnalysisEvent::BranchSettled { branch, status, .. } => {
                    info!("Scoring {:?}: {:?}", branch, status)
                }
                _ => {}
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, cancelling analysis");
                cancel.cancel();
            }
        })
    };

    let run = pipeline.run(&dir, identity.as_ref(), &cancel).await;
    ctrl_c.abort();
    drop(pipeline);
    let _ = reporter.await;

    if let Some(error) = &run.error {
        bail!("Analysis failed: {}", error);
    }
    if run.analysis.is_none() {
        println!("Analysis {} ({} frames kept)", run.state, run.frames.len());
        return Ok(());
    }

    let profile_id = save_analysis(&store, &run).await?;
    println!("Saved profile {} ({})", profile_id, run.state);

    let guard = SessionGuard::new();
    let cache = Arc::new(GeneratedArtifactCache::<Virtues11>::new(store, inference, profile_id));
    AutoGenerator::new(cache.clone(), guard).evaluate(None).await;
    if let Some(error) = cache.state().error {
        warn!("virtues11 generation failed: {}", error);
    }
    Ok(())
}

async fn generate<K: ArtifactKind>(
    store: &ArtifactStore,
    inference: Arc<dyn InferenceService>,
    profile_id: i64,
    force: bool,
) -> Result<()> {
    let cache = GeneratedArtifactCache::<K>::new(store.clone(), inference, profile_id);
    if force {
        cache.regenerate().await;
    } else {
        cache.generate().await;
    }

    let state = cache.state();
    if let Some(error) = state.error {
        bail!("{} generation failed: {}", K::NAME, error);
    }
    match state.data {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("{}: prerequisites missing", K::NAME),
    }
    Ok(())
}
