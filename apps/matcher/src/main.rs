use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use matcher::config::Config;
use matcher::corpus::CsvRecordStore;
use matcher::db::create_pool;
use matcher::pipeline::stage::StageRunner;
use matcher::pipeline::{run_scheduler, Pipeline};
use matcher::ranking::CvRanker;
use matcher::scores::stats::{compare, JobOfferStats};
use matcher::scores::{PgScoreStore, ScoreGateway};

/// CV matcher: on-demand TF-IDF ranking of the CVs submitted for a job offer,
/// and a scheduled pipeline that scores them with external stage programs.
///
/// Configuration comes from the environment (and `.env` when present).
#[derive(Parser)]
#[command(name = "matcher", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scoring pipeline every PIPELINE_INTERVAL_SECS until Ctrl-C.
    Serve,

    /// Run exactly one pipeline pass and print its summary.
    RunOnce,

    /// Rank a job offer's CVs against its description.
    Rank {
        #[arg(long = "job-offer")]
        job_offer: i64,

        #[arg(long, conflicts_with = "description_file", required_unless_present = "description_file")]
        description: Option<String>,

        /// Read the description from a file instead.
        #[arg(long)]
        description_file: Option<PathBuf>,

        /// Shortlist size (1-20). Omitted: the best 5.
        #[arg(long)]
        top: Option<usize>,

        /// Only print the single best candidate.
        #[arg(long, conflicts_with = "top")]
        top_match: bool,
    },

    /// Statistics over the persisted scores of a job offer.
    Stats {
        #[arg(long = "job-offer")]
        job_offer: i64,
    },

    /// Side-by-side persisted scores for several candidates.
    Compare {
        #[arg(long = "job-offer")]
        job_offer: i64,

        #[arg(long = "user", required = true, num_args = 1..)]
        users: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve => {
            info!("Starting matcher v{}", env!("CARGO_PKG_VERSION"));
            let pipeline = Arc::new(build_pipeline(&config).await?);
            run_scheduler(pipeline, config.pipeline_interval, async {
                if tokio::signal::ctrl_c().await.is_err() {
                    // no signal handler: run until killed
                    std::future::pending::<()>().await;
                }
                info!("Shutdown requested");
            })
            .await;
        }

        Commands::RunOnce => {
            let pipeline = build_pipeline(&config).await?;
            print_json(&pipeline.run_pass().await)?;
        }

        Commands::Rank {
            job_offer,
            description,
            description_file,
            top,
            top_match,
        } => {
            let description = match (description, description_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Could not read {}", path.display()))?,
                (None, None) => anyhow::bail!("--description or --description-file is required"),
            };
            let ranker = CvRanker::new(Arc::new(CsvRecordStore::new(&config.cv_records_file)));

            // CPU-bound: keep it off the async workers
            if top_match {
                let best = tokio::task::spawn_blocking(move || ranker.top_match(job_offer, &description))
                    .await??;
                print_json(&best)?;
            } else {
                let rankings = tokio::task::spawn_blocking(move || match top {
                    Some(n) => ranker.rank(job_offer, &description, n),
                    None => ranker.best(job_offer, &description),
                })
                .await??;
                print_json(&rankings)?;
            }
        }

        Commands::Stats { job_offer } => {
            let scores = score_store(&config).await?.scores_for_job(job_offer).await?;
            print_json(&JobOfferStats::from_scores(&scores))?;
        }

        Commands::Compare { job_offer, users } => {
            let scores = score_store(&config).await?.scores_for_job(job_offer).await?;
            print_json(&compare(job_offer, &scores, &users))?;
        }
    }

    Ok(())
}

async fn score_store(config: &Config) -> Result<PgScoreStore> {
    let pool = create_pool(config.require_database_url()?).await?;
    Ok(PgScoreStore::new(pool))
}

async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let scores = score_store(config).await?;
    let records = CsvRecordStore::new(&config.cv_records_file);
    if !records.exists() {
        info!(
            "CV record store {} does not exist yet; passes will find nothing until it does",
            records.path().display()
        );
    }
    std::fs::create_dir_all(&config.stage_temp_dir).with_context(|| {
        format!("Could not create stage temp dir {}", config.stage_temp_dir.display())
    })?;

    Ok(Pipeline::new(
        Arc::new(records),
        Arc::new(scores),
        StageRunner::new(&config.stage_executable, &config.stage_working_dir),
        config.stages(),
        &config.stage_temp_dir,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
