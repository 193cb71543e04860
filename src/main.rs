use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod annotations;
mod config;
mod dataset;
mod db;
mod error;
mod filename;
mod ingest;
mod models;
mod normalize;
mod pipeline;
mod report;
mod schedule;
mod taxonomy;
mod text;
mod training;

use config::{PathsConfig, PipelineConfig};
use models::{Community, ManualAnnotation};

#[derive(Parser)]
#[command(name = "sismia-pipeline")]
#[command(about = "Builds the canonical event dataset from platform attendance exports", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "SISMIA_CONFIG")]
    config: Option<PathBuf>,
    /// Use the standard layout below this directory instead of the configured paths
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest exports, merge manual fields and write the canonical dataset
    Run,
    /// Record manual attributes for one event
    Annotate {
        #[arg(long)]
        event: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        unit_cost: Option<f64>,
        /// Mark the unit cost as confirmed
        #[arg(long)]
        validated: bool,
        #[arg(long)]
        collaboration: Option<bool>,
        #[arg(long)]
        activity: Option<String>,
    },
    /// Verify that pay events are ready to train models on
    CheckTraining {
        #[arg(long)]
        community: Option<String>,
    },
    /// Suggest the next pay event date for a community
    SuggestDate {
        #[arg(long)]
        community: String,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Mirror the canonical dataset into Postgres
    Publish,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sismia_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir.as_deref() {
        config.paths = PathsConfig::rooted_at(data_dir);
    }

    match cli.command {
        Commands::Run => match pipeline::run(&config) {
            Ok(summary) => {
                println!(
                    "Dataset written to {} with {} events ({} files processed, {} excluded).",
                    config.paths.dataset.display(),
                    summary.events_written,
                    summary.files_processed.len(),
                    summary.files_skipped.len()
                );
                if !summary.unvalidated_pay_events.is_empty() {
                    println!(
                        "{} pay events still need a validated unit cost; see {}.",
                        summary.unvalidated_pay_events.len(),
                        config.paths.report.display()
                    );
                }
            }
            Err(err) if err.is_terminal_validation() => {
                error!("run stopped: {err}");
                return Err(err.into());
            }
            Err(err) => return Err(err).context("pipeline run failed"),
        },
        Commands::Annotate {
            event,
            date,
            unit_cost,
            validated,
            collaboration,
            activity,
        } => {
            if unit_cost.is_some_and(|cost| !cost.is_finite() || cost < 0.0) {
                anyhow::bail!("--unit-cost must be a non-negative amount");
            }
            let path = &config.paths.annotations;
            let mut annotations = annotations::load_annotations(path)?;
            let key = filename::event_key(&event, date);
            let existing = annotations.iter().find(|a| a.key() == key).cloned();

            let update = ManualAnnotation {
                name: event.trim().to_string(),
                date,
                unit_cost: unit_cost.or(existing.as_ref().and_then(|a| a.unit_cost)),
                validated: validated || existing.as_ref().is_some_and(|a| a.validated),
                collaboration: collaboration.or(existing.as_ref().and_then(|a| a.collaboration)),
                activity: activity.or(existing.and_then(|a| a.activity)),
            };
            let updated = annotations::upsert(&mut annotations, update);
            annotations::save_annotations(path, &annotations)?;
            info!(event = %key, updated, "annotation saved");
            println!(
                "Annotation for {event} on {date} {} in {}.",
                if updated { "updated" } else { "added" },
                path.display()
            );
        }
        Commands::CheckTraining { community } => {
            let events = dataset::read_dataset(&config.paths.dataset)
                .context("canonical dataset missing; run the pipeline first")?;
            let community = community.as_deref().map(Community::new);
            let rows = training::training_rows(&events, community.as_ref())?;
            println!("{} pay events ready for training.", rows.len());
        }
        Commands::SuggestDate { community } => {
            let events = dataset::read_dataset(&config.paths.dataset)
                .context("canonical dataset missing; run the pipeline first")?;
            let community = Community::new(&community);
            match schedule::suggest_next_date(
                &events,
                &community,
                config.schedule.days_between_events,
            ) {
                Some(suggestion) => {
                    dataset::write_rows(
                        &config.paths.suggestion,
                        std::slice::from_ref(&suggestion),
                    )?;
                    println!("Next {} event suggested for {}.", community, suggestion.date);
                }
                None => println!("No pay events for {community}; nothing to suggest."),
            }
        }
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Publish => {
            let events = dataset::read_dataset(&config.paths.dataset)
                .context("canonical dataset missing; run the pipeline first")?;
            let pool = connect().await?;
            let run_id = db::publish_events(&pool, &config.paths.dataset, &events).await?;
            println!("Published {} events (run {run_id}).", events.len());
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to publish the dataset")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}
