//! Slipway - multi-repository release orchestration CLI
//!
//! ## Commands
//!
//! - `plan`: resolve current versions and show what each repository would get
//! - `run`: cut release branches/tags and collect the shipped work items

mod export;
mod manifest;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use slipway_core::api::{SourceControlApi, WorkTrackingApi};
use slipway_core::model::{ProcessingResult, RepoOutcome, Repository};
use slipway_core::pipeline::{consolidated_work_items, ReleasePipeline};
use slipway_core::refs::RefResolver;
use slipway_core::version::{next_version, CurrentVersion};
use slipway_remote::RestClient;

use manifest::BatchManifest;

#[derive(Parser)]
#[command(name = "slipway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-repository release orchestration", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the version each repository would be released as, without writing
    Plan {
        /// Path to the batch manifest (JSON)
        #[arg(short, long, default_value = "slipway.json")]
        manifest: PathBuf,
    },

    /// Cut release branches/tags and collect shipped work items
    Run {
        /// Path to the batch manifest (JSON)
        #[arg(short, long, default_value = "slipway.json")]
        manifest: PathBuf,

        /// Write the consolidated work items as a Markdown table
        #[arg(long)]
        export_md: Option<PathBuf>,

        /// Write the consolidated work items as CSV
        #[arg(long)]
        export_csv: Option<PathBuf>,

        /// Work-item field to stamp with the released version, e.g.
        /// `Custom.ReleasedIn`
        #[arg(long)]
        stamp_field: Option<String>,
    },
}

fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Resolve each manifest entry's current version against the remote.
///
/// A failed lookup becomes the `LookupFailed` sentinel rather than an
/// error: the bump policy seeds such repositories like never-released ones.
async fn load_repositories(
    client: &Arc<RestClient>,
    manifest: &BatchManifest,
) -> Vec<Repository> {
    let resolver = RefResolver::new(Arc::clone(client) as Arc<dyn SourceControlApi>);
    let mut repositories = Vec::with_capacity(manifest.repositories.len());
    for entry in &manifest.repositories {
        let current = match resolver.latest_release_version(&entry.name).await {
            Ok(Some(version)) => CurrentVersion::Released(version),
            Ok(None) => CurrentVersion::NoReleases,
            Err(e) => {
                warn!(repo = %entry.name, error = %e, "version lookup failed, seeding");
                CurrentVersion::LookupFailed
            }
        };
        repositories.push(
            Repository::new(&entry.name, current, entry.bump)
                .with_source_branch(&entry.source_branch)
                .with_selected(entry.selected),
        );
    }
    repositories
}

async fn cmd_plan(manifest_path: &PathBuf) -> Result<()> {
    let manifest = BatchManifest::load(manifest_path)?;
    let client = Arc::new(RestClient::new(manifest.remote_config()));
    let repositories = load_repositories(&client, &manifest).await;

    for repo in &repositories {
        if !repo.selected {
            println!("{}: deselected, will be skipped", repo.name);
            continue;
        }
        let next = next_version(&repo.current_version, repo.bump);
        println!(
            "{}: {} -> {} (branch {}, tag {})",
            repo.name,
            repo.current_version,
            next,
            next.release_branch(),
            next.tag_name()
        );
    }
    Ok(())
}

/// Write the released version into `field` on every shipped work item.
///
/// An item shipped by several repositories is stamped once, with the version
/// of the first repository that shipped it. Failures are logged per item and
/// never fail the run: the release itself already happened.
async fn stamp_work_items(client: &RestClient, field: &str, results: &[ProcessingResult]) {
    let mut seen = HashSet::new();
    for result in results {
        if let RepoOutcome::Completed { version, work_items } = &result.outcome {
            for item in work_items {
                if !seen.insert(item.id) {
                    continue;
                }
                if let Err(e) = client
                    .update_work_item_field(item.id, field, &version.to_string())
                    .await
                {
                    warn!(work_item = item.id, error = %e, "version stamp failed");
                }
            }
        }
    }
}

async fn cmd_run(
    manifest_path: &PathBuf,
    export_md: Option<&PathBuf>,
    export_csv: Option<&PathBuf>,
    stamp_field: Option<&str>,
) -> Result<()> {
    let manifest = BatchManifest::load(manifest_path)?;
    let client = Arc::new(RestClient::new(manifest.remote_config()));
    let repositories = load_repositories(&client, &manifest).await;

    let pipeline = ReleasePipeline::new(
        Arc::clone(&client) as Arc<dyn SourceControlApi>,
        Arc::clone(&client) as Arc<dyn WorkTrackingApi>,
    );

    // Ctrl-C stops the batch at the next repository boundary.
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let results = pipeline.run_release_batch(&repositories).await;

    for result in &results {
        match &result.outcome {
            RepoOutcome::Completed { version, work_items } => {
                println!(
                    "ok   {}: released {} ({} work items)",
                    result.repository,
                    version,
                    work_items.len()
                );
            }
            RepoOutcome::Failed { error } => {
                println!("fail {}: {}", result.repository, error);
            }
        }
    }

    let consolidated = consolidated_work_items(&results);
    println!(
        "{} repositories processed, {} unique work items shipped",
        results.len(),
        consolidated.len()
    );

    if let Some(field) = stamp_field {
        stamp_work_items(&client, field, &results).await;
    }

    if let Some(path) = export_md {
        std::fs::write(path, export::to_markdown(&consolidated))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    if let Some(path) = export_csv {
        std::fs::write(path, export::to_csv(&consolidated))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    if results.iter().any(|r| !r.is_success()) {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match &cli.command {
        Commands::Plan { manifest } => cmd_plan(manifest).await,
        Commands::Run {
            manifest,
            export_md,
            export_csv,
            stamp_field,
        } => {
            cmd_run(
                manifest,
                export_md.as_ref(),
                export_csv.as_ref(),
                stamp_field.as_deref(),
            )
            .await
        }
    }
}
