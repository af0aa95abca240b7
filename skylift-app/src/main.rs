use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use settings::{RunSettings, log_config};
use skylift_common::SkyliftError;
use skylift_common::observability::init_logging;
use skylift_config::{DEFAULT_CONFIG_FILE, SkyliftConfig, SkyliftConfigLoader};
use skylift_http::HttpClient;
use skylift_import::{CheckpointStore, ImportPlan, ImportReport, Orchestrator, plan_import};
use skylift_runtime::SkyliftRuntime;
use skylift_social::bluesky::{BlueskyClient, Destination};
use skylift_social::twitter::load_archive;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod cli;
mod settings;

/// Base for media downloads; archive media URLs are absolute and override it.
const MEDIA_HOST: &str = "https://pbs.twimg.com/";

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins over file, flags win over both)
    let config = load_config(&cli)?;
    let log_path = init_logging(log_config(&config.logging, cli.verbose))?;
    tracing::debug!(log = %log_path.display(), "app.logging.ready");

    let settings = RunSettings::resolve(&cli, config)?;

    let runtime = SkyliftRuntime::build("skylift", None)?;
    let handle = runtime.handle();
    handle.cancel_on_ctrl_c();

    let outcome = runtime.block_on(run(settings, handle.cancellation()));
    runtime.shutdown(Duration::from_secs(1));
    outcome
}

fn load_config(cli: &Cli) -> Result<SkyliftConfig> {
    let loader = match &cli.config {
        Some(path) => SkyliftConfigLoader::new().with_file(path),
        None => SkyliftConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let config = loader
        .load()
        .map_err(|e| SkyliftError::Config(e.to_string()))?;
    Ok(config)
}

async fn run(settings: RunSettings, cancel: CancellationToken) -> Result<()> {
    let archive = load_archive(&settings.archive_path)
        .map_err(|e| SkyliftError::Archive(e.to_string()))?;

    let store = CheckpointStore::new(&settings.import.checkpoint_dir);
    let plan = plan_import(&archive, &settings.filters, store.load());
    print_plan(&plan, archive.len());

    let Some(credentials) = settings.credentials.filter(|_| !settings.dry_run) else {
        println!("dry run: nothing posted");
        return Ok(());
    };
    if plan.posts.is_empty() {
        println!("nothing to import");
        return Ok(());
    }

    let client = BlueskyClient::new(&credentials.service)
        .with_context(|| format!("invalid service URL {}", credentials.service))?;
    let session = client
        .authenticate(&credentials.identifier, &credentials.password)
        .await
        .map_err(|e| SkyliftError::Auth(e.to_string()))?;
    println!("logged in as {} ({})", session.handle, session.did);

    let media = HttpClient::new(MEDIA_HOST)?.with_timeout(Duration::from_secs(60));
    let orchestrator = Orchestrator::new(Arc::new(client), Arc::new(media), settings.import, cancel);
    let report = orchestrator
        .run(plan)
        .await
        .map_err(|e| SkyliftError::Checkpoint(e.to_string()))?;

    print_report(&report);
    Ok(())
}

fn print_plan(plan: &ImportPlan, archived: usize) {
    println!("archive: {archived} posts");
    for (stage, removed) in &plan.filter_report.removed {
        if *removed > 0 {
            println!("  {:<12} -{removed}", stage.name());
        }
    }
    println!(
        "to import: {} posts ({} thread links tracked, {} new)",
        plan.posts.len(),
        plan.checkpoint.threads.len(),
        plan.new_thread_keys
    );
    if let Some(last) = &plan.checkpoint.last_processed_id {
        println!("resuming after post {last}");
    }
}

fn print_report(report: &ImportReport) {
    println!(
        "posted {}, failed {}, rate-limit cooldowns {}, budget pauses {}",
        report.posted,
        report.failed.len(),
        report.cooldowns,
        report.budget_pauses
    );
    if !report.failed.is_empty() {
        println!("failed post ids: {}", report.failed.join(", "));
    }
    if report.cancelled {
        println!("interrupted; run again to resume");
    }
}
