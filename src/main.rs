//! merge-photos: copy photos and their metadata from one Apple Photos library
//! into another.
//!
//! The source library is read through the `osxphotos` command-line tool and
//! the destination is driven by scripting the Photos application. A JSON
//! checkpoint next to the destination library remembers which photos were
//! already merged, so an interrupted or repeated run picks up where the last
//! one stopped without duplicating anything.

#![warn(clippy::all)]

mod cli;
mod config;
mod library;
mod merge;
pub mod retry;
mod state;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use library::{DestinationLibrary, OsxPhotosSource, PhotosApp};
use merge::{MergeOptions, Merger};
use state::{JsonMergeDb, MergeStore, RecordOutcome};
use types::Verbosity;

/// Run the merge command.
async fn run_merge(args: cli::MergeArgs) -> anyhow::Result<()> {
    let config = config::Config::from_cli(&args.libraries).await?;
    let verbosity = Verbosity::new(args.verbose);
    let (source_scope, destination_scope) = config.scope();

    let store = if args.dry_run {
        JsonMergeDb::open_ephemeral(&config.merge_db, &source_scope, &destination_scope, verbosity)
            .await?
    } else {
        JsonMergeDb::open(&config.merge_db, &source_scope, &destination_scope, verbosity).await?
    };

    let source = OsxPhotosSource::new(config.osxphotos.clone(), config.source.clone());
    let destination = PhotosApp::default();
    if args.dry_run {
        tracing::info!("Dry run: neither library will be modified");
    } else {
        verbosity.say(format_args!(
            "Opening destination library {}",
            config.destination.display()
        ));
        destination.open(&config.destination).await?;
        if let Err(e) = destination.hide().await {
            tracing::warn!("Could not hide Photos: {}", e);
        }
    }

    tracing::info!(
        "Merging {} into {}",
        config.source.display(),
        config.destination.display()
    );
    let options = MergeOptions {
        dry_run: args.dry_run,
        verbosity,
        person_keywords: args.person_keywords,
        no_progress_bar: args.no_progress_bar,
    };
    let mut merger = Merger::new(&source, &destination, &store, options);
    merger.merge_photos().await?;
    Ok(())
}

/// Run the status command.
async fn run_status(args: cli::StatusArgs) -> anyhow::Result<()> {
    let config = config::Config::from_cli(&args.libraries).await?;

    if !config.merge_db.exists() {
        println!("No merge database found at {}", config.merge_db.display());
        println!("Run a merge first to create the database.");
        return Ok(());
    }

    let (source_scope, destination_scope) = config.scope();
    let store = JsonMergeDb::open_ephemeral(
        &config.merge_db,
        &source_scope,
        &destination_scope,
        Verbosity::quiet(),
    )
    .await?;
    let summary = store.summary().await?;

    println!("Merge Database: {}", config.merge_db.display());
    println!("  Source:      {}", source_scope);
    println!("  Destination: {}", destination_scope);
    println!();
    println!("Photos:");
    println!("  Total:         {}", summary.total);
    println!("  Imported:      {}", summary.imported);
    println!("  Skipped:       {}", summary.skipped);
    println!("  Export errors: {}", summary.export_errors);
    println!("  Import errors: {}", summary.import_errors);
    if summary.incomplete > 0 {
        println!("  Incomplete:    {}", summary.incomplete);
    }

    if args.failed && (summary.failed() > 0 || summary.skipped > 0 || summary.incomplete > 0) {
        println!();
        println!("Failed, skipped or unfinished photos:");
        for record in store.records().await? {
            let outcome = record.outcome();
            let detail = match outcome {
                RecordOutcome::Imported => continue,
                RecordOutcome::Incomplete if !record.destination_photo_ids.is_empty() => {
                    "imported, metadata and albums unfinished"
                }
                _ => record.last_error.as_deref().unwrap_or("unknown error"),
            };
            println!(
                "  {} ({}) [{}] - {}",
                record.original_filename,
                record.source_photo_id,
                outcome.as_str(),
                detail
            );
        }
    }

    Ok(())
}

/// Ask for confirmation on stdin; true when the answer is `y`.
fn confirm() -> anyhow::Result<bool> {
    use std::io::Write;
    print!("Are you sure? [y/N] ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Run the reset-state command.
async fn run_reset_state(args: cli::ResetStateArgs) -> anyhow::Result<()> {
    let osxphotos = config::expand_tilde(&args.tools.osxphotos);
    let destination =
        config::resolve_destination(args.destination.as_deref(), &osxphotos).await?;
    let db_path = config::merge_db_path(&args.tools, &destination);

    if !db_path.exists() {
        println!("No merge database found at {}", db_path.display());
        return Ok(());
    }
    let destination_scope = destination.to_string_lossy().into_owned();

    if let Some(source) = &args.source {
        let source = config::canonical(&config::expand_tilde(source));
        let source_scope = source.to_string_lossy().into_owned();
        if !args.yes {
            println!("This will forget every merge from:");
            println!("  {}", source_scope);
            println!("recorded in {}", db_path.display());
            println!("Records of other source libraries are kept.");
            println!();
            if !confirm()? {
                println!("Cancelled.");
                return Ok(());
            }
        }
        let store =
            JsonMergeDb::open(&db_path, &source_scope, &destination_scope, Verbosity::quiet())
                .await?;
        let removed = store.clear_scope().await?;
        println!("Removed {} records.", removed);
        return Ok(());
    }

    if !args.yes {
        // Any non-empty scope works here; only the file's scope count is read.
        let store = JsonMergeDb::open_ephemeral(
            &db_path,
            &destination_scope,
            &destination_scope,
            Verbosity::quiet(),
        )
        .await?;
        let scopes = store.scope_count()?;

        println!("This will delete the merge database at:");
        println!("  {}", db_path.display());
        if scopes > 1 {
            println!(
                "It holds records for {} source libraries; all of them are deleted.",
                scopes
            );
            println!("Use --source to forget a single source library instead.");
        }
        println!("The next merge will consider every photo again.");
        println!();
        if !confirm()? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    std::fs::remove_file(&db_path)?;
    println!("Merge database deleted.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    match cli.command {
        Command::Merge(args) => run_merge(args).await,
        Command::Status(args) => run_status(args).await,
        Command::ResetState(args) => run_reset_state(args).await,
    }
}
