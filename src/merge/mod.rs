//! Merge driver.
//!
//! Walks the source library one photo at a time: skip what the checkpoint
//! store says is finished, export into a private scratch directory, import
//! into the destination, copy metadata onto every created media item, place
//! the items in the matching albums and record the outcome.

pub mod albums;
pub mod error;

pub use albums::AlbumPlacer;
pub use error::MergeError;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::library::{DestinationLibrary, ExportRequest, LibraryError, SourceLibrary, SourcePhoto};
use crate::state::{MergeRecord, MergeStore, MetadataSnapshot};
use crate::types::Verbosity;

/// Options for a merge run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Report what would be merged without exporting or importing anything.
    pub dry_run: bool,
    pub verbosity: Verbosity,
    /// Add a `People/<name>` keyword for every named person in the photo.
    pub person_keywords: bool,
    pub no_progress_bar: bool,
}

/// What happened to one source photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOutcome {
    /// Imported by an earlier run.
    AlreadyMerged,
    /// Skipped by an earlier run because it had no file.
    PreviouslySkipped,
    /// No file could be resolved; recorded as permanently skipped.
    Skipped,
    /// Dry run: would have been merged.
    WouldMerge,
    ExportFailed,
    ImportFailed,
    Merged { destination_ids: Vec<String> },
}

/// Counts for a merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub total: usize,
    pub merged: usize,
    pub already_merged: usize,
    pub skipped: usize,
    pub export_failed: usize,
    pub import_failed: usize,
    pub would_merge: usize,
}

impl MergeStats {
    fn add(&mut self, outcome: &PhotoOutcome) {
        self.total += 1;
        match outcome {
            PhotoOutcome::AlreadyMerged => self.already_merged += 1,
            PhotoOutcome::PreviouslySkipped | PhotoOutcome::Skipped => self.skipped += 1,
            PhotoOutcome::WouldMerge => self.would_merge += 1,
            PhotoOutcome::ExportFailed => self.export_failed += 1,
            PhotoOutcome::ImportFailed => self.import_failed += 1,
            PhotoOutcome::Merged { .. } => self.merged += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.export_failed + self.import_failed
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Export,
    Import,
}

/// Drives a merge from one library into another.
pub struct Merger<'a> {
    source: &'a dyn SourceLibrary,
    destination: &'a dyn DestinationLibrary,
    store: &'a dyn MergeStore,
    options: MergeOptions,
    albums: AlbumPlacer,
    progress: ProgressBar,
}

impl<'a> Merger<'a> {
    pub fn new(
        source: &'a dyn SourceLibrary,
        destination: &'a dyn DestinationLibrary,
        store: &'a dyn MergeStore,
        options: MergeOptions,
    ) -> Self {
        Self {
            source,
            destination,
            store,
            options,
            albums: AlbumPlacer::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Merge every photo of the source library.
    ///
    /// Per-photo export and import failures are recorded and counted; any
    /// other error stops the run.
    pub async fn merge_photos(&mut self) -> Result<MergeStats, MergeError> {
        let started = Instant::now();
        let verbosity = self.options.verbosity;

        verbosity.say(format_args!(
            "Loading photos from {}",
            self.source.path().display()
        ));
        let photos = self.source.photos().await?;
        tracing::info!(
            "Merging {} photos from {}",
            photos.len(),
            self.source.path().display()
        );

        // Verbose narration would fight with the bar for the terminal.
        self.progress = create_progress_bar(
            self.options.no_progress_bar || verbosity.is_verbose(),
            photos.len() as u64,
        );

        let mut stats = MergeStats::default();
        for photo in &photos {
            self.progress.set_message(photo.original_filename.clone());
            let outcome = self.merge_one(photo).await;
            self.progress.inc(1);
            stats.add(&outcome?);
        }
        self.progress.finish_and_clear();

        log_summary(&stats, self.options.dry_run, started.elapsed());
        Ok(stats)
    }

    /// Merge a single photo and record the outcome.
    pub async fn merge_one(&mut self, photo: &SourcePhoto) -> Result<PhotoOutcome, MergeError> {
        let verbosity = self.options.verbosity;

        let existing = self.store.get(&photo.uuid, None).await?;
        if existing.iter().any(|r| r.imported) {
            verbosity.say(format_args!(
                "Skipping {} ({}), already merged",
                photo.original_filename, photo.uuid
            ));
            return Ok(PhotoOutcome::AlreadyMerged);
        }
        if existing.iter().any(|r| r.skipped) {
            verbosity.say(format_args!(
                "Skipping {} ({}), previously skipped",
                photo.original_filename, photo.uuid
            ));
            return Ok(PhotoOutcome::PreviouslySkipped);
        }

        // Imported by an earlier run that stopped before metadata and albums
        // were done: finish with the recorded ids instead of importing again.
        if let Some(partial) = existing
            .iter()
            .find(|r| !r.destination_photo_ids.is_empty())
        {
            if self.options.dry_run {
                self.progress.suspend(|| {
                    tracing::info!(
                        "Would finish merging {} ({})",
                        photo.original_filename,
                        photo.uuid
                    )
                });
                return Ok(PhotoOutcome::WouldMerge);
            }
            verbosity.say(format_args!(
                "Resuming {} ({}) as {}",
                photo.original_filename,
                photo.uuid,
                partial.destination_photo_ids.join(", ")
            ));
            return self
                .finish(
                    photo,
                    &photo.original_filename,
                    partial.exported_filenames.clone(),
                    partial.destination_photo_ids.clone(),
                )
                .await;
        }

        let Some(resolved) = photo.resolved_path() else {
            self.progress.suspend(|| {
                tracing::warn!(
                    "Skipping {} ({}): no file in the source library",
                    photo.original_filename,
                    photo.uuid
                )
            });
            let mut record = MergeRecord::new(&photo.uuid, &photo.original_filename);
            record.skipped = true;
            record.last_error = Some("no file path".to_string());
            self.store.upsert(record).await?;
            return Ok(PhotoOutcome::Skipped);
        };
        let filename = photo.export_filename(resolved);

        if self.options.dry_run {
            let albums: Vec<String> = photo.albums.iter().map(|a| a.display_path()).collect();
            self.progress.suspend(|| {
                if albums.is_empty() {
                    tracing::info!("Would merge {}", filename);
                } else {
                    tracing::info!("Would merge {} into {}", filename, albums.join(", "));
                }
            });
            return Ok(PhotoOutcome::WouldMerge);
        }

        // Removed with everything the exporter wrote when it goes out of scope.
        let scratch = tempfile::Builder::new()
            .prefix("merge-photos-")
            .tempdir()
            .map_err(MergeError::Scratch)?;

        let request = ExportRequest {
            filename: photo.export_stem(),
            edited: photo.uses_edited(),
            live_photo: true,
            raw_photo: true,
        };
        verbosity.say(format_args!("Exporting {}", filename));
        let exported = match self.source.export(photo, scratch.path(), &request).await {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                let reason = format!("export of {} produced no files", filename);
                return self.record_failure(photo, Stage::Export, &[], reason).await;
            }
            Err(e) if e.is_photo_failure() => {
                return self
                    .record_failure(photo, Stage::Export, &[], e.to_string())
                    .await;
            }
            Err(e) => return Err(e.into()),
        };

        verbosity.say(format_args!("Importing {}", filename));
        let destination_ids = match self.destination.import_photos(&exported).await {
            Ok(ids) if !ids.is_empty() => ids,
            Ok(_) => {
                let reason = format!("import of {} created no media items", filename);
                return self
                    .record_failure(photo, Stage::Import, &exported, reason)
                    .await;
            }
            Err(e) if e.is_photo_failure() => {
                return self
                    .record_failure(photo, Stage::Import, &exported, e.to_string())
                    .await;
            }
            Err(e) => return Err(e.into()),
        };

        // Written before metadata so a failure past this point never leads
        // to a second import.
        let exported_filenames = file_names(&exported);
        let mut record = MergeRecord::new(&photo.uuid, &photo.original_filename);
        record.exported_filenames = exported_filenames.clone();
        record.destination_photo_ids = destination_ids.clone();
        self.store.upsert(record).await?;

        self.finish(photo, &filename, exported_filenames, destination_ids)
            .await
    }

    /// Apply metadata and albums to imported items, then mark the photo
    /// imported.
    async fn finish(
        &mut self,
        photo: &SourcePhoto,
        filename: &str,
        exported_filenames: Vec<String>,
        destination_ids: Vec<String>,
    ) -> Result<PhotoOutcome, MergeError> {
        let verbosity = self.options.verbosity;

        let keywords = self.keywords_for(photo);
        for id in &destination_ids {
            self.apply_metadata(id, photo, &keywords).await?;
        }

        for album in &photo.albums {
            let handle = self
                .albums
                .resolve(self.destination, album, verbosity)
                .await?;
            verbosity.say(format_args!(
                "Adding {} to album {}",
                filename,
                album.display_path()
            ));
            self.destination
                .add_to_album(&handle, &destination_ids)
                .await?;
        }

        let mut record = MergeRecord::new(&photo.uuid, &photo.original_filename);
        record.imported = true;
        record.exported_filenames = exported_filenames;
        record.destination_photo_ids = destination_ids.clone();
        record.metadata = Some(MetadataSnapshot::capture(photo, &keywords));
        self.store.upsert(record).await?;

        verbosity.say(format_args!(
            "Merged {} as {}",
            filename,
            destination_ids.join(", ")
        ));
        Ok(PhotoOutcome::Merged { destination_ids })
    }

    fn keywords_for(&self, photo: &SourcePhoto) -> Vec<String> {
        let mut keywords = photo.keywords.clone();
        if self.options.person_keywords {
            keywords.extend(photo.persons.iter().map(|p| format!("People/{}", p)));
        }
        keywords
    }

    async fn apply_metadata(
        &self,
        id: &str,
        photo: &SourcePhoto,
        keywords: &[String],
    ) -> Result<(), LibraryError> {
        self.options
            .verbosity
            .say(format_args!("Setting metadata for {}", id));
        self.destination.set_favorite(id, photo.favorite).await?;
        self.destination
            .set_description(id, photo.description.as_deref().unwrap_or_default())
            .await?;
        self.destination
            .set_title(id, photo.title.as_deref().unwrap_or_default())
            .await?;
        self.destination.set_keywords(id, keywords).await?;
        if let Some(location) = photo.location {
            self.destination.set_location(id, location).await?;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        photo: &SourcePhoto,
        stage: Stage,
        exported: &[PathBuf],
        reason: String,
    ) -> Result<PhotoOutcome, MergeError> {
        self.progress.suspend(|| match stage {
            Stage::Export => tracing::error!(
                "Error exporting {} ({}): {}",
                photo.original_filename,
                photo.uuid,
                reason
            ),
            Stage::Import => tracing::error!(
                "Error importing {} ({}): {}",
                photo.original_filename,
                photo.uuid,
                reason
            ),
        });

        let mut record = MergeRecord::new(&photo.uuid, &photo.original_filename);
        record.exported_filenames = file_names(exported);
        record.last_error = Some(reason);
        let outcome = match stage {
            Stage::Export => {
                record.export_error = true;
                PhotoOutcome::ExportFailed
            }
            Stage::Import => {
                record.import_error = true;
                PhotoOutcome::ImportFailed
            }
        };
        self.store.upsert(record).await?;
        Ok(outcome)
    }
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// Create a progress bar with a consistent template.
///
/// Returns `ProgressBar::hidden()` when `hidden` is set or stdout is not a
/// terminal.
fn create_progress_bar(hidden: bool, total: u64) -> ProgressBar {
    if hidden || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

fn log_summary(stats: &MergeStats, dry_run: bool, elapsed: Duration) {
    if dry_run {
        tracing::info!("── Dry Run Summary ──");
        tracing::info!(
            "  {} would be merged, {} already merged, {} skipped, {} total",
            stats.would_merge,
            stats.already_merged,
            stats.skipped,
            stats.total
        );
    } else {
        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} merged, {} already merged, {} skipped, {} failed, {} total",
            stats.merged,
            stats.already_merged,
            stats.skipped,
            stats.failed(),
            stats.total
        );
        if stats.failed() > 0 {
            tracing::warn!(
                "  {} export errors, {} import errors; rerun to retry them",
                stats.export_failed,
                stats.import_failed
            );
        }
    }
    tracing::info!("  elapsed: {}", format_duration(elapsed));
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
