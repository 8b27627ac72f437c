//! Types for the merge checkpoint store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::library::{AlbumInfo, Location, SourcePhoto};

/// Written into every record so a document can be traced to the build that
/// produced it.
pub const RECORD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of a record: the merge scope plus the source photo id.
///
/// Field order gives the on-disk ordering: grouped by scope, then by photo.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub source_library: String,
    pub destination_library: String,
    pub source_photo_id: String,
}

/// Copy of the metadata applied to the destination, kept for audit only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSnapshot {
    pub favorite: bool,
    pub description: Option<String>,
    pub title: Option<String>,
    pub keywords: Vec<String>,
    pub albums: Vec<AlbumInfo>,
    pub persons: Vec<String>,
    pub location: Option<Location>,
}

impl MetadataSnapshot {
    /// Snapshot of `photo` with the keywords actually written.
    pub fn capture(photo: &SourcePhoto, keywords: &[String]) -> Self {
        Self {
            favorite: photo.favorite,
            description: photo.description.clone(),
            title: photo.title.clone(),
            keywords: keywords.to_vec(),
            albums: photo.albums.clone(),
            persons: photo.persons.clone(),
            location: photo.location,
        }
    }
}

/// Progress of one source photo within one merge scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source_photo_id: String,
    /// Scope; overwritten by the store on every upsert.
    #[serde(default)]
    pub source_library: String,
    #[serde(default)]
    pub destination_library: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub export_error: bool,
    #[serde(default)]
    pub import_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub exported_filenames: Vec<String>,
    #[serde(default)]
    pub destination_photo_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataSnapshot>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl MergeRecord {
    /// A fresh record with no outcome yet.
    pub fn new(source_photo_id: impl Into<String>, original_filename: impl Into<String>) -> Self {
        Self {
            source_photo_id: source_photo_id.into(),
            source_library: String::new(),
            destination_library: String::new(),
            original_filename: original_filename.into(),
            imported: false,
            skipped: false,
            export_error: false,
            import_error: false,
            last_error: None,
            exported_filenames: Vec::new(),
            destination_photo_ids: Vec::new(),
            metadata: None,
            version: RECORD_VERSION.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            source_library: self.source_library.clone(),
            destination_library: self.destination_library.clone(),
            source_photo_id: self.source_photo_id.clone(),
        }
    }

    /// Imported and skipped photos are never processed again; error
    /// records are retried on the next run.
    pub fn is_final(&self) -> bool {
        self.imported || self.skipped
    }

    pub fn outcome(&self) -> RecordOutcome {
        if self.imported {
            RecordOutcome::Imported
        } else if self.skipped {
            RecordOutcome::Skipped
        } else if self.import_error {
            RecordOutcome::ImportError
        } else if self.export_error {
            RecordOutcome::ExportError
        } else {
            RecordOutcome::Incomplete
        }
    }
}

/// Classification of a record for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Imported,
    Skipped,
    ExportError,
    ImportError,
    /// Imported but metadata and albums not yet applied, or written before
    /// any outcome was known.
    Incomplete,
}

impl RecordOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Skipped => "skipped",
            Self::ExportError => "export error",
            Self::ImportError => "import error",
            Self::Incomplete => "incomplete",
        }
    }
}

/// Counts of records per outcome within one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub total: u64,
    pub imported: u64,
    pub skipped: u64,
    pub export_errors: u64,
    pub import_errors: u64,
    pub incomplete: u64,
}

impl MergeSummary {
    pub fn add(&mut self, record: &MergeRecord) {
        self.total += 1;
        match record.outcome() {
            RecordOutcome::Imported => self.imported += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::ExportError => self.export_errors += 1,
            RecordOutcome::ImportError => self.import_errors += 1,
            RecordOutcome::Incomplete => self.incomplete += 1,
        }
    }

    pub fn failed(&self) -> u64 {
        self.export_errors + self.import_errors
    }
}
