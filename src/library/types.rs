use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// GPS coordinates attached to a photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// An album a source photo belongs to, with the folders it is nested in
/// (outermost first). An empty `folder_names` means a top-level album.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub title: String,
    #[serde(default)]
    pub folder_names: Vec<String>,
}

impl AlbumInfo {
    pub fn new(title: impl Into<String>, folder_names: &[&str]) -> Self {
        Self {
            title: title.into(),
            folder_names: folder_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `"2020/Trip"` style rendering for log messages.
    pub fn display_path(&self) -> String {
        if self.folder_names.is_empty() {
            self.title.clone()
        } else {
            format!("{}/{}", self.folder_names.join("/"), self.title)
        }
    }
}

/// Read-only descriptor of a photo in the source library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePhoto {
    pub uuid: String,
    pub original_filename: String,
    pub path: Option<PathBuf>,
    pub path_edited: Option<PathBuf>,
    pub has_adjustments: bool,
    pub description: Option<String>,
    pub title: Option<String>,
    pub keywords: Vec<String>,
    pub favorite: bool,
    pub location: Option<Location>,
    pub persons: Vec<String>,
    pub albums: Vec<AlbumInfo>,
}

impl SourcePhoto {
    /// Whether the edited rendition is the one that gets merged.
    pub fn uses_edited(&self) -> bool {
        self.has_adjustments && self.path_edited.is_some()
    }

    /// Best available file for this photo: the edited rendition when the
    /// photo has adjustments, the original otherwise. A photo whose edited
    /// file is missing falls back to its original.
    pub fn resolved_path(&self) -> Option<&Path> {
        if self.uses_edited() {
            self.path_edited.as_deref()
        } else {
            self.path.as_deref()
        }
    }

    /// Filename stem used for the exported file: the stem of the original
    /// filename, falling back to the uuid when there is none.
    pub fn export_stem(&self) -> String {
        let stem = Path::new(&self.original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(clean_filename)
            .unwrap_or_default();
        if stem.is_empty() {
            clean_filename(&self.uuid)
        } else {
            stem
        }
    }

    /// Filename the export is expected to produce for `resolved`: original
    /// stem plus the extension of the resolved (possibly edited) file.
    pub fn export_filename(&self, resolved: &Path) -> String {
        match resolved.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", self.export_stem(), ext),
            None => self.export_stem(),
        }
    }
}

/// Remove characters that are invalid on common filesystems or that the
/// exporter would treat as template syntax.
pub fn clean_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '{' | '}'
            )
        })
        .collect()
}

/// What to ask the exporter for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Filename stem for the exported file(s).
    pub filename: String,
    /// Export the edited rendition instead of the original.
    pub edited: bool,
    /// Also export the motion component of a Live Photo.
    pub live_photo: bool,
    /// Also export the RAW half of a RAW+JPEG pair.
    pub raw_photo: bool,
}

/// A folder in the destination library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub id: String,
    pub path: Vec<String>,
}

/// An album in the destination library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumHandle {
    pub id: String,
    pub title: String,
}
