//! Source library backed by the `osxphotos` command-line tool.
//!
//! `osxphotos query --json` describes every photo; `osxphotos export`
//! writes a single photo (and its live/raw companions) into a directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::command;
use super::error::LibraryError;
use super::types::{AlbumInfo, ExportRequest, Location, SourcePhoto};
use super::SourceLibrary;

/// Person name osxphotos reports for faces nobody has named.
const UNKNOWN_PERSON: &str = "_UNKNOWN_";

#[derive(Debug, Clone)]
pub struct OsxPhotosSource {
    program: PathBuf,
    library: PathBuf,
}

impl OsxPhotosSource {
    pub fn new(program: PathBuf, library: PathBuf) -> Self {
        Self { program, library }
    }

    fn export_args(&self, uuid: &str, dest_dir: &Path, request: &ExportRequest) -> Vec<String> {
        let mut args = vec![
            "export".to_string(),
            dest_dir.to_string_lossy().into_owned(),
            "--library".to_string(),
            self.library.to_string_lossy().into_owned(),
            "--uuid".to_string(),
            uuid.to_string(),
            "--filename".to_string(),
            request.filename.clone(),
        ];
        if request.edited {
            args.extend([
                "--skip-original-if-edited".to_string(),
                "--edited-suffix".to_string(),
                String::new(),
            ]);
        } else {
            args.push("--skip-edited".to_string());
        }
        if !request.live_photo {
            args.push("--skip-live".to_string());
        }
        if !request.raw_photo {
            args.push("--skip-raw".to_string());
        }
        args
    }
}

#[async_trait]
impl SourceLibrary for OsxPhotosSource {
    fn path(&self) -> &Path {
        &self.library
    }

    async fn photos(&self) -> Result<Vec<SourcePhoto>, LibraryError> {
        let library = self.library.to_string_lossy().into_owned();
        let stdout = command::run(&self.program, ["query", "--library", library.as_str(), "--json"]).await?;
        let photos = parse_query_output(&stdout)?;
        debug!(count = photos.len(), library = %library, "Loaded source photos");
        Ok(photos)
    }

    async fn export(
        &self,
        photo: &SourcePhoto,
        dest_dir: &Path,
        request: &ExportRequest,
    ) -> Result<Vec<PathBuf>, LibraryError> {
        let args = self.export_args(&photo.uuid, dest_dir, request);
        match command::run(&self.program, &args).await {
            Ok(_) => {}
            Err(LibraryError::Command { stderr, status, .. }) => {
                return Err(LibraryError::Export {
                    uuid: photo.uuid.clone(),
                    reason: format!("{}: {}", status, stderr),
                });
            }
            Err(e) => return Err(e),
        }
        // dest_dir is private to this photo, so whatever it now holds is the export.
        list_files(dest_dir).await
    }
}

/// Files directly inside `dir`, sorted by name.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Path of the library Photos opened last, as reported by `osxphotos list`.
pub async fn last_library(program: &Path) -> Result<Option<PathBuf>, LibraryError> {
    let stdout = command::run(program, ["list", "--json"]).await?;
    let listing: LibraryListing = serde_json::from_str(&stdout)?;
    Ok(listing
        .last_library
        .filter(|p| !p.is_empty())
        .map(PathBuf::from))
}

#[derive(Debug, Deserialize)]
struct LibraryListing {
    #[serde(default)]
    last_library: Option<String>,
}

/// One element of `osxphotos query --json`. Only the fields the merge needs;
/// everything else in the document is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryPhoto {
    uuid: String,
    original_filename: Option<String>,
    filename: Option<String>,
    path: Option<String>,
    path_edited: Option<String>,
    hasadjustments: bool,
    description: Option<String>,
    title: Option<String>,
    keywords: Vec<String>,
    favorite: bool,
    latitude: Option<f64>,
    longitude: Option<f64>,
    persons: Vec<String>,
    albums: Vec<String>,
    /// Album title → folder names enclosing it.
    folders: HashMap<String, Vec<String>>,
    album_info: Option<Vec<QueryAlbum>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryAlbum {
    title: Option<String>,
    folder_names: Vec<String>,
}

impl From<QueryPhoto> for SourcePhoto {
    fn from(q: QueryPhoto) -> Self {
        let location = match (q.latitude, q.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
            }),
            _ => None,
        };

        // Prefer the structured album list when the tool provides one; the
        // `folders` map cannot tell apart same-named albums in different folders.
        let albums = match q.album_info {
            Some(infos) => infos
                .into_iter()
                .filter_map(|a| {
                    a.title.map(|title| AlbumInfo {
                        title,
                        folder_names: a.folder_names,
                    })
                })
                .collect(),
            None => {
                let mut folders = q.folders;
                let mut placed = HashSet::new();
                q.albums
                    .into_iter()
                    .map(|title| {
                        let folder_names = match folders.remove(&title) {
                            Some(names) => {
                                placed.insert(title.clone());
                                names
                            }
                            None => {
                                if placed.contains(&title) {
                                    debug!(
                                        uuid = %q.uuid,
                                        album = %title,
                                        "Repeated album title without folder info, placing it at top level"
                                    );
                                }
                                Vec::new()
                            }
                        };
                        AlbumInfo {
                            folder_names,
                            title,
                        }
                    })
                    .collect()
            }
        };

        SourcePhoto {
            original_filename: q.original_filename.or(q.filename).unwrap_or_default(),
            path: q.path.filter(|p| !p.is_empty()).map(PathBuf::from),
            path_edited: q.path_edited.filter(|p| !p.is_empty()).map(PathBuf::from),
            has_adjustments: q.hasadjustments,
            description: q.description,
            title: q.title,
            keywords: q.keywords,
            favorite: q.favorite,
            location,
            persons: q
                .persons
                .into_iter()
                .filter(|p| p != UNKNOWN_PERSON)
                .collect(),
            albums,
            uuid: q.uuid,
        }
    }
}

fn parse_query_output(json: &str) -> Result<Vec<SourcePhoto>, LibraryError> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let photos: Vec<QueryPhoto> = serde_json::from_str(trimmed)?;
    photos
        .into_iter()
        .map(|q| {
            if q.uuid.is_empty() {
                Err(LibraryError::Parse {
                    tool: "osxphotos".to_string(),
                    reason: "photo without uuid".to_string(),
                })
            } else {
                Ok(SourcePhoto::from(q))
            }
        })
        .collect()
}
