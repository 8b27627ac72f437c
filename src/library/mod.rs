//! Photos library collaborators.
//!
//! The merge driver only talks to the two traits defined here. The source
//! side is read through the `osxphotos` command-line tool; the destination
//! side is the Photos application, scripted with AppleScript.

mod command;
pub mod error;
#[cfg(test)]
pub mod fake;
pub mod osxphotos;
pub mod photos_app;
pub mod types;

pub use error::LibraryError;
pub use osxphotos::OsxPhotosSource;
pub use photos_app::PhotosApp;
pub use types::{AlbumHandle, AlbumInfo, ExportRequest, FolderHandle, Location, SourcePhoto};

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Read-only view of the library photos are merged from.
#[async_trait]
pub trait SourceLibrary: Send + Sync {
    /// Path of the library on disk.
    fn path(&self) -> &Path;

    /// Every photo in the library.
    async fn photos(&self) -> Result<Vec<SourcePhoto>, LibraryError>;

    /// Export `photo` into `dest_dir`, returning the paths of every file
    /// written (the photo plus any live/raw companions).
    async fn export(
        &self,
        photo: &SourcePhoto,
        dest_dir: &Path,
        request: &ExportRequest,
    ) -> Result<Vec<PathBuf>, LibraryError>;
}

/// Scriptable library photos are merged into.
#[async_trait]
pub trait DestinationLibrary: Send + Sync {
    async fn open(&self, library: &Path) -> Result<(), LibraryError>;

    async fn hide(&self) -> Result<(), LibraryError>;

    /// Import files, returning the ids of the created media items. One
    /// call may create several items (e.g. Live Photo components); an empty
    /// result means nothing was imported.
    async fn import_photos(&self, paths: &[PathBuf]) -> Result<Vec<String>, LibraryError>;

    async fn set_favorite(&self, id: &str, favorite: bool) -> Result<(), LibraryError>;

    async fn set_description(&self, id: &str, description: &str) -> Result<(), LibraryError>;

    async fn set_title(&self, id: &str, title: &str) -> Result<(), LibraryError>;

    async fn set_keywords(&self, id: &str, keywords: &[String]) -> Result<(), LibraryError>;

    async fn set_location(&self, id: &str, location: Location) -> Result<(), LibraryError>;

    /// Create the folder chain `path` (outermost first). Existing folders
    /// are reused, so calling this twice yields the same folder.
    async fn make_folders(&self, path: &[String]) -> Result<FolderHandle, LibraryError>;

    /// Find an album by title, top-level when `folder` is `None`.
    async fn album(
        &self,
        title: &str,
        folder: Option<&FolderHandle>,
    ) -> Result<Option<AlbumHandle>, LibraryError>;

    async fn create_album(
        &self,
        title: &str,
        folder: Option<&FolderHandle>,
    ) -> Result<AlbumHandle, LibraryError>;

    async fn add_to_album(&self, album: &AlbumHandle, ids: &[String]) -> Result<(), LibraryError>;
}
