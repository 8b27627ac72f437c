//! In-memory collaborators for driver tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::LibraryError;
use super::types::{AlbumHandle, ExportRequest, FolderHandle, Location, SourcePhoto};
use super::{DestinationLibrary, SourceLibrary};

/// Source library holding a fixed list of photos. Exports write a small
/// file named after the requested stem and the resolved extension.
pub struct FakeSource {
    library: PathBuf,
    photos: Vec<SourcePhoto>,
    fail_export: Mutex<HashSet<String>>,
    /// Export directories handed to `export`, in call order.
    pub export_dirs: Mutex<Vec<PathBuf>>,
    pub requests: Mutex<Vec<ExportRequest>>,
}

impl FakeSource {
    pub fn new(library: impl Into<PathBuf>, photos: Vec<SourcePhoto>) -> Self {
        Self {
            library: library.into(),
            photos,
            fail_export: Mutex::new(HashSet::new()),
            export_dirs: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_export(&self, uuid: &str) {
        self.fail_export.lock().unwrap().insert(uuid.to_string());
    }

    pub fn heal_export(&self, uuid: &str) {
        self.fail_export.lock().unwrap().remove(uuid);
    }

    pub fn export_count(&self) -> usize {
        self.export_dirs.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceLibrary for FakeSource {
    fn path(&self) -> &Path {
        &self.library
    }

    async fn photos(&self) -> Result<Vec<SourcePhoto>, LibraryError> {
        Ok(self.photos.clone())
    }

    async fn export(
        &self,
        photo: &SourcePhoto,
        dest_dir: &Path,
        request: &ExportRequest,
    ) -> Result<Vec<PathBuf>, LibraryError> {
        self.export_dirs.lock().unwrap().push(dest_dir.to_path_buf());
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_export.lock().unwrap().contains(&photo.uuid) {
            return Err(LibraryError::Export {
                uuid: photo.uuid.clone(),
                reason: "exporter exited with status 1".to_string(),
            });
        }
        let resolved = photo.resolved_path().unwrap_or(Path::new(""));
        let file = dest_dir.join(photo.export_filename(resolved));
        tokio::fs::write(&file, photo.uuid.as_bytes()).await?;
        Ok(vec![file])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeAsset {
    pub id: String,
    pub filename: String,
    pub favorite: bool,
    pub description: Option<String>,
    pub title: Option<String>,
    pub keywords: Vec<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FakeAlbum {
    pub id: String,
    pub title: String,
    pub folder: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    assets: Vec<FakeAsset>,
    folders: Vec<FolderHandle>,
    albums: Vec<FakeAlbum>,
    album_lookups: usize,
    next_id: usize,
}

/// Destination library that records everything done to it.
#[derive(Debug)]
pub struct FakeDestination {
    state: Mutex<State>,
    /// Media items created per imported file; more than one models a
    /// photo that arrives as several assets.
    fan_out: usize,
    fail_import: Mutex<HashSet<String>>,
    failing_album_adds: Mutex<usize>,
}

impl Default for FakeDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::with_fan_out(1)
    }

    pub fn with_fan_out(fan_out: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            fan_out,
            fail_import: Mutex::new(HashSet::new()),
            failing_album_adds: Mutex::new(0),
        }
    }

    /// Make imports of files whose name contains `needle` produce no items.
    pub fn fail_import(&self, needle: &str) {
        self.fail_import.lock().unwrap().insert(needle.to_string());
    }

    /// Make the next `count` calls to `add_to_album` fail like a script
    /// error would.
    pub fn fail_album_adds(&self, count: usize) {
        *self.failing_album_adds.lock().unwrap() = count;
    }

    /// Seed an album that already exists before the merge.
    pub fn add_existing_album(&self, title: &str) -> AlbumHandle {
        let mut state = self.state.lock().unwrap();
        let id = format!("A{}", state.albums.len() + 1);
        state.albums.push(FakeAlbum {
            id: id.clone(),
            title: title.to_string(),
            folder: None,
            members: Vec::new(),
        });
        AlbumHandle {
            id,
            title: title.to_string(),
        }
    }

    pub fn assets(&self) -> Vec<FakeAsset> {
        self.state.lock().unwrap().assets.clone()
    }

    pub fn asset(&self, id: &str) -> Option<FakeAsset> {
        self.state
            .lock()
            .unwrap()
            .assets
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn folders(&self) -> Vec<FolderHandle> {
        self.state.lock().unwrap().folders.clone()
    }

    pub fn albums(&self) -> Vec<FakeAlbum> {
        self.state.lock().unwrap().albums.clone()
    }

    pub fn album_lookups(&self) -> usize {
        self.state.lock().unwrap().album_lookups
    }

    fn with_asset(&self, id: &str, f: impl FnOnce(&mut FakeAsset)) -> Result<(), LibraryError> {
        let mut state = self.state.lock().unwrap();
        match state.assets.iter_mut().find(|a| a.id == id) {
            Some(asset) => {
                f(asset);
                Ok(())
            }
            None => Err(LibraryError::Parse {
                tool: "fake".to_string(),
                reason: format!("no media item {}", id),
            }),
        }
    }
}

#[async_trait]
impl DestinationLibrary for FakeDestination {
    async fn open(&self, _library: &Path) -> Result<(), LibraryError> {
        Ok(())
    }

    async fn hide(&self) -> Result<(), LibraryError> {
        Ok(())
    }

    async fn import_photos(&self, paths: &[PathBuf]) -> Result<Vec<String>, LibraryError> {
        let failing = self.fail_import.lock().unwrap().clone();
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for path in paths {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if failing.iter().any(|needle| filename.contains(needle.as_str())) {
                continue;
            }
            for _ in 0..self.fan_out {
                state.next_id += 1;
                let id = format!("D{}", state.next_id);
                state.assets.push(FakeAsset {
                    id: id.clone(),
                    filename: filename.clone(),
                    ..Default::default()
                });
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn set_favorite(&self, id: &str, favorite: bool) -> Result<(), LibraryError> {
        self.with_asset(id, |a| a.favorite = favorite)
    }

    async fn set_description(&self, id: &str, description: &str) -> Result<(), LibraryError> {
        self.with_asset(id, |a| a.description = Some(description.to_string()))
    }

    async fn set_title(&self, id: &str, title: &str) -> Result<(), LibraryError> {
        self.with_asset(id, |a| a.title = Some(title.to_string()))
    }

    async fn set_keywords(&self, id: &str, keywords: &[String]) -> Result<(), LibraryError> {
        self.with_asset(id, |a| a.keywords = keywords.to_vec())
    }

    async fn set_location(&self, id: &str, location: Location) -> Result<(), LibraryError> {
        self.with_asset(id, |a| a.location = Some(location))
    }

    async fn make_folders(&self, path: &[String]) -> Result<FolderHandle, LibraryError> {
        let mut state = self.state.lock().unwrap();
        let mut handle = None;
        // Create each level of the chain once, like the real application.
        for depth in 1..=path.len() {
            let prefix = &path[..depth];
            let existing = state.folders.iter().find(|f| f.path == prefix).cloned();
            let folder = match existing {
                Some(folder) => folder,
                None => {
                    let folder = FolderHandle {
                        id: format!("F{}", state.folders.len() + 1),
                        path: prefix.to_vec(),
                    };
                    state.folders.push(folder.clone());
                    folder
                }
            };
            handle = Some(folder);
        }
        handle.ok_or_else(|| LibraryError::Parse {
            tool: "fake".to_string(),
            reason: "empty folder path".to_string(),
        })
    }

    async fn album(
        &self,
        title: &str,
        folder: Option<&FolderHandle>,
    ) -> Result<Option<AlbumHandle>, LibraryError> {
        let mut state = self.state.lock().unwrap();
        state.album_lookups += 1;
        let folder_id = folder.map(|f| f.id.clone());
        Ok(state
            .albums
            .iter()
            .find(|a| a.title == title && a.folder == folder_id)
            .map(|a| AlbumHandle {
                id: a.id.clone(),
                title: a.title.clone(),
            }))
    }

    async fn create_album(
        &self,
        title: &str,
        folder: Option<&FolderHandle>,
    ) -> Result<AlbumHandle, LibraryError> {
        let mut state = self.state.lock().unwrap();
        let id = format!("A{}", state.albums.len() + 1);
        state.albums.push(FakeAlbum {
            id: id.clone(),
            title: title.to_string(),
            folder: folder.map(|f| f.id.clone()),
            members: Vec::new(),
        });
        Ok(AlbumHandle {
            id,
            title: title.to_string(),
        })
    }

    async fn add_to_album(&self, album: &AlbumHandle, ids: &[String]) -> Result<(), LibraryError> {
        {
            let mut failing = self.failing_album_adds.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(LibraryError::Command {
                    tool: "osascript".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "Photos got an error: AppleEvent timed out.".to_string(),
                });
            }
        }
        let mut state = self.state.lock().unwrap();
        let target = state
            .albums
            .iter_mut()
            .find(|a| a.id == album.id)
            .ok_or_else(|| LibraryError::Parse {
                tool: "fake".to_string(),
                reason: format!("no album {}", album.id),
            })?;
        for id in ids {
            if !target.members.contains(id) {
                target.members.push(id.clone());
            }
        }
        Ok(())
    }
}
