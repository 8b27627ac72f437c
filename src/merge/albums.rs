//! Album and folder placement in the destination library.

use std::collections::HashMap;

use crate::library::{AlbumHandle, AlbumInfo, DestinationLibrary, FolderHandle, LibraryError};
use crate::types::Verbosity;

/// Finds or creates destination albums, caching the handles for the run so
/// each folder chain and album is resolved once.
#[derive(Debug, Default)]
pub struct AlbumPlacer {
    albums: HashMap<AlbumInfo, AlbumHandle>,
    folders: HashMap<Vec<String>, FolderHandle>,
}

impl AlbumPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination album matching `album`: inside its folder chain when it
    /// has one, top-level otherwise. Missing folders and albums are created.
    pub async fn resolve(
        &mut self,
        destination: &dyn DestinationLibrary,
        album: &AlbumInfo,
        verbosity: Verbosity,
    ) -> Result<AlbumHandle, LibraryError> {
        if let Some(handle) = self.albums.get(album) {
            return Ok(handle.clone());
        }

        let folder = if album.folder_names.is_empty() {
            None
        } else {
            Some(self.folder(destination, &album.folder_names, verbosity).await?)
        };

        let handle = match destination.album(&album.title, folder.as_ref()).await? {
            Some(existing) => existing,
            None => {
                verbosity.say(format_args!("Creating album {}", album.display_path()));
                destination.create_album(&album.title, folder.as_ref()).await?
            }
        };
        self.albums.insert(album.clone(), handle.clone());
        Ok(handle)
    }

    async fn folder(
        &mut self,
        destination: &dyn DestinationLibrary,
        path: &[String],
        verbosity: Verbosity,
    ) -> Result<FolderHandle, LibraryError> {
        if let Some(folder) = self.folders.get(path) {
            return Ok(folder.clone());
        }
        verbosity.say(format_args!("Adding folder {}", path.join("/")));
        let folder = destination.make_folders(path).await?;
        self.folders.insert(path.to_vec(), folder.clone());
        Ok(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fake::FakeDestination;

    #[tokio::test]
    async fn test_nested_album_created_once() {
        let dest = FakeDestination::new();
        let mut placer = AlbumPlacer::new();
        let trip = AlbumInfo::new("Trip", &["2020"]);

        let first = placer.resolve(&dest, &trip, Verbosity::quiet()).await.unwrap();
        let second = placer.resolve(&dest, &trip, Verbosity::quiet()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(dest.folders().len(), 1);
        assert_eq!(dest.albums().len(), 1);
        assert_eq!(dest.albums()[0].folder.as_deref(), Some("F1"));
        // Second call is served from the cache.
        assert_eq!(dest.album_lookups(), 1);
    }

    #[tokio::test]
    async fn test_same_title_in_different_folders() {
        let dest = FakeDestination::new();
        let mut placer = AlbumPlacer::new();
        let a = placer
            .resolve(&dest, &AlbumInfo::new("Trip", &["2020"]), Verbosity::quiet())
            .await
            .unwrap();
        let b = placer
            .resolve(&dest, &AlbumInfo::new("Trip", &["2021"]), Verbosity::quiet())
            .await
            .unwrap();
        let c = placer
            .resolve(&dest, &AlbumInfo::new("Trip", &[]), Verbosity::quiet())
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(dest.albums().len(), 3);
        assert_eq!(dest.folders().len(), 2);
    }

    #[tokio::test]
    async fn test_deep_folder_chain_shares_prefix() {
        let dest = FakeDestination::new();
        let mut placer = AlbumPlacer::new();
        placer
            .resolve(&dest, &AlbumInfo::new("Beach", &["Travel", "2020"]), Verbosity::quiet())
            .await
            .unwrap();
        placer
            .resolve(&dest, &AlbumInfo::new("Snow", &["Travel", "2021"]), Verbosity::quiet())
            .await
            .unwrap();
        let paths: Vec<String> = dest.folders().iter().map(|f| f.path.join("/")).collect();
        assert_eq!(paths, vec!["Travel", "Travel/2020", "Travel/2021"]);
    }

    #[tokio::test]
    async fn test_existing_top_level_album_reused() {
        let dest = FakeDestination::new();
        let existing = dest.add_existing_album("Favorites 2019");
        let mut placer = AlbumPlacer::new();
        let handle = placer
            .resolve(&dest, &AlbumInfo::new("Favorites 2019", &[]), Verbosity::quiet())
            .await
            .unwrap();
        assert_eq!(handle, existing);
        assert_eq!(dest.albums().len(), 1);
        assert!(dest.folders().is_empty());
    }
}
