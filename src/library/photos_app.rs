//! Destination library: the Photos application, driven by AppleScript.
//!
//! Every operation renders a small script and hands it to `osascript`.
//! Photos cannot take concurrent commands, so callers issue one at a time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::command;
use super::error::LibraryError;
use super::types::{AlbumHandle, FolderHandle, Location};
use super::DestinationLibrary;
use crate::retry::{self, RetryAction, RetryConfig};

#[derive(Debug, Clone)]
pub struct PhotosApp {
    osascript: PathBuf,
    open_retry: RetryConfig,
}

impl Default for PhotosApp {
    fn default() -> Self {
        Self::new(PathBuf::from("osascript"), RetryConfig::default())
    }
}

impl PhotosApp {
    pub fn new(osascript: PathBuf, open_retry: RetryConfig) -> Self {
        Self {
            osascript,
            open_retry,
        }
    }

    async fn run_script(&self, script: &str) -> Result<String, LibraryError> {
        tracing::trace!(script, "osascript");
        let out = command::run(&self.osascript, ["-e", script]).await?;
        Ok(out.trim().to_string())
    }

    /// Run a script whose result is a single object id.
    async fn run_for_id(&self, script: &str) -> Result<String, LibraryError> {
        let id = self.run_script(script).await?;
        if id.is_empty() {
            return Err(LibraryError::Parse {
                tool: "osascript".to_string(),
                reason: "script returned no id".to_string(),
            });
        }
        Ok(id)
    }
}

#[async_trait]
impl DestinationLibrary for PhotosApp {
    async fn open(&self, library: &Path) -> Result<(), LibraryError> {
        let script = open_script(library);
        // Photos frequently refuses the first open while it is still launching.
        retry::retry_with_backoff(
            &self.open_retry,
            |e: &LibraryError| {
                if e.is_transient() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || self.run_script(&script),
        )
        .await?;
        Ok(())
    }

    async fn hide(&self) -> Result<(), LibraryError> {
        self.run_script(HIDE_SCRIPT).await?;
        Ok(())
    }

    async fn import_photos(&self, paths: &[PathBuf]) -> Result<Vec<String>, LibraryError> {
        let script = import_script(paths);
        let out = match self.run_script(&script).await {
            Ok(out) => out,
            Err(LibraryError::Command { stderr, .. }) => {
                return Err(LibraryError::Import {
                    files: describe_files(paths),
                    reason: stderr,
                });
            }
            Err(e) => return Err(e),
        };
        Ok(parse_id_lines(&out))
    }

    async fn set_favorite(&self, id: &str, favorite: bool) -> Result<(), LibraryError> {
        let value = if favorite { "true" } else { "false" };
        self.run_script(&set_property_script(id, "favorite", value))
            .await?;
        Ok(())
    }

    async fn set_description(&self, id: &str, description: &str) -> Result<(), LibraryError> {
        self.run_script(&set_property_script(id, "description", &quote(description)))
            .await?;
        Ok(())
    }

    async fn set_title(&self, id: &str, title: &str) -> Result<(), LibraryError> {
        // Photos calls the title "name".
        self.run_script(&set_property_script(id, "name", &quote(title)))
            .await?;
        Ok(())
    }

    async fn set_keywords(&self, id: &str, keywords: &[String]) -> Result<(), LibraryError> {
        self.run_script(&set_property_script(id, "keywords", &quote_list(keywords)))
            .await?;
        Ok(())
    }

    async fn set_location(&self, id: &str, location: Location) -> Result<(), LibraryError> {
        let value = format!("{{{}, {}}}", location.latitude, location.longitude);
        self.run_script(&set_property_script(id, "location", &value))
            .await?;
        Ok(())
    }

    async fn make_folders(&self, path: &[String]) -> Result<FolderHandle, LibraryError> {
        let id = self.run_for_id(&make_folders_script(path)).await?;
        Ok(FolderHandle {
            id,
            path: path.to_vec(),
        })
    }

    async fn album(
        &self,
        title: &str,
        folder: Option<&FolderHandle>,
    ) -> Result<Option<AlbumHandle>, LibraryError> {
        let id = self.run_script(&find_album_script(title, folder)).await?;
        Ok((!id.is_empty()).then(|| AlbumHandle {
            id,
            title: title.to_string(),
        }))
    }

    async fn create_album(
        &self,
        title: &str,
        folder: Option<&FolderHandle>,
    ) -> Result<AlbumHandle, LibraryError> {
        let id = self.run_for_id(&create_album_script(title, folder)).await?;
        Ok(AlbumHandle {
            id,
            title: title.to_string(),
        })
    }

    async fn add_to_album(&self, album: &AlbumHandle, ids: &[String]) -> Result<(), LibraryError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.run_script(&add_to_album_script(album, ids)).await?;
        Ok(())
    }
}

const HIDE_SCRIPT: &str =
    "tell application \"System Events\" to set visible of process \"Photos\" to false";

/// Render `s` as an AppleScript string literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a list of strings as an AppleScript list literal.
fn quote_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
    format!("{{{}}}", quoted.join(", "))
}

fn media_item(id: &str) -> String {
    format!("media item id {}", quote(id))
}

fn open_script(library: &Path) -> String {
    format!(
        "tell application \"Photos\"\n\
         \tactivate\n\
         \topen POSIX file {}\n\
         end tell",
        quote(&library.to_string_lossy())
    )
}

fn import_script(paths: &[PathBuf]) -> String {
    let files: Vec<String> = paths
        .iter()
        .map(|p| format!("POSIX file {}", quote(&p.to_string_lossy())))
        .collect();
    format!(
        "tell application \"Photos\"\n\
         \tset imported_ to import {{{}}} skip check duplicates true\n\
         \tset ids_ to \"\"\n\
         \trepeat with item_ in imported_\n\
         \t\tset ids_ to ids_ & (id of item_) & linefeed\n\
         \tend repeat\n\
         \treturn ids_\n\
         end tell",
        files.join(", ")
    )
}

fn set_property_script(id: &str, property: &str, value: &str) -> String {
    format!(
        "tell application \"Photos\" to set {} of {} to {}",
        property,
        media_item(id),
        value
    )
}

fn make_folders_script(path: &[String]) -> String {
    format!(
        "tell application \"Photos\"\n\
         \tset parent_ to missing value\n\
         \trepeat with name_ in {}\n\
         \t\tset name_ to name_ as text\n\
         \t\tif parent_ is missing value then\n\
         \t\t\tset matches_ to (every folder whose name is name_)\n\
         \t\telse\n\
         \t\t\tset matches_ to (every folder of parent_ whose name is name_)\n\
         \t\tend if\n\
         \t\tif (count of matches_) is 0 then\n\
         \t\t\tif parent_ is missing value then\n\
         \t\t\t\tset parent_ to make new folder named name_\n\
         \t\t\telse\n\
         \t\t\t\tset parent_ to make new folder named name_ at parent_\n\
         \t\t\tend if\n\
         \t\telse\n\
         \t\t\tset parent_ to item 1 of matches_\n\
         \t\tend if\n\
         \tend repeat\n\
         \treturn id of parent_\n\
         end tell",
        quote_list(path)
    )
}

fn find_album_script(title: &str, folder: Option<&FolderHandle>) -> String {
    let scope = match folder {
        Some(f) => format!("every album of folder id {}", quote(&f.id)),
        None => "every album".to_string(),
    };
    format!(
        "tell application \"Photos\"\n\
         \tset matches_ to ({} whose name is {})\n\
         \tif (count of matches_) is 0 then return \"\"\n\
         \treturn id of item 1 of matches_\n\
         end tell",
        scope,
        quote(title)
    )
}

fn create_album_script(title: &str, folder: Option<&FolderHandle>) -> String {
    let at = match folder {
        Some(f) => format!(" at folder id {}", quote(&f.id)),
        None => String::new(),
    };
    format!(
        "tell application \"Photos\" to return id of (make new album named {}{})",
        quote(title),
        at
    )
}

fn add_to_album_script(album: &AlbumHandle, ids: &[String]) -> String {
    let items: Vec<String> = ids.iter().map(|id| media_item(id)).collect();
    format!(
        "tell application \"Photos\" to add {{{}}} to album id {}",
        items.join(", "),
        quote(&album.id)
    )
}

fn parse_id_lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn describe_files(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}
