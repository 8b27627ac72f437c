use std::path::{Path, PathBuf};

use crate::cli::{LibraryArgs, ToolArgs};
use crate::library::osxphotos;
use crate::merge::MergeError;

/// Resolved paths for a merge or status run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub merge_db: PathBuf,
    pub osxphotos: PathBuf,
}

impl Config {
    /// Resolve library paths and the merge database location.
    ///
    /// Fails before anything is touched when the source library does not
    /// exist, no destination can be determined, or both name the same
    /// library.
    pub async fn from_cli(args: &LibraryArgs) -> Result<Self, MergeError> {
        let osxphotos = expand_tilde(&args.tools.osxphotos);

        let source = expand_tilde(&args.source);
        if !source.exists() {
            return Err(MergeError::Configuration(format!(
                "Source library {} does not exist",
                source.display()
            )));
        }
        let source = canonical(&source);

        let destination =
            resolve_destination(args.destination.as_deref(), &osxphotos).await?;
        if source == destination {
            return Err(MergeError::Configuration(format!(
                "Source and destination are the same library: {}",
                source.display()
            )));
        }

        let merge_db = merge_db_path(&args.tools, &destination);
        Ok(Self {
            source,
            destination,
            merge_db,
            osxphotos,
        })
    }

    /// Library paths as recorded in the merge database.
    pub fn scope(&self) -> (String, String) {
        (
            self.source.to_string_lossy().into_owned(),
            self.destination.to_string_lossy().into_owned(),
        )
    }
}

/// The given destination, or the library Photos opened last.
pub async fn resolve_destination(
    destination: Option<&str>,
    osxphotos: &Path,
) -> Result<PathBuf, MergeError> {
    let destination = match destination {
        Some(path) => expand_tilde(path),
        None => {
            let last = osxphotos::last_library(osxphotos).await?;
            let last = last.ok_or_else(|| {
                MergeError::Configuration(
                    "No destination library given and Photos has no last opened library"
                        .to_string(),
                )
            })?;
            tracing::info!("Using last opened library {}", last.display());
            last
        }
    };
    Ok(canonical(&destination))
}

/// Merge database location: `--merge-db` when given, otherwise a hidden
/// file next to the destination library.
pub fn merge_db_path(tools: &ToolArgs, destination: &Path) -> PathBuf {
    match &tools.merge_db {
        Some(path) => expand_tilde(path),
        None => default_merge_db(destination),
    }
}

/// `.<stem>.merge_photos.json` in the directory holding `destination`.
pub fn default_merge_db(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "library".to_string());
    let name = format!(".{}.merge_photos.json", stem);
    match destination.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Canonical form of `path` when it exists, `path` unchanged otherwise.
pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Expand ~ to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_args(source: &Path, destination: Option<&Path>) -> LibraryArgs {
        LibraryArgs {
            source: source.to_string_lossy().into_owned(),
            destination: destination.map(|d| d.to_string_lossy().into_owned()),
            tools: ToolArgs {
                merge_db: None,
                osxphotos: "osxphotos".to_string(),
            },
        }
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/Pictures");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("Pictures"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(
            expand_tilde("/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            expand_tilde("relative/path"),
            PathBuf::from("relative/path")
        );
    }

    #[test]
    fn test_default_merge_db() {
        assert_eq!(
            default_merge_db(Path::new("/Users/me/Pictures/New.photoslibrary")),
            PathBuf::from("/Users/me/Pictures/.New.merge_photos.json")
        );
    }

    #[test]
    fn test_merge_db_override() {
        let tools = ToolArgs {
            merge_db: Some("/tmp/custom.json".into()),
            osxphotos: "osxphotos".into(),
        };
        assert_eq!(
            merge_db_path(&tools, Path::new("/x/New.photoslibrary")),
            PathBuf::from("/tmp/custom.json")
        );
    }

    #[tokio::test]
    async fn test_from_cli_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Old.photoslibrary");
        let destination = dir.path().join("New.photoslibrary");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&destination).unwrap();

        let config = Config::from_cli(&library_args(&source, Some(&destination)))
            .await
            .unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(config.source, root.join("Old.photoslibrary"));
        assert_eq!(config.destination, root.join("New.photoslibrary"));
        assert_eq!(config.merge_db, root.join(".New.merge_photos.json"));
        assert_eq!(config.osxphotos, PathBuf::from("osxphotos"));
        let (src, dest) = config.scope();
        assert!(src.ends_with("Old.photoslibrary"));
        assert!(dest.ends_with("New.photoslibrary"));
    }

    #[tokio::test]
    async fn test_from_cli_rejects_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let args = library_args(
            &dir.path().join("Missing.photoslibrary"),
            Some(&dir.path().join("New.photoslibrary")),
        );
        let err = Config::from_cli(&args).await.unwrap_err();
        assert!(matches!(err, MergeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_from_cli_rejects_same_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("Same.photoslibrary");
        std::fs::create_dir(&library).unwrap();
        // A different spelling of the same directory.
        let aliased = dir.path().join(".").join("Same.photoslibrary");

        let err = Config::from_cli(&library_args(&library, Some(&aliased)))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::Configuration(_)));
        assert!(err.to_string().contains("same library"));
    }
}
