//! Merge store trait and JSON document implementation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::StateError;
use super::types::{MergeRecord, MergeSummary, RecordKey, RECORD_VERSION};
use crate::types::Verbosity;

/// Checkpoint store for one (source library, destination library) scope.
///
/// This trait is object-safe so the merge driver can hold a `&dyn MergeStore`
/// without caring whether writes reach the disk.
#[async_trait]
pub trait MergeStore: Send + Sync {
    /// All records for `source_photo_id` in the current scope, optionally
    /// filtered on `imported`. Absent ids yield an empty list.
    async fn get(
        &self,
        source_photo_id: &str,
        imported: Option<bool>,
    ) -> Result<Vec<MergeRecord>, StateError>;

    /// Insert or overwrite the record with the same photo id in the current
    /// scope.
    ///
    /// The record is stamped with the store's scope, the crate version and
    /// the current time. A record that was already imported stays imported.
    async fn upsert(&self, record: MergeRecord) -> Result<(), StateError>;

    /// Every record in the current scope, ordered by photo id.
    async fn records(&self) -> Result<Vec<MergeRecord>, StateError>;

    /// Counts per outcome in the current scope.
    async fn summary(&self) -> Result<MergeSummary, StateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// Every upsert is written back to the file.
    Durable,
    /// Seeded from the file, changes are discarded at exit.
    Ephemeral,
}

/// On-disk layout of the merge database.
#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    records: Vec<MergeRecord>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    records: Vec<&'a MergeRecord>,
}

/// Merge store kept in memory and mirrored to a compact JSON file.
///
/// The file may hold records for several scopes; only the scope given at
/// open time is visible, but all of them are preserved on write.
pub struct JsonMergeDb {
    /// Guarded so the store can be shared as `&dyn MergeStore`.
    records: Mutex<BTreeMap<RecordKey, MergeRecord>>,
    path: PathBuf,
    backend: Backend,
    source_library: String,
    destination_library: String,
    verbosity: Verbosity,
}

impl std::fmt::Debug for JsonMergeDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonMergeDb")
            .field("path", &self.path)
            .field("backend", &self.backend)
            .field("source_library", &self.source_library)
            .field("destination_library", &self.destination_library)
            .finish_non_exhaustive()
    }
}

impl JsonMergeDb {
    /// Open the database at `path`, creating it when missing. Every upsert
    /// is persisted.
    pub async fn open(
        path: &Path,
        source_library: &str,
        destination_library: &str,
        verbosity: Verbosity,
    ) -> Result<Self, StateError> {
        let db = Self::load(
            path,
            source_library,
            destination_library,
            verbosity,
            Backend::Durable,
        )
        .await?;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StateError::Write {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
            }
            db.persist().await?;
            verbosity.say(format_args!("Created merge database {}", path.display()));
        } else {
            verbosity.say(format_args!("Opened merge database {}", path.display()));
        }
        Ok(db)
    }

    /// Open an in-memory copy of the database at `path`. The file is read
    /// if it exists but is never written or created.
    pub async fn open_ephemeral(
        path: &Path,
        source_library: &str,
        destination_library: &str,
        verbosity: Verbosity,
    ) -> Result<Self, StateError> {
        let db = Self::load(
            path,
            source_library,
            destination_library,
            verbosity,
            Backend::Ephemeral,
        )
        .await?;
        verbosity.say(format_args!(
            "Using in-memory copy of merge database {}",
            path.display()
        ));
        Ok(db)
    }

    async fn load(
        path: &Path,
        source_library: &str,
        destination_library: &str,
        verbosity: Verbosity,
        backend: Backend,
    ) -> Result<Self, StateError> {
        if source_library.is_empty() {
            return Err(StateError::Configuration(
                "source library path is empty".to_string(),
            ));
        }
        if destination_library.is_empty() {
            return Err(StateError::Configuration(
                "destination library path is empty".to_string(),
            ));
        }

        let document = read_document(path).await?;
        let records = document
            .records
            .into_iter()
            .map(|r| (r.key(), r))
            .collect::<BTreeMap<_, _>>();
        tracing::debug!(
            path = %path.display(),
            records = records.len(),
            "Loaded merge database"
        );

        Ok(Self {
            records: Mutex::new(records),
            path: path.to_path_buf(),
            backend,
            source_library: source_library.to_string(),
            destination_library: destination_library.to_string(),
            verbosity,
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn is_ephemeral(&self) -> bool {
        self.backend == Backend::Ephemeral
    }

    /// Drop every record of the current scope, keeping other scopes, and
    /// return how many were removed.
    pub async fn clear_scope(&self) -> Result<usize, StateError> {
        let removed = {
            let mut records = self
                .records
                .lock()
                .map_err(|e| StateError::Lock(e.to_string()))?;
            let before = records.len();
            records.retain(|key, _| !self.in_scope(key));
            before - records.len()
        };
        if self.backend == Backend::Durable {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Number of distinct (source, destination) pairs in the document.
    pub fn scope_count(&self) -> Result<usize, StateError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StateError::Lock(e.to_string()))?;
        let mut scopes: Vec<(&str, &str)> = records
            .keys()
            .map(|k| (k.source_library.as_str(), k.destination_library.as_str()))
            .collect();
        scopes.dedup();
        Ok(scopes.len())
    }

    fn in_scope(&self, key: &RecordKey) -> bool {
        key.source_library == self.source_library
            && key.destination_library == self.destination_library
    }

    fn key_for(&self, source_photo_id: &str) -> RecordKey {
        RecordKey {
            source_library: self.source_library.clone(),
            destination_library: self.destination_library.clone(),
            source_photo_id: source_photo_id.to_string(),
        }
    }

    fn encode(&self) -> Result<Vec<u8>, StateError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StateError::Lock(e.to_string()))?;
        let document = DocumentRef {
            records: records.values().collect(),
        };
        let mut bytes = serde_json::to_vec(&document)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Write the whole document to a `.part` sibling, then rename it over
    /// the target.
    async fn persist(&self) -> Result<(), StateError> {
        let bytes = self.encode()?;
        let part = part_path(&self.path);
        let write_err = |e: std::io::Error| StateError::Write {
            path: self.path.clone(),
            source: e,
        };
        tokio::fs::write(&part, &bytes).await.map_err(write_err)?;
        tokio::fs::rename(&part, &self.path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl MergeStore for JsonMergeDb {
    async fn get(
        &self,
        source_photo_id: &str,
        imported: Option<bool>,
    ) -> Result<Vec<MergeRecord>, StateError> {
        let key = self.key_for(source_photo_id);
        let records = self
            .records
            .lock()
            .map_err(|e| StateError::Lock(e.to_string()))?;
        Ok(records
            .get(&key)
            .filter(|r| imported.map_or(true, |want| r.imported == want))
            .cloned()
            .into_iter()
            .collect())
    }

    async fn upsert(&self, mut record: MergeRecord) -> Result<(), StateError> {
        record.source_library = self.source_library.clone();
        record.destination_library = self.destination_library.clone();
        record.version = RECORD_VERSION.to_string();
        record.timestamp = Utc::now();
        let key = record.key();

        {
            let mut records = self
                .records
                .lock()
                .map_err(|e| StateError::Lock(e.to_string()))?;
            if records.get(&key).is_some_and(|existing| existing.imported) {
                record.imported = true;
            }
            self.verbosity.say(format_args!(
                "Recording {} as {}",
                record.source_photo_id,
                record.outcome().as_str()
            ));
            records.insert(key, record);
        }

        match self.backend {
            Backend::Durable => self.persist().await,
            Backend::Ephemeral => Ok(()),
        }
    }

    async fn records(&self) -> Result<Vec<MergeRecord>, StateError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StateError::Lock(e.to_string()))?;
        Ok(records
            .iter()
            .filter(|(key, _)| self.in_scope(key))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn summary(&self) -> Result<MergeSummary, StateError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StateError::Lock(e.to_string()))?;
        let mut summary = MergeSummary::default();
        for record in records
            .iter()
            .filter(|(key, _)| self.in_scope(key))
            .map(|(_, record)| record)
        {
            summary.add(record);
        }
        Ok(summary)
    }
}

async fn read_document(path: &Path) -> Result<Document, StateError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::default()),
        Err(e) => {
            return Err(StateError::Open {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| StateError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
