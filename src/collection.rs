//! Collection records: the status lifecycle, the keyed record store
//! interface, and a JSON-file-backed implementation.
//!
//! ## Lifecycle
//!
//! ```text
//! CREATED → PROCESSING → PROCESSED → UPLOADING → UPLOADED → DEPLOYED
//! ```
//!
//! Forward motion is owned by the pipeline jobs; the two rollback edges
//! (PROCESSING→CREATED on a failed generation, UPLOADING→PROCESSED on a
//! failed sync) are owned by them too. UPLOADED→DEPLOYED is driven by the
//! on-chain publish outside this crate — the store only records it. The six
//! spellings are wire-compatible with every existing consumer and must not
//! change.
//!
//! `size` is the count of staged/published editions and only moves as the
//! side effect of a completed job — never through a direct edit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("A collection with that collection ID does not exist.")]
    NotFound,
}

/// Where a collection sits in the generate → publish lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionStatus {
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "PROCESSED")]
    Processed,
    #[serde(rename = "UPLOADING")]
    Uploading,
    #[serde(rename = "UPLOADED")]
    Uploaded,
    #[serde(rename = "DEPLOYED")]
    Deployed,
}

impl CollectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Created => "CREATED",
            CollectionStatus::Processing => "PROCESSING",
            CollectionStatus::Processed => "PROCESSED",
            CollectionStatus::Uploading => "UPLOADING",
            CollectionStatus::Uploaded => "UPLOADED",
            CollectionStatus::Deployed => "DEPLOYED",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(CollectionStatus::Created),
            "PROCESSING" => Ok(CollectionStatus::Processing),
            "PROCESSED" => Ok(CollectionStatus::Processed),
            "UPLOADING" => Ok(CollectionStatus::Uploading),
            "UPLOADED" => Ok(CollectionStatus::Uploaded),
            "DEPLOYED" => Ok(CollectionStatus::Deployed),
            other => Err(format!("Collection status provided is not valid: {other}")),
        }
    }
}

/// One owner's collection, as persisted in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub size: u32,
    pub status: CollectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_hash: Option<String>,
}

/// Keyed lookup/update over collection records — the only persistence the
/// pipeline needs. No query language; `find_all` covers the CLI listing.
pub trait CollectionStore: Send + Sync {
    fn create(&self, name: &str, owner: &str) -> Result<String, StoreError>;
    fn find_one(&self, id: &str) -> Result<Option<Collection>, StoreError>;
    fn find_all(
        &self,
        statuses: &[CollectionStatus],
        owner: Option<&str>,
    ) -> Result<Vec<Collection>, StoreError>;
    fn update_status(&self, id: &str, status: CollectionStatus) -> Result<(), StoreError>;
    fn increase_size(&self, id: &str, by: u32) -> Result<(), StoreError>;
    fn decrease_size(&self, id: &str, by: u32) -> Result<(), StoreError>;
    fn save_hashes(&self, id: &str, images: &str, metadata: &str) -> Result<(), StoreError>;
    fn set_contract_address(&self, id: &str, address: &str) -> Result<(), StoreError>;
    fn remove(&self, id: &str) -> Result<bool, StoreError>;
}

/// File-backed store: the whole record map lives in one pretty-printed JSON
/// file, rewritten on every mutation. Fine for a single-node deployment with
/// a handful of collections; anything bigger swaps in another
/// [`CollectionStore`].
#[derive(Debug)]
pub struct JsonCollectionStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, Collection>>,
}

impl JsonCollectionStore {
    /// Open (or start) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let records = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    fn persist(&self, records: &BTreeMap<String, Collection>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(records)?)?;
        Ok(())
    }

    fn mutate<F>(&self, id: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Collection),
    {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(id).ok_or(StoreError::NotFound)?;
        f(record);
        self.persist(&records)
    }
}

impl CollectionStore for JsonCollectionStore {
    fn create(&self, name: &str, owner: &str) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut records = self.records.lock().unwrap();
        records.insert(
            id.clone(),
            Collection {
                id: id.clone(),
                name: name.to_string(),
                owner: owner.to_string(),
                size: 0,
                status: CollectionStatus::Created,
                contract_address: None,
                images_hash: None,
                metadata_hash: None,
            },
        );
        self.persist(&records)?;
        Ok(id)
    }

    fn find_one(&self, id: &str) -> Result<Option<Collection>, StoreError> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    fn find_all(
        &self,
        statuses: &[CollectionStatus],
        owner: Option<&str>,
    ) -> Result<Vec<Collection>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|c| statuses.is_empty() || statuses.contains(&c.status))
            .filter(|c| owner.is_none_or(|o| c.owner == o))
            .cloned()
            .collect())
    }

    fn update_status(&self, id: &str, status: CollectionStatus) -> Result<(), StoreError> {
        self.mutate(id, |c| c.status = status)
    }

    fn increase_size(&self, id: &str, by: u32) -> Result<(), StoreError> {
        self.mutate(id, |c| c.size += by)
    }

    fn decrease_size(&self, id: &str, by: u32) -> Result<(), StoreError> {
        self.mutate(id, |c| c.size = c.size.saturating_sub(by))
    }

    fn save_hashes(&self, id: &str, images: &str, metadata: &str) -> Result<(), StoreError> {
        self.mutate(id, |c| {
            c.images_hash = Some(images.to_string());
            c.metadata_hash = Some(metadata.to_string());
        })
    }

    fn set_contract_address(&self, id: &str, address: &str) -> Result<(), StoreError> {
        self.mutate(id, |c| c.contract_address = Some(address.to_string()))
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        let removed = records.remove(id).is_some();
        if removed {
            self.persist(&records)?;
        }
        Ok(removed)
    }
}
