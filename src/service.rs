//! The request surface: validates lifecycle transitions and hands accepted
//! work to the job queue.
//!
//! Validation and side effects are strictly ordered — a rejected request
//! mutates nothing, enqueues nothing. An accepted request flips the status
//! synchronously (so a second caller sees the transition immediately) and
//! enqueues the job; everything after that is the job's business.
//!
//! The rejection messages are part of the API surface consumed by the
//! dashboard and must keep their exact wording.

use crate::collection::{Collection, CollectionStatus, CollectionStore, StoreError};
use crate::jobs::JobPayload;
use crate::layers::{LayerError, read_layers};
use crate::queue::QueueHandle;
use crate::staging::Roots;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("A collection with that collection ID does not exist.")]
    NotFound,
    #[error("Please specify a collectionSize.")]
    MissingCollectionSize,
    #[error("Please provide at least {min_layers} layers with at least {min_options} options for each layer")]
    NotEnoughLayers {
        min_layers: usize,
        min_options: usize,
    },
    #[error("Collection already processed.")]
    AlreadyProcessed,
    #[error("Collection cannot be uploaded yet.")]
    NotReadyForUpload,
    #[error("Collection being uploaded already.")]
    UploadInProgress,
    #[error("Collection already uploaded.")]
    AlreadyUploaded,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Layer error: {0}")]
    Layer(#[from] LayerError),
}

/// Generation preconditions on the layer inventory.
#[derive(Debug, Clone, Copy)]
pub struct GenerationLimits {
    pub min_layers: usize,
    pub min_options: usize,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            min_layers: 5,
            min_options: 5,
        }
    }
}

/// Front door of the pipeline: every collection request comes through here.
pub struct CollectionService {
    store: Arc<dyn CollectionStore>,
    queue: QueueHandle,
    roots: Roots,
    canvas: (u32, u32),
    limits: GenerationLimits,
}

impl CollectionService {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        queue: QueueHandle,
        roots: Roots,
        canvas: (u32, u32),
        limits: GenerationLimits,
    ) -> Self {
        Self {
            store,
            queue,
            roots,
            canvas,
            limits,
        }
    }

    /// Register a new, empty collection and return its id.
    pub fn create(&self, name: &str, owner: &str) -> Result<String, ServiceError> {
        Ok(self.store.create(name, owner)?)
    }

    pub fn find_one(&self, id: &str) -> Result<Collection, ServiceError> {
        self.store.find_one(id)?.ok_or(ServiceError::NotFound)
    }

    pub fn find_all(
        &self,
        statuses: &[CollectionStatus],
        owner: Option<&str>,
    ) -> Result<Vec<Collection>, ServiceError> {
        Ok(self.store.find_all(statuses, owner)?)
    }

    /// Accept a generation request: flip to PROCESSING and queue the
    /// compositing job.
    ///
    /// Requires a non-zero target size, a sufficiently stocked layer
    /// inventory, and a collection that has not moved past PROCESSING.
    pub fn request_generation(&self, id: &str, collection_size: u32) -> Result<(), ServiceError> {
        let collection = self.find_one(id)?;
        if collection_size == 0 {
            return Err(ServiceError::MissingCollectionSize);
        }
        Self::require_unprocessed(&collection)?;
        self.require_layer_inventory()?;

        self.store.update_status(id, CollectionStatus::Processing)?;
        self.queue.enqueue(JobPayload::GenerateArtwork {
            collection_id: id.to_string(),
            collection_size,
        });
        Ok(())
    }

    /// Accept a raw-image upload request: flip to PROCESSING and queue the
    /// numbering job for `number_of_images` files already placed in the
    /// uploads directory.
    ///
    /// Unlike generation, a PROCESSED collection is still eligible — raw
    /// images extend the staged set, numbered from `size + 1`.
    pub fn request_raw_upload(&self, id: &str, number_of_images: u32) -> Result<(), ServiceError> {
        let collection = self.find_one(id)?;
        if number_of_images == 0 {
            return Err(ServiceError::MissingCollectionSize);
        }
        Self::require_extendable(&collection)?;

        self.store.update_status(id, CollectionStatus::Processing)?;
        self.queue.enqueue(JobPayload::UploadArtwork {
            collection_id: id.to_string(),
            number_of_images,
        });
        Ok(())
    }

    /// Accept a publication request: flip to UPLOADING and queue the sync
    /// job, snapshotting the size and name it will work against.
    pub fn request_sync(&self, id: &str, numbers_to_remove: Vec<u32>) -> Result<(), ServiceError> {
        let collection = self.find_one(id)?;
        match collection.status {
            CollectionStatus::Processed => {}
            CollectionStatus::Created | CollectionStatus::Processing => {
                return Err(ServiceError::NotReadyForUpload);
            }
            CollectionStatus::Uploading => return Err(ServiceError::UploadInProgress),
            CollectionStatus::Uploaded | CollectionStatus::Deployed => {
                return Err(ServiceError::AlreadyUploaded);
            }
        }

        self.store.update_status(id, CollectionStatus::Uploading)?;
        self.queue.enqueue(JobPayload::SyncToStorage {
            collection_id: id.to_string(),
            collection_size: collection.size,
            collection_name: collection.name,
            numbers_to_remove,
        });
        Ok(())
    }

    /// Write a status directly, bypassing transition checks. Used by the
    /// on-chain deployment flow (UPLOADED → DEPLOYED) and operators.
    pub fn set_status(&self, id: &str, status: CollectionStatus) -> Result<(), ServiceError> {
        Ok(self.store.update_status(id, status)?)
    }

    /// Queue a status write behind any running job instead of racing it.
    pub fn set_status_async(&self, id: &str, status: CollectionStatus) -> Result<(), ServiceError> {
        // Existence check up front; the queued write would only log.
        self.find_one(id)?;
        self.queue.enqueue(JobPayload::UpdateStatus {
            collection_id: id.to_string(),
            status,
        });
        Ok(())
    }

    /// Record the deployed contract address on the collection.
    pub fn set_contract_address(&self, id: &str, address: &str) -> Result<(), ServiceError> {
        Ok(self.store.set_contract_address(id, address)?)
    }

    /// Delete the record and any staged artifacts.
    pub fn remove(&self, id: &str) -> Result<(), ServiceError> {
        if !self.store.remove(id)? {
            return Err(ServiceError::NotFound);
        }
        self.queue.enqueue(JobPayload::PurgePublicDir {
            collection_id: id.to_string(),
        });
        Ok(())
    }

    /// Generation is only valid before the collection is processed.
    fn require_unprocessed(collection: &Collection) -> Result<(), ServiceError> {
        match collection.status {
            CollectionStatus::Created | CollectionStatus::Processing => Ok(()),
            _ => Err(ServiceError::AlreadyProcessed),
        }
    }

    /// Raw uploads stay valid through PROCESSED; once publication starts the
    /// staged set is frozen.
    fn require_extendable(collection: &Collection) -> Result<(), ServiceError> {
        match collection.status {
            CollectionStatus::Created
            | CollectionStatus::Processing
            | CollectionStatus::Processed => Ok(()),
            _ => Err(ServiceError::AlreadyProcessed),
        }
    }

    fn require_layer_inventory(&self) -> Result<(), ServiceError> {
        let layers = read_layers(&self.roots.layers, self.canvas)?;
        let stocked = layers.len() >= self.limits.min_layers
            && layers
                .iter()
                .all(|l| l.options.len() >= self.limits.min_options);
        if !stocked {
            return Err(ServiceError::NotEnoughLayers {
                min_layers: self.limits.min_layers,
                min_options: self.limits.min_options,
            });
        }
        Ok(())
    }
}
