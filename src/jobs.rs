//! The five pipeline jobs and their side effects.
//!
//! Every job follows the same shape: the heavy body (compositing, file
//! shuffling, uploading) runs on its own isolated thread, and the outcome is
//! settled afterwards by the orchestrating handler. A panic in the body is
//! contained at the join and treated like any other worker failure, so a bad
//! image or a logic bug cannot take the queue down.
//!
//! Success and failure each have a fixed ledger of effects:
//!
//! | job              | on success                                   | on failure                         |
//! |------------------|----------------------------------------------|------------------------------------|
//! | GENERATE_ARTWORK | stage → clear scratch → size += N → PROCESSED | queue CREATED + purge, clear scratch |
//! | UPLOAD_ARTWORK   | stage → clear scratch → size += N → PROCESSED | queue CREATED + purge, clear scratch |
//! | SYNC_TO_STORAGE  | save hashes → purge staging → size −= removed → UPLOADED | PROCESSED (staging kept for retry) |
//! | UPDATE_STATUS    | status write                                 | logged                             |
//! | PURGE_PUBLIC_DIR | staging directory removed                    | logged                             |
//!
//! Rollbacks go through the queue where they can, keeping status writes in
//! FIFO order with everything else.

use crate::collection::{CollectionStatus, CollectionStore, StoreError};
use crate::compose::generate_collection;
use crate::layers::read_layers;
use crate::metadata::{raw_upload_metadata, write_edition_files};
use crate::publish::{ContentStore, PublishedHashes, sync_collection};
use crate::queue::QueueHandle;
use crate::staging::{
    Roots, StagingError, compact_editions, empty_dir, ensure_empty_dir, purge_dir, stage_outputs,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),
}

/// One unit of queued work.
#[derive(Debug, Clone)]
pub enum JobPayload {
    /// Composite `collection_size` editions from the uploaded layers.
    GenerateArtwork {
        collection_id: String,
        collection_size: u32,
    },
    /// Number and stage `number_of_images` pre-composited raw images.
    UploadArtwork {
        collection_id: String,
        number_of_images: u32,
    },
    /// Compact the staged editions and publish them to content storage.
    SyncToStorage {
        collection_id: String,
        collection_size: u32,
        collection_name: String,
        numbers_to_remove: Vec<u32>,
    },
    /// Bare status write, used for queued rollbacks.
    UpdateStatus {
        collection_id: String,
        status: CollectionStatus,
    },
    /// Remove a collection's staging directory.
    PurgePublicDir { collection_id: String },
}

impl JobPayload {
    /// Stable job name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            JobPayload::GenerateArtwork { .. } => "GENERATE_ARTWORK",
            JobPayload::UploadArtwork { .. } => "UPLOAD_ARTWORK",
            JobPayload::SyncToStorage { .. } => "SYNC_TO_STORAGE",
            JobPayload::UpdateStatus { .. } => "UPDATE_STATUS",
            JobPayload::PurgePublicDir { .. } => "PURGE_PUBLIC_DIR",
        }
    }
}

/// Everything a job needs to run: the record store, the content store and
/// the filesystem layout.
pub struct JobContext {
    pub store: Arc<dyn CollectionStore>,
    pub content: Arc<dyn ContentStore>,
    pub roots: Roots,
    pub canvas: (u32, u32),
}

/// Executes job payloads against a [`JobContext`]. Owned by the queue's
/// worker thread.
pub struct JobRunner {
    ctx: JobContext,
}

type WorkerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Run `body` on a dedicated thread and flatten panic, spawn failure and
/// body error into one string the handler can log and react to.
fn run_isolated<T, F>(name: &str, body: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> WorkerResult<T> + Send + 'static,
{
    let worker = std::thread::Builder::new().name(name.to_string()).spawn(body);
    match worker {
        Ok(handle) => match handle.join() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("worker thread panicked".to_string()),
        },
        Err(err) => Err(err.to_string()),
    }
}

impl JobRunner {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    /// Execute one job. The returned error covers orchestration failures
    /// only; worker failures are absorbed by the job's own rollback.
    pub fn run(&self, job: &JobPayload, queue: &QueueHandle) -> Result<(), JobError> {
        match job {
            JobPayload::GenerateArtwork {
                collection_id,
                collection_size,
            } => self.generate_artwork(collection_id, *collection_size, queue),
            JobPayload::UploadArtwork {
                collection_id,
                number_of_images,
            } => self.upload_artwork(collection_id, *number_of_images, queue),
            JobPayload::SyncToStorage {
                collection_id,
                collection_size,
                collection_name,
                numbers_to_remove,
            } => self.sync_to_storage(
                collection_id,
                *collection_size,
                collection_name,
                numbers_to_remove,
            ),
            JobPayload::UpdateStatus {
                collection_id,
                status,
            } => Ok(self.ctx.store.update_status(collection_id, *status)?),
            JobPayload::PurgePublicDir { collection_id } => {
                Ok(purge_dir(&self.ctx.roots.staging_dir(collection_id))?)
            }
        }
    }

    fn generate_artwork(
        &self,
        id: &str,
        size: u32,
        queue: &QueueHandle,
    ) -> Result<(), JobError> {
        let layers_root = self.ctx.roots.layers.clone();
        let images_dir = self.ctx.roots.images_dir();
        let jsons_dir = self.ctx.roots.jsons_dir();
        let canvas = self.ctx.canvas;

        let worker = run_isolated("generate-artwork", move || {
            ensure_empty_dir(&images_dir)?;
            ensure_empty_dir(&jsons_dir)?;
            let layers = read_layers(&layers_root, canvas)?;
            let details = generate_collection(&layers, size, &images_dir, canvas)?;
            write_edition_files(&jsons_dir, &details)?;
            Ok(())
        });

        match worker {
            Ok(()) => {
                stage_outputs(&self.ctx.roots.output, &self.ctx.roots.staging_dir(id))?;
                self.clear_generation_scratch()?;
                self.ctx.store.increase_size(id, size)?;
                self.ctx
                    .store
                    .update_status(id, CollectionStatus::Processed)?;
            }
            Err(err) => {
                eprintln!("artwork generation failed: {err}");
                self.queue_rollback(id, queue);
                self.clear_generation_scratch()?;
            }
        }
        Ok(())
    }

    fn upload_artwork(
        &self,
        id: &str,
        number_of_images: u32,
        queue: &QueueHandle,
    ) -> Result<(), JobError> {
        let collection = self.ctx.store.find_one(id)?.ok_or(StoreError::NotFound)?;
        let start = collection.size + 1;
        let uploads = self.ctx.roots.uploads.clone();
        let images_dir = self.ctx.roots.images_dir();
        let jsons_dir = self.ctx.roots.jsons_dir();

        let worker = run_isolated("upload-artwork", move || {
            ensure_empty_dir(&images_dir)?;
            ensure_empty_dir(&jsons_dir)?;

            let mut sources: Vec<(String, PathBuf)> = std::fs::read_dir(&uploads)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|e| e.path().is_file())
                .filter_map(|e| {
                    let name = e.file_name().to_str()?.to_string();
                    (!name.starts_with('.')).then(|| (name, e.path()))
                })
                .collect();
            sources.sort();

            for (offset, (file_name, path)) in sources.iter().enumerate() {
                let n = start + offset as u32;
                std::fs::copy(path, images_dir.join(format!("{n}.png")))?;
                raw_upload_metadata(n, file_name).save(&jsons_dir.join(format!("{n}.json")))?;
            }
            Ok(())
        });

        match worker {
            Ok(()) => {
                stage_outputs(&self.ctx.roots.output, &self.ctx.roots.staging_dir(id))?;
                self.clear_upload_scratch()?;
                self.ctx.store.increase_size(id, number_of_images)?;
                self.ctx
                    .store
                    .update_status(id, CollectionStatus::Processed)?;
            }
            Err(err) => {
                eprintln!("raw artwork upload failed: {err}");
                self.queue_rollback(id, queue);
                self.clear_upload_scratch()?;
            }
        }
        Ok(())
    }

    fn sync_to_storage(
        &self,
        id: &str,
        size: u32,
        name: &str,
        numbers_to_remove: &[u32],
    ) -> Result<(), JobError> {
        let staging = self.ctx.roots.staging_dir(id);
        let content = Arc::clone(&self.ctx.content);
        let name = name.to_string();
        let remove = numbers_to_remove.to_vec();

        let worker: Result<(u32, PublishedHashes), String> =
            run_isolated("sync-to-storage", move || {
                let kept = compact_editions(&staging, size, &remove)?;
                let hashes = sync_collection(content.as_ref(), &staging, kept, &name)?;
                Ok((kept, hashes))
            });

        match worker {
            Ok((kept, hashes)) => {
                self.ctx
                    .store
                    .save_hashes(id, &hashes.images, &hashes.metadata)?;
                purge_dir(&self.ctx.roots.staging_dir(id))?;
                self.ctx.store.decrease_size(id, size - kept)?;
                self.ctx
                    .store
                    .update_status(id, CollectionStatus::Uploaded)?;
            }
            Err(err) => {
                // Staging is left untouched so the sync can be retried.
                eprintln!("storage sync failed: {err}");
                self.ctx
                    .store
                    .update_status(id, CollectionStatus::Processed)?;
            }
        }
        Ok(())
    }

    /// Queued rollback for a failed generation or upload: back to CREATED,
    /// and drop whatever made it into staging.
    fn queue_rollback(&self, id: &str, queue: &QueueHandle) {
        queue.enqueue(JobPayload::UpdateStatus {
            collection_id: id.to_string(),
            status: CollectionStatus::Created,
        });
        queue.enqueue(JobPayload::PurgePublicDir {
            collection_id: id.to_string(),
        });
    }

    fn clear_generation_scratch(&self) -> Result<(), StagingError> {
        empty_dir(&self.ctx.roots.images_dir())?;
        empty_dir(&self.ctx.roots.jsons_dir())?;
        empty_dir(&self.ctx.roots.layers)
    }

    fn clear_upload_scratch(&self) -> Result<(), StagingError> {
        empty_dir(&self.ctx.roots.images_dir())?;
        empty_dir(&self.ctx.roots.jsons_dir())?;
        empty_dir(&self.ctx.roots.uploads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::JsonCollectionStore;
    use crate::metadata::EditionMetadata;
    use crate::publish::DigestContentStore;
    use crate::queue::JobQueue;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        store: Arc<JsonCollectionStore>,
        roots: Roots,
        queue: JobQueue,
    }

    fn fixture(tmp: &TempDir) -> Fixture {
        let store =
            Arc::new(JsonCollectionStore::open(&tmp.path().join("collections.json")).unwrap());
        let roots = Roots {
            layers: tmp.path().join("layers"),
            uploads: tmp.path().join("uploads"),
            output: tmp.path().join("nfts"),
            public: tmp.path().join("public"),
        };
        let ctx = JobContext {
            store: Arc::clone(&store) as Arc<dyn CollectionStore>,
            content: Arc::new(DigestContentStore),
            roots: roots.clone(),
            canvas: (8, 8),
        };
        let queue = JobQueue::start(JobRunner::new(ctx));
        Fixture {
            store,
            roots,
            queue,
        }
    }

    fn write_png(path: &Path, color: [u8; 4]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(4, 4, Rgba(color)).save(path).unwrap();
    }

    fn seed_layers(root: &Path) {
        write_png(&root.join("01_bg/blue_b.png"), [0, 0, 255, 255]);
        write_png(&root.join("01_bg/plain_b.png"), [9, 9, 9, 255]);
        write_png(&root.join("02_fg/red_b.png"), [255, 0, 0, 255]);
    }

    fn stage_pair(dir: &Path, n: u32) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{n}.png")), format!("png-{n}")).unwrap();
        EditionMetadata {
            edition: n,
            image: String::new(),
            name: String::new(),
            attributes: Some(Vec::new()),
        }
        .save(&dir.join(format!("{n}.json")))
        .unwrap();
    }

    #[test]
    fn generate_stages_editions_and_settles_the_record() {
        let tmp = TempDir::new().unwrap();
        let f = fixture(&tmp);
        let id = f.store.create("Moon Apes", "0xabc").unwrap();
        seed_layers(&f.roots.layers);

        f.queue.enqueue(JobPayload::GenerateArtwork {
            collection_id: id.clone(),
            collection_size: 3,
        });
        f.queue.wait_idle();

        let staging = f.roots.staging_dir(&id);
        for n in 1..=3 {
            assert!(staging.join(format!("{n}.png")).exists());
            assert!(staging.join(format!("{n}.json")).exists());
        }
        let c = f.store.find_one(&id).unwrap().unwrap();
        assert_eq!(c.status, CollectionStatus::Processed);
        assert_eq!(c.size, 3);
        // Scratch and input are spent.
        assert_eq!(fs::read_dir(&f.roots.layers).unwrap().count(), 0);
        assert_eq!(fs::read_dir(f.roots.images_dir()).unwrap().count(), 0);
    }

    #[test]
    fn generate_failure_rolls_back_to_created() {
        let tmp = TempDir::new().unwrap();
        let f = fixture(&tmp);
        let id = f.store.create("Moon Apes", "0xabc").unwrap();
        f.store
            .update_status(&id, CollectionStatus::Processing)
            .unwrap();
        // An undecodable option image fails the compositing worker.
        fs::create_dir_all(f.roots.layers.join("01_bg")).unwrap();
        fs::write(f.roots.layers.join("01_bg/junk_b.png"), b"not a png").unwrap();

        f.queue.enqueue(JobPayload::GenerateArtwork {
            collection_id: id.clone(),
            collection_size: 3,
        });
        f.queue.wait_idle();

        let c = f.store.find_one(&id).unwrap().unwrap();
        assert_eq!(c.status, CollectionStatus::Created);
        assert_eq!(c.size, 0);
        assert!(!f.roots.staging_dir(&id).exists());
        assert_eq!(fs::read_dir(&f.roots.layers).unwrap().count(), 0);
    }

    #[test]
    fn upload_numbers_raw_images_above_current_size() {
        let tmp = TempDir::new().unwrap();
        let f = fixture(&tmp);
        let id = f.store.create("Moon Apes", "0xabc").unwrap();
        f.store.increase_size(&id, 2).unwrap();

        fs::create_dir_all(&f.roots.uploads).unwrap();
        fs::write(f.roots.uploads.join("cool-ape.png"), "a").unwrap();
        fs::write(f.roots.uploads.join("mean-ape.png"), "b").unwrap();

        f.queue.enqueue(JobPayload::UploadArtwork {
            collection_id: id.clone(),
            number_of_images: 2,
        });
        f.queue.wait_idle();

        let staging = f.roots.staging_dir(&id);
        assert!(staging.join("3.png").exists());
        assert!(staging.join("4.png").exists());
        let meta = EditionMetadata::load(&staging.join("3.json")).unwrap();
        assert_eq!(meta.name, "cool ape");
        assert_eq!(meta.attributes, None);

        let c = f.store.find_one(&id).unwrap().unwrap();
        assert_eq!(c.size, 4);
        assert_eq!(c.status, CollectionStatus::Processed);
        assert_eq!(fs::read_dir(&f.roots.uploads).unwrap().count(), 0);
    }

    #[test]
    fn sync_publishes_and_settles_the_record() {
        let tmp = TempDir::new().unwrap();
        let f = fixture(&tmp);
        let id = f.store.create("Moon Apes", "0xabc").unwrap();
        f.store.increase_size(&id, 4).unwrap();
        f.store
            .update_status(&id, CollectionStatus::Uploading)
            .unwrap();
        let staging = f.roots.staging_dir(&id);
        for n in 1..=4 {
            stage_pair(&staging, n);
        }

        f.queue.enqueue(JobPayload::SyncToStorage {
            collection_id: id.clone(),
            collection_size: 4,
            collection_name: "Moon Apes".to_string(),
            numbers_to_remove: vec![2],
        });
        f.queue.wait_idle();

        let c = f.store.find_one(&id).unwrap().unwrap();
        assert_eq!(c.status, CollectionStatus::Uploaded);
        assert_eq!(c.size, 3);
        assert!(c.images_hash.is_some());
        assert!(c.metadata_hash.is_some());
        assert_ne!(c.images_hash, c.metadata_hash);
        assert!(!staging.exists());
    }

    #[test]
    fn sync_failure_restores_processed_and_keeps_staging() {
        let tmp = TempDir::new().unwrap();
        let f = fixture(&tmp);
        let id = f.store.create("Moon Apes", "0xabc").unwrap();
        f.store.increase_size(&id, 2).unwrap();
        f.store
            .update_status(&id, CollectionStatus::Uploading)
            .unwrap();
        // Nothing staged: the compaction step refuses to run.

        f.queue.enqueue(JobPayload::SyncToStorage {
            collection_id: id.clone(),
            collection_size: 2,
            collection_name: "Moon Apes".to_string(),
            numbers_to_remove: vec![],
        });
        f.queue.wait_idle();

        let c = f.store.find_one(&id).unwrap().unwrap();
        assert_eq!(c.status, CollectionStatus::Processed);
        assert_eq!(c.size, 2);
        assert_eq!(c.images_hash, None);
    }
}
