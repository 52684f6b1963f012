//! End-to-end pipeline runs against a real temp directory tree: create a
//! collection, composite editions, curate, publish, and check the record at
//! every step.

use layer_mint::collection::{CollectionStatus, CollectionStore, JsonCollectionStore};
use layer_mint::jobs::{JobContext, JobRunner};
use layer_mint::metadata::EditionMetadata;
use layer_mint::publish::{ContentStore, DigestContentStore, StoredFile};
use layer_mint::queue::JobQueue;
use layer_mint::service::{CollectionService, GenerationLimits};
use layer_mint::staging::Roots;
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Pipeline {
    service: CollectionService,
    store: Arc<JsonCollectionStore>,
    roots: Roots,
    queue: JobQueue,
}

fn pipeline(tmp: &TempDir) -> Pipeline {
    let store = Arc::new(JsonCollectionStore::open(&tmp.path().join("collections.json")).unwrap());
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
    let service = CollectionService::new(
        Arc::clone(&store) as Arc<dyn CollectionStore>,
        queue.handle(),
        roots.clone(),
        (8, 8),
        GenerationLimits {
            min_layers: 3,
            min_options: 1,
        },
    );
    Pipeline {
        service,
        store,
        roots,
        queue,
    }
}

fn write_png(path: &Path, color: [u8; 4]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(8, 8, Rgba(color)).save(path).unwrap();
}

/// Three layers, mixed rarities.
fn seed_layers(root: &Path) {
    write_png(&root.join("01_background/plain_b.png"), [10, 10, 10, 255]);
    write_png(&root.join("01_background/sunset_r.png"), [200, 80, 0, 255]);
    write_png(&root.join("02_body/grey_b.png"), [128, 128, 128, 255]);
    write_png(&root.join("03_hat/red-cap_m.png"), [255, 0, 0, 255]);
    write_png(&root.join("03_hat/crown_sr.png"), [255, 215, 0, 255]);
}

#[test]
fn generation_stages_a_full_edition_set() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    seed_layers(&p.roots.layers);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();

    p.service.request_generation(&id, 5).unwrap();
    p.queue.wait_idle();

    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.status, CollectionStatus::Processed);
    assert_eq!(c.size, 5);

    let staging = p.roots.staging_dir(&id);
    for n in 1..=5u32 {
        assert!(staging.join(format!("{n}.png")).exists());
        let meta = EditionMetadata::load(&staging.join(format!("{n}.json"))).unwrap();
        assert_eq!(meta.edition, n);
        let attrs = meta.attributes.expect("generated editions carry attributes");
        assert_eq!(attrs.len(), 3);
        // Display transforms applied: trait from the directory suffix.
        assert_eq!(attrs[0].trait_name, "Background");
        assert_eq!(attrs[1].trait_name, "Body");
        assert_eq!(attrs[2].trait_name, "Hat");
    }

    // Input and scratch are spent after a successful run.
    assert_eq!(fs::read_dir(&p.roots.layers).unwrap().count(), 0);
    assert_eq!(fs::read_dir(&p.roots.output).unwrap().flatten().count(), 2);
}

#[test]
fn curate_and_publish_renumbers_and_saves_hashes() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    seed_layers(&p.roots.layers);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();

    p.service.request_generation(&id, 10).unwrap();
    p.queue.wait_idle();

    p.service.request_sync(&id, vec![3, 7]).unwrap();
    p.queue.wait_idle();

    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.status, CollectionStatus::Uploaded);
    assert_eq!(c.size, 8);
    let images_hash = c.images_hash.expect("images hash saved");
    let metadata_hash = c.metadata_hash.expect("metadata hash saved");
    assert_ne!(images_hash, metadata_hash);

    // Staging is gone after a successful publish.
    assert!(!p.roots.staging_dir(&id).exists());
}

#[test]
fn published_metadata_references_images_by_hash() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    seed_layers(&p.roots.layers);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();

    p.service.request_generation(&id, 4).unwrap();
    p.queue.wait_idle();

    // Snapshot the staged images before publication purges them.
    let staging = p.roots.staging_dir(&id);
    let snapshot: Vec<StoredFile> = (1..=4u32)
        .map(|n| StoredFile {
            name: n.to_string(),
            content: fs::read(staging.join(format!("{n}.png"))).unwrap(),
        })
        .collect();

    p.service.request_sync(&id, vec![]).unwrap();
    p.queue.wait_idle();

    // The saved images hash is the content address of exactly the files
    // that were staged — what every `ipfs://{hash}/{n}` URI points into.
    let c = p.store.find_one(&id).unwrap().unwrap();
    let expected = DigestContentStore.put_directory(&snapshot).unwrap();
    assert_eq!(c.images_hash.as_deref(), Some(expected.as_str()));
}

#[test]
fn sync_rejected_while_upload_in_progress() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();
    p.store
        .update_status(&id, CollectionStatus::Uploading)
        .unwrap();

    let err = p.service.request_sync(&id, vec![]).unwrap_err();
    assert_eq!(err.to_string(), "Collection being uploaded already.");

    // Rejection queued nothing and changed nothing.
    p.queue.wait_idle();
    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.status, CollectionStatus::Uploading);
    assert_eq!(c.size, 0);
}

#[test]
fn crashed_generation_rolls_everything_back() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();

    // Three stocked layers, but one option is not a decodable image — the
    // compositing worker dies partway through.
    seed_layers(&p.roots.layers);
    fs::write(p.roots.layers.join("02_body/broken_b.png"), b"garbage").unwrap();

    // Large enough that some editions will draw the broken option.
    p.service.request_generation(&id, 64).unwrap();
    p.queue.wait_idle();

    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.status, CollectionStatus::Created);
    assert_eq!(c.size, 0);
    assert!(!p.roots.staging_dir(&id).exists());
    assert_eq!(fs::read_dir(p.roots.output.join("images")).unwrap().count(), 0);
}

#[test]
fn raw_uploads_extend_a_generated_collection() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    seed_layers(&p.roots.layers);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();

    p.service.request_generation(&id, 3).unwrap();
    p.queue.wait_idle();

    write_png(&p.roots.uploads.join("golden-ape.png"), [255, 215, 0, 255]);
    p.service.request_raw_upload(&id, 1).unwrap();
    p.queue.wait_idle();

    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.size, 4);
    assert_eq!(c.status, CollectionStatus::Processed);

    // The raw image took the next free number and a filename-derived name.
    let meta = EditionMetadata::load(&p.roots.staging_dir(&id).join("4.json")).unwrap();
    assert_eq!(meta.name, "golden ape");
    assert_eq!(meta.attributes, None);
}

#[test]
fn republish_after_failed_sync() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    let id = p.service.create("Moon Apes", "0xabc").unwrap();
    p.store.increase_size(&id, 2).unwrap();
    p.store
        .update_status(&id, CollectionStatus::Processed)
        .unwrap();

    // Nothing staged: the sync fails and rolls back to PROCESSED.
    p.service.request_sync(&id, vec![]).unwrap();
    p.queue.wait_idle();
    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.status, CollectionStatus::Processed);

    // Stage the editions and retry — the same request now succeeds.
    let staging = p.roots.staging_dir(&id);
    for n in 1..=2u32 {
        write_png(&staging.join(format!("{n}.png")), [1, 2, 3, 255]);
        EditionMetadata {
            edition: n,
            image: String::new(),
            name: String::new(),
            attributes: Some(Vec::new()),
        }
        .save(&staging.join(format!("{n}.json")))
        .unwrap();
    }
    p.service.request_sync(&id, vec![]).unwrap();
    p.queue.wait_idle();

    let c = p.store.find_one(&id).unwrap().unwrap();
    assert_eq!(c.status, CollectionStatus::Uploaded);
    assert_eq!(c.size, 2);
    assert!(c.images_hash.is_some());
}
