//! Publication: the two-phase upload to content-addressed storage.
//!
//! Phase B of a sync run (Phase A compaction lives in [`crate::staging`]).
//! The order is load-bearing:
//!
//! 1. Batch-upload images `1..=M` → `images_hash`.
//! 2. Rewrite every `{n}.json`: `image` becomes `ipfs://{images_hash}/{n}`,
//!    `_edition` becomes `n`, and editions that carry attributes get the
//!    display name `"{collection} #{n}"`.
//! 3. Only after every rewrite, batch-upload the metadata files →
//!    `metadata_hash`.
//!
//! The storage network itself is a collaborator behind [`ContentStore`]: put
//! a named file set, get back the content hash of the wrapping directory.
//! [`DigestContentStore`] is the built-in implementation — a deterministic
//! sha256 digest over the file set — used by tests and the CLI's local mode;
//! a gateway-backed client satisfies the same trait in deployment.

use crate::metadata::{EditionMetadata, MetadataError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("Staged file missing: {0}")]
    MissingFile(PathBuf),
    #[error("Content store rejected upload: {0}")]
    Store(String),
}

/// One named file in an upload batch. Names are the bare edition numbers so
/// published URIs read `ipfs://{hash}/{n}`.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Put-files-get-hash interface to the content-addressed storage network.
pub trait ContentStore: Send + Sync {
    /// Upload `files` wrapped in a directory and return the directory's
    /// content hash.
    fn put_directory(&self, files: &[StoredFile]) -> Result<String, PublishError>;
}

/// Deterministic local content store: the "hash" is a sha256 digest over the
/// sorted (name, content) sequence. Two identical file sets always publish
/// to the same address, which is all the pipeline relies on.
#[derive(Debug, Default)]
pub struct DigestContentStore;

impl ContentStore for DigestContentStore {
    fn put_directory(&self, files: &[StoredFile]) -> Result<String, PublishError> {
        let mut sorted: Vec<&StoredFile> = files.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = Sha256::new();
        for file in sorted {
            hasher.update(file.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(&file.content);
            hasher.update([0u8]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// The two content hashes a successful publication produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedHashes {
    pub images: String,
    pub metadata: String,
}

/// Publish the compacted staging directory: images first, then rewritten
/// metadata. `kept` is the contiguous edition count left by Phase A.
pub fn sync_collection(
    store: &dyn ContentStore,
    staging_dir: &Path,
    kept: u32,
    collection_name: &str,
) -> Result<PublishedHashes, PublishError> {
    let images = read_batch(staging_dir, kept, "png")?;
    let images_hash = store.put_directory(&images)?;

    for n in 1..=kept {
        update_json_file(staging_dir, n, collection_name, &images_hash)?;
    }

    let metadata = read_batch(staging_dir, kept, "json")?;
    let metadata_hash = store.put_directory(&metadata)?;

    Ok(PublishedHashes {
        images: images_hash,
        metadata: metadata_hash,
    })
}

/// Read `1.ext ..= kept.ext` into an upload batch, named by bare number.
fn read_batch(dir: &Path, kept: u32, ext: &str) -> Result<Vec<StoredFile>, PublishError> {
    let mut files = Vec::with_capacity(kept as usize);
    for n in 1..=kept {
        let path = dir.join(format!("{n}.{ext}"));
        if !path.exists() {
            return Err(PublishError::MissingFile(path));
        }
        files.push(StoredFile {
            name: n.to_string(),
            content: std::fs::read(&path)?,
        });
    }
    Ok(files)
}

/// Rewrite one staged metadata file against the published image hash.
fn update_json_file(
    dir: &Path,
    n: u32,
    collection_name: &str,
    images_hash: &str,
) -> Result<(), PublishError> {
    let path = dir.join(format!("{n}.json"));
    if !path.exists() {
        return Err(PublishError::MissingFile(path));
    }

    let mut meta = EditionMetadata::load(&path)?;
    meta.edition = n;
    meta.image = format!("ipfs://{images_hash}/{n}");
    if meta.attributes.as_ref().is_some_and(|a| !a.is_empty()) {
        meta.name = format!("{collection_name} #{n}");
    }
    meta.save(&path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Attribute;
    use crate::rarity::Rarity;
    use std::fs;
    use tempfile::TempDir;

    fn stage_edition(dir: &Path, n: u32, with_attributes: bool) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{n}.png")), format!("image-{n}")).unwrap();
        let attributes = with_attributes.then(|| {
            vec![Attribute {
                trait_name: "Hat".to_string(),
                value: "Crown".to_string(),
                rarity: Rarity::Rare,
            }]
        });
        EditionMetadata {
            edition: n,
            image: String::new(),
            name: String::new(),
            attributes,
        }
        .save(&dir.join(format!("{n}.json")))
        .unwrap();
    }

    #[test]
    fn digest_store_is_deterministic_and_order_insensitive() {
        let store = DigestContentStore;
        let a = StoredFile {
            name: "1".to_string(),
            content: b"one".to_vec(),
        };
        let b = StoredFile {
            name: "2".to_string(),
            content: b"two".to_vec(),
        };
        let h1 = store.put_directory(&[a.clone(), b.clone()]).unwrap();
        let h2 = store.put_directory(&[b, a]).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn digest_store_distinguishes_content() {
        let store = DigestContentStore;
        let h1 = store
            .put_directory(&[StoredFile {
                name: "1".to_string(),
                content: b"one".to_vec(),
            }])
            .unwrap();
        let h2 = store
            .put_directory(&[StoredFile {
                name: "1".to_string(),
                content: b"uno".to_vec(),
            }])
            .unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn sync_rewrites_every_metadata_file() {
        let tmp = TempDir::new().unwrap();
        for n in 1..=3 {
            stage_edition(tmp.path(), n, true);
        }

        let hashes = sync_collection(&DigestContentStore, tmp.path(), 3, "Moon Apes").unwrap();
        assert!(!hashes.images.is_empty());
        assert!(!hashes.metadata.is_empty());
        assert_ne!(hashes.images, hashes.metadata);

        for n in 1..=3u32 {
            let meta = EditionMetadata::load(&tmp.path().join(format!("{n}.json"))).unwrap();
            assert_eq!(meta.edition, n);
            assert_eq!(meta.image, format!("ipfs://{}/{n}", hashes.images));
            assert_eq!(meta.name, format!("Moon Apes #{n}"));
        }
    }

    #[test]
    fn editions_without_attributes_keep_their_name() {
        let tmp = TempDir::new().unwrap();
        stage_edition(tmp.path(), 1, false);

        let hashes = sync_collection(&DigestContentStore, tmp.path(), 1, "Moon Apes").unwrap();
        let meta = EditionMetadata::load(&tmp.path().join("1.json")).unwrap();
        assert_eq!(meta.image, format!("ipfs://{}/1", hashes.images));
        // Raw uploads keep the filename-derived name untouched.
        assert_eq!(meta.name, "");
    }

    #[test]
    fn missing_staged_image_aborts_before_any_rewrite() {
        let tmp = TempDir::new().unwrap();
        stage_edition(tmp.path(), 1, true);
        // Claim 2 editions but stage only 1.
        let result = sync_collection(&DigestContentStore, tmp.path(), 2, "Moon Apes");
        assert!(matches!(result, Err(PublishError::MissingFile(_))));

        // No rewrite happened: image field still empty.
        let meta = EditionMetadata::load(&tmp.path().join("1.json")).unwrap();
        assert_eq!(meta.image, "");
    }

    #[test]
    fn metadata_hash_reflects_rewritten_content() {
        // Publishing the same files under different collection names must
        // produce different metadata hashes (names are baked in) but the
        // same images hash.
        let tmp_a = TempDir::new().unwrap();
        let tmp_b = TempDir::new().unwrap();
        stage_edition(tmp_a.path(), 1, true);
        stage_edition(tmp_b.path(), 1, true);

        let a = sync_collection(&DigestContentStore, tmp_a.path(), 1, "Alpha").unwrap();
        let b = sync_collection(&DigestContentStore, tmp_b.path(), 1, "Beta").unwrap();
        assert_eq!(a.images, b.images);
        assert_ne!(a.metadata, b.metadata);
    }
}
