//! Filesystem staging for the pipeline: directory roles, empty-directory
//! preconditions, purge/copy helpers, and edition compaction.
//!
//! ## Directory Roles
//!
//! ```text
//! data/
//! ├── layers/            # generation input: one directory per layer
//! ├── uploads/           # raw pre-composited images awaiting numbering
//! ├── nfts/              # generation scratch output
//! │   ├── images/        #   freshly composited {n}.png
//! │   └── jsons/         #   freshly flushed {n}.json
//! └── public/
//!     └── {collectionId}/  # staged flat {n}.png + {n}.json, ready to publish
//! ```
//!
//! The input and scratch roots are shared across collections, which is safe
//! because at most one job runs at a time: a scratch directory must be empty
//! before a run populates it, and is emptied again when the run finishes or
//! fails. That precondition ([`ensure_empty_dir`]) is the pipeline's
//! substitute for locking.
//!
//! Staging into `public/{collectionId}` flattens the scratch tree — the
//! publisher and the compactor only ever see flat `{n}.png`/`{n}.json`
//! pairs.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory already in use: {0}")]
    NotEmpty(PathBuf),
    #[error("Nothing staged at {0}")]
    NotStaged(PathBuf),
}

/// The filesystem roots a deployment works against.
#[derive(Debug, Clone)]
pub struct Roots {
    /// Per-layer option images (generation input).
    pub layers: PathBuf,
    /// Flat raw images uploaded for direct numbering.
    pub uploads: PathBuf,
    /// Generation scratch output (`images/` + `jsons/`).
    pub output: PathBuf,
    /// Per-collection staging area, one subdirectory per collection id.
    pub public: PathBuf,
}

impl Roots {
    pub fn images_dir(&self) -> PathBuf {
        self.output.join("images")
    }

    pub fn jsons_dir(&self) -> PathBuf {
        self.output.join("jsons")
    }

    /// `public/{collectionId}` — the staged, ready-to-publish artifacts.
    pub fn staging_dir(&self, collection_id: &str) -> PathBuf {
        self.public.join(collection_id)
    }
}

/// Require `path` to be an empty directory, creating it if missing.
///
/// A non-empty directory means another upload or run owns it.
pub fn ensure_empty_dir(path: &Path) -> Result<(), StagingError> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        return Ok(());
    }
    if fs::read_dir(path)?.next().is_some() {
        return Err(StagingError::NotEmpty(path.to_path_buf()));
    }
    Ok(())
}

/// Delete everything inside `path`, keeping the directory itself.
/// A missing directory is fine — there is nothing to empty.
pub fn empty_dir(path: &Path) -> Result<(), StagingError> {
    if !path.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.path().is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Delete `path` and everything under it. Missing is fine.
pub fn purge_dir(path: &Path) -> Result<(), StagingError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// Copy every file under `src` (recursively) into `dest`, flattened to the
/// file's own name. Staging only ever holds `{n}.png`/`{n}.json` pairs, so
/// flattening cannot collide.
pub fn stage_outputs(src: &Path, dest: &Path) -> Result<(), StagingError> {
    fs::create_dir_all(dest)?;
    copy_flatten(src, dest)
}

fn copy_flatten(dir: &Path, dest: &Path) -> Result<(), StagingError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            copy_flatten(&path, dest)?;
        } else {
            fs::copy(&path, dest.join(entry.file_name()))?;
        }
    }
    Ok(())
}

/// Phase A of publication: delete the listed editions and renumber the rest
/// to a contiguous `1..=M` range. Returns `M`.
///
/// Walks `1..=size` in order; numbers whose image or metadata file is
/// missing are skipped, so re-running over an already-compacted range with
/// an empty removal list is a no-op. Refuses to run against a missing or
/// empty staging directory.
pub fn compact_editions(dir: &Path, size: u32, remove: &[u32]) -> Result<u32, StagingError> {
    if !dir.exists() || fs::read_dir(dir)?.next().is_none() {
        return Err(StagingError::NotStaged(dir.to_path_buf()));
    }

    let mut next: u32 = 1;
    for i in 1..=size {
        let png = dir.join(format!("{i}.png"));
        let json = dir.join(format!("{i}.json"));
        if !png.exists() || !json.exists() {
            continue;
        }
        if remove.contains(&i) {
            fs::remove_file(&png)?;
            fs::remove_file(&json)?;
        } else {
            if i != next {
                fs::rename(&png, dir.join(format!("{next}.png")))?;
                fs::rename(&json, dir.join(format!("{next}.json")))?;
            }
            next += 1;
        }
    }
    Ok(next - 1)
}
