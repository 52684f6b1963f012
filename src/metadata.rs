//! Per-edition metadata: accumulation during compositing, flush to disk, and
//! the on-disk record schema.
//!
//! ## On-Disk Schema
//!
//! Each staged edition `n` has a sibling `{n}.json`:
//!
//! ```json
//! {
//!   "_edition": 3,
//!   "image": "ipfs://bafy.../3",
//!   "name": "Moon Apes #3",
//!   "attributes": [
//!     { "trait": "Background", "value": "Sunset", "rarity": "Rare" }
//!   ]
//! }
//! ```
//!
//! `image` and `name` start empty and are rewritten during publication
//! ([`crate::publish`]). Raw-upload editions carry a `name` derived from the
//! source filename and no `attributes`.
//!
//! ## Accumulation
//!
//! [`EditionDetails`] is an explicit per-edition value returned by the
//! compositor — there is no shared mutable collector, so edition batches can
//! run in parallel. The option-index trail (`hash`/`decoded_hash`) exists for
//! debugging duplicate editions and is never serialized.

use crate::layers::{Layer, LayerOption};
use crate::naming::{display_trait, display_value};
use crate::rarity::Rarity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One trait entry in an edition's attribute list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "trait")]
    pub trait_name: String,
    pub value: String,
    pub rarity: Rarity,
}

/// The `{n}.json` record staged next to each edition image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditionMetadata {
    #[serde(rename = "_edition")]
    pub edition: u32,
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Attribute>>,
}

impl EditionMetadata {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Everything the compositor records about one edition: the chosen traits
/// plus the option-index trail identifying the exact combination.
#[derive(Debug, Clone)]
pub struct EditionDetails {
    pub edition: u32,
    /// Concatenated `{layer id}{option id}` pairs — a quick fingerprint of
    /// the combination. Debug-only, never written to disk.
    pub hash: String,
    /// The same trail decoded as (layer id, option id) pairs.
    pub decoded_hash: Vec<(usize, usize)>,
    /// Raw (undisplayed) attributes, one per layer that drew an option.
    pub attributes: Vec<Attribute>,
}

impl EditionDetails {
    pub fn new(edition: u32) -> Self {
        Self {
            edition,
            hash: String::new(),
            decoded_hash: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Record that `option` was drawn for `layer`.
    pub fn record(&mut self, layer: &Layer, option: &LayerOption) {
        self.attributes.push(Attribute {
            trait_name: layer.name.clone(),
            value: option.label.clone(),
            rarity: option.rarity,
        });
        self.hash.push_str(&layer.id.to_string());
        self.hash.push_str(&option.id.to_string());
        self.decoded_hash.push((layer.id, option.id));
    }

    /// The on-disk record for this edition, with display transforms applied
    /// to every attribute. `image` and `name` stay empty until publication.
    pub fn to_metadata(&self) -> EditionMetadata {
        let attributes = self
            .attributes
            .iter()
            .map(|a| Attribute {
                trait_name: display_trait(&a.trait_name),
                value: display_value(&a.value),
                rarity: a.rarity,
            })
            .collect();
        EditionMetadata {
            edition: self.edition,
            image: String::new(),
            name: String::new(),
            attributes: Some(attributes),
        }
    }
}

/// Flush one `{n}.json` per edition into `dir`.
pub fn write_edition_files(dir: &Path, details: &[EditionDetails]) -> Result<(), MetadataError> {
    std::fs::create_dir_all(dir)?;
    for d in details {
        d.to_metadata().save(&dir.join(format!("{}.json", d.edition)))?;
    }
    Ok(())
}

/// Minimal record for a pre-composited raw image: name is the source file
/// stem with dashes converted to spaces.
pub fn raw_upload_metadata(edition: u32, source_file_name: &str) -> EditionMetadata {
    let stem = source_file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(source_file_name);
    EditionMetadata {
        edition,
        image: String::new(),
        name: stem.replace('-', " "),
        attributes: None,
    }
}
