//! Compositing: turns a layer set into numbered edition images.
//!
//! Each edition gets a fresh transparent RGBA canvas. Layers are walked in
//! order; for every layer one option is drawn by the weighted selector,
//! scaled to the layer's configured size (Lanczos3) and overlaid at its
//! position. The finished canvas is written to `images/{n}.png` and the
//! chosen traits come back as an [`EditionDetails`] value.
//!
//! Editions are independent — each has its own canvas, RNG handle and
//! accumulator — so the batch fans out over rayon. Results are re-sorted by
//! edition number afterwards to keep the returned list deterministic.

use crate::layers::Layer;
use crate::metadata::EditionDetails;
use crate::rarity::rarity_randomiser;
use image::imageops::FilterType;
use image::{ImageReader, RgbaImage, imageops};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Composite `count` editions from `layers` into `images_dir`.
///
/// Editions are numbered `1..=count`; each produces `{n}.png` plus an
/// in-memory details record. The caller flushes the details to metadata
/// files afterwards ([`crate::metadata::write_edition_files`]).
pub fn generate_collection(
    layers: &[Layer],
    count: u32,
    images_dir: &Path,
    canvas: (u32, u32),
) -> Result<Vec<EditionDetails>, ComposeError> {
    std::fs::create_dir_all(images_dir)?;

    let mut details: Vec<EditionDetails> = (1..=count)
        .into_par_iter()
        .map(|edition| compose_edition(layers, edition, images_dir, canvas))
        .collect::<Result<Vec<_>, _>>()?;
    details.sort_by_key(|d| d.edition);
    Ok(details)
}

/// Composite a single edition and persist its canvas.
fn compose_edition(
    layers: &[Layer],
    edition: u32,
    images_dir: &Path,
    canvas_size: (u32, u32),
) -> Result<EditionDetails, ComposeError> {
    let mut rng = rand::rng();
    let mut canvas = RgbaImage::new(canvas_size.0, canvas_size.1);
    let mut details = EditionDetails::new(edition);

    for layer in layers {
        let Some(pick) = rarity_randomiser(&layer.rarities(), &mut rng) else {
            continue;
        };
        let option = &layer.options[pick];
        details.record(layer, option);

        let path = layer.dir.join(&option.file_name);
        let sprite = load_scaled(&path, layer.size)?;
        imageops::overlay(&mut canvas, &sprite, layer.position.0, layer.position.1);
    }

    let out = images_dir.join(format!("{edition}.png"));
    canvas.save(&out).map_err(|source| ComposeError::Encode {
        path: out.clone(),
        source,
    })?;
    Ok(details)
}

/// Load an option image and scale it to the layer's draw size.
fn load_scaled(path: &Path, size: (u32, u32)) -> Result<RgbaImage, ComposeError> {
    let img = ImageReader::open(path)?
        .decode()
        .map_err(|source| ComposeError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if (img.width(), img.height()) == size {
        return Ok(img.into_rgba8());
    }
    Ok(img
        .resize_exact(size.0, size.1, FilterType::Lanczos3)
        .into_rgba8())
}
