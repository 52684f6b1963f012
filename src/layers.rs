//! Layer discovery: turns the uploaded layer directories into an ordered,
//! in-memory layer specification.
//!
//! The generation input root holds one directory per compositing layer, drawn
//! bottom-to-top in directory-name order:
//!
//! ```text
//! layers/
//! ├── 01_background/
//! │   ├── plain_b.png
//! │   └── sunset_r.png
//! ├── 02_body/
//! │   └── ...
//! └── 03_hat/
//!     └── ...
//! ```
//!
//! Options within a layer are ordered by file name; dotfiles are skipped.
//! The snapshot taken here is what a generation run draws from — later edits
//! to the directories do not affect a run already in flight.

use crate::naming::parse_option_name;
use crate::rarity::Rarity;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Layer root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One selectable variant of a layer.
#[derive(Debug, Clone)]
pub struct LayerOption {
    /// 1-based index within the layer, part of the edition's debug trail.
    pub id: usize,
    /// Label with rarity suffix stripped (`red-cap` from `red-cap_m.png`).
    pub label: String,
    /// On-disk file name, joined to the layer directory when compositing.
    pub file_name: String,
    pub rarity: Rarity,
}

/// One compositing slot: a named directory of options plus its placement on
/// the canvas.
#[derive(Debug, Clone)]
pub struct Layer {
    /// 0-based position in draw order, part of the edition's debug trail.
    pub id: usize,
    pub name: String,
    pub dir: PathBuf,
    /// Top-left corner of the drawn option on the canvas.
    pub position: (i64, i64),
    /// Width and height the option image is scaled to before drawing.
    pub size: (u32, u32),
    pub options: Vec<LayerOption>,
}

impl Layer {
    /// Rarity classes of the options, in option order — the selector input.
    pub fn rarities(&self) -> Vec<Rarity> {
        self.options.iter().map(|o| o.rarity).collect()
    }
}

/// Load the ordered layer set under `root`.
///
/// Every layer is placed at the origin and scaled to the full canvas — the
/// basic configuration the pipeline ships with. Non-directories at the top
/// level and hidden files inside layers are ignored.
pub fn read_layers(root: &Path, canvas: (u32, u32)) -> Result<Vec<Layer>, LayerError> {
    if !root.is_dir() {
        return Err(LayerError::NotADirectory(root.to_path_buf()));
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut layers = Vec::with_capacity(dirs.len());
    for (id, dir) in dirs.into_iter().enumerate() {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        layers.push(Layer {
            id,
            name,
            options: read_options(&dir)?,
            dir,
            position: (0, 0),
            size: canvas,
        });
    }
    Ok(layers)
}

fn read_options(dir: &Path) -> Result<Vec<LayerOption>, LayerError> {
    let mut files: Vec<String> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.'))
        .collect();
    files.sort();

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(i, file_name)| {
            let parsed = parse_option_name(&file_name);
            LayerOption {
                id: i + 1,
                label: parsed.label,
                file_name,
                rarity: parsed.rarity,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn layers_ordered_by_directory_name() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("02_body/torso_b.png"));
        touch(&tmp.path().join("01_background/plain_b.png"));
        touch(&tmp.path().join("03_hat/cap_m.png"));

        let layers = read_layers(tmp.path(), (1400, 1400)).unwrap();
        let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["01_background", "02_body", "03_hat"]);
        assert_eq!(layers[0].id, 0);
        assert_eq!(layers[2].id, 2);
    }

    #[test]
    fn options_ordered_and_parsed() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("01_hat/red-cap_m.png"));
        touch(&tmp.path().join("01_hat/crown_sr.png"));
        touch(&tmp.path().join("01_hat/beanie_b.png"));

        let layers = read_layers(tmp.path(), (1400, 1400)).unwrap();
        let hat = &layers[0];
        assert_eq!(hat.options.len(), 3);
        assert_eq!(hat.options[0].label, "beanie");
        assert_eq!(hat.options[0].id, 1);
        assert_eq!(hat.options[1].rarity, Rarity::SuperRare);
        assert_eq!(hat.options[2].file_name, "red-cap_m.png");
        assert_eq!(
            hat.rarities(),
            vec![Rarity::Basic, Rarity::SuperRare, Rarity::Medium]
        );
    }

    #[test]
    fn hidden_files_and_stray_files_skipped() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("01_hat/.DS_Store"));
        touch(&tmp.path().join("01_hat/cap_b.png"));
        touch(&tmp.path().join("notes.txt"));

        let layers = read_layers(tmp.path(), (1400, 1400)).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].options.len(), 1);
    }

    #[test]
    fn placement_defaults_to_full_canvas() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("01_hat/cap_b.png"));

        let layers = read_layers(tmp.path(), (640, 480)).unwrap();
        assert_eq!(layers[0].position, (0, 0));
        assert_eq!(layers[0].size, (640, 480));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = read_layers(&tmp.path().join("nope"), (1400, 1400));
        assert!(matches!(result, Err(LayerError::NotADirectory(_))));
    }
}
