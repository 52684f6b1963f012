//! Centralized filename parsing for the `label_rarity` option convention.
//!
//! Every layer option image is named `<label>_<rarity-code>.png`, where the
//! rarity code is one of the short suffixes in [`crate::rarity::Rarity`]:
//!
//! - `skull_sr.png` → label "skull", Super Rare
//! - `red-cap_m.png` → label "red-cap", Medium
//! - `plain.png` → label "plain", Basic (no recognized suffix)
//!
//! Layer directories may carry an ordering prefix (`01_background`); only the
//! last underscore-separated segment is shown as the trait name.
//!
//! ## Display Transforms
//!
//! Raw labels stay dashed and lowercase on disk. At metadata flush they are
//! prettified the same way the rest of the pipeline displays them:
//! - trait: last `_` segment of the layer directory, first letter capitalized
//!   (`01_background` → "Background")
//! - value: first letter capitalized, dashes converted to spaces
//!   (`red-cap` → "Red cap")

use crate::rarity::Rarity;

/// Result of parsing an option filename like `skull_sr.png`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOption {
    /// Label with the extension and rarity suffix stripped, dashes preserved.
    pub label: String,
    /// Rarity decoded from the trailing `_<code>` segment; `Basic` when the
    /// filename carries no recognized code.
    pub rarity: Rarity,
}

/// Parse an option filename into its label and rarity class.
///
/// The extension is ignored. Only the final `_`-separated segment is
/// considered a rarity code; an unrecognized final segment stays part of the
/// label and the option falls back to `Basic`.
pub fn parse_option_name(file_name: &str) -> ParsedOption {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file_name,
    };
    if let Some((label, code)) = stem.rsplit_once('_') {
        if let Some(rarity) = Rarity::from_code(code) {
            return ParsedOption {
                label: label.to_string(),
                rarity,
            };
        }
    }
    ParsedOption {
        label: stem.to_string(),
        rarity: Rarity::Basic,
    }
}

/// Display name for a layer: last `_` segment, first letter capitalized.
pub fn display_trait(layer_name: &str) -> String {
    let last = layer_name.rsplit('_').next().unwrap_or(layer_name);
    capitalize(last)
}

/// Display name for an option label: capitalized, dashes become spaces.
pub fn display_value(label: &str) -> String {
    capitalize(label).replace('-', " ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
