//! Caption overlay: font discovery, sizing and the `drawtext` pass.
//!
//! The caption text is never placed inside the filter graph. It is written to
//! a file in the job's temp scope and referenced through `textfile`, with
//! expansion disabled, so arbitrary user text cannot break graph parsing.

use crate::config::{CANVAS_WIDTH, TextOverlayConfig};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How deep font directories are searched.
const FONT_SEARCH_DEPTH: usize = 4;

/// Average glyph width relative to the font size, for bold sans faces.
const GLYPH_WIDTH_RATIO: f64 = 0.6;

/// Share of the canvas width a caption line may occupy.
const LINE_WIDTH_SHARE: f64 = 0.9;

/// Everything the `drawtext` pass needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub text_file: PathBuf,
    /// `None` leaves the choice to fontconfig.
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
}

impl Caption {
    /// The `drawtext` filter for this caption.
    #[must_use]
    pub fn drawtext_filter(&self, config: &TextOverlayConfig) -> String {
        let mut filter = format!(
            "drawtext=textfile={}:expansion=none",
            escape_filter_path(&self.text_file)
        );
        if let Some(font) = &self.font_file {
            filter.push_str(&format!(":fontfile={}", escape_filter_path(font)));
        }
        filter.push_str(&format!(
            ":fontsize={}:fontcolor=white:x=(w-text_w)/2:y={}:shadowcolor=black:shadowx={shadow}:shadowy={shadow}",
            self.font_size,
            config.top_offset,
            shadow = config.shadow_offset,
        ));
        filter
    }
}

/// Font size that lets the longest line fit the canvas, clamped to the configured range.
#[must_use]
pub fn font_size_for(text: &str, config: &TextOverlayConfig) -> u32 {
    let longest = text
        .lines()
        .map(|line| line.trim().chars().count())
        .max()
        .unwrap_or(0);
    if longest == 0 {
        return config.max_font_size;
    }
    let fitting = f64::from(CANVAS_WIDTH) * LINE_WIDTH_SHARE / (longest as f64 * GLYPH_WIDTH_RATIO);
    (fitting.floor() as u32).clamp(config.min_font_size, config.max_font_size)
}

/// Finds the first configured font candidate in the configured directories.
///
/// Candidates are tried in order; names compare case-insensitively.
#[must_use]
pub fn discover_font(config: &TextOverlayConfig) -> Option<PathBuf> {
    let mut found: HashMap<String, PathBuf> = HashMap::new();
    for dir in &config.font_dirs {
        collect_fonts(dir, FONT_SEARCH_DEPTH, &mut found);
    }
    let font = config
        .font_candidates
        .iter()
        .find_map(|candidate| found.get(&candidate.to_lowercase()).cloned());
    match &font {
        Some(path) => log::debug!("Using caption font {}", path.display()),
        None => log::warn!(
            "No caption font found in {:?}; falling back to fontconfig",
            config.font_dirs
        ),
    }
    font
}

fn collect_fonts(dir: &Path, depth: usize, found: &mut HashMap<String, PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            if depth > 0 {
                collect_fonts(&path, depth - 1, found);
            }
        } else if let Some(name) = path.file_name() {
            found
                .entry(name.to_string_lossy().to_lowercase())
                .or_insert(path);
        }
    }
}

/// Quotes a path for use as a filter option value.
///
/// Backslashes become forward slashes, colons are escaped and single quotes
/// are closed, escaped and reopened.
#[must_use]
pub fn escape_filter_path(path: &Path) -> String {
    let text = path
        .to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "'\\''");
    format!("'{text}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_captions_use_the_largest_size() {
        let config = TextOverlayConfig::default();
        assert_eq!(font_size_for("GG", &config), 84);
        assert_eq!(font_size_for("", &config), 84);
    }

    #[test]
    fn long_captions_shrink_but_not_below_minimum() {
        let config = TextOverlayConfig::default();
        assert_eq!(font_size_for(&"x".repeat(24), &config), 67);
        assert_eq!(font_size_for(&"x".repeat(200), &config), 36);
        assert_eq!(font_size_for("short\nthe second line is longer", &config), 64);
    }

    #[test]
    fn windows_paths_are_escaped() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\Windows\\Fonts\\arialbd.ttf")),
            "'C\\:/Windows/Fonts/arialbd.ttf'"
        );
        assert_eq!(escape_filter_path(Path::new("/tmp/it's.txt")), "'/tmp/it'\\''s.txt'");
    }

    #[test]
    fn fonts_are_found_case_insensitively_in_candidate_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("truetype").join("dejavu");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("DejaVuSans-Bold.ttf"), b"font").expect("font");
        fs::write(dir.path().join("ARIAL.TTF"), b"font").expect("font");

        let config = TextOverlayConfig {
            font_dirs: vec![dir.path().to_path_buf()],
            font_candidates: vec!["Arial.ttf".into(), "DejaVuSans-Bold.ttf".into()],
            ..TextOverlayConfig::default()
        };
        assert_eq!(discover_font(&config), Some(dir.path().join("ARIAL.TTF")));

        let missing = TextOverlayConfig {
            font_dirs: vec![dir.path().join("nope")],
            ..TextOverlayConfig::default()
        };
        assert_eq!(discover_font(&missing), None);
    }

    #[test]
    fn drawtext_reads_from_file_with_shadow() {
        let caption = Caption {
            text_file: PathBuf::from("/tmp/job/overlay_text.txt"),
            font_file: Some(PathBuf::from("/fonts/DejaVuSans-Bold.ttf")),
            font_size: 72,
        };
        let filter = caption.drawtext_filter(&TextOverlayConfig::default());
        assert_eq!(
            filter,
            "drawtext=textfile='/tmp/job/overlay_text.txt':expansion=none:fontfile='/fonts/DejaVuSans-Bold.ttf':fontsize=72:fontcolor=white:x=(w-text_w)/2:y=90:shadowcolor=black:shadowx=2:shadowy=2"
        );
    }
}
