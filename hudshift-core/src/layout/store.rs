//! Persistence of HUD layouts as JSON documents.
//!
//! The document keeps one section per property (`crops_1080p`, `scales`,
//! `overlays`, `z_orders`), each keyed by tag name, plus an optional `order`
//! list that records insertion order. Unknown keys and tags are ignored so
//! older and newer tools can share a file. Saves are atomic and keep up to
//! five previous versions next to the file as `<name>.bak1` .. `<name>.bak5`.

use super::{CropBox, HudElement, HudLayout, HudTag};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Number of previous versions kept beside a layout file.
pub const MAX_BACKUPS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub x: i32,
    pub y: i32,
}

/// On-disk shape of a layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDocument {
    /// `[w, h, x, y]` per tag, in 1080p reference pixels.
    pub crops_1080p: BTreeMap<String, [u32; 4]>,
    pub scales: BTreeMap<String, f64>,
    pub overlays: BTreeMap<String, OverlayPoint>,
    pub z_orders: BTreeMap<String, i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
}

impl LayoutDocument {
    /// Tag names appearing in any section that do not name a known tag.
    #[must_use]
    pub fn unknown_tags(&self) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .crops_1080p
            .keys()
            .chain(self.scales.keys())
            .chain(self.overlays.keys())
            .chain(self.z_orders.keys())
            .filter(|key| key.parse::<HudTag>().is_err())
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}

impl From<LayoutDocument> for HudLayout {
    fn from(doc: LayoutDocument) -> Self {
        for tag in doc.unknown_tags() {
            log::warn!("Ignoring unknown HUD tag '{tag}' in layout document");
        }

        let mut ordered: Vec<HudTag> = doc
            .order
            .iter()
            .filter_map(|name| name.parse::<HudTag>().ok())
            .collect();
        for tag in HudTag::ALL {
            if !ordered.contains(&tag) {
                ordered.push(tag);
            }
        }

        let mut layout = HudLayout::new();
        for tag in ordered {
            let key = tag.as_str();
            // An element only exists when it has a crop box.
            let Some([w, h, x, y]) = doc.crops_1080p.get(key).copied() else {
                continue;
            };
            let overlay = doc.overlays.get(key).copied().unwrap_or_default();
            layout.insert(HudElement {
                tag,
                crop_box: CropBox { w, h, x, y },
                scale_factor: doc.scales.get(key).copied().unwrap_or(1.0),
                overlay_xy: [overlay.x, overlay.y],
                z_order: doc.z_orders.get(key).copied().unwrap_or(0),
            });
        }
        layout
    }
}

impl From<HudLayout> for LayoutDocument {
    fn from(layout: HudLayout) -> Self {
        let mut doc = LayoutDocument::default();
        for element in layout.elements() {
            let key = element.tag.as_str().to_string();
            let CropBox { w, h, x, y } = element.crop_box;
            doc.crops_1080p.insert(key.clone(), [w, h, x, y]);
            doc.scales.insert(key.clone(), element.scale_factor);
            doc.overlays.insert(
                key.clone(),
                OverlayPoint {
                    x: element.overlay_xy[0],
                    y: element.overlay_xy[1],
                },
            );
            doc.z_orders.insert(key.clone(), element.z_order);
            doc.order.push(key);
        }
        doc
    }
}

/// A layout file at a stable path.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    path: PathBuf,
}

impl LayoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads, parses and validates the layout file.
    pub fn load(&self) -> CoreResult<HudLayout> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            CoreError::Layout(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let doc: LayoutDocument = serde_json::from_str(&text)?;
        let layout = HudLayout::from(doc);
        layout.validate()?;
        log::debug!(
            "Loaded layout with {} elements from {}",
            layout.len(),
            self.path.display()
        );
        Ok(layout)
    }

    /// Loads the file, or returns the built-in layout when it does not exist yet.
    pub fn load_or_reference(&self) -> CoreResult<HudLayout> {
        if self.path.exists() {
            self.load()
        } else {
            log::info!(
                "No layout at {}, using the built-in reference layout",
                self.path.display()
            );
            Ok(HudLayout::reference())
        }
    }

    /// Atomically writes the layout, rotating the previous file into the backups.
    pub fn save(&self, layout: &HudLayout) -> CoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(&LayoutDocument::from(layout.clone()))?;
        let mut staged = tempfile::Builder::new()
            .prefix(".hudshift-layout-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        staged.write_all(json.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;

        if self.path.exists() {
            self.rotate_backups()?;
        }
        staged.persist(&self.path).map_err(|e| CoreError::Io(e.error))?;
        log::info!("Saved layout to {}", self.path.display());
        Ok(())
    }

    /// Path of the `n`th backup (1 is the most recent).
    #[must_use]
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name: OsString = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("layout.json"));
        name.push(format!(".bak{n}"));
        self.path.with_file_name(name)
    }

    /// Existing backups, most recent first.
    #[must_use]
    pub fn backups(&self) -> Vec<PathBuf> {
        (1..=MAX_BACKUPS)
            .map(|n| self.backup_path(n))
            .filter(|p| p.exists())
            .collect()
    }

    fn rotate_backups(&self) -> CoreResult<()> {
        let oldest = self.backup_path(MAX_BACKUPS);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..MAX_BACKUPS).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        // Copy rather than move so the current file stays in place until
        // the new version replaces it.
        fs::copy(&self.path, self.backup_path(1))?;
        Ok(())
    }
}
