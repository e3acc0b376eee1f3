// ============================================================================
// hudshift-core/src/layout/mod.rs
// ============================================================================
//
// HUD LAYOUT: Reference-Frame Description of the Portrait Composition
//
// A HudLayout records, for each HUD element, where it sits in a 1920x1080
// source frame, how much it is enlarged, and where it lands on the
// 1080x1920 portrait canvas. The geometry submodule resolves a layout
// against a concrete source resolution; the store submodule persists it.
//
// KEY COMPONENTS:
// - HudTag: The five HUD regions a layout can describe
// - HudElement: Crop box, scale, overlay position and stacking order of one region
// - HudLayout: Ordered collection of elements (insertion order is the z tiebreak)
// - HudSelection: Which optional elements a render activates

pub mod geometry;
pub mod store;

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use geometry::{CoordinateModel, ResolvedElement, ResolvedGeometry, SourceResolution};
pub use store::{LayoutDocument, LayoutStore};

/// Width of the frame layouts are authored against.
pub const REFERENCE_WIDTH: u32 = 1920;
/// Height of the frame layouts are authored against.
pub const REFERENCE_HEIGHT: u32 = 1080;

/// A HUD region that can be lifted out of the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HudTag {
    Loot,
    NormalHp,
    BossHp,
    Stats,
    Team,
}

impl HudTag {
    /// All tags in canonical document order.
    pub const ALL: [HudTag; 5] = [
        HudTag::Loot,
        HudTag::NormalHp,
        HudTag::BossHp,
        HudTag::Stats,
        HudTag::Team,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HudTag::Loot => "loot",
            HudTag::NormalHp => "normal_hp",
            HudTag::BossHp => "boss_hp",
            HudTag::Stats => "stats",
            HudTag::Team => "team",
        }
    }
}

impl fmt::Display for HudTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HudTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HudTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| CoreError::Layout(format!("unknown HUD tag '{s}'")))
    }
}

/// Crop rectangle in reference-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub w: u32,
    pub h: u32,
    pub x: u32,
    pub y: u32,
}

impl CropBox {
    #[must_use]
    pub const fn new(w: u32, h: u32, x: u32, y: u32) -> Self {
        Self { w, h, x, y }
    }
}

/// One HUD region of a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HudElement {
    pub tag: HudTag,
    pub crop_box: CropBox,
    pub scale_factor: f64,
    /// Target top-left corner on the portrait canvas.
    pub overlay_xy: [i32; 2],
    pub z_order: i32,
}

impl HudElement {
    #[must_use]
    pub fn new(tag: HudTag, crop_box: CropBox) -> Self {
        Self {
            tag,
            crop_box,
            scale_factor: 1.0,
            overlay_xy: [0, 0],
            z_order: 0,
        }
    }

    #[must_use]
    pub fn scaled(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    #[must_use]
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.overlay_xy = [x, y];
        self
    }

    #[must_use]
    pub fn z(mut self, z_order: i32) -> Self {
        self.z_order = z_order;
        self
    }

    /// Checks the element against the reference frame.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |reason: String| CoreError::InvalidGeometry {
            tag: self.tag,
            reason,
        };
        let CropBox { w, h, x, y } = self.crop_box;
        if w == 0 || h == 0 {
            return Err(invalid(format!("crop box {w}x{h} has no area")));
        }
        let right = x.checked_add(w);
        let bottom = y.checked_add(h);
        if right.is_none_or(|r| r > REFERENCE_WIDTH)
            || bottom.is_none_or(|b| b > REFERENCE_HEIGHT)
        {
            return Err(invalid(format!(
                "crop box {w}x{h}+{x}+{y} leaves the {REFERENCE_WIDTH}x{REFERENCE_HEIGHT} reference frame"
            )));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(invalid(format!(
                "scale factor {} must be positive",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Which optional HUD elements a portrait render shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HudSelection {
    pub teammates_visible: bool,
    pub boss_hp: bool,
}

impl HudSelection {
    /// Whether an element with this tag is part of the render.
    #[must_use]
    pub fn includes(self, tag: HudTag) -> bool {
        match tag {
            HudTag::Loot | HudTag::Stats => true,
            HudTag::NormalHp => !self.boss_hp,
            HudTag::BossHp => self.boss_hp,
            HudTag::Team => self.teammates_visible,
        }
    }
}

/// HUD layout authored in the 1920x1080 reference frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LayoutDocument", into = "LayoutDocument")]
pub struct HudLayout {
    elements: Vec<HudElement>,
}

impl HudLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element, replacing any element with the same tag in place.
    pub fn insert(&mut self, element: HudElement) {
        match self.elements.iter_mut().find(|e| e.tag == element.tag) {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
    }

    #[must_use]
    pub fn with(mut self, element: HudElement) -> Self {
        self.insert(element);
        self
    }

    #[must_use]
    pub fn get(&self, tag: HudTag) -> Option<&HudElement> {
        self.elements.iter().find(|e| e.tag == tag)
    }

    /// Elements in insertion order.
    #[must_use]
    pub fn elements(&self) -> &[HudElement] {
        &self.elements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The subset of this layout a render with `selection` shows.
    #[must_use]
    pub fn active(&self, selection: HudSelection) -> HudLayout {
        HudLayout {
            elements: self
                .elements
                .iter()
                .filter(|e| selection.includes(e.tag))
                .cloned()
                .collect(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.elements.iter().try_for_each(HudElement::validate)
    }

    /// Built-in layout covering all five tags.
    #[must_use]
    pub fn reference() -> Self {
        HudLayout::new()
            .with(
                HudElement::new(HudTag::Loot, CropBox::new(520, 110, 1360, 950))
                    .scaled(1.4)
                    .at(176, 1500)
                    .z(1),
            )
            .with(
                HudElement::new(HudTag::NormalHp, CropBox::new(420, 60, 60, 990))
                    .scaled(1.5)
                    .at(224, 1410)
                    .z(2),
            )
            .with(
                HudElement::new(HudTag::BossHp, CropBox::new(700, 70, 610, 40))
                    .scaled(1.2)
                    .at(120, 260)
                    .z(2),
            )
            .with(
                HudElement::new(HudTag::Stats, CropBox::new(300, 80, 1600, 20))
                    .scaled(1.3)
                    .at(660, 380)
                    .z(3),
            )
            .with(
                HudElement::new(HudTag::Team, CropBox::new(260, 200, 20, 560))
                    .scaled(1.2)
                    .at(24, 1100)
                    .z(0),
            )
    }
}
