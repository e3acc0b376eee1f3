// ============================================================================
// hudshift-core/src/layout/geometry.rs
// ============================================================================
//
// COORDINATE MODEL: Reference Layout to Source-Specific Filter Geometry
//
// Layouts are authored against a 1920x1080 frame. Real sources are 1080p,
// 1440p, 2160p or ultrawide, so every crop box has to be scaled into source
// pixels before the filter graph can use it. Ultrawide sources keep the HUD
// in a centered 16:9 safe area, which shows up as a horizontal offset.
//
// Every emitted number is an even, non-negative integer: yuv420p encoders
// reject odd crop and scale sizes.

use super::{HudLayout, HudTag, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::config::{CANVAS_HEIGHT, CANVAS_WIDTH, GeometryConfig};
use crate::error::{CoreError, CoreResult};
use crate::utils::{floor_even, round_even};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel size of a probed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResolution {
    pub width: u32,
    pub height: u32,
}

impl SourceResolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Wider than 16:9.
    #[must_use]
    pub fn is_ultrawide(self) -> bool {
        u64::from(self.width) * 9 > u64::from(self.height) * 16
    }
}

impl fmt::Display for SourceResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub w: u32,
    pub h: u32,
    pub x: u32,
    pub y: u32,
}

/// Filter-ready geometry of one HUD element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedElement {
    pub tag: HudTag,
    pub crop: PixelRect,
    pub scaled_w: u32,
    pub scaled_h: u32,
    pub overlay_x: u32,
    pub overlay_y: u32,
}

/// Geometry for every active element, in overlay order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedGeometry {
    pub source: SourceResolution,
    pub scale_factor: f64,
    pub pad_x: f64,
    pub pad_y: f64,
    pub elements: Vec<ResolvedElement>,
}

/// Converts reference layouts into source-specific geometry.
#[derive(Debug, Clone)]
pub struct CoordinateModel<'a> {
    config: &'a GeometryConfig,
    reserved_top: u32,
}

impl<'a> CoordinateModel<'a> {
    #[must_use]
    pub fn new(config: &'a GeometryConfig) -> Self {
        Self {
            config,
            reserved_top: 0,
        }
    }

    /// Keeps the top `rows` of the canvas free, e.g. for a caption.
    #[must_use]
    pub fn with_reserved_top(mut self, rows: u32) -> Self {
        self.reserved_top = rows;
        self
    }

    /// Resolves `layout` for a source of the given resolution.
    pub fn to_filter_geometry(
        &self,
        layout: &HudLayout,
        source: SourceResolution,
    ) -> CoreResult<ResolvedGeometry> {
        if source.width < 2 || source.height < 2 {
            return Err(CoreError::PlanInvariantBroken(format!(
                "source resolution {source} is too small to crop"
            )));
        }
        layout.validate()?;

        let (scale_factor, pad_x, pad_y) = source_transform(source);
        let src_w = floor_even(source.width);
        let src_h = floor_even(source.height);

        let mut elements = Vec::with_capacity(layout.len());
        for element in layout.elements() {
            let invalid = |reason: String| CoreError::InvalidGeometry {
                tag: element.tag,
                reason,
            };
            let b = element.crop_box;

            let x = round_even(f64::from(b.x) * scale_factor + pad_x).min(src_w - 2);
            let y = round_even(f64::from(b.y) * scale_factor + pad_y).min(src_h - 2);
            let w = round_even(f64::from(b.w) * scale_factor).min(floor_even(src_w - x));
            let h = round_even(f64::from(b.h) * scale_factor).min(floor_even(src_h - y));
            if w < 2 || h < 2 {
                return Err(invalid(format!(
                    "crop collapses to {w}x{h} on a {source} source"
                )));
            }

            let padding = self.config.padding;
            let max_w = CANVAS_WIDTH.saturating_sub(padding.left + padding.right);
            let max_h =
                CANVAS_HEIGHT.saturating_sub(padding.top + padding.bottom + self.reserved_top);
            let wanted_w = round_even(f64::from(b.w) * scale_factor * element.scale_factor);
            let wanted_h = round_even(f64::from(b.h) * scale_factor * element.scale_factor);
            let (scaled_w, scaled_h) = fit_within(wanted_w, wanted_h, max_w, max_h);
            if (scaled_w, scaled_h) != (wanted_w, wanted_h) {
                log::warn!(
                    "HUD element '{}' shrunk from {wanted_w}x{wanted_h} to {scaled_w}x{scaled_h} to fit the canvas",
                    element.tag
                );
            }
            if scaled_w < 2 || scaled_h < 2 {
                return Err(invalid(format!(
                    "scaled size {scaled_w}x{scaled_h} is below 2x2"
                )));
            }

            let [bias_x, bias_y] = self
                .config
                .safety_bias
                .get(&element.tag)
                .copied()
                .unwrap_or([0, 0]);
            let overlay_x = clamp_even(
                i64::from(element.overlay_xy[0]) + i64::from(bias_x),
                i64::from(padding.left),
                i64::from(CANVAS_WIDTH) - i64::from(padding.right) - i64::from(scaled_w),
            )
            .ok_or_else(|| {
                invalid(format!(
                    "scaled width {scaled_w} does not fit the {CANVAS_WIDTH}px canvas"
                ))
            })?;
            let overlay_y = clamp_even(
                i64::from(element.overlay_xy[1]) + i64::from(bias_y),
                i64::from(padding.top) + i64::from(self.reserved_top),
                i64::from(CANVAS_HEIGHT) - i64::from(padding.bottom) - i64::from(scaled_h),
            )
            .ok_or_else(|| {
                invalid(format!(
                    "scaled height {scaled_h} does not fit the {CANVAS_HEIGHT}px canvas"
                ))
            })?;

            elements.push((
                element.z_order,
                ResolvedElement {
                    tag: element.tag,
                    crop: PixelRect { w, h, x, y },
                    scaled_w,
                    scaled_h,
                    overlay_x,
                    overlay_y,
                },
            ));
        }

        // Stable sort keeps insertion order for equal z.
        elements.sort_by_key(|(z, _)| *z);

        Ok(ResolvedGeometry {
            source,
            scale_factor,
            pad_x,
            pad_y,
            elements: elements.into_iter().map(|(_, e)| e).collect(),
        })
    }
}

/// Scale from the reference frame into the source and the safe-area offsets.
fn source_transform(source: SourceResolution) -> (f64, f64, f64) {
    let width = f64::from(source.width);
    let height = f64::from(source.height);
    let scale = if source.is_ultrawide() {
        height / f64::from(REFERENCE_HEIGHT)
    } else {
        (width / f64::from(REFERENCE_WIDTH)).min(height / f64::from(REFERENCE_HEIGHT))
    };
    let pad_x = ((width - f64::from(REFERENCE_WIDTH) * scale) / 2.0).max(0.0);
    let pad_y = ((height - f64::from(REFERENCE_HEIGHT) * scale) / 2.0).max(0.0);
    (scale, pad_x, pad_y)
}

/// Shrinks `w`x`h` uniformly until it fits `max_w`x`max_h`, keeping even sizes.
fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w <= max_w && h <= max_h {
        return (w, h);
    }
    let factor = (f64::from(max_w) / f64::from(w)).min(f64::from(max_h) / f64::from(h));
    let shrink = |v: u32| floor_even((f64::from(v) * factor).floor() as u32);
    (shrink(w), shrink(h))
}

/// Clamps into `[min, max]` and snaps to an even value inside that range.
fn clamp_even(value: i64, min: i64, max: i64) -> Option<u32> {
    let low = (min.max(0) + 1) & !1;
    let high = max & !1;
    if high < low {
        return None;
    }
    let snapped = value.clamp(low, high) & !1;
    u32::try_from(snapped.max(low)).ok()
}
