//! Hue/saturation histogram extraction from a bounding box region.

use image::RgbImage;
use nalgebra::DVector;

use super::color::rgb_to_hsv;
use super::signature::AppearanceSignature;
use crate::{BoundingBox, Error, Result};

/// Number of representable 8-bit hue values.
const HUE_LEVELS: usize = 180;

/// Number of representable 8-bit saturation values.
const SATURATION_LEVELS: usize = 256;

/// Fractions trimmed from each side of a cropped region before building the
/// histogram.
///
/// Subjects fill the center of their box more densely than the edges, and
/// the bottom of a standing person's box is mostly floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionTrim {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl RegionTrim {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self { left, right, top, bottom }
    }

    /// Use the whole cropped region.
    pub fn none() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("left", self.left),
            ("right", self.right),
            ("top", self.top),
            ("bottom", self.bottom),
        ] {
            if !value.is_finite() || !(0.0..1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "region trim {} must be within [0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.left + self.right >= 1.0 || self.top + self.bottom >= 1.0 {
            return Err(Error::InvalidConfig(
                "region trim removes the whole region".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the trim to a region, keeping at least one pixel per axis.
    pub fn apply(&self, region: PixelRegion) -> PixelRegion {
        let margin_left = (region.width as f64 * self.left) as u32;
        let margin_right = (region.width as f64 * self.right) as u32;
        let margin_top = (region.height as f64 * self.top) as u32;
        let margin_bottom = (region.height as f64 * self.bottom) as u32;

        let x_end = region
            .width
            .saturating_sub(margin_right)
            .max(margin_left + 1)
            .min(region.width);
        let y_end = region
            .height
            .saturating_sub(margin_bottom)
            .max(margin_top + 1)
            .min(region.height);
        let x_start = margin_left.min(x_end.saturating_sub(1));
        let y_start = margin_top.min(y_end.saturating_sub(1));

        PixelRegion {
            x: region.x + x_start,
            y: region.y + y_start,
            width: x_end - x_start,
            height: y_end - y_start,
        }
    }
}

impl Default for RegionTrim {
    fn default() -> Self {
        Self::new(0.2, 0.2, 0.1, 0.25)
    }
}

/// Histogram layout used to build appearance signatures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramConfig {
    /// Number of hue bins over [0, 180).
    pub hue_bins: usize,

    /// Number of saturation bins over [0, 256).
    pub saturation_bins: usize,

    /// Central sub-region selection.
    pub trim: RegionTrim,
}

impl HistogramConfig {
    pub fn new(hue_bins: usize, saturation_bins: usize) -> Self {
        Self {
            hue_bins,
            saturation_bins,
            trim: RegionTrim::default(),
        }
    }

    pub fn with_trim(self, trim: RegionTrim) -> Self {
        Self { trim, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hue_bins == 0 || self.hue_bins > HUE_LEVELS {
            return Err(Error::InvalidConfig(format!(
                "hue_bins must be within [1, {}], got {}",
                HUE_LEVELS, self.hue_bins
            )));
        }
        if self.saturation_bins == 0 || self.saturation_bins > SATURATION_LEVELS {
            return Err(Error::InvalidConfig(format!(
                "saturation_bins must be within [1, {}], got {}",
                SATURATION_LEVELS, self.saturation_bins
            )));
        }
        self.trim.validate()
    }

    /// Length of signatures built with this configuration.
    pub fn signature_len(&self) -> usize {
        self.hue_bins + self.saturation_bins
    }
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self::new(50, 50)
    }
}

/// Integer pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clamp a bounding box to the frame and convert it to whole pixels.
///
/// Returns `None` when nothing of the box lies inside the frame.
pub fn crop_region(frame_width: u32, frame_height: u32, bbox: &BoundingBox) -> Option<PixelRegion> {
    let x1 = bbox.x1.max(0.0).floor();
    let y1 = bbox.y1.max(0.0).floor();
    let x2 = bbox.x2.min(frame_width as f64).floor();
    let y2 = bbox.y2.min(frame_height as f64).floor();

    if !(x2 > x1 && y2 > y1) {
        return None;
    }

    Some(PixelRegion {
        x: x1 as u32,
        y: y1 as u32,
        width: (x2 - x1) as u32,
        height: (y2 - y1) as u32,
    })
}

/// Extract the appearance signature of a bounding box region.
///
/// The box is clamped to the frame, trimmed to its central sub-region,
/// converted to HSV and binned over hue and saturation. Brightness is
/// discarded so shadows and highlights move the signature as little as
/// possible.
///
/// # Errors
/// * `InvalidBoundingBox` if the box is malformed
/// * `EmptyRegion` if the clamped box has zero area
/// * `InvalidConfig` if the histogram configuration is invalid
pub fn extract(
    frame: &RgbImage,
    bbox: &BoundingBox,
    config: &HistogramConfig,
) -> Result<AppearanceSignature> {
    bbox.validate()?;
    config.validate()?;

    let (width, height) = frame.dimensions();
    let region = crop_region(width, height, bbox).ok_or(Error::EmptyRegion {
        x1: bbox.x1,
        y1: bbox.y1,
        x2: bbox.x2,
        y2: bbox.y2,
        width,
        height,
    })?;
    let region = config.trim.apply(region);

    let mut hue_hist = vec![0.0; config.hue_bins];
    let mut sat_hist = vec![0.0; config.saturation_bins];

    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            let hsv = rgb_to_hsv(frame.get_pixel(x, y).0);
            let hue_bin = (hsv.h as usize * config.hue_bins / HUE_LEVELS).min(config.hue_bins - 1);
            let sat_bin = (hsv.s as usize * config.saturation_bins / SATURATION_LEVELS)
                .min(config.saturation_bins - 1);
            hue_hist[hue_bin] += 1.0;
            sat_hist[sat_bin] += 1.0;
        }
    }

    normalize_min_max(&mut hue_hist);
    normalize_min_max(&mut sat_hist);

    let mut values = hue_hist;
    values.extend(sat_hist);
    AppearanceSignature::new(
        DVector::from_vec(values),
        config.hue_bins,
        config.saturation_bins,
    )
}

/// Rescale values so the minimum maps to 0 and the maximum to 1.
///
/// A constant block has no range and becomes all zeros.
fn normalize_min_max(values: &mut [f64]) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for v in values.iter_mut() {
        *v = if range > 0.0 {
            ((*v - min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}
