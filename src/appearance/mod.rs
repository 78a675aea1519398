//! Appearance descriptors for re-identification.
//!
//! This module provides:
//! - `AppearanceSignature` - normalized hue/saturation histogram of a region
//! - `HistogramConfig` / `RegionTrim` - how signatures are built
//! - `SimilarityMethod` - selectable signature comparison
//! - `extract`, `compare`, `blend` - the descriptor operations used by the engine

mod color;
mod histogram;
mod signature;
mod similarity;

pub use color::{rgb_to_hsv, Hsv8};
pub use histogram::{crop_region, HistogramConfig, PixelRegion, RegionTrim};
pub use signature::AppearanceSignature;
pub use similarity::{similarity_method_by_name, SimilarityMethod};

use image::RgbImage;

use crate::{BoundingBox, Result};

/// Extract the appearance signature of `bbox` in `frame`.
///
/// # Errors
/// * `InvalidBoundingBox` if the box is malformed
/// * `EmptyRegion` if the box has no area inside the frame
/// * `InvalidConfig` if the histogram configuration is invalid
pub fn extract(
    frame: &RgbImage,
    bbox: &BoundingBox,
    config: &HistogramConfig,
) -> Result<AppearanceSignature> {
    histogram::extract(frame, bbox, config)
}

/// Compare two signatures, returning a similarity in [0, 1].
pub fn compare(
    a: &AppearanceSignature,
    b: &AppearanceSignature,
    method: SimilarityMethod,
) -> Result<f64> {
    method.compare(a, b)
}

/// Blend an observed signature into a reference with the given weight.
pub fn blend(
    reference: &AppearanceSignature,
    observed: &AppearanceSignature,
    weight: f64,
) -> Result<AppearanceSignature> {
    reference.blend(observed, weight)
}
