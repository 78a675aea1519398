//! Appearance signature type and exponential moving average blending.

use nalgebra::DVector;

use crate::utils::validate_unit_interval;
use crate::{Error, Result};

/// Normalized hue/saturation histogram describing how a region looks.
///
/// The vector is the hue block followed by the saturation block. Each block
/// is min-max normalized to [0, 1], so signatures from regions of different
/// sizes are directly comparable. Two signatures are only comparable when
/// they were built with the same bin counts.
#[derive(Debug, Clone, PartialEq)]
pub struct AppearanceSignature {
    values: DVector<f64>,
    hue_bins: usize,
    saturation_bins: usize,
}

impl AppearanceSignature {
    /// Create a signature from raw histogram values.
    ///
    /// # Arguments
    /// * `values` - Concatenated hue and saturation blocks
    /// * `hue_bins` - Length of the hue block
    /// * `saturation_bins` - Length of the saturation block
    pub fn new(values: DVector<f64>, hue_bins: usize, saturation_bins: usize) -> Result<Self> {
        if values.len() != hue_bins + saturation_bins {
            return Err(Error::IncompatibleSignatures {
                expected: format!("{} values", hue_bins + saturation_bins),
                got: format!("{} values", values.len()),
            });
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::InvalidConfig(
                "signature values must be finite and non-negative".to_string(),
            ));
        }
        Ok(Self {
            values,
            hue_bins,
            saturation_bins,
        })
    }

    /// Create a signature from a slice of values.
    pub fn from_slice(values: &[f64], hue_bins: usize, saturation_bins: usize) -> Result<Self> {
        Self::new(DVector::from_column_slice(values), hue_bins, saturation_bins)
    }

    /// Full signature vector.
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn as_slice(&self) -> &[f64] {
        self.values.as_slice()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn hue_bins(&self) -> usize {
        self.hue_bins
    }

    pub fn saturation_bins(&self) -> usize {
        self.saturation_bins
    }

    /// Hue block of the signature.
    pub fn hue_block(&self) -> &[f64] {
        &self.values.as_slice()[..self.hue_bins]
    }

    /// Saturation block of the signature.
    pub fn saturation_block(&self) -> &[f64] {
        &self.values.as_slice()[self.hue_bins..]
    }

    /// Fail unless `other` was built with the same bin layout.
    pub fn check_compatible(&self, other: &AppearanceSignature) -> Result<()> {
        if self.hue_bins != other.hue_bins || self.saturation_bins != other.saturation_bins {
            return Err(Error::IncompatibleSignatures {
                expected: format!("{}+{} bins", self.hue_bins, self.saturation_bins),
                got: format!("{}+{} bins", other.hue_bins, other.saturation_bins),
            });
        }
        Ok(())
    }

    /// Blend an observed signature into this reference.
    ///
    /// Computes `(1 - weight) * self + weight * observed`. Smaller weights
    /// adapt more slowly. `weight = 0` keeps the reference and `weight = 1`
    /// replaces it with the observation.
    pub fn blend(&self, observed: &AppearanceSignature, weight: f64) -> Result<Self> {
        validate_unit_interval("blend weight", weight)?;
        self.check_compatible(observed)?;

        let values = &self.values * (1.0 - weight) + &observed.values * weight;
        Ok(Self {
            values,
            hue_bins: self.hue_bins,
            saturation_bins: self.saturation_bins,
        })
    }
}
