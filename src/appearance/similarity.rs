//! Histogram similarity measures, remapped so that 1.0 means identical.

use std::fmt;
use std::str::FromStr;

use super::signature::AppearanceSignature;
use crate::{Error, Result};

const EPSILON: f64 = 1e-12;

/// Method used to compare two appearance signatures.
///
/// Every method returns a similarity in [0, 1] where 1.0 means identical
/// distributions and higher is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMethod {
    /// Pearson correlation of the two vectors, negative values clamped to 0.
    #[default]
    Correlation,

    /// Histogram intersection normalized by the smaller total mass.
    Intersection,

    /// One minus the Bhattacharyya (Hellinger) distance.
    Bhattacharyya,
}

impl SimilarityMethod {
    /// Compare two signatures.
    ///
    /// Fails only if the signatures were built with different bin layouts.
    pub fn compare(&self, a: &AppearanceSignature, b: &AppearanceSignature) -> Result<f64> {
        a.check_compatible(b)?;

        if a.as_slice() == b.as_slice() {
            return Ok(1.0);
        }

        let similarity = match self {
            SimilarityMethod::Correlation => correlation(a.as_slice(), b.as_slice()),
            SimilarityMethod::Intersection => intersection(a.as_slice(), b.as_slice()),
            SimilarityMethod::Bhattacharyya => bhattacharyya(a.as_slice(), b.as_slice()),
        };

        Ok(similarity.clamp(0.0, 1.0))
    }

    /// Canonical name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            SimilarityMethod::Correlation => "correlation",
            SimilarityMethod::Intersection => "intersection",
            SimilarityMethod::Bhattacharyya => "bhattacharyya",
        }
    }
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimilarityMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        similarity_method_by_name(s)
    }
}

/// Get a similarity method by name.
///
/// Supported names:
/// - "correlation", "correl"
/// - "intersection", "intersect"
/// - "bhattacharyya", "hellinger"
pub fn similarity_method_by_name(name: &str) -> Result<SimilarityMethod> {
    match name {
        "correlation" | "correl" => Ok(SimilarityMethod::Correlation),
        "intersection" | "intersect" => Ok(SimilarityMethod::Intersection),
        "bhattacharyya" | "hellinger" => Ok(SimilarityMethod::Bhattacharyya),
        _ => Err(Error::UnknownSimilarity(name.to_string())),
    }
}

/// Pearson correlation. Constant vectors have no variance, so they only
/// correlate with an identical vector (handled by the caller).
fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n == 0.0 {
        return 1.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= EPSILON {
        return 0.0;
    }
    cov / denom
}

fn intersection(a: &[f64], b: &[f64]) -> f64 {
    let sum_a: f64 = a.iter().sum();
    let sum_b: f64 = b.iter().sum();
    let mass = sum_a.min(sum_b);
    if mass <= EPSILON {
        return 0.0;
    }
    let overlap: f64 = a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).sum();
    overlap / mass
}

fn bhattacharyya(a: &[f64], b: &[f64]) -> f64 {
    let sum_a: f64 = a.iter().sum();
    let sum_b: f64 = b.iter().sum();
    if sum_a <= EPSILON || sum_b <= EPSILON {
        return 0.0;
    }
    let coefficient: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x * y).sqrt()).sum();
    let distance = (1.0 - coefficient / (sum_a * sum_b).sqrt()).max(0.0).sqrt();
    1.0 - distance
}
