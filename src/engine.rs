//! Re-identification engine.
//!
//! Each frame runs two passes over the identity tracks in creation order:
//!
//! 1. Confirmation: a bound track whose detection identifier is still present
//!    is confirmed and its appearance reference is blended. Otherwise the
//!    binding is released.
//! 2. Re-acquisition: every track not confirmed this frame searches the
//!    unassigned detections. Tracks without an appearance reference fall back
//!    to overlap with their last box; the others gate candidates spatially and
//!    score them by proximity and appearance.
//!
//! Detections claimed by no track are left unused.

use std::collections::HashSet;

use image::RgbImage;
use log::{debug, trace};

use crate::appearance::{self, AppearanceSignature, HistogramConfig, SimilarityMethod};
use crate::identity_track::{IdentityTrack, SubjectSeed};
use crate::matching::{best_overlap_among, find_by_id, unassigned_candidates};
use crate::spatial_gate::{distance_score, gated_distance, max_radius};
use crate::utils::{validate_non_negative, validate_unit_interval, warn_once};
use crate::{BoundingBox, Detection, Error, Result};

/// Tolerance on `distance_weight + appearance_weight == 1`.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Configuration for the re-identification engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReidConfig {
    /// Assumed subject speed in pixels per frame; scales the search radius.
    pub base_speed: f64,

    /// Upper bound on the search radius in pixels.
    pub max_distance_cap: f64,

    /// Minimum combined score for accepting a re-acquisition candidate.
    pub similarity_threshold: f64,

    /// Weight of the proximity term in the combined score.
    pub distance_weight: f64,

    /// Weight of the appearance term in the combined score.
    pub appearance_weight: f64,

    /// EMA weight for confirmations of a persisting binding.
    pub blend_weight: f64,

    /// EMA weight right after re-acquisition.
    pub reacquire_blend_weight: f64,

    /// Minimum IoU for the overlap fallback of tracks without a reference.
    pub seed_iou_threshold: f64,

    /// Minimum detection confidence for a re-acquisition candidate.
    pub detection_threshold: f64,

    /// Signature comparison method.
    pub similarity_method: SimilarityMethod,

    /// Signature layout.
    pub histogram: HistogramConfig,
}

impl ReidConfig {
    /// Create a configuration with the default tuning.
    pub fn new() -> Self {
        Self {
            base_speed: 5.0,
            max_distance_cap: 500.0,
            similarity_threshold: 0.4,
            distance_weight: 0.3,
            appearance_weight: 0.7,
            blend_weight: 0.1,
            reacquire_blend_weight: 0.15,
            seed_iou_threshold: 0.3,
            detection_threshold: 0.0,
            similarity_method: SimilarityMethod::default(),
            histogram: HistogramConfig::default(),
        }
    }

    pub fn with_base_speed(mut self, base_speed: f64) -> Self {
        self.base_speed = base_speed;
        self
    }

    pub fn with_max_distance_cap(mut self, cap: f64) -> Self {
        self.max_distance_cap = cap;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set both score weights. They must sum to 1.
    pub fn with_weights(mut self, distance_weight: f64, appearance_weight: f64) -> Self {
        self.distance_weight = distance_weight;
        self.appearance_weight = appearance_weight;
        self
    }

    pub fn with_blend_weights(mut self, blend_weight: f64, reacquire_blend_weight: f64) -> Self {
        self.blend_weight = blend_weight;
        self.reacquire_blend_weight = reacquire_blend_weight;
        self
    }

    pub fn with_seed_iou_threshold(mut self, threshold: f64) -> Self {
        self.seed_iou_threshold = threshold;
        self
    }

    pub fn with_detection_threshold(mut self, threshold: f64) -> Self {
        self.detection_threshold = threshold;
        self
    }

    pub fn with_similarity_method(mut self, method: SimilarityMethod) -> Self {
        self.similarity_method = method;
        self
    }

    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = histogram;
        self
    }

    /// Reject out-of-range values before any frame is processed.
    pub fn validate(&self) -> Result<()> {
        validate_non_negative("base_speed", self.base_speed)?;
        if !self.max_distance_cap.is_finite() || self.max_distance_cap <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_distance_cap must be finite and positive, got {}",
                self.max_distance_cap
            )));
        }
        validate_unit_interval("similarity_threshold", self.similarity_threshold)?;
        validate_non_negative("distance_weight", self.distance_weight)?;
        validate_non_negative("appearance_weight", self.appearance_weight)?;
        let weight_sum = self.distance_weight + self.appearance_weight;
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidConfig(format!(
                "distance_weight + appearance_weight must equal 1, got {}",
                weight_sum
            )));
        }
        validate_unit_interval("blend_weight", self.blend_weight)?;
        validate_unit_interval("reacquire_blend_weight", self.reacquire_blend_weight)?;
        validate_unit_interval("seed_iou_threshold", self.seed_iou_threshold)?;
        validate_unit_interval("detection_threshold", self.detection_threshold)?;
        self.histogram.validate()
    }

    /// Weighted sum of a proximity score and an appearance similarity.
    #[inline]
    pub fn combined_score(&self, distance_score: f64, appearance_score: f64) -> f64 {
        self.distance_weight * distance_score + self.appearance_weight * appearance_score
    }
}

impl Default for ReidConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to one track during a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackEvent {
    /// The bound identifier persisted.
    Confirmed { detection_id: i64 },

    /// A lost track was matched by proximity and appearance.
    Reacquired { detection_id: i64, score: f64 },

    /// A track without an appearance reference was matched by overlap.
    Seeded { detection_id: i64, iou: f64 },

    /// No confirmation this frame.
    Lost,
}

impl TrackEvent {
    /// Identifier the track is bound to after the frame, if any.
    pub fn detection_id(&self) -> Option<i64> {
        match *self {
            TrackEvent::Confirmed { detection_id }
            | TrackEvent::Reacquired { detection_id, .. }
            | TrackEvent::Seeded { detection_id, .. } => Some(detection_id),
            TrackEvent::Lost => None,
        }
    }
}

/// Per-frame result of [`ReidEngine::process_frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub frame_index: usize,

    /// One event per track, in track creation order.
    pub events: Vec<TrackEvent>,
}

impl FrameOutcome {
    /// Event of the track at `track_index`.
    pub fn event(&self, track_index: usize) -> Option<&TrackEvent> {
        self.events.get(track_index)
    }

    /// Number of tracks bound after the frame.
    pub fn bound_count(&self) -> usize {
        self.events.iter().filter(|e| e.detection_id().is_some()).count()
    }

    pub fn lost_count(&self) -> usize {
        self.events.len() - self.bound_count()
    }
}

/// Best re-acquisition candidate found for a track.
struct Reacquisition {
    index: usize,
    score: f64,
    observed: AppearanceSignature,
}

/// Identity-continuity engine for a fixed set of subjects.
#[derive(Debug, Clone)]
pub struct ReidEngine {
    config: ReidConfig,
    tracks: Vec<IdentityTrack>,
    frames_processed: usize,
    last_frame_index: Option<usize>,
}

impl ReidEngine {
    /// Create an engine for the given subjects.
    ///
    /// # Arguments
    /// * `config` - Engine configuration, validated here
    /// * `seeds` - One seed per subject; tracks keep this order
    ///
    /// # Errors
    /// * `InvalidConfig` for out-of-range configuration values
    /// * `InvalidSeed` for empty or duplicate names, malformed boxes, or an
    ///   initial signature built with a different histogram layout
    pub fn new(config: ReidConfig, seeds: Vec<SubjectSeed>) -> Result<Self> {
        config.validate()?;

        let mut names = HashSet::new();
        for seed in &seeds {
            seed.validate()?;
            if !names.insert(seed.name.as_str()) {
                return Err(Error::InvalidSeed(format!("duplicate subject name '{}'", seed.name)));
            }
            if let Some(signature) = &seed.initial_signature {
                if signature.hue_bins() != config.histogram.hue_bins
                    || signature.saturation_bins() != config.histogram.saturation_bins
                {
                    return Err(Error::InvalidSeed(format!(
                        "{}: initial signature has {}+{} bins, expected {}+{}",
                        seed.name,
                        signature.hue_bins(),
                        signature.saturation_bins(),
                        config.histogram.hue_bins,
                        config.histogram.saturation_bins
                    )));
                }
            }
        }

        let tracks: Vec<IdentityTrack> = seeds.into_iter().map(IdentityTrack::from_seed).collect();
        debug!("Created re-identification engine with {} subjects", tracks.len());

        Ok(Self {
            config,
            tracks,
            frames_processed: 0,
            last_frame_index: None,
        })
    }

    pub fn config(&self) -> &ReidConfig {
        &self.config
    }

    /// Tracks in creation order.
    pub fn tracks(&self) -> &[IdentityTrack] {
        &self.tracks
    }

    /// Look up a track by subject name.
    pub fn track(&self, name: &str) -> Option<&IdentityTrack> {
        self.tracks.iter().find(|t| t.name() == name)
    }

    /// Number of frames processed so far.
    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    /// Consume the engine and return its tracks for finalization.
    pub fn into_tracks(self) -> Vec<IdentityTrack> {
        self.tracks
    }

    /// Process one frame.
    ///
    /// # Arguments
    /// * `frame_index` - Index of the frame in the video; must increase
    /// * `image` - Frame pixels used for appearance extraction
    /// * `detections` - External detections of the frame
    ///
    /// # Errors
    /// `InvalidFrameInput` if the image is empty, the index does not increase,
    /// a detection is malformed, or an identifier repeats. Tracks are left
    /// untouched in that case.
    pub fn process_frame(
        &mut self,
        frame_index: usize,
        image: &RgbImage,
        detections: &[Detection],
    ) -> Result<FrameOutcome> {
        self.validate_frame(frame_index, image, detections)?;

        if detections.iter().any(|det| det.id.is_none()) {
            warn_once("Detections without an identifier cannot be bound to a subject");
        }

        let config = &self.config;
        let mut assigned: HashSet<i64> = HashSet::new();
        let mut events = vec![TrackEvent::Lost; self.tracks.len()];

        // Pass 1: confirm persisting bindings
        for (event, track) in events.iter_mut().zip(self.tracks.iter_mut()) {
            let Some(id) = track.bound_detection_id() else {
                continue;
            };
            match find_by_id(detections, id) {
                Some(idx) => {
                    let bbox = detections[idx].bbox;
                    let observed = observe(image, &bbox, &config.histogram, track.name());
                    track.confirm(frame_index, bbox, observed.as_ref(), config.blend_weight)?;
                    assigned.insert(id);
                    *event = TrackEvent::Confirmed { detection_id: id };
                }
                None => {
                    track.release();
                    debug!(
                        "Frame {}: '{}' lost detection {}",
                        frame_index,
                        track.name(),
                        id
                    );
                }
            }
        }

        // Pass 2: re-acquire every track not confirmed above
        for (event, track) in events.iter_mut().zip(self.tracks.iter_mut()) {
            if !matches!(event, TrackEvent::Lost) {
                continue;
            }

            let frames_lost = track.begin_search();
            let candidates = unassigned_candidates(detections, &assigned, config.detection_threshold);

            let acquired = match track.reference_signature() {
                None => seed_by_overlap(config, track, detections, &candidates).map(|(idx, iou)| {
                    let bbox = detections[idx].bbox;
                    let observed = observe(image, &bbox, &config.histogram, track.name());
                    (idx, observed, config.blend_weight, TrackEvent::Seeded {
                        detection_id: detection_id(&detections[idx]),
                        iou,
                    })
                }),
                Some(reference) => reacquire(
                    config,
                    track.last_bbox(),
                    reference,
                    frames_lost,
                    image,
                    detections,
                    &candidates,
                )
                .map(|found| {
                    let id = detection_id(&detections[found.index]);
                    (
                        found.index,
                        Some(found.observed),
                        config.reacquire_blend_weight,
                        TrackEvent::Reacquired { detection_id: id, score: found.score },
                    )
                }),
            };

            match acquired {
                Some((idx, observed, weight, acquired_event)) => {
                    let det = &detections[idx];
                    let id = detection_id(det);
                    track.bind(id);
                    track.confirm(frame_index, det.bbox, observed.as_ref(), weight)?;
                    assigned.insert(id);
                    debug!(
                        "Frame {}: '{}' acquired detection {} ({:?})",
                        frame_index,
                        track.name(),
                        id,
                        acquired_event
                    );
                    *event = acquired_event;
                }
                None => {
                    track.mark_missing(frame_index);
                    trace!(
                        "Frame {}: '{}' missing ({} consecutive)",
                        frame_index,
                        track.name(),
                        frames_lost
                    );
                }
            }
        }

        self.frames_processed += 1;
        self.last_frame_index = Some(frame_index);

        Ok(FrameOutcome { frame_index, events })
    }

    fn validate_frame(
        &self,
        frame_index: usize,
        image: &RgbImage,
        detections: &[Detection],
    ) -> Result<()> {
        let invalid = |reason: String| Error::InvalidFrameInput { frame_index, reason };

        if image.width() == 0 || image.height() == 0 {
            return Err(invalid("frame image is empty".to_string()));
        }
        if let Some(last) = self.last_frame_index {
            if frame_index <= last {
                return Err(invalid(format!(
                    "frame index must increase, previous frame was {}",
                    last
                )));
            }
        }

        let mut seen = HashSet::new();
        for (i, det) in detections.iter().enumerate() {
            det.validate()
                .map_err(|e| invalid(format!("detection {}: {}", i, e)))?;
            if let Some(id) = det.id {
                if !seen.insert(id) {
                    return Err(invalid(format!("duplicate detection identifier {}", id)));
                }
            }
        }
        Ok(())
    }
}

/// Identifier of a candidate detection. Candidates always carry one.
fn detection_id(detection: &Detection) -> i64 {
    detection.id.unwrap_or_default()
}

/// Extract a signature, treating failure as "no observation".
fn observe(
    image: &RgbImage,
    bbox: &BoundingBox,
    histogram: &HistogramConfig,
    name: &str,
) -> Option<AppearanceSignature> {
    match appearance::extract(image, bbox, histogram) {
        Ok(signature) => Some(signature),
        Err(e) => {
            trace!("No appearance for '{}': {}", name, e);
            None
        }
    }
}

/// Overlap fallback for tracks without an appearance reference.
fn seed_by_overlap(
    config: &ReidConfig,
    track: &IdentityTrack,
    detections: &[Detection],
    candidates: &[usize],
) -> Option<(usize, f64)> {
    best_overlap_among(track.last_bbox(), detections, candidates, config.seed_iou_threshold)
}

/// Gate candidates around `last_bbox` and pick the best combined score.
///
/// Candidates outside the radius, or whose region yields no signature, are
/// skipped. Ties keep the earlier detection.
fn reacquire(
    config: &ReidConfig,
    last_bbox: &BoundingBox,
    reference: &AppearanceSignature,
    frames_lost: u32,
    image: &RgbImage,
    detections: &[Detection],
    candidates: &[usize],
) -> Option<Reacquisition> {
    let radius = max_radius(config.base_speed, frames_lost, config.max_distance_cap);
    let center = last_bbox.center();
    let mut best: Option<Reacquisition> = None;

    for &idx in candidates {
        let det = &detections[idx];
        let Some(distance) = gated_distance(center, det.bbox.center(), radius) else {
            trace!("Candidate {:?} outside {:.1}px gate", det.id, radius);
            continue;
        };

        let observed = match appearance::extract(image, &det.bbox, &config.histogram) {
            Ok(signature) => signature,
            Err(e) => {
                trace!("Candidate {:?} skipped: {}", det.id, e);
                continue;
            }
        };
        let similarity = match config.similarity_method.compare(reference, &observed) {
            Ok(similarity) => similarity,
            Err(e) => {
                trace!("Candidate {:?} skipped: {}", det.id, e);
                continue;
            }
        };

        let score = config.combined_score(distance_score(distance, radius), similarity);
        trace!(
            "Candidate {:?}: distance {:.1}px, similarity {:.3}, score {:.3}",
            det.id,
            distance,
            similarity,
            score
        );

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Reacquisition { index: idx, score, observed });
        }
    }

    best.filter(|b| b.score >= config.similarity_threshold)
}
