//! Per-subject identity state maintained across the whole run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::appearance::AppearanceSignature;
use crate::utils::ceil_to_even;
use crate::{BoundingBox, Error, Result};

/// Initial description of a selected subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSeed {
    /// Stable external label.
    pub name: String,

    /// Identifier shown for the subject in the selection UI.
    pub selection_id: Option<u32>,

    /// Box of the subject on the selection frame.
    pub initial_bbox: BoundingBox,

    /// Appearance captured at selection time, if available.
    pub initial_signature: Option<AppearanceSignature>,
}

impl SubjectSeed {
    pub fn new(name: impl Into<String>, initial_bbox: BoundingBox) -> Self {
        Self {
            name: name.into(),
            selection_id: None,
            initial_bbox,
            initial_signature: None,
        }
    }

    pub fn with_selection_id(mut self, selection_id: u32) -> Self {
        self.selection_id = Some(selection_id);
        self
    }

    pub fn with_signature(mut self, signature: AppearanceSignature) -> Self {
        self.initial_signature = Some(signature);
        self
    }

    /// Check the name and box of this seed.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidSeed("subject name must not be empty".to_string()));
        }
        self.initial_bbox
            .validate()
            .map_err(|e| Error::InvalidSeed(format!("{}: {}", self.name, e)))
    }
}

/// Lifecycle state of an identity track, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Never confirmed since creation.
    Unseeded,

    /// Bound to a detection identifier of the current frame.
    Bound,

    /// Previously confirmed but currently unbound.
    Lost,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackState::Unseeded => "unseeded",
            TrackState::Bound => "bound",
            TrackState::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// Whole-pixel width and height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoxSize {
    pub width: u32,
    pub height: u32,
}

impl BoxSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// How the output crop size of a subject is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputSizePolicy {
    /// Largest observed box scaled by `factor`, rounded up to even dimensions.
    Padded { factor: f64 },

    /// Same size for every subject.
    Fixed { width: u32, height: u32 },
}

impl OutputSizePolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            OutputSizePolicy::Padded { factor } => {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "output padding factor must be positive, got {}",
                        factor
                    )));
                }
            }
            OutputSizePolicy::Fixed { width, height } => {
                if width == 0 || height == 0 {
                    return Err(Error::InvalidConfig(format!(
                        "fixed output size must be non-zero, got {}x{}",
                        width, height
                    )));
                }
            }
        }
        Ok(())
    }

    /// Output size for a subject whose largest box was `max_width` x `max_height`.
    pub fn output_size(&self, max_width: f64, max_height: f64) -> BoxSize {
        match *self {
            OutputSizePolicy::Padded { factor } => {
                BoxSize::new(ceil_to_even(max_width * factor), ceil_to_even(max_height * factor))
            }
            OutputSizePolicy::Fixed { width, height } => BoxSize::new(width, height),
        }
    }
}

impl Default for OutputSizePolicy {
    fn default() -> Self {
        OutputSizePolicy::Padded { factor: 1.2 }
    }
}

/// Finalized per-subject result handed to the cropping and export stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectReport {
    pub name: String,
    pub selection_id: Option<u32>,
    pub frames: BTreeMap<usize, BoundingBox>,
    pub max_bbox: BoxSize,
    pub output_size: BoxSize,
    pub frame_count: usize,
    pub missing_frames: Vec<usize>,
}

/// Persistent state of one selected subject.
///
/// Created from a [`SubjectSeed`] before processing and mutated once per
/// processed frame by the engine. The frame history is append-only.
#[derive(Debug, Clone)]
pub struct IdentityTrack {
    name: String,
    selection_id: Option<u32>,
    bound_detection_id: Option<i64>,
    last_bbox: BoundingBox,
    reference_signature: Option<AppearanceSignature>,
    consecutive_losses: u32,
    frame_history: BTreeMap<usize, BoundingBox>,
    missing_frame_indices: BTreeSet<usize>,
    max_width: f64,
    max_height: f64,
}

impl IdentityTrack {
    /// Create a track from a validated seed.
    pub fn from_seed(seed: SubjectSeed) -> Self {
        Self {
            name: seed.name,
            selection_id: seed.selection_id,
            bound_detection_id: None,
            last_bbox: seed.initial_bbox,
            reference_signature: seed.initial_signature,
            consecutive_losses: 0,
            frame_history: BTreeMap::new(),
            missing_frame_indices: BTreeSet::new(),
            max_width: 0.0,
            max_height: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selection_id(&self) -> Option<u32> {
        self.selection_id
    }

    pub fn bound_detection_id(&self) -> Option<i64> {
        self.bound_detection_id
    }

    /// Most recent confirmed box, or the seed box before the first confirmation.
    pub fn last_bbox(&self) -> &BoundingBox {
        &self.last_bbox
    }

    pub fn reference_signature(&self) -> Option<&AppearanceSignature> {
        self.reference_signature.as_ref()
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn frame_history(&self) -> &BTreeMap<usize, BoundingBox> {
        &self.frame_history
    }

    pub fn missing_frame_indices(&self) -> &BTreeSet<usize> {
        &self.missing_frame_indices
    }

    /// Largest confirmed width and height so far.
    pub fn max_size(&self) -> (f64, f64) {
        (self.max_width, self.max_height)
    }

    pub fn state(&self) -> TrackState {
        if self.bound_detection_id.is_some() {
            TrackState::Bound
        } else if self.frame_history.is_empty() {
            TrackState::Unseeded
        } else {
            TrackState::Lost
        }
    }

    /// Record a confirmed observation for `frame_index`.
    ///
    /// Updates the last box, history and maximum size, resets the loss
    /// counter and folds `observed` into the reference signature. Without a
    /// reference yet, the observation becomes the reference.
    ///
    /// # Arguments
    /// * `frame_index` - Frame of the observation
    /// * `bbox` - Confirmed box
    /// * `observed` - Signature extracted from `bbox`, if extraction succeeded
    /// * `blend_weight` - EMA weight of the observation
    pub fn confirm(
        &mut self,
        frame_index: usize,
        bbox: BoundingBox,
        observed: Option<&AppearanceSignature>,
        blend_weight: f64,
    ) -> Result<()> {
        if let Some(observed) = observed {
            let updated = match &self.reference_signature {
                Some(reference) => reference.blend(observed, blend_weight)?,
                None => observed.clone(),
            };
            self.reference_signature = Some(updated);
        }

        self.last_bbox = bbox;
        self.frame_history.insert(frame_index, bbox);
        self.max_width = self.max_width.max(bbox.width());
        self.max_height = self.max_height.max(bbox.height());
        self.consecutive_losses = 0;
        Ok(())
    }

    /// Bind the track to a detection identifier.
    pub fn bind(&mut self, detection_id: i64) {
        self.bound_detection_id = Some(detection_id);
    }

    /// Drop the current binding, returning the released identifier.
    pub fn release(&mut self) -> Option<i64> {
        self.bound_detection_id.take()
    }

    /// Count the current frame as unconfirmed and return the number of
    /// consecutive unconfirmed frames, which scales the search radius.
    pub fn begin_search(&mut self) -> u32 {
        self.consecutive_losses = self.consecutive_losses.saturating_add(1);
        self.consecutive_losses
    }

    pub fn mark_missing(&mut self, frame_index: usize) {
        self.missing_frame_indices.insert(frame_index);
    }

    /// Build the final report for this subject.
    pub fn finalize(&self, policy: &OutputSizePolicy) -> SubjectReport {
        SubjectReport {
            name: self.name.clone(),
            selection_id: self.selection_id,
            frames: self.frame_history.clone(),
            // Float to int casts saturate at u32::MAX
            max_bbox: BoxSize::new(self.max_width.ceil() as u32, self.max_height.ceil() as u32),
            output_size: policy.output_size(self.max_width, self.max_height),
            frame_count: self.frame_history.len(),
            missing_frames: self.missing_frame_indices.iter().copied().collect(),
        }
    }
}
