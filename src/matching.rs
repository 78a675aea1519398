//! Detection selection helpers: identifier lookup, candidate filtering and
//! best-overlap matching.

use std::collections::HashSet;

use crate::identity_track::SubjectSeed;
use crate::utils::validate_unit_interval;
use crate::{BoundingBox, Detection, Error, Result};

/// Index of the detection carrying identifier `id`, if present.
pub fn find_by_id(detections: &[Detection], id: i64) -> Option<usize> {
    detections.iter().position(|det| det.id == Some(id))
}

/// Indices of detections eligible for re-acquisition.
///
/// A candidate carries an identifier, that identifier has not been assigned
/// to another track this frame, and its confidence is at least
/// `detection_threshold`. Indices are returned in detection order.
pub fn unassigned_candidates(
    detections: &[Detection],
    assigned: &HashSet<i64>,
    detection_threshold: f64,
) -> Vec<usize> {
    detections
        .iter()
        .enumerate()
        .filter(|(_, det)| match det.id {
            Some(id) => !assigned.contains(&id) && det.confidence >= detection_threshold,
            None => false,
        })
        .map(|(i, _)| i)
        .collect()
}

/// Find the detection overlapping `target` the most.
///
/// # Arguments
/// * `target` - Box to match against
/// * `detections` - Detections of the frame
/// * `iou_threshold` - Minimum IoU for a match
///
/// # Returns
/// Index of the best match in `detections`, or `None` if no detection
/// reaches the threshold. A detection with zero overlap never matches.
pub fn best_overlap_match(
    target: &BoundingBox,
    detections: &[Detection],
    iou_threshold: f64,
) -> Option<usize> {
    let indices: Vec<usize> = (0..detections.len()).collect();
    best_overlap_among(target, detections, &indices, iou_threshold).map(|(idx, _)| idx)
}

/// Find the best-overlapping detection among a subset of indices.
///
/// Returns the chosen index and its IoU. Ties keep the earlier candidate.
pub fn best_overlap_among(
    target: &BoundingBox,
    detections: &[Detection],
    candidates: &[usize],
    iou_threshold: f64,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    let mut best_iou = 0.0;

    for &idx in candidates {
        let iou = target.iou(&detections[idx].bbox);
        if iou > best_iou && iou >= iou_threshold {
            best_iou = iou;
            best = Some((idx, iou));
        }
    }

    best
}

/// Build a subject seed from a user's choice on the selection frame.
///
/// The chosen box is snapped to the best-overlapping detection of the
/// selection frame when one reaches `iou_threshold`; otherwise the chosen
/// box is used as is.
///
/// # Arguments
/// * `name` - Stable subject label
/// * `selection_id` - Identifier the subject had in the selection UI
/// * `chosen_bbox` - Box the user picked
/// * `selection_detections` - Detections of the selection frame
/// * `iou_threshold` - Minimum IoU to snap to a detection
pub fn seed_from_selection(
    name: &str,
    selection_id: u32,
    chosen_bbox: BoundingBox,
    selection_detections: &[Detection],
    iou_threshold: f64,
) -> Result<SubjectSeed> {
    validate_unit_interval("iou_threshold", iou_threshold)?;
    chosen_bbox
        .validate()
        .map_err(|e| Error::InvalidSeed(format!("{}: {}", name, e)))?;

    let bbox = match best_overlap_match(&chosen_bbox, selection_detections, iou_threshold) {
        Some(idx) => {
            log::debug!(
                "Snapped selection '{}' to detection {} ({:?})",
                name,
                idx,
                selection_detections[idx].id
            );
            selection_detections[idx].bbox
        }
        None => chosen_bbox,
    };

    Ok(SubjectSeed::new(name, bbox).with_selection_id(selection_id))
}
