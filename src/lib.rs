//! # reidtrack - Identity continuity for selected subjects
//!
//! Follows a small set of user-selected subjects (players) through a video
//! on top of an external per-frame detector/tracker, keeping each subject's
//! identity stable when the external tracker's own identifiers change.
//!
//! ## Features
//!
//! - Hue/saturation histogram appearance signatures with EMA adaptation
//! - Loss-scaled spatial gating of re-acquisition candidates
//! - Deterministic per-frame confirmation and re-acquisition passes
//! - Session driver producing per-subject frame histories and missing frames
//!
//! ## Example
//!
//! ```rust,ignore
//! use reidtrack_rs::{BoundingBox, Detection, ReidConfig, ReidEngine, SubjectSeed};
//!
//! let seeds = vec![SubjectSeed::new("alice", BoundingBox::new(100.0, 80.0, 150.0, 230.0)?)];
//! let mut engine = ReidEngine::new(ReidConfig::default(), seeds)?;
//!
//! let detections = vec![Detection::new(BoundingBox::new(102.0, 81.0, 152.0, 232.0)?, 0.9, Some(7))];
//! let outcome = engine.process_frame(0, &frame, &detections)?;
//! ```
//!
//! For a whole video, wrap the engine in a [`SessionDriver`] and feed it a
//! [`FrameSource`].

// Public modules
pub mod detection;
pub mod appearance;
pub mod spatial_gate;
pub mod matching;
pub mod identity_track;
pub mod engine;
pub mod session;
pub mod utils;

// Re-exports for convenience
pub use detection::{BoundingBox, Detection};
pub use appearance::{AppearanceSignature, HistogramConfig, RegionTrim, SimilarityMethod};
pub use identity_track::{
    BoxSize, IdentityTrack, OutputSizePolicy, SubjectReport, SubjectSeed, TrackState,
};
pub use engine::{FrameOutcome, ReidConfig, ReidEngine, TrackEvent};
pub use matching::seed_from_selection;
pub use session::{
    Frame, FrameSource, SessionConfig, SessionDriver, SessionReport, VecFrameSource, VideoInfo,
};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the re-identification core
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid subject seed: {0}")]
        InvalidSeed(String),

        #[error("Invalid bounding box: {0}")]
        InvalidBoundingBox(String),

        #[error("Invalid detection confidence: {0} is outside [0, 1]")]
        InvalidConfidence(f64),

        #[error("Empty region: box ({x1}, {y1}, {x2}, {y2}) has no area inside a {width}x{height} frame")]
        EmptyRegion {
            x1: f64,
            y1: f64,
            x2: f64,
            y2: f64,
            width: u32,
            height: u32,
        },

        #[error("Incompatible signatures: expected {expected}, got {got}")]
        IncompatibleSignatures { expected: String, got: String },

        #[error("Invalid input for frame {frame_index}: {reason}")]
        InvalidFrameInput { frame_index: usize, reason: String },

        #[error("Unknown similarity method: {0}")]
        UnknownSimilarity(String),

        #[error("Frame source error: {0}")]
        Upstream(String),
    }

    /// Result type for re-identification operations
    pub type Result<T> = std::result::Result<T, Error>;
}
