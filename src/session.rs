//! Session driver: feeds frames from a source through the engine and builds
//! the final report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;

use crate::engine::ReidEngine;
use crate::identity_track::{OutputSizePolicy, SubjectReport};
use crate::{Detection, Error, Result};

/// One decoded frame with its external detections.
///
/// Pixels are shared, so cloning a frame does not copy the image.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub image: Arc<RgbImage>,
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(index: usize, image: impl Into<Arc<RgbImage>>, detections: Vec<Detection>) -> Self {
        Self {
            index,
            image: image.into(),
            detections,
        }
    }
}

/// Properties of the processed video, carried into the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoInfo {
    pub source: Option<String>,
    pub fps: f64,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
}

/// Supplier of frames and detections, typically a video decoder paired with
/// an external detector/tracker.
pub trait FrameSource {
    /// Describe the video being read.
    fn video_info(&self) -> VideoInfo;

    /// Rewind to the first frame and clear any state carried across calls
    /// (such as the external tracker's persistence).
    fn reset(&mut self) -> Result<()>;

    /// Next frame in order, `None` once exhausted.
    fn next_frame(&mut self) -> Option<Result<Frame>>;
}

/// In-memory frame source.
#[derive(Debug, Clone)]
pub struct VecFrameSource {
    info: VideoInfo,
    frames: Vec<Frame>,
    cursor: usize,
    reset_count: usize,
}

impl VecFrameSource {
    /// Create a source over `frames`, deriving the video size from the first one.
    pub fn new(frames: Vec<Frame>) -> Self {
        let (width, height) = frames.first().map(|f| f.image.dimensions()).unwrap_or((0, 0));
        let info = VideoInfo {
            source: None,
            fps: 0.0,
            total_frames: frames.len(),
            width,
            height,
        };
        Self {
            info,
            frames,
            cursor: 0,
            reset_count: 0,
        }
    }

    pub fn with_info(mut self, info: VideoInfo) -> Self {
        self.info = info;
        self
    }

    /// Number of times [`FrameSource::reset`] was called.
    pub fn reset_count(&self) -> usize {
        self.reset_count
    }
}

impl FrameSource for VecFrameSource {
    fn video_info(&self) -> VideoInfo {
        self.info.clone()
    }

    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        self.reset_count += 1;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Result<Frame>> {
        let frame = self.frames.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(Ok(frame))
    }
}

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Selection frame; earlier frames are read but not processed.
    pub start_frame: usize,

    /// Stop after this many frames have been read from the source.
    pub max_frames: Option<usize>,

    /// Log progress every this many processed frames (0 disables).
    pub progress_interval: usize,

    /// Output crop size derivation.
    pub output_size: OutputSizePolicy,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            start_frame: 0,
            max_frames: None,
            progress_interval: 100,
            output_size: OutputSizePolicy::default(),
        }
    }

    pub fn with_start_frame(mut self, start_frame: usize) -> Self {
        self.start_frame = start_frame;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_output_size(mut self, policy: OutputSizePolicy) -> Self {
        self.output_size = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.output_size.validate()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a complete session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub video: VideoInfo,
    pub subjects: Vec<SubjectReport>,
    pub frames_read: usize,
    pub frames_processed: usize,
    /// Indices of frames rejected as invalid and left out of tracking.
    pub rejected_frames: Vec<usize>,
    pub cancelled: bool,
}

impl SessionReport {
    /// Report of the subject named `name`.
    pub fn subject(&self, name: &str) -> Option<&SubjectReport> {
        self.subjects.iter().find(|s| s.name == name)
    }
}

/// Drives an engine over a frame source.
///
/// The run can be stopped between frames through the handle returned by
/// [`SessionDriver::cancel_handle`]; tracks stay consistent and the report
/// covers every frame processed before the stop.
#[derive(Debug)]
pub struct SessionDriver {
    engine: ReidEngine,
    config: SessionConfig,
    cancel: Arc<AtomicBool>,
}

impl SessionDriver {
    pub fn new(engine: ReidEngine, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn engine(&self) -> &ReidEngine {
        &self.engine
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared flag that stops the run before the next frame when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Process the whole source and finalize every subject.
    ///
    /// The source is reset once before reading. Errors from the source abort
    /// the run. A frame the engine rejects as invalid is skipped with a
    /// warning; tracks keep the state of the frames before it.
    pub fn run<S: FrameSource + ?Sized>(mut self, source: &mut S) -> Result<SessionReport> {
        source.reset()?;
        let video = source.video_info();
        info!(
            "Tracking {} subjects from frame {} ({} frames)",
            self.engine.tracks().len(),
            self.config.start_frame,
            video.total_frames
        );

        let mut frames_read = 0;
        let mut cancelled = false;
        let mut rejected_frames = Vec::new();

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Session cancelled after {} frames", frames_read);
                cancelled = true;
                break;
            }
            if self.config.max_frames.is_some_and(|max| frames_read >= max) {
                debug!("Reached frame limit {}", frames_read);
                break;
            }

            let frame = match source.next_frame() {
                Some(frame) => frame?,
                None => break,
            };
            frames_read += 1;

            if frame.index < self.config.start_frame {
                continue;
            }

            match self
                .engine
                .process_frame(frame.index, &frame.image, &frame.detections)
            {
                Ok(_) => self.log_progress(video.total_frames),
                Err(Error::InvalidFrameInput { frame_index, reason }) => {
                    warn!("Skipping frame {}: {}", frame_index, reason);
                    rejected_frames.push(frame_index);
                }
                Err(e) => return Err(e),
            }
        }

        let subjects = self
            .engine
            .tracks()
            .iter()
            .map(|track| track.finalize(&self.config.output_size))
            .collect::<Vec<_>>();

        for subject in &subjects {
            info!(
                "'{}': {} frames tracked, {} missing",
                subject.name,
                subject.frame_count,
                subject.missing_frames.len()
            );
        }

        Ok(SessionReport {
            video,
            subjects,
            frames_read,
            frames_processed: self.engine.frames_processed(),
            rejected_frames,
            cancelled,
        })
    }

    fn log_progress(&self, total_frames: usize) {
        let interval = self.config.progress_interval;
        let processed = self.engine.frames_processed();
        if interval > 0 && processed % interval == 0 {
            info!("Processed {}/{} frames", processed, total_frames);
        }
    }
}

/// Wrap an upstream failure message as a crate error.
pub fn upstream_error(message: impl Into<String>) -> Error {
    Error::Upstream(message.into())
}
