//! Integration tests for reidtrack.
//!
//! These tests exercise complete identity-continuity workflows across the
//! public modules: selection seeding, engine passes and the session driver.

use image::{Rgb, RgbImage};

use reidtrack_rs::appearance;
use reidtrack_rs::{
    seed_from_selection, BoundingBox, BoxSize, Detection, Error, Frame, FrameSource,
    HistogramConfig, OutputSizePolicy, ReidConfig, ReidEngine, SessionConfig, SessionDriver,
    SimilarityMethod, SubjectSeed, TrackEvent, TrackState, VecFrameSource,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const RED: [u8; 3] = [200, 30, 30];
const BLUE: [u8; 3] = [60, 60, 200];
const YELLOW: [u8; 3] = [220, 200, 40];

fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
    BoundingBox::new(x1, y1, x2, y2).unwrap()
}

fn det(b: BoundingBox, id: i64) -> Detection {
    Detection::new(b, 0.9, Some(id))
}

fn paint(boxes: &[(BoundingBox, [u8; 3])]) -> RgbImage {
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([110, 140, 110]));
    for (b, color) in boxes {
        let x2 = b.x2.min(WIDTH as f64) as u32;
        let y2 = b.y2.min(HEIGHT as f64) as u32;
        for y in b.y1.max(0.0) as u32..y2 {
            for x in b.x1.max(0.0) as u32..x2 {
                image.put_pixel(x, y, Rgb(*color));
            }
        }
    }
    image
}

// =============================================================================
// Test 1: Selection to Report
// =============================================================================

#[test]
fn test_integration_selection_to_report() {
    let alice_box = bbox(100.0, 120.0, 150.0, 270.0);
    let bob_box = bbox(400.0, 120.0, 450.0, 270.0);

    // Selection frame detections; the user clicked slightly off the players
    let selection = vec![det(alice_box, 1), det(bob_box, 2)];
    let seeds = vec![
        seed_from_selection("alice", 1, bbox(98.0, 118.0, 152.0, 268.0), &selection, 0.3).unwrap(),
        seed_from_selection("bob", 2, bbox(405.0, 125.0, 455.0, 275.0), &selection, 0.3).unwrap(),
    ];
    assert_eq!(seeds[0].initial_bbox, alice_box);
    assert_eq!(seeds[1].initial_bbox, bob_box);

    // Both walk right; bob leaves the view after frame 14
    let frames: Vec<Frame> = (0..20)
        .map(|i| {
            let dx = i as f64 * 2.0;
            let a = alice_box.translated(dx, 0.0);
            let b = bob_box.translated(dx, 0.0);
            if i < 15 {
                Frame::new(i, paint(&[(a, RED), (b, BLUE)]), vec![det(a, 1), det(b, 2)])
            } else {
                Frame::new(i, paint(&[(a, RED)]), vec![det(a, 1)])
            }
        })
        .collect();

    let engine = ReidEngine::new(ReidConfig::default(), seeds).unwrap();
    let driver = SessionDriver::new(engine, SessionConfig::default()).unwrap();
    let mut source = VecFrameSource::new(frames);
    let report = driver.run(&mut source).unwrap();

    let alice = report.subject("alice").unwrap();
    assert_eq!(alice.selection_id, Some(1));
    assert_eq!(alice.frame_count, 20);
    assert!(alice.missing_frames.is_empty());
    assert_eq!(alice.max_bbox, BoxSize::new(50, 150));
    assert_eq!(alice.output_size, BoxSize::new(60, 180));

    let bob = report.subject("bob").unwrap();
    assert_eq!(bob.frame_count, 15);
    assert_eq!(bob.missing_frames, (15..20).collect::<Vec<_>>());
    assert_eq!(bob.frames.keys().next_back(), Some(&14));
}

// =============================================================================
// Test 2: Identifier Churn
// =============================================================================

#[test]
fn test_integration_identifier_churn_keeps_identity() {
    let alice_box = bbox(100.0, 100.0, 150.0, 250.0);
    let bob_box = bbox(170.0, 100.0, 220.0, 250.0);
    let seeds = vec![SubjectSeed::new("alice", alice_box), SubjectSeed::new("bob", bob_box)];
    let mut engine = ReidEngine::new(ReidConfig::default().with_base_speed(100.0), seeds).unwrap();

    for i in 0..30usize {
        let dx = (i % 10) as f64;
        let a = alice_box.translated(dx, 0.0);
        let b = bob_box.translated(dx, 0.0);
        let image = paint(&[(a, RED), (b, BLUE)]);

        // New identifiers every third frame, listed in alternating order
        let epoch = (i / 3) as i64;
        let detections = if epoch % 2 == 0 {
            vec![det(a, epoch * 2), det(b, epoch * 2 + 1)]
        } else {
            vec![det(b, epoch * 2), det(a, epoch * 2 + 1)]
        };

        engine.process_frame(i, &image, &detections).unwrap();

        let alice = engine.track("alice").unwrap();
        let bob = engine.track("bob").unwrap();
        assert_eq!(alice.last_bbox(), &a, "frame {}", i);
        assert_eq!(bob.last_bbox(), &b, "frame {}", i);
    }

    for track in engine.tracks() {
        assert_eq!(track.frame_history().len(), 30);
        assert!(track.missing_frame_indices().is_empty());
        assert_eq!(track.state(), TrackState::Bound);
    }
}

// =============================================================================
// Test 3: Occlusion and Return
// =============================================================================

#[test]
fn test_integration_occlusion_and_return() {
    let start = bbox(200.0, 150.0, 250.0, 300.0);
    let mut engine = ReidEngine::new(
        ReidConfig::default().with_base_speed(8.0),
        vec![SubjectSeed::new("alice", start)],
    )
    .unwrap();

    // Visible for 10 frames
    for i in 0..10 {
        engine
            .process_frame(i, &paint(&[(start, RED)]), &[det(start, 1)])
            .unwrap();
    }

    // Occluded for 5 frames behind a yellow referee who has the only detection
    let referee = start.translated(15.0, 0.0);
    for i in 10..15 {
        let outcome = engine
            .process_frame(i, &paint(&[(referee, YELLOW)]), &[det(referee, 50)])
            .unwrap();
        assert_eq!(outcome.events[0], TrackEvent::Lost, "frame {}", i);
    }

    // Returns 30px away under a new identifier while the referee steps aside;
    // the radius is now 8 * 6 = 48
    let back = start.translated(30.0, 0.0);
    let aside = start.translated(-60.0, 0.0);
    let outcome = engine
        .process_frame(15, &paint(&[(aside, YELLOW), (back, RED)]), &[det(aside, 50), det(back, 9)])
        .unwrap();
    assert!(matches!(outcome.events[0], TrackEvent::Reacquired { detection_id: 9, .. }));

    let track = engine.track("alice").unwrap();
    assert_eq!(
        track.missing_frame_indices().iter().copied().collect::<Vec<_>>(),
        (10..15).collect::<Vec<_>>()
    );
    assert_eq!(track.frame_history().len(), 11);
    assert_eq!(track.consecutive_losses(), 0);
}

// =============================================================================
// Test 4: Never Seen Again
// =============================================================================

#[test]
fn test_integration_never_seen_again() {
    let start = bbox(200.0, 150.0, 250.0, 300.0);
    let frames: Vec<Frame> = (0..100)
        .map(|i| {
            if i < 50 {
                Frame::new(i, paint(&[(start, RED)]), vec![det(start, 1)])
            } else {
                Frame::new(i, paint(&[]), vec![])
            }
        })
        .collect();

    let engine = ReidEngine::new(ReidConfig::default(), vec![SubjectSeed::new("alice", start)]).unwrap();
    let report = SessionDriver::new(engine, SessionConfig::default().with_progress_interval(25))
        .unwrap()
        .run(&mut VecFrameSource::new(frames))
        .unwrap();

    let alice = report.subject("alice").unwrap();
    assert_eq!(alice.missing_frames, (50..100).collect::<Vec<_>>());
    assert_eq!(alice.frames.keys().copied().collect::<Vec<_>>(), (0..50).collect::<Vec<_>>());
}

// =============================================================================
// Test 5: Determinism
// =============================================================================

fn scripted_frames() -> Vec<Frame> {
    let a0 = bbox(100.0, 100.0, 150.0, 250.0);
    let b0 = bbox(260.0, 100.0, 310.0, 250.0);
    (0..40)
        .map(|i| {
            let a = a0.translated(i as f64 * 3.0, 0.0);
            let b = b0.translated(-(i as f64) * 1.5, (i % 4) as f64);
            let detections = match i % 8 {
                0..=3 => vec![det(a, 1), det(b, 2)],
                4 => vec![det(b, 2)],
                5 => vec![],
                _ => vec![det(b, 3 + i as i64), det(a, 100 + i as i64)],
            };
            Frame::new(i, paint(&[(a, RED), (b, BLUE)]), detections)
        })
        .collect()
}

#[test]
fn test_integration_replay_is_deterministic() {
    let run = || {
        let seeds = vec![
            SubjectSeed::new("alice", bbox(100.0, 100.0, 150.0, 250.0)),
            SubjectSeed::new("bob", bbox(260.0, 100.0, 310.0, 250.0)),
        ];
        let engine = ReidEngine::new(ReidConfig::default().with_base_speed(15.0), seeds).unwrap();
        SessionDriver::new(engine, SessionConfig::default())
            .unwrap()
            .run(&mut VecFrameSource::new(scripted_frames()))
            .unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// =============================================================================
// Test 6: Similarity Methods
// =============================================================================

#[test]
fn test_integration_every_similarity_method_reacquires() {
    for name in ["correlation", "intersection", "bhattacharyya"] {
        let method: SimilarityMethod = name.parse().unwrap();
        let start = bbox(200.0, 150.0, 250.0, 300.0);
        let mut engine = ReidEngine::new(
            ReidConfig::default()
                .with_base_speed(40.0)
                .with_similarity_method(method),
            vec![SubjectSeed::new("alice", start)],
        )
        .unwrap();

        engine.process_frame(0, &paint(&[(start, RED)]), &[det(start, 1)]).unwrap();

        let impostor = start.translated(-20.0, 0.0);
        let moved = start.translated(25.0, 0.0);
        let image = paint(&[(impostor, BLUE), (moved, RED)]);
        let outcome = engine
            .process_frame(1, &image, &[det(impostor, 2), det(moved, 3)])
            .unwrap();

        assert!(
            matches!(outcome.events[0], TrackEvent::Reacquired { detection_id: 3, .. }),
            "{}: {:?}",
            name,
            outcome.events[0]
        );
    }
}

#[test]
fn test_integration_unknown_similarity_method() {
    assert!(matches!(
        "cosine".parse::<SimilarityMethod>(),
        Err(Error::UnknownSimilarity(_))
    ));
}

// =============================================================================
// Test 7: Initial Signatures
// =============================================================================

#[test]
fn test_integration_initial_signature_skips_overlap_fallback() {
    let start = bbox(200.0, 150.0, 250.0, 300.0);
    let selection_image = paint(&[(start, RED)]);
    let signature = appearance::extract(&selection_image, &start, &HistogramConfig::default()).unwrap();

    let mut engine = ReidEngine::new(
        ReidConfig::default(),
        vec![SubjectSeed::new("alice", start).with_signature(signature)],
    )
    .unwrap();
    assert_eq!(engine.track("alice").unwrap().state(), TrackState::Unseeded);

    // 3px away: inside the 5px radius of the first search
    let moved = start.translated(3.0, 0.0);
    let outcome = engine
        .process_frame(0, &paint(&[(moved, RED)]), &[det(moved, 4)])
        .unwrap();

    assert!(matches!(outcome.events[0], TrackEvent::Reacquired { detection_id: 4, .. }));
}

// =============================================================================
// Test 8: Report Shape
// =============================================================================

#[test]
fn test_integration_report_json_shape() {
    let start = bbox(200.0, 150.0, 250.0, 300.0);
    let frames: Vec<Frame> = (0..4)
        .map(|i| {
            let detections = if i == 2 { vec![] } else { vec![det(start, 1)] };
            Frame::new(i, paint(&[(start, RED)]), detections)
        })
        .collect();

    let engine = ReidEngine::new(
        ReidConfig::default(),
        vec![SubjectSeed::new("alice", start).with_selection_id(3)],
    )
    .unwrap();
    let config = SessionConfig::default()
        .with_output_size(OutputSizePolicy::Fixed { width: 200, height: 300 });
    let report = SessionDriver::new(engine, config)
        .unwrap()
        .run(&mut VecFrameSource::new(frames))
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    let alice = &value["subjects"][0];
    assert_eq!(alice["name"], "alice");
    assert_eq!(alice["selection_id"], 3);
    assert_eq!(alice["frame_count"], 3);
    assert_eq!(alice["missing_frames"], serde_json::json!([2]));
    assert_eq!(alice["max_bbox"], serde_json::json!({"width": 50, "height": 150}));
    assert_eq!(alice["output_size"], serde_json::json!({"width": 200, "height": 300}));
    assert_eq!(alice["frames"]["3"]["y2"], 300.0);
    assert_eq!(value["video"]["width"], WIDTH);
}

// =============================================================================
// Test 9: Source Reset
// =============================================================================

#[test]
fn test_integration_source_is_reset_once() {
    let start = bbox(200.0, 150.0, 250.0, 300.0);
    let mut source = VecFrameSource::new(vec![Frame::new(0, paint(&[(start, RED)]), vec![det(start, 1)])]);

    // Drain the source before the run; the driver rewinds it
    while source.next_frame().is_some() {}

    let engine = ReidEngine::new(ReidConfig::default(), vec![SubjectSeed::new("alice", start)]).unwrap();
    let report = SessionDriver::new(engine, SessionConfig::default())
        .unwrap()
        .run(&mut source)
        .unwrap();

    assert_eq!(source.reset_count(), 1);
    assert_eq!(report.frames_processed, 1);
}
