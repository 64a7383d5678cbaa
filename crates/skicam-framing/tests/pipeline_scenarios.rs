//! End-to-end scenarios for the synchronous framing pipeline.

use skicam_framing::actuator::{SimulatedActuator, ZoomActuator};
use skicam_framing::config::{FramingConfig, NoSubjectPolicy};
use skicam_framing::detection::ReplayDetector;
use skicam_framing::pipeline::{ControlCommand, FramingPipeline};
use skicam_framing::{CameraFrame, SubjectDetector};
use skicam_models::{
    labels, BoxOrigin, NormalizedRect, RawDetection, ReplayFrame, ReplayLog, ZoomMode,
};

const DT: f64 = 0.1;

fn pipeline(config: FramingConfig) -> FramingPipeline<SimulatedActuator> {
    FramingPipeline::new(config, SimulatedActuator::new(20.0)).unwrap()
}

fn skier(cx: f64, cy: f64, height: f64) -> NormalizedRect {
    NormalizedRect::from_center(cx, cy, height * 0.4, height).with_confidence(0.9)
}

fn raw(rect: &NormalizedRect) -> RawDetection {
    RawDetection::new(rect.left, rect.top, rect.width(), rect.height(), "person", rect.confidence)
}

/// What a detector reading the zoomed output sees of a full-sensor subject.
fn seen_through(
    pipeline: &FramingPipeline<SimulatedActuator>,
    sensor_rect: &NormalizedRect,
) -> Vec<RawDetection> {
    let crop = pipeline.current_crop();
    vec![raw(&sensor_rect.to_crop_space(&crop))]
}

#[test]
fn test_distant_skier_framed_at_target_height() {
    let mut p = pipeline(FramingConfig::default());
    let subject = skier(0.5, 0.5, 0.05);

    let mut last = None;
    for i in 0..300 {
        let detections = seen_through(&p, &subject);
        last = Some(p.process(i, i as f64 * DT, &detections));
    }
    let last = last.unwrap();

    let height_in_crop = subject.height() / p.current_crop().height();
    assert!(
        (0.12..=0.18).contains(&height_in_crop),
        "height in crop {height_in_crop}"
    );
    assert!(last.zoom_factor > 2.4 && last.zoom_factor < 3.6, "zoom {}", last.zoom_factor);
    assert_eq!(last.locked_track_id, Some(1));
    assert_eq!(p.tracker_stats().total_tracks_created, 1);
}

#[test]
fn test_resync_then_on_target_subject_holds_zoom() {
    let mut p = pipeline(FramingConfig::default());
    p.apply_command(ControlCommand::SetManualZoom { factor: 4.0 }).unwrap();
    p.apply_command(ControlCommand::ResumeAuto).unwrap();
    assert!((p.controller().zoom_scale() - 0.25).abs() < 1e-12);

    let on_target = raw(&skier(0.5, 0.5, 0.15));
    for i in 0..5 {
        let snap = p.process(i, i as f64 * DT, &[on_target.clone()]);
        assert!(p.controller().last_scale_change().abs() < 1e-9);
        assert!((snap.zoom_factor - 4.0).abs() < 1e-6);
    }
}

#[test]
fn test_manual_hold_and_release() {
    let mut p = pipeline(FramingConfig::default());
    let subject = raw(&skier(0.5, 0.5, 0.1));

    p.apply_command(ControlCommand::ZoomIn).unwrap();
    for i in 0..5 {
        let snap = p.process(i, i as f64 * DT, &[subject.clone()]);
        assert_eq!(snap.mode, ZoomMode::Manual);
        assert_eq!(snap.debug_label, labels::PERSON_MANUAL);
    }
    // 0.5 s at 2 doublings per second
    assert!((p.actuator().current_zoom_factor() - 2.0).abs() < 1e-6);

    p.apply_command(ControlCommand::StopZoom).unwrap();
    let held = p.process(5, 0.5, &[subject.clone()]);
    assert!((held.zoom_factor - 2.0).abs() < 1e-6);

    p.apply_command(ControlCommand::ResumeAuto).unwrap();
    let resumed = p.process(6, 0.6, &[subject]);
    assert_eq!(resumed.mode, ZoomMode::Auto);
    assert_eq!(resumed.debug_label, labels::AUTO_RESUMED);
    // Resync avoids a jump on the first auto tick
    assert!((resumed.zoom_factor - 2.0).abs() < 0.2);
}

#[test]
fn test_actuator_failures_do_not_roll_back() {
    let mut p = pipeline(FramingConfig::default());
    let subject = raw(&skier(0.5, 0.5, 0.05));
    p.actuator_mut().fail_next(3);

    for i in 0..3 {
        p.process(i, i as f64 * DT, &[subject.clone()]);
    }
    assert_eq!(p.actuation_failures(), 3);
    assert!(p.actuator().applied().is_empty());
    let controller_factor = p.controller().zoom_factor();
    assert!(controller_factor > 1.0);

    let snap = p.process(3, 0.3, &[subject]);
    assert_eq!(p.actuator().applied().len(), 1);
    assert!((p.actuator().current_zoom_factor() - snap.zoom_factor).abs() < 1e-9);
    assert!(snap.zoom_factor >= controller_factor);
}

#[test]
fn test_hold_policy_keeps_crop_without_subject() {
    let mut p = pipeline(FramingConfig::default());
    p.apply_command(ControlCommand::SetManualZoom { factor: 4.0 }).unwrap();
    p.apply_command(ControlCommand::ResumeAuto).unwrap();

    for i in 0..10 {
        let snap = p.process_with_dt(i, i as f64 * 0.5, &[], 0.5);
        assert!((snap.zoom_factor - 4.0).abs() < 1e-9);
    }
}

#[test]
fn test_decay_policy_returns_to_full_frame() {
    let mut config = FramingConfig::default();
    config.pipeline.no_subject = NoSubjectPolicy::DecayToFullFrame { rate: 1.0 };
    let mut p = pipeline(config);
    p.apply_command(ControlCommand::SetManualZoom { factor: 4.0 }).unwrap();
    p.apply_command(ControlCommand::ResumeAuto).unwrap();

    let first = p.process_with_dt(0, 0.0, &[], 0.5);
    assert!((first.zoom_factor - 4.0 / 2.0_f64.sqrt()).abs() < 1e-6);
    for i in 1..4 {
        p.process_with_dt(i, i as f64 * 0.5, &[], 0.5);
    }
    assert!((p.current_crop().width() - 1.0).abs() < 1e-9);
    assert!((p.actuator().current_zoom_factor() - 1.0).abs() < 1e-9);
}

#[test]
fn test_short_occlusion_keeps_lock() {
    let mut p = pipeline(FramingConfig::default());
    let subject = raw(&skier(0.5, 0.5, 0.15));

    for i in 0..5 {
        p.process(i, i as f64 * DT, &[subject.clone()]);
    }
    for i in 5..10 {
        let snap = p.process(i, i as f64 * DT, &[]);
        assert!(snap.subject.is_none());
        assert_eq!(snap.locked_track_id, Some(1));
        assert_eq!(snap.debug_label, labels::NONE);
    }
    let back = p.process(10, 1.0, &[subject]);
    assert_eq!(back.subject.map(|s| s.id), Some(1));
    assert_eq!(p.tracker_stats().total_tracks_created, 1);
}

#[test]
fn test_bottom_left_detector_boxes() {
    let mut config = FramingConfig::default();
    config.detector.origin = BoxOrigin::BottomLeft;
    let mut p = pipeline(config);

    // Bottom-left box whose top edge sits at y = 0.8 from the bottom
    let detection = RawDetection::new(0.4, 0.6, 0.1, 0.2, "Person", 0.9);
    let snap = p.process(0, 0.0, &[detection]);
    let rect = snap.subject.unwrap().rect;
    assert!((rect.top - 0.2).abs() < 1e-9);
    assert!((rect.bottom - 0.4).abs() < 1e-9);
}

#[test]
fn test_replay_detector_projects_into_view() {
    let log = ReplayLog {
        fps: 10.0,
        frame_width: 1920,
        frame_height: 1080,
        origin: BoxOrigin::TopLeft,
        frames: vec![ReplayFrame {
            timestamp: 0.0,
            detections: vec![raw(&skier(0.5, 0.5, 0.1))],
        }],
    };
    let detector = ReplayDetector::new(log, true);
    let view = NormalizedRect::from_center_scale(0.5, 0.5, 0.5);

    let frame = CameraFrame::metadata_only(0, 0.0);
    let detections = tokio_test::block_on(detector.detect(&frame, &view)).unwrap();
    assert_eq!(detections.len(), 1);
    assert!((detections[0].height - 0.2).abs() < 1e-9);
}
