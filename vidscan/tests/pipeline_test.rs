//! End-to-end runs of the detection pipeline over synthetic videos

mod common;

use common::*;
use std::cell::RefCell;
use std::rc::Rc;
use vidscan::control::{LoopState, KEY_ESCAPE, KEY_SPACE};
use vidscan::error::ScanError;
use vidscan::frame::Frame;
use vidscan::labels::LabelTable;
use vidscan::pipeline::{StepOutcome, StopReason};
use vidscan::processing::BoundingBox;

fn shared() -> Shared {
    Rc::new(RefCell::new(Recorder::default()))
}

/// 100x200 frames, each a distinct flat gray so order is visible.
fn gray_frames(levels: &[u8]) -> Vec<Frame> {
    levels
        .iter()
        .map(|&v| Frame::filled(100, 200, [v, v, v]))
        .collect()
}

#[test]
fn test_three_frame_video() {
    let log = shared();
    let outputs = vec![
        raw_output(&[
            cell(0.5, 0.5, 0.2, 0.2, &[0.9, 0.0]),
            cell(0.52, 0.5, 0.2, 0.2, &[0.8, 0.0]),
            cell(0.1, 0.1, 0.1, 0.1, &[0.3, 0.1]),
        ]),
        raw_output(&[cell(0.5, 0.5, 0.2, 0.2, &[0.2, 0.1])]),
        raw_output(&[cell(0.3, 0.3, 0.2, 0.2, &[0.1, 0.45])]),
    ];

    let mut pipeline = build(
        FakeSource::frames(gray_frames(&[10, 20, 30]), log.clone()),
        ScriptedEngine::new(outputs, log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    );

    let mut accepted = Vec::new();
    loop {
        match pipeline.step().unwrap() {
            StepOutcome::Processed(report) => {
                assert_eq!(report.object_count, report.detections.len());
                accepted.push(report.detections);
            }
            StepOutcome::Idle => panic!("Pipeline paused without input"),
            StepOutcome::Stopped(reason) => {
                assert_eq!(reason, StopReason::EndOfStream);
                break;
            }
        }
    }

    assert_eq!(accepted.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 0, 0]);
    let kept = &accepted[0][0];
    assert_eq!(kept.class_id, 0);
    assert!((kept.confidence - 0.9).abs() < 1e-6);
    assert_eq!(kept.bbox, BoundingBox::new(40, 80, 20, 40));

    drop(pipeline);
    let log = log.borrow();
    assert_eq!(log.written.len(), 3);
    // Bottom-right corners are never painted, so they still carry the fill.
    let corners: Vec<_> = log.written.iter().map(|f| f.pixel(99, 199)).collect();
    assert_eq!(
        corners,
        vec![Some([10, 10, 10]), Some([20, 20, 20]), Some([30, 30, 30])]
    );
    assert_eq!(log.shown, 3);
    assert!(log.source_released);
    assert!(log.sink_released);
    assert!(log.display_closed);
}

#[test]
fn test_blob_uses_engine_input_size() {
    let log = shared();
    let summary = build(
        FakeSource::frames(gray_frames(&[1, 2]), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    )
    .run()
    .unwrap();

    assert_eq!(summary.frames_processed, 2);
    assert_eq!(log.borrow().blob_shapes, vec![[1, 3, 32, 32], [1, 3, 32, 32]]);
}

#[test]
fn test_pause_does_not_advance_source() {
    let log = shared();
    let mut keys = vec![Some(KEY_SPACE)];
    keys.extend(std::iter::repeat(None).take(5));
    keys.push(Some(KEY_SPACE));

    let mut pipeline = build(
        FakeSource::frames(gray_frames(&[1, 2, 3, 4]), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(keys, log.clone()),
        labels(),
    );

    assert!(matches!(pipeline.step().unwrap(), StepOutcome::Processed(_)));
    assert_eq!(pipeline.loop_state(), LoopState::Paused);
    assert!(pipeline.state().paused);

    for _ in 0..5 {
        assert!(matches!(pipeline.step().unwrap(), StepOutcome::Idle));
        assert_eq!(log.borrow().frames_pulled, 1);
        assert_eq!(log.borrow().written.len(), 1);
    }

    // Sixth paused poll reads the resume key.
    assert!(matches!(pipeline.step().unwrap(), StepOutcome::Idle));
    assert_eq!(pipeline.loop_state(), LoopState::Running);
    assert!(matches!(pipeline.step().unwrap(), StepOutcome::Processed(r) if r.frame_index == 1));
    assert_eq!(log.borrow().frames_pulled, 2);
}

#[test]
fn test_quit_while_paused() {
    let log = shared();
    let summary = build(
        FakeSource::frames(gray_frames(&[1, 2, 3]), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![Some(KEY_SPACE), None, Some(KEY_ESCAPE)], log.clone()),
        labels(),
    )
    .run()
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Quit);
    assert_eq!(summary.frames_processed, 1);
    let log = log.borrow();
    assert_eq!(log.polls, 3);
    assert!(log.source_released && log.sink_released && log.display_closed);
}

#[test]
fn test_quit_stops_mid_video() {
    let log = shared();
    let summary = build(
        FakeSource::frames(gray_frames(&[1, 2, 3, 4, 5]), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![None, Some(KEY_ESCAPE)], log.clone()),
        labels(),
    )
    .run()
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Quit);
    assert_eq!(summary.frames_processed, 2);
    assert_eq!(log.borrow().written.len(), 2);
    assert_eq!(log.borrow().frames_pulled, 2);
}

#[test]
fn test_decode_failure_ends_run_cleanly() {
    let log = shared();
    let items = vec![
        SourceItem::Frame(Frame::new(100, 200)),
        SourceItem::Fail(ScanError::Decode("truncated packet".to_string())),
        SourceItem::Frame(Frame::new(100, 200)),
    ];
    let summary = build(
        FakeSource::new(items, (100, 200), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    )
    .run()
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::DecodeFailure);
    assert_eq!(summary.frames_processed, 1);
    assert!(log.borrow().sink_released);
}

#[test]
fn test_source_io_error_is_fatal() {
    let log = shared();
    let items = vec![SourceItem::Fail(ScanError::Io("device vanished".to_string()))];
    let result = build(
        FakeSource::new(items, (100, 200), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    )
    .run();

    assert!(matches!(result, Err(ScanError::Io(_))));
    assert!(log.borrow().source_released);
}

#[test]
fn test_output_write_error_is_fatal_and_releases() {
    let log = shared();
    let result = build(
        FakeSource::frames(gray_frames(&[1, 2, 3]), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::failing_at(1, log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    )
    .run();

    assert!(matches!(result, Err(ScanError::OutputWrite(_))));
    let log = log.borrow();
    assert_eq!(log.written.len(), 1);
    // The failed frame never reaches the display.
    assert_eq!(log.shown, 1);
    assert!(log.source_released);
    assert!(log.sink_released);
    assert!(log.display_closed);
}

#[test]
fn test_unlabeled_class_is_counted_but_not_drawn() {
    let log = shared();
    let outputs = vec![raw_output(&[cell(0.5, 0.5, 0.2, 0.2, &[0.0, 0.0, 0.95])])];
    let mut pipeline = build(
        FakeSource::frames(gray_frames(&[50]), log.clone()),
        ScriptedEngine::new(outputs, log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        LabelTable::from_names(["person"]),
    );

    let report = match pipeline.step().unwrap() {
        StepOutcome::Processed(report) => report,
        other => panic!("Expected a processed frame, got {:?}", other),
    };
    assert_eq!(report.detections.len(), 1);
    assert_eq!(report.detections[0].class_id, 2);
    assert_eq!(report.object_count, 1);
    assert_eq!(pipeline.state().objects_in_current_frame, 1);

    let log = log.borrow();
    // Left edge of the would-be box at (40, 80, 20, 40) is untouched.
    assert_eq!(log.written[0].pixel(40, 100), Some([50, 50, 50]));
}

#[test]
fn test_object_count_tracks_each_frame() {
    let log = shared();
    let outputs = vec![
        raw_output(&[
            cell(0.2, 0.2, 0.1, 0.1, &[0.9, 0.0]),
            cell(0.8, 0.8, 0.1, 0.1, &[0.0, 0.7]),
        ]),
        raw_output(&[]),
    ];
    let mut pipeline = build(
        FakeSource::frames(gray_frames(&[1, 2]), log.clone()),
        ScriptedEngine::new(outputs, log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    );

    assert!(matches!(pipeline.step().unwrap(), StepOutcome::Processed(r) if r.object_count == 2));
    assert_eq!(pipeline.state().objects_in_current_frame, 2);
    assert!(matches!(pipeline.step().unwrap(), StepOutcome::Processed(r) if r.object_count == 0));
    assert_eq!(pipeline.state().objects_in_current_frame, 0);
}

#[test]
fn test_empty_video() {
    let log = shared();
    let summary = build(
        FakeSource::new(vec![], (100, 200), log.clone()),
        ScriptedEngine::new(vec![], log.clone()),
        MemorySink::new(log.clone()),
        ScriptedDisplay::new(vec![], log.clone()),
        labels(),
    )
    .run()
    .unwrap();

    assert_eq!(summary.frames_processed, 0);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(log.borrow().polls, 0);
    assert!(log.borrow().sink_released);
}
