//! Control loop driving one detection run
//!
//! A [`Pipeline`] owns every stage for a single run: the frame source, the
//! inference engine, the persisted sink and the display. Each call to
//! [`Pipeline::step`] processes at most one frame and then polls exactly one
//! input event. Changing the configuration means building a new pipeline.

use crate::config::{LoopSettings, RunConfig};
use crate::control::{LoopState, RunState};
use crate::error::{Result, ScanError};
use crate::frame::{preprocess, Frame};
use crate::inference::InferenceEngine;
use crate::io::{Display, FrameSink, FrameSource};
use crate::labels::LabelTable;
use crate::processing::{Annotator, Detection, DetectionDecoder, Suppressor};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Resources acquired during setup, handed to the pipeline as a unit.
pub struct PipelineParts {
    pub source: Box<dyn FrameSource>,
    pub engine: Box<dyn InferenceEngine>,
    pub sink: Box<dyn FrameSink>,
    pub display: Box<dyn Display>,
    pub labels: LabelTable,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndOfStream,
    /// A mid-stream read failed; handled like end of stream
    DecodeFailure,
    Quit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::DecodeFailure => write!(f, "decode failure"),
            StopReason::Quit => write!(f, "quit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub detections_accepted: u64,
    pub stop_reason: StopReason,
}

/// Result of processing one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Zero-based position of the frame in the video
    pub frame_index: u64,
    /// Candidates above the confidence threshold, before suppression
    pub candidates: usize,
    pub detections: Vec<Detection>,
    pub object_count: usize,
}

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Processed(FrameReport),
    /// Paused; no frame was pulled
    Idle,
    Stopped(StopReason),
}

pub struct Pipeline {
    config: RunConfig,
    settings: LoopSettings,
    source: Box<dyn FrameSource>,
    engine: Box<dyn InferenceEngine>,
    sink: Box<dyn FrameSink>,
    display: Box<dyn Display>,
    labels: LabelTable,
    decoder: DetectionDecoder,
    suppressor: Suppressor,
    annotator: Annotator,
    state: RunState,
    loop_state: LoopState,
    stop_reason: Option<StopReason>,
    frames_processed: u64,
    detections_accepted: u64,
    released: bool,
}

impl Pipeline {
    pub fn new(config: RunConfig, parts: PipelineParts, settings: LoopSettings) -> Result<Self> {
        config.validate()?;

        let decoder = DetectionDecoder::new(config.confidence_threshold);
        let suppressor = Suppressor::new(config.confidence_threshold, config.nms_threshold);
        let annotator = Annotator::from_config(&config);

        info!(
            "Pipeline ready: confidence > {}, nms overlap <= {}, {} labels",
            config.confidence_threshold,
            config.nms_threshold,
            parts.labels.len()
        );

        Ok(Self {
            config,
            settings,
            source: parts.source,
            engine: parts.engine,
            sink: parts.sink,
            display: parts.display,
            labels: parts.labels,
            decoder,
            suppressor,
            annotator,
            state: RunState::default(),
            loop_state: LoopState::Running,
            stop_reason: None,
            frames_processed: 0,
            detections_accepted: 0,
            released: false,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn loop_state(&self) -> LoopState {
        self.loop_state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Run every stage on one frame and emit it to both outputs.
    pub fn process_frame(&mut self, mut frame: Frame) -> Result<FrameReport> {
        let (width, height) = frame.dimensions();

        let blob = preprocess(&frame, self.engine.input_size())?;
        let raw = self.engine.infer(&blob)?;
        let candidates = self.decoder.decode(&raw, width, height);
        let detections = self.suppressor.apply(&candidates);

        self.annotator
            .annotate(&mut frame, &detections, &self.labels, &mut self.state);

        self.sink.write(&frame)?;
        self.display.show(&frame)?;

        let report = FrameReport {
            frame_index: self.frames_processed,
            candidates: candidates.len(),
            object_count: self.state.objects_in_current_frame,
            detections,
        };
        debug!(
            "Frame {}: {} candidates, {} accepted",
            report.frame_index, report.candidates, report.object_count
        );

        self.frames_processed += 1;
        self.detections_accepted += report.detections.len() as u64;
        Ok(report)
    }

    /// One loop iteration: pull and process a frame when running, then poll
    /// a single input event.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if let Some(reason) = self.stop_reason {
            return Ok(StepOutcome::Stopped(reason));
        }

        let mut report = None;
        if self.loop_state == LoopState::Running {
            match self.source.next_frame() {
                Ok(Some(frame)) => report = Some(self.process_frame(frame)?),
                Ok(None) => return Ok(self.stop(StopReason::EndOfStream)),
                Err(ScanError::Decode(msg)) => {
                    warn!("Frame read failed, ending run: {}", msg);
                    return Ok(self.stop(StopReason::DecodeFailure));
                }
                Err(e) => return Err(e),
            }
        }

        let key = self.display.poll_key(self.settings.poll_wait)?;
        if let Some(event) = key.and_then(|k| self.settings.keys.event_for(k)) {
            self.loop_state = self.loop_state.on_event(event);
            match self.loop_state {
                LoopState::Stopped => return Ok(self.stop(StopReason::Quit)),
                LoopState::Paused => info!("Paused after {} frames", self.frames_processed),
                LoopState::Running => info!("Resumed"),
            }
            self.state.paused = self.loop_state == LoopState::Paused;
        }

        Ok(match report {
            Some(report) => StepOutcome::Processed(report),
            None => StepOutcome::Idle,
        })
    }

    /// Drive the loop to completion. Resources are released on every path,
    /// including fatal errors.
    pub fn run(mut self) -> Result<RunSummary> {
        let outcome = loop {
            match self.step() {
                Ok(StepOutcome::Stopped(reason)) => break Ok(reason),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.release();

        match outcome {
            Ok(stop_reason) => {
                let summary = RunSummary {
                    frames_processed: self.frames_processed,
                    detections_accepted: self.detections_accepted,
                    stop_reason,
                };
                info!(
                    "Run finished ({}): {} frames, {} detections",
                    summary.stop_reason, summary.frames_processed, summary.detections_accepted
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Run aborted after {} frames: {}", self.frames_processed, e);
                Err(e)
            }
        }
    }

    /// Release the source, the sink and the display. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.loop_state = LoopState::Stopped;
        self.source.release();
        self.sink.release();
        self.display.close();
        debug!("Pipeline resources released");
    }

    fn stop(&mut self, reason: StopReason) -> StepOutcome {
        info!("Stopping: {}", reason);
        self.loop_state = LoopState::Stopped;
        self.stop_reason = Some(reason);
        StepOutcome::Stopped(reason)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.release();
    }
}
