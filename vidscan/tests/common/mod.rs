//! In-memory stand-ins for the video, model and window back-ends

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use vidscan::config::{LoopSettings, RunConfig};
use vidscan::error::{Result, ScanError};
use vidscan::frame::{Blob, Frame};
use vidscan::inference::{InferenceEngine, OutputLayer, RawOutput};
use vidscan::io::{Display, FrameSink, FrameSource};
use vidscan::labels::LabelTable;
use vidscan::pipeline::{Pipeline, PipelineParts};

/// Everything the fakes observed during a run.
#[derive(Debug, Default)]
pub struct Recorder {
    pub frames_pulled: usize,
    pub source_released: bool,
    pub written: Vec<Frame>,
    pub sink_released: bool,
    pub shown: usize,
    pub polls: usize,
    pub display_closed: bool,
    pub blob_shapes: Vec<[usize; 4]>,
}

pub type Shared = Rc<RefCell<Recorder>>;

pub enum SourceItem {
    Frame(Frame),
    Fail(ScanError),
}

pub struct FakeSource {
    items: VecDeque<SourceItem>,
    size: (u32, u32),
    log: Shared,
}

impl FakeSource {
    pub fn new(items: Vec<SourceItem>, size: (u32, u32), log: Shared) -> Self {
        Self {
            items: items.into(),
            size,
            log,
        }
    }

    pub fn frames(frames: Vec<Frame>, log: Shared) -> Self {
        let size = frames.first().map(Frame::dimensions).unwrap_or((0, 0));
        Self::new(frames.into_iter().map(SourceItem::Frame).collect(), size, log)
    }
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.items.pop_front() {
            Some(SourceItem::Frame(frame)) => {
                self.log.borrow_mut().frames_pulled += 1;
                Ok(Some(frame))
            }
            Some(SourceItem::Fail(err)) => Err(err),
            None => Ok(None),
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        self.size
    }

    fn release(&mut self) {
        self.log.borrow_mut().source_released = true;
    }
}

/// Replays one prepared output per call; empty once the script runs out.
pub struct ScriptedEngine {
    outputs: VecDeque<RawOutput>,
    input_size: (u32, u32),
    log: Shared,
}

impl ScriptedEngine {
    pub fn new(outputs: Vec<RawOutput>, log: Shared) -> Self {
        Self {
            outputs: outputs.into(),
            input_size: (32, 32),
            log,
        }
    }
}

impl InferenceEngine for ScriptedEngine {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, blob: &Blob) -> Result<RawOutput> {
        self.log.borrow_mut().blob_shapes.push(blob.shape());
        Ok(self.outputs.pop_front().unwrap_or_default())
    }
}

pub struct MemorySink {
    fail_at: Option<usize>,
    log: Shared,
}

impl MemorySink {
    pub fn new(log: Shared) -> Self {
        Self { fail_at: None, log }
    }

    /// Fails the write of the frame at `index`.
    pub fn failing_at(index: usize, log: Shared) -> Self {
        Self {
            fail_at: Some(index),
            log,
        }
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let mut log = self.log.borrow_mut();
        if self.fail_at == Some(log.written.len()) {
            return Err(ScanError::OutputWrite("disk full".to_string()));
        }
        log.written.push(frame.clone());
        Ok(())
    }

    fn release(&mut self) {
        self.log.borrow_mut().sink_released = true;
    }
}

/// Display that answers polls from a key script, then reports nothing.
pub struct ScriptedDisplay {
    keys: VecDeque<Option<i32>>,
    log: Shared,
}

impl ScriptedDisplay {
    pub fn new(keys: Vec<Option<i32>>, log: Shared) -> Self {
        Self {
            keys: keys.into(),
            log,
        }
    }
}

impl Display for ScriptedDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<()> {
        self.log.borrow_mut().shown += 1;
        Ok(())
    }

    fn poll_key(&mut self, _wait: Duration) -> Result<Option<i32>> {
        self.log.borrow_mut().polls += 1;
        Ok(self.keys.pop_front().flatten())
    }

    fn close(&mut self) {
        self.log.borrow_mut().display_closed = true;
    }
}

/// One raw cell: geometry normalized to the inference input, then scores.
pub fn cell(cx: f32, cy: f32, w: f32, h: f32, scores: &[f32]) -> Vec<f32> {
    let mut cell = vec![cx, cy, w, h, 1.0];
    cell.extend_from_slice(scores);
    cell
}

pub fn raw_output(cells: &[Vec<f32>]) -> RawOutput {
    RawOutput::new(vec![OutputLayer::from_cells(cells).unwrap()])
}

pub fn labels() -> LabelTable {
    LabelTable::from_names(["person", "car"])
}

pub fn build(
    source: FakeSource,
    engine: ScriptedEngine,
    sink: MemorySink,
    display: ScriptedDisplay,
    labels: LabelTable,
) -> Pipeline {
    let parts = PipelineParts {
        source: Box::new(source),
        engine: Box::new(engine),
        sink: Box::new(sink),
        display: Box::new(display),
        labels,
    };
    Pipeline::new(RunConfig::for_input("synthetic.avi"), parts, LoopSettings::default()).unwrap()
}
