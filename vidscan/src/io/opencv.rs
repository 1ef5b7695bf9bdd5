//! OpenCV-backed video file decoding, encoding and window display

use super::{Display, FrameSink, FrameSource};
use crate::config::OutputSettings;
use crate::error::{Result, ScanError};
use crate::frame::Frame;
use opencv::{
    core::{Mat, Scalar, Size, CV_8UC1, CV_8UC3, CV_8UC4},
    highgui, imgproc,
    prelude::*,
    videoio::{
        VideoCapture, VideoWriter, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH,
    },
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Video file decoder
pub struct VideoFileSource {
    capture: Option<VideoCapture>,
    path: PathBuf,
    frame_size: (u32, u32),
    frames_read: u64,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ScanError::Io(format!("Video file not found: {:?}", path)));
        }

        let capture = VideoCapture::from_file(&path.to_string_lossy(), CAP_ANY)
            .map_err(|e| ScanError::Io(format!("Failed to open video {:?}: {}", path, e)))?;

        if !capture
            .is_opened()
            .map_err(|e| ScanError::Io(format!("Video {:?} not opened: {}", path, e)))?
        {
            return Err(ScanError::Io(format!("Video {:?} failed to open", path)));
        }

        let width = capture.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let height = capture.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        let fps = capture.get(CAP_PROP_FPS).unwrap_or(0.0);

        if width <= 0.0 || height <= 0.0 {
            return Err(ScanError::Io(format!("Video {:?} reports no frame size", path)));
        }

        info!("Video {:?} opened at {}x{} @ {:.1}fps", path, width, height, fps);

        Ok(Self {
            capture: Some(capture),
            path: path.to_path_buf(),
            frame_size: (width as u32, height as u32),
            frames_read: 0,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let capture = match self.capture.as_mut() {
            Some(capture) => capture,
            None => return Ok(None),
        };

        let mut mat = Mat::default();
        let grabbed = capture
            .read(&mut mat)
            .map_err(|e| {
                ScanError::Decode(format!("Failed to read frame {}: {}", self.frames_read, e))
            })?;
        if !grabbed || mat.empty() {
            debug!("End of {:?} after {} frames", self.path, self.frames_read);
            return Ok(None);
        }

        let frame = mat_to_frame(&mat)?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!("Failed to release video {:?}: {}", self.path, e);
            }
            info!("Video {:?} released", self.path);
        }
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        FrameSource::release(self);
    }
}

/// Encoded video container on disk
pub struct VideoFileSink {
    writer: Option<VideoWriter>,
    path: PathBuf,
    frame_size: (u32, u32),
    frames_written: u64,
}

impl VideoFileSink {
    /// Open the output container. Failing here aborts the run.
    pub fn open(settings: &OutputSettings, frame_size: (u32, u32)) -> Result<Self> {
        let [a, b, c, d] = settings.fourcc;
        let fourcc = VideoWriter::fourcc(a, b, c, d).map_err(|e| {
            ScanError::OutputWrite(format!("Invalid fourcc {:?}: {}", settings.fourcc, e))
        })?;

        let writer = VideoWriter::new(
            &settings.path.to_string_lossy(),
            fourcc,
            settings.fps,
            Size::new(frame_size.0 as i32, frame_size.1 as i32),
            true,
        )
        .map_err(|e| {
            ScanError::OutputWrite(format!("Failed to create {:?}: {}", settings.path, e))
        })?;

        let opened = writer.is_opened().map_err(|e| {
            ScanError::OutputWrite(format!("Writer {:?} not opened: {}", settings.path, e))
        })?;
        if !opened {
            return Err(ScanError::OutputWrite(format!(
                "Failed to open {:?} for writing",
                settings.path
            )));
        }

        info!(
            "Output writer opened at {:?} ({}x{} @ {}fps)",
            settings.path, frame_size.0, frame_size.1, settings.fps
        );

        Ok(Self {
            writer: Some(writer),
            path: settings.path.clone(),
            frame_size,
            frames_written: 0,
        })
    }
}

impl FrameSink for VideoFileSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != self.frame_size {
            return Err(ScanError::OutputWrite(format!(
                "Frame is {}x{}, output expects {}x{}",
                frame.width(),
                frame.height(),
                self.frame_size.0,
                self.frame_size.1
            )));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ScanError::OutputWrite(format!("{:?} already released", self.path)))?;
        let mat = frame_to_mat(frame)?;
        writer
            .write(&mat)
            .map_err(|e| {
                ScanError::OutputWrite(format!("Failed to write {:?}: {}", self.path, e))
            })?;
        self.frames_written += 1;
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.release() {
                warn!("Failed to finalize {:?}: {}", self.path, e);
            }
            info!("Output {:?} closed after {} frames", self.path, self.frames_written);
        }
    }
}

impl Drop for VideoFileSink {
    fn drop(&mut self) {
        FrameSink::release(self);
    }
}

/// HighGUI window; key presses are read through the same window.
pub struct WindowDisplay {
    title: String,
    open: bool,
}

impl WindowDisplay {
    pub fn open(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .map_err(|e| ScanError::Display(format!("Failed to open window '{}': {}", title, e)))?;
        Ok(Self {
            title: title.to_string(),
            open: true,
        })
    }
}

impl Display for WindowDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        highgui::imshow(&self.title, &mat)
            .map_err(|e| ScanError::Display(format!("Failed to show frame: {}", e)))
    }

    fn poll_key(&mut self, wait: Duration) -> Result<Option<i32>> {
        // wait_key(0) blocks forever.
        let millis = wait.as_millis().clamp(1, i32::MAX as u128) as i32;
        let key = highgui::wait_key(millis)
            .map_err(|e| ScanError::Display(format!("Failed to poll keyboard: {}", e)))?;
        Ok(if key < 0 { None } else { Some(key & 0xFF) })
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = highgui::destroy_window(&self.title) {
                warn!("Failed to close window '{}': {}", self.title, e);
            }
        }
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

/// Conversion failures surface as `Decode` so the loop ends cleanly.
fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    let mut bgr = Mat::default();
    let source = match mat.typ() {
        t if t == CV_8UC3 => mat,
        t if t == CV_8UC1 => {
            imgproc::cvt_color(mat, &mut bgr, imgproc::COLOR_GRAY2BGR, 0)
                .map_err(|e| ScanError::Decode(format!("Failed to convert gray frame: {}", e)))?;
            &bgr
        }
        t if t == CV_8UC4 => {
            imgproc::cvt_color(mat, &mut bgr, imgproc::COLOR_BGRA2BGR, 0)
                .map_err(|e| ScanError::Decode(format!("Failed to convert BGRA frame: {}", e)))?;
            &bgr
        }
        other => {
            return Err(ScanError::Decode(format!("Unsupported pixel type {}", other)));
        }
    };

    let continuous;
    let source = if source.is_continuous() {
        source
    } else {
        continuous = source
            .try_clone()
            .map_err(|e| ScanError::Decode(format!("Failed to copy frame: {}", e)))?;
        &continuous
    };

    let data = source
        .data_bytes()
        .map_err(|e| ScanError::Decode(format!("Failed to access frame data: {}", e)))?
        .to_vec();
    Frame::from_bgr(source.cols() as u32, source.rows() as u32, data)
}

fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(frame.as_bytes());
    Ok(mat)
}
