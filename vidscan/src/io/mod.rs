//! Frame sources, output sinks and the display surface

#[cfg(feature = "opencv")]
mod opencv;

#[cfg(feature = "opencv")]
pub use self::opencv::{VideoFileSink, VideoFileSource, WindowDisplay};

use crate::error::Result;
use crate::frame::Frame;
use std::time::Duration;

/// Sequential decoder over one video.
///
/// Frames come out in arrival order. `Ok(None)` marks end of stream; an
/// `Err(ScanError::Decode)` is a failed read, which the control loop also
/// treats as the end. Restarting means opening a new source.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// `(width, height)` shared by every frame of the video.
    fn frame_size(&self) -> (u32, u32);

    /// Release the underlying decoder. Must be idempotent.
    fn release(&mut self) {}
}

/// Persisted output container.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close. Must be idempotent.
    fn release(&mut self) {}
}

/// Live display surface, which is also where interactive input arrives.
pub trait Display {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Wait at most `wait` for one key press.
    fn poll_key(&mut self, wait: Duration) -> Result<Option<i32>>;

    /// Must be idempotent.
    fn close(&mut self) {}
}

/// Display for unattended runs: shows nothing and never reports a key.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn poll_key(&mut self, _wait: Duration) -> Result<Option<i32>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_display_is_silent() {
        let mut display = NullDisplay;
        assert!(display.show(&Frame::new(2, 2)).is_ok());
        assert_eq!(display.poll_key(Duration::from_millis(1)).unwrap(), None);
        display.close();
    }
}
