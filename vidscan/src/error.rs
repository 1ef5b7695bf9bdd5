//! Error types for vidscan

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// Bad numeric, color or file configuration. The run never starts.
    #[error("Config parse error: {0}")]
    ConfigParse(String),

    /// Video or model artifact could not be opened. Fatal before the loop.
    #[error("IO error: {0}")]
    Io(String),

    /// A frame read failed mid-stream. The loop treats this as end of stream.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The persisted output could not be opened or written. Always fatal.
    #[error("Output write error: {0}")]
    OutputWrite(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(feature = "opencv")]
impl From<opencv::Error> for ScanError {
    fn from(err: opencv::Error) -> Self {
        ScanError::OpenCv(err.message)
    }
}

impl ScanError {
    /// Setup errors abort before the control loop; this reports whether an
    /// error belongs to that class.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            ScanError::ConfigParse(_) | ScanError::Io(_) | ScanError::File(_)
        )
    }
}
