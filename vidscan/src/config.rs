//! Configuration for vidscan
//!
//! A run is driven by one immutable [`RunConfig`]. Front-ends hand over their
//! raw text fields as a [`ConfigForm`]; every field is parsed strictly and the
//! first bad one is reported as [`ScanError::ConfigParse`]. Changing settings
//! means building a new `RunConfig` and a new pipeline.

use crate::control::KeyBindings;
use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
pub const DEFAULT_FONT_SCALE: f32 = 1.0;
pub const DEFAULT_OUTPUT_PATH: &str = "output.avi";
pub const DEFAULT_OUTPUT_FPS: f64 = 20.0;
pub const DEFAULT_FOURCC: [char; 4] = ['X', 'V', 'I', 'D'];
pub const DEFAULT_WINDOW_TITLE: &str = "frame";

/// Box and label color, stored as RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoxColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BoxColor {
    pub const GREEN: BoxColor = BoxColor::new(0, 255, 0);
    pub const WHITE: BoxColor = BoxColor::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channel order used by frame buffers.
    pub fn to_bgr(self) -> [u8; 3] {
        [self.b, self.g, self.r]
    }
}

impl Default for BoxColor {
    fn default() -> Self {
        BoxColor::GREEN
    }
}

impl fmt::Display for BoxColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

impl FromStr for BoxColor {
    type Err = ScanError;

    /// Accepts `(r, g, b)`, `r,g,b` or `#rrggbb`.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let bad = |reason: &str| ScanError::ConfigParse(format!("box_color: '{}' {}", s, reason));

        if let Some(hex) = text.strip_prefix('#') {
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(bad("is not a #rrggbb color"));
            }
            let channel = |at: usize| {
                u8::from_str_radix(&hex[at..at + 2], 16).map_err(|_| bad("is not a #rrggbb color"))
            };
            return Ok(BoxColor::new(channel(0)?, channel(2)?, channel(4)?));
        }

        let inner = match (text.strip_prefix('('), text.ends_with(')')) {
            (Some(rest), true) => &rest[..rest.len() - 1],
            (None, false) => text,
            _ => return Err(bad("has unbalanced parentheses")),
        };

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(bad("must have exactly three channels"));
        }

        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            let value: i64 = part
                .parse()
                .map_err(|_| bad("has a channel that is not an integer"))?;
            *slot = u8::try_from(value).map_err(|_| bad("has a channel outside 0..=255"))?;
        }

        Ok(BoxColor::new(channels[0], channels[1], channels[2]))
    }
}

impl TryFrom<String> for BoxColor {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BoxColor> for String {
    fn from(color: BoxColor) -> Self {
        color.to_string()
    }
}

/// Immutable settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Minimum class confidence, in (0, 1]
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes are suppressed, in (0, 1]
    pub nms_threshold: f32,
    /// Draw class labels and confidence percentages next to boxes
    pub show_confidences: bool,
    pub box_color: BoxColor,
    /// Text scale, > 0
    pub font_scale: f32,
    pub input_path: PathBuf,
}

impl RunConfig {
    /// Build a config with default tuning for the given video.
    pub fn for_input(input_path: impl Into<PathBuf>) -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            show_confidences: true,
            box_color: BoxColor::default(),
            font_scale: DEFAULT_FONT_SCALE,
            input_path: input_path.into(),
        }
    }

    /// Parse the text fields of a front-end form.
    pub fn from_form(form: &ConfigForm) -> Result<Self> {
        let input_path = match form.input_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => {
                return Err(ScanError::ConfigParse(
                    "input_path: no video file selected".to_string(),
                ))
            }
        };

        let mut config = RunConfig::for_input(input_path);
        if let Some(text) = &form.confidence_threshold {
            config.confidence_threshold = parse_threshold("confidence_threshold", text)?;
        }
        if let Some(text) = &form.nms_threshold {
            config.nms_threshold = parse_threshold("nms_threshold", text)?;
        }
        if let Some(text) = &form.show_confidences {
            config.show_confidences = parse_flag("show_confidences", text)?;
        }
        if let Some(text) = &form.box_color {
            config.box_color = text.parse()?;
        }
        if let Some(text) = &form.font_scale {
            config.font_scale = parse_font_scale(text)?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        check_threshold("confidence_threshold", self.confidence_threshold)?;
        check_threshold("nms_threshold", self.nms_threshold)?;
        if !self.font_scale.is_finite() || self.font_scale <= 0.0 {
            return Err(ScanError::ConfigParse(format!(
                "font_scale: {} must be greater than 0",
                self.font_scale
            )));
        }
        if self.input_path.as_os_str().is_empty() {
            return Err(ScanError::ConfigParse("input_path: no video file selected".to_string()));
        }
        Ok(())
    }
}

/// Raw text fields as entered in a parameter form, a TOML file or on the
/// command line. `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigForm {
    pub confidence_threshold: Option<String>,
    pub nms_threshold: Option<String>,
    pub show_confidences: Option<String>,
    pub box_color: Option<String>,
    pub font_scale: Option<String>,
    pub input_path: Option<String>,
}

impl ConfigForm {
    /// Read a TOML configuration file. Every key is optional.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScanError::ConfigParse(format!("cannot read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| ScanError::ConfigParse(format!("invalid config file: {}", e)))?;
        Ok(file.into())
    }

    /// Fields set in `overrides` win over fields set here.
    pub fn merge(self, overrides: ConfigForm) -> ConfigForm {
        ConfigForm {
            confidence_threshold: overrides.confidence_threshold.or(self.confidence_threshold),
            nms_threshold: overrides.nms_threshold.or(self.nms_threshold),
            show_confidences: overrides.show_confidences.or(self.show_confidences),
            box_color: overrides.box_color.or(self.box_color),
            font_scale: overrides.font_scale.or(self.font_scale),
            input_path: overrides.input_path.or(self.input_path),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    show_confidences: Option<bool>,
    box_color: Option<String>,
    font_scale: Option<f32>,
    input_path: Option<PathBuf>,
}

impl From<ConfigFile> for ConfigForm {
    fn from(file: ConfigFile) -> Self {
        ConfigForm {
            confidence_threshold: file.confidence_threshold.map(|v| v.to_string()),
            nms_threshold: file.nms_threshold.map(|v| v.to_string()),
            show_confidences: file.show_confidences.map(|v| v.to_string()),
            box_color: file.box_color,
            font_scale: file.font_scale.map(|v| v.to_string()),
            input_path: file.input_path.map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

/// Where and how the annotated video is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub path: PathBuf,
    pub fps: f64,
    pub fourcc: [char; 4],
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            fps: DEFAULT_OUTPUT_FPS,
            fourcc: DEFAULT_FOURCC,
        }
    }
}

/// Interactive control settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub keys: KeyBindings,
    /// Upper bound on how long one input poll may block
    pub poll_wait: Duration,
    pub window_title: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            keys: KeyBindings::default(),
            poll_wait: Duration::from_millis(1),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

/// Parse a threshold in (0, 1].
pub fn parse_threshold(field: &str, text: &str) -> Result<f32> {
    let value: f32 = text
        .trim()
        .parse()
        .map_err(|_| ScanError::ConfigParse(format!("{}: '{}' is not a number", field, text)))?;
    check_threshold(field, value)?;
    Ok(value)
}

pub fn parse_font_scale(text: &str) -> Result<f32> {
    let value: f32 = text
        .trim()
        .parse()
        .map_err(|_| ScanError::ConfigParse(format!("font_scale: '{}' is not a number", text)))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ScanError::ConfigParse(format!(
            "font_scale: '{}' must be greater than 0",
            text
        )));
    }
    Ok(value)
}

pub fn parse_flag(field: &str, text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ScanError::ConfigParse(format!("{}: '{}' is not a boolean", field, text))),
    }
}

fn check_threshold(field: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(ScanError::ConfigParse(format!(
            "{}: {} must be in (0, 1]",
            field, value
        )));
    }
    Ok(())
}
