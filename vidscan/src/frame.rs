//! Frame buffers and inference preprocessing

use crate::error::{Result, ScanError};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Decoded video frame: packed BGR8, row-major.
///
/// Frames are moved through the pipeline stages and dropped once both sinks
/// have received them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0])
    }

    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * Self::CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&bgr);
        }
        Self { width, height, data }
    }

    /// Wrap decoded bytes, checking they match the dimensions.
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ScanError::Decode(format!("empty frame {}x{}", width, height)));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(Self::CHANNELS))
            .ok_or_else(|| ScanError::Decode("frame size overflow".to_string()))?;
        if data.len() != expected {
            return Err(ScanError::Decode(format!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * Self::CHANNELS)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 3]> {
        self.offset(x, y)
            .map(|i| [self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Out-of-bounds writes are clipped.
    pub fn put_pixel(&mut self, x: i32, y: i32, bgr: [u8; 3]) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + Self::CHANNELS].copy_from_slice(&bgr);
        }
    }

    /// Fill the inclusive rectangle `(x0, y0)..=(x1, y1)`, clipped to the frame.
    pub fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, bgr: [u8; 3]) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let max_x = self.width as i32 - 1;
        let max_y = self.height as i32 - 1;
        let (left, right) = (x0.min(x1).max(0), x0.max(x1).min(max_x));
        let (top, bottom) = (y0.min(y1).max(0), y0.max(y1).min(max_y));
        if left > right || top > bottom {
            return;
        }
        for y in top..=bottom {
            for x in left..=right {
                self.put_pixel(x, y, bgr);
            }
        }
    }

    /// RGB copy of the frame.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
            Rgb([self.data[i + 2], self.data[i + 1], self.data[i]])
        })
    }
}

/// Planar float tensor laid out as `[1, 3, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Blob {
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Scale applied to 8-bit channels before inference.
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// Turn a frame into the detector's input tensor: swap to RGB, stretch to
/// `input_size` without cropping, scale to [0, 1], reorder to CHW.
pub fn preprocess(frame: &Frame, input_size: (u32, u32)) -> Result<Blob> {
    let (target_width, target_height) = input_size;
    if target_width == 0 || target_height == 0 {
        return Err(ScanError::Model("Input dimensions cannot be zero".to_string()));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ScanError::Decode("cannot preprocess an empty frame".to_string()));
    }

    let rgb = frame.to_rgb_image();
    let resized = if frame.dimensions() == input_size {
        rgb
    } else {
        imageops::resize(&rgb, target_width, target_height, FilterType::Triangle)
    };

    let plane = target_width as usize * target_height as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (idx, pixel) in resized.pixels().enumerate() {
        data[idx] = pixel[0] as f32 * PIXEL_SCALE;
        data[plane + idx] = pixel[1] as f32 * PIXEL_SCALE;
        data[2 * plane + idx] = pixel[2] as f32 * PIXEL_SCALE;
    }

    Ok(Blob {
        width: target_width,
        height: target_height,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bgr_checks_length() {
        assert!(Frame::from_bgr(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::from_bgr(2, 2, vec![0; 11]),
            Err(ScanError::Decode(_))
        ));
        assert!(Frame::from_bgr(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_pixel_access_is_bgr_and_clipped() {
        let mut frame = Frame::new(4, 3);
        frame.put_pixel(1, 2, [10, 20, 30]);
        frame.put_pixel(-1, 0, [1, 1, 1]);
        frame.put_pixel(4, 0, [1, 1, 1]);
        assert_eq!(frame.pixel(1, 2), Some([10, 20, 30]));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(frame.as_bytes().iter().filter(|&&b| b == 1).count(), 0);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut frame = Frame::new(5, 5);
        frame.fill_rect(3, 3, 10, 10, [255, 255, 255]);
        assert_eq!(frame.pixel(4, 4), Some([255, 255, 255]));
        assert_eq!(frame.pixel(2, 2), Some([0, 0, 0]));

        let mut frame = Frame::new(5, 5);
        frame.fill_rect(-10, -10, -5, -5, [255, 255, 255]);
        assert!(frame.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_to_rgb_swaps_channels() {
        let frame = Frame::filled(2, 1, [1, 2, 3]);
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(1, 0).0, [3, 2, 1]);
    }

    #[test]
    fn test_preprocess_layout_and_scale() {
        // Pure blue in BGR lands in the third (B) plane after the RGB swap.
        let frame = Frame::filled(8, 4, [255, 0, 0]);
        let blob = preprocess(&frame, (4, 4)).unwrap();
        assert_eq!(blob.shape(), [1, 3, 4, 4]);
        let data = blob.as_slice();
        assert_eq!(data.len(), 48);
        assert!(data[..16].iter().all(|&v| v == 0.0));
        assert!(data[16..32].iter().all(|&v| v == 0.0));
        assert!(data[32..].iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_preprocess_rejects_zero_input() {
        let frame = Frame::new(4, 4);
        assert!(preprocess(&frame, (0, 224)).is_err());
    }
}
