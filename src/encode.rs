use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, RgbImage};

use crate::error::EncodeError;

/// Largest width or height a baseline JPEG frame header can carry.
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// Lossy single-frame encoder used by the image fitter.
///
/// `quality` is on the 1-100 JPEG scale.
pub trait FrameEncoder {
    fn encode(&self, frame: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError>;
}

/// Baseline JPEG through the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegFrameEncoder;

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder.encode(
            frame.as_raw(),
            frame.width(),
            frame.height(),
            ColorType::Rgb8.into(),
        )?;
        Ok(buffer)
    }
}

/// How the achieved size is measured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SizeEstimate {
    /// Raw encoded byte length.
    #[default]
    Binary,
    /// Length of the `data:` URL the browser preview uses, corrected for
    /// base64 overhead (`len * 0.75`).
    DataUrl,
}

impl SizeEstimate {
    pub fn kilobytes(self, encoded: &[u8]) -> f64 {
        match self {
            SizeEstimate::Binary => encoded.len() as f64 / 1024.0,
            SizeEstimate::DataUrl => data_url_len(encoded) as f64 * 0.75 / 1024.0,
        }
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn data_url_len(bytes: &[u8]) -> usize {
    const PREFIX: usize = "data:image/jpeg;base64,".len();
    PREFIX + bytes.len().div_ceil(3) * 4
}

/// Draw `source` into a fresh `width`x`height` RGB buffer.
///
/// Transparent pixels end up black, the same as exporting a canvas to JPEG.
pub fn render_frame(source: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    let rgba = if source.width() == width && source.height() == height {
        source.to_rgba8()
    } else {
        image::imageops::resize(source, width, height, filter)
    };

    let mut frame = RgbImage::new(width, height);
    for (dst, src) in frame.pixels_mut().zip(rgba.pixels()) {
        let alpha = src[3] as u16;
        for c in 0..3 {
            dst[c] = ((src[c] as u16 * alpha + 127) / 255) as u8;
        }
    }
    frame
}
