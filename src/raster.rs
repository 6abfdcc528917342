use std::fmt;

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat};

use crate::error::DecodeError;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// What kind of upload the collaborator handed us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
}

impl MediaKind {
    /// Sniff the kind from the leading bytes. Returns `None` for anything we
    /// cannot fit.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        // Image magic sits at offset 0, so an image whose metadata quotes a
        // PDF header is still an image.
        if image::guess_format(bytes).is_ok() {
            return Some(MediaKind::Image);
        }
        // Some writers put junk before the header; readers accept it within 1KB.
        let head = &bytes[..bytes.len().min(1024)];
        head.windows(PDF_MAGIC.len())
            .any(|w| w == PDF_MAGIC)
            .then_some(MediaKind::Pdf)
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Pdf => write!(f, "PDF"),
        }
    }
}

/// A decoded pixel buffer. Dimensions are always positive.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: DynamicImage,
    format: Option<ImageFormat>,
}

impl RasterImage {
    /// Wrap an already decoded image.
    pub fn from_dynamic(pixels: DynamicImage) -> Result<Self, DecodeError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage { width, height });
        }
        Ok(Self {
            pixels,
            format: None,
        })
    }

    /// Decode any format the `image` crate understands.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
        let pixels = image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
            ImageError::Unsupported(_) => DecodeError::UnsupportedFormat,
            other => DecodeError::Corrupt(other.to_string()),
        })?;
        let mut raster = Self::from_dynamic(pixels)?;
        raster.format = Some(format);
        log::debug!(
            "Decoded {:?} image {}x{}",
            format,
            raster.width(),
            raster.height()
        );
        Ok(raster)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Format the source was decoded from, if it came from bytes.
    pub fn source_format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn sniffs_pdf_and_images() {
        assert_eq!(MediaKind::sniff(b"%PDF-1.7\n..."), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::sniff(&png_bytes(4, 4)), Some(MediaKind::Image));
        assert_eq!(MediaKind::sniff(b"hello world"), None);
    }

    #[test]
    fn jpeg_quoting_pdf_header_is_an_image() {
        let img = RgbImage::from_pixel(16, 16, Rgb([40, 80, 160]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        let jpeg = buf.into_inner();

        // Splice a COM segment in right after SOI.
        let comment = b"converted from %PDF-1.4 scan";
        let len = (comment.len() + 2) as u16;
        let mut bytes = jpeg[..2].to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(comment);
        bytes.extend_from_slice(&jpeg[2..]);

        assert_eq!(MediaKind::sniff(&bytes), Some(MediaKind::Image));
        let raster = RasterImage::decode(&bytes).unwrap();
        assert_eq!((raster.width(), raster.height()), (16, 16));
    }

    #[test]
    fn decodes_png() {
        let raster = RasterImage::decode(&png_bytes(12, 7)).unwrap();
        assert_eq!((raster.width(), raster.height()), (12, 7));
        assert_eq!(raster.source_format(), Some(ImageFormat::Png));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            RasterImage::decode(b"not an image"),
            Err(DecodeError::UnsupportedFormat)
        ));
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = png_bytes(32, 32);
        let err = RasterImage::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt(_)));
    }

    #[test]
    fn rejects_empty_image() {
        let err = RasterImage::from_dynamic(DynamicImage::new_rgb8(0, 5)).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyImage { width: 0, height: 5 }));
    }
}
