use thiserror::Error;

/// The uploaded bytes could not be turned into a raster image.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Corrupt(String),

    #[error("Image has zero width or height ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// The uploaded bytes could not be processed as a PDF.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to load PDF: {0}")]
    Malformed(String),

    #[error("PDF is encrypted or password protected")]
    Encrypted,

    #[error("PDF has no pages")]
    NoPages,

    #[error("Scale factor must be in (0, 1], got {0}")]
    InvalidScale(f32),

    #[error("Failed to save PDF: {0}")]
    Save(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Shrink factor must be in (0, 1), got {0}")]
    InvalidShrink(f32),

    #[error("Iteration budget must be at least 1")]
    NoIterations,

    #[error("Target size must be at least 1 KB")]
    InvalidTarget,
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Errors surfaced to the collaborator driving a [`crate::Session`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("No file has been selected")]
    NoSource,

    #[error("Selected file is a {0}, not a {1}")]
    WrongMode(crate::raster::MediaKind, crate::raster::MediaKind),
}
