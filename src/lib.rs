//! Client-side size fitting for images and PDFs.
//!
//! Images are re-encoded as JPEG with falling quality and then falling
//! dimensions until they fit a target size. PDFs get a single page-geometry
//! scale pass. The same code runs natively and as WebAssembly.

pub mod encode;
pub mod error;
pub mod image_fit;
pub mod pdf_fit;
pub mod raster;
pub mod sequence;
pub mod session;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use encode::{FrameEncoder, JpegFrameEncoder, SizeEstimate, MAX_JPEG_DIMENSION};
pub use error::{ConfigError, DecodeError, DocumentError, EncodeError, SessionError};
pub use image_fit::{FitConfig, FitRequest, FitResult, ImageFitter};
pub use pdf_fit::{page_geometry, PageGeometry, PdfConfig, PdfFitter};
pub use raster::{MediaKind, RasterImage};
pub use sequence::{LatestSlot, Sequencer, Ticket};
pub use session::{Download, FitJob, FitOutcome, FitParameter, Session, SessionConfig, SourceInfo};
