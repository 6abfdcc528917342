//! Per-document editing state owned by the collaborator.
//!
//! A session holds the selected file and the latest published fit. The UI
//! calls [`Session::select_file`] when a file is chosen and
//! [`Session::request_image_fit`] (after its own debounce) when the target
//! slider moves. Fit jobs are self-contained so they can run wherever the
//! host likes; [`Session::publish`] keeps only the newest one.

use std::sync::Arc;

use crate::encode::FrameEncoder;
use crate::error::{DecodeError, EncodeError, SessionError};
use crate::image_fit::{FitConfig, FitRequest, FitResult, ImageFitter};
use crate::pdf_fit::{page_geometry, PageGeometry, PdfConfig, PdfFitter};
use crate::raster::{MediaKind, RasterImage};
use crate::sequence::{LatestSlot, Ticket};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub fit: FitConfig,
    pub pdf: PdfConfig,
    /// Debounce window the collaborator should apply to slider input
    pub debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fit: FitConfig::default(),
            pdf: PdfConfig::default(),
            debounce_ms: 300,
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Image(Arc<RasterImage>),
    Pdf {
        bytes: Arc<Vec<u8>>,
        pages: Vec<PageGeometry>,
    },
}

/// What the UI shows about the selected file.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: String,
    pub kind: MediaKind,
    pub original_kb: f64,
    /// Pixel dimensions for images, first page in points for PDFs
    pub width: u32,
    pub height: u32,
    pub page_count: usize,
}

/// The parameter a published result was produced with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitParameter {
    TargetKb(u32),
    Scale(f32),
}

#[derive(Debug, Clone)]
pub struct Published {
    pub parameter: FitParameter,
    pub result: Arc<FitResult>,
}

/// A file offered for download.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub mime: &'static str,
    pub result: Arc<FitResult>,
}

impl Download {
    pub fn bytes(&self) -> &[u8] {
        &self.result.encoded_bytes
    }
}

/// A single image fit, detached from the session.
#[derive(Debug, Clone)]
pub struct FitJob {
    ticket: Ticket,
    request: FitRequest,
}

impl FitJob {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn target_kb(&self) -> u32 {
        self.request.target_kb()
    }

    pub fn run<E: FrameEncoder>(&self, fitter: &ImageFitter<E>) -> Result<FitOutcome, EncodeError> {
        let result = fitter.fit(&self.request)?;
        Ok(FitOutcome {
            ticket: self.ticket,
            parameter: FitParameter::TargetKb(self.request.target_kb()),
            result,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub ticket: Ticket,
    pub parameter: FitParameter,
    pub result: FitResult,
}

pub struct Session {
    config: SessionConfig,
    image_fitter: ImageFitter,
    pdf_fitter: PdfFitter,
    name: String,
    source: Option<Source>,
    original_len: usize,
    latest: LatestSlot<Published>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let image_fitter = ImageFitter::new(config.fit.clone())?;
        let pdf_fitter = PdfFitter::new(config.pdf.clone());
        Ok(Self {
            config,
            image_fitter,
            pdf_fitter,
            name: String::new(),
            source: None,
            original_len: 0,
            latest: LatestSlot::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn debounce_ms(&self) -> u64 {
        self.config.debounce_ms
    }

    pub fn image_fitter(&self) -> &ImageFitter {
        &self.image_fitter
    }

    /// Replace the working file. On error the previous file and result stay.
    pub fn select_file(&mut self, name: &str, bytes: Vec<u8>) -> Result<SourceInfo, SessionError> {
        let kind = MediaKind::sniff(&bytes).ok_or(DecodeError::UnsupportedFormat)?;
        let original_len = bytes.len();
        let source = match kind {
            MediaKind::Image => Source::Image(Arc::new(RasterImage::decode(&bytes)?)),
            MediaKind::Pdf => {
                let pages = page_geometry(&bytes)?;
                Source::Pdf {
                    bytes: Arc::new(bytes),
                    pages,
                }
            }
        };

        log::info!("Selected {} '{}' ({} bytes)", kind, name, original_len);
        self.name = name.to_string();
        self.original_len = original_len;
        self.source = Some(source);
        self.latest.reset();
        self.source_info().ok_or(SessionError::NoSource)
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        let source = self.source.as_ref()?;
        let (kind, width, height, page_count) = match source {
            Source::Image(raster) => (MediaKind::Image, raster.width(), raster.height(), 1),
            Source::Pdf { pages, .. } => {
                let first = pages.first().copied().unwrap_or(PageGeometry {
                    width: 0.0,
                    height: 0.0,
                });
                (
                    MediaKind::Pdf,
                    first.width.round() as u32,
                    first.height.round() as u32,
                    pages.len(),
                )
            }
        };
        Some(SourceInfo {
            name: self.name.clone(),
            kind,
            original_kb: self.original_len as f64 / 1024.0,
            width,
            height,
            page_count,
        })
    }

    /// Start an image fit for a new target. Supersedes any earlier job.
    pub fn request_image_fit(&self, target_kb: u32) -> Result<FitJob, SessionError> {
        let raster = match &self.source {
            Some(Source::Image(raster)) => Arc::clone(raster),
            Some(Source::Pdf { .. }) => {
                return Err(SessionError::WrongMode(MediaKind::Pdf, MediaKind::Image))
            }
            None => return Err(SessionError::NoSource),
        };
        let request = FitRequest::new(raster, target_kb)?;
        let ticket = self.latest.issue();
        log::debug!("Issued fit #{} for {} KB", ticket.value(), target_kb);
        Ok(FitJob { ticket, request })
    }

    /// Offer a finished job's result. Returns false if a newer job exists.
    pub fn publish(&self, outcome: FitOutcome) -> bool {
        self.latest.publish(
            outcome.ticket,
            Published {
                parameter: outcome.parameter,
                result: Arc::new(outcome.result),
            },
        )
    }

    /// Request, run and publish an image fit in one call.
    pub fn fit_image(&self, target_kb: u32) -> Result<Arc<FitResult>, SessionError> {
        let job = self.request_image_fit(target_kb)?;
        let outcome = job.run(&self.image_fitter)?;
        let result = Arc::new(outcome.result);
        self.latest.publish(
            job.ticket(),
            Published {
                parameter: outcome.parameter,
                result: Arc::clone(&result),
            },
        );
        Ok(result)
    }

    /// Scale the selected PDF. `None` uses the configured scale factor.
    pub fn fit_pdf(&self, scale_factor: Option<f32>) -> Result<Arc<FitResult>, SessionError> {
        let bytes = match &self.source {
            Some(Source::Pdf { bytes, .. }) => Arc::clone(bytes),
            Some(Source::Image(_)) => {
                return Err(SessionError::WrongMode(MediaKind::Image, MediaKind::Pdf))
            }
            None => return Err(SessionError::NoSource),
        };
        let scale = scale_factor.unwrap_or(self.config.pdf.scale_factor);
        let ticket = self.latest.issue();
        let result = Arc::new(self.pdf_fitter.fit(&bytes, scale)?);
        self.latest.publish(
            ticket,
            Published {
                parameter: FitParameter::Scale(scale),
                result: Arc::clone(&result),
            },
        );
        Ok(result)
    }

    pub fn current(&self) -> Option<Published> {
        self.latest.get()
    }

    pub fn download(&self) -> Option<Download> {
        let published = self.current()?;
        Some(Download {
            filename: download_name(published.parameter),
            mime: published.result.kind.mime(),
            result: published.result,
        })
    }
}

/// Suggested filename for a result, derived from the parameter that made it.
pub fn download_name(parameter: FitParameter) -> String {
    match parameter {
        FitParameter::TargetKb(kb) => format!("swift-optimized-{}kb.jpg", kb),
        FitParameter::Scale(scale) => {
            format!("compressed-document-{}pct.pdf", (scale * 100.0).round() as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_names_encode_parameter() {
        assert_eq!(
            download_name(FitParameter::TargetKb(150)),
            "swift-optimized-150kb.jpg"
        );
        assert_eq!(
            download_name(FitParameter::Scale(0.75)),
            "compressed-document-75pct.pdf"
        );
    }

    #[test]
    fn fit_without_source_fails() {
        let session = Session::new(SessionConfig::default()).unwrap();
        assert!(matches!(
            session.request_image_fit(100),
            Err(SessionError::NoSource)
        ));
        assert!(matches!(session.fit_pdf(None), Err(SessionError::NoSource)));
        assert!(session.download().is_none());
    }

    #[test]
    fn unknown_upload_is_rejected() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        assert!(matches!(
            session.select_file("notes.txt", b"plain text".to_vec()),
            Err(SessionError::Decode(_))
        ));
        assert!(session.source_info().is_none());
    }
}
