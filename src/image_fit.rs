//! Iterative size fitting for raster images.
//!
//! Each round re-renders the original pixels at the current dimensions and
//! encodes them as JPEG. Quality drops first; once it reaches the floor the
//! dimensions shrink instead. The loop stops on the first encode that fits the
//! target or when the iteration budget runs out.

use std::sync::Arc;

use image::imageops::FilterType;

use crate::encode::{
    data_url, render_frame, FrameEncoder, JpegFrameEncoder, SizeEstimate, MAX_JPEG_DIMENSION,
};
use crate::error::{ConfigError, EncodeError};
use crate::raster::{MediaKind, RasterImage};

/// Tunables for the image search loop.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// JPEG quality of the first attempt (1-100)
    pub initial_quality: u8,
    /// Amount subtracted from quality per failed round
    pub quality_step: u8,
    /// Quality above which we keep lowering quality instead of shrinking
    pub quality_floor: u8,
    /// Factor applied to width and height once quality is at the floor
    pub shrink_factor: f32,
    pub max_iterations: u32,
    pub size_estimate: SizeEstimate,
    pub filter: FilterType,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            initial_quality: 90,
            quality_step: 15,
            quality_floor: 40,
            shrink_factor: 0.85,
            max_iterations: 8,
            size_estimate: SizeEstimate::Binary,
            filter: FilterType::Triangle,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.initial_quality) {
            return Err(ConfigError::InvalidQuality(self.initial_quality));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(ConfigError::InvalidShrink(self.shrink_factor));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        Ok(())
    }
}

/// One fit operation's input. The source is shared, never mutated.
#[derive(Debug, Clone)]
pub struct FitRequest {
    source: Arc<RasterImage>,
    target_kb: u32,
}

impl FitRequest {
    pub fn new(source: Arc<RasterImage>, target_kb: u32) -> Result<Self, ConfigError> {
        if target_kb == 0 {
            return Err(ConfigError::InvalidTarget);
        }
        Ok(Self { source, target_kb })
    }

    pub fn source(&self) -> &Arc<RasterImage> {
        &self.source
    }

    pub fn target_kb(&self) -> u32 {
        self.target_kb
    }
}

/// Outcome of a fit. `met_goal == false` is a normal result, not an error.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub encoded_bytes: Vec<u8>,
    pub achieved_kb: f64,
    pub met_goal: bool,
    pub iterations: u32,
    /// JPEG quality of the returned encode; `None` when nothing was re-encoded
    pub quality: Option<u8>,
    /// Output dimensions (pixels for images, points of the first page for PDFs)
    pub width: u32,
    pub height: u32,
    pub kind: MediaKind,
}

impl FitResult {
    /// Preview URL for the encoded bytes.
    pub fn to_data_url(&self) -> String {
        data_url(self.kind.mime(), &self.encoded_bytes)
    }
}

/// Quality/dimension state carried between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchState {
    quality: u8,
    width: u32,
    height: u32,
}

impl SearchState {
    fn next(self, config: &FitConfig) -> Self {
        if self.quality > config.quality_floor {
            Self {
                quality: self.quality.saturating_sub(config.quality_step).max(1),
                ..self
            }
        } else {
            Self {
                width: shrink(self.width, config.shrink_factor),
                height: shrink(self.height, config.shrink_factor),
                ..self
            }
        }
    }
}

fn shrink(dim: u32, factor: f32) -> u32 {
    ((dim as f64 * factor as f64).floor() as u32).max(1)
}

/// Scale `width`x`height` down so neither side exceeds `max`, keeping the
/// aspect ratio.
fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let ratio = max as f64 / longest as f64;
    let scale = |dim: u32| ((dim as f64 * ratio).round() as u32).clamp(1, max);
    (scale(width), scale(height))
}

pub struct ImageFitter<E = JpegFrameEncoder> {
    config: FitConfig,
    encoder: E,
}

impl ImageFitter<JpegFrameEncoder> {
    pub fn new(config: FitConfig) -> Result<Self, ConfigError> {
        Self::with_encoder(config, JpegFrameEncoder)
    }
}

impl Default for ImageFitter<JpegFrameEncoder> {
    fn default() -> Self {
        Self {
            config: FitConfig::default(),
            encoder: JpegFrameEncoder,
        }
    }
}

impl<E: FrameEncoder> ImageFitter<E> {
    pub fn with_encoder(config: FitConfig, encoder: E) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, encoder })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn fit(&self, request: &FitRequest) -> Result<FitResult, EncodeError> {
        let source = request.source.pixels();
        let target = request.target_kb as f64;
        let (width, height) = fit_within(
            request.source.width(),
            request.source.height(),
            MAX_JPEG_DIMENSION,
        );
        if (width, height) != (request.source.width(), request.source.height()) {
            log::debug!(
                "Clamped {}x{} source to {}x{} for JPEG",
                request.source.width(),
                request.source.height(),
                width,
                height
            );
        }
        let mut state = SearchState {
            quality: self.config.initial_quality,
            width,
            height,
        };

        let mut iteration = 0;
        loop {
            iteration += 1;
            let frame = render_frame(source, state.width, state.height, self.config.filter);
            let encoded = self.encoder.encode(&frame, state.quality)?;
            let achieved_kb = self.config.size_estimate.kilobytes(&encoded);
            let met_goal = achieved_kb <= target;

            log::debug!(
                "Round {}: {}x{} q={} -> {:.1} KB (target {} KB)",
                iteration,
                state.width,
                state.height,
                state.quality,
                achieved_kb,
                request.target_kb
            );

            if met_goal || iteration >= self.config.max_iterations {
                if met_goal {
                    log::info!(
                        "Fit {} KB in {} round(s) at {}x{} q={}",
                        request.target_kb,
                        iteration,
                        state.width,
                        state.height,
                        state.quality
                    );
                } else {
                    log::warn!(
                        "Could not reach {} KB in {} rounds, best effort {:.1} KB",
                        request.target_kb,
                        iteration,
                        achieved_kb
                    );
                }
                return Ok(FitResult {
                    encoded_bytes: encoded,
                    achieved_kb,
                    met_goal,
                    iterations: iteration,
                    quality: Some(state.quality),
                    width: state.width,
                    height: state.height,
                    kind: MediaKind::Image,
                });
            }

            state = state.next(&self.config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_steps_then_dimensions_shrink() {
        let config = FitConfig::default();
        let mut state = SearchState {
            quality: 90,
            width: 1000,
            height: 500,
        };
        let mut seen = vec![state];
        for _ in 0..7 {
            state = state.next(&config);
            seen.push(state);
        }
        let qualities: Vec<u8> = seen.iter().map(|s| s.quality).collect();
        assert_eq!(qualities, vec![90, 75, 60, 45, 30, 30, 30, 30]);
        let widths: Vec<u32> = seen.iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![1000, 1000, 1000, 1000, 1000, 850, 722, 613]);
        assert_eq!(seen[7].height, 306);
    }

    #[test]
    fn shrink_never_reaches_zero() {
        assert_eq!(shrink(1, 0.85), 1);
        assert_eq!(shrink(2, 0.85), 1);
    }

    #[test]
    fn oversized_sources_clamp_to_jpeg_limit() {
        assert_eq!(fit_within(800, 600, MAX_JPEG_DIMENSION), (800, 600));
        assert_eq!(fit_within(70_000, 1, MAX_JPEG_DIMENSION), (65_535, 1));
        assert_eq!(fit_within(131_070, 65_535, MAX_JPEG_DIMENSION), (65_535, 32_768));
        assert_eq!(fit_within(2, 131_070, MAX_JPEG_DIMENSION), (1, 65_535));
    }

    #[test]
    fn config_validation() {
        assert!(FitConfig::default().validate().is_ok());
        let bad = FitConfig {
            initial_quality: 0,
            ..FitConfig::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidQuality(0))));
        let bad = FitConfig {
            shrink_factor: 1.0,
            ..FitConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = FitConfig {
            max_iterations: 0,
            ..FitConfig::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::NoIterations)));
    }

    #[test]
    fn zero_target_is_rejected() {
        let source = Arc::new(RasterImage::from_dynamic(image::DynamicImage::new_rgb8(4, 4)).unwrap());
        assert!(matches!(
            FitRequest::new(source, 0),
            Err(ConfigError::InvalidTarget)
        ));
    }

    #[test]
    fn request_exposes_source_and_target() {
        let source = Arc::new(RasterImage::from_dynamic(image::DynamicImage::new_rgb8(6, 3)).unwrap());
        let request = FitRequest::new(Arc::clone(&source), 120).unwrap();
        assert_eq!(request.target_kb(), 120);
        assert!(Arc::ptr_eq(request.source(), &source));
    }
}
