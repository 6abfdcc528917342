//! WebAssembly bindings for the browser front end.

use wasm_bindgen::prelude::*;

use crate::image_fit::FitResult;
use crate::raster::MediaKind;
use crate::session::{Session, SessionConfig};

/// One editing session: a selected file plus its latest fit.
#[wasm_bindgen]
pub struct WasmSession {
    inner: Session,
}

/// Result handed back to JavaScript after a fit.
#[wasm_bindgen]
pub struct WasmFitResult {
    bytes: Vec<u8>,
    achieved_kb: f64,
    met_goal: bool,
    iterations: u32,
    width: u32,
    height: u32,
}

impl From<&FitResult> for WasmFitResult {
    fn from(result: &FitResult) -> Self {
        Self {
            bytes: result.encoded_bytes.clone(),
            achieved_kb: result.achieved_kb,
            met_goal: result.met_goal,
            iterations: result.iterations,
            width: result.width,
            height: result.height,
        }
    }
}

#[wasm_bindgen]
impl WasmFitResult {
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter, js_name = achievedKb)]
    pub fn achieved_kb(&self) -> f64 {
        self.achieved_kb
    }

    #[wasm_bindgen(getter, js_name = metGoal)]
    pub fn met_goal(&self) -> bool {
        self.met_goal
    }

    #[wasm_bindgen(getter)]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }
}

#[wasm_bindgen]
impl WasmSession {
    #[wasm_bindgen(constructor)]
    pub fn new(pdf_scale: Option<f32>) -> Result<WasmSession, JsError> {
        let mut config = SessionConfig::default();
        if let Some(scale) = pdf_scale {
            config.pdf.scale_factor = scale;
        }
        let inner = Session::new(config).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(WasmSession { inner })
    }

    /// Debounce the slider by this many milliseconds before calling `fitImage`.
    #[wasm_bindgen(getter, js_name = debounceMs)]
    pub fn debounce_ms(&self) -> u32 {
        self.inner.debounce_ms() as u32
    }

    /// Returns "image" or "pdf".
    #[wasm_bindgen(js_name = selectFile)]
    pub fn select_file(&mut self, name: &str, bytes: Vec<u8>) -> Result<String, JsError> {
        let info = self
            .inner
            .select_file(name, bytes)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(match info.kind {
            MediaKind::Image => "image".to_string(),
            MediaKind::Pdf => "pdf".to_string(),
        })
    }

    #[wasm_bindgen(js_name = fitImage)]
    pub fn fit_image(&self, target_kb: u32) -> Result<WasmFitResult, JsError> {
        let result = self
            .inner
            .fit_image(target_kb)
            .map_err(|e| JsError::new(&e.to_string()))?;
        if !result.met_goal {
            web_sys::console::warn_1(
                &format!(
                    "Target {} KB not reached, best effort {:.1} KB",
                    target_kb, result.achieved_kb
                )
                .into(),
            );
        }
        Ok(WasmFitResult::from(result.as_ref()))
    }

    #[wasm_bindgen(js_name = fitPdf)]
    pub fn fit_pdf(&self, scale: Option<f32>) -> Result<WasmFitResult, JsError> {
        let result = self
            .inner
            .fit_pdf(scale)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(WasmFitResult::from(result.as_ref()))
    }

    /// Preview URL of the latest result.
    #[wasm_bindgen(js_name = previewUrl)]
    pub fn preview_url(&self) -> Option<String> {
        self.inner.current().map(|p| p.result.to_data_url())
    }

    #[wasm_bindgen(js_name = downloadName)]
    pub fn download_name(&self) -> Option<String> {
        self.inner.download().map(|d| d.filename)
    }

    #[wasm_bindgen(js_name = downloadBytes)]
    pub fn download_bytes(&self) -> Option<Vec<u8>> {
        self.inner.download().map(|d| d.bytes().to_vec())
    }

    #[wasm_bindgen(js_name = downloadMime)]
    pub fn download_mime(&self) -> Option<String> {
        self.inner.download().map(|d| d.mime.to_string())
    }
}
