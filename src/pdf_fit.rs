//! Page-geometry scaling for PDFs.
//!
//! Every page box is multiplied by the scale factor and the page content is
//! wrapped in a matching `cm` transform, so pages render smaller. Embedded
//! images and fonts are left untouched, which makes this a weak size reducer:
//! most of the savings come from how the serializer rewrites the file.

use std::io::Write;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::DocumentError;
use crate::image_fit::FitResult;
use crate::raster::MediaKind;

/// Boxes that may be inherited from the page tree.
const INHERITED_BOXES: [&[u8]; 2] = [b"MediaBox", b"CropBox"];
/// Boxes that only apply where they are set.
const LOCAL_BOXES: [&[u8]; 3] = [b"BleedBox", b"TrimBox", b"ArtBox"];
/// Guards against cycles in malformed page trees.
const MAX_TREE_DEPTH: usize = 64;
/// US Letter, the reader default when no MediaBox can be found.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

#[derive(Debug, Clone)]
pub struct PdfConfig {
    pub scale_factor: f32,
    /// Optional size target; the fitter never iterates, it only reports
    pub target_kb: Option<u32>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            scale_factor: 0.75,
            target_kb: None,
        }
    }
}

/// Width and height of a page's effective MediaBox, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Default, Clone)]
pub struct PdfFitter {
    config: PdfConfig,
}

impl PdfFitter {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PdfConfig {
        &self.config
    }

    /// Fit with the configured scale factor.
    pub fn fit_default(&self, input: &[u8]) -> Result<FitResult, DocumentError> {
        self.fit(input, self.config.scale_factor)
    }

    /// Scale every page of `input` by `scale_factor` and serialize the result.
    pub fn fit(&self, input: &[u8], scale_factor: f32) -> Result<FitResult, DocumentError> {
        if !(scale_factor > 0.0 && scale_factor <= 1.0) {
            return Err(DocumentError::InvalidScale(scale_factor));
        }

        let mut doc = load_document(input)?;
        let pages = scale_pages(&mut doc, scale_factor)?;

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| DocumentError::Save(format!("{:?}", e)))?;

        let achieved_kb = buffer.len() as f64 / 1024.0;
        let met_goal = self
            .config
            .target_kb
            .map_or(true, |target| achieved_kb <= target as f64);
        log::info!(
            "Scaled {} page(s) by {}: {:.1} KB -> {:.1} KB",
            pages.len(),
            scale_factor,
            input.len() as f64 / 1024.0,
            achieved_kb
        );

        let first = pages[0];
        Ok(FitResult {
            encoded_bytes: buffer,
            achieved_kb,
            met_goal,
            iterations: 1,
            quality: None,
            width: first.width.round() as u32,
            height: first.height.round() as u32,
            kind: MediaKind::Pdf,
        })
    }
}

/// Effective page sizes of a PDF, without modifying it.
pub fn page_geometry(input: &[u8]) -> Result<Vec<PageGeometry>, DocumentError> {
    let doc = load_document(input)?;
    Ok(doc
        .get_pages()
        .values()
        .map(|&page_id| media_box_geometry(&doc, page_id))
        .collect())
}

fn load_document(input: &[u8]) -> Result<Document, DocumentError> {
    let doc = Document::load_mem(input).map_err(|e| DocumentError::Malformed(format!("{:?}", e)))?;
    // Any trailer Encrypt entry, even one lopdf cannot resolve to a dictionary.
    if doc.is_encrypted() || doc.trailer.has(b"Encrypt") {
        return Err(DocumentError::Encrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(DocumentError::NoPages);
    }
    Ok(doc)
}

/// Apply the scale pass in place. Returns the new geometry of each page.
pub fn scale_pages(doc: &mut Document, scale: f32) -> Result<Vec<PageGeometry>, DocumentError> {
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    if page_ids.is_empty() {
        return Err(DocumentError::NoPages);
    }

    let mut geometry = Vec::with_capacity(page_ids.len());
    for page_id in page_ids {
        scale_boxes(doc, page_id, scale)?;
        if scale < 1.0 {
            scale_content(doc, page_id, scale)?;
            scale_annotations(doc, page_id, scale);
        }
        geometry.push(media_box_geometry(doc, page_id));
    }
    Ok(geometry)
}

fn scale_boxes(doc: &mut Document, page_id: ObjectId, scale: f32) -> Result<(), DocumentError> {
    let updates = page_boxes(doc, page_id);
    let page = page_dictionary_mut(doc, page_id)?;
    for (key, rect) in updates {
        page.set(key.to_vec(), rect_object(rect.map(|v| v * scale)));
    }
    Ok(())
}

/// Every box that applies to the page, with inherited ones resolved.
fn page_boxes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], [f32; 4])> {
    let mut boxes = Vec::new();
    for key in INHERITED_BOXES {
        match inherited_rect(doc, page_id, key) {
            Some(rect) => boxes.push((key, rect)),
            None if key == b"MediaBox" => boxes.push((key, DEFAULT_MEDIA_BOX)),
            None => {}
        }
    }
    for key in LOCAL_BOXES {
        let rect = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(key).ok())
            .and_then(|obj| read_rect(doc, obj));
        if let Some(rect) = rect {
            boxes.push((key, rect));
        }
    }
    boxes
}

/// Wrap the page's content streams in `q sx 0 0 sy 0 0 cm ... Q`.
fn scale_content(doc: &mut Document, page_id: ObjectId, scale: f32) -> Result<(), DocumentError> {
    let contents = doc.get_page_contents(page_id);
    if contents.is_empty() {
        return Ok(());
    }

    let prefix = format!("q\n{} 0 0 {} 0 0 cm\n", scale, scale);
    let prefix_id = doc.add_object(flate_stream(prefix.as_bytes())?);
    let suffix_id = doc.add_object(flate_stream(b"\nQ\n")?);

    let mut wrapped = Vec::with_capacity(contents.len() + 2);
    wrapped.push(Object::Reference(prefix_id));
    wrapped.extend(contents.into_iter().map(Object::Reference));
    wrapped.push(Object::Reference(suffix_id));

    page_dictionary_mut(doc, page_id)?.set("Contents", Object::Array(wrapped));
    Ok(())
}

fn flate_stream(content: &[u8]) -> Result<Stream, DocumentError> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder
        .write_all(content)
        .and_then(|_| encoder.finish())
        .map(|compressed| {
            Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                compressed,
            )
        })
        .map_err(|e| DocumentError::Save(e.to_string()))
}

fn scale_annotations(doc: &mut Document, page_id: ObjectId, scale: f32) {
    let rects = annotation_rects(doc, page_id);
    for (annot_id, rect) in rects {
        if let Ok(dict) = doc.get_dictionary_mut(annot_id) {
            dict.set("Rect", rect_object(rect.map(|v| v * scale)));
        }
    }
}

fn annotation_rects(doc: &Document, page_id: ObjectId) -> Vec<(ObjectId, [f32; 4])> {
    let annots = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|obj| doc.dereference(obj).ok())
    {
        Some((_, Object::Array(items))) => items,
        _ => return Vec::new(),
    };

    annots
        .iter()
        .filter_map(|annot| annot.as_reference().ok())
        .filter_map(|annot_id| {
            let rect = doc
                .get_dictionary(annot_id)
                .ok()
                .and_then(|dict| dict.get(b"Rect").ok())
                .and_then(|obj| read_rect(doc, obj))?;
            Some((annot_id, rect))
        })
        .collect()
}

fn page_dictionary_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, DocumentError> {
    doc.get_dictionary_mut(page_id)
        .map_err(|e| DocumentError::Malformed(format!("page {:?}: {:?}", page_id, e)))
}

/// Look up `key` on the page, walking `Parent` links for inherited values.
fn inherited_rect(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return read_rect(doc, value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn read_rect(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let (_, obj) = doc.dereference(obj).ok()?;
    let items = obj.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        let (_, value) = doc.dereference(item).ok()?;
        *slot = value.as_float().ok()?;
    }
    Some(rect)
}

fn rect_object(rect: [f32; 4]) -> Object {
    Object::Array(rect.iter().map(|&v| Object::Real(v)).collect())
}

fn media_box_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let [x0, y0, x1, y1] = inherited_rect(doc, page_id, b"MediaBox").unwrap_or(DEFAULT_MEDIA_BOX);
    PageGeometry {
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    }
}
