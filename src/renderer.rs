//! First-page rasterization for scanned statements.
//!
//! Scanned PDFs carry each page as an embedded image XObject. The largest
//! image on page one is pulled out with `lopdf`, shrunk to fit the page's
//! MediaBox at the configured zoom, and re-encoded as PNG.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Result, StatementError};

/// US Letter in points, used when a page declares no MediaBox.
const FALLBACK_PAGE_SIZE: (f32, f32) = (612.0, 792.0);
const MAX_PARENT_DEPTH: usize = 16;

/// Render page one of `pdf_bytes` to PNG at `scale` × 72 DPI.
pub fn render_first_page(pdf_bytes: &[u8], scale: f32) -> Result<Vec<u8>> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| StatementError::PdfParsing(format!("Failed to load PDF: {}", e)))?;

    let page_id = doc
        .get_pages()
        .into_values()
        .next()
        .ok_or_else(|| StatementError::PdfParsing("PDF has no pages".to_string()))?;

    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| StatementError::PdfParsing(format!("Page object error: {}", e)))?;

    let (width_pt, height_pt) = page_size(&doc, page);
    let max_width = ((width_pt * scale).round() as u32).max(1);
    let max_height = ((height_pt * scale).round() as u32).max(1);

    let scan = largest_image(&doc, page_id, page)?;
    let (src_width, src_height) = (scan.width(), scan.height());

    let scan = if src_width > max_width || src_height > max_height {
        scan.resize(max_width, max_height, FilterType::Triangle)
    } else {
        scan
    };

    let mut png = Cursor::new(Vec::new());
    scan.write_to(&mut png, ImageFormat::Png)
        .map_err(|e| StatementError::ImageProcessing(format!("PNG encode failed: {}", e)))?;

    debug!(
        "Rendered first page: {}x{} scan -> {}x{} PNG ({} bytes)",
        src_width,
        src_height,
        scan.width(),
        scan.height(),
        png.get_ref().len()
    );

    Ok(png.into_inner())
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look `key` up on the page, then on its ancestors (MediaBox and Resources are inheritable).
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value));
        }
        current = match current.get(b"Parent") {
            Ok(parent) => resolve(doc, parent).as_dict().ok()?,
            Err(_) => return None,
        };
    }
    None
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn page_size(doc: &Document, page: &Dictionary) -> (f32, f32) {
    let media_box = inherited(doc, page, b"MediaBox").and_then(|obj| obj.as_array().ok());
    let corners: Option<Vec<f32>> = media_box.map(|arr| {
        arr.iter()
            .filter_map(|o| as_number(resolve(doc, o)))
            .collect()
    });

    match corners.as_deref() {
        Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
            ((x1 - x0).abs(), (y1 - y0).abs())
        }
        _ => FALLBACK_PAGE_SIZE,
    }
}

fn largest_image(doc: &Document, page_id: ObjectId, page: &Dictionary) -> Result<DynamicImage> {
    let xobjects = inherited(doc, page, b"Resources")
        .and_then(|res| res.as_dict().ok())
        .and_then(|res| res.get(b"XObject").ok())
        .map(|x| resolve(doc, x))
        .and_then(|x| x.as_dict().ok())
        .ok_or_else(|| {
            StatementError::PdfParsing(format!("Page {:?} has no XObject resources", page_id))
        })?;

    let mut best: Option<DynamicImage> = None;

    for (_, entry) in xobjects.iter() {
        let stream = match resolve(doc, entry) {
            Object::Stream(stream) => stream,
            _ => continue,
        };
        let is_image = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image");
        if !is_image {
            continue;
        }

        let decoded = match decode_image_stream(doc, stream) {
            Ok(img) => img,
            Err(e) => {
                debug!("Skipping undecodable image XObject: {}", e);
                continue;
            }
        };

        let area = |img: &DynamicImage| img.width() as u64 * img.height() as u64;
        if best.as_ref().map_or(true, |b| area(&decoded) > area(b)) {
            best = Some(decoded);
        }
    }

    best.ok_or_else(|| StatementError::ImageProcessing("No decodable image on the first page".to_string()))
}

fn has_filter(dict: &Dictionary, filter: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name == filter,
        Ok(Object::Array(names)) => names
            .iter()
            .any(|o| matches!(o, Object::Name(name) if name == filter)),
        _ => false,
    }
}

fn decode_image_stream(doc: &Document, stream: &lopdf::Stream) -> Result<DynamicImage> {
    if has_filter(&stream.dict, b"DCTDecode") {
        return image::load_from_memory(&stream.content)
            .map_err(|e| StatementError::ImageProcessing(format!("JPEG decode failed: {}", e)));
    }

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    if let Ok(img) = image::load_from_memory(&content) {
        return Ok(img);
    }

    raw_pixels_to_image(doc, &stream.dict, content)
}

fn raw_pixels_to_image(doc: &Document, dict: &Dictionary, pixels: Vec<u8>) -> Result<DynamicImage> {
    let int = |key: &[u8]| -> Option<u32> {
        dict.get(key)
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_i64().ok())
            .and_then(|v| u32::try_from(v).ok())
    };

    let width = int(b"Width").ok_or_else(|| StatementError::ImageProcessing("Image has no /Width".into()))?;
    let height = int(b"Height").ok_or_else(|| StatementError::ImageProcessing("Image has no /Height".into()))?;
    let bits = int(b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(StatementError::ImageProcessing(format!(
            "Unsupported bits per component: {}",
            bits
        )));
    }

    let color_space = dict.get(b"ColorSpace").ok().map(|o| resolve(doc, o));
    let gray = matches!(color_space, Some(Object::Name(name)) if name == b"DeviceGray");

    let img = if gray {
        image::GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
    } else {
        image::RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };

    img.ok_or_else(|| {
        StatementError::ImageProcessing(format!(
            "Pixel buffer does not match {}x{} image",
            width, height
        ))
    })
}
