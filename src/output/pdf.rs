//! Combined-document writer.
//!
//! Every page is one full-bleed JPEG XObject. Inputs are decoded, resized to
//! a fixed landscape raster and re-encoded, so PNG, JPEG and WebP slides all
//! land in the document the same way.

use crate::error::AssemblyError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ExtendedColorType;
use tracing::{debug, warn};

pub const DOCUMENT_FILE: &str = "slide_combined.pdf";

const DEFAULT_WIDTH_PX: u32 = 1920;
const DEFAULT_HEIGHT_PX: u32 = 1080;
const JPEG_QUALITY: u8 = 90;
/// 96 dpi raster onto 72 pt/inch pages
const POINTS_PER_PIXEL: f64 = 0.75;

/// Turns an ordered list of images into one document
pub trait DocumentCombiner: Send + Sync {
    fn file_name(&self) -> &str;

    fn combine(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>, AssemblyError>;
}

#[derive(Debug, Clone)]
pub struct PdfCombiner {
    width_px: u32,
    height_px: u32,
}

impl Default for PdfCombiner {
    fn default() -> Self {
        Self {
            width_px: DEFAULT_WIDTH_PX,
            height_px: DEFAULT_HEIGHT_PX,
        }
    }
}

struct PageImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

impl PdfCombiner {
    #[cfg(test)]
    pub fn with_page_size(width_px: u32, height_px: u32) -> Self {
        Self {
            width_px: width_px.max(1),
            height_px: height_px.max(1),
        }
    }

    fn prepare(&self, bytes: &[u8]) -> Result<PageImage, image::ImageError> {
        let mut img = image::load_from_memory(bytes)?;
        if img.width() != self.width_px || img.height() != self.height_px {
            img = img.resize_exact(self.width_px, self.height_px, FilterType::Lanczos3);
        }
        let rgb = img.to_rgb8();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )?;

        Ok(PageImage {
            jpeg,
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}

impl DocumentCombiner for PdfCombiner {
    fn file_name(&self) -> &str {
        DOCUMENT_FILE
    }

    fn combine(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>, AssemblyError> {
        let mut prepared = Vec::with_capacity(pages.len());
        for (i, bytes) in pages.iter().enumerate() {
            match self.prepare(bytes) {
                Ok(page) => prepared.push(page),
                Err(e) => warn!("Skipping page {} in combined document: {}", i + 1, e),
            }
        }

        if prepared.is_empty() {
            return Err(AssemblyError::Document(
                "none of the artifacts could be decoded as an image".to_string(),
            ));
        }

        debug!("Writing PDF with {} page(s)", prepared.len());
        Ok(write_pdf(&prepared))
    }
}

/// Minimal PDF 1.4 object writer that tracks offsets for the xref table
struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    /// Objects must be written in id order starting at 1
    fn object(&mut self, id: usize, body: &str) {
        self.begin(id);
        self.buf.extend_from_slice(body.as_bytes());
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) {
        self.begin(id);
        self.buf
            .extend_from_slice(format!("<< {} /Length {} >>\nstream\n", dict, data.len()).as_bytes());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn begin(&mut self, id: usize) {
        debug_assert_eq!(id, self.offsets.len() + 1);
        self.offsets.push(self.buf.len());
        self.buf.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        ));
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

fn write_pdf(pages: &[PageImage]) -> Vec<u8> {
    const CATALOG: usize = 1;
    const PAGES: usize = 2;
    // Each page uses three consecutive ids: page, content stream, image
    let page_id = |i: usize| 3 + i * 3;

    let mut pdf = PdfWriter::new();
    pdf.object(CATALOG, &format!("<< /Type /Catalog /Pages {PAGES} 0 R >>"));

    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect();
    pdf.object(
        PAGES,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
    );

    for (i, page) in pages.iter().enumerate() {
        let id = page_id(i);
        let (content_id, image_id) = (id + 1, id + 2);
        let width_pt = f64::from(page.width) * POINTS_PER_PIXEL;
        let height_pt = f64::from(page.height) * POINTS_PER_PIXEL;

        pdf.object(
            id,
            &format!(
                "<< /Type /Page /Parent {PAGES} 0 R /MediaBox [0 0 {width_pt:.2} {height_pt:.2}] \
                 /Resources << /XObject << /Im{i} {image_id} 0 R >> >> /Contents {content_id} 0 R >>"
            ),
        );

        let content = format!("q\n{width_pt:.2} 0 0 {height_pt:.2} 0 0 cm\n/Im{i} Do\nQ\n");
        pdf.stream(content_id, "", content.as_bytes());

        pdf.stream(
            image_id,
            &format!(
                "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB \
                 /BitsPerComponent 8 /Filter /DCTDecode",
                page.width, page.height
            ),
            &page.jpeg,
        );
    }

    pdf.finish(CATALOG)
}
