//! PDF collaborators: page rasterization for OCR and direct text-layer reading.
//!
//! Both are synchronous and CPU bound; the extractor runs them on the blocking pool.

use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while rendering or reading a PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The pdfium shared library could not be loaded.
    #[error("Failed to load PDFium library: {0}")]
    Library(String),
    /// The document could not be opened.
    #[error("Failed to open PDF: {0}")]
    Open(String),
    /// A page could not be rasterized.
    #[error("Failed to render page {page}: {message}")]
    Render {
        /// One-based page number.
        page: usize,
        /// Underlying library message.
        message: String,
    },
    /// The text layer could not be parsed.
    #[error("Failed to read PDF text layer: {0}")]
    TextLayer(String),
}

/// Rasterizes every page of a PDF, in page order.
pub trait PageRenderer: Send + Sync {
    /// Render each page to an image.
    fn render_pages(&self, pdf: &[u8]) -> Result<Vec<DynamicImage>, PdfError>;
}

/// Reads embedded text from a PDF, one string per page.
pub trait TextLayerReader: Send + Sync {
    /// Return the text of each page; pages without a text layer yield an empty string.
    fn read_pages(&self, pdf: &[u8]) -> Result<Vec<String>, PdfError>;
}

/// [`PageRenderer`] backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
    target_width: i32,
}

impl PdfiumRenderer {
    /// Renderer loading pdfium from `library_dir` (or the system library) at `target_width` pixels.
    pub fn new(library_dir: Option<PathBuf>, target_width: u32) -> Self {
        Self {
            library_dir,
            target_width: i32::try_from(target_width.max(1)).unwrap_or(i32::MAX),
        }
    }

    fn bind(&self) -> Result<Pdfium, PdfError> {
        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|error| PdfError::Library(error.to_string()))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_pages(&self, pdf: &[u8]) -> Result<Vec<DynamicImage>, PdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|error| PdfError::Open(error.to_string()))?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.target_width)
            .set_maximum_height(self.target_width.saturating_mul(2));

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let render_error = |message: String| PdfError::Render {
                page: index + 1,
                message,
            };
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|error| render_error(error.to_string()))?;

            let width = bitmap.width() as u32;
            let height = bitmap.height() as u32;
            // pdfium hands back BGRA rows.
            let rgb: Vec<u8> = bitmap
                .as_raw_bytes()
                .chunks_exact(4)
                .flat_map(|pixel| [pixel[2], pixel[1], pixel[0]])
                .collect();
            let image = RgbImage::from_raw(width, height, rgb)
                .ok_or_else(|| render_error("bitmap size does not match its pixels".into()))?;
            pages.push(DynamicImage::ImageRgb8(image));
        }

        tracing::debug!(pages = pages.len(), "Rendered PDF pages");
        Ok(pages)
    }
}

/// [`TextLayerReader`] backed by the `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractTextLayer;

impl TextLayerReader for PdfExtractTextLayer {
    fn read_pages(&self, pdf: &[u8]) -> Result<Vec<String>, PdfError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf)
            .map_err(|error| PdfError::TextLayer(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_layer_rejects_garbage_bytes() {
        let error = PdfExtractTextLayer
            .read_pages(b"definitely not a pdf")
            .expect_err("garbage input");
        assert!(matches!(error, PdfError::TextLayer(_)));
    }
}
