//! Text extraction from PDFs and images.
//!
//! Images go through grayscale conversion, a size cap, and OCR. PDFs are rasterized page by
//! page and OCR'd the same way; when that pass fails or recognizes nothing, the embedded text
//! layer is read instead. Nothing here returns an error for a bad document: the result is an
//! [`ExtractionOutcome`] that says whether text was found, and if not, why.

mod image;
pub mod ocr;
pub mod pdf;

use crate::config::Config;
use ::image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use ocr::{OcrEngine, OcrError, TesseractCli};
pub use pdf::{PageRenderer, PdfError, PdfExtractTextLayer, PdfiumRenderer, TextLayerReader};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Errors raised before extraction starts.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// File is neither a PDF nor a supported image.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
}

/// Input classes the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// PDF document.
    Pdf,
    /// Raster image.
    Image,
}

impl DocumentKind {
    /// Classify by file extension, falling back to the content type when there is none.
    pub fn classify(filename: &str, content_type: Option<&str>) -> Result<Self, ExtractionError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => Ok(Self::Image),
            Some(_) => Err(ExtractionError::UnsupportedType(filename.to_string())),
            None => match content_type.map(str::to_ascii_lowercase).as_deref() {
                Some("application/pdf") => Ok(Self::Pdf),
                Some(mime) if mime.starts_with("image/") => Ok(Self::Image),
                _ => Err(ExtractionError::UnsupportedType(filename.to_string())),
            },
        }
    }
}

/// Which strategy produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// Optical character recognition.
    Ocr,
    /// Text embedded in the PDF structure.
    TextLayer,
}

/// Result of an extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Non-empty, trimmed text.
    Extracted {
        /// Extracted text.
        text: String,
        /// Strategy that produced it.
        source: TextSource,
    },
    /// Every strategy ran without error but found no text.
    Empty,
    /// Extraction could not run to completion.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl ExtractionOutcome {
    fn from_text(text: &str, source: TextSource) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Extracted {
                text: trimmed.to_string(),
                source,
            }
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Collapse into plain text; `Empty` and `Failed` become the empty string.
    pub fn into_text(self) -> String {
        match self {
            Self::Extracted { text, .. } => text,
            Self::Empty | Self::Failed { .. } => String::new(),
        }
    }

    /// Whether text was found.
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }
}

/// Converts raw document bytes into text using injected OCR and PDF collaborators.
#[derive(Clone)]
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
    renderer: Arc<dyn PageRenderer>,
    text_layer: Arc<dyn TextLayerReader>,
    max_image_dimension: u32,
}

impl TextExtractor {
    /// Assemble an extractor from its collaborators.
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        renderer: Arc<dyn PageRenderer>,
        text_layer: Arc<dyn TextLayerReader>,
        max_image_dimension: u32,
    ) -> Self {
        Self {
            ocr,
            renderer,
            text_layer,
            max_image_dimension,
        }
    }

    /// Extractor wired to tesseract, pdfium, and pdf-extract as configured.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(TesseractCli::new(
                config.tesseract_bin.clone(),
                config.tesseract_lang.clone(),
            )),
            Arc::new(PdfiumRenderer::new(
                config.pdfium_library_path.clone(),
                config.pdf_render_width,
            )),
            Arc::new(PdfExtractTextLayer),
            config.ocr_max_image_dimension,
        )
    }

    /// Extract text from `bytes` of the given kind.
    pub async fn extract(&self, bytes: &[u8], kind: DocumentKind) -> ExtractionOutcome {
        let bytes: Arc<[u8]> = Arc::from(bytes);
        let outcome = match kind {
            DocumentKind::Pdf => self.extract_pdf(bytes).await,
            DocumentKind::Image => self.extract_image(bytes).await,
        };
        match &outcome {
            ExtractionOutcome::Extracted { text, source } => {
                tracing::debug!(?kind, ?source, chars = text.len(), "Extracted text");
            }
            ExtractionOutcome::Empty => tracing::info!(?kind, "No text found in document"),
            ExtractionOutcome::Failed { reason } => {
                tracing::warn!(?kind, reason = %reason, "Text extraction failed");
            }
        }
        outcome
    }

    async fn extract_image(&self, bytes: Arc<[u8]>) -> ExtractionOutcome {
        let decoded = tokio::task::spawn_blocking(move || ::image::load_from_memory(&bytes)).await;
        match decoded {
            Ok(Ok(image)) => self.ocr_image(image).await,
            Ok(Err(error)) => ExtractionOutcome::failed(format!("failed to decode image: {error}")),
            Err(error) => ExtractionOutcome::failed(format!("image decoding aborted: {error}")),
        }
    }

    async fn ocr_image(&self, image: DynamicImage) -> ExtractionOutcome {
        let cap = self.max_image_dimension;
        let prepared =
            match tokio::task::spawn_blocking(move || image::prepare_for_ocr(image, cap)).await {
                Ok(prepared) => prepared,
                Err(error) => {
                    return ExtractionOutcome::failed(format!(
                        "image preprocessing aborted: {error}"
                    ));
                }
            };

        match self.ocr.recognize(&prepared).await {
            Ok(text) => ExtractionOutcome::from_text(&text, TextSource::Ocr),
            Err(error) => ExtractionOutcome::failed(error.to_string()),
        }
    }

    async fn extract_pdf(&self, bytes: Arc<[u8]>) -> ExtractionOutcome {
        let ocr_pass = self.ocr_pdf(Arc::clone(&bytes)).await;
        if ocr_pass.is_extracted() {
            return ocr_pass;
        }

        tracing::info!(outcome = ?ocr_pass, "OCR pass found no text; reading PDF text layer");
        let fallback = self.read_text_layer(bytes).await;
        match (ocr_pass, fallback) {
            (_, extracted @ ExtractionOutcome::Extracted { .. }) => extracted,
            (_, ExtractionOutcome::Empty) => ExtractionOutcome::Empty,
            (ExtractionOutcome::Failed { reason: ocr }, ExtractionOutcome::Failed { reason }) => {
                ExtractionOutcome::failed(format!("OCR: {ocr}; text layer: {reason}"))
            }
            (_, failed) => failed,
        }
    }

    async fn ocr_pdf(&self, bytes: Arc<[u8]>) -> ExtractionOutcome {
        let renderer = Arc::clone(&self.renderer);
        let pages = match tokio::task::spawn_blocking(move || renderer.render_pages(&bytes)).await
        {
            Ok(Ok(pages)) => pages,
            Ok(Err(error)) => return ExtractionOutcome::failed(error.to_string()),
            Err(error) => {
                return ExtractionOutcome::failed(format!("PDF rendering aborted: {error}"));
            }
        };

        let mut page_texts = Vec::with_capacity(pages.len());
        for (index, page) in pages.into_iter().enumerate() {
            let outcome = self.ocr_image(page).await;
            if let ExtractionOutcome::Failed { reason } = &outcome {
                tracing::warn!(page = index + 1, reason = %reason, "OCR failed for page");
            }
            page_texts.push(outcome.into_text());
        }

        ExtractionOutcome::from_text(&page_texts.join("\n"), TextSource::Ocr)
    }

    async fn read_text_layer(&self, bytes: Arc<[u8]>) -> ExtractionOutcome {
        let reader = Arc::clone(&self.text_layer);
        match tokio::task::spawn_blocking(move || reader.read_pages(&bytes)).await {
            Ok(Ok(pages)) => ExtractionOutcome::from_text(&pages.join("\n"), TextSource::TextLayer),
            Ok(Err(error)) => ExtractionOutcome::failed(error.to_string()),
            Err(error) => ExtractionOutcome::failed(format!("text layer parsing aborted: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{GrayImage, ImageFormat, RgbImage};
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct ScriptedOcr {
        replies: Mutex<Vec<Result<String, String>>>,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedOcr {
        fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|reply| reply.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
            self.seen.lock().unwrap().push(image.dimensions());
            match self.replies.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(OcrError::EngineFailed(message)),
                None => Ok(String::new()),
            }
        }
    }

    struct FixedPages(Result<usize, String>);

    impl PageRenderer for FixedPages {
        fn render_pages(&self, _pdf: &[u8]) -> Result<Vec<DynamicImage>, PdfError> {
            match &self.0 {
                Ok(count) => Ok((0..*count)
                    .map(|_| DynamicImage::ImageRgb8(RgbImage::new(40, 20)))
                    .collect()),
                Err(message) => Err(PdfError::Open(message.clone())),
            }
        }
    }

    struct FixedLayer(Result<Vec<&'static str>, &'static str>);

    impl TextLayerReader for FixedLayer {
        fn read_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfError> {
            match &self.0 {
                Ok(pages) => Ok(pages.iter().map(|page| page.to_string()).collect()),
                Err(message) => Err(PdfError::TextLayer(message.to_string())),
            }
        }
    }

    fn extractor(
        ocr: Arc<ScriptedOcr>,
        pages: Result<usize, String>,
        layer: Result<Vec<&'static str>, &'static str>,
    ) -> TextExtractor {
        TextExtractor::new(ocr, Arc::new(FixedPages(pages)), Arc::new(FixedLayer(layer)), 2000)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn classify_by_extension_then_content_type() {
        assert_eq!(DocumentKind::classify("scan.PDF", None).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::classify("photo.jpeg", None).unwrap(), DocumentKind::Image);
        assert_eq!(
            DocumentKind::classify("upload", Some("image/png")).unwrap(),
            DocumentKind::Image
        );
        assert_eq!(
            DocumentKind::classify("upload", Some("application/pdf")).unwrap(),
            DocumentKind::Pdf
        );
        let error = DocumentKind::classify("notes.docx", Some("application/pdf")).unwrap_err();
        assert!(error.to_string().contains("Unsupported file type"));
        assert!(DocumentKind::classify("upload", None).is_err());
    }

    #[tokio::test]
    async fn image_path_downscales_before_ocr_and_trims() {
        let ocr = ScriptedOcr::new(vec![Ok("  Artificial intelligence is transforming industries.\n")]);
        let extractor = TextExtractor::new(
            ocr.clone(),
            Arc::new(FixedPages(Ok(0))),
            Arc::new(FixedLayer(Ok(vec![]))),
            100,
        );

        let outcome = extractor.extract(&png_bytes(400, 200), DocumentKind::Image).await;

        assert_eq!(
            outcome,
            ExtractionOutcome::Extracted {
                text: "Artificial intelligence is transforming industries.".into(),
                source: TextSource::Ocr,
            }
        );
        assert_eq!(ocr.seen.lock().unwrap().as_slice(), &[(100, 50)]);
    }

    #[tokio::test]
    async fn image_failures_downgrade_to_empty_text() {
        let ocr = ScriptedOcr::new(vec![Err("tesseract crashed")]);
        let extractor = extractor(ocr.clone(), Ok(0), Ok(vec![]));

        let outcome = extractor.extract(&png_bytes(10, 10), DocumentKind::Image).await;
        assert!(matches!(outcome, ExtractionOutcome::Failed { ref reason } if reason.contains("tesseract crashed")));
        assert_eq!(outcome.into_text(), "");

        let garbage = extractor.extract(b"not an image", DocumentKind::Image).await;
        assert!(matches!(garbage, ExtractionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn pdf_pages_are_joined_in_order() {
        let ocr = ScriptedOcr::new(vec![Ok("page one"), Err("blurry"), Ok("page three")]);
        let extractor = extractor(ocr, Ok(3), Err("should not be read"));

        let outcome = extractor.extract(b"%PDF", DocumentKind::Pdf).await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Extracted {
                text: "page one\n\npage three".into(),
                source: TextSource::Ocr,
            }
        );
    }

    #[tokio::test]
    async fn pdf_falls_back_to_text_layer_when_ocr_is_empty() {
        let ocr = ScriptedOcr::new(vec![Ok("   "), Ok("")]);
        let extractor = extractor(ocr, Ok(2), Ok(vec!["Embedded one", "", "Embedded three"]));

        let outcome = extractor.extract(b"%PDF", DocumentKind::Pdf).await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Extracted {
                text: "Embedded one\n\nEmbedded three".into(),
                source: TextSource::TextLayer,
            }
        );
    }

    #[tokio::test]
    async fn pdf_falls_back_when_rendering_fails() {
        let ocr = ScriptedOcr::new(vec![]);
        let extractor = extractor(ocr.clone(), Err("pdfium missing".into()), Ok(vec!["Layer text"]));

        let outcome = extractor.extract(b"%PDF", DocumentKind::Pdf).await;
        assert_eq!(outcome.into_text(), "Layer text");
        assert!(ocr.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pdf_reports_both_causes_when_everything_fails() {
        let ocr = ScriptedOcr::new(vec![]);
        let extractor = extractor(ocr, Err("pdfium missing".into()), Err("encrypted"));

        let outcome = extractor.extract(b"%PDF", DocumentKind::Pdf).await;
        match outcome {
            ExtractionOutcome::Failed { reason } => {
                assert!(reason.contains("pdfium missing"), "{reason}");
                assert!(reason.contains("encrypted"), "{reason}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pdf_without_any_text_is_empty() {
        let ocr = ScriptedOcr::new(vec![Ok("")]);
        let extractor = extractor(ocr, Ok(1), Ok(vec!["", "  "]));
        let outcome = extractor.extract(b"%PDF", DocumentKind::Pdf).await;
        assert_eq!(outcome, ExtractionOutcome::Empty);
    }
}
