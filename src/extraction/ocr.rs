//! OCR engine seam and the tesseract command-line adapter.

use async_trait::async_trait;
use image::{GrayImage, ImageFormat};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;

/// Errors raised by OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Temporary file or process I/O failed.
    #[error("OCR I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The processed image could not be encoded for the engine.
    #[error("Failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
    /// The blocking image preparation task did not complete.
    #[error("OCR preparation aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
    /// The engine ran but reported failure.
    #[error("OCR engine failed: {0}")]
    EngineFailed(String),
}

/// Recognizes text in a single-channel image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Return the recognized text, possibly empty.
    async fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Runs the `tesseract` executable on a temporary PNG and reads text from stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
}

impl TesseractCli {
    /// Build an adapter for `binary` using the `language` traineddata.
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        let owned = image.clone();
        let file = tokio::task::spawn_blocking(move || write_temp_png(&owned)).await??;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await?;

        if !output.status.success() {
            return Err(OcrError::EngineFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            chars = text.len(),
            "Tesseract finished"
        );
        Ok(text)
    }
}

fn write_temp_png(image: &GrayImage) -> Result<NamedTempFile, OcrError> {
    let file = tempfile::Builder::new()
        .prefix("docsift-ocr-")
        .suffix(".png")
        .tempfile()?;
    image.save_with_format(file.path(), ImageFormat::Png)?;
    Ok(file)
}
