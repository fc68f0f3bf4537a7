//! Image preprocessing ahead of OCR.

use image::{DynamicImage, GrayImage, imageops::FilterType};

/// Convert to grayscale and shrink so neither side exceeds `max_dimension`.
pub(crate) fn prepare_for_ocr(image: DynamicImage, max_dimension: u32) -> GrayImage {
    let gray = image.into_luma8();
    let (width, height) = gray.dimensions();
    match fit_within(width, height, max_dimension) {
        Some((new_width, new_height)) => {
            tracing::debug!(
                width,
                height,
                new_width,
                new_height,
                "Downscaling image for OCR"
            );
            image::imageops::resize(&gray, new_width, new_height, FilterType::Lanczos3)
        }
        None => gray,
    }
}

/// Target size preserving aspect ratio, or `None` when the image already fits.
///
/// A cap of zero disables downscaling.
pub(crate) fn fit_within(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return None;
    }
    let scale = f64::from(max_dimension) / f64::from(width.max(height));
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dimension);
    Some((scaled(width), scaled(height)))
}
