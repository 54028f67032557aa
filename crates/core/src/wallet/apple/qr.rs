//! QR code rendering.

use std::io::Cursor;

use image::{imageops::FilterType, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::wallet::GenerationError;

pub const DEFAULT_QR_SIZE: u32 = 200;

/// Render `payload` as a square PNG of exactly `size` pixels (EC level M).
///
/// A size of zero falls back to [`DEFAULT_QR_SIZE`].
pub fn render_qr_png(payload: &str, size: u32) -> Result<Vec<u8>, GenerationError> {
    let size = if size == 0 { DEFAULT_QR_SIZE } else { size };

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| GenerationError::Encoding(format!("QR encoding: {}", e)))?;

    let rendered = code
        .render::<Luma<u8>>()
        .min_dimensions(size, size)
        .build();
    let scaled = image::imageops::resize(&rendered, size, size, FilterType::Nearest);

    let mut png = Cursor::new(Vec::new());
    scaled
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| GenerationError::Encoding(format!("PNG encoding: {}", e)))?;

    Ok(png.into_inner())
}
