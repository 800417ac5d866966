//! Symbol codec: wire bytes ↔ scannable 2-D symbol.
//!
//! The transport only needs two operations from a codec, so it is kept behind
//! [`SymbolCodec`]. [`QrCodec`] renders with `qrcode` and scans with `rqrr`.

use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::config::{ErrorCorrection, SymbolConfig};
use crate::{Result, TransferError};

/// One symbol found in a sampled image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Bytes carried by the symbol (the base64 wire form).
    pub data: Vec<u8>,
    /// Corner points of the symbol in image coordinates.
    pub boundary: Vec<(i32, i32)>,
}

pub trait SymbolCodec {
    /// Render wire bytes into a symbol image.
    fn render(&self, wire: &[u8]) -> Result<GrayImage>;

    /// Find and decode every symbol in a sampled image. Zero detections is not an error.
    fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>>;
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

/// QR code implementation of [`SymbolCodec`].
#[derive(Debug, Clone, Copy)]
pub struct QrCodec {
    module_scale: u32,
    quiet_zone: u32,
    ec_level: EcLevel,
}

impl QrCodec {
    pub fn new(config: &SymbolConfig) -> Result<Self> {
        if config.module_scale == 0 {
            return Err(TransferError::InvalidConfig(
                "symbol module scale must be at least 1 pixel".into(),
            ));
        }
        Ok(QrCodec {
            module_scale: config.module_scale,
            quiet_zone: config.quiet_zone,
            ec_level: config.error_correction.into(),
        })
    }
}

impl Default for QrCodec {
    fn default() -> Self {
        QrCodec {
            module_scale: 4,
            quiet_zone: 4,
            ec_level: EcLevel::M,
        }
    }
}

impl SymbolCodec for QrCodec {
    fn render(&self, wire: &[u8]) -> Result<GrayImage> {
        let code = QrCode::with_error_correction_level(wire, self.ec_level).map_err(|e| {
            TransferError::Codec(format!("cannot fit {} bytes in a QR symbol: {}", wire.len(), e))
        })?;

        let modules = code.width() as u32;
        let side = (modules + 2 * self.quiet_zone) * self.module_scale;
        let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));

        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let x0 = (i as u32 % modules + self.quiet_zone) * self.module_scale;
            let y0 = (i as u32 / modules + self.quiet_zone) * self.module_scale;
            for dy in 0..self.module_scale {
                for dx in 0..self.module_scale {
                    img.put_pixel(x0 + dx, y0 + dy, Luma([0u8]));
                }
            }
        }

        Ok(img)
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>> {
        let (w, h) = image.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
                image.get_pixel(x as u32, y as u32).0[0]
            });

        let grids = prepared.detect_grids();
        let mut found = Vec::with_capacity(grids.len());
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => found.push(Detection {
                    data: content.into_bytes(),
                    boundary: grid.bounds.iter().map(|p| (p.x, p.y)).collect(),
                }),
                Err(e) => debug!(error = %e, "symbol located but could not be decoded"),
            }
        }

        Ok(found)
    }
}
