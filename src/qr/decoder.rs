//! QR code decoder using rqrr

use crate::error::{Error, Result};
use crate::qr::{FrameDecoder, QrPayload};
use image::{DynamicImage, GrayImage};

/// QR code decoder
pub struct QrDecoder {
    // Configuration could go here (e.g., detection parameters)
}

impl QrDecoder {
    /// Create a new QR decoder with default settings
    pub fn new() -> Self {
        Self {}
    }

    /// Decode a QR code from an image
    pub fn decode(&self, img: &DynamicImage) -> Result<QrPayload> {
        // Convert to grayscale if needed
        let gray = img.to_luma8();

        self.decode_gray(&gray)
    }

    /// Decode a QR code from a grayscale image
    pub fn decode_gray(&self, img: &GrayImage) -> Result<QrPayload> {
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());

        let grids = prepared.detect_grids();

        if grids.is_empty() {
            return Err(Error::NoQrCodeFound);
        }

        // Take the first detected QR code
        let grid = &grids[0];

        match grid.decode() {
            Ok((meta, content)) => {
                tracing::debug!(
                    "Decoded QR: version={:?}, ecc_level={:?}, length={}",
                    meta.version,
                    meta.ecc_level,
                    content.len()
                );

                Ok(QrPayload::from_bytes(content.into_bytes()))
            }
            Err(e) => Err(Error::QrDecode(format!("Decode failed: {:?}", e))),
        }
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for QrDecoder {
    fn decode_frame(&self, frame: &DynamicImage) -> Option<QrPayload> {
        // Both "nothing in frame" and "grid present but unreadable" collapse
        // to None: a miss is expected and retried on the next tick.
        match self.decode(frame) {
            Ok(payload) => Some(payload),
            Err(Error::NoQrCodeFound) => None,
            Err(err) => {
                tracing::debug!("Unreadable QR pattern in frame: {err}");
                None
            }
        }
    }
}
