//! QR code decoding
//!
//! Entry tokens arrive as QR codes held up to the kiosk camera. This module
//! extracts the opaque token string from a still frame; no validation of the
//! token content happens here — the backend decides what a token means.

mod decoder;

pub use decoder::QrDecoder;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A decoded QR code payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    /// The raw decoded data
    pub data: Vec<u8>,
    /// String representation if valid UTF-8
    pub text: Option<String>,
}

impl QrPayload {
    /// Create a new QR payload from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let text = String::from_utf8(data.clone()).ok();
        Self { data, text }
    }

    /// Create a new QR payload from a string
    pub fn from_string(s: String) -> Self {
        Self {
            data: s.as_bytes().to_vec(),
            text: Some(s),
        }
    }

    /// Get the payload as a string, if valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Decode contract used by the scan loop: absence of a payload is the only
/// failure signal at this level. Implementations must be pure with respect to
/// session state and must never panic on malformed input.
pub trait FrameDecoder: Send + Sync + 'static {
    /// Attempt to extract a payload from a still frame.
    fn decode_frame(&self, frame: &DynamicImage) -> Option<QrPayload>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_payload_from_string() {
        let payload = QrPayload::from_string("MEMBER-TOKEN-123".to_string());
        assert_eq!(payload.as_str(), Some("MEMBER-TOKEN-123"));
        assert_eq!(payload.as_bytes(), b"MEMBER-TOKEN-123");
    }

    #[test]
    fn test_qr_payload_from_bytes() {
        let payload = QrPayload::from_bytes(vec![0xFF, 0xFE]);
        assert!(payload.as_str().is_none()); // Invalid UTF-8
        assert_eq!(payload.as_bytes(), &[0xFF, 0xFE]);
    }
}
