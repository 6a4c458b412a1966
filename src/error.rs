//! Error types for entrylink operations

use thiserror::Error;

/// Result type alias using entrylink's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for entrylink operations
#[derive(Error, Debug)]
pub enum Error {
    /// Camera-related errors
    #[error("Camera error: {0}")]
    Camera(String),

    /// Camera device not found
    #[error("Camera device not found: {0}")]
    CameraNotFound(String),

    /// Camera access denied by the OS (device node permissions)
    #[error("Camera access denied: {0}")]
    CameraAccessDenied(String),

    /// Failed to capture frame from camera
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    /// QR code decoding failed
    #[error("Failed to decode QR code: {0}")]
    QrDecode(String),

    /// No QR code found in frame
    #[error("No QR code found in frame")]
    NoQrCodeFound,

    /// Scan session is in the wrong state for the requested transition
    #[error("Invalid scan state: {0}")]
    ScanState(String),

    /// HTTP transport failure talking to the check-in backend
    #[error("Backend request failed: {0}")]
    Http(String),

    /// Backend responded with a non-success HTTP status
    #[error("Backend returned HTTP status {0}")]
    BackendStatus(u16),

    /// Configured backend base URL could not be parsed
    #[error("Invalid backend base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Manual check-in submitted without a member id
    #[error("Member id must not be empty")]
    EmptyMemberId,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

// Implement From conversions for common error types

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

// V4L errors are converted manually in camera module

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}
