//! entrylink - camera-based event check-in client
//!
//! This library drives a kiosk that scans QR entry tokens from a live camera
//! (or accepts operator-typed member ids) and forwards them to a remote
//! check-in backend over HTTP. All business logic lives in the backend; this
//! crate is the acquisition loop and transport around it.
//!
//! # Features
//!
//! - **Camera Integration**: Direct V4L2 access for low-latency QR scanning
//! - **Scan Sessions**: Fixed-cadence decode loop with exactly-once payload
//!   delivery and synchronous cancellation
//! - **Backend Client**: Check-in and dashboard calls that degrade to result
//!   values instead of faults
//! - **Async-first**: Built on Tokio for non-blocking operations
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "camera")]
//! # mod example {
//! use entrylink::{CheckInClient, EntryScanner, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scanner = EntryScanner::new(ScanConfig::default()).await?;
//!     let client = CheckInClient::new("https://backend.example/exec");
//!
//!     let token = scanner.scan_token().await?;
//!     if let Some(text) = token.as_str() {
//!         let result = client.check_in(text).await;
//!         println!("{}", result.message);
//!     }
//!     Ok(())
//! }
//! # }
//! # fn main() {}
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod qr;
pub mod scan;

#[cfg(feature = "camera")]
#[cfg_attr(docsrs, doc(cfg(feature = "camera")))]
pub mod camera;

// Re-exports for convenience
pub use error::{Error, Result};

#[cfg(feature = "camera")]
pub use camera::{Camera, CameraConfig, CameraDevice};

pub use api::{CheckInClient, CheckInResult, CheckInStatus, DashboardData};
pub use config::{BackendOptions, CameraOptions, EntryConfig, LogRotation, LoggingOptions};
pub use dashboard::{DASHBOARD_POLL_INTERVAL, DashboardPoller};
pub use qr::{FrameDecoder, QrDecoder, QrPayload};
pub use scan::{FrameSource, SCAN_CADENCE, ScanController, ScanState};

#[cfg(feature = "camera")]
use std::sync::Arc;
#[cfg(feature = "camera")]
use std::time::Instant;
#[cfg(feature = "camera")]
use tokio::sync::oneshot;

/// High-level scanner interface combining camera + QR decoding
#[cfg(feature = "camera")]
pub struct EntryScanner {
    camera: Arc<Camera>,
    decoder: Arc<QrDecoder>,
}

#[cfg(feature = "camera")]
impl EntryScanner {
    /// Create a new scanner with the given configuration
    pub async fn new(config: ScanConfig) -> Result<Self> {
        let camera = Arc::new(Camera::open(config.camera_config).await?);
        let decoder = Arc::new(QrDecoder::new());

        Ok(Self { camera, decoder })
    }

    /// The underlying camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Scan once and return the first QR code found in the current frame
    pub async fn scan_once(&self) -> Result<QrPayload> {
        let frame = self.camera.capture_frame().await?;
        self.decoder.decode(&frame)
    }

    /// Run a full scan session to its first decoded token.
    ///
    /// Samples the camera every [`SCAN_CADENCE`] until a QR payload is
    /// recognized. Runs indefinitely; callers wanting a timeout wrap this in
    /// `tokio::time::timeout`.
    pub async fn scan_token(&self) -> Result<QrPayload> {
        let mut controller =
            ScanController::new(Arc::clone(&self.camera), Arc::clone(&self.decoder));
        let (tx, rx) = oneshot::channel();
        let started = Instant::now();

        controller
            .start(move |payload| {
                let _ = tx.send(payload);
            })
            .await?;

        match rx.await {
            Ok(payload) => {
                metrics::record_scan_session(started.elapsed());
                Ok(payload)
            }
            Err(_) => Err(Error::ScanState(
                "scan session ended without a payload".to_string(),
            )),
        }
    }
}

/// Configuration for QR scanning operations
#[cfg(feature = "camera")]
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Camera configuration
    pub camera_config: CameraConfig,
}
