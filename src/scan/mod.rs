//! Continuous QR acquisition from a camera stream
//!
//! This is the heart of the kiosk: a `ScanController` runs one scan session at
//! a time, pulling still frames from a [`FrameSource`] on a fixed cadence and
//! feeding them through a [`FrameDecoder`] until a payload is recognized or
//! the session is cancelled. The winning payload is delivered to the caller
//! exactly once per session.

mod sampler;

pub use sampler::{SamplerHandle, TickOutcome, spawn_sampler};

use crate::error::{Error, Result};
use crate::qr::{FrameDecoder, QrPayload};
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sampling cadence of the decode loop
pub const SCAN_CADENCE: Duration = Duration::from_millis(300);

/// A source of still frames, typically a live camera.
///
/// `request_access` models the one-time hardware/permission acquisition;
/// failure is terminal for the session and is never silently retried.
/// `capture_frame` returns `None` while the stream is warming up.
#[async_trait]
pub trait FrameSource: Send + Sync + 'static {
    /// Acquire (or verify) access to the underlying device.
    async fn request_access(&self) -> Result<()>;

    /// Capture the current frame, or `None` if the stream is not ready yet.
    async fn capture_frame(&self) -> Result<Option<DynamicImage>>;
}

/// Lifecycle of one scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Not scanning
    Idle,
    /// Sampler active, looking for a payload
    Scanning,
    /// Payload delivered, sampler stopped; `reset()` returns to `Idle`
    Found,
}

type PayloadCallback = Box<dyn FnOnce(QrPayload) + Send + 'static>;

/// State shared between the controller and its sampler task. The state field
/// and the pending callback live under one lock so "have we already found a
/// payload this session" is checked-and-set atomically against tick delivery.
struct SessionShared {
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: ScanState,
    on_payload: Option<PayloadCallback>,
}

/// Orchestrates the sampler/decoder pair for one session at a time.
pub struct ScanController<S, D> {
    source: Arc<S>,
    decoder: Arc<D>,
    cadence: Duration,
    shared: Arc<SessionShared>,
    sampler: Option<SamplerHandle>,
}

impl<S, D> ScanController<S, D>
where
    S: FrameSource,
    D: FrameDecoder,
{
    /// Create a controller over the given frame source and decoder.
    pub fn new(source: Arc<S>, decoder: Arc<D>) -> Self {
        Self {
            source,
            decoder,
            cadence: SCAN_CADENCE,
            shared: Arc::new(SessionShared {
                inner: Mutex::new(SessionInner {
                    state: ScanState::Idle,
                    on_payload: None,
                }),
            }),
            sampler: None,
        }
    }

    /// Current session state
    pub fn state(&self) -> ScanState {
        self.shared.inner.lock().expect("scan session mutex poisoned").state
    }

    /// Start a new scan session, delivering the first decoded payload to
    /// `on_payload`. No-op when a session is already scanning; a `Found`
    /// session must be `reset()` first.
    ///
    /// Device access is acquired before any timer exists, so an access
    /// failure leaves the controller in `Idle` with no ticks ever fired.
    pub async fn start<F>(&mut self, on_payload: F) -> Result<()>
    where
        F: FnOnce(QrPayload) + Send + 'static,
    {
        {
            let inner = self.shared.inner.lock().expect("scan session mutex poisoned");
            match inner.state {
                ScanState::Scanning => return Ok(()),
                ScanState::Found => {
                    return Err(Error::ScanState(
                        "session already delivered a payload; call reset() first".to_string(),
                    ));
                }
                ScanState::Idle => {}
            }
        }

        self.source.request_access().await?;

        {
            let mut inner = self.shared.inner.lock().expect("scan session mutex poisoned");
            inner.state = ScanState::Scanning;
            inner.on_payload = Some(Box::new(on_payload));
        }

        let source = Arc::clone(&self.source);
        let decoder = Arc::clone(&self.decoder);
        let shared = Arc::clone(&self.shared);

        self.sampler = Some(spawn_sampler(self.cadence, move || {
            let source = Arc::clone(&source);
            let decoder = Arc::clone(&decoder);
            let shared = Arc::clone(&shared);
            async move { run_tick(source, decoder, shared).await }
        }));

        tracing::debug!(cadence_ms = self.cadence.as_millis() as u64, "scan session started");
        Ok(())
    }

    /// Cancel an active session: `Scanning → Idle`, the sampler is fully
    /// wound down, and no payload callback fires after this returns — a
    /// decode already in flight has its result discarded.
    pub async fn stop(&mut self) {
        {
            let mut inner = self.shared.inner.lock().expect("scan session mutex poisoned");
            if inner.state == ScanState::Scanning {
                inner.state = ScanState::Idle;
            }
            // Dropping the callback here makes late delivery impossible even
            // while the in-flight tick is still running.
            inner.on_payload = None;
        }

        if let Some(sampler) = self.sampler.take() {
            sampler.cancel().await;
        }
    }

    /// Acknowledge a delivered payload: `Found → Idle`, enabling a new scan.
    pub fn reset(&mut self) -> Result<()> {
        let mut inner = self.shared.inner.lock().expect("scan session mutex poisoned");
        match inner.state {
            ScanState::Found => {
                inner.state = ScanState::Idle;
                self.sampler = None;
                Ok(())
            }
            ScanState::Idle => Ok(()),
            ScanState::Scanning => Err(Error::ScanState(
                "session is still scanning; call stop() instead".to_string(),
            )),
        }
    }
}

/// One sampling tick: capture, decode, and (exactly once per session) deliver.
async fn run_tick<S, D>(source: Arc<S>, decoder: Arc<D>, shared: Arc<SessionShared>) -> TickOutcome
where
    S: FrameSource,
    D: FrameDecoder,
{
    let frame = match source.capture_frame().await {
        Ok(Some(frame)) => frame,
        Ok(None) => return TickOutcome::Continue, // stream not ready yet
        Err(err) => {
            tracing::warn!("Frame capture failed: {err}");
            return TickOutcome::Continue;
        }
    };

    let decoded = decoder.decode_frame(&frame);
    crate::metrics::record_tick(decoded.is_some());

    let Some(payload) = decoded else {
        return TickOutcome::Continue; // miss, retry next tick
    };

    // Atomic check-and-set: only the tick that moves Scanning → Found may
    // take the callback. A race with stop() or a second detection finds the
    // state already changed and discards its result.
    let callback = {
        let mut inner = shared.inner.lock().expect("scan session mutex poisoned");
        if inner.state != ScanState::Scanning {
            return TickOutcome::Stop;
        }
        inner.state = ScanState::Found;
        inner.on_payload.take()
    };

    if let Some(callback) = callback {
        callback(payload);
    }

    TickOutcome::Stop
}
