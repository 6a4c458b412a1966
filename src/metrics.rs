//! Lightweight runtime metrics aggregation for the kiosk daemon
//!
//! Counts sampling ticks, decode hits, and check-in outcomes, emits a
//! periodic summary over `tracing`, and can expose the latest window as JSON
//! over a bare TCP/HTTP endpoint for ops dashboards.

use crate::error::{Error, Result};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

static METRICS: OnceLock<Arc<MetricsInner>> = OnceLock::new();
static LAST_SNAPSHOT: OnceLock<Mutex<Option<Snapshot>>> = OnceLock::new();

/// Outcome bucket for a check-in request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// Backend accepted the check-in
    Success,
    /// Backend accepted with a warning (e.g. already checked in)
    Warning,
    /// Backend rejected, or the request failed in transport
    Error,
}

/// Enable periodic metrics emission with the provided interval in seconds.
pub fn enable(interval_secs: u64) {
    let interval = interval_secs.max(5);
    let inner = Arc::clone(METRICS.get_or_init(|| Arc::new(MetricsInner::new(interval))));
    inner.update_interval(interval);
    inner.ensure_task();
}

/// Record one sampling tick and whether it produced a decoded payload.
pub fn record_tick(hit: bool) {
    if let Some(inner) = METRICS.get() {
        inner.record_tick(hit);
    }
}

/// Record a completed scan session with its time-to-first-decode.
pub fn record_scan_session(duration: Duration) {
    if let Some(inner) = METRICS.get() {
        inner.record_scan_session(duration);
    }
}

/// Record the outcome of a check-in request (`manual` for typed member ids).
pub fn record_check_in(outcome: CheckInOutcome, manual: bool) {
    if let Some(inner) = METRICS.get() {
        inner.record_check_in(outcome, manual);
    }
}

/// Record a dashboard fetch and whether real counts came back.
pub fn record_dashboard_fetch(ok: bool) {
    if let Some(inner) = METRICS.get() {
        inner.record_dashboard_fetch(ok);
    }
}

/// Spawn a lightweight HTTP endpoint that serves the latest metrics snapshot
/// as JSON.
pub fn spawn_http_endpoint(addr: SocketAddr) -> Result<()> {
    let std_listener = std::net::TcpListener::bind(addr).map_err(Error::Io)?;
    std_listener.set_nonblocking(true).map_err(Error::Io)?;
    let listener = TcpListener::from_std(std_listener).map_err(Error::Io)?;

    tokio::spawn(async move {
        if let Err(err) = run_http_listener(listener).await {
            tracing::error!(target: "entrylink::metrics", error = %err, "metrics endpoint error");
        }
    });

    Ok(())
}

struct MetricsInner {
    state: Mutex<MetricsState>,
    interval_secs: AtomicU64,
    task_spawned: AtomicBool,
}

impl MetricsInner {
    fn new(interval_secs: u64) -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
            interval_secs: AtomicU64::new(interval_secs.max(5)),
            task_spawned: AtomicBool::new(false),
        }
    }

    fn update_interval(&self, interval_secs: u64) {
        self.interval_secs
            .store(interval_secs.max(5), Ordering::Relaxed);
    }

    fn ensure_task(self: &Arc<Self>) {
        if self
            .task_spawned
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let runner = Arc::clone(self);
            tokio::spawn(async move {
                runner.run().await;
            });
        }
    }

    fn record_tick(&self, hit: bool) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        state.ticks += 1;
        if hit {
            state.decode_hits += 1;
        }
    }

    fn record_scan_session(&self, duration: Duration) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        state.scan_sessions += 1;
        state.scan_duration += duration;
    }

    fn record_check_in(&self, outcome: CheckInOutcome, manual: bool) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        match outcome {
            CheckInOutcome::Success => state.check_in_success += 1,
            CheckInOutcome::Warning => state.check_in_warning += 1,
            CheckInOutcome::Error => state.check_in_error += 1,
        }
        if manual {
            state.manual_check_ins += 1;
        }
    }

    fn record_dashboard_fetch(&self, ok: bool) {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        state.dashboard_fetches += 1;
        if !ok {
            state.dashboard_failures += 1;
        }
    }

    fn snapshot_current(&self) -> Snapshot {
        let state = self.state.lock().expect("metrics mutex poisoned");
        state.snapshot(state.last_reset.elapsed())
    }

    async fn run(self: Arc<Self>) {
        let mut current_secs = self.interval_secs.load(Ordering::Relaxed).max(5);
        loop {
            let mut ticker = time::interval(Duration::from_secs(current_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Align the ticker so the first report happens after a full interval
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let snapshot = self.snapshot_and_reset();
                store_snapshot(&snapshot);
                log_snapshot(&snapshot);

                let next_secs = self.interval_secs.load(Ordering::Relaxed).max(5);
                if next_secs != current_secs {
                    current_secs = next_secs;
                    break;
                }
            }
        }
    }

    fn snapshot_and_reset(&self) -> Snapshot {
        let mut state = self.state.lock().expect("metrics mutex poisoned");
        state.snapshot_and_reset()
    }
}

struct MetricsState {
    ticks: u64,
    decode_hits: u64,
    scan_sessions: u64,
    scan_duration: Duration,
    check_in_success: u64,
    check_in_warning: u64,
    check_in_error: u64,
    manual_check_ins: u64,
    dashboard_fetches: u64,
    dashboard_failures: u64,
    last_reset: Instant,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            ticks: 0,
            decode_hits: 0,
            scan_sessions: 0,
            scan_duration: Duration::ZERO,
            check_in_success: 0,
            check_in_warning: 0,
            check_in_error: 0,
            manual_check_ins: 0,
            dashboard_fetches: 0,
            dashboard_failures: 0,
            last_reset: Instant::now(),
        }
    }

    fn snapshot(&self, elapsed: Duration) -> Snapshot {
        Snapshot {
            ticks: self.ticks,
            decode_hits: self.decode_hits,
            scan_sessions: self.scan_sessions,
            scan_duration: self.scan_duration,
            check_in_success: self.check_in_success,
            check_in_warning: self.check_in_warning,
            check_in_error: self.check_in_error,
            manual_check_ins: self.manual_check_ins,
            dashboard_fetches: self.dashboard_fetches,
            dashboard_failures: self.dashboard_failures,
            elapsed,
        }
    }

    fn snapshot_and_reset(&mut self) -> Snapshot {
        let snapshot = self.snapshot(self.last_reset.elapsed());
        *self = Self::new();
        snapshot
    }
}

#[derive(Clone)]
struct Snapshot {
    ticks: u64,
    decode_hits: u64,
    scan_sessions: u64,
    scan_duration: Duration,
    check_in_success: u64,
    check_in_warning: u64,
    check_in_error: u64,
    manual_check_ins: u64,
    dashboard_fetches: u64,
    dashboard_failures: u64,
    elapsed: Duration,
}

impl Snapshot {
    fn hit_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            (self.decode_hits as f64 / self.ticks as f64) * 100.0
        }
    }

    fn avg_time_to_decode_ms(&self) -> f64 {
        if self.scan_sessions == 0 {
            0.0
        } else {
            self.scan_duration.as_secs_f64() * 1_000.0 / self.scan_sessions as f64
        }
    }
}

fn log_snapshot(snapshot: &Snapshot) {
    info!(
        target: "entrylink::metrics",
        interval_secs = snapshot.elapsed.as_secs(),
        ticks = snapshot.ticks,
        decode_hits = snapshot.decode_hits,
        hit_rate = format_args!("{:.1}%", snapshot.hit_rate()),
        scan_sessions = snapshot.scan_sessions,
        avg_time_to_decode_ms = snapshot.avg_time_to_decode_ms(),
        check_in_success = snapshot.check_in_success,
        check_in_warning = snapshot.check_in_warning,
        check_in_error = snapshot.check_in_error,
        manual_check_ins = snapshot.manual_check_ins,
        dashboard_fetches = snapshot.dashboard_fetches,
        dashboard_failures = snapshot.dashboard_failures,
        "Check-in metrics window"
    );
}

fn store_snapshot(snapshot: &Snapshot) {
    let lock = LAST_SNAPSHOT.get_or_init(|| Mutex::new(None));
    if let Ok(mut guard) = lock.lock() {
        *guard = Some(snapshot.clone());
    }
}

fn latest_snapshot() -> Option<Snapshot> {
    let lock = LAST_SNAPSHOT.get_or_init(|| Mutex::new(None));
    match lock.lock() {
        Ok(guard) => (*guard).clone(),
        Err(_) => None,
    }
}

fn snapshot_fallback() -> Option<Snapshot> {
    METRICS.get().map(|inner| inner.snapshot_current())
}

async fn run_http_listener(listener: TcpListener) -> Result<()> {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(target: "entrylink::metrics", error = %err, "metrics accept failed");
                time::sleep(Duration::from_millis(250)).await;
                continue;
            }
        };

        let peer = addr;
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream).await {
                tracing::debug!(target: "entrylink::metrics", peer = %peer, error = %err, "metrics connection closed");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream) -> Result<()> {
    let mut buffer = [0u8; 1024];
    let _ = stream.read(&mut buffer).await.map_err(Error::Io)?;

    let snapshot = latest_snapshot().or_else(|| {
        let fresh = snapshot_fallback();
        if let Some(ref snapshot) = fresh {
            store_snapshot(snapshot);
        }
        fresh
    });

    let (status_line, content_type, body) = match snapshot {
        Some(snapshot) => {
            let payload = snapshot_to_http(&snapshot);
            let body = serde_json::to_vec(&payload)?;
            ("HTTP/1.1 200 OK\r\n", Some("application/json"), body)
        }
        None => ("HTTP/1.1 204 No Content\r\n", None, Vec::new()),
    };

    let mut response = Vec::with_capacity(128 + body.len());
    response.extend_from_slice(status_line.as_bytes());
    response.extend_from_slice(b"Connection: close\r\n");
    response.extend_from_slice(b"Cache-Control: no-store\r\n");
    if let Some(content_type) = content_type {
        response.extend_from_slice(b"Content-Type: ");
        response.extend_from_slice(content_type.as_bytes());
        response.extend_from_slice(b"\r\n");
    }
    let length_header = format!("Content-Length: {}\r\n\r\n", body.len());
    response.extend_from_slice(length_header.as_bytes());
    response.extend_from_slice(&body);

    stream.write_all(&response).await.map_err(Error::Io)?;
    stream.shutdown().await.map_err(Error::Io)?;

    Ok(())
}

#[derive(Serialize)]
struct HttpMetrics {
    window_secs: u64,
    ticks: u64,
    decode_hits: u64,
    hit_rate: f64,
    scan_sessions: u64,
    avg_time_to_decode_ms: f64,
    check_ins: HttpCheckInMetrics,
    dashboard: HttpDashboardMetrics,
}

#[derive(Serialize)]
struct HttpCheckInMetrics {
    success: u64,
    warning: u64,
    error: u64,
    manual: u64,
}

#[derive(Serialize)]
struct HttpDashboardMetrics {
    fetches: u64,
    failures: u64,
}

fn snapshot_to_http(snapshot: &Snapshot) -> HttpMetrics {
    HttpMetrics {
        window_secs: snapshot.elapsed.as_secs(),
        ticks: snapshot.ticks,
        decode_hits: snapshot.decode_hits,
        hit_rate: snapshot.hit_rate(),
        scan_sessions: snapshot.scan_sessions,
        avg_time_to_decode_ms: snapshot.avg_time_to_decode_ms(),
        check_ins: HttpCheckInMetrics {
            success: snapshot.check_in_success,
            warning: snapshot.check_in_warning,
            error: snapshot.check_in_error,
            manual: snapshot.manual_check_ins,
        },
        dashboard: HttpDashboardMetrics {
            fetches: snapshot.dashboard_fetches,
            failures: snapshot.dashboard_failures,
        },
    }
}
