use std::io::Result as IoResult;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use entrylink::metrics::{self, CheckInOutcome};

fn next_free_port() -> IoResult<SocketAddr> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_endpoint_serves_json_metrics() {
    metrics::enable(10);
    metrics::record_tick(false);
    metrics::record_tick(true);
    metrics::record_scan_session(Duration::from_millis(600));
    metrics::record_check_in(CheckInOutcome::Success, false);
    metrics::record_check_in(CheckInOutcome::Error, true);
    metrics::record_dashboard_fetch(true);

    let addr = next_free_port().expect("allocate port");
    metrics::spawn_http_endpoint(addr).expect("spawn json endpoint");

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(addr).await.expect("connect json");
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .expect("write request");

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.expect("read response");

    let response = String::from_utf8_lossy(&buf);
    assert!(
        response.starts_with("HTTP/1.1 200"),
        "unexpected status: {response}"
    );

    let split: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    assert_eq!(split.len(), 2, "invalid HTTP response format");
    let body = split[1];
    let payload: Value = serde_json::from_str(body).expect("parse json metrics");

    let ticks = payload["ticks"].as_u64().unwrap_or_default();
    assert!(ticks >= 2, "expected recorded sampling ticks");

    let hits = payload["decode_hits"].as_u64().unwrap_or_default();
    assert!(hits >= 1, "expected at least one decode hit");

    let sessions = payload["scan_sessions"].as_u64().unwrap_or_default();
    assert!(sessions >= 1, "expected a recorded scan session");

    let success = payload["check_ins"]["success"].as_u64().unwrap_or_default();
    assert!(success >= 1, "expected a successful check-in");

    let manual = payload["check_ins"]["manual"].as_u64().unwrap_or_default();
    assert!(manual >= 1, "expected a manual check-in");

    let fetches = payload["dashboard"]["fetches"].as_u64().unwrap_or_default();
    assert!(fetches >= 1, "expected a dashboard fetch");
}
