use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use entrylink::api::{CheckInClient, CheckInResult, CheckInStatus, DashboardData};
use entrylink::dashboard::DashboardPoller;
use entrylink::error::Error;

/// Minimal HTTP/1.1 stub standing in for the check-in backend. Records the
/// request line of every call so tests can assert on query parameters (or on
/// the absence of any call at all).
struct StubBackend {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubBackend {
    async fn spawn(status_line: &'static str, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _peer)) = listener.accept().await else {
                    break;
                };
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    if let Some(line) = request.lines().next() {
                        log.lock().expect("request log").push(line.to_string());
                    }

                    let response = format!(
                        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }
}

async fn unreachable_base_url() -> String {
    // Bind and immediately drop a listener so the port is free but closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}/", addr)
}

#[tokio::test]
async fn check_in_round_trips_the_backend_result() {
    let stub = StubBackend::spawn(
        "HTTP/1.1 200 OK",
        r#"{"success":true,"status":"SUCCESS","message":"Welcome!","name":"Taro","id":"M001","checkInTime":"10:00"}"#,
    )
    .await;

    let client = CheckInClient::new(stub.base_url());
    let result = client.check_in("MEMBER-TOKEN-123").await;

    assert_eq!(
        result,
        CheckInResult {
            success: true,
            status: CheckInStatus::Success,
            message: "Welcome!".to_string(),
            name: Some("Taro".to_string()),
            id: Some("M001".to_string()),
            check_in_time: Some("10:00".to_string()),
        }
    );

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("action=checkIn"));
    assert!(requests[0].contains("token=MEMBER-TOKEN-123"));
}

#[tokio::test]
async fn manual_check_in_sends_the_member_id() {
    let stub = StubBackend::spawn(
        "HTTP/1.1 200 OK",
        r#"{"success":true,"status":"WARNING","message":"Already checked in","name":"Taro","id":"M001","checkInTime":"09:45"}"#,
    )
    .await;

    let client = CheckInClient::new(stub.base_url());
    let result = client.manual_check_in("  M001 ").await.expect("result");

    assert!(result.success);
    assert_eq!(result.status, CheckInStatus::Warning);

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("action=manualCheckIn"));
    assert!(requests[0].contains("memberId=M001"));
}

#[tokio::test]
async fn empty_member_id_makes_no_network_call() {
    let stub = StubBackend::spawn("HTTP/1.1 200 OK", "{}").await;
    let client = CheckInClient::new(stub.base_url());

    assert!(matches!(
        client.manual_check_in("   ").await,
        Err(Error::EmptyMemberId)
    ));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn unreachable_backend_degrades_to_an_error_result() {
    let client = CheckInClient::new(unreachable_base_url().await);
    let result = client.check_in("MEMBER-TOKEN-123").await;

    assert!(!result.success);
    assert_eq!(result.status, CheckInStatus::Error);
    assert!(!result.message.is_empty());
}

#[tokio::test]
async fn non_ok_status_degrades_to_an_error_result() {
    let stub = StubBackend::spawn("HTTP/1.1 500 Internal Server Error", "oops").await;
    let client = CheckInClient::new(stub.base_url());

    let result = client.check_in("MEMBER-TOKEN-123").await;
    assert!(!result.success);
    assert_eq!(result.status, CheckInStatus::Error);
    assert!(!result.message.is_empty());
}

#[tokio::test]
async fn malformed_backend_json_degrades_to_an_error_result() {
    let stub = StubBackend::spawn("HTTP/1.1 200 OK", "not json").await;
    let client = CheckInClient::new(stub.base_url());

    let result = client.check_in("MEMBER-TOKEN-123").await;
    assert!(!result.success);
    assert_eq!(result.status, CheckInStatus::Error);
}

#[tokio::test]
async fn dashboard_returns_backend_counts() {
    let stub = StubBackend::spawn(
        "HTTP/1.1 200 OK",
        r#"{"total":100,"checkedIn":42,"notCheckedIn":58}"#,
    )
    .await;

    let client = CheckInClient::new(stub.base_url());
    let data = client.dashboard().await;

    assert_eq!(
        data,
        DashboardData {
            total: 100,
            checked_in: 42,
            not_checked_in: 58,
        }
    );
    assert_eq!(data.completion_percentage(), 42);

    let requests = stub.requests();
    assert!(requests[0].contains("action=dashboard"));
}

#[tokio::test]
async fn dashboard_failure_degrades_to_zeroed_counts() {
    let client = CheckInClient::new(unreachable_base_url().await);
    assert_eq!(client.dashboard().await, DashboardData::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dashboard_poller_publishes_snapshots() {
    let stub = StubBackend::spawn(
        "HTTP/1.1 200 OK",
        r#"{"total":10,"checkedIn":4,"notCheckedIn":6}"#,
    )
    .await;

    let client = Arc::new(CheckInClient::new(stub.base_url()));
    let poller = DashboardPoller::start_with_interval(client, Duration::from_millis(50)).await;

    // Initial fetch happens before start() returns.
    assert_eq!(poller.latest().total, 10);
    assert_eq!(poller.latest().checked_in, 4);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(stub.requests().len() >= 2, "poller should keep refreshing");

    poller.shutdown().await;
    let after_shutdown = stub.requests().len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        stub.requests().len(),
        after_shutdown,
        "no fetch may start after shutdown returns"
    );
}
