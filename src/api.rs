//! HTTP client for the remote check-in backend
//!
//! The backend owns all business logic: token validity, duplicate detection,
//! attendance storage. This client only transports requests and results over
//! plain HTTP GET with query parameters.
//!
//! Transport failures never escape as errors from the check-in calls: the UI
//! layer always receives a structured [`CheckInResult`] (or zeroed dashboard
//! counts) and never needs to handle a thrown fault.

use crate::error::{Error, Result};
use crate::metrics::{self, CheckInOutcome};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request timeout for backend calls
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status discriminator returned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckInStatus {
    /// Member checked in
    Success,
    /// Checked in with a caveat (e.g. already checked in earlier)
    Warning,
    /// Check-in rejected or failed
    Error,
}

/// Result of a check-in attempt, produced by the backend and passed through
/// verbatim. Locally constructed only for transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResult {
    /// Whether the check-in was accepted
    pub success: bool,
    /// Status discriminator for presentation
    pub status: CheckInStatus,
    /// Operator-facing message
    pub message: String,
    /// Member name, when the backend resolved one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Member id, when the backend resolved one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Recorded check-in time, backend-formatted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<String>,
}

impl CheckInResult {
    /// Locally constructed failure for transport-level problems.
    pub fn transport_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            status: CheckInStatus::Error,
            message: if message.is_empty() {
                "Unknown error occurred".to_string()
            } else {
                message
            },
            name: None,
            id: None,
            check_in_time: None,
        }
    }

    fn outcome(&self) -> CheckInOutcome {
        match self.status {
            CheckInStatus::Success => CheckInOutcome::Success,
            CheckInStatus::Warning => CheckInOutcome::Warning,
            CheckInStatus::Error => CheckInOutcome::Error,
        }
    }
}

/// Aggregate check-in counts for the event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    /// Total registered attendees
    pub total: u64,
    /// Attendees already checked in
    pub checked_in: u64,
    /// Attendees not yet checked in
    pub not_checked_in: u64,
}

impl DashboardData {
    /// Check-in completion as a rounded percentage (0 when nobody registered)
    pub fn completion_percentage(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            ((self.checked_in as f64 / self.total as f64) * 100.0).round() as u64
        }
    }
}

/// Client for the check-in backend, addressed by a single base URL.
pub struct CheckInClient {
    http: Client,
    base_url: String,
}

impl CheckInClient {
    /// Create a client for the given base URL.
    ///
    /// The URL is not validated here: an unusable value (including the empty
    /// string) degrades to error results at request time instead of failing
    /// construction.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check in a member by scanned QR token.
    pub async fn check_in(&self, token: &str) -> CheckInResult {
        self.fetch_check_in(&[("action", "checkIn"), ("token", token)], false)
            .await
    }

    /// Check in a member by operator-typed member id.
    ///
    /// An empty or whitespace-only id is rejected before any request is
    /// constructed; no network call is made.
    pub async fn manual_check_in(&self, member_id: &str) -> Result<CheckInResult> {
        let member_id = member_id.trim();
        if member_id.is_empty() {
            return Err(Error::EmptyMemberId);
        }

        Ok(self
            .fetch_check_in(&[("action", "manualCheckIn"), ("memberId", member_id)], true)
            .await)
    }

    /// Fetch aggregate check-in counts. Failures degrade to zeroed counts.
    pub async fn dashboard(&self) -> DashboardData {
        match self.get_json(&[("action", "dashboard")]).await {
            Ok(data) => {
                metrics::record_dashboard_fetch(true);
                data
            }
            Err(err) => {
                tracing::warn!("Dashboard fetch failed: {err}");
                metrics::record_dashboard_fetch(false);
                DashboardData::default()
            }
        }
    }

    async fn fetch_check_in(&self, params: &[(&str, &str)], manual: bool) -> CheckInResult {
        let result = match self.get_json::<CheckInResult>(params).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("Check-in request failed: {err}");
                CheckInResult::transport_error(err.to_string())
            }
        };

        metrics::record_check_in(result.outcome(), manual);
        result
    }

    async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let url = Url::parse_with_params(&self.base_url, params)
            .map_err(|_| Error::InvalidBaseUrl(self.base_url.clone()))?;

        let response = self.http.get(url).timeout(REQUEST_TIMEOUT).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::BackendStatus(status.as_u16()));
        }

        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_percentage_rounds() {
        let data = DashboardData {
            total: 100,
            checked_in: 42,
            not_checked_in: 58,
        };
        assert_eq!(data.completion_percentage(), 42);

        let data = DashboardData {
            total: 3,
            checked_in: 2,
            not_checked_in: 1,
        };
        assert_eq!(data.completion_percentage(), 67);
    }

    #[test]
    fn completion_percentage_with_nobody_registered() {
        assert_eq!(DashboardData::default().completion_percentage(), 0);
    }

    #[test]
    fn check_in_result_wire_format() {
        let json = r#"{
            "success": true,
            "status": "SUCCESS",
            "message": "Welcome!",
            "name": "Taro",
            "id": "M001",
            "checkInTime": "10:00"
        }"#;

        let result: CheckInResult = serde_json::from_str(json).unwrap();
        assert!(result.success);
        assert_eq!(result.status, CheckInStatus::Success);
        assert_eq!(result.name.as_deref(), Some("Taro"));
        assert_eq!(result.id.as_deref(), Some("M001"));
        assert_eq!(result.check_in_time.as_deref(), Some("10:00"));
    }

    #[test]
    fn error_result_omits_member_fields() {
        let json = r#"{"success":false,"status":"ERROR","message":"Invalid token"}"#;
        let result: CheckInResult = serde_json::from_str(json).unwrap();
        assert!(!result.success);
        assert_eq!(result.status, CheckInStatus::Error);
        assert!(result.name.is_none());
        assert!(result.check_in_time.is_none());
    }

    #[test]
    fn transport_error_message_is_never_empty() {
        let result = CheckInResult::transport_error("");
        assert!(!result.success);
        assert_eq!(result.status, CheckInStatus::Error);
        assert!(!result.message.is_empty());
    }

    #[tokio::test]
    async fn empty_member_id_is_rejected_before_any_request() {
        // Base URL is unusable on purpose; validation must fire first.
        let client = CheckInClient::new("");
        assert!(matches!(
            client.manual_check_in("   ").await,
            Err(Error::EmptyMemberId)
        ));
    }

    #[tokio::test]
    async fn empty_base_url_degrades_to_error_result() {
        let client = CheckInClient::new("");
        let result = client.check_in("MEMBER-TOKEN-123").await;
        assert!(!result.success);
        assert_eq!(result.status, CheckInStatus::Error);
        assert!(!result.message.is_empty());
    }

    #[tokio::test]
    async fn empty_base_url_dashboard_returns_zeroed_counts() {
        let client = CheckInClient::new("");
        assert_eq!(client.dashboard().await, DashboardData::default());
    }
}
