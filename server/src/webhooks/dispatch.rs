//! Webhook Event Dispatch
//!
//! Fans one event out to every configured destination. Deliveries run
//! concurrently, each under its own deadline; one destination failing never
//! delays or cancels the others. Failed deliveries are not retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{info, warn};

use super::signing::{signature_header, SIGNATURE_HEADER};
use crate::payload::{EventKind, WebhookEvent};

/// Default per-destination deadline.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of delivering to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub endpoint: String,
    pub succeeded: bool,
    pub detail: String,
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.detail)
    }
}

/// Outcomes of one dispatch, in destination order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event: EventKind,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("All {} webhook destinations failed for {event}: {}", .outcomes.len(), join_details(.outcomes))]
    AllFailed {
        event: EventKind,
        outcomes: Vec<DeliveryOutcome>,
    },
    #[error("Failed to serialize webhook body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

fn join_details(outcomes: &[DeliveryOutcome]) -> String {
    outcomes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Delivers webhook events to a fixed destination list.
pub struct WebhookDispatcher {
    http: reqwest::Client,
    destinations: Arc<[String]>,
    secret: Option<Arc<[u8]>>,
    timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(
        destinations: Vec<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            destinations: destinations.into(),
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| Arc::from(s.into_bytes())),
            timeout,
        })
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// Deliver `event` to every destination.
    ///
    /// Succeeds when the list is empty or at least one destination accepted
    /// the event. Fails only when every destination failed.
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<DispatchReport, DispatchError> {
        let kind = event.kind();
        let destinations = Arc::clone(&self.destinations);

        if destinations.is_empty() {
            info!(event = %kind, "No webhook destinations configured, skipping dispatch");
            return Ok(DispatchReport {
                event: kind,
                outcomes: Vec::new(),
            });
        }

        let body = serde_json::to_vec(event)?;
        let signature = self.secret.as_deref().map(|s| signature_header(s, &body));

        info!(event = %kind, destinations = destinations.len(), "Forwarding webhook event");
        let outcomes = join_all(
            destinations
                .iter()
                .map(|url| self.deliver(url, kind, &body, signature.as_deref())),
        )
        .await;

        let report = DispatchReport {
            event: kind,
            outcomes,
        };

        if report.succeeded() == 0 {
            return Err(DispatchError::AllFailed {
                event: kind,
                outcomes: report.outcomes,
            });
        }

        if report.failed() > 0 {
            let failures: Vec<&DeliveryOutcome> =
                report.outcomes.iter().filter(|o| !o.succeeded).collect();
            warn!(
                event = %kind,
                succeeded = report.succeeded(),
                total = report.outcomes.len(),
                failures = ?failures,
                "Some webhook destinations failed"
            );
        } else {
            info!(event = %kind, "Webhook event forwarded to all destinations");
        }

        Ok(report)
    }

    async fn deliver(
        &self,
        url: &str,
        kind: EventKind,
        body: &[u8],
        signature: Option<&str>,
    ) -> DeliveryOutcome {
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Webhook-Event", kind.as_str())
            .body(body.to_vec());
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let (succeeded, detail) = match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(resp)) if resp.status().is_success() => (true, format!("HTTP {}", resp.status().as_u16())),
            Ok(Ok(resp)) => (false, format!("HTTP {}", resp.status().as_u16())),
            Ok(Err(e)) => (false, e.to_string()),
            Err(_) => (false, format!("timed out after {}ms", self.timeout.as_millis())),
        };

        if !succeeded {
            warn!(event = %kind, url, error = %detail, "Webhook delivery failed");
        }

        DeliveryOutcome {
            endpoint: url.to_string(),
            succeeded,
            detail,
        }
    }
}
