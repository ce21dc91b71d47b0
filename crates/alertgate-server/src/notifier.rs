//! Notification delivery.

use std::fmt;
use std::time::Duration;

use alertgate_core::WebhookMessage;
use async_trait::async_trait;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// Result of delivering to one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Whether the route accepted the message.
    pub success: bool,
    /// The route.
    pub route: String,
    /// Optional message or error description.
    pub message: Option<String>,
    /// Response status code (if applicable).
    pub status_code: Option<u16>,
}

impl DeliveryResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(route: impl Into<String>) -> Self {
        Self {
            success: true,
            route: route.into(),
            message: None,
            status_code: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            route: route.into(),
            message: Some(message.into()),
            status_code: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }
}

/// Delivers webhook messages to routes.
///
/// Each call handles exactly one route; routes are independent of each other.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Sends `message` to `route`.
    async fn deliver(&self, route: &str, message: &WebhookMessage) -> DeliveryResult;
}

/// Posts messages as JSON, Alertmanager webhook style.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Creates a notifier whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, route: &str, message: &WebhookMessage) -> DeliveryResult {
        match self.client.post(route).json(message).send().await {
            Ok(resp) => {
                let status = resp.status();
                debug!(route = %route, status = status.as_u16(), "route answered");
                if status.is_success() {
                    DeliveryResult::success(route).with_status_code(status.as_u16())
                } else {
                    DeliveryResult::failure(route, format!("HTTP {status}"))
                        .with_status_code(status.as_u16())
                }
            }
            Err(e) => DeliveryResult::failure(route, e.to_string()),
        }
    }
}
