//! Alert store clients.
//!
//! The alert store is the single source of truth for notification state.
//! [`AlertmanagerStore`] talks to Alertmanager's v2 API; [`MemoryStore`]
//! keeps alerts in process.

use std::fmt;
use std::time::Duration;

use alertgate_core::types::{LABEL_ALERTNAME, LABEL_INSTANCE};
use alertgate_core::{StoredAlert, WireAlert};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

const ALERTS_PATH: &str = "/api/v2/alerts";

/// Read and write access to active alerts.
#[async_trait]
pub trait AlertStore: Send + Sync + fmt::Debug {
    /// Returns active alerts named `alertname`, narrowed to `instance` when
    /// given.
    async fn active(&self, alertname: &str, instance: Option<&str>) -> GatewayResult<Vec<StoredAlert>>;

    /// Creates or updates alerts. An alert with `endsAt` set is resolved.
    async fn post(&self, alerts: &[WireAlert]) -> GatewayResult<()>;
}

/// Alertmanager v2 API client.
#[derive(Debug, Clone)]
pub struct AlertmanagerStore {
    client: reqwest::Client,
    base_url: String,
}

impl AlertmanagerStore {
    /// Creates a client for the Alertmanager at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn alerts_url(&self) -> String {
        format!("{}{ALERTS_PATH}", self.base_url)
    }
}

/// Query string for an active-alert lookup.
fn active_query(alertname: &str, instance: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("active", "true".to_string()),
        ("filter", matcher(LABEL_ALERTNAME, alertname)),
    ];
    if let Some(instance) = instance {
        query.push(("filter", matcher(LABEL_INSTANCE, instance)));
    }
    query
}

/// An equality matcher with the value quoted and escaped.
fn matcher(label: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{label}=\"{escaped}\"")
}

#[async_trait]
impl AlertStore for AlertmanagerStore {
    async fn active(&self, alertname: &str, instance: Option<&str>) -> GatewayResult<Vec<StoredAlert>> {
        let alerts: Vec<StoredAlert> = self
            .client
            .get(self.alerts_url())
            .query(&active_query(alertname, instance))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(alert = %alertname, found = alerts.len(), "fetched active alerts");
        Ok(alerts)
    }

    async fn post(&self, alerts: &[WireAlert]) -> GatewayResult<()> {
        if alerts.is_empty() {
            return Ok(());
        }

        self.client
            .post(self.alerts_url())
            .json(alerts)
            .send()
            .await?
            .error_for_status()?;

        debug!(count = alerts.len(), "posted alerts to store");
        Ok(())
    }
}

/// In-process alert store.
///
/// Alerts are keyed by their label set. Posting an alert with `endsAt`
/// removes it from the active set. Every post is also kept in order for
/// inspection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    active: Mutex<Vec<StoredAlert>>,
    posted: Mutex<Vec<WireAlert>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `alerts` as active.
    #[must_use]
    pub fn with_active(alerts: Vec<StoredAlert>) -> Self {
        Self {
            active: Mutex::new(alerts),
            posted: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the active alerts.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<StoredAlert> {
        self.active.lock().clone()
    }

    /// Every alert posted so far, oldest first.
    #[must_use]
    pub fn posted(&self) -> Vec<WireAlert> {
        self.posted.lock().clone()
    }
}

fn to_stored(alert: &WireAlert) -> StoredAlert {
    StoredAlert {
        labels: alert.labels.clone(),
        annotations: alert.annotations.clone(),
        starts_at: alert.starts_at.clone(),
        ends_at: alert.ends_at.clone(),
        generator_url: alert.generator_url.clone(),
        fingerprint: alert.fingerprint.clone(),
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn active(&self, alertname: &str, instance: Option<&str>) -> GatewayResult<Vec<StoredAlert>> {
        let active = self.active.lock();
        Ok(active
            .iter()
            .filter(|a| a.alertname() == Some(alertname))
            .filter(|a| instance.is_none_or(|i| a.labels.get(LABEL_INSTANCE).map(String::as_str) == Some(i)))
            .cloned()
            .collect())
    }

    async fn post(&self, alerts: &[WireAlert]) -> GatewayResult<()> {
        let mut active = self.active.lock();
        for alert in alerts {
            active.retain(|a| a.labels != alert.labels);
            if alert.ends_at.is_none() {
                active.push(to_stored(alert));
            }
        }
        self.posted.lock().extend_from_slice(alerts);
        Ok(())
    }
}
