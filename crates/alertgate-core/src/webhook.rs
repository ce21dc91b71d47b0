//! Alertmanager wire formats.
//!
//! [`WebhookMessage`] is the envelope Alertmanager posts to webhook receivers
//! and what we forward to routes. [`WireAlert`] is one alert inside it and is
//! also the postable shape of `POST /api/v2/alerts`. [`StoredAlert`] is the
//! gettable shape returned by `GET /api/v2/alerts`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::types::{AlertEvent, AlertState, AlertStatus, format_timestamp, parse_timestamp};

/// Alertmanager's zero time, sent as `endsAt` on alerts with no end.
const ZERO_TIME_PREFIX: &str = "0001-01-01";

/// Webhook envelope, compatible with Alertmanager webhook receivers.
///
/// Unknown fields are carried through untouched so a forwarded message keeps
/// whatever the source sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    /// Payload version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Group key of the notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    /// Number of alerts truncated by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_alerts: Option<u64>,
    /// Group status (`firing` or `resolved`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Receiver name at the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Grouping labels.
    #[serde(default)]
    pub group_labels: HashMap<String, String>,
    /// Labels common to all alerts.
    #[serde(default)]
    pub common_labels: HashMap<String, String>,
    /// Annotations common to all alerts.
    #[serde(default)]
    pub common_annotations: HashMap<String, String>,
    /// Link back to the source.
    #[serde(default, rename = "externalURL", skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    /// The alerts.
    #[serde(default)]
    pub alerts: Vec<WireAlert>,
    /// Fields we do not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WebhookMessage {
    /// Returns a copy of this envelope carrying only `alert`.
    ///
    /// The group status follows the alert's status.
    #[must_use]
    pub fn single(&self, alert: &AlertEvent) -> Self {
        Self {
            status: Some(alert.status().as_str().to_string()),
            truncated_alerts: self.truncated_alerts.map(|_| 0),
            alerts: vec![WireAlert::from(alert)],
            ..self.clone()
        }
    }
}

/// One alert as it appears on the wire.
///
/// Every field is optional so a batch can be decoded even when one alert is
/// malformed; [`AlertEvent::try_from`] does the validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAlert {
    /// `firing` or `resolved`. Absent on postable alerts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Identifying labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// RFC 3339 start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
    /// RFC 3339 end time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    /// Source URL.
    #[serde(default, rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
    /// Source fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl WireAlert {
    /// The `alertname` label, if present.
    #[must_use]
    pub fn alertname(&self) -> Option<&str> {
        self.labels
            .get(crate::types::LABEL_ALERTNAME)
            .map(String::as_str)
    }

    /// Drops the status so the alert can be posted to the store.
    #[must_use]
    pub fn into_postable(mut self) -> Self {
        self.status = None;
        self
    }
}

impl TryFrom<WireAlert> for AlertEvent {
    type Error = AlertError;

    fn try_from(wire: WireAlert) -> Result<Self> {
        let status = wire
            .status
            .as_deref()
            .ok_or_else(|| AlertError::missing("status"))
            .and_then(AlertStatus::parse)?;

        let starts_at = wire
            .starts_at
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AlertError::missing("startsAt"))
            .and_then(|s| parse_timestamp("startsAt", s))?;

        let ends_at = match wire.ends_at.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) if s.starts_with(ZERO_TIME_PREFIX) => None,
            Some(s) => Some(parse_timestamp("endsAt", s)?),
        };

        Ok(Self::new(wire.labels, status, starts_at)?
            .with_annotations(wire.annotations)
            .with_ends_at(ends_at)
            .with_generator_url(wire.generator_url)
            .with_fingerprint(wire.fingerprint))
    }
}

impl From<&AlertEvent> for WireAlert {
    fn from(alert: &AlertEvent) -> Self {
        Self {
            status: Some(alert.status().as_str().to_string()),
            labels: alert.labels().clone(),
            annotations: alert.annotations().clone(),
            starts_at: Some(format_timestamp(alert.starts_at())),
            ends_at: alert.ends_at().map(format_timestamp),
            generator_url: alert.generator_url().map(str::to_string),
            fingerprint: alert.fingerprint().map(str::to_string),
        }
    }
}

/// An alert as returned by the store's `GET /api/v2/alerts`.
///
/// The store's own `status` object, receivers and update time are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAlert {
    /// Identifying labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Annotations, including the notification state.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// RFC 3339 start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
    /// RFC 3339 end time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    /// Source URL.
    #[serde(default, rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
    /// Store fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl StoredAlert {
    /// The `alertname` label, if present.
    #[must_use]
    pub fn alertname(&self) -> Option<&str> {
        self.labels
            .get(crate::types::LABEL_ALERTNAME)
            .map(String::as_str)
    }

    /// Notification state recorded on the stored alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAnnotation` if a state annotation is
    /// unparseable.
    pub fn state(&self) -> Result<AlertState> {
        AlertState::from_annotations(&self.annotations)
    }

    /// Converts into the postable shape, keeping every field.
    #[must_use]
    pub fn into_postable(self) -> WireAlert {
        WireAlert {
            status: None,
            labels: self.labels,
            annotations: self.annotations,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            generator_url: self.generator_url,
            fingerprint: None,
        }
    }
}
