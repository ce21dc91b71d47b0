//! Incident intake.
//!
//! Monitored systems report incidents by name. Each report becomes a
//! postable alert carrying the incident bookkeeping annotations; finishing a
//! report ends the matching active alert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::types::{
    ANNOTATION_RULES, AlertState, DEFAULT_RULE_NAME, LABEL_ALERTNAME, format_timestamp,
};
use crate::webhook::{StoredAlert, WireAlert};

/// Annotation holding the human-readable incident description.
pub const ANNOTATION_DESCRIPTION: &str = "description";

/// One incident as reported by a monitored system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Alert name.
    pub name: String,
    /// Description shown by notifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Link back to the reporting system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Rule override name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
}

impl IncidentReport {
    /// Creates a report with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AlertError::missing("name"));
        }
        Ok(())
    }
}

/// Returns the first active alert named `name`.
#[must_use]
pub fn find_active<'a>(alerts: &'a [StoredAlert], name: &str) -> Option<&'a StoredAlert> {
    alerts.iter().find(|a| a.alertname() == Some(name))
}

/// Builds the alert to post for a new incident.
///
/// With an `existing` active alert the notification time is carried over,
/// the start time is kept and the count is incremented. Otherwise the
/// count starts at 1.
///
/// # Errors
///
/// Returns `AlertError::MissingRequiredField` for a report without a name
/// and `AlertError::InvalidAnnotation` if the existing alert's state
/// annotations are unparseable.
pub fn record_incident(
    report: &IncidentReport,
    existing: Option<&StoredAlert>,
    now: DateTime<Utc>,
) -> Result<WireAlert> {
    report.validate()?;

    let previous = existing.map(StoredAlert::state).transpose()?;
    let state = AlertState {
        last_notification_at: previous.and_then(|s| s.last_notification_at),
        last_incident_at: Some(now),
        count: previous.map_or(1, |s| s.count.saturating_add(1)),
    };

    let mut alert = WireAlert {
        labels: [(LABEL_ALERTNAME.to_string(), report.name.clone())].into(),
        starts_at: Some(
            existing
                .and_then(|e| e.starts_at.clone())
                .unwrap_or_else(|| format_timestamp(now)),
        ),
        generator_url: report.url.clone(),
        ..WireAlert::default()
    };

    state.write_annotations(&mut alert.annotations);
    alert.annotations.insert(
        ANNOTATION_DESCRIPTION.to_string(),
        report.description.clone().unwrap_or_default(),
    );
    alert.annotations.insert(
        ANNOTATION_RULES.to_string(),
        report
            .rules
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_RULE_NAME.to_string()),
    );

    Ok(alert)
}

/// Builds the alert to post to end `existing` now.
///
/// A non-empty description or url in the report overwrites the stored one.
#[must_use]
pub fn finish_incident(
    report: &IncidentReport,
    existing: &StoredAlert,
    now: DateTime<Utc>,
) -> WireAlert {
    let mut alert = existing.clone().into_postable();
    alert.ends_at = Some(format_timestamp(now));

    if let Some(description) = report.description.as_ref().filter(|d| !d.is_empty()) {
        alert
            .annotations
            .insert(ANNOTATION_DESCRIPTION.to_string(), description.clone());
    }
    if let Some(url) = report.url.as_ref().filter(|u| !u.is_empty()) {
        alert.generator_url = Some(url.clone());
    }
    alert
}
