//! Core types for the decision engine.
//!
//! - [`AlertStatus`]: firing or resolved
//! - [`AlertEvent`]: one validated alert occurrence
//! - [`AlertState`]: notification bookkeeping kept in the alert store

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// Label carrying the alert identity.
pub const LABEL_ALERTNAME: &str = "alertname";
/// Optional label narrowing the identity to one target.
pub const LABEL_INSTANCE: &str = "instance";
/// Annotation holding the last notification timestamp.
pub const ANNOTATION_LAST_NOTIFICATION: &str = "lastNotification";
/// Annotation holding the last incident timestamp.
pub const ANNOTATION_LAST_INCIDENT: &str = "lastIncident";
/// Annotation holding the occurrence count.
pub const ANNOTATION_COUNT: &str = "count";
/// Annotation (or label) naming the rule override to apply.
pub const ANNOTATION_RULES: &str = "rules";
/// Rule name used when an alert names none.
pub const DEFAULT_RULE_NAME: &str = "default";

/// Whether an alert is currently firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The alert condition holds.
    Firing,
    /// The alert condition cleared.
    Resolved,
}

impl AlertStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }

    /// Parses the wire representation.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::MissingRequiredField` for anything other than
    /// `firing` or `resolved`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "firing" => Ok(Self::Firing),
            "resolved" => Ok(Self::Resolved),
            _ => Err(AlertError::MissingRequiredField {
                field: format!("status (got {value:?})"),
            }),
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable snapshot of one alert occurrence.
///
/// Construction guarantees the `alertname` label is present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    labels: HashMap<String, String>,
    annotations: HashMap<String, String>,
    status: AlertStatus,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    generator_url: Option<String>,
    fingerprint: Option<String>,
}

impl AlertEvent {
    /// Creates a new event.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::MissingRequiredField` if `labels` has no
    /// non-empty `alertname`.
    pub fn new(
        labels: HashMap<String, String>,
        status: AlertStatus,
        starts_at: DateTime<Utc>,
    ) -> Result<Self> {
        if labels.get(LABEL_ALERTNAME).is_none_or(String::is_empty) {
            return Err(AlertError::missing("labels.alertname"));
        }

        Ok(Self {
            labels,
            annotations: HashMap::new(),
            status,
            starts_at,
            ends_at: None,
            generator_url: None,
            fingerprint: None,
        })
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Replaces all annotations.
    #[must_use]
    pub fn with_annotations(mut self, annotations: HashMap<String, String>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Sets the end timestamp.
    #[must_use]
    pub const fn with_ends_at(mut self, ends_at: Option<DateTime<Utc>>) -> Self {
        self.ends_at = ends_at;
        self
    }

    /// Sets the generator URL.
    #[must_use]
    pub fn with_generator_url(mut self, url: Option<String>) -> Self {
        self.generator_url = url;
        self
    }

    /// Sets the upstream fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// The `alertname` label.
    #[must_use]
    pub fn name(&self) -> &str {
        self.labels
            .get(LABEL_ALERTNAME)
            .map_or("", String::as_str)
    }

    /// The `instance` label, if any.
    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        self.labels.get(LABEL_INSTANCE).map(String::as_str)
    }

    /// Name of the rule override this alert asks for.
    ///
    /// `annotations.rules` wins over `labels.rules`; an alert naming neither
    /// uses [`DEFAULT_RULE_NAME`].
    #[must_use]
    pub fn rule_name(&self) -> &str {
        self.requested_rule_name().unwrap_or(DEFAULT_RULE_NAME)
    }

    /// The rule name carried by the alert itself, if any.
    #[must_use]
    pub fn requested_rule_name(&self) -> Option<&str> {
        self.annotations
            .get(ANNOTATION_RULES)
            .or_else(|| self.labels.get(ANNOTATION_RULES))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Labels of the alert.
    #[must_use]
    pub const fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }

    /// Annotations of the alert.
    #[must_use]
    pub const fn annotations(&self) -> &HashMap<String, String> {
        &self.annotations
    }

    /// Firing or resolved.
    #[must_use]
    pub const fn status(&self) -> AlertStatus {
        self.status
    }

    /// When the alert started.
    #[must_use]
    pub const fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    /// When the alert ended, if known.
    #[must_use]
    pub const fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    /// Source URL of the alert.
    #[must_use]
    pub fn generator_url(&self) -> Option<&str> {
        self.generator_url.as_deref()
    }

    /// Upstream fingerprint, if the source sent one.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Reads the notification state recorded in this alert's annotations.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAnnotation` if a state annotation is
    /// present but unparseable.
    pub fn recorded_state(&self) -> Result<AlertState> {
        AlertState::from_annotations(&self.annotations)
    }

    /// Returns a copy with `endsAt` stamped and `state` written into the
    /// annotations.
    #[must_use]
    pub(crate) fn stamped(&self, state: &AlertState, ends_at: Option<DateTime<Utc>>) -> Self {
        let mut copy = self.clone();
        state.write_annotations(&mut copy.annotations);
        copy.ends_at = ends_at;
        copy
    }
}

/// Notification bookkeeping for one alert, as held by the alert store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    /// When a notification was last sent, if ever.
    pub last_notification_at: Option<DateTime<Utc>>,
    /// When the incident was last reported by its source, if known.
    pub last_incident_at: Option<DateTime<Utc>>,
    /// How many incidents have been reported (at least 1).
    pub count: u32,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            last_notification_at: None,
            last_incident_at: None,
            count: 1,
        }
    }
}

impl AlertState {
    /// Parses state from alert annotations.
    ///
    /// Absent or empty timestamps mean "never"; an absent count means 1.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAnnotation` for unparseable timestamps or
    /// a count that is not a positive integer.
    pub fn from_annotations(annotations: &HashMap<String, String>) -> Result<Self> {
        let count = match non_empty(annotations, ANNOTATION_COUNT) {
            None => 1,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                Ok(_) => return Err(invalid_annotation(ANNOTATION_COUNT, raw, "must be at least 1")),
                Err(e) => return Err(invalid_annotation(ANNOTATION_COUNT, raw, &e.to_string())),
            },
        };

        Ok(Self {
            last_notification_at: annotation_timestamp(annotations, ANNOTATION_LAST_NOTIFICATION)?,
            last_incident_at: annotation_timestamp(annotations, ANNOTATION_LAST_INCIDENT)?,
            count,
        })
    }

    /// Writes the state back into an annotation map.
    ///
    /// Timestamps that are `None` are left untouched.
    pub fn write_annotations(&self, annotations: &mut HashMap<String, String>) {
        if let Some(at) = self.last_notification_at {
            annotations.insert(ANNOTATION_LAST_NOTIFICATION.to_string(), format_timestamp(at));
        }
        if let Some(at) = self.last_incident_at {
            annotations.insert(ANNOTATION_LAST_INCIDENT.to_string(), format_timestamp(at));
        }
        annotations.insert(ANNOTATION_COUNT.to_string(), self.count.to_string());
    }
}

/// Parses an RFC 3339 timestamp, naming `field` on failure.
///
/// # Errors
///
/// Returns `AlertError::InvalidTimestamp` if `value` is not RFC 3339.
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AlertError::InvalidTimestamp {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Formats a timestamp the way the alert store echoes it back
/// (`2024-01-08T12:00:00.000Z`).
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty<'a>(annotations: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    annotations.get(key).filter(|v| !v.trim().is_empty())
}

fn annotation_timestamp(
    annotations: &HashMap<String, String>,
    key: &str,
) -> Result<Option<DateTime<Utc>>> {
    non_empty(annotations, key)
        .map(|raw| {
            parse_timestamp(key, raw)
                .map_err(|_| invalid_annotation(key, raw, "not an RFC 3339 timestamp"))
        })
        .transpose()
}

fn invalid_annotation(key: &str, value: &str, reason: &str) -> AlertError {
    AlertError::InvalidAnnotation {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn labels(name: &str) -> HashMap<String, String> {
        HashMap::from([(LABEL_ALERTNAME.to_string(), name.to_string())])
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap()
    }

    mod status_tests {
        use super::*;

        #[test]
        fn status_round_trip_strings() {
            assert_eq!(AlertStatus::parse("firing").unwrap(), AlertStatus::Firing);
            assert_eq!(AlertStatus::parse("resolved").unwrap(), AlertStatus::Resolved);
            assert_eq!(AlertStatus::Firing.to_string(), "firing");
        }

        #[test]
        fn status_rejects_unknown() {
            let err = AlertStatus::parse("pending").unwrap_err();
            assert!(matches!(err, AlertError::MissingRequiredField { .. }));
        }
    }

    mod event_tests {
        use super::*;

        #[test]
        fn event_requires_alertname() {
            let err = AlertEvent::new(HashMap::new(), AlertStatus::Firing, t0()).unwrap_err();
            assert!(matches!(err, AlertError::MissingRequiredField { .. }));

            let err = AlertEvent::new(labels(""), AlertStatus::Firing, t0()).unwrap_err();
            assert!(matches!(err, AlertError::MissingRequiredField { .. }));
        }

        #[test]
        fn event_accessors() {
            let mut l = labels("DiskFull");
            l.insert(LABEL_INSTANCE.to_string(), "db-1".to_string());
            let event = AlertEvent::new(l, AlertStatus::Firing, t0())
                .unwrap()
                .with_generator_url(Some("http://prom/graph".to_string()));

            assert_eq!(event.name(), "DiskFull");
            assert_eq!(event.instance(), Some("db-1"));
            assert_eq!(event.generator_url(), Some("http://prom/graph"));
            assert_eq!(event.starts_at(), t0());
            assert!(event.ends_at().is_none());
        }

        #[test]
        fn rule_name_prefers_annotation() {
            let mut l = labels("DiskFull");
            l.insert(ANNOTATION_RULES.to_string(), "from-label".to_string());
            let event = AlertEvent::new(l, AlertStatus::Firing, t0()).unwrap();
            assert_eq!(event.rule_name(), "from-label");

            let event = event.with_annotation(ANNOTATION_RULES, "from-annotation");
            assert_eq!(event.rule_name(), "from-annotation");
        }

        #[test]
        fn rule_name_defaults() {
            let event = AlertEvent::new(labels("DiskFull"), AlertStatus::Firing, t0())
                .unwrap()
                .with_annotation(ANNOTATION_RULES, "");
            assert_eq!(event.rule_name(), DEFAULT_RULE_NAME);
            assert_eq!(event.requested_rule_name(), None);
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn empty_annotations_give_default_state() {
            let state = AlertState::from_annotations(&HashMap::new()).unwrap();
            assert_eq!(state, AlertState::default());
            assert_eq!(state.count, 1);
        }

        #[test]
        fn parses_all_fields() {
            let annotations = HashMap::from([
                (ANNOTATION_LAST_NOTIFICATION.to_string(), "2024-01-08T12:00:00.000Z".to_string()),
                (ANNOTATION_LAST_INCIDENT.to_string(), "2024-01-08T13:00:00+01:00".to_string()),
                (ANNOTATION_COUNT.to_string(), "7".to_string()),
            ]);
            let state = AlertState::from_annotations(&annotations).unwrap();
            assert_eq!(state.last_notification_at, Some(t0()));
            assert_eq!(state.last_incident_at, Some(t0()));
            assert_eq!(state.count, 7);
        }

        #[test]
        fn empty_timestamp_means_never() {
            let annotations =
                HashMap::from([(ANNOTATION_LAST_NOTIFICATION.to_string(), String::new())]);
            let state = AlertState::from_annotations(&annotations).unwrap();
            assert!(state.last_notification_at.is_none());
        }

        #[test]
        fn rejects_bad_values() {
            for (key, value) in [
                (ANNOTATION_LAST_NOTIFICATION, "yesterday"),
                (ANNOTATION_COUNT, "many"),
                (ANNOTATION_COUNT, "0"),
            ] {
                let annotations = HashMap::from([(key.to_string(), value.to_string())]);
                let err = AlertState::from_annotations(&annotations).unwrap_err();
                assert!(matches!(err, AlertError::InvalidAnnotation { .. }), "{key}={value}");
            }
        }

        #[test]
        fn write_then_read_preserves_state() {
            let state = AlertState {
                last_notification_at: Some(t0()),
                last_incident_at: None,
                count: 3,
            };
            let mut annotations = HashMap::new();
            state.write_annotations(&mut annotations);

            assert_eq!(
                annotations.get(ANNOTATION_LAST_NOTIFICATION).map(String::as_str),
                Some("2024-01-08T12:00:00.000Z")
            );
            assert!(!annotations.contains_key(ANNOTATION_LAST_INCIDENT));
            assert_eq!(AlertState::from_annotations(&annotations).unwrap(), state);
        }
    }

    #[test]
    fn parse_timestamp_names_field() {
        let err = parse_timestamp("startsAt", "nope").unwrap_err();
        match err {
            AlertError::InvalidTimestamp { field, .. } => assert_eq!(field, "startsAt"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
