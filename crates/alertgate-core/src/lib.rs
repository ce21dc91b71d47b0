//! Notification decision engine for Alertmanager webhook traffic.
//!
//! `alertgate-core` decides, for every alert an Alertmanager-style source
//! delivers, whether to notify now, suppress, or resolve it. All state lives
//! in the external alert store; this crate only computes decisions and the
//! mutations the caller must persist.
//!
//! # Features
//!
//! - **Duration codec**: compact `"1h30m"` strings to and from milliseconds
//! - **Day/night windows**: repeat intervals that differ by time of day and weekend
//! - **Rule resolution**: named partial rule sets merged onto defaults, validated at load
//! - **Decision engine**: a pure function of `(event, prior state, rules, now)`
//! - **Incident intake**: incident reports turned into postable store records
//! - **Alertmanager wire types**: webhook envelope, postable and gettable alerts
//!
//! # Example
//!
//! ```rust
//! use alertgate_core::{AlertEvent, AlertStatus, DecisionEngine, RuleCatalog};
//! use chrono::{Duration, TimeZone, Utc};
//! use std::collections::HashMap;
//!
//! let catalog = RuleCatalog::from_json(
//!     r#"[{"name": "disk", "rules": {"initialSilence": {"enabled": true, "interval": "10m"}}}]"#,
//! )
//! .unwrap();
//! let resolver = catalog.resolver(vec!["http://chat/hook".to_string()]).unwrap();
//!
//! let starts_at = Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
//! let labels = HashMap::from([("alertname".to_string(), "DiskFull".to_string())]);
//! let event = AlertEvent::new(labels, AlertStatus::Firing, starts_at)
//!     .unwrap()
//!     .with_annotation("rules", "disk");
//!
//! let engine = DecisionEngine::default();
//! let rules = resolver.resolve_for(&event);
//!
//! let early = engine.decide(&event, None, &rules, starts_at + Duration::minutes(5));
//! assert_eq!(early.kind(), "suppress");
//!
//! let later = engine.decide(&event, None, &rules, starts_at + Duration::minutes(15));
//! assert_eq!(later.kind(), "notify");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod decision;
pub mod duration;
pub mod error;
pub mod incident;
pub mod rules;
pub mod types;
pub mod webhook;
pub mod window;

// Re-export main types at crate root
pub use catalog::{LegacyRuleSet, RuleCatalog, RuleEntry};
pub use decision::{Action, DecisionEngine, StateUpdate, SuppressReason};
pub use duration::{format_duration, parse_duration};
pub use error::{AlertError, Result};
pub use incident::{IncidentReport, finish_incident, find_active, record_incident};
pub use rules::{
    IntervalConfig, IntervalPolicy, RepeatConfig, RepeatPolicy, RuleLookup, RuleOverride,
    RuleResolver, RuleSet, RuleSetConfig, resolve,
};
pub use types::{AlertEvent, AlertState, AlertStatus};
pub use webhook::{StoredAlert, WebhookMessage, WireAlert};
pub use window::{DayWindow, is_day_time};
