//! Rule sets and their resolution.
//!
//! A [`RuleSet`] is the fully-populated policy for one alert class. Rule files
//! describe partial sets ([`RuleSetConfig`]) which are compiled once into
//! [`RuleOverride`]s and overlaid field by field on the defaults.

use std::collections::HashMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::parse_duration;
use crate::error::{AlertError, Result};
use crate::types::AlertEvent;
use crate::window::{DayWindow, parse_time_of_day};

/// An on/off switch with an interval, used by initial silence and both
/// resolve policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalPolicy {
    /// Whether the policy applies.
    pub enabled: bool,
    /// The interval in milliseconds.
    pub interval_ms: u64,
}

impl IntervalPolicy {
    /// Creates an enabled policy.
    #[must_use]
    pub const fn enabled(interval_ms: u64) -> Self {
        Self {
            enabled: true,
            interval_ms,
        }
    }

    /// Creates a disabled policy that keeps an interval for later overrides.
    #[must_use]
    pub const fn disabled(interval_ms: u64) -> Self {
        Self {
            enabled: false,
            interval_ms,
        }
    }

    fn merged(self, o: &IntervalOverride) -> Self {
        Self {
            enabled: o.enabled.unwrap_or(self.enabled),
            interval_ms: o.interval_ms.unwrap_or(self.interval_ms),
        }
    }
}

/// How often a still-firing alert may notify again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatPolicy {
    /// Whether repeat notifications are sent at all.
    pub enabled: bool,
    /// Minimum gap between notifications during the day window.
    pub day_interval_ms: u64,
    /// Minimum gap between notifications outside the day window.
    pub night_interval_ms: u64,
    /// Treat Saturdays and Sundays as night regardless of time.
    pub use_night_at_weekend: bool,
    /// Wall-clock range counted as day.
    pub day_window: DayWindow,
}

impl RepeatPolicy {
    fn merged(self, o: &RepeatOverride) -> Result<Self> {
        let start = o.day_window_start.unwrap_or(self.day_window.start());
        let end = o.day_window_end.unwrap_or(self.day_window.end());
        Ok(Self {
            enabled: o.enabled.unwrap_or(self.enabled),
            day_interval_ms: o.day_interval_ms.unwrap_or(self.day_interval_ms),
            night_interval_ms: o.night_interval_ms.unwrap_or(self.night_interval_ms),
            use_night_at_weekend: o.use_night_at_weekend.unwrap_or(self.use_night_at_weekend),
            day_window: DayWindow::new(start, end)?,
        })
    }
}

/// The effective policy for one alert.
///
/// Always owned by value; resolution hands out fresh copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Quiet period after `startsAt` before the first notification.
    pub initial_silence: IntervalPolicy,
    /// Repeat throttling.
    pub repeat: RepeatPolicy,
    /// Resolve when the incident has not been refreshed for this long.
    pub auto_resolve: IntervalPolicy,
    /// Resolve when the alert has been firing for this long.
    pub hard_auto_resolve: IntervalPolicy,
    /// Forward resolved events to the routes.
    pub send_resolved: bool,
    /// Destination URIs, in delivery order.
    pub routes: Vec<String>,
}

impl RuleSet {
    /// The built-in defaults, delivering to `routes`.
    ///
    /// Initial silence off (10m), repeat every 2h by day and 8h by night with
    /// weekends at night and a 10:00-23:00 day, auto-resolve after 1m without
    /// a fresh incident, hard auto-resolve off (24h), resolved events dropped.
    #[must_use]
    pub fn builtin(routes: Vec<String>) -> Self {
        const MINUTE: u64 = 60_000;
        const HOUR: u64 = 60 * MINUTE;

        Self {
            initial_silence: IntervalPolicy::disabled(10 * MINUTE),
            repeat: RepeatPolicy {
                enabled: true,
                day_interval_ms: 2 * HOUR,
                night_interval_ms: 8 * HOUR,
                use_night_at_weekend: true,
                day_window: DayWindow::DEFAULT,
            },
            auto_resolve: IntervalPolicy::enabled(MINUTE),
            hard_auto_resolve: IntervalPolicy::disabled(24 * HOUR),
            send_resolved: false,
            routes,
        }
    }

    /// Returns a copy with `o` overlaid field by field.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::MalformedTimeWindow` if the merged day window is
    /// not ordered.
    pub fn merged(&self, o: &RuleOverride) -> Result<Self> {
        Ok(Self {
            initial_silence: self.initial_silence.merged(&o.initial_silence),
            repeat: self.repeat.merged(&o.repeat)?,
            auto_resolve: self.auto_resolve.merged(&o.auto_resolve),
            hard_auto_resolve: self.hard_auto_resolve.merged(&o.hard_auto_resolve),
            send_resolved: o.send_resolved.unwrap_or(self.send_resolved),
            routes: o.routes.clone().unwrap_or_else(|| self.routes.clone()),
        })
    }
}

/// Compiled override for an [`IntervalPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalOverride {
    /// Replacement for `enabled`.
    pub enabled: Option<bool>,
    /// Replacement for `interval_ms`.
    pub interval_ms: Option<u64>,
}

/// Compiled override for a [`RepeatPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatOverride {
    /// Replacement for `enabled`.
    pub enabled: Option<bool>,
    /// Replacement for `day_interval_ms`.
    pub day_interval_ms: Option<u64>,
    /// Replacement for `night_interval_ms`.
    pub night_interval_ms: Option<u64>,
    /// Replacement for `use_night_at_weekend`.
    pub use_night_at_weekend: Option<bool>,
    /// Replacement for the window start.
    pub day_window_start: Option<NaiveTime>,
    /// Replacement for the window end.
    pub day_window_end: Option<NaiveTime>,
}

/// A compiled partial rule set: every `Some` replaces the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOverride {
    /// Initial silence fields.
    pub initial_silence: IntervalOverride,
    /// Repeat fields.
    pub repeat: RepeatOverride,
    /// Soft auto-resolve fields.
    pub auto_resolve: IntervalOverride,
    /// Hard auto-resolve fields.
    pub hard_auto_resolve: IntervalOverride,
    /// Replacement for `send_resolved`.
    pub send_resolved: Option<bool>,
    /// Replacement route list. Replaces the whole default list.
    pub routes: Option<Vec<String>>,
}

/// Partial interval section as written in rule files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalConfig {
    /// Whether the policy applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Compact duration such as `"10m"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl IntervalConfig {
    fn compile(&self, section: &str) -> Result<IntervalOverride> {
        Ok(IntervalOverride {
            enabled: self.enabled,
            interval_ms: parse_field(section, "interval", self.interval.as_deref())?,
        })
    }
}

/// Partial repeat section as written in rule files.
///
/// Also accepts the legacy `*SilenceInterval*` field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatConfig {
    /// Whether repeat notifications are sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Day interval, e.g. `"2h"`.
    #[serde(default, alias = "daySilenceInterval", skip_serializing_if = "Option::is_none")]
    pub day_interval: Option<String>,
    /// Night interval, e.g. `"8h"`.
    #[serde(default, alias = "nightSilenceInterval", skip_serializing_if = "Option::is_none")]
    pub night_interval: Option<String>,
    /// Weekend nights.
    #[serde(
        default,
        alias = "useNightSilenceIntervalAtWeekend",
        skip_serializing_if = "Option::is_none"
    )]
    pub use_night_at_weekend: Option<bool>,
    /// Day window start, `HH:MM:SS`.
    #[serde(default, alias = "daySilenceIntervalStart", skip_serializing_if = "Option::is_none")]
    pub day_window_start: Option<String>,
    /// Day window end, `HH:MM:SS`.
    #[serde(default, alias = "daySilenceIntervalFinish", skip_serializing_if = "Option::is_none")]
    pub day_window_end: Option<String>,
}

impl RepeatConfig {
    fn compile(&self) -> Result<RepeatOverride> {
        Ok(RepeatOverride {
            enabled: self.enabled,
            day_interval_ms: parse_field("repeat", "dayInterval", self.day_interval.as_deref())?,
            night_interval_ms: parse_field("repeat", "nightInterval", self.night_interval.as_deref())?,
            use_night_at_weekend: self.use_night_at_weekend,
            day_window_start: self.day_window_start.as_deref().map(parse_time_of_day).transpose()?,
            day_window_end: self.day_window_end.as_deref().map(parse_time_of_day).transpose()?,
        })
    }
}

/// A partial rule set as written in rule files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetConfig {
    /// Initial silence section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_silence: Option<IntervalConfig>,
    /// Repeat section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatConfig>,
    /// Soft auto-resolve section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resolve: Option<IntervalConfig>,
    /// Hard auto-resolve section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_auto_resolve: Option<IntervalConfig>,
    /// Forward resolved events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
    /// Replacement route list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<String>>,
}

impl RuleSetConfig {
    /// Parses durations and times, producing an override.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidDurationFormat` or
    /// `AlertError::MalformedTimeWindow` for unparseable values.
    pub fn compile(&self) -> Result<RuleOverride> {
        Ok(RuleOverride {
            initial_silence: compile_section(self.initial_silence.as_ref(), "initialSilence")?,
            repeat: self
                .repeat
                .as_ref()
                .map(RepeatConfig::compile)
                .transpose()?
                .unwrap_or_default(),
            auto_resolve: compile_section(self.auto_resolve.as_ref(), "autoResolve")?,
            hard_auto_resolve: compile_section(self.hard_auto_resolve.as_ref(), "hardAutoResolve")?,
            send_resolved: self.send_resolved,
            routes: self.routes.clone(),
        })
    }
}

fn compile_section(section: Option<&IntervalConfig>, name: &str) -> Result<IntervalOverride> {
    section
        .map(|s| s.compile(name))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_field(section: &str, field: &str, value: Option<&str>) -> Result<Option<u64>> {
    value
        .map(|raw| {
            parse_duration(raw).map_err(|e| match e {
                AlertError::InvalidDurationFormat { input, reason } => {
                    AlertError::InvalidDurationFormat {
                        input,
                        reason: format!("{section}.{field}: {reason}"),
                    }
                }
                other => other,
            })
        })
        .transpose()
}

/// Read access to named overrides.
pub trait RuleLookup {
    /// Returns the override registered under `name`, if any.
    fn lookup(&self, name: &str) -> Option<&RuleOverride>;
}

impl RuleLookup for HashMap<String, RuleOverride> {
    fn lookup(&self, name: &str) -> Option<&RuleOverride> {
        self.get(name)
    }
}

/// Resolves the effective rule set for `rule_name`.
///
/// An unknown name is not an error: it yields a copy of `defaults`.
///
/// # Errors
///
/// Returns `AlertError::MalformedTimeWindow` if the override produces an
/// unordered day window.
pub fn resolve<L: RuleLookup + ?Sized>(
    rule_name: &str,
    defaults: &RuleSet,
    overrides: &L,
) -> Result<RuleSet> {
    match overrides.lookup(rule_name) {
        Some(o) => defaults.merged(o),
        None => Ok(defaults.clone()),
    }
}

/// Pre-validated resolver used on the request path.
///
/// Every override is merged once at construction so configuration errors
/// surface at load time; [`RuleResolver::resolve`] is then infallible.
///
/// Overrides come in two namespaces: rule names, which alerts ask for through
/// their `rules` annotation or label, and alert names, which apply to alerts
/// with a matching `alertname` that ask for no known rule.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    defaults: RuleSet,
    resolved: HashMap<String, RuleSet>,
    by_alertname: HashMap<String, RuleSet>,
}

impl RuleResolver {
    /// Builds a resolver from defaults and named overrides.
    ///
    /// # Errors
    ///
    /// Returns the first merge error, naming no partial state.
    pub fn new(defaults: RuleSet, overrides: &HashMap<String, RuleOverride>) -> Result<Self> {
        let resolved = merge_all(&defaults, overrides, "rule")?;
        debug!(rules = resolved.len(), "compiled rule overrides");
        Ok(Self {
            defaults,
            resolved,
            by_alertname: HashMap::new(),
        })
    }

    /// Adds overrides keyed by `alertname`.
    ///
    /// # Errors
    ///
    /// Returns the first merge error.
    pub fn with_alertname_overrides(
        mut self,
        overrides: &HashMap<String, RuleOverride>,
    ) -> Result<Self> {
        self.by_alertname = merge_all(&self.defaults, overrides, "alert")?;
        debug!(alerts = self.by_alertname.len(), "compiled alertname overrides");
        Ok(self)
    }

    /// A resolver with only defaults.
    #[must_use]
    pub fn with_defaults(defaults: RuleSet) -> Self {
        Self {
            defaults,
            resolved: HashMap::new(),
            by_alertname: HashMap::new(),
        }
    }

    /// Returns a fresh copy of the effective rule set for `rule_name`.
    #[must_use]
    pub fn resolve(&self, rule_name: &str) -> RuleSet {
        self.resolved
            .get(rule_name)
            .unwrap_or(&self.defaults)
            .clone()
    }

    /// Returns a fresh copy of the effective rule set for `event`.
    ///
    /// A known rule named by the alert wins, then an override for the
    /// alert's own name, then the rule for [`AlertEvent::rule_name`].
    #[must_use]
    pub fn resolve_for(&self, event: &AlertEvent) -> RuleSet {
        if let Some(rules) = event
            .requested_rule_name()
            .and_then(|name| self.resolved.get(name))
        {
            return rules.clone();
        }
        match self.by_alertname.get(event.name()) {
            Some(rules) => rules.clone(),
            None => self.resolve(event.rule_name()),
        }
    }

    /// The defaults.
    #[must_use]
    pub const fn defaults(&self) -> &RuleSet {
        &self.defaults
    }

    /// Names with an override, rule names first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolved
            .keys()
            .chain(self.by_alertname.keys())
            .map(String::as_str)
    }
}

fn merge_all(
    defaults: &RuleSet,
    overrides: &HashMap<String, RuleOverride>,
    kind: &str,
) -> Result<HashMap<String, RuleSet>> {
    let mut resolved = HashMap::with_capacity(overrides.len());
    for name in overrides.keys() {
        let rules = resolve(name, defaults, overrides).map_err(|e| match e {
            AlertError::MalformedTimeWindow { reason } => AlertError::MalformedTimeWindow {
                reason: format!("{kind} '{name}': {reason}"),
            },
            other => other,
        })?;
        resolved.insert(name.clone(), rules);
    }
    Ok(resolved)
}
