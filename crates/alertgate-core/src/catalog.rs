//! Rule files.
//!
//! A rule file is either a bare array of entries or an object with optional
//! `defaults` and a `rules` array. Entries come in two shapes:
//!
//! ```json
//! {"name": "disk", "rules": {"repeat": {"dayInterval": "30m"}}}
//! {"alertname": "disk", "ruleSet": {"initialSilence": "10m", "daySilenceInterval": "30m"}}
//! ```
//!
//! The second is the older flat layout; it is converted to [`RuleSetConfig`]
//! on load and never seen by the engine. Flat entries are keyed by the alert's
//! own `alertname` rather than by a rule name.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::rules::{IntervalConfig, RepeatConfig, RuleOverride, RuleResolver, RuleSet, RuleSetConfig};

/// The flat rule set layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRuleSet {
    /// Initial silence interval. Present means enabled.
    #[serde(default)]
    pub initial_silence: Option<String>,
    /// Day repeat interval.
    #[serde(default)]
    pub day_silence_interval: Option<String>,
    /// Night repeat interval.
    #[serde(default)]
    pub night_silence_interval: Option<String>,
    /// Weekend nights.
    #[serde(default)]
    pub use_night_silence_interval_at_weekend: Option<bool>,
    /// Day window start.
    #[serde(default)]
    pub day_silence_interval_start: Option<String>,
    /// Day window end.
    #[serde(default)]
    pub day_silence_interval_finish: Option<String>,
    /// Soft auto-resolve section.
    #[serde(default)]
    pub auto_resolve: Option<IntervalConfig>,
    /// Hard auto-resolve section.
    #[serde(default)]
    pub hard_auto_resolve: Option<IntervalConfig>,
    /// Forward resolved events.
    #[serde(default)]
    pub send_resolved: Option<bool>,
}

impl From<LegacyRuleSet> for RuleSetConfig {
    fn from(legacy: LegacyRuleSet) -> Self {
        let repeat = RepeatConfig {
            enabled: None,
            day_interval: legacy.day_silence_interval,
            night_interval: legacy.night_silence_interval,
            use_night_at_weekend: legacy.use_night_silence_interval_at_weekend,
            day_window_start: legacy.day_silence_interval_start,
            day_window_end: legacy.day_silence_interval_finish,
        };

        Self {
            initial_silence: legacy.initial_silence.map(|interval| IntervalConfig {
                enabled: Some(true),
                interval: Some(interval),
            }),
            repeat: (repeat != RepeatConfig::default()).then_some(repeat),
            auto_resolve: legacy.auto_resolve,
            hard_auto_resolve: legacy.hard_auto_resolve,
            send_resolved: legacy.send_resolved,
            routes: None,
        }
    }
}

/// One named entry of a rule file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    /// `{name, rules}`.
    Named {
        /// Rule name matched against the alert's `rules` annotation.
        name: String,
        /// Partial rule set.
        #[serde(default)]
        rules: RuleSetConfig,
    },
    /// `{alertname, ruleSet}` flat layout.
    Legacy {
        /// Rule name.
        alertname: String,
        /// Flat partial rule set.
        #[serde(rename = "ruleSet", default)]
        rule_set: LegacyRuleSet,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesFile {
    Entries(Vec<RuleEntry>),
    Document {
        #[serde(default)]
        defaults: RuleSetConfig,
        #[serde(default)]
        rules: Vec<RuleEntry>,
    },
}

/// A parsed rule file in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCatalog {
    /// Overrides applied to the built-in defaults.
    pub defaults: RuleSetConfig,
    /// Entries keyed by rule name, in file order.
    pub entries: Vec<(String, RuleSetConfig)>,
    /// Flat entries keyed by alertname, in file order.
    pub legacy: Vec<(String, RuleSetConfig)>,
}

impl RuleCatalog {
    /// Parses a rule file.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` if the document matches
    /// neither layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let (defaults, entries) = match serde_json::from_str::<RulesFile>(json)? {
            RulesFile::Entries(entries) => (RuleSetConfig::default(), entries),
            RulesFile::Document { defaults, rules } => (defaults, rules),
        };

        let mut catalog = Self {
            defaults,
            ..Self::default()
        };
        for entry in entries {
            match entry {
                RuleEntry::Named { name, rules } => catalog.entries.push((name, rules)),
                RuleEntry::Legacy { alertname, rule_set } => {
                    catalog.legacy.push((alertname, rule_set.into()));
                }
            }
        }
        Ok(catalog)
    }

    /// Compiles the rule-name entries. The first entry for a name wins.
    ///
    /// # Errors
    ///
    /// Returns the first compile error.
    pub fn overrides(&self) -> Result<HashMap<String, RuleOverride>> {
        compile_entries(&self.entries)
    }

    /// Compiles the flat entries, keyed by alertname.
    ///
    /// # Errors
    ///
    /// Returns the first compile error.
    pub fn alertname_overrides(&self) -> Result<HashMap<String, RuleOverride>> {
        compile_entries(&self.legacy)
    }

    /// Builds the resolver: built-in defaults delivering to `routes`, then
    /// the file's `defaults`, then the entry for the rule or alert name.
    ///
    /// # Errors
    ///
    /// Returns any compile or merge error. Nothing is partially applied.
    pub fn resolver(&self, routes: Vec<String>) -> Result<RuleResolver> {
        let defaults = RuleSet::builtin(routes).merged(&self.defaults.compile()?)?;
        let resolver = RuleResolver::new(defaults, &self.overrides()?)?
            .with_alertname_overrides(&self.alertname_overrides()?)?;
        info!(
            rules = self.entries.len(),
            alerts = self.legacy.len(),
            "loaded rule catalog"
        );
        Ok(resolver)
    }
}

fn compile_entries(entries: &[(String, RuleSetConfig)]) -> Result<HashMap<String, RuleOverride>> {
    let mut overrides = HashMap::with_capacity(entries.len());
    for (name, config) in entries {
        let compiled = config.compile()?;
        match overrides.entry(name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(compiled);
            }
            Entry::Occupied(_) => {
                warn!(rule = %name, "duplicate rule entry ignored");
            }
        }
    }
    Ok(overrides)
}
