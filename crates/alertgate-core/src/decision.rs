//! The notification decision engine.
//!
//! [`DecisionEngine::decide`] maps `(event, prior state, rules, now)` to one
//! [`Action`]. It never reads a clock and never performs I/O; the caller
//! persists [`StateUpdate`]s and delivers notifications.

use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::debug;

use crate::rules::RuleSet;
use crate::types::{AlertEvent, AlertState, AlertStatus};
use crate::window::is_day_time;

/// Why a firing alert produced no notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressReason {
    /// Still inside the initial silence period.
    InitialSilence,
    /// Already notified and repeats are disabled.
    RepeatDisabled,
    /// Already notified and the repeat interval has not elapsed.
    RepeatIntervalNotElapsed,
}

impl SuppressReason {
    /// Stable identifier used in logs and responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSilence => "initial-silence",
            Self::RepeatDisabled => "repeat-disabled",
            Self::RepeatIntervalNotElapsed => "repeat-interval-not-elapsed",
        }
    }
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutation the caller must write back to the alert store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    /// New notification state.
    pub state: AlertState,
    /// Set when the alert is being resolved.
    pub ends_at: Option<DateTime<Utc>>,
}

impl StateUpdate {
    /// Returns the record to persist for `event`: the event with the new
    /// state annotations and `endsAt`.
    #[must_use]
    pub fn apply_to(&self, event: &AlertEvent) -> AlertEvent {
        event.stamped(&self.state, self.ends_at)
    }
}

/// The outcome of one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Deliver `alert` to every route and persist `update`.
    Notify {
        /// Destinations in order.
        routes: Vec<String>,
        /// Outgoing copy with `endsAt = now`.
        alert: AlertEvent,
        /// State to persist.
        update: StateUpdate,
    },
    /// Do nothing, for the given reason.
    Suppress {
        /// Why.
        reason: SuppressReason,
    },
    /// The incident went stale: resolve the alert in the store.
    AutoResolve {
        /// Outgoing copy with `endsAt = now`.
        alert: AlertEvent,
        /// Resolution to persist.
        update: StateUpdate,
    },
    /// The alert outlived the hard ceiling: resolve it in the store.
    HardAutoResolve {
        /// Outgoing copy with `endsAt = now`.
        alert: AlertEvent,
        /// Resolution to persist.
        update: StateUpdate,
    },
    /// Forward a resolved event to every route unchanged.
    ForwardResolved {
        /// Destinations in order.
        routes: Vec<String>,
    },
    /// Resolved event that is not forwarded.
    NoOp,
}

impl Action {
    /// Stable identifier of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Notify { .. } => "notify",
            Self::Suppress { .. } => "suppress",
            Self::AutoResolve { .. } => "auto-resolve",
            Self::HardAutoResolve { .. } => "hard-auto-resolve",
            Self::ForwardResolved { .. } => "forward-resolved",
            Self::NoOp => "noop",
        }
    }

    /// The suppression reason, if suppressed.
    #[must_use]
    pub const fn suppress_reason(&self) -> Option<SuppressReason> {
        match self {
            Self::Suppress { reason } => Some(*reason),
            _ => None,
        }
    }

    /// The store mutation carried by this action, if any.
    #[must_use]
    pub const fn update(&self) -> Option<&StateUpdate> {
        match self {
            Self::Notify { update, .. }
            | Self::AutoResolve { update, .. }
            | Self::HardAutoResolve { update, .. } => Some(update),
            _ => None,
        }
    }
}

/// Pure decision function, parameterized by the wall-clock offset used for
/// day/night classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionEngine {
    offset: FixedOffset,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl DecisionEngine {
    /// Creates an engine classifying day/night in `offset`.
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// The configured offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Decides what to do with `event`.
    ///
    /// `prior` is the state recorded for this alert, or `None` if the alert
    /// has never been seen. Resolved events only consult `send_resolved`.
    /// Firing events are checked in order: hard auto-resolve, soft
    /// auto-resolve, initial silence, first notification, repeat.
    #[must_use]
    pub fn decide(
        &self,
        event: &AlertEvent,
        prior: Option<&AlertState>,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> Action {
        let action = match event.status() {
            AlertStatus::Resolved => Self::decide_resolved(rules),
            AlertStatus::Firing => self.decide_firing(event, prior.copied().unwrap_or_default(), rules, now),
        };

        debug!(
            alert = %event.name(),
            status = %event.status(),
            action = action.kind(),
            reason = action.suppress_reason().map(|r| r.as_str()),
            "decided"
        );
        action
    }

    fn decide_resolved(rules: &RuleSet) -> Action {
        if rules.send_resolved {
            Action::ForwardResolved {
                routes: rules.routes.clone(),
            }
        } else {
            Action::NoOp
        }
    }

    fn decide_firing(
        &self,
        event: &AlertEvent,
        prior: AlertState,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> Action {
        let hard = rules.hard_auto_resolve;
        if hard.enabled && elapsed_at_least(now, event.starts_at(), hard.interval_ms) {
            let update = resolution(prior, now);
            return Action::HardAutoResolve {
                alert: update.apply_to(event),
                update,
            };
        }

        let soft = rules.auto_resolve;
        if soft.enabled
            && prior
                .last_incident_at
                .is_some_and(|at| elapsed_at_least(now, at, soft.interval_ms))
        {
            let update = resolution(prior, now);
            return Action::AutoResolve {
                alert: update.apply_to(event),
                update,
            };
        }

        let silence = rules.initial_silence;
        if silence.enabled && !elapsed_at_least(now, event.starts_at(), silence.interval_ms) {
            return Action::Suppress {
                reason: SuppressReason::InitialSilence,
            };
        }

        let Some(last_notification) = prior.last_notification_at else {
            return notify(event, prior, rules, now);
        };

        let repeat = rules.repeat;
        if !repeat.enabled {
            return Action::Suppress {
                reason: SuppressReason::RepeatDisabled,
            };
        }

        let interval = if is_day_time(now, &repeat.day_window, repeat.use_night_at_weekend, self.offset) {
            repeat.day_interval_ms
        } else {
            repeat.night_interval_ms
        };

        if elapsed_at_least(now, last_notification, interval) {
            notify(event, prior, rules, now)
        } else {
            Action::Suppress {
                reason: SuppressReason::RepeatIntervalNotElapsed,
            }
        }
    }
}

fn notify(event: &AlertEvent, prior: AlertState, rules: &RuleSet, now: DateTime<Utc>) -> Action {
    let state = AlertState {
        last_notification_at: Some(now),
        ..prior
    };
    // The store keeps the alert firing; only the outgoing copy ends now.
    let update = StateUpdate {
        state,
        ends_at: None,
    };
    Action::Notify {
        routes: rules.routes.clone(),
        alert: event.stamped(&state, Some(now)),
        update,
    }
}

const fn resolution(prior: AlertState, now: DateTime<Utc>) -> StateUpdate {
    StateUpdate {
        state: prior,
        ends_at: Some(now),
    }
}

/// True if at least `interval_ms` has passed from `since` to `now`.
/// A `since` in the future has not elapsed anything.
fn elapsed_at_least(now: DateTime<Utc>, since: DateTime<Utc>, interval_ms: u64) -> bool {
    u64::try_from(now.signed_duration_since(since).num_milliseconds())
        .is_ok_and(|elapsed| elapsed >= interval_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::IntervalPolicy;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use std::collections::HashMap;

    // Monday 2024-01-08 12:00 UTC, inside the default day window.
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap()
    }

    fn event(status: AlertStatus, starts_at: DateTime<Utc>) -> AlertEvent {
        let labels = HashMap::from([("alertname".to_string(), "HighLatency".to_string())]);
        AlertEvent::new(labels, status, starts_at).unwrap()
    }

    fn firing() -> AlertEvent {
        event(AlertStatus::Firing, t0())
    }

    fn rules() -> RuleSet {
        RuleSet::builtin(vec!["http://hook".to_string()])
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::default()
    }

    fn notified_at(at: DateTime<Utc>) -> AlertState {
        AlertState {
            last_notification_at: Some(at),
            ..AlertState::default()
        }
    }

    mod resolved_tests {
        use super::*;

        #[test]
        fn resolved_without_send_resolved_is_noop() {
            let e = event(AlertStatus::Resolved, t0());
            assert_eq!(engine().decide(&e, None, &rules(), t0()), Action::NoOp);
        }

        #[test]
        fn resolved_with_send_resolved_is_forwarded() {
            let e = event(AlertStatus::Resolved, t0());
            let rules = RuleSet {
                send_resolved: true,
                ..rules()
            };
            assert_eq!(
                engine().decide(&e, None, &rules, t0()),
                Action::ForwardResolved {
                    routes: vec!["http://hook".to_string()]
                }
            );
        }

        #[test]
        fn resolved_ignores_timers() {
            // Would hard-resolve if it were firing.
            let e = event(AlertStatus::Resolved, t0());
            let rules = RuleSet {
                hard_auto_resolve: IntervalPolicy::enabled(0),
                ..rules()
            };
            assert_eq!(engine().decide(&e, None, &rules, t0()), Action::NoOp);
        }
    }

    mod silence_tests {
        use super::*;

        fn silenced() -> RuleSet {
            RuleSet {
                initial_silence: IntervalPolicy::enabled(600_000),
                ..rules()
            }
        }

        #[test]
        fn inside_initial_silence_is_suppressed() {
            let action = engine().decide(&firing(), None, &silenced(), t0() + Duration::minutes(5));
            assert_eq!(
                action,
                Action::Suppress {
                    reason: SuppressReason::InitialSilence
                }
            );
        }

        #[test]
        fn after_initial_silence_notifies() {
            let now = t0() + Duration::minutes(15);
            let action = engine().decide(&firing(), None, &silenced(), now);

            let Action::Notify { routes, alert, update } = action else {
                panic!("expected notify, got {action:?}");
            };
            assert_eq!(routes, vec!["http://hook".to_string()]);
            assert_eq!(update.state.last_notification_at, Some(now));
            assert_eq!(update.ends_at, None);
            assert_eq!(alert.ends_at(), Some(now));
            assert_eq!(alert.recorded_state().unwrap().last_notification_at, Some(now));
        }

        #[test]
        fn silence_boundary_is_exclusive() {
            let now = t0() + Duration::minutes(10);
            let action = engine().decide(&firing(), None, &silenced(), now);
            assert_eq!(action.kind(), "notify");
        }

        #[test]
        fn future_start_is_still_silent() {
            let now = t0() - Duration::minutes(1);
            let action = engine().decide(&firing(), None, &silenced(), now);
            assert_eq!(action.suppress_reason(), Some(SuppressReason::InitialSilence));
        }

        #[test]
        fn disabled_silence_notifies_immediately() {
            let action = engine().decide(&firing(), None, &rules(), t0());
            assert_eq!(action.kind(), "notify");
        }
    }

    mod repeat_tests {
        use super::*;

        #[test]
        fn daytime_repeat_not_elapsed() {
            let prior = notified_at(t0());
            let action = engine().decide(&firing(), Some(&prior), &rules(), t0() + Duration::minutes(90));
            assert_eq!(
                action.suppress_reason(),
                Some(SuppressReason::RepeatIntervalNotElapsed)
            );
        }

        #[test]
        fn daytime_repeat_elapsed() {
            let prior = notified_at(t0());
            let now = t0() + Duration::minutes(130);
            let action = engine().decide(&firing(), Some(&prior), &rules(), now);
            assert_eq!(action.update().unwrap().state.last_notification_at, Some(now));
        }

        #[test]
        fn repeat_boundary_is_inclusive() {
            let prior = notified_at(t0());
            let action = engine().decide(&firing(), Some(&prior), &rules(), t0() + Duration::hours(2));
            assert_eq!(action.kind(), "notify");
        }

        #[test]
        fn night_uses_night_interval() {
            // 23:30 is outside the 10:00-23:00 day window.
            let last = Utc.with_ymd_and_hms(2024, 1, 8, 20, 0, 0).unwrap();
            let now = Utc.with_ymd_and_hms(2024, 1, 8, 23, 30, 0).unwrap();
            let prior = notified_at(last);
            let action = engine().decide(&firing(), Some(&prior), &rules(), now);
            assert_eq!(
                action.suppress_reason(),
                Some(SuppressReason::RepeatIntervalNotElapsed)
            );
        }

        #[test]
        fn weekend_uses_night_interval() {
            // Saturday noon, 3h after the last notification.
            let now = Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap();
            let prior = notified_at(now - Duration::hours(3));
            let e = event(AlertStatus::Firing, now - Duration::hours(4));
            let action = engine().decide(&e, Some(&prior), &rules(), now);
            assert_eq!(action.kind(), "suppress");

            let weekdays_only = RuleSet {
                repeat: crate::rules::RepeatPolicy {
                    use_night_at_weekend: false,
                    ..rules().repeat
                },
                ..rules()
            };
            let action = engine().decide(&e, Some(&prior), &weekdays_only, now);
            assert_eq!(action.kind(), "notify");
        }

        #[test]
        fn offset_moves_into_day() {
            // 08:00 UTC is night in UTC but 11:00 at +03:00.
            let now = Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap();
            let prior = notified_at(now - Duration::hours(3));
            let e = event(AlertStatus::Firing, now - Duration::hours(4));

            assert_eq!(engine().decide(&e, Some(&prior), &rules(), now).kind(), "suppress");

            let plus_three = DecisionEngine::new(FixedOffset::east_opt(3 * 3600).unwrap());
            assert_eq!(plus_three.decide(&e, Some(&prior), &rules(), now).kind(), "notify");
        }

        #[test]
        fn repeat_disabled_after_first_notification() {
            let rules = RuleSet {
                repeat: crate::rules::RepeatPolicy {
                    enabled: false,
                    ..rules().repeat
                },
                ..rules()
            };
            let prior = notified_at(t0());
            let action = engine().decide(&firing(), Some(&prior), &rules, t0() + Duration::days(1));
            assert_eq!(action.suppress_reason(), Some(SuppressReason::RepeatDisabled));

            // First sighting still notifies.
            assert_eq!(engine().decide(&firing(), None, &rules, t0()).kind(), "notify");
        }

        #[test]
        fn notify_keeps_incident_and_count() {
            let incident = t0() + Duration::seconds(30);
            let prior = AlertState {
                last_notification_at: Some(t0()),
                last_incident_at: Some(incident),
                count: 7,
            };
            let now = t0() + Duration::seconds(40);
            let rules = RuleSet {
                repeat: crate::rules::RepeatPolicy {
                    day_interval_ms: 0,
                    ..rules().repeat
                },
                ..rules()
            };
            let update = engine()
                .decide(&firing(), Some(&prior), &rules, now)
                .update()
                .cloned()
                .unwrap();
            assert_eq!(update.state.last_incident_at, Some(incident));
            assert_eq!(update.state.count, 7);
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn hard_auto_resolve_after_ceiling() {
            let rules = RuleSet {
                hard_auto_resolve: IntervalPolicy::enabled(24 * 3_600_000),
                ..rules()
            };
            let now = t0() + Duration::hours(25);
            let action = engine().decide(&firing(), None, &rules, now);

            let Action::HardAutoResolve { alert, update } = action else {
                panic!("expected hard auto-resolve, got {action:?}");
            };
            assert_eq!(update.ends_at, Some(now));
            assert_eq!(alert.ends_at(), Some(now));
        }

        #[test]
        fn hard_beats_soft_and_silence() {
            let rules = RuleSet {
                initial_silence: IntervalPolicy::enabled(u64::MAX),
                hard_auto_resolve: IntervalPolicy::enabled(0),
                ..rules()
            };
            let prior = AlertState {
                last_incident_at: Some(t0()),
                ..AlertState::default()
            };
            let action = engine().decide(&firing(), Some(&prior), &rules, t0() + Duration::hours(1));
            assert_eq!(action.kind(), "hard-auto-resolve");
        }

        #[test]
        fn stale_incident_auto_resolves() {
            let prior = AlertState {
                last_incident_at: Some(t0()),
                ..AlertState::default()
            };
            let now = t0() + Duration::minutes(2);
            let action = engine().decide(&firing(), Some(&prior), &rules(), now);
            assert_eq!(action.kind(), "auto-resolve");
            assert_eq!(action.update().unwrap().ends_at, Some(now));
        }

        #[test]
        fn fresh_incident_does_not_auto_resolve() {
            let prior = AlertState {
                last_incident_at: Some(t0()),
                ..AlertState::default()
            };
            let action = engine().decide(&firing(), Some(&prior), &rules(), t0() + Duration::seconds(30));
            assert_eq!(action.kind(), "notify");
        }

        #[test]
        fn unknown_incident_never_auto_resolves() {
            let action = engine().decide(&firing(), None, &rules(), t0() + Duration::days(30));
            assert_eq!(action.kind(), "notify");
        }

        #[test]
        fn soft_beats_silence() {
            let rules = RuleSet {
                initial_silence: IntervalPolicy::enabled(3_600_000),
                ..rules()
            };
            let prior = AlertState {
                last_incident_at: Some(t0()),
                ..AlertState::default()
            };
            let action = engine().decide(&firing(), Some(&prior), &rules, t0() + Duration::minutes(5));
            assert_eq!(action.kind(), "auto-resolve");
        }
    }

    mod update_tests {
        use super::*;

        #[test]
        fn apply_to_writes_state_annotations() {
            let now = t0() + Duration::minutes(1);
            let update = StateUpdate {
                state: AlertState {
                    last_notification_at: Some(now),
                    last_incident_at: None,
                    count: 3,
                },
                ends_at: None,
            };
            let stored = update.apply_to(&firing());
            assert_eq!(stored.recorded_state().unwrap(), update.state);
            assert_eq!(stored.ends_at(), None);
            assert_eq!(stored.name(), "HighLatency");
        }

        #[test]
        fn reason_strings() {
            assert_eq!(SuppressReason::InitialSilence.to_string(), "initial-silence");
            assert_eq!(SuppressReason::RepeatDisabled.to_string(), "repeat-disabled");
            assert_eq!(
                SuppressReason::RepeatIntervalNotElapsed.to_string(),
                "repeat-interval-not-elapsed"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_decide_is_deterministic(
            status_firing in any::<bool>(),
            start_offset_min in 0i64..10_000,
            now_offset_min in 0i64..20_000,
            last_notification_min in prop::option::of(0i64..20_000),
            last_incident_min in prop::option::of(0i64..20_000),
            count in 1u32..100,
            silence in any::<bool>(),
            hard in any::<bool>(),
        ) {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let status = if status_firing { AlertStatus::Firing } else { AlertStatus::Resolved };
            let e = event(status, base + Duration::minutes(start_offset_min));
            let prior = AlertState {
                last_notification_at: last_notification_min.map(|m| base + Duration::minutes(m)),
                last_incident_at: last_incident_min.map(|m| base + Duration::minutes(m)),
                count,
            };
            let rules = RuleSet {
                initial_silence: IntervalPolicy { enabled: silence, interval_ms: 600_000 },
                hard_auto_resolve: IntervalPolicy { enabled: hard, interval_ms: 86_400_000 },
                ..rules()
            };
            let now = base + Duration::minutes(now_offset_min);

            let first = engine().decide(&e, Some(&prior), &rules, now);
            let second = engine().decide(&e, Some(&prior), &rules, now);
            prop_assert_eq!(first, second);
        }
    }
}
