//! Sliding-window velocity counter.
//!
//! Limits are read from the live rules on every check, so a rules swap
//! changes the limits without rebuilding the checker. Actions with no
//! configured limit are always allowed and never tracked; drained keys are
//! dropped on check and in a periodic sweep.

use crate::{
    clock::Clock,
    error::{RiskError, RiskResult},
    rules::{FraudRules, LiveRules, VelocityLimit},
    signal::{VelocityChecker, VelocityStatus},
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// How often `record` sweeps keys whose windows have fully drained.
const SWEEP_INTERVAL_SECS: i64 = 60;

type Key = (String, String);

#[derive(Default)]
struct Windows {
    events:     HashMap<Key, VecDeque<DateTime<Utc>>>,
    last_sweep: Option<DateTime<Utc>>,
}

pub struct SlidingWindowVelocity {
    rules:   Arc<LiveRules>,
    clock:   Arc<dyn Clock>,
    windows: Mutex<Windows>,
}

impl SlidingWindowVelocity {
    pub fn new(rules: Arc<LiveRules>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            clock,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Events currently held for (entity, action).
    pub fn recorded(&self, entity_id: &str, action: &str) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .get(&(entity_id.to_string(), action.to_string()))
            .map_or(0, VecDeque::len)
    }

    /// Number of (entity, action) keys still holding events.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).events.len()
    }
}

/// Oldest instant still outside the window ending at `now`.
fn cutoff(now: DateTime<Utc>, limit: &VelocityLimit) -> RiskResult<DateTime<Utc>> {
    i64::try_from(limit.window_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            RiskError::collaborator(
                "velocity",
                format!("window of {}s is out of range", limit.window_secs),
            )
        })
}

fn prune(queue: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while queue.front().is_some_and(|t| *t <= cutoff) {
        queue.pop_front();
    }
}

impl Windows {
    /// Drop every key whose action lost its limit or whose window drained.
    fn sweep(&mut self, rules: &FraudRules, now: DateTime<Utc>) {
        self.events.retain(|(_, action), queue| {
            let Some(limit) = rules.velocity_limits.get(action) else {
                return false;
            };
            match cutoff(now, limit) {
                Ok(c) => prune(queue, c),
                Err(_) => queue.clear(),
            }
            !queue.is_empty()
        });
        self.last_sweep = Some(now);
    }
}

impl VelocityChecker for SlidingWindowVelocity {
    fn check(&self, entity_id: &str, action: &str) -> RiskResult<VelocityStatus> {
        let rules = self.rules.snapshot();
        let Some(limit) = rules.velocity_limits.get(action).copied() else {
            return Ok(VelocityStatus {
                allowed: true,
                count:   0,
                limit:   0,
                window:  Duration::ZERO,
            });
        };
        let cutoff = cutoff(self.clock.now(), &limit)?;

        let key = (entity_id.to_string(), action.to_string());
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let count = match windows.events.get_mut(&key) {
            Some(q) => {
                prune(q, cutoff);
                q.len() as u32
            }
            None => 0,
        };
        if count == 0 {
            windows.events.remove(&key);
        }

        Ok(VelocityStatus {
            allowed: count < limit.max_count,
            count,
            limit:   limit.max_count,
            window:  Duration::from_secs(limit.window_secs),
        })
    }

    /// Actions without a configured limit are not tracked.
    fn record(&self, entity_id: &str, action: &str) -> RiskResult<()> {
        let rules = self.rules.snapshot();
        let Some(limit) = rules.velocity_limits.get(action).copied() else {
            return Ok(());
        };
        let now = self.clock.now();
        let cutoff = cutoff(now, &limit)?;

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let due = windows
            .last_sweep
            .map_or(true, |t| now - t >= chrono::Duration::seconds(SWEEP_INTERVAL_SECS));
        if due {
            windows.sweep(&rules, now);
        }

        let queue = windows
            .events
            .entry((entity_id.to_string(), action.to_string()))
            .or_default();
        prune(queue, cutoff);
        queue.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        rules::{FraudRules, VelocityLimit},
    };
    use chrono::TimeZone;

    fn setup(max_count: u32, window_secs: u64) -> (SlidingWindowVelocity, Arc<ManualClock>) {
        let mut rules = FraudRules::default();
        rules
            .velocity_limits
            .insert("call".into(), VelocityLimit { max_count, window_secs });
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let v = SlidingWindowVelocity::new(Arc::new(LiveRules::new(rules)), clock.clone());
        (v, clock)
    }

    #[test]
    fn over_limit_once_window_is_full() {
        let (v, _clock) = setup(3, 60);
        for _ in 0..3 {
            assert!(v.check("+14155550123", "call").unwrap().allowed);
            v.record("+14155550123", "call").unwrap();
        }
        let status = v.check("+14155550123", "call").unwrap();
        assert!(!status.allowed);
        assert_eq!(status.count, 3);
        assert_eq!(status.limit, 3);
        assert_eq!(status.window, Duration::from_secs(60));
    }

    #[test]
    fn old_events_fall_out_of_the_window() {
        let (v, clock) = setup(1, 60);
        v.record("a", "call").unwrap();
        assert!(!v.check("a", "call").unwrap().allowed);
        clock.advance(chrono::Duration::seconds(61));
        assert!(v.check("a", "call").unwrap().allowed);
        assert_eq!(v.recorded("a", "call"), 0);
    }

    #[test]
    fn unknown_actions_are_unlimited_and_untracked() {
        let (v, clock) = setup(1, 60);
        for _ in 0..1000 {
            v.record("a", "wire_transfer").unwrap();
            assert!(v.check("a", "wire_transfer").unwrap().allowed);
            clock.advance(chrono::Duration::days(1));
        }
        assert_eq!(v.recorded("a", "wire_transfer"), 0);
        assert_eq!(v.tracked_keys(), 0);
    }

    #[test]
    fn drained_keys_are_dropped() {
        let (v, clock) = setup(5, 60);
        for i in 0..500 {
            v.record(&format!("+1415555{i:04}"), "call").unwrap();
        }
        assert_eq!(v.tracked_keys(), 500);

        // One key drains on its own check, the rest on the next sweep.
        clock.advance(chrono::Duration::seconds(120));
        assert_eq!(v.check("+14155550000", "call").unwrap().count, 0);
        assert_eq!(v.tracked_keys(), 499);
        v.record("fresh", "call").unwrap();
        assert_eq!(v.tracked_keys(), 1);
    }

    #[test]
    fn out_of_range_window_is_an_error_not_a_panic() {
        // LiveRules::new does not validate, so an unchecked rule set can
        // still reach the checker.
        let (v, _clock) = setup(3, 10_000_000_000_000_000);
        let err = v.check("a", "call").unwrap_err();
        assert!(matches!(err, RiskError::Collaborator { name: "velocity", .. }), "{err}");
        assert!(v.record("a", "call").is_err());
    }
}
