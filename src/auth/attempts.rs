//! Keyed brute-force accounting with progressive lockout.
//!
//! Failed logins are counted per (client IP, normalized email) key inside a
//! rolling window. Reaching the threshold locks the key; repeated lockout
//! cycles double the penalty up to a fixed cap. The storage behind the
//! counters sits behind [`AttemptStore`] so a shared TTL-capable cache can
//! replace the in-process map without touching the state machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::clock::Clock;

/// Failures tolerated inside one window before the key locks.
pub const MAX_ATTEMPTS: u32 = 5;
/// Rolling window a failure stays relevant for.
pub const ATTEMPT_WINDOW_MS: u64 = 15 * 60 * 1_000;
/// First lockout penalty; doubled on each consecutive lockout cycle.
pub const INITIAL_LOCKOUT_MS: u64 = 30 * 60 * 1_000;
/// Upper bound for the escalated penalty.
pub const MAX_LOCKOUT_MS: u64 = 24 * 60 * 60 * 1_000;

/// Composite brute-force key. Email is trimmed and lowercased so case or
/// padding differences cannot split one target across keys; the two parts
/// stay separate fields so distinct (ip, email) pairs can never collide.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AttemptKey {
    ip: String,
    email: String,
}

impl AttemptKey {
    #[must_use]
    pub fn new(ip: &str, email: &str) -> Self {
        Self {
            ip: ip.trim().to_string(),
            email: super::normalize_email(email),
        }
    }
}

/// Mutable per-key state. `Default` is the empty record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttemptRecord {
    pub count: u32,
    pub window_start_ms: u64,
    pub locked_until_ms: Option<u64>,
    pub lockout_cycles: u32,
}

impl AttemptRecord {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn locked_at(&self, now_ms: u64) -> bool {
        self.locked_until_ms.is_some_and(|until| until > now_ms)
    }

    fn window_elapsed(&self, now_ms: u64) -> bool {
        now_ms >= self.window_start_ms.saturating_add(ATTEMPT_WINDOW_MS)
    }
}

/// Read-only decision for one key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoginCheck {
    pub allowed: bool,
    pub remaining_attempts: u32,
    pub locked_until_ms: Option<u64>,
    pub retry_after_ms: Option<u64>,
}

impl LoginCheck {
    fn fresh() -> Self {
        Self {
            allowed: true,
            remaining_attempts: MAX_ATTEMPTS,
            locked_until_ms: None,
            retry_after_ms: None,
        }
    }
}

/// Result of recording one failed attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureOutcome {
    pub remaining_attempts: u32,
    pub locked: bool,
    pub locked_until_ms: Option<u64>,
    pub lockout_duration_ms: Option<u64>,
}

/// Narrow keyed-store seam for the counters: read, atomic read-modify-write,
/// delete. The closure passed to `update` runs under the store's write
/// exclusion; absent keys start from the empty record, and records left
/// empty afterwards are dropped.
pub trait AttemptStore: Send + Sync {
    fn get(&self, key: &AttemptKey) -> Option<AttemptRecord>;
    fn update(&self, key: &AttemptKey, apply: &mut dyn FnMut(&mut AttemptRecord))
        -> AttemptRecord;
    fn remove(&self, key: &AttemptKey);
}

/// Single-process reference store. Not suitable for a horizontally scaled
/// deployment; substitute a shared TTL-capable store through [`AttemptStore`]
/// for that.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    records: Mutex<HashMap<AttemptKey, AttemptRecord>>,
}

impl InMemoryAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptStore for InMemoryAttemptStore {
    fn get(&self, key: &AttemptKey) -> Option<AttemptRecord> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        records.get(key).cloned()
    }

    fn update(
        &self,
        key: &AttemptKey,
        apply: &mut dyn FnMut(&mut AttemptRecord),
    ) -> AttemptRecord {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let record = records.entry(key.clone()).or_default();
        apply(record);
        let updated = record.clone();
        if updated.is_empty() {
            records.remove(key);
        }
        updated
    }

    fn remove(&self, key: &AttemptKey) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        records.remove(key);
    }
}

/// Brute-force gate consulted before and after every credential check.
#[derive(Clone)]
pub struct AttemptTracker {
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
}

impl AttemptTracker {
    #[must_use]
    pub fn new(store: Arc<dyn AttemptStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(InMemoryAttemptStore::new()), clock)
    }

    /// Pure read: whether a login attempt for `key` may proceed right now.
    #[must_use]
    pub fn check_login_allowed(&self, key: &AttemptKey) -> LoginCheck {
        let now_ms = self.clock.now_ms();
        let Some(record) = self.store.get(key) else {
            return LoginCheck::fresh();
        };
        check_record(&record, now_ms)
    }

    /// Atomically count one failure, locking the key when it crosses the
    /// threshold.
    pub fn record_failed_attempt(&self, key: &AttemptKey) -> FailureOutcome {
        let now_ms = self.clock.now_ms();
        let record = self
            .store
            .update(key, &mut |record| apply_failure(record, now_ms));

        let locked = record.locked_at(now_ms);
        let outcome = FailureOutcome {
            remaining_attempts: if locked {
                0
            } else {
                MAX_ATTEMPTS.saturating_sub(record.count)
            },
            locked,
            locked_until_ms: record.locked_until_ms.filter(|_| locked),
            lockout_duration_ms: record
                .locked_until_ms
                .filter(|_| locked)
                .map(|until| until.saturating_sub(now_ms)),
        };

        if outcome.locked {
            warn!(
                cycles = record.lockout_cycles,
                duration_ms = outcome.lockout_duration_ms,
                "login key locked after repeated failures"
            );
        }
        outcome
    }

    /// Called only after a fully successful login, including any second
    /// factor. Resets the key to the empty state.
    pub fn clear_login_attempts(&self, key: &AttemptKey) {
        self.store.remove(key);
    }
}

fn check_record(record: &AttemptRecord, now_ms: u64) -> LoginCheck {
    if let Some(until) = record.locked_until_ms {
        if until > now_ms {
            return LoginCheck {
                allowed: false,
                remaining_attempts: 0,
                locked_until_ms: Some(until),
                retry_after_ms: Some(until - now_ms),
            };
        }
        // Lockout served; the counter was already reset when it was imposed.
        return LoginCheck::fresh();
    }

    if record.count == 0 || record.window_elapsed(now_ms) {
        return LoginCheck::fresh();
    }

    LoginCheck {
        allowed: true,
        remaining_attempts: MAX_ATTEMPTS.saturating_sub(record.count),
        locked_until_ms: None,
        retry_after_ms: None,
    }
}

fn apply_failure(record: &mut AttemptRecord, now_ms: u64) {
    if record.locked_at(now_ms) {
        // Concurrent stragglers must not extend an active lockout.
        return;
    }

    if let Some(until) = record.locked_until_ms {
        record.locked_until_ms = None;
        record.count = 0;
        if now_ms >= until.saturating_add(ATTEMPT_WINDOW_MS) {
            // A full idle window after the lockout clears the escalation too.
            record.lockout_cycles = 0;
        }
    } else if record.count > 0 && record.window_elapsed(now_ms) {
        *record = AttemptRecord::default();
    }

    if record.count == 0 {
        record.window_start_ms = now_ms;
    }
    record.count += 1;

    if record.count >= MAX_ATTEMPTS {
        record.lockout_cycles += 1;
        let duration_ms = lockout_duration_ms(record.lockout_cycles);
        record.locked_until_ms = Some(now_ms.saturating_add(duration_ms));
        // Reset so a post-expiry check reports a full allowance again.
        record.count = 0;
    }
}

/// Penalty for the given lockout cycle: 30 minutes doubled per cycle, capped
/// at 24 hours.
fn lockout_duration_ms(cycles: u32) -> u64 {
    // 30 min << 6 already exceeds the cap; clamping the exponent avoids overflow.
    let exponent = cycles.saturating_sub(1).min(6);
    (INITIAL_LOCKOUT_MS << exponent).min(MAX_LOCKOUT_MS)
}

/// Render a lockout span for user-facing messages. Sub-minute values are
/// whole seconds; longer values are minutes rounded up.
#[must_use]
pub fn format_lockout_duration(ms: u64) -> String {
    if ms < 60_000 {
        let seconds = ms.div_ceil(1_000).max(1);
        if seconds == 1 {
            "1 second".to_string()
        } else {
            format!("{seconds} seconds")
        }
    } else {
        let minutes = ms.div_ceil(60_000);
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn tracker() -> (AttemptTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (AttemptTracker::in_memory(clock.clone()), clock)
    }

    fn key() -> AttemptKey {
        AttemptKey::new("203.0.113.7", "user@example.com")
    }

    #[test]
    fn key_normalizes_email() {
        assert_eq!(
            AttemptKey::new("203.0.113.7", "  User@Example.COM "),
            AttemptKey::new("203.0.113.7", "user@example.com")
        );
    }

    #[test]
    fn distinct_pairs_never_collide() {
        let a = AttemptKey::new("ip1", "usera@example.com");
        let b = AttemptKey::new("ip1", "userb@example.com");
        let c = AttemptKey::new("ip2", "usera@example.com");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn remaining_tracks_count() {
        let (tracker, _clock) = tracker();
        let key = key();

        for count in 1..MAX_ATTEMPTS {
            let outcome = tracker.record_failed_attempt(&key);
            assert!(!outcome.locked);
            assert_eq!(outcome.remaining_attempts, MAX_ATTEMPTS - count);
            assert_eq!(
                tracker.check_login_allowed(&key).remaining_attempts,
                MAX_ATTEMPTS - count
            );
        }
    }

    #[test]
    fn locks_at_threshold_with_future_deadline() {
        let (tracker, clock) = tracker();
        let key = key();

        for _ in 0..MAX_ATTEMPTS - 1 {
            assert!(!tracker.record_failed_attempt(&key).locked);
        }
        let check = tracker.check_login_allowed(&key);
        assert!(check.allowed);
        assert_eq!(check.remaining_attempts, 1);

        let outcome = tracker.record_failed_attempt(&key);
        assert!(outcome.locked);
        assert_eq!(outcome.remaining_attempts, 0);
        assert_eq!(outcome.lockout_duration_ms, Some(INITIAL_LOCKOUT_MS));

        let check = tracker.check_login_allowed(&key);
        assert!(!check.allowed);
        assert_eq!(check.remaining_attempts, 0);
        let locked_until = check.locked_until_ms.unwrap_or_default();
        assert!(locked_until > clock.now_ms());
        assert_eq!(
            check.retry_after_ms,
            Some(locked_until - clock.now_ms())
        );
    }

    #[test]
    fn lockout_expiry_resets_counter() {
        let (tracker, clock) = tracker();
        let key = key();

        for _ in 0..MAX_ATTEMPTS {
            tracker.record_failed_attempt(&key);
        }
        assert!(!tracker.check_login_allowed(&key).allowed);

        clock.advance_ms(INITIAL_LOCKOUT_MS + 1);
        let check = tracker.check_login_allowed(&key);
        assert!(check.allowed);
        assert_eq!(check.remaining_attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn repeated_lockouts_double_up_to_cap() {
        let (tracker, clock) = tracker();
        let key = key();

        let mut expected = INITIAL_LOCKOUT_MS;
        for _ in 0..8 {
            let mut last = None;
            for _ in 0..MAX_ATTEMPTS {
                last = Some(tracker.record_failed_attempt(&key));
            }
            let outcome = last.expect("at least one attempt recorded");
            assert!(outcome.locked);
            assert_eq!(outcome.lockout_duration_ms, Some(expected));
            clock.advance_ms(expected + 1);
            expected = (expected * 2).min(MAX_LOCKOUT_MS);
        }
    }

    #[test]
    fn idle_window_after_lockout_clears_escalation() {
        let (tracker, clock) = tracker();
        let key = key();

        for _ in 0..MAX_ATTEMPTS {
            tracker.record_failed_attempt(&key);
        }
        clock.advance_ms(INITIAL_LOCKOUT_MS + ATTEMPT_WINDOW_MS + 1);

        let mut last = None;
        for _ in 0..MAX_ATTEMPTS {
            last = Some(tracker.record_failed_attempt(&key));
        }
        let outcome = last.expect("at least one attempt recorded");
        assert_eq!(outcome.lockout_duration_ms, Some(INITIAL_LOCKOUT_MS));
    }

    #[test]
    fn window_expiry_resets_count() {
        let (tracker, clock) = tracker();
        let key = key();

        for _ in 0..MAX_ATTEMPTS - 1 {
            tracker.record_failed_attempt(&key);
        }
        clock.advance_ms(ATTEMPT_WINDOW_MS + 1);
        assert_eq!(
            tracker.check_login_allowed(&key).remaining_attempts,
            MAX_ATTEMPTS
        );

        let outcome = tracker.record_failed_attempt(&key);
        assert!(!outcome.locked);
        assert_eq!(outcome.remaining_attempts, MAX_ATTEMPTS - 1);
    }

    #[test]
    fn clear_resets_to_full_allowance() {
        let (tracker, _clock) = tracker();
        let key = key();

        for _ in 0..MAX_ATTEMPTS {
            tracker.record_failed_attempt(&key);
        }
        tracker.clear_login_attempts(&key);

        let check = tracker.check_login_allowed(&key);
        assert!(check.allowed);
        assert_eq!(check.remaining_attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn keys_are_isolated() {
        let (tracker, _clock) = tracker();
        let a = AttemptKey::new("ip1", "usera@example.com");
        let b = AttemptKey::new("ip1", "userb@example.com");
        let c = AttemptKey::new("ip2", "usera@example.com");

        for _ in 0..MAX_ATTEMPTS {
            tracker.record_failed_attempt(&a);
        }

        assert!(!tracker.check_login_allowed(&a).allowed);
        for other in [&b, &c] {
            let check = tracker.check_login_allowed(other);
            assert!(check.allowed);
            assert_eq!(check.remaining_attempts, MAX_ATTEMPTS);
        }
    }

    #[test]
    fn concurrent_failures_lock_exactly_once_per_cycle() {
        let (tracker, _clock) = tracker();
        let key = key();

        let locked_count: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let tracker = tracker.clone();
                    let key = key.clone();
                    scope.spawn(move || {
                        let mut locked = 0;
                        for _ in 0..25 {
                            if tracker.record_failed_attempt(&key).locked {
                                locked += 1;
                            }
                        }
                        locked
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap_or(0)).sum()
        });

        // Every attempt after the first lockout lands inside the active
        // lockout and reports locked without advancing the cycle.
        assert!(locked_count >= 1);
        let record = tracker
            .store
            .get(&key)
            .expect("record kept while locked");
        assert_eq!(record.lockout_cycles, 1);
        assert!(record.count < MAX_ATTEMPTS);
    }

    #[test]
    fn format_renders_seconds_and_rounded_minutes() {
        assert_eq!(format_lockout_duration(1_000), "1 second");
        assert_eq!(format_lockout_duration(30_000), "30 seconds");
        assert_eq!(format_lockout_duration(60_000), "1 minute");
        assert_eq!(format_lockout_duration(61_000), "2 minutes");
        assert_eq!(format_lockout_duration(90_000), "2 minutes");
        assert_eq!(format_lockout_duration(30 * 60_000), "30 minutes");
    }
}
