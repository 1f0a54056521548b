//! Circuit breaker state machine.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: operation assumed broken, calls fail fast
//! - Half-Open: cooldown elapsed, calls probe whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= max_failures within failure_window
//! Closed → Open: reconfigure lowers max_failures to at or below the streak
//! Open → Half-Open: open_duration elapsed since opening (derived, never stored)
//! Half-Open → Closed: probe succeeds within max_operation_duration
//! Half-Open → Open: probe fails or is too slow
//! ```
//!
//! # Design Decisions
//! - Every counter is its own atomic; there is no lock around the breaker
//! - `is_open`/`is_half_open` read several atomics at different instants, so two
//!   callers may both see Half-Open and both probe; each one then closes or
//!   reopens independently
//! - The failure window is only re-evaluated when a failure arrives; an idle
//!   breaker keeps its streak until the next failure
//! - Configuration lives behind an `ArcSwap`; a call keeps the snapshot it
//!   loaded on entry even if the breaker is reconfigured meanwhile

use arc_swap::ArcSwap;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::resilience::breaker_config::BreakerConfig;
use crate::resilience::errors::{
    ForcedOpen, ListenerError, SlowOperation, ThresholdLowered, Transition,
};
use crate::resilience::executor::Executor;
use crate::resilience::listener::{BreakerListener, NoopListener};

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Monotonic nanoseconds since the first breaker read the clock. Never zero,
/// so zero can mean "unset" in the timestamp atomics.
fn now_nanos() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    let nanos = u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
    nanos.max(1)
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// A named circuit breaker shared by every call site guarding one operation.
pub struct CircuitBreaker {
    name: String,
    config: ArcSwap<BreakerConfig>,
    listener: Arc<dyn BreakerListener>,

    current_failures: AtomicU32,
    /// Clock reading when last opened; 0 while closed.
    opened_at: AtomicU64,
    /// Clock reading of the first failure in the current streak; 0 before any failure.
    window_start: AtomicU64,

    total_calls: AtomicU64,
    total_failures: AtomicU64,
    times_opened: AtomicU64,
}

impl CircuitBreaker {
    /// Create a breaker that notifies nobody.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_listener(name, config, NoopListener)
    }

    pub fn with_listener(
        name: impl Into<String>,
        config: BreakerConfig,
        listener: impl BreakerListener + 'static,
    ) -> Self {
        Self::with_shared_listener(name, config, Arc::new(listener))
    }

    pub fn with_shared_listener(
        name: impl Into<String>,
        config: BreakerConfig,
        listener: Arc<dyn BreakerListener>,
    ) -> Self {
        let name = name.into();
        tracing::debug!(
            breaker = %name,
            max_failures = config.max_failures,
            open_duration = ?config.open_duration,
            failure_window = ?config.failure_window,
            "Circuit breaker created"
        );
        Self {
            name,
            config: ArcSwap::from_pointee(config),
            listener,
            current_failures: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
            window_start: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            times_opened: AtomicU64::new(0),
        }
    }

    /// Executor bound to this breaker.
    pub fn executor(self: &Arc<Self>) -> Executor {
        Executor::new(self.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<BreakerConfig> {
        self.config.load_full()
    }

    /// Replace the configuration. Calls already in flight finish under the old one.
    ///
    /// A closed breaker whose streak already meets the new threshold is opened
    /// right away, so its cooldown starts and the listener hears about it.
    pub fn reconfigure(&self, config: BreakerConfig) -> Result<(), ListenerError> {
        tracing::info!(
            breaker = %self.name,
            max_failures = config.max_failures,
            open_duration = ?config.open_duration,
            failure_window = ?config.failure_window,
            max_operation_duration = ?config.max_operation_duration,
            "Circuit breaker reconfigured"
        );
        let config = Arc::new(config);
        self.config.store(config.clone());

        let failures = self.current_failures.load(Ordering::Acquire);
        if self.opened_at.load(Ordering::Acquire) == 0 && failures >= config.threshold() {
            let cause = ThresholdLowered {
                failures,
                max_failures: config.threshold(),
            };
            return self.open_under(&config, &cause);
        }
        Ok(())
    }

    // --- State ---

    pub fn is_open(&self) -> bool {
        self.is_open_under(&self.config.load())
    }

    pub fn is_half_open(&self) -> bool {
        self.is_half_open_under(&self.config.load())
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    pub fn state(&self) -> CircuitState {
        let config = self.config.load();
        if self.is_half_open_under(&config) {
            CircuitState::HalfOpen
        } else if self.is_open_under(&config) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub(crate) fn is_open_under(&self, config: &BreakerConfig) -> bool {
        self.current_failures.load(Ordering::Acquire) >= config.threshold()
            && !self.is_half_open_under(config)
    }

    pub(crate) fn is_half_open_under(&self, config: &BreakerConfig) -> bool {
        let opened_at = self.opened_at.load(Ordering::Acquire);
        opened_at != 0 && now_nanos().saturating_sub(opened_at) >= nanos(config.open_duration)
    }

    // --- Statistics ---

    pub fn current_failures(&self) -> u32 {
        self.current_failures.load(Ordering::Relaxed)
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn times_opened(&self) -> u64 {
        self.times_opened.load(Ordering::Relaxed)
    }

    /// Zero the lifetime counters. The circuit state is left alone.
    pub fn reset_statistics(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.total_failures.store(0, Ordering::Relaxed);
        self.times_opened.store(0, Ordering::Relaxed);
        tracing::debug!(breaker = %self.name, "Circuit breaker statistics reset");
    }

    pub(crate) fn record_call(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    // --- Outcomes ---

    /// Report a failure regardless of classification.
    pub fn record_failure(&self, error: &(dyn StdError + 'static)) -> Result<(), ListenerError> {
        self.record_failure_under(&self.config.load(), error)
    }

    /// Report a successful call that took `elapsed`.
    pub fn record_success_duration(&self, elapsed: Duration) -> Result<(), ListenerError> {
        self.record_success_under(&self.config.load(), elapsed)
    }

    /// Report an operation error; only errors the classifier accepts are counted.
    pub fn record_outcome(&self, error: &(dyn StdError + 'static)) -> Result<(), ListenerError> {
        self.record_outcome_under(&self.config.load(), error)
    }

    pub(crate) fn record_outcome_under(
        &self,
        config: &BreakerConfig,
        error: &(dyn StdError + 'static),
    ) -> Result<(), ListenerError> {
        if config.classifier.classify(error) {
            self.record_failure_under(config, error)
        } else {
            tracing::trace!(breaker = %self.name, error = %error, "Ignored error");
            Ok(())
        }
    }

    pub(crate) fn record_success_under(
        &self,
        config: &BreakerConfig,
        elapsed: Duration,
    ) -> Result<(), ListenerError> {
        if elapsed > config.max_operation_duration {
            let slow = SlowOperation {
                limit: config.max_operation_duration,
                elapsed,
            };
            return self.record_failure_under(config, &slow);
        }

        if self.is_half_open_under(config) {
            return self.close();
        }
        Ok(())
    }

    pub(crate) fn record_failure_under(
        &self,
        config: &BreakerConfig,
        error: &(dyn StdError + 'static),
    ) -> Result<(), ListenerError> {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let now = now_nanos();
        let _ = self
            .window_start
            .compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire);
        let window_start = self.window_start.load(Ordering::Acquire);

        // A tripped breaker keeps counting so a failed probe always reopens it.
        let tripped = self.opened_at.load(Ordering::Acquire) != 0;
        let window_expired = now.saturating_sub(window_start) >= nanos(config.failure_window);

        let failures = if window_expired && !tripped {
            tracing::debug!(breaker = %self.name, "Failure window expired, restarting streak");
            self.current_failures.store(1, Ordering::Release);
            self.window_start.store(now, Ordering::Release);
            1
        } else {
            self.current_failures
                .fetch_add(1, Ordering::AcqRel)
                .saturating_add(1)
        };

        // A threshold lowered mid-call applies to this failure too.
        let threshold = config.threshold().min(self.config.load().threshold());
        if failures >= threshold {
            return self.open_under(config, error);
        }
        Ok(())
    }

    // --- Transitions ---

    /// Force the breaker open.
    pub fn open(&self) -> Result<(), ListenerError> {
        self.open_with(&ForcedOpen)
    }

    /// Open the breaker, reporting `cause` to the listener.
    pub fn open_with(&self, cause: &(dyn StdError + 'static)) -> Result<(), ListenerError> {
        self.open_under(&self.config.load(), cause)
    }

    fn open_under(
        &self,
        config: &BreakerConfig,
        cause: &(dyn StdError + 'static),
    ) -> Result<(), ListenerError> {
        self.times_opened.fetch_add(1, Ordering::Relaxed);
        // Count first: a closed breaker reads open as soon as it is stored.
        self.current_failures
            .store(config.threshold(), Ordering::Release);
        self.opened_at.store(now_nanos(), Ordering::Release);

        tracing::warn!(
            breaker = %self.name,
            failures = config.threshold(),
            open_duration = ?config.open_duration,
            cause = %cause,
            "Circuit breaker opened"
        );

        self.listener
            .on_open(self, cause)
            .map_err(|source| ListenerError::new(&self.name, Transition::Open, source))
    }

    /// Close the breaker and clear the failure streak.
    pub fn close(&self) -> Result<(), ListenerError> {
        self.current_failures.store(0, Ordering::Release);
        self.opened_at.store(0, Ordering::Release);

        tracing::info!(breaker = %self.name, "Circuit breaker closed");

        self.listener
            .on_close(self)
            .map_err(|source| ListenerError::new(&self.name, Transition::Close, source))
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("current_failures", &self.current_failures())
            .field("total_calls", &self.total_calls())
            .field("total_failures", &self.total_failures())
            .field("times_opened", &self.times_opened())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classifier::FailureClassifier;
    use crate::resilience::errors::BoxError;
    use std::sync::Mutex;
    use std::thread;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    #[derive(Debug, Error)]
    #[error("bad request")]
    struct BadRequest;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl BreakerListener for Recorder {
        fn on_open(&self, b: &CircuitBreaker, cause: &(dyn StdError + 'static)) -> Result<(), BoxError> {
            self.events.lock().unwrap().push(format!("open:{}:{}", b.name(), cause));
            Ok(())
        }

        fn on_close(&self, b: &CircuitBreaker) -> Result<(), BoxError> {
            self.events.lock().unwrap().push(format!("close:{}", b.name()));
            Ok(())
        }
    }

    struct Exploding;

    impl BreakerListener for Exploding {
        fn on_open(&self, _: &CircuitBreaker, _: &(dyn StdError + 'static)) -> Result<(), BoxError> {
            Err("pager offline".into())
        }

        fn on_close(&self, _: &CircuitBreaker) -> Result<(), BoxError> {
            Err("pager offline".into())
        }
    }

    fn config(max_failures: u32) -> BreakerConfig {
        BreakerConfig::new()
            .max_failures(max_failures)
            .open_duration(Duration::from_secs(60))
            .failure_window(Duration::from_secs(60))
    }

    #[test]
    fn test_starts_closed() {
        let breaker = CircuitBreaker::new("fresh", config(3));
        assert!(breaker.is_closed());
        assert!(!breaker.is_open());
        assert!(!breaker.is_half_open());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.current_failures(), 0);
    }

    #[test]
    fn test_opens_at_threshold() {
        let recorder = Arc::new(Recorder::default());
        let breaker = CircuitBreaker::with_listener("db", config(3), recorder.clone());

        breaker.record_failure(&Unavailable).unwrap();
        breaker.record_failure(&Unavailable).unwrap();
        assert!(breaker.is_closed());
        assert_eq!(breaker.current_failures(), 2);

        breaker.record_failure(&Unavailable).unwrap();
        assert!(breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.times_opened(), 1);
        assert_eq!(breaker.total_failures(), 3);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["open:db:backend unavailable".to_string()]
        );
    }

    #[test]
    fn test_success_while_closed_keeps_streak() {
        let breaker = CircuitBreaker::new("streak", config(3));
        breaker.record_failure(&Unavailable).unwrap();
        breaker.record_failure(&Unavailable).unwrap();
        breaker.record_success_duration(Duration::from_millis(1)).unwrap();
        assert_eq!(breaker.current_failures(), 2);

        breaker.record_failure(&Unavailable).unwrap();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_failure_window_expiry_restarts_streak() {
        let breaker = CircuitBreaker::new(
            "window",
            config(2).failure_window(Duration::from_millis(1)),
        );

        breaker.record_failure(&Unavailable).unwrap();
        thread::sleep(Duration::from_millis(2));
        breaker.record_failure(&Unavailable).unwrap();

        assert!(breaker.is_closed());
        assert_eq!(breaker.current_failures(), 1);
        assert_eq!(breaker.total_failures(), 2);
    }

    #[test]
    fn test_half_open_after_cooldown_then_close() {
        let recorder = Arc::new(Recorder::default());
        let breaker = CircuitBreaker::with_listener(
            "probe",
            config(1).open_duration(Duration::from_millis(1)),
            recorder.clone(),
        );

        breaker.open().unwrap();
        thread::sleep(Duration::from_millis(2));
        assert!(breaker.is_half_open());
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success_duration(Duration::ZERO).unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.current_failures(), 0);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "open:probe:circuit breaker was forced open".to_string(),
                "close:probe".to_string()
            ]
        );
    }

    #[test]
    fn test_failed_probe_reopens_even_after_window_expired() {
        let breaker = CircuitBreaker::new(
            "reopen",
            config(2)
                .open_duration(Duration::from_millis(1))
                .failure_window(Duration::from_millis(1)),
        );
        breaker.record_failure(&Unavailable).unwrap();
        breaker.record_failure(&Unavailable).unwrap();
        assert!(breaker.is_open());

        thread::sleep(Duration::from_millis(3));
        assert!(breaker.is_half_open());

        breaker.record_failure(&Unavailable).unwrap();
        assert_eq!(breaker.times_opened(), 2);
        assert!(!breaker.is_closed() || breaker.is_half_open());
    }

    #[test]
    fn test_slow_success_counts_as_failure() {
        let recorder = Arc::new(Recorder::default());
        let breaker = CircuitBreaker::with_listener(
            "slow",
            config(1).max_operation_duration(Duration::from_millis(5)),
            recorder.clone(),
        );

        breaker.record_success_duration(Duration::from_millis(50)).unwrap();
        assert!(breaker.is_open());
        let events = recorder.events.lock().unwrap();
        assert!(events[0].starts_with("open:slow:operation took 50ms"));
    }

    #[test]
    fn test_ignored_outcome_is_invisible() {
        let breaker = CircuitBreaker::new(
            "ignored",
            config(2).classifier(FailureClassifier::new().ignore::<BadRequest>()),
        );
        for _ in 0..5 {
            breaker.record_outcome(&BadRequest).unwrap();
        }
        assert!(breaker.is_closed());
        assert_eq!(breaker.current_failures(), 0);
        assert_eq!(breaker.total_failures(), 0);

        breaker.record_outcome(&Unavailable).unwrap();
        assert_eq!(breaker.current_failures(), 1);
    }

    #[test]
    fn test_listener_failure_does_not_undo_transition() {
        let breaker = CircuitBreaker::with_listener("loud", config(1), Exploding);

        let err = breaker.record_failure(&Unavailable).unwrap_err();
        assert_eq!(err.transition(), Transition::Open);
        assert_eq!(err.listener_error().to_string(), "pager offline");
        assert!(breaker.is_open());

        let err = breaker.close().unwrap_err();
        assert_eq!(err.transition(), Transition::Close);
        assert!(breaker.is_closed());
    }

    #[test]
    fn test_reset_statistics_keeps_state() {
        let breaker = CircuitBreaker::new("stats", config(2));
        breaker.record_call();
        breaker.record_failure(&Unavailable).unwrap();
        breaker.record_failure(&Unavailable).unwrap();
        assert!(breaker.is_open());

        breaker.reset_statistics();
        assert_eq!(breaker.total_calls(), 0);
        assert_eq!(breaker.total_failures(), 0);
        assert_eq!(breaker.times_opened(), 0);
        assert!(breaker.is_open());
        assert_eq!(breaker.current_failures(), 2);
    }

    #[test]
    fn test_reconfigure_swaps_whole_snapshot() {
        let breaker = CircuitBreaker::new("swap", config(5));
        breaker.record_failure(&Unavailable).unwrap();
        assert!(breaker.is_closed());

        let before = breaker.config();
        breaker.reconfigure(config(3)).unwrap();
        assert_eq!(before.max_failures, 5);
        assert_eq!(breaker.config().max_failures, 3);
        assert!(breaker.is_closed());
        assert_eq!(breaker.times_opened(), 0);
    }

    #[test]
    fn test_lowered_threshold_opens_with_cooldown() {
        let recorder = Arc::new(Recorder::default());
        let breaker = CircuitBreaker::with_listener("lowered", config(5), recorder.clone());
        breaker.record_failure(&Unavailable).unwrap();
        breaker.record_failure(&Unavailable).unwrap();

        breaker
            .reconfigure(config(2).open_duration(Duration::from_millis(1)))
            .unwrap();
        assert!(breaker.is_open());
        assert_eq!(breaker.times_opened(), 1);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["open:lowered:2 consecutive failures reached the lowered threshold of 2".to_string()]
        );

        thread::sleep(Duration::from_millis(3));
        assert!(breaker.is_half_open());
        breaker.record_success_duration(Duration::ZERO).unwrap();
        assert!(breaker.is_closed());
    }

    #[test]
    fn test_forced_open_is_visible_to_concurrent_readers() {
        let breaker = Arc::new(CircuitBreaker::new("forced", config(4)));
        let reader = {
            let breaker = breaker.clone();
            thread::spawn(move || {
                // Once the streak reads tripped, the circuit must read open.
                loop {
                    if breaker.current_failures() >= 4 {
                        return breaker.is_open();
                    }
                    thread::yield_now();
                }
            })
        };

        breaker.open().unwrap();
        assert!(reader.join().unwrap());
        assert!(breaker.is_open());
        assert!(!breaker.is_half_open());
        assert_eq!(breaker.current_failures(), 4);
    }

    #[test]
    fn test_reconfigure_does_not_reopen_tripped_breaker() {
        let breaker = CircuitBreaker::new("tripped", config(2));
        breaker.open().unwrap();
        breaker.reconfigure(config(1)).unwrap();
        assert_eq!(breaker.times_opened(), 1);
        assert!(breaker.is_open());
    }

    #[test]
    fn test_in_flight_failure_sees_lowered_threshold() {
        let breaker = CircuitBreaker::new("inflight", config(10));
        breaker.record_failure(&Unavailable).unwrap();

        let snapshot = breaker.config();
        breaker.reconfigure(config(2)).unwrap();
        assert!(breaker.is_closed());

        breaker.record_failure_under(&snapshot, &Unavailable).unwrap();
        assert!(breaker.is_open());
        assert_eq!(breaker.times_opened(), 1);
    }

    #[test]
    fn test_concurrent_failures_open_once_threshold_reached() {
        let breaker = Arc::new(CircuitBreaker::new("threads", config(8)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = breaker.clone();
                thread::spawn(move || breaker.record_failure(&Unavailable).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(breaker.is_open());
        assert_eq!(breaker.total_failures(), 8);
        assert!(breaker.times_opened() >= 1);
    }
}
