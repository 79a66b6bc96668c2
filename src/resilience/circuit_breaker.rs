//! Circuit breaker for downstream service protection
//!
//! One breaker guards every call to a single sibling service and is shared by
//! all in-flight requests targeting it.
//!
//! ```text
//! Closed   → Open:     consecutive failures reach `failure_threshold`
//! Open     → HalfOpen: `reset_timeout` elapsed since entering Open
//! HalfOpen → Closed:   `half_open_max_calls` consecutive trial successes
//! HalfOpen → Open:     any trial failure
//! ```
//!
//! Admission hands out a [`Permit`]. The mutex is held only while admitting
//! and while reporting, never across the network call. Every transition bumps
//! the generation, and reports carrying an older generation are discarded.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::BreakerConfig;

/// Breaker mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerMode {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerMode::Closed => "closed",
            BreakerMode::Open => "open",
            BreakerMode::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures that trip a closed breaker
    pub failure_threshold: u32,
    /// Time an open breaker waits before allowing trial calls
    pub reset_timeout: Duration,
    /// Concurrent trial calls allowed while half-open, and the number of
    /// consecutive trial successes needed to close again
    pub half_open_max_calls: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
            half_open_max_calls: config.half_open_max_calls,
        }
    }
}

/// Point-in-time view of a breaker, used for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub service: String,
    pub mode: BreakerMode,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    pub half_open_max_calls: u32,
}

/// Returned when a call is refused without touching the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

#[derive(Debug)]
struct State {
    mode: BreakerMode,
    generation: u64,
    consecutive_failures: u32,
    consecutive_successes: u32,
    /// Trial permits currently outstanding (HalfOpen only)
    in_flight: u32,
    changed_at: Instant,
}

/// Per-service circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            state: Mutex::new(State {
                mode: BreakerMode::Closed,
                generation: 0,
                consecutive_failures: 0,
                consecutive_successes: 0,
                in_flight: 0,
                changed_at: Instant::now(),
            }),
        }
    }

    /// Name of the downstream service this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    /// Current mode, applying a due Open → HalfOpen transition first
    pub fn mode(&self) -> BreakerMode {
        self.mode_at(Instant::now())
    }

    pub fn mode_at(&self, now: Instant) -> BreakerMode {
        let mut state = self.lock();
        self.refresh(&mut state, now);
        state.mode
    }

    /// Ask permission to dispatch one call
    pub fn try_acquire(&self) -> Result<Permit<'_>, Rejected> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<Permit<'_>, Rejected> {
        let mut state = self.lock();
        self.refresh(&mut state, now);

        match state.mode {
            BreakerMode::Closed => {}
            BreakerMode::Open => return Err(Rejected),
            BreakerMode::HalfOpen => {
                if state.in_flight >= self.settings.half_open_max_calls {
                    return Err(Rejected);
                }
                state.in_flight += 1;
            }
        }

        Ok(Permit {
            breaker: self,
            generation: state.generation,
            settled: false,
        })
    }

    pub fn status(&self) -> BreakerStatus {
        let mut state = self.lock();
        self.refresh(&mut state, Instant::now());
        BreakerStatus {
            service: self.name.clone(),
            mode: state.mode,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            failure_threshold: self.settings.failure_threshold,
            reset_timeout_secs: self.settings.reset_timeout.as_secs(),
            half_open_max_calls: self.settings.half_open_max_calls,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock still holds a usable value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, state: &mut State, now: Instant) {
        if state.mode == BreakerMode::Open
            && now.saturating_duration_since(state.changed_at) >= self.settings.reset_timeout
        {
            self.transition(state, BreakerMode::HalfOpen, now);
        }
    }

    fn transition(&self, state: &mut State, to: BreakerMode, now: Instant) {
        let from = state.mode;
        state.mode = to;
        state.generation = state.generation.wrapping_add(1);
        state.consecutive_failures = 0;
        state.consecutive_successes = 0;
        state.in_flight = 0;
        state.changed_at = now;

        match to {
            BreakerMode::Open => warn!(
                service = %self.name,
                from = %from,
                reset_timeout_ms = self.settings.reset_timeout.as_millis() as u64,
                "Circuit breaker opened"
            ),
            BreakerMode::HalfOpen => {
                info!(service = %self.name, "Circuit breaker half-open, allowing trial calls")
            }
            BreakerMode::Closed => info!(service = %self.name, "Circuit breaker closed"),
        }
    }

    fn settle(&self, generation: u64, outcome: Option<bool>, now: Instant) {
        let mut state = self.lock();
        self.refresh(&mut state, now);

        if state.generation != generation {
            return;
        }

        if state.mode == BreakerMode::HalfOpen {
            state.in_flight = state.in_flight.saturating_sub(1);
        }

        match (state.mode, outcome) {
            (_, None) => {}
            (BreakerMode::Closed, Some(true)) => {
                state.consecutive_failures = 0;
            }
            (BreakerMode::Closed, Some(false)) => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.settings.failure_threshold {
                    self.transition(&mut state, BreakerMode::Open, now);
                }
            }
            (BreakerMode::HalfOpen, Some(true)) => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.settings.half_open_max_calls {
                    self.transition(&mut state, BreakerMode::Closed, now);
                }
            }
            (BreakerMode::HalfOpen, Some(false)) => {
                self.transition(&mut state, BreakerMode::Open, now);
            }
            // Same generation as an open breaker is impossible: no permit is
            // issued while open.
            (BreakerMode::Open, Some(_)) => {}
        }
    }
}

/// Admission ticket for a single call
///
/// Consume it with [`Permit::success`] or [`Permit::failure`]. Dropping it
/// unreported releases any trial slot and records nothing.
#[must_use = "an unreported permit records nothing against the breaker"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    pub fn success(self) {
        self.report_at(true, Instant::now());
    }

    pub fn failure(self) {
        self.report_at(false, Instant::now());
    }

    pub fn report_at(mut self, success: bool, now: Instant) {
        self.settled = true;
        self.breaker.settle(self.generation, Some(success), now);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, None, Instant::now());
        }
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("service", &self.breaker.name)
            .field("generation", &self.generation)
            .finish()
    }
}
