//! Per-provider circuit breaker.
//!
//! The resolver used to track provider health as a mutable "blocked" boolean
//! closed over its loop; this module replaces that with an explicit
//! three-state breaker driven by a policy table, so the transition logic is
//! testable independent of any loop it is embedded in.
//!
//! States:
//! * **Closed** — requests flow; failures are counted.
//! * **Open** — requests are refused without touching the network. After
//!   `cooldown` the breaker reports [`BreakerState::HalfOpen`].
//! * **HalfOpen** — exactly one trial request is allowed; success closes the
//!   breaker, failure re-opens it with a fresh cooldown.

use std::time::{Duration, Instant};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// What a response status does to the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerAction {
    /// Trip straight to Open (rate limit).
    Trip,
    /// Count toward the consecutive-failure threshold (server errors).
    Count,
    /// Leave the breaker alone (client errors that retrying won't fix).
    Ignore,
}

/// Map an HTTP status (or its absence, for transport failures) to an action.
///
/// The policy is a function rather than data so the table reads at the call
/// site; it covers the full taxonomy the providers produce.
pub fn policy(status: Option<u16>) -> BreakerAction {
    match status {
        Some(429) => BreakerAction::Trip,
        Some(s) if s >= 500 => BreakerAction::Count,
        // Transport failures behave like server errors.
        None => BreakerAction::Count,
        Some(_) => BreakerAction::Ignore,
    }
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: InnerState,
    /// Consecutive Count-class failures while Closed.
    failures: u32,
    /// Count-class failures tolerated before opening.
    failure_threshold: u32,
    cooldown: Duration,
}

#[derive(Debug)]
enum InnerState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: InnerState::Closed,
            failures: 0,
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Current state, promoting Open → HalfOpen once the cooldown elapses.
    pub fn state(&mut self) -> BreakerState {
        if let InnerState::Open { since } = self.state {
            if since.elapsed() >= self.cooldown {
                self.state = InnerState::HalfOpen;
            }
        }
        match self.state {
            InnerState::Closed => BreakerState::Closed,
            InnerState::Open { .. } => BreakerState::Open,
            InnerState::HalfOpen => BreakerState::HalfOpen,
        }
    }

    /// True when a request may be issued right now.
    pub fn allows_request(&mut self) -> bool {
        self.state() != BreakerState::Open
    }

    /// Record a successful call.
    pub fn on_success(&mut self) {
        self.failures = 0;
        self.state = InnerState::Closed;
    }

    /// Record a failed call with its HTTP status (None for transport errors).
    pub fn on_failure(&mut self, status: Option<u16>) {
        // A failed half-open trial always re-opens, whatever the status.
        if matches!(self.state, InnerState::HalfOpen) {
            self.open();
            return;
        }
        match policy(status) {
            BreakerAction::Trip => self.open(),
            BreakerAction::Count => {
                self.failures += 1;
                if self.failures >= self.failure_threshold {
                    self.open();
                }
            }
            BreakerAction::Ignore => {}
        }
    }

    fn open(&mut self) {
        self.failures = 0;
        self.state = InnerState::Open {
            since: Instant::now(),
        };
    }
}
