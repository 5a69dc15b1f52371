use std::time::Duration;

/// Attempt budget for one logical exchange.
const MAX_ATTEMPTS: u32 = 100;

/// How long to wait before retrying a status the server asked us to back off
/// from. 500/502 usually mean the storage backend is restarting; 60s keeps us
/// from hammering it while it comes back.
const DELAY_500: Duration = Duration::from_secs(60);
const DELAY_429: Duration = Duration::from_secs(3);
const DELAY_502: Duration = Duration::from_secs(60);
const DELAY_EXTRA: Duration = Duration::from_millis(300);

/// Delays for transport-level failures, by shape.
const DELAY_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(100);
const DELAY_CONNECT: Duration = Duration::from_secs(60);
const DELAY_TRANSPORT_OTHER: Duration = Duration::from_secs(10);

/// Hard deadline for a single attempt.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Per-status-code retry policy.
///
/// Evaluated strictly in order after each attempt: transport error, 500, 429,
/// 502, the caller-supplied extra set, then anything else returns
/// immediately. All delays are overridable so tests can run fast.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_500: Duration,
    pub delay_429: Duration,
    pub delay_502: Duration,
    /// Delay applied to statuses in `extra_retry_statuses`.
    pub delay_extra: Duration,
    pub delay_attempt_timeout: Duration,
    pub delay_connect: Duration,
    pub delay_transport_other: Duration,
    /// Additional statuses the caller wants retried (e.g. a 202 "not ready").
    pub extra_retry_statuses: Vec<u16>,
    /// Deadline for each individual attempt; an expired attempt counts as a
    /// transient transport failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay_500: DELAY_500,
            delay_429: DELAY_429,
            delay_502: DELAY_502,
            delay_extra: DELAY_EXTRA,
            delay_attempt_timeout: DELAY_ATTEMPT_TIMEOUT,
            delay_connect: DELAY_CONNECT,
            delay_transport_other: DELAY_TRANSPORT_OTHER,
            extra_retry_statuses: Vec::new(),
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Returns the delay before the next attempt, or `None` when the status
    /// is terminal and must be returned to the caller as-is.
    pub fn delay_for_status(&self, status: u16) -> Option<Duration> {
        match status {
            500 => Some(self.delay_500),
            429 => Some(self.delay_429),
            502 => Some(self.delay_502),
            s if self.extra_retry_statuses.contains(&s) => Some(self.delay_extra),
            _ => None,
        }
    }

    /// Transport-level failures are always transient; the delay depends on
    /// what broke. Timeouts retry almost immediately (the attempt already
    /// consumed its deadline), connection failures wait the longest.
    pub fn delay_for_transport_error(&self, err: &reqwest::Error) -> Duration {
        if err.is_timeout() {
            self.delay_attempt_timeout
        } else if err.is_connect() {
            self.delay_connect
        } else {
            self.delay_transport_other
        }
    }

    /// Zeroes every delay; tests use this to keep retry loops fast.
    pub fn immediate(mut self) -> Self {
        self.delay_500 = Duration::ZERO;
        self.delay_429 = Duration::ZERO;
        self.delay_502 = Duration::ZERO;
        self.delay_extra = Duration::ZERO;
        self.delay_attempt_timeout = Duration::ZERO;
        self.delay_connect = Duration::ZERO;
        self.delay_transport_other = Duration::ZERO;
        self
    }
}
