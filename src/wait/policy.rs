use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, ErrorKind};

/// Default timeout for a single wait (20 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default delay between polls (500ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long to wait, how often to poll, and which errors to retry.
///
/// A policy is plain data. Build one per wait, or keep a template around and
/// derive variants from it with the `with_*` methods.
///
/// # Example:
/// ```rust
/// use std::time::Duration;
/// use waitkit::{ErrorKind, PollPolicy};
///
/// let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_millis(250))
///     .with_backoff(1.5)
///     .ignore(ErrorKind::NotInteractable);
/// assert!(policy.ignores(&ErrorKind::NotFound));
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    #[serde(rename = "timeout_ms", with = "crate::duration_ms")]
    timeout: Duration,
    #[serde(rename = "poll_interval_ms", with = "crate::duration_ms")]
    poll_interval: Duration,
    ignored: HashSet<ErrorKind>,
    backoff_factor: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl PollPolicy {
    /// Fixed-interval policy that retries `NotFound` and `Stale` errors.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            ignored: vec![ErrorKind::NotFound, ErrorKind::Stale].into_iter().collect(),
            backoff_factor: 1.0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn ignored(&self) -> impl Iterator<Item = &ErrorKind> {
        self.ignored.iter()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Multiply the interval by `factor` after each unsuccessful poll.
    pub fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Treat errors of this kind as "not yet" instead of aborting.
    pub fn ignore(mut self, kind: ErrorKind) -> Self {
        self.ignored.insert(kind);
        self
    }

    /// Abort on errors of this kind, even if they were ignored before.
    pub fn abort_on(mut self, kind: ErrorKind) -> Self {
        self.ignored.remove(&kind);
        self
    }

    /// Abort on every observed error.
    pub fn ignore_none(mut self) -> Self {
        self.ignored.clear();
        self
    }

    pub fn ignores(&self, kind: &ErrorKind) -> bool {
        self.ignored.contains(kind)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::NonPositiveInterval);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoff(self.backoff_factor));
        }
        Ok(())
    }

    /// The delay that follows the poll with zero-based index `poll`,
    /// i.e. `poll_interval * backoff_factor^poll`, never longer than the timeout.
    pub fn interval_after(&self, poll: u32) -> Duration {
        if self.backoff_factor == 1.0 {
            return self.poll_interval.min(self.timeout);
        }
        let exponent = poll.min(i32::MAX as u32) as i32;
        let secs = self.poll_interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !secs.is_finite() || secs >= self.timeout.as_secs_f64() {
            self.timeout
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ignores_transient_kinds() {
        let policy = PollPolicy::default();
        assert_eq!(policy.timeout(), DEFAULT_TIMEOUT);
        assert!(policy.ignores(&ErrorKind::NotFound));
        assert!(policy.ignores(&ErrorKind::Stale));
        assert!(!policy.ignores(&ErrorKind::Application));
        assert!(!policy.clone().ignore_none().ignores(&ErrorKind::NotFound));
        assert!(!policy.abort_on(ErrorKind::Stale).ignores(&ErrorKind::Stale));
    }

    #[test]
    fn validate_rejects_zero_durations_and_bad_backoff() {
        let ok = PollPolicy::new(Duration::from_secs(1), Duration::from_millis(10));
        assert!(ok.validate().is_ok());
        assert_eq!(
            ok.clone().with_timeout(Duration::ZERO).validate(),
            Err(ConfigError::NonPositiveTimeout)
        );
        assert_eq!(
            ok.clone().with_interval(Duration::ZERO).validate(),
            Err(ConfigError::NonPositiveInterval)
        );
        assert_eq!(ok.clone().with_backoff(0.5).validate(), Err(ConfigError::InvalidBackoff(0.5)));
        assert!(ok.with_backoff(f64::NAN).validate().is_err());
    }

    #[test]
    fn backoff_grows_interval_up_to_timeout() {
        let policy =
            PollPolicy::new(Duration::from_secs(10), Duration::from_secs(1)).with_backoff(2.0);
        assert_eq!(policy.interval_after(0), Duration::from_secs(1));
        assert_eq!(policy.interval_after(1), Duration::from_secs(2));
        assert_eq!(policy.interval_after(3), Duration::from_secs(8));
        assert_eq!(policy.interval_after(4), Duration::from_secs(10));
        assert_eq!(policy.interval_after(5000), Duration::from_secs(10));
    }

    #[test]
    fn deserializes_from_millis() {
        let policy: PollPolicy = serde_json::from_str(
            r#"{"timeout_ms": 3000, "poll_interval_ms": 100, "ignored": ["not_found"]}"#,
        )
        .unwrap();
        assert_eq!(policy.timeout(), Duration::from_secs(3));
        assert_eq!(policy.poll_interval(), Duration::from_millis(100));
        assert_eq!(policy.backoff_factor(), 1.0);
        assert!(!policy.ignores(&ErrorKind::Stale));
    }

    #[test]
    fn custom_kinds_survive_serde() {
        let policy = PollPolicy::default()
            .ignore(ErrorKind::custom("spinner"))
            .abort_on(ErrorKind::Stale);
        let json = serde_json::to_string(&policy).unwrap();
        let back: PollPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
        assert!(back.ignores(&ErrorKind::custom("spinner")));
        assert!(back.ignores(&ErrorKind::NotFound));
        assert!(!back.ignores(&ErrorKind::Stale));
    }
}
