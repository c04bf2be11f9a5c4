use std::sync::Arc;

use log::{debug, trace, warn};

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::condition::{Condition, Observation};
use crate::error::ConfigResult;
use crate::wait::outcome::{FailureKind, WaitFailure, WaitOutcome};
use crate::wait::policy::PollPolicy;
use crate::wait::poller::PollTicker;

/// Explicit wait, configured with the builder pattern.
///
/// # Example:
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use waitkit::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let clock = ManualClock::new();
/// let mut attempts = 0;
/// let outcome = Waiter::new(PollPolicy::new(Duration::from_secs(5), Duration::from_millis(100)))
///     .with_clock(Arc::new(clock))
///     .desc("results table")
///     .run(|| {
///         attempts += 1;
///         Observation::from_bool(attempts == 3)
///     })?;
/// assert_eq!(outcome.polls(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Waiter {
    policy: PollPolicy,
    clock: Arc<dyn Clock>,
    cancel: Option<CancelToken>,
    description: Option<String>,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(PollPolicy::default())
    }
}

impl Waiter {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            clock: Arc::new(SystemClock),
            cancel: None,
            description: None,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Use the specified policy for this waiter only.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stop polling once this token is cancelled.
    pub fn cancel_on(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Describe what is being waited for. This shows up in failure messages.
    pub fn desc<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |t| t.is_cancelled())
    }

    /// Poll `condition` until it is satisfied, fails permanently, the timeout
    /// is reached or the wait is cancelled.
    ///
    /// Only an invalid policy is returned as `Err`. Every runtime result,
    /// including timeouts, is a [`WaitOutcome`].
    pub fn run<C>(&self, mut condition: C) -> ConfigResult<WaitOutcome<C::Output>>
    where
        C: Condition,
    {
        self.policy.validate()?;

        let mut ticker = PollTicker::new(&self.policy, self.clock());
        let mut last_error = None;

        let failure = loop {
            if self.cancelled() {
                debug!("wait cancelled after {} polls", ticker.polls());
                break WaitFailure::new(
                    FailureKind::Cancelled,
                    ticker.elapsed(),
                    ticker.polls(),
                    last_error,
                );
            }

            ticker.record_poll();
            match condition.poll() {
                Observation::Satisfied(value) => {
                    trace!("condition satisfied on poll {}", ticker.polls());
                    return Ok(WaitOutcome::Success {
                        value,
                        elapsed: ticker.elapsed(),
                        polls: ticker.polls(),
                    });
                }
                Observation::NotYet => {
                    trace!("condition not satisfied on poll {}", ticker.polls());
                }
                Observation::Failed(e) if self.policy.ignores(&e.kind) => {
                    debug!("ignoring error on poll {}: {}", ticker.polls(), e);
                    last_error = Some(e);
                }
                Observation::Failed(e) => {
                    warn!("wait aborted on poll {}: {}", ticker.polls(), e);
                    break WaitFailure::new(
                        FailureKind::Permanent,
                        ticker.elapsed(),
                        ticker.polls(),
                        Some(e),
                    );
                }
            }

            if !ticker.tick() {
                break WaitFailure::new(
                    FailureKind::Timeout,
                    ticker.elapsed(),
                    ticker.polls(),
                    last_error,
                );
            }
        };

        Ok(WaitOutcome::Failure(WaitFailure {
            description: self.description.clone(),
            ..failure
        }))
    }
}

/// Poll `condition` under `policy` in real time.
pub fn wait_until<C>(condition: C, policy: PollPolicy) -> ConfigResult<WaitOutcome<C::Output>>
where
    C: Condition,
{
    Waiter::new(policy).run(condition)
}
