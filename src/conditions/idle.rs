use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, Observation};

/// Activity reported by the driver, e.g. from a request counter injected into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Requests (or other tracked operations) still in flight.
    pub pending: u32,
    /// Time since the last tracked operation started or finished.
    #[serde(rename = "quiet_for_ms", with = "crate::duration_ms")]
    pub quiet_for: Duration,
}

impl Activity {
    pub fn new(pending: u32, quiet_for: Duration) -> Self {
        Self { pending, quiet_for }
    }
}

/// Satisfied once nothing is in flight and nothing happened for `threshold`.
///
/// The timestamps come from the observed system, not from the engine's clock.
/// Yields the quiet period observed at the time of success.
#[derive(Debug)]
pub struct Idle<F> {
    activity: F,
    threshold: Duration,
}

impl<F> Idle<F>
where
    F: FnMut() -> Observation<Activity>,
{
    pub fn new(activity: F, threshold: Duration) -> Self {
        Self { activity, threshold }
    }
}

impl<F> Condition for Idle<F>
where
    F: FnMut() -> Observation<Activity>,
{
    type Output = Duration;

    fn poll(&mut self) -> Observation<Duration> {
        match (self.activity)() {
            Observation::Satisfied(a) if a.pending == 0 && a.quiet_for >= self.threshold => {
                Observation::Satisfied(a.quiet_for)
            }
            Observation::Satisfied(_) | Observation::NotYet => Observation::NotYet,
            Observation::Failed(e) => Observation::Failed(e),
        }
    }
}

/// Shorthand for [`Idle::new`].
pub fn idle<F>(activity: F, threshold: Duration) -> Idle<F>
where
    F: FnMut() -> Observation<Activity>,
{
    Idle::new(activity, threshold)
}
