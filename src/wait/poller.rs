use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::wait::policy::PollPolicy;

/// Paces the polls of a single wait.
///
/// Polls follow a fixed schedule measured from the first poll, so a slow
/// condition evaluation eats into the following sleep instead of pushing
/// every later poll back.
pub(crate) struct PollTicker<'a> {
    policy: &'a PollPolicy,
    clock: &'a dyn Clock,
    start: Instant,
    next_due: Duration,
    cur_polls: u32,
}

impl<'a> PollTicker<'a> {
    pub fn new(policy: &'a PollPolicy, clock: &'a dyn Clock) -> Self {
        Self {
            policy,
            clock,
            start: clock.now(),
            next_due: Duration::ZERO,
            cur_polls: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start)
    }

    pub fn polls(&self) -> u32 {
        self.cur_polls
    }

    /// Record that the condition was evaluated once more.
    pub fn record_poll(&mut self) {
        self.cur_polls += 1;
    }

    /// Sleep until the next poll is due. Returns false once the budget is spent.
    pub fn tick(&mut self) -> bool {
        let timeout = self.policy.timeout();
        let elapsed = self.elapsed();

        if elapsed >= timeout {
            return false;
        }

        // Next poll is due no earlier than this long after the first poll started,
        // but never after the deadline.
        let interval = self.policy.interval_after(self.cur_polls.saturating_sub(1));
        self.next_due = (self.next_due + interval).min(timeout);

        if elapsed < self.next_due {
            self.clock.sleep(self.next_due - elapsed);
        }

        true
    }
}
