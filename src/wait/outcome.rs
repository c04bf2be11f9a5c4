use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::ObservedError;

/// Why a wait did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The budget ran out while the condition stayed unsatisfied.
    Timeout,
    /// The observed system reported an error the policy does not retry.
    Permanent,
    /// The caller cancelled the wait.
    Cancelled,
    /// Every strategy of a fallback chain failed.
    AllStrategiesExhausted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timed out",
            FailureKind::Permanent => "failed permanently",
            FailureKind::Cancelled => "cancelled",
            FailureKind::AllStrategiesExhausted => "all strategies exhausted",
        };
        f.write_str(name)
    }
}

/// A failed wait, with enough detail to tell a slow application from a broken one.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct WaitFailure {
    pub kind: FailureKind,
    pub elapsed: Duration,
    pub polls: u32,
    /// The last error seen while polling. For `Permanent` this is the error
    /// that aborted the wait; for `Timeout` it is the last ignored error, if any.
    pub last_error: Option<ObservedError>,
    /// Per-strategy failures, in the order the strategies were tried.
    pub strategy_failures: Vec<StrategyFailure>,
    /// Human-readable description of what was being waited for.
    pub description: Option<String>,
}

impl WaitFailure {
    pub(crate) fn new(
        kind: FailureKind,
        elapsed: Duration,
        polls: u32,
        last_error: Option<ObservedError>,
    ) -> Self {
        Self {
            kind,
            elapsed,
            polls,
            last_error,
            strategy_failures: Vec::new(),
            description: None,
        }
    }
}

impl fmt::Display for WaitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(desc) = &self.description {
            write!(f, "waiting for {}: ", desc)?;
        }
        write!(f, "{} after {:?} ({} polls)", self.kind, self.elapsed, self.polls)?;
        if let Some(e) = &self.last_error {
            write!(f, ", last error: {}", e)?;
        }
        for s in &self.strategy_failures {
            write!(f, "; [{}] {} after {:?}", s.label, s.failure.kind, s.failure.elapsed)?;
        }
        Ok(())
    }
}

/// The failure of one strategy inside a fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub label: String,
    pub failure: WaitFailure,
}

/// The result of a wait: exactly one of success or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    Success {
        value: T,
        elapsed: Duration,
        polls: u32,
    },
    Failure(WaitFailure),
}

impl<T> WaitOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, WaitOutcome::Success { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Success { elapsed, .. } => *elapsed,
            WaitOutcome::Failure(f) => f.elapsed,
        }
    }

    pub fn polls(&self) -> u32 {
        match self {
            WaitOutcome::Success { polls, .. } => *polls,
            WaitOutcome::Failure(f) => f.polls,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            WaitOutcome::Success { .. } => None,
            WaitOutcome::Failure(f) => Some(f.kind),
        }
    }

    pub fn map<U, F>(self, f: F) -> WaitOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            WaitOutcome::Success { value, elapsed, polls } => WaitOutcome::Success {
                value: f(value),
                elapsed,
                polls,
            },
            WaitOutcome::Failure(e) => WaitOutcome::Failure(e),
        }
    }

    /// Convert into a `Result`, so a failed wait can be propagated with `?`.
    pub fn into_result(self) -> Result<T, WaitFailure> {
        match self {
            WaitOutcome::Success { value, .. } => Ok(value),
            WaitOutcome::Failure(f) => Err(f),
        }
    }
}
