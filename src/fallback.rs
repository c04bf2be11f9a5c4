use std::time::Duration;

use log::{debug, warn};

use crate::condition::{BoxedCondition, Condition, Observation};
use crate::error::{ConfigError, ConfigResult};
use crate::wait::outcome::{FailureKind, StrategyFailure, WaitFailure, WaitOutcome};
use crate::wait::policy::PollPolicy;
use crate::wait::waiter::Waiter;

type MakeCondition<'a, T> = Box<dyn FnOnce() -> BoxedCondition<'a, T> + 'a>;

struct Strategy<'a, T> {
    label: String,
    weight: u32,
    make: MakeCondition<'a, T>,
}

/// Ordered list of alternative ways to reach the same state.
///
/// Strategies are tried one at a time, in the order they were added. Each one
/// gets its own share of the waiter's timeout (equal by default, or
/// proportional to its weight) and the first success wins.
///
/// # Example:
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use waitkit::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let chain = StrategyChain::new()
///     .then("css", || || Observation::<&str>::NotYet)
///     .then("xpath", || || Observation::Satisfied("found"));
///
/// let waiter = Waiter::new(PollPolicy::new(Duration::from_secs(2), Duration::from_millis(100)))
///     .with_clock(Arc::new(ManualClock::new()));
/// let chosen = waiter.run_chain(chain)?.into_result()?;
/// assert_eq!(chosen.label, "xpath");
/// assert_eq!(chosen.failures.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct StrategyChain<'a, T> {
    strategies: Vec<Strategy<'a, T>>,
}

impl<'a, T> std::fmt::Debug for StrategyChain<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| (&s.label, s.weight)))
            .finish()
    }
}

impl<'a, T: 'a> Default for StrategyChain<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: 'a> StrategyChain<'a, T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Add a strategy with weight 1. `make` builds the condition when the strategy's turn comes.
    pub fn then<S, F, C>(self, label: S, make: F) -> Self
    where
        S: Into<String>,
        F: FnOnce() -> C + 'a,
        C: Condition<Output = T> + 'a,
    {
        self.then_weighted(label, 1, make)
    }

    /// Add a strategy that receives `weight` shares of the timeout budget.
    pub fn then_weighted<S, F, C>(mut self, label: S, weight: u32, make: F) -> Self
    where
        S: Into<String>,
        F: FnOnce() -> C + 'a,
        C: Condition<Output = T> + 'a,
    {
        self.strategies.push(Strategy {
            label: label.into(),
            weight,
            make: Box::new(move || Box::new(make()) as BoxedCondition<'a, T>),
        });
        self
    }

    /// Add a strategy whose result must also pass `verify`.
    ///
    /// A value that fails verification counts as "not yet", so the strategy
    /// keeps polling within its own budget.
    pub fn then_verified<S, F, C, V>(self, label: S, make: F, mut verify: V) -> Self
    where
        S: Into<String>,
        F: FnOnce() -> C + 'a,
        C: Condition<Output = T> + 'a,
        V: FnMut(&T) -> bool + 'a,
    {
        let label = label.into();
        let name = label.clone();
        self.then(label, move || {
            let mut condition = make();
            move || match condition.poll() {
                Observation::Satisfied(v) if verify(&v) => Observation::Satisfied(v),
                Observation::Satisfied(_) => {
                    debug!("strategy '{}' acted but verification failed", name);
                    Observation::NotYet
                }
                other => other,
            }
        })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.label.as_str()).collect()
    }

    /// Split `policy`'s timeout into one sub-policy per strategy.
    fn budgets(&self, policy: &PollPolicy) -> ConfigResult<Vec<PollPolicy>> {
        policy.validate()?;
        if self.strategies.is_empty() {
            return Err(ConfigError::EmptyStrategyChain);
        }
        if let Some(s) = self.strategies.iter().find(|s| s.weight == 0) {
            return Err(ConfigError::ZeroWeight {
                label: s.label.clone(),
            });
        }

        let total_weight: u128 = self.strategies.iter().map(|s| u128::from(s.weight)).sum();
        let total_nanos = policy.timeout().as_nanos();
        self.strategies
            .iter()
            .map(|s| {
                let share = total_nanos * u128::from(s.weight) / total_weight;
                if share == 0 {
                    return Err(ConfigError::BudgetTooSmall {
                        label: s.label.clone(),
                    });
                }
                let share = Duration::from_nanos(share.min(u128::from(u64::MAX)) as u64);
                Ok(policy.clone().with_timeout(share))
            })
            .collect()
    }
}

/// The strategy that succeeded in a fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Chosen<T> {
    pub label: String,
    /// Zero-based position of the strategy in the chain.
    pub index: usize,
    pub value: T,
    /// Failures of the strategies tried before this one.
    pub failures: Vec<StrategyFailure>,
}

impl Waiter {
    /// Run a fallback chain: try each strategy in order with its share of this
    /// waiter's timeout and return the first success.
    ///
    /// The clock, cancellation token and ignored error kinds of this waiter
    /// apply to every strategy. Cancellation stops the chain immediately.
    pub fn run_chain<'a, T: 'a>(
        &self,
        chain: StrategyChain<'a, T>,
    ) -> ConfigResult<WaitOutcome<Chosen<T>>> {
        let budgets = chain.budgets(self.policy())?;

        let start = self.clock().now();
        let mut total_polls = 0;
        let mut failures: Vec<StrategyFailure> = Vec::new();

        for (index, (strategy, policy)) in chain.strategies.into_iter().zip(budgets).enumerate() {
            debug!(
                "trying strategy {} '{}' with {:?} budget",
                index,
                strategy.label,
                policy.timeout()
            );
            let waiter = self.clone().with_policy(policy).desc(strategy.label.clone());
            let mut condition = (strategy.make)();
            let outcome = waiter.run(move || condition.poll())?;
            total_polls += outcome.polls();
            let elapsed = self.clock().now().saturating_duration_since(start);

            match outcome {
                WaitOutcome::Success { value, .. } => {
                    debug!("strategy '{}' succeeded", strategy.label);
                    return Ok(WaitOutcome::Success {
                        value: Chosen {
                            label: strategy.label,
                            index,
                            value,
                            failures,
                        },
                        elapsed,
                        polls: total_polls,
                    });
                }
                WaitOutcome::Failure(failure) => {
                    let kind = failure.kind;
                    debug!("strategy '{}' failed: {}", strategy.label, failure);
                    failures.push(StrategyFailure {
                        label: strategy.label,
                        failure,
                    });
                    if kind == FailureKind::Cancelled {
                        return Ok(WaitOutcome::Failure(self.chain_failure(
                            FailureKind::Cancelled,
                            elapsed,
                            total_polls,
                            failures,
                        )));
                    }
                }
            }
        }

        let elapsed = self.clock().now().saturating_duration_since(start);
        warn!("all {} strategies failed after {:?}", failures.len(), elapsed);
        Ok(WaitOutcome::Failure(self.chain_failure(
            FailureKind::AllStrategiesExhausted,
            elapsed,
            total_polls,
            failures,
        )))
    }

    fn chain_failure(
        &self,
        kind: FailureKind,
        elapsed: Duration,
        polls: u32,
        failures: Vec<StrategyFailure>,
    ) -> WaitFailure {
        let last_error = failures.iter().rev().find_map(|s| s.failure.last_error.clone());
        let mut failure = WaitFailure::new(kind, elapsed, polls, last_error);
        failure.strategy_failures = failures;
        failure.description = self.description().map(String::from);
        failure
    }
}

/// Run `chain` under `policy` in real time.
pub fn fallback_chain<'a, T: 'a>(
    chain: StrategyChain<'a, T>,
    policy: PollPolicy,
) -> ConfigResult<WaitOutcome<Chosen<T>>> {
    Waiter::new(policy).run_chain(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::error::ObservedError;
    use std::cell::Cell;
    use std::sync::Arc;

    fn waiter(clock: &ManualClock, timeout_ms: u64) -> Waiter {
        Waiter::new(PollPolicy::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(100),
        ))
        .with_clock(Arc::new(clock.clone()))
    }

    #[test]
    fn empty_chain_is_a_config_error() {
        let clock = ManualClock::new();
        let chain: StrategyChain<'_, ()> = StrategyChain::new();
        assert_eq!(waiter(&clock, 1000).run_chain(chain), Err(ConfigError::EmptyStrategyChain));
    }

    #[test]
    fn zero_weight_is_a_config_error() {
        let clock = ManualClock::new();
        let chain = StrategyChain::new().then_weighted("never", 0, || || Observation::Satisfied(()));
        assert_eq!(
            waiter(&clock, 1000).run_chain(chain),
            Err(ConfigError::ZeroWeight {
                label: "never".to_string()
            })
        );
    }

    #[test]
    fn weighted_budgets() {
        let clock = ManualClock::new();
        let chain = StrategyChain::new()
            .then_weighted("a", 1, || || Observation::<()>::NotYet)
            .then_weighted("b", 3, || || Observation::<()>::NotYet);
        let failure = waiter(&clock, 2000).run_chain(chain).unwrap().into_result().unwrap_err();
        assert_eq!(failure.kind, FailureKind::AllStrategiesExhausted);
        let elapsed: Vec<Duration> =
            failure.strategy_failures.iter().map(|s| s.failure.elapsed).collect();
        assert_eq!(elapsed, vec![Duration::from_millis(500), Duration::from_millis(1500)]);
        assert_eq!(failure.elapsed, Duration::from_secs(2));
    }

    #[test]
    fn permanent_failure_moves_to_next_strategy() {
        let clock = ManualClock::new();
        let chain = StrategyChain::new()
            .then("native", || || Observation::<u8>::Failed(ObservedError::application("no <select>")))
            .then("click", || || Observation::Satisfied(2));
        let chosen = waiter(&clock, 1000).run_chain(chain).unwrap().into_result().unwrap();
        assert_eq!(chosen.index, 1);
        assert_eq!(chosen.value, 2);
        assert_eq!(chosen.failures[0].failure.kind, FailureKind::Permanent);
    }

    #[test]
    fn verification_failure_keeps_polling() {
        let clock = ManualClock::new();
        let attempts = Cell::new(0);
        let attempts = &attempts;
        let chain = StrategyChain::new().then_verified(
            "click",
            move || {
                move || {
                    attempts.set(attempts.get() + 1);
                    Observation::Satisfied(attempts.get())
                }
            },
            |n: &u32| *n >= 3,
        );
        let chosen = waiter(&clock, 1000).run_chain(chain).unwrap().into_result().unwrap();
        assert_eq!(chosen.value, 3);
    }

    #[test]
    fn cancellation_stops_the_chain() {
        let clock = ManualClock::new();
        let token = crate::cancel::CancelToken::new();
        let trigger = token.clone();
        let second_invoked = Cell::new(false);
        let chain = StrategyChain::new()
            .then("first", move || {
                move || {
                    trigger.cancel();
                    Observation::<()>::NotYet
                }
            })
            .then("second", || {
                second_invoked.set(true);
                || Observation::Satisfied(())
            });
        let outcome = waiter(&clock, 1000).cancel_on(token).run_chain(chain).unwrap();
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
        assert!(!second_invoked.get());
    }
}
