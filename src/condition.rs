use crate::error::ObservedError;

/// Result of evaluating a condition once.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// The condition holds. Polling stops and the value is returned.
    Satisfied(T),
    /// The condition does not hold yet. Poll again after the interval.
    NotYet,
    /// The observed system reported an error. Whether this is retried or
    /// aborts the wait depends on the policy's ignored error kinds.
    Failed(ObservedError),
}

impl<T> Observation<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Observation::Satisfied(_))
    }

    pub fn map<U, F>(self, f: F) -> Observation<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Observation::Satisfied(v) => Observation::Satisfied(f(v)),
            Observation::NotYet => Observation::NotYet,
            Observation::Failed(e) => Observation::Failed(e),
        }
    }

    /// `Some(value)` is satisfied, `None` is not yet.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Observation::Satisfied(v),
            None => Observation::NotYet,
        }
    }

    /// `Ok(value)` is satisfied, `Err(e)` is a failure to be classified by the policy.
    pub fn from_result<E>(result: Result<T, E>) -> Self
    where
        E: Into<ObservedError>,
    {
        match result {
            Ok(v) => Observation::Satisfied(v),
            Err(e) => Observation::Failed(e.into()),
        }
    }
}

impl Observation<()> {
    pub fn from_bool(ready: bool) -> Self {
        if ready {
            Observation::Satisfied(())
        } else {
            Observation::NotYet
        }
    }
}

/// A predicate over the observed system, evaluated once per poll.
///
/// Any `FnMut() -> Observation<T>` closure is a condition. State carried
/// between polls (such as a previous snapshot) lives in the closure or struct.
pub trait Condition {
    type Output;

    fn poll(&mut self) -> Observation<Self::Output>;
}

impl<F, T> Condition for F
where
    F: FnMut() -> Observation<T>,
{
    type Output = T;

    fn poll(&mut self) -> Observation<T> {
        self()
    }
}

pub type BoxedCondition<'a, T> = Box<dyn Condition<Output = T> + 'a>;
