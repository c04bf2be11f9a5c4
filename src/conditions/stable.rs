use crate::condition::{Condition, Observation};

/// Satisfied once a snapshot returns the same value on `required` consecutive polls.
///
/// Use this to wait for a DOM subtree, a list of rows or a rendered value to
/// settle. A changed value restarts the count at one. A snapshot that is not
/// available yet (`NotYet`) or that fails clears the count. Errors are then
/// passed through to the policy unchanged.
#[derive(Debug)]
pub struct Stable<F, T> {
    snapshot: F,
    required: u32,
    previous: Option<T>,
    matches: u32,
}

impl<F, T> Stable<F, T>
where
    F: FnMut() -> Observation<T>,
    T: PartialEq + Clone,
{
    pub fn new(snapshot: F, required: u32) -> Self {
        Self {
            snapshot,
            required: required.max(1),
            previous: None,
            matches: 0,
        }
    }

    /// Number of consecutive identical samples seen so far.
    pub fn stable_samples(&self) -> u32 {
        self.matches
    }
}

impl<F, T> Condition for Stable<F, T>
where
    F: FnMut() -> Observation<T>,
    T: PartialEq + Clone,
{
    type Output = T;

    fn poll(&mut self) -> Observation<T> {
        let value = match (self.snapshot)() {
            Observation::Satisfied(v) => v,
            Observation::NotYet => {
                self.previous = None;
                self.matches = 0;
                return Observation::NotYet;
            }
            Observation::Failed(e) => {
                self.previous = None;
                self.matches = 0;
                return Observation::Failed(e);
            }
        };

        if self.previous.as_ref() == Some(&value) {
            self.matches += 1;
        } else {
            self.previous = Some(value.clone());
            self.matches = 1;
        }

        if self.matches >= self.required {
            Observation::Satisfied(value)
        } else {
            Observation::NotYet
        }
    }
}

/// Shorthand for [`Stable::new`].
pub fn stable<F, T>(snapshot: F, required: u32) -> Stable<F, T>
where
    F: FnMut() -> Observation<T>,
    T: PartialEq + Clone,
{
    Stable::new(snapshot, required)
}
