//! Turn `thirtyfour` results into observations.
//!
//! ```ignore
//! use waitkit::webdriver::observe_true;
//!
//! let elem = driver.find_element(By::Id("results"))?;
//! let outcome = Waiter::new(PollPolicy::default())
//!     .desc("results displayed")
//!     .run(|| observe_true(elem.is_displayed()))?;
//! ```

use thirtyfour::error::{WebDriverError, WebDriverResult};

use crate::condition::Observation;
use crate::error::{ErrorKind, ObservedError};

/// Map a WebDriver error onto the engine's error kinds.
pub fn error_kind(error: &WebDriverError) -> ErrorKind {
    match error {
        WebDriverError::NoSuchElement(_) => ErrorKind::NotFound,
        WebDriverError::StaleElementReference(_) => ErrorKind::Stale,
        WebDriverError::ElementNotInteractable(_) => ErrorKind::NotInteractable,
        WebDriverError::ElementClickIntercepted(_) => ErrorKind::ClickIntercepted,
        WebDriverError::JavascriptError(_) => ErrorKind::Script,
        _ => ErrorKind::Driver,
    }
}

impl From<WebDriverError> for ObservedError {
    fn from(error: WebDriverError) -> Self {
        ObservedError::new(error_kind(&error), error.to_string())
    }
}

/// `Ok(value)` is satisfied. Errors are classified with [`error_kind`].
pub fn observe<T>(result: WebDriverResult<T>) -> Observation<T> {
    Observation::from_result(result)
}

/// `Ok(true)` is satisfied, `Ok(false)` is not yet.
pub fn observe_true(result: WebDriverResult<bool>) -> Observation<()> {
    match result {
        Ok(ready) => Observation::from_bool(ready),
        Err(e) => Observation::Failed(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thirtyfour::error::no_such_element;

    #[test]
    fn missing_element_is_not_found() {
        let obs: Observation<()> = observe(Err(no_such_element("#menu")));
        match obs {
            Observation::Failed(e) => assert_eq!(e.kind, ErrorKind::NotFound),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn booleans() {
        assert_eq!(observe_true(Ok(true)), Observation::Satisfied(()));
        assert_eq!(observe_true(Ok(false)), Observation::NotYet);
        assert!(matches!(observe_true(Err(no_such_element("x"))), Observation::Failed(_)));
    }
}
