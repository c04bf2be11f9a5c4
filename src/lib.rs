//! Waitkit is a condition-polling wait engine for browser automation tests.
//!
//! It implements the explicit waits that WebDriver tests are built on,
//! without being tied to any particular WebDriver client. The browser is only
//! ever reached through the conditions you supply.
//!
//! ## Features
//!
//! - Explicit waits with timeout, poll interval and optional backoff
//! - Transient errors (element not found yet, stale element) are retried,
//!   everything else aborts the wait immediately
//! - Cooperative cancellation
//! - Stability waits (a value stops changing) and idle waits (no network activity)
//! - Fallback chains: try several strategies in order, each with its own budget
//! - Network-aware timeouts with a caller-owned reliability factor
//! - Hybrid dropdown selection for native and custom dropdowns
//! - Mapping of `thirtyfour` errors (feature `webdriver`)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use waitkit::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let clock = ManualClock::new();
//!     let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_millis(500));
//!
//!     // The row count changes while the table is rendering.
//!     let mut counts = vec![3, 7, 12, 12, 12].into_iter();
//!     let rows = conditions::stable(move || Observation::from_option(counts.next()), 3);
//!
//!     let outcome = Waiter::new(policy)
//!         .with_clock(Arc::new(clock))
//!         .desc("results table to settle")
//!         .run(rows)?;
//!
//!     assert_eq!(outcome.polls(), 5);
//!     assert_eq!(outcome.into_result()?, 12);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::needless_doctest_main)]

pub use cancel::CancelToken;
pub use condition::{BoxedCondition, Condition, Observation};
pub use error::{ConfigError, ConfigResult, ErrorKind, ObservedError};
pub use fallback::{fallback_chain, Chosen, StrategyChain};
pub use wait::outcome::{FailureKind, StrategyFailure, WaitFailure, WaitOutcome};
pub use wait::policy::{PollPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
pub use wait::waiter::{wait_until, Waiter};

pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::conditions;
    pub use crate::condition::{Condition, Observation};
    pub use crate::error::{ConfigError, ErrorKind, ObservedError};
    pub use crate::fallback::{Chosen, StrategyChain};
    pub use crate::network::{AdaptiveTimeout, NetworkClass, NetworkProfile, Reliability};
    pub use crate::wait::outcome::{FailureKind, WaitFailure, WaitOutcome};
    pub use crate::wait::policy::PollPolicy;
    pub use crate::wait::waiter::Waiter;
}

pub mod clock {
    pub mod manual;
    mod source;
    pub mod system;

    pub use self::manual::ManualClock;
    pub use self::source::Clock;
    pub use self::system::SystemClock;
}

pub mod components {
    pub mod dropdown;
}

pub mod conditions {
    mod idle;
    mod stable;
    mod text;

    pub use self::idle::{idle, Activity, Idle};
    pub use self::stable::{stable, Stable};
    pub use self::text::{text_lacks, text_matches};
}

mod cancel;
mod condition;
mod duration_ms;
mod error;
mod fallback;
pub mod network;
mod wait {
    pub mod outcome;
    pub mod policy;
    pub mod poller;
    pub mod waiter;
}
#[cfg(feature = "webdriver")]
pub mod webdriver;
