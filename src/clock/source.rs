use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Time source used by the polling loop.
///
/// The engine only reads time and sleeps through this trait. As long as you
/// have some struct that implements `Clock`, you can hand it to a waiter:
///
/// ```ignore
/// let waiter = Waiter::new(policy).with_clock(Arc::new(MyClock::new()));
/// ```
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}
