//! Environment traits: injected dependencies for the engine.
//!
//! All external dependencies are abstracted behind traits so the engine can
//! be driven deterministically in tests. Mock implementations live in the
//! `hxp-testing` crate.

use chrono::{DateTime, Utc};

/// Clock trait, abstracting time operations for testability.
///
/// # Examples
///
/// ```
/// use hxp_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
