//! Wall-clock abstraction so expiry checks can be tested deterministically.

use std::fmt::Debug;
use std::sync::Arc;

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync + Debug {
    fn now_unix(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0
    }
}

/// Shared clock for use across async contexts.
pub type SharedClock = Arc<dyn Clock>;

/// The default shared system clock.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
