// SPDX-License-Identifier: MIT
use core::time::Duration;

use crate::sync::interface::{Mutex, ReadWriteEx};
use crate::sync::IRQSafeNullLock;
use crate::time::interface::TimeSource;

pub mod interface {
    use core::time::Duration;

    /// A free running counter provided by the platform.
    pub trait TimeSource {
        /// The timer resolution.
        fn resolution(&self) -> Duration;

        /// Time since the counter started.
        fn uptime(&self) -> Duration;

        /// Busy wait for at least `duration`.
        fn spin_for(&self, duration: Duration);
    }
}

/// Used until the platform registers a real counter. Time stands still and waits return at once.
struct NullTimeSource;

impl TimeSource for NullTimeSource {
    fn resolution(&self) -> Duration {
        Duration::ZERO
    }

    fn uptime(&self) -> Duration {
        Duration::ZERO
    }

    fn spin_for(&self, _duration: Duration) {}
}

static NULL_TIME_SOURCE: NullTimeSource = NullTimeSource;
static CUR_TIME_SOURCE: IRQSafeNullLock<&'static (dyn TimeSource + Sync)> =
    IRQSafeNullLock::new(&NULL_TIME_SOURCE);

pub fn register_time_source(source: &'static (dyn TimeSource + Sync)) {
    CUR_TIME_SOURCE.lock(|cur| *cur = source);
}

pub struct TimeManager;

static TIME_MANAGER: TimeManager = TimeManager::new();

pub fn time_manager() -> &'static TimeManager {
    &TIME_MANAGER
}

impl TimeManager {
    pub const fn new() -> Self {
        Self
    }

    fn source(&self) -> &'static (dyn TimeSource + Sync) {
        CUR_TIME_SOURCE.read(|cur| *cur)
    }

    /// The timer resolution.
    pub fn resolution(&self) -> Duration {
        self.source().resolution()
    }

    /// Time since the platform counter started.
    pub fn uptime(&self) -> Duration {
        self.source().uptime()
    }

    /// Spin for the given duration.
    pub fn spin_for(&self, duration: Duration) {
        self.source().spin_for(duration)
    }

    /// Poll `done` up to `attempts` times, waiting `interval` before each check.
    ///
    /// Returns whether `done` reported completion before the attempts ran out.
    pub fn poll(&self, attempts: u32, interval: Duration, mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..attempts {
            self.spin_for(interval);
            if done() {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_stops_at_first_success() {
        let mut calls = 0;
        let ok = time_manager().poll(100, Duration::from_micros(100), || {
            calls += 1;
            calls == 3
        });

        assert!(ok);
        assert_eq!(calls, 3);
    }

    #[test]
    fn poll_gives_up_after_attempts() {
        let mut calls = 0;
        let ok = time_manager().poll(5, Duration::from_micros(100), || {
            calls += 1;
            false
        });

        assert!(!ok);
        assert_eq!(calls, 5);
    }
}
