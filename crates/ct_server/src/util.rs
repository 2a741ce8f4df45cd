// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Utility functions.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time. The signer and the backend deadline both
/// read time through this capability so tests can freeze the clock.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The system clock.
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A time source pinned to a fixed instant, for tests.
pub struct FixedTimeSource {
    time: SystemTime,
}

impl FixedTimeSource {
    pub fn new(time: SystemTime) -> Self {
        Self { time }
    }

    pub fn from_unix_millis(millis: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> SystemTime {
        self.time
    }
}
