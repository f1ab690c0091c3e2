//! Fixed-rate tick scheduling
//!
//! The deadline advances by exactly one period per tick, so sleep jitter does
//! not accumulate. A tick that overruns is followed immediately by the next
//! one; missed ticks are never replayed.

use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_TICKS_PER_SECOND: u32 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Tick rate must be at least one tick per second")]
    ZeroRate,
}

/// What to do between two ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickWait {
    Sleep(Duration),
    /// Deadline already passed: yield once and carry on
    Yield,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    period: Duration,
    next_deadline: Instant,
}

impl TickScheduler {
    pub fn new(ticks_per_second: u32, start: Instant) -> Result<Self, ScheduleError> {
        if ticks_per_second == 0 {
            return Err(ScheduleError::ZeroRate);
        }
        Ok(Self {
            period: Duration::from_nanos(1_000_000_000 / ticks_per_second as u64),
            next_deadline: start,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Called after a tick finished at `now`
    pub fn advance(&mut self, now: Instant) -> TickWait {
        self.next_deadline += self.period;
        if self.next_deadline > now {
            TickWait::Sleep(self.next_deadline - now)
        } else {
            TickWait::Yield
        }
    }
}
