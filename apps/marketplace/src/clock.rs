// apps/marketplace/src/clock.rs

//! Wall-clock source. Reservation timing is always computed against an
//! injected clock so tests can move time without sleeping.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
  /// Current time, truncated to millisecond precision.
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
  }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  time: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(time: DateTime<Utc>) -> Self {
    Self {
      time: Mutex::new(time.trunc_subsecs(3)),
    }
  }

  pub fn advance(&self, by: Duration) {
    *self.time.lock() += by;
  }

  pub fn set(&self, time: DateTime<Utc>) {
    *self.time.lock() = time.trunc_subsecs(3);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.time.lock()
  }
}
