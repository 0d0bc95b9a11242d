// apps/marketplace/src/models/reservation.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Length of a reservation window, also the length of each extension.
pub const RESERVATION_WINDOW: Duration = Duration::minutes(15);
/// Remaining time at or below which a reservation counts as EXPIRING.
pub const EXPIRING_THRESHOLD: Duration = Duration::minutes(5);
/// Initial reservation plus two extensions.
pub const MAX_RESERVATION_COUNT: i32 = 3;
/// How long auto-removed rows are kept (past their expiry) before the sweep purges them.
pub const PURGE_RETENTION: Duration = Duration::hours(24);

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartReservation {
  pub id: Uuid,
  pub cart_id: Uuid,
  pub item_id: Uuid,
  pub reserved_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  pub reservation_count: i32,
  pub last_extended_at: Option<DateTime<Utc>>,
  pub auto_removed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
  Active,
  Expiring,
  Expired,
}

/// Derived status of `reservation` at `now`. Never stored.
pub fn status_of(reservation: &CartReservation, now: DateTime<Utc>) -> ReservationStatus {
  let remaining = reservation.expires_at - now;
  if reservation.auto_removed || remaining <= Duration::zero() {
    ReservationStatus::Expired
  } else if remaining <= EXPIRING_THRESHOLD {
    ReservationStatus::Expiring
  } else {
    ReservationStatus::Active
  }
}

impl CartReservation {
  pub fn new(cart_id: Uuid, item_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      cart_id,
      item_id,
      reserved_at: now,
      expires_at: now + RESERVATION_WINDOW,
      reservation_count: 1,
      last_extended_at: None,
      auto_removed: false,
    }
  }

  pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
    (self.expires_at - now).num_milliseconds().max(0)
  }

  pub fn extensions_left(&self) -> i32 {
    (MAX_RESERVATION_COUNT - self.reservation_count).max(0)
  }
}

/// A reservation as the cart page sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
  #[serde(flatten)]
  pub reservation: CartReservation,
  pub status: ReservationStatus,
  pub remaining_ms: i64,
  pub extensions_left: i32,
  pub can_extend: bool,
}

impl ReservationView {
  pub fn at(reservation: CartReservation, now: DateTime<Utc>) -> Self {
    let status = status_of(&reservation, now);
    Self {
      remaining_ms: reservation.remaining_ms(now),
      extensions_left: reservation.extensions_left(),
      can_extend: status != ReservationStatus::Expired && reservation.extensions_left() > 0,
      status,
      reservation,
    }
  }
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
  pub expired: u64,
  pub purged: u64,
}
