// apps/marketplace/src/models/rental.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use std::ops::RangeInclusive;
use uuid::Uuid;

pub const HANGER_COUNT_RANGE: RangeInclusive<i32> = 1..=100;
/// PENDING rentals older than this are cancelled by the overdue sweep.
pub const RENTAL_PAYMENT_GRACE: chrono::Duration = chrono::Duration::hours(24);

#[derive(Debug, Clone, Copy, Serialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "rental_status_enum", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
  Pending,
  Confirmed,
  Cancelled,
}

impl RentalStatus {
  /// PENDING and CONFIRMED rentals hold hanger capacity.
  pub fn holds_capacity(self) -> bool {
    !matches!(self, RentalStatus::Cancelled)
  }
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HangerRental {
  pub id: Uuid,
  #[serde(skip)]
  pub seq: i64,
  pub market_id: Uuid,
  pub seller_id: Uuid,
  pub hanger_count: i32,
  pub status: RentalStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub confirmed_at: Option<DateTime<Utc>>,
  pub cancelled_at: Option<DateTime<Utc>>,
}
