// apps/marketplace/src/models/enrollment.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A vendor seat. `seq` is the store-assigned admission order.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketEnrollment {
  pub id: Uuid,
  #[serde(skip)]
  pub seq: i64,
  pub market_id: Uuid,
  pub seller_id: Uuid,
  pub enrolled_at: DateTime<Utc>,
}
