// apps/marketplace/src/models/cart.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
  pub id: Uuid,
  pub buyer_id: Uuid, // one cart per buyer
  pub created_at: DateTime<Utc>,
}
