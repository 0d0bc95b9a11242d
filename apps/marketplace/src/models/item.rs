// apps/marketplace/src/models/item.rs

use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "item_status_enum", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
  Draft,
  Available,
  Sold,
  Archived,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub title: String,
  pub price_cents: i32,
  pub status: ItemStatus,
}
