// apps/marketplace/src/models/market.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, SqlxType, PartialEq, Eq)]
#[sqlx(type_name = "market_status_enum", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
  Draft,
  Active,
  Completed,
  Cancelled,
}

/// A pop-up market. `current_vendors` / `current_hangers` are a display cache;
/// admission decisions always count live rows.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Market {
  pub id: Uuid,
  pub name: String,
  pub status: MarketStatus,
  pub max_vendors: i32,
  pub max_hangers: i32,
  pub hanger_price_cents: i32,
  pub starts_at: DateTime<Utc>,
  pub ends_at: DateTime<Utc>,
  pub current_vendors: i32,
  pub current_hangers: i32,
}

impl Market {
  pub fn is_open(&self) -> bool {
    self.status == MarketStatus::Active
  }
}

/// Live occupancy of a market.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketUsage {
  pub vendors: i64,
  pub hangers: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAvailability {
  pub market_id: Uuid,
  pub status: MarketStatus,
  pub max_vendors: i32,
  pub max_hangers: i32,
  pub vendors: i64,
  pub hangers: i64,
  pub vendor_seats_left: i64,
  pub hangers_left: i64,
  pub hanger_price_cents: i32,
}

impl MarketAvailability {
  pub fn new(market: &Market, usage: MarketUsage) -> Self {
    Self {
      market_id: market.id,
      status: market.status,
      max_vendors: market.max_vendors,
      max_hangers: market.max_hangers,
      vendors: usage.vendors,
      hangers: usage.hangers,
      vendor_seats_left: (i64::from(market.max_vendors) - usage.vendors).max(0),
      hangers_left: (i64::from(market.max_hangers) - usage.hangers).max(0),
      hanger_price_cents: market.hanger_price_cents,
    }
  }
}
