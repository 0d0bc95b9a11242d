// apps/marketplace/src/models/seller.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
  pub id: Uuid,
  pub display_name: String,
  pub is_active: bool,
}
