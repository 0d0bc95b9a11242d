// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use marketplace::clock::ManualClock;
use marketplace::config::AppConfig;
use marketplace::models::{Item, ItemStatus, Market, MarketStatus, Seller};
use marketplace::state::AppState;
use marketplace::store::MemoryStore;
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

/// Application state over a fresh in-memory store and a stopped clock.
pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub clock: Arc<ManualClock>,
}

impl TestApp {
  pub fn new() -> Self {
    Self::with_config(test_config())
  }

  pub fn with_config(config: AppConfig) -> Self {
    setup_tracing();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()));
    let state = AppState::in_memory(store.clone(), clock.clone(), config);
    Self { state, store, clock }
  }

  pub fn seed_item(&self) -> Uuid {
    self.seed_item_with_status(ItemStatus::Available)
  }

  pub fn seed_item_with_status(&self, status: ItemStatus) -> Uuid {
    let item = Item {
      id: Uuid::new_v4(),
      seller_id: Uuid::new_v4(),
      title: "Wool coat".to_string(),
      price_cents: 4500,
      status,
    };
    let id = item.id;
    self.store.seed_item(item);
    id
  }

  pub fn seed_seller(&self) -> Uuid {
    self.seed_seller_with(true)
  }

  pub fn seed_seller_with(&self, is_active: bool) -> Uuid {
    let seller = Seller {
      id: Uuid::new_v4(),
      display_name: "Second Round".to_string(),
      is_active,
    };
    let id = seller.id;
    self.store.seed_seller(seller);
    id
  }

  pub fn seed_market(&self, max_vendors: i32, max_hangers: i32) -> Uuid {
    self.seed_market_with(max_vendors, max_hangers, MarketStatus::Active)
  }

  pub fn seed_market_with(&self, max_vendors: i32, max_hangers: i32, status: MarketStatus) -> Uuid {
    let now = Utc::now();
    let market = Market {
      id: Uuid::new_v4(),
      name: "Sunday Flea".to_string(),
      status,
      max_vendors,
      max_hangers,
      hanger_price_cents: 300,
      starts_at: now + Duration::days(7),
      ends_at: now + Duration::days(7) + Duration::hours(6),
      current_vendors: 0,
      current_hangers: 0,
    };
    let id = market.id;
    self.store.seed_market(market);
    id
  }
}

/// Fast retries so fault-injection tests stay quick.
pub fn test_config() -> AppConfig {
  AppConfig {
    read_retry_max: 2,
    read_retry_delay_ms: 1,
    compensation_max_delay_ms: 2,
    ..AppConfig::default()
  }
}

// --- Tracing Setup ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
