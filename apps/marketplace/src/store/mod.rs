// apps/marketplace/src/store/mod.rs

//! Persistence seams. Every method is a single atomic store operation; the
//! engines above build their protocols out of these.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{Cart, CartReservation, HangerRental, Item, Market, MarketEnrollment, Seller};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Outcome of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted<T> {
  Created(T),
  /// The constraint rejected the row.
  Duplicate,
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
  async fn find_item(&self, item_id: Uuid) -> Result<Option<Item>>;

  async fn find_cart(&self, buyer_id: Uuid) -> Result<Option<Cart>>;

  /// Returns the buyer's cart, creating it on first use.
  async fn find_or_create_cart(&self, buyer_id: Uuid, now: DateTime<Utc>) -> Result<Cart>;

  /// In one transaction: retires expired, not yet removed reservations for the
  /// same item (as of `now`), then inserts `reservation` unless a live one
  /// for the item remains.
  async fn insert_reservation(&self, reservation: &CartReservation, now: DateTime<Utc>) -> Result<Inserted<CartReservation>>;

  async fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<CartReservation>>;

  async fn list_reservations(&self, cart_id: Uuid) -> Result<Vec<CartReservation>>;

  /// Sets `expires_at = new_expires_at` and bumps the count, only while the
  /// row is live at `now` and below `max_count`. `None` if the predicate failed.
  async fn extend_reservation(
    &self,
    reservation_id: Uuid,
    now: DateTime<Utc>,
    new_expires_at: DateTime<Utc>,
    max_count: i32,
  ) -> Result<Option<CartReservation>>;

  /// Returns false if there was no such row.
  async fn delete_reservation(&self, reservation_id: Uuid) -> Result<bool>;

  /// Marks every live reservation with `expires_at <= now` as auto-removed.
  async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64>;

  /// Deletes auto-removed reservations that expired at or before `cutoff`.
  async fn purge_removed(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait MarketStore: Send + Sync {
  async fn find_seller(&self, seller_id: Uuid) -> Result<Option<Seller>>;

  async fn find_market(&self, market_id: Uuid) -> Result<Option<Market>>;

  async fn find_enrollment(&self, market_id: Uuid, seller_id: Uuid) -> Result<Option<MarketEnrollment>>;

  async fn count_enrollments(&self, market_id: Uuid) -> Result<i64>;

  /// Number of enrollments in the market with `seq <= seq`.
  async fn enrollment_rank(&self, market_id: Uuid, seq: i64) -> Result<i64>;

  /// `Duplicate` on the (market, seller) unique constraint. Inserts are
  /// serialized per market up to their commit, so once this returns, every
  /// enrollment with a lower `seq` is visible.
  async fn insert_enrollment(&self, market_id: Uuid, seller_id: Uuid, now: DateTime<Utc>) -> Result<Inserted<MarketEnrollment>>;

  async fn delete_enrollment(&self, enrollment_id: Uuid) -> Result<bool>;

  /// Sum of hanger counts over PENDING and CONFIRMED rentals.
  async fn live_hangers(&self, market_id: Uuid) -> Result<i64>;

  /// Sum of hanger counts over capacity-holding rentals with `seq <= seq`.
  async fn hangers_through(&self, market_id: Uuid, seq: i64) -> Result<i64>;

  async fn find_rental(&self, rental_id: Uuid) -> Result<Option<HangerRental>>;

  /// The seller's non-cancelled rental for the market, if any.
  async fn find_open_rental(&self, market_id: Uuid, seller_id: Uuid) -> Result<Option<HangerRental>>;

  /// Inserts a PENDING rental. `Duplicate` when the seller already holds an
  /// open one. Serialized per market like `insert_enrollment`.
  async fn insert_rental(
    &self,
    market_id: Uuid,
    seller_id: Uuid,
    hanger_count: i32,
    now: DateTime<Utc>,
  ) -> Result<Inserted<HangerRental>>;

  async fn delete_rental(&self, rental_id: Uuid) -> Result<bool>;

  /// Sets the count to `new_count` only if the rental belongs to `seller_id`,
  /// is not cancelled and still holds `expected_count`.
  async fn update_rental_count(
    &self,
    rental_id: Uuid,
    seller_id: Uuid,
    expected_count: i32,
    new_count: i32,
    now: DateTime<Utc>,
  ) -> Result<Option<HangerRental>>;

  /// Moves a non-cancelled rental owned by `seller_id` to CANCELLED.
  async fn cancel_rental(&self, rental_id: Uuid, seller_id: Uuid, now: DateTime<Utc>) -> Result<Option<HangerRental>>;

  /// PENDING -> CONFIRMED.
  async fn confirm_rental(&self, rental_id: Uuid, now: DateTime<Utc>) -> Result<Option<HangerRental>>;

  /// Cancels every PENDING rental created strictly before `created_before`.
  async fn cancel_overdue_rentals(&self, created_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64>;

  /// Rewrites the market's advisory counters from live rows.
  async fn refresh_counters(&self, market_id: Uuid) -> Result<()>;
}
