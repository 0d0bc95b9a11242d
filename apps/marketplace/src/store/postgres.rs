// apps/marketplace/src/store/postgres.rs

//! PostgreSQL store. Relies on the constraints in `schema.sql`:
//! the partial unique index on live reservations per item, the
//! (market, seller) unique enrollment key and the partial unique index on
//! open rentals per (market, seller).
//!
//! Enrollment and rental inserts hold the market row lock until they commit.
//! An identity `seq` is handed out at insert time but only becomes visible at
//! commit; with the lock held across both, per-market `seq` order is commit
//! order and a rank read after our own commit sees every lower `seq`.

use super::{Inserted, MarketStore, ReservationStore};
use crate::errors::{AppError, Result};
use crate::models::{Cart, CartReservation, HangerRental, Item, Market, MarketEnrollment, Seller};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await
      .map_err(|e| {
        error!(error = %e, "Failed to connect to the database.");
        AppError::Sqlx(e)
      })?;
    info!("Successfully connected to the database.");
    Ok(Self::new(pool))
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

/// Maps a unique-constraint rejection to `Inserted::Duplicate`.
fn created_or_duplicate<T>(result: std::result::Result<T, sqlx::Error>) -> Result<Inserted<T>> {
  match result {
    Ok(row) => Ok(Inserted::Created(row)),
    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(Inserted::Duplicate),
    Err(e) => Err(AppError::Sqlx(e)),
  }
}

/// Serializes capacity-claiming inserts for one market until `tx` ends.
async fn lock_market(tx: &mut Transaction<'_, Postgres>, market_id: Uuid) -> Result<()> {
  sqlx::query("SELECT 1 FROM markets WHERE id = $1 FOR UPDATE")
    .bind(market_id)
    .execute(&mut **tx)
    .await?;
  Ok(())
}

/// Commits a created row; a duplicate rolls back when `tx` drops.
async fn finish_insert<T>(tx: Transaction<'_, Postgres>, result: std::result::Result<T, sqlx::Error>) -> Result<Inserted<T>> {
  let inserted = created_or_duplicate(result)?;
  if let Inserted::Created(_) = inserted {
    tx.commit().await?;
  }
  Ok(inserted)
}

const RESERVATION_COLUMNS: &str =
  "id, cart_id, item_id, reserved_at, expires_at, reservation_count, last_extended_at, auto_removed";
const RENTAL_COLUMNS: &str =
  "id, seq, market_id, seller_id, hanger_count, status, created_at, updated_at, confirmed_at, cancelled_at";

#[async_trait]
impl ReservationStore for PgStore {
  async fn find_item(&self, item_id: Uuid) -> Result<Option<Item>> {
    let item = sqlx::query_as::<_, Item>("SELECT id, seller_id, title, price_cents, status FROM items WHERE id = $1")
      .bind(item_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(item)
  }

  async fn find_cart(&self, buyer_id: Uuid) -> Result<Option<Cart>> {
    let cart = sqlx::query_as::<_, Cart>("SELECT id, buyer_id, created_at FROM carts WHERE buyer_id = $1")
      .bind(buyer_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(cart)
  }

  async fn find_or_create_cart(&self, buyer_id: Uuid, now: DateTime<Utc>) -> Result<Cart> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let cart = sqlx::query_as::<_, Cart>(
      "INSERT INTO carts (id, buyer_id, created_at) VALUES ($1, $2, $3) \
       ON CONFLICT (buyer_id) DO UPDATE SET buyer_id = EXCLUDED.buyer_id \
       RETURNING id, buyer_id, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(buyer_id)
    .bind(now)
    .fetch_one(&self.pool)
    .await?;
    Ok(cart)
  }

  #[instrument(name = "PgStore::insert_reservation", skip(self, reservation), fields(item_id = %reservation.item_id), err(Display))]
  async fn insert_reservation(&self, reservation: &CartReservation, now: DateTime<Utc>) -> Result<Inserted<CartReservation>> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("UPDATE cart_reservations SET auto_removed = TRUE WHERE item_id = $1 AND NOT auto_removed AND expires_at <= $2")
      .bind(reservation.item_id)
      .bind(now)
      .execute(&mut *tx)
      .await?;

    let inserted = sqlx::query_as::<_, CartReservation>(&format!(
      "INSERT INTO cart_reservations ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
       ON CONFLICT (item_id) WHERE NOT auto_removed DO NOTHING \
       RETURNING {cols}",
      cols = RESERVATION_COLUMNS
    ))
    .bind(reservation.id)
    .bind(reservation.cart_id)
    .bind(reservation.item_id)
    .bind(reservation.reserved_at)
    .bind(reservation.expires_at)
    .bind(reservation.reservation_count)
    .bind(reservation.last_extended_at)
    .bind(reservation.auto_removed)
    .fetch_optional(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(match inserted {
      Some(row) => Inserted::Created(row),
      None => Inserted::Duplicate,
    })
  }

  async fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<CartReservation>> {
    let row = sqlx::query_as::<_, CartReservation>(&format!(
      "SELECT {} FROM cart_reservations WHERE id = $1",
      RESERVATION_COLUMNS
    ))
    .bind(reservation_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(row)
  }

  async fn list_reservations(&self, cart_id: Uuid) -> Result<Vec<CartReservation>> {
    let rows = sqlx::query_as::<_, CartReservation>(&format!(
      "SELECT {} FROM cart_reservations WHERE cart_id = $1 ORDER BY reserved_at ASC",
      RESERVATION_COLUMNS
    ))
    .bind(cart_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(rows)
  }

  async fn extend_reservation(
    &self,
    reservation_id: Uuid,
    now: DateTime<Utc>,
    new_expires_at: DateTime<Utc>,
    max_count: i32,
  ) -> Result<Option<CartReservation>> {
    let row = sqlx::query_as::<_, CartReservation>(&format!(
      "UPDATE cart_reservations \
       SET expires_at = $3, reservation_count = reservation_count + 1, last_extended_at = $2 \
       WHERE id = $1 AND NOT auto_removed AND expires_at > $2 AND reservation_count < $4 \
       RETURNING {}",
      RESERVATION_COLUMNS
    ))
    .bind(reservation_id)
    .bind(now)
    .bind(new_expires_at)
    .bind(max_count)
    .fetch_optional(&self.pool)
    .await?;
    Ok(row)
  }

  async fn delete_reservation(&self, reservation_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cart_reservations WHERE id = $1")
      .bind(reservation_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("UPDATE cart_reservations SET auto_removed = TRUE WHERE NOT auto_removed AND expires_at <= $1")
      .bind(now)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }

  async fn purge_removed(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM cart_reservations WHERE auto_removed AND expires_at <= $1")
      .bind(cutoff)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }
}

#[async_trait]
impl MarketStore for PgStore {
  async fn find_seller(&self, seller_id: Uuid) -> Result<Option<Seller>> {
    let seller = sqlx::query_as::<_, Seller>("SELECT id, display_name, is_active FROM sellers WHERE id = $1")
      .bind(seller_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(seller)
  }

  async fn find_market(&self, market_id: Uuid) -> Result<Option<Market>> {
    let market = sqlx::query_as::<_, Market>(
      "SELECT id, name, status, max_vendors, max_hangers, hanger_price_cents, starts_at, ends_at, \
       current_vendors, current_hangers FROM markets WHERE id = $1",
    )
    .bind(market_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(market)
  }

  async fn find_enrollment(&self, market_id: Uuid, seller_id: Uuid) -> Result<Option<MarketEnrollment>> {
    let enrollment = sqlx::query_as::<_, MarketEnrollment>(
      "SELECT id, seq, market_id, seller_id, enrolled_at FROM market_enrollments WHERE market_id = $1 AND seller_id = $2",
    )
    .bind(market_id)
    .bind(seller_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(enrollment)
  }

  async fn count_enrollments(&self, market_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM market_enrollments WHERE market_id = $1")
      .bind(market_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(count)
  }

  async fn enrollment_rank(&self, market_id: Uuid, seq: i64) -> Result<i64> {
    let rank = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM market_enrollments WHERE market_id = $1 AND seq <= $2")
      .bind(market_id)
      .bind(seq)
      .fetch_one(&self.pool)
      .await?;
    Ok(rank)
  }

  async fn insert_enrollment(&self, market_id: Uuid, seller_id: Uuid, now: DateTime<Utc>) -> Result<Inserted<MarketEnrollment>> {
    let mut tx = self.pool.begin().await?;
    lock_market(&mut tx, market_id).await?;
    let result = sqlx::query_as::<_, MarketEnrollment>(
      "INSERT INTO market_enrollments (id, market_id, seller_id, enrolled_at) VALUES ($1, $2, $3, $4) \
       RETURNING id, seq, market_id, seller_id, enrolled_at",
    )
    .bind(Uuid::new_v4())
    .bind(market_id)
    .bind(seller_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await;
    finish_insert(tx, result).await
  }

  async fn delete_enrollment(&self, enrollment_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM market_enrollments WHERE id = $1")
      .bind(enrollment_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn live_hangers(&self, market_id: Uuid) -> Result<i64> {
    let total = sqlx::query_scalar::<_, i64>(
      "SELECT COALESCE(SUM(hanger_count), 0)::BIGINT FROM hanger_rentals \
       WHERE market_id = $1 AND status <> 'CANCELLED'",
    )
    .bind(market_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(total)
  }

  async fn hangers_through(&self, market_id: Uuid, seq: i64) -> Result<i64> {
    let total = sqlx::query_scalar::<_, i64>(
      "SELECT COALESCE(SUM(hanger_count), 0)::BIGINT FROM hanger_rentals \
       WHERE market_id = $1 AND status <> 'CANCELLED' AND seq <= $2",
    )
    .bind(market_id)
    .bind(seq)
    .fetch_one(&self.pool)
    .await?;
    Ok(total)
  }

  async fn find_rental(&self, rental_id: Uuid) -> Result<Option<HangerRental>> {
    let rental = sqlx::query_as::<_, HangerRental>(&format!("SELECT {} FROM hanger_rentals WHERE id = $1", RENTAL_COLUMNS))
      .bind(rental_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(rental)
  }

  async fn find_open_rental(&self, market_id: Uuid, seller_id: Uuid) -> Result<Option<HangerRental>> {
    let rental = sqlx::query_as::<_, HangerRental>(&format!(
      "SELECT {} FROM hanger_rentals WHERE market_id = $1 AND seller_id = $2 AND status <> 'CANCELLED'",
      RENTAL_COLUMNS
    ))
    .bind(market_id)
    .bind(seller_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(rental)
  }

  async fn insert_rental(
    &self,
    market_id: Uuid,
    seller_id: Uuid,
    hanger_count: i32,
    now: DateTime<Utc>,
  ) -> Result<Inserted<HangerRental>> {
    let mut tx = self.pool.begin().await?;
    lock_market(&mut tx, market_id).await?;
    let result = sqlx::query_as::<_, HangerRental>(&format!(
      "INSERT INTO hanger_rentals (id, market_id, seller_id, hanger_count, status, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, 'PENDING', $5, $5) RETURNING {}",
      RENTAL_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(market_id)
    .bind(seller_id)
    .bind(hanger_count)
    .bind(now)
    .fetch_one(&mut *tx)
    .await;
    finish_insert(tx, result).await
  }

  async fn delete_rental(&self, rental_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM hanger_rentals WHERE id = $1")
      .bind(rental_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn update_rental_count(
    &self,
    rental_id: Uuid,
    seller_id: Uuid,
    expected_count: i32,
    new_count: i32,
    now: DateTime<Utc>,
  ) -> Result<Option<HangerRental>> {
    let rental = sqlx::query_as::<_, HangerRental>(&format!(
      "UPDATE hanger_rentals SET hanger_count = $4, updated_at = $5 \
       WHERE id = $1 AND seller_id = $2 AND status <> 'CANCELLED' AND hanger_count = $3 \
       RETURNING {}",
      RENTAL_COLUMNS
    ))
    .bind(rental_id)
    .bind(seller_id)
    .bind(expected_count)
    .bind(new_count)
    .bind(now)
    .fetch_optional(&self.pool)
    .await?;
    Ok(rental)
  }

  async fn cancel_rental(&self, rental_id: Uuid, seller_id: Uuid, now: DateTime<Utc>) -> Result<Option<HangerRental>> {
    let rental = sqlx::query_as::<_, HangerRental>(&format!(
      "UPDATE hanger_rentals SET status = 'CANCELLED', cancelled_at = $3, updated_at = $3 \
       WHERE id = $1 AND seller_id = $2 AND status <> 'CANCELLED' \
       RETURNING {}",
      RENTAL_COLUMNS
    ))
    .bind(rental_id)
    .bind(seller_id)
    .bind(now)
    .fetch_optional(&self.pool)
    .await?;
    Ok(rental)
  }

  async fn confirm_rental(&self, rental_id: Uuid, now: DateTime<Utc>) -> Result<Option<HangerRental>> {
    let rental = sqlx::query_as::<_, HangerRental>(&format!(
      "UPDATE hanger_rentals SET status = 'CONFIRMED', confirmed_at = $2, updated_at = $2 \
       WHERE id = $1 AND status = 'PENDING' \
       RETURNING {}",
      RENTAL_COLUMNS
    ))
    .bind(rental_id)
    .bind(now)
    .fetch_optional(&self.pool)
    .await?;
    Ok(rental)
  }

  async fn cancel_overdue_rentals(&self, created_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
      "UPDATE hanger_rentals SET status = 'CANCELLED', cancelled_at = $2, updated_at = $2 \
       WHERE status = 'PENDING' AND created_at < $1",
    )
    .bind(created_before)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected())
  }

  async fn refresh_counters(&self, market_id: Uuid) -> Result<()> {
    sqlx::query(
      "UPDATE markets SET \
       current_vendors = (SELECT COUNT(*) FROM market_enrollments WHERE market_id = $1), \
       current_hangers = (SELECT COALESCE(SUM(hanger_count), 0) FROM hanger_rentals \
                          WHERE market_id = $1 AND status <> 'CANCELLED') \
       WHERE id = $1",
    )
    .bind(market_id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}
