// apps/marketplace/src/services/reservation_engine.rs

//! Time-boxed cart reservations. Every write here is one conditional store
//! operation, so none of them needs a compensating pipeline.

use crate::errors::{AppError, Result};
use crate::models::reservation::{MAX_RESERVATION_COUNT, PURGE_RETENTION, RESERVATION_WINDOW};
use crate::models::{status_of, CartReservation, ItemStatus, ReservationStatus, ReservationView, SweepReport};
use crate::services::idempotent_read;
use crate::state::AppState;
use crate::store::Inserted;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[instrument(name = "reservation_engine::add_to_cart", skip(state), err(Display))]
pub async fn add_to_cart(state: &AppState, buyer_id: Uuid, item_id: Uuid) -> Result<CartReservation> {
  let store = state.reservations.clone();

  let item = idempotent_read(state, || store.find_item(item_id))
    .await?
    .ok_or(AppError::ItemNotFound(item_id))?;
  if item.status != ItemStatus::Available {
    debug!(status = ?item.status, "Item is not for sale.");
    return Err(AppError::ItemNotAvailable);
  }

  let now = state.clock.now();
  let cart = store.find_or_create_cart(buyer_id, now).await?;
  let reservation = CartReservation::new(cart.id, item_id, now);

  match store.insert_reservation(&reservation, now).await? {
    Inserted::Created(reservation) => {
      info!(reservation_id = %reservation.id, cart_id = %cart.id, expires_at = %reservation.expires_at, "Item reserved.");
      Ok(reservation)
    }
    Inserted::Duplicate => {
      debug!("Item already holds a live reservation.");
      Err(AppError::AlreadyReserved)
    }
  }
}

/// Loads a reservation and checks it sits in `buyer_id`'s cart.
async fn owned_reservation(state: &AppState, buyer_id: Uuid, reservation_id: Uuid) -> Result<CartReservation> {
  let store = state.reservations.clone();
  let reservation = idempotent_read(state, || store.find_reservation(reservation_id))
    .await?
    .ok_or(AppError::ReservationNotFound(reservation_id))?;
  let cart = idempotent_read(state, || store.find_cart(buyer_id)).await?;
  if cart.map(|c| c.id) != Some(reservation.cart_id) {
    warn!(%reservation_id, %buyer_id, "Reservation belongs to another cart.");
    return Err(AppError::NotOwner);
  }
  Ok(reservation)
}

#[instrument(name = "reservation_engine::extend_reservation", skip(state), err(Display))]
pub async fn extend_reservation(state: &AppState, buyer_id: Uuid, reservation_id: Uuid) -> Result<CartReservation> {
  let reservation = owned_reservation(state, buyer_id, reservation_id).await?;
  let now = state.clock.now();

  // The extension budget is checked before the clock.
  if reservation.reservation_count >= MAX_RESERVATION_COUNT {
    return Err(AppError::MaxExtensionsReached);
  }
  if status_of(&reservation, now) == ReservationStatus::Expired {
    return Err(AppError::AlreadyExpired);
  }

  let extended = state
    .reservations
    .extend_reservation(reservation_id, now, now + RESERVATION_WINDOW, MAX_RESERVATION_COUNT)
    .await?;
  match extended {
    Some(reservation) => {
      info!(count = reservation.reservation_count, expires_at = %reservation.expires_at, "Reservation extended.");
      Ok(reservation)
    }
    // Lost a race with another extension, a removal or the sweep.
    None => {
      let current = state.reservations.find_reservation(reservation_id).await?;
      match current {
        None => Err(AppError::ReservationNotFound(reservation_id)),
        Some(r) if r.reservation_count >= MAX_RESERVATION_COUNT => Err(AppError::MaxExtensionsReached),
        Some(_) => Err(AppError::AlreadyExpired),
      }
    }
  }
}

#[instrument(name = "reservation_engine::remove_from_cart", skip(state), err(Display))]
pub async fn remove_from_cart(state: &AppState, buyer_id: Uuid, reservation_id: Uuid) -> Result<()> {
  owned_reservation(state, buyer_id, reservation_id).await?;
  if !state.reservations.delete_reservation(reservation_id).await? {
    return Err(AppError::ReservationNotFound(reservation_id));
  }
  info!("Reservation removed from cart.");
  Ok(())
}

/// Marks expired reservations as auto-removed and purges old removed rows.
/// Safe to run repeatedly and concurrently with cart operations.
#[instrument(name = "reservation_engine::sweep_expired", skip(state), err(Display))]
pub async fn sweep_expired(state: &AppState) -> Result<SweepReport> {
  let now = state.clock.now();
  let expired = state.reservations.mark_expired(now).await?;
  let purged = state.reservations.purge_removed(now - PURGE_RETENTION).await?;
  if expired > 0 || purged > 0 {
    info!(expired, purged, "Expired reservations swept.");
  }
  Ok(SweepReport { expired, purged })
}

#[instrument(name = "reservation_engine::view_cart", skip(state), err(Display))]
pub async fn view_cart(state: &AppState, buyer_id: Uuid) -> Result<Vec<ReservationView>> {
  let store = state.reservations.clone();
  let Some(cart) = idempotent_read(state, || store.find_cart(buyer_id)).await? else {
    return Ok(Vec::new());
  };
  let rows = idempotent_read(state, || store.list_reservations(cart.id)).await?;
  let now = state.clock.now();
  Ok(rows.into_iter().map(|r| ReservationView::at(r, now)).collect())
}
