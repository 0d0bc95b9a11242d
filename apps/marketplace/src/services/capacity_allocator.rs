// apps/marketplace/src/services/capacity_allocator.rs

//! Market seats and hanger rentals.
//!
//! Capacity-claiming writes run through the admission pipelines registered
//! on `AppState::flows`: check, write, re-check, and compensate when the
//! re-check finds the write overshot. Pipelines run on a detached task, so a
//! caller that goes away mid-run (an HTTP client disconnecting) cannot leave
//! an overshooting row behind without its compensation.

use crate::errors::{AppError, Result};
use crate::models::rental::{HANGER_COUNT_RANGE, RENTAL_PAYMENT_GRACE};
use crate::models::{HangerRental, MarketAvailability, MarketEnrollment, MarketUsage, RentalStatus};
use crate::pipelines::contexts::{RegistrationCtxData, RentalCtxData, RentalResizeCtxData};
use crate::services::idempotent_read;
use crate::state::AppState;
use rackflow::{ContextData, PipelineResult};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Runs the pipeline registered for `T` to completion on its own task and
/// hands back the final context. A stopped run is a finished run: whatever
/// it wrote is kept, and the caller reads the outcome from the context.
async fn run_detached<T>(state: &AppState, ctx: T) -> Result<T>
where
  T: Send + Sync + 'static,
{
  let flows = state.flows.clone();
  let ctx_data = ContextData::new(ctx);
  let run_ctx = ctx_data.clone();

  let outcome = tokio::spawn(async move { flows.run(run_ctx).await })
    .await
    .map_err(|e| {
      error!(error = %e, "Admission task did not complete.");
      AppError::Internal(format!("admission task failed: {}", e))
    })??;

  if outcome == PipelineResult::Stopped {
    debug!(context_type = %std::any::type_name::<T>(), "Admission pipeline stopped early.");
  }
  ctx_data
    .try_into_inner()
    .map_err(|_| AppError::Internal("admission context still shared after run".to_string()))
}

fn validate_hanger_count(count: i32) -> Result<()> {
  if !HANGER_COUNT_RANGE.contains(&count) {
    return Err(AppError::OutOfRange {
      min: *HANGER_COUNT_RANGE.start(),
      max: *HANGER_COUNT_RANGE.end(),
      got: count,
    });
  }
  Ok(())
}

#[instrument(name = "capacity_allocator::register_for_market", skip(state), err(Display))]
pub async fn register_for_market(state: &AppState, market_id: Uuid, seller_id: Uuid) -> Result<MarketEnrollment> {
  let ctx = run_detached(state, RegistrationCtxData::new(state.clone(), market_id, seller_id)).await?;
  let enrollment = ctx
    .enrollment
    .ok_or_else(|| AppError::Internal("registration finished without an enrollment".to_string()))?;
  info!(enrollment_id = %enrollment.id, "Seller registered for market.");
  Ok(enrollment)
}

#[instrument(name = "capacity_allocator::create_hanger_rental", skip(state), err(Display))]
pub async fn create_hanger_rental(
  state: &AppState,
  market_id: Uuid,
  seller_id: Uuid,
  hanger_count: i32,
) -> Result<HangerRental> {
  validate_hanger_count(hanger_count)?;
  let ctx = run_detached(state, RentalCtxData::new(state.clone(), market_id, seller_id, hanger_count)).await?;
  let rental = ctx
    .rental
    .ok_or_else(|| AppError::Internal("rental pipeline finished without a rental".to_string()))?;
  info!(rental_id = %rental.id, hanger_count, "Hanger rental created.");
  Ok(rental)
}

/// Loads a rental and checks it belongs to `seller_id`.
async fn owned_rental(state: &AppState, seller_id: Uuid, rental_id: Uuid) -> Result<HangerRental> {
  let markets = state.markets.clone();
  let rental = idempotent_read(state, || markets.find_rental(rental_id))
    .await?
    .ok_or(AppError::RentalNotFound(rental_id))?;
  if rental.seller_id != seller_id {
    warn!(%rental_id, %seller_id, "Rental belongs to another seller.");
    return Err(AppError::NotOwner);
  }
  Ok(rental)
}

#[instrument(name = "capacity_allocator::resize_hanger_rental", skip(state), err(Display))]
pub async fn resize_hanger_rental(
  state: &AppState,
  seller_id: Uuid,
  rental_id: Uuid,
  hanger_count: i32,
) -> Result<HangerRental> {
  validate_hanger_count(hanger_count)?;
  let rental = owned_rental(state, seller_id, rental_id).await?;
  if rental.status == RentalStatus::Cancelled {
    return Err(AppError::RentalCancelled);
  }
  if rental.hanger_count == hanger_count {
    return Ok(rental);
  }

  if hanger_count < rental.hanger_count {
    let updated = state
      .markets
      .update_rental_count(rental.id, seller_id, rental.hanger_count, hanger_count, state.clock.now())
      .await?
      .ok_or(AppError::QuantityConflict)?;
    if let Err(e) = state.markets.refresh_counters(updated.market_id).await {
      warn!(market_id = %updated.market_id, error = %e, "Failed to refresh market counters.");
    }
    info!(from = rental.hanger_count, to = hanger_count, "Hanger rental reduced.");
    return Ok(updated);
  }

  let from = rental.hanger_count;
  let ctx = run_detached(state, RentalResizeCtxData::new(state.clone(), rental, hanger_count)).await?;
  let resized = ctx
    .resized
    .ok_or_else(|| AppError::Internal("resize pipeline finished without a row".to_string()))?;
  info!(from, to = hanger_count, "Hanger rental increased.");
  Ok(resized)
}

/// Cancelling a cancelled rental returns it unchanged.
#[instrument(name = "capacity_allocator::cancel_hanger_rental", skip(state), err(Display))]
pub async fn cancel_hanger_rental(state: &AppState, seller_id: Uuid, rental_id: Uuid) -> Result<HangerRental> {
  let rental = owned_rental(state, seller_id, rental_id).await?;
  if rental.status == RentalStatus::Cancelled {
    return Ok(rental);
  }

  let cancelled = match state.markets.cancel_rental(rental_id, seller_id, state.clock.now()).await? {
    Some(cancelled) => cancelled,
    // Cancelled concurrently, by the seller or the overdue sweep.
    None => state
      .markets
      .find_rental(rental_id)
      .await?
      .ok_or(AppError::RentalNotFound(rental_id))?,
  };
  if let Err(e) = state.markets.refresh_counters(cancelled.market_id).await {
    warn!(market_id = %cancelled.market_id, error = %e, "Failed to refresh market counters.");
  }
  info!("Hanger rental cancelled.");
  Ok(cancelled)
}

/// Marks a PENDING rental as paid. Confirming twice is a no-op.
#[instrument(name = "capacity_allocator::confirm_hanger_rental", skip(state), err(Display))]
pub async fn confirm_hanger_rental(state: &AppState, rental_id: Uuid) -> Result<HangerRental> {
  if let Some(confirmed) = state.markets.confirm_rental(rental_id, state.clock.now()).await? {
    info!("Hanger rental confirmed.");
    return Ok(confirmed);
  }
  let current = state
    .markets
    .find_rental(rental_id)
    .await?
    .ok_or(AppError::RentalNotFound(rental_id))?;
  match current.status {
    RentalStatus::Confirmed => Ok(current),
    RentalStatus::Cancelled => Err(AppError::RentalCancelled),
    RentalStatus::Pending => Err(AppError::QuantityConflict),
  }
}

/// Cancels PENDING rentals left unpaid past the grace period. Returns the
/// number of rentals cancelled.
#[instrument(name = "capacity_allocator::sweep_overdue_rentals", skip(state), err(Display))]
pub async fn sweep_overdue_rentals(state: &AppState) -> Result<u64> {
  let now = state.clock.now();
  let cancelled = state.markets.cancel_overdue_rentals(now - RENTAL_PAYMENT_GRACE, now).await?;
  if cancelled > 0 {
    info!(cancelled, "Overdue hanger rentals cancelled.");
  }
  Ok(cancelled)
}

#[instrument(name = "capacity_allocator::market_availability", skip(state), err(Display))]
pub async fn market_availability(state: &AppState, market_id: Uuid) -> Result<MarketAvailability> {
  let markets = state.markets.clone();
  let market = idempotent_read(state, || markets.find_market(market_id))
    .await?
    .ok_or(AppError::MarketNotFound(market_id))?;
  let vendors = idempotent_read(state, || markets.count_enrollments(market_id)).await?;
  let hangers = idempotent_read(state, || markets.live_hangers(market_id)).await?;
  Ok(MarketAvailability::new(&market, MarketUsage { vendors, hangers }))
}
