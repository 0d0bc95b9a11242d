// apps/marketplace/src/web/handlers/internal_handlers.rs

//! Endpoints driven by the external scheduler and the payment side.

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use super::ok;
use crate::errors::AppError;
use crate::services::{capacity_allocator, reservation_engine};
use crate::state::AppState;
use crate::web::extractors::SchedulerAuth;

#[instrument(name = "handler::sweep_expired_reservations", skip_all)]
pub async fn sweep_expired_reservations_handler(
  app_state: web::Data<AppState>,
  _auth: SchedulerAuth,
) -> Result<HttpResponse, AppError> {
  let report = reservation_engine::sweep_expired(&app_state).await?;
  Ok(ok(report))
}

#[instrument(name = "handler::sweep_overdue_rentals", skip_all)]
pub async fn sweep_overdue_rentals_handler(
  app_state: web::Data<AppState>,
  _auth: SchedulerAuth,
) -> Result<HttpResponse, AppError> {
  let cancelled = capacity_allocator::sweep_overdue_rentals(&app_state).await?;
  Ok(ok(json!({ "cancelled": cancelled })))
}

#[instrument(name = "handler::confirm_hanger_rental", skip(app_state, _auth))]
pub async fn confirm_hanger_rental_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  _auth: SchedulerAuth,
) -> Result<HttpResponse, AppError> {
  let rental = capacity_allocator::confirm_hanger_rental(&app_state, path.into_inner()).await?;
  Ok(ok(rental))
}
