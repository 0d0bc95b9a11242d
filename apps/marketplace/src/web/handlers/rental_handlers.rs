// apps/marketplace/src/web/handlers/rental_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::{created, ok};
use crate::errors::AppError;
use crate::services::capacity_allocator;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HangerCountPayload {
  pub hanger_count: i32,
}

#[instrument(
  name = "handler::create_hanger_rental",
  skip(app_state, req_payload, auth_user),
  fields(seller_id = %auth_user.user_id, hanger_count = req_payload.hanger_count)
)]
pub async fn create_hanger_rental_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<HangerCountPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let rental = capacity_allocator::create_hanger_rental(
    &app_state,
    path.into_inner(),
    auth_user.user_id,
    req_payload.hanger_count,
  )
  .await?;
  Ok(created(rental))
}

#[instrument(
  name = "handler::resize_hanger_rental",
  skip(app_state, req_payload, auth_user),
  fields(seller_id = %auth_user.user_id, hanger_count = req_payload.hanger_count)
)]
pub async fn resize_hanger_rental_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<HangerCountPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let rental = capacity_allocator::resize_hanger_rental(
    &app_state,
    auth_user.user_id,
    path.into_inner(),
    req_payload.hanger_count,
  )
  .await?;
  Ok(ok(rental))
}

#[instrument(name = "handler::cancel_hanger_rental", skip(app_state, auth_user), fields(seller_id = %auth_user.user_id))]
pub async fn cancel_hanger_rental_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let rental = capacity_allocator::cancel_hanger_rental(&app_state, auth_user.user_id, path.into_inner()).await?;
  Ok(ok(rental))
}
