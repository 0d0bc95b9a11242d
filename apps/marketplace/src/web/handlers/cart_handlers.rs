// apps/marketplace/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::{created, ok};
use crate::errors::AppError;
use crate::models::ReservationView;
use crate::services::reservation_engine;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequestPayload {
  pub item_id: Uuid,
}

#[instrument(name = "handler::view_cart", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn view_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let reservations = reservation_engine::view_cart(&app_state, auth_user.user_id).await?;
  Ok(ok(reservations))
}

#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, req_payload, auth_user),
  fields(user_id = %auth_user.user_id, item_id = %req_payload.item_id)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<AddToCartRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let reservation = reservation_engine::add_to_cart(&app_state, auth_user.user_id, req_payload.item_id).await?;
  let view = ReservationView::at(reservation, app_state.clock.now());
  Ok(created(view))
}

#[instrument(name = "handler::extend_reservation", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn extend_reservation_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let reservation = reservation_engine::extend_reservation(&app_state, auth_user.user_id, path.into_inner()).await?;
  let view = ReservationView::at(reservation, app_state.clock.now());
  Ok(ok(view))
}

#[instrument(name = "handler::remove_from_cart", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn remove_from_cart_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let reservation_id = path.into_inner();
  reservation_engine::remove_from_cart(&app_state, auth_user.user_id, reservation_id).await?;
  Ok(ok(serde_json::json!({ "reservationId": reservation_id })))
}
