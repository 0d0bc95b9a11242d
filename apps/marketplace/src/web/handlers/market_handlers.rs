// apps/marketplace/src/web/handlers/market_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::instrument;
use uuid::Uuid;

use super::{created, ok};
use crate::errors::AppError;
use crate::services::capacity_allocator;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[instrument(name = "handler::market_availability", skip(app_state))]
pub async fn market_availability_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let availability = capacity_allocator::market_availability(&app_state, path.into_inner()).await?;
  Ok(ok(availability))
}

#[instrument(name = "handler::register_for_market", skip(app_state, auth_user), fields(seller_id = %auth_user.user_id))]
pub async fn register_for_market_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let enrollment = capacity_allocator::register_for_market(&app_state, path.into_inner(), auth_user.user_id).await?;
  Ok(created(enrollment))
}
