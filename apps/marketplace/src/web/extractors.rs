// apps/marketplace/src/web/extractors.rs

use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::scheduler_auth;
use crate::state::AppState;

/// Identity injected by the upstream auth proxy. Buyers and sellers share it.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let header_name = req
      .app_data::<web::Data<AppState>>()
      .map(|state| state.config.auth_user_header.clone())
      .unwrap_or_else(|| "X-User-ID".to_string());

    let user_id = req
      .headers()
      .get(header_name.as_str())
      .and_then(|v| v.to_str().ok())
      .and_then(|v| Uuid::parse_str(v.trim()).ok());

    match user_id {
      Some(user_id) => ready(Ok(AuthenticatedUser { user_id })),
      None => {
        warn!(header = %header_name, "Missing or invalid user identity header.");
        ready(Err(AppError::NotAuthenticated))
      }
    }
  }
}

/// Guard for `/internal/*`: a bearer secret matching `SCHEDULER_TOKEN_HASH`.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerAuth;

impl FromRequest for SchedulerAuth {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(authorize_scheduler(req))
  }
}

fn authorize_scheduler(req: &HttpRequest) -> Result<SchedulerAuth, AppError> {
  let stored_hash = req
    .app_data::<web::Data<AppState>>()
    .and_then(|state| state.config.scheduler_token_hash.clone())
    .ok_or(AppError::InvalidSchedulerToken)?;

  let presented = req
    .headers()
    .get(AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .ok_or(AppError::InvalidSchedulerToken)?;

  if scheduler_auth::verify_secret(&stored_hash, presented)? {
    Ok(SchedulerAuth)
  } else {
    warn!("Rejected scheduler request with a bad secret.");
    Err(AppError::InvalidSchedulerToken)
  }
}
