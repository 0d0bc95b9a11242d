// apps/marketplace/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use rackflow::FlowError;
use serde_json::json;
use thiserror::Error;

/// Coarse failure class, used for status mapping and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  Auth,
  StateConflict,
  NotFound,
  TransientStore,
  Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Hanger count must be between {min} and {max}, got {got}.")]
  OutOfRange { min: i32, max: i32, got: i32 },

  #[error("Authentication required.")]
  NotAuthenticated,

  #[error("Invalid scheduler credentials.")]
  InvalidSchedulerToken,

  #[error("You do not own this resource.")]
  NotOwner,

  #[error("Seller account is not active.")]
  NotActiveSeller,

  #[error("Seller is not registered for this market.")]
  NotEnrolled,

  #[error("Item {0} not found.")]
  ItemNotFound(uuid::Uuid),

  #[error("Reservation {0} not found.")]
  ReservationNotFound(uuid::Uuid),

  #[error("Market {0} not found.")]
  MarketNotFound(uuid::Uuid),

  #[error("Hanger rental {0} not found.")]
  RentalNotFound(uuid::Uuid),

  #[error("Item is not available for sale.")]
  ItemNotAvailable,

  #[error("Item is already reserved.")]
  AlreadyReserved,

  #[error("Reservation cannot be extended any further.")]
  MaxExtensionsReached,

  #[error("Reservation has already expired.")]
  AlreadyExpired,

  #[error("Market is not open for registration.")]
  MarketNotOpen,

  #[error("Seller is already registered for this market.")]
  AlreadyRegistered,

  #[error("Market is full.")]
  MarketFull,

  #[error("Seller already holds a hanger rental for this market.")]
  RentalExists,

  #[error("Hanger rental has been cancelled.")]
  RentalCancelled,

  #[error("Hanger rental changed concurrently, reload and try again.")]
  QuantityConflict,

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("Workflow Error: {source}")]
  Flow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      AppError::Validation(_) | AppError::OutOfRange { .. } => ErrorKind::Validation,
      AppError::NotAuthenticated
      | AppError::InvalidSchedulerToken
      | AppError::NotOwner
      | AppError::NotActiveSeller
      | AppError::NotEnrolled => ErrorKind::Auth,
      AppError::ItemNotFound(_)
      | AppError::ReservationNotFound(_)
      | AppError::MarketNotFound(_)
      | AppError::RentalNotFound(_) => ErrorKind::NotFound,
      AppError::ItemNotAvailable
      | AppError::AlreadyReserved
      | AppError::MaxExtensionsReached
      | AppError::AlreadyExpired
      | AppError::MarketNotOpen
      | AppError::AlreadyRegistered
      | AppError::MarketFull
      | AppError::RentalExists
      | AppError::RentalCancelled
      | AppError::QuantityConflict => ErrorKind::StateConflict,
      AppError::StoreUnavailable(_) => ErrorKind::TransientStore,
      AppError::Sqlx(e) if is_transient_sqlx(e) => ErrorKind::TransientStore,
      AppError::Sqlx(_) | AppError::Config(_) | AppError::Flow { .. } | AppError::Internal(_) => ErrorKind::Internal,
    }
  }

  /// Stable machine-readable code sent to clients.
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "VALIDATION_ERROR",
      AppError::OutOfRange { .. } => "OUT_OF_RANGE",
      AppError::NotAuthenticated => "NOT_AUTHENTICATED",
      AppError::InvalidSchedulerToken => "INVALID_SCHEDULER_TOKEN",
      AppError::NotOwner => "NOT_OWNER",
      AppError::NotActiveSeller => "NOT_ACTIVE_SELLER",
      AppError::NotEnrolled => "NOT_ENROLLED",
      AppError::ItemNotFound(_) => "ITEM_NOT_FOUND",
      AppError::ReservationNotFound(_) | AppError::RentalNotFound(_) => "NOT_FOUND",
      AppError::MarketNotFound(_) => "MARKET_NOT_FOUND",
      AppError::ItemNotAvailable => "ITEM_NOT_AVAILABLE",
      AppError::AlreadyReserved => "ALREADY_RESERVED",
      AppError::MaxExtensionsReached => "MAX_EXTENSIONS_REACHED",
      AppError::AlreadyExpired => "ALREADY_EXPIRED",
      AppError::MarketNotOpen => "MARKET_NOT_OPEN",
      AppError::AlreadyRegistered => "ALREADY_REGISTERED",
      AppError::MarketFull => "MARKET_FULL",
      AppError::RentalExists => "RENTAL_EXISTS",
      AppError::RentalCancelled => "RENTAL_CANCELLED",
      AppError::QuantityConflict => "QUANTITY_CONFLICT",
      AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
      AppError::Sqlx(e) if is_transient_sqlx(e) => "STORE_UNAVAILABLE",
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Flow { .. } | AppError::Internal(_) => "INTERNAL_ERROR",
    }
  }

  /// True for infrastructure failures that an idempotent read may retry.
  pub fn is_transient(&self) -> bool {
    self.kind() == ErrorKind::TransientStore
  }

  /// Whether the client may reasonably try the same request again later.
  pub fn retryable(&self) -> bool {
    matches!(
      self,
      AppError::AlreadyReserved | AppError::MarketFull | AppError::QuantityConflict
    ) || self.is_transient()
  }
}

fn is_transient_sqlx(e: &sqlx::Error) -> bool {
  matches!(
    e,
    sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
  )
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self.kind() {
      ErrorKind::Validation => StatusCode::BAD_REQUEST,
      ErrorKind::Auth => match self {
        AppError::NotAuthenticated | AppError::InvalidSchedulerToken => StatusCode::UNAUTHORIZED,
        _ => StatusCode::FORBIDDEN,
      },
      ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ErrorKind::StateConflict => StatusCode::CONFLICT,
      ErrorKind::TransientStore | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    // Internal details stay in the log.
    let message = match self.kind() {
      ErrorKind::Internal => {
        tracing::error!(application_error = %self, "Responding with internal error");
        "An internal error occurred.".to_string()
      }
      ErrorKind::TransientStore => {
        tracing::warn!(application_error = %self, "Responding with transient store error");
        "Service temporarily unavailable, please try again.".to_string()
      }
      _ => {
        tracing::debug!(application_error = %self, code = self.code(), "Responding with error");
        self.to_string()
      }
    };
    HttpResponse::build(status).json(json!({
      "success": false,
      "error": message,
      "code": self.code(),
      "retryable": self.retryable(),
    }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
