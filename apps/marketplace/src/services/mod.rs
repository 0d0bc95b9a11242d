// apps/marketplace/src/services/mod.rs

pub mod capacity_allocator;
pub mod reservation_engine;
pub mod scheduler_auth;

use crate::errors::{AppError, Result};
use crate::state::AppState;
use rackflow::retry_with_predicate;
use std::future::Future;

/// Runs an idempotent read, retrying transient store failures per config.
pub(crate) async fn idempotent_read<T, F, Fut>(state: &AppState, operation: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  retry_with_predicate(&state.config.read_retry_policy(), operation, AppError::is_transient).await
}
