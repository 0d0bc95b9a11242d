// apps/marketplace/src/pipelines/common_steps.rs

//! Steps shared by every admission pipeline.

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::contexts::AdmissionCtx;
use rackflow::{ContextData, PipelineControl};
use tracing::{debug, instrument, warn};

/// Loads the market into the context; it must exist and be ACTIVE.
#[instrument(
  name = "common_step::load_open_market",
  skip(ctx_data),
  fields(market_id = %ctx_data.read().market_id()),
  err(Display)
)]
pub async fn load_open_market<C: AdmissionCtx>(ctx_data: ContextData<C>) -> AppResult<PipelineControl> {
  let (markets, market_id) = {
    let guard = ctx_data.read();
    (guard.app_state().markets.clone(), guard.market_id())
  };

  let market = markets
    .find_market(market_id)
    .await?
    .ok_or(AppError::MarketNotFound(market_id))?;
  if !market.is_open() {
    debug!(status = ?market.status, "Market does not accept admissions.");
    return Err(AppError::MarketNotOpen);
  }

  ctx_data.write().set_market(market);
  Ok(PipelineControl::Continue)
}

/// Rewrites the market's advisory counters. Failures are logged and
/// swallowed: the counters are a display cache and the admission already
/// holds.
#[instrument(name = "common_step::refresh_market_counters", skip(ctx_data))]
pub async fn refresh_market_counters<C: AdmissionCtx>(ctx_data: ContextData<C>) -> AppResult<PipelineControl> {
  let (markets, market_id) = {
    let guard = ctx_data.read();
    (guard.app_state().markets.clone(), guard.market_id())
  };
  if let Err(e) = markets.refresh_counters(market_id).await {
    warn!(%market_id, error = %e, "Failed to refresh market counters.");
  }
  Ok(PipelineControl::Continue)
}

/// The market loaded by `load_open_market`.
pub(crate) fn loaded_market<C: AdmissionCtx>(ctx_data: &ContextData<C>) -> AppResult<crate::models::Market> {
  ctx_data
    .read()
    .market()
    .cloned()
    .ok_or_else(|| AppError::Internal("market not loaded before capacity check".to_string()))
}
