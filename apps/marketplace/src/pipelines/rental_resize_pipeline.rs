// apps/marketplace/src/pipelines/rental_resize_pipeline.rs

//! Growing an existing rental. Decreases never need capacity and are applied
//! directly by the allocator.

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::common_steps::{load_open_market, loaded_market, refresh_market_counters};
use crate::pipelines::contexts::RentalResizeCtxData;
use crate::state::AppState;
use rackflow::{ContextData, FlowRegistry, Pipeline, PipelineControl, StepDef};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub fn register_rental_resize_pipeline(flows: &Arc<FlowRegistry<AppError>>, app_state: &AppState) {
  let mut p = Pipeline::<RentalResizeCtxData, AppError>::from_steps(vec![
    StepDef::new("load_market"),
    StepDef::new("check_headroom"),
    StepDef::new("apply_resize"),
    StepDef::new("recheck_headroom"),
    StepDef::new("refresh_counters").optional(),
  ]);

  p.on_step("load_market", load_open_market::<RentalResizeCtxData>);
  p.on_step("check_headroom", check_headroom);
  p.on_step("apply_resize", apply_resize);
  p.compensate("apply_resize", restore_count);
  p.on_step("recheck_headroom", recheck_headroom);
  p.on_step("refresh_counters", refresh_market_counters::<RentalResizeCtxData>);

  let policy = app_state.config.read_retry_policy();
  for step in ["load_market", "check_headroom", "recheck_headroom"] {
    p.retry_step(step, policy.clone(), AppError::is_transient);
  }
  p.set_compensation_policy(app_state.config.compensation_policy());

  flows.register_pipeline(p);
}

#[instrument(name = "rental_resize::check_headroom", skip(ctx_data), err(Display))]
async fn check_headroom(ctx_data: ContextData<RentalResizeCtxData>) -> AppResult<PipelineControl> {
  let market = loaded_market(&ctx_data)?;
  let (markets, old_count, new_count) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.original.hanger_count, guard.new_count)
  };

  let live = markets.live_hangers(market.id).await?;
  let projected = live - i64::from(old_count) + i64::from(new_count);
  if projected > i64::from(market.max_hangers) {
    debug!(live, old_count, new_count, "Not enough hangers left for the increase.");
    return Err(AppError::MarketFull);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "rental_resize::apply_resize", skip(ctx_data), err(Display))]
async fn apply_resize(ctx_data: ContextData<RentalResizeCtxData>) -> AppResult<PipelineControl> {
  let (markets, clock, original, new_count) = {
    let guard = ctx_data.read();
    (
      guard.app_state.markets.clone(),
      guard.app_state.clock.clone(),
      guard.original.clone(),
      guard.new_count,
    )
  };
  let updated = markets
    .update_rental_count(original.id, original.seller_id, original.hanger_count, new_count, clock.now())
    .await?
    .ok_or(AppError::QuantityConflict)?;

  debug!(rental_id = %updated.id, from = original.hanger_count, to = new_count, "Rental resized.");
  ctx_data.write().resized = Some(updated);
  Ok(PipelineControl::Continue)
}

/// Puts the observed count back, unless someone changed the row since.
#[instrument(name = "rental_resize::restore_count", skip(ctx_data), err(Display))]
async fn restore_count(ctx_data: ContextData<RentalResizeCtxData>) -> AppResult<()> {
  let (markets, clock, original, new_count) = {
    let guard = ctx_data.read();
    (
      guard.app_state.markets.clone(),
      guard.app_state.clock.clone(),
      guard.original.clone(),
      guard.new_count,
    )
  };
  let restored = markets
    .update_rental_count(original.id, original.seller_id, new_count, original.hanger_count, clock.now())
    .await?;
  match restored {
    Some(_) => info!(rental_id = %original.id, count = original.hanger_count, "Rental increase rolled back."),
    None => warn!(rental_id = %original.id, "Rental changed before the increase could be rolled back."),
  }
  ctx_data.write().resized = None;
  Ok(())
}

#[instrument(name = "rental_resize::recheck_headroom", skip(ctx_data), err(Display))]
async fn recheck_headroom(ctx_data: ContextData<RentalResizeCtxData>) -> AppResult<PipelineControl> {
  let market = loaded_market(&ctx_data)?;
  let markets = ctx_data.read().app_state.markets.clone();

  let live = markets.live_hangers(market.id).await?;
  if live > i64::from(market.max_hangers) {
    warn!(live, max_hangers = market.max_hangers, "Increase overshot, compensating.");
    return Err(AppError::MarketFull);
  }
  Ok(PipelineControl::Continue)
}
