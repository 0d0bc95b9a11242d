// apps/marketplace/src/pipelines/rental_pipeline.rs

//! Hanger rental admission. Rentals claim a variable amount of capacity, so
//! the re-check sums hanger counts over every open rental admitted at or
//! before ours.

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::common_steps::{load_open_market, loaded_market, refresh_market_counters};
use crate::pipelines::contexts::RentalCtxData;
use crate::state::AppState;
use crate::store::Inserted;
use rackflow::{ContextData, FlowRegistry, Pipeline, PipelineControl, StepDef};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub fn register_rental_pipeline(flows: &Arc<FlowRegistry<AppError>>, app_state: &AppState) {
  let mut p = Pipeline::<RentalCtxData, AppError>::from_steps(vec![
    StepDef::new("load_market"),
    StepDef::new("require_enrollment"),
    StepDef::new("check_existing_rental"),
    StepDef::new("check_headroom"),
    StepDef::new("insert_rental"),
    StepDef::new("recheck_headroom"),
    StepDef::new("refresh_counters").optional(),
  ]);

  p.on_step("load_market", load_open_market::<RentalCtxData>);
  p.on_step("require_enrollment", require_enrollment);
  p.on_step("check_existing_rental", check_existing_rental);
  p.on_step("check_headroom", check_headroom);
  p.on_step("insert_rental", insert_rental);
  p.compensate("insert_rental", release_rental);
  p.on_step("recheck_headroom", recheck_headroom);
  p.on_step("refresh_counters", refresh_market_counters::<RentalCtxData>);

  let policy = app_state.config.read_retry_policy();
  for step in ["load_market", "require_enrollment", "check_existing_rental", "check_headroom", "recheck_headroom"] {
    p.retry_step(step, policy.clone(), AppError::is_transient);
  }
  p.set_compensation_policy(app_state.config.compensation_policy());

  flows.register_pipeline(p);
}

#[instrument(name = "rental::require_enrollment", skip(ctx_data), err(Display))]
async fn require_enrollment(ctx_data: ContextData<RentalCtxData>) -> AppResult<PipelineControl> {
  let (markets, market_id, seller_id) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.market_id, guard.seller_id)
  };
  if markets.find_enrollment(market_id, seller_id).await?.is_none() {
    return Err(AppError::NotEnrolled);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "rental::check_existing_rental", skip(ctx_data), err(Display))]
async fn check_existing_rental(ctx_data: ContextData<RentalCtxData>) -> AppResult<PipelineControl> {
  let (markets, market_id, seller_id) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.market_id, guard.seller_id)
  };
  if let Some(existing) = markets.find_open_rental(market_id, seller_id).await? {
    debug!(rental_id = %existing.id, "Seller already holds an open rental.");
    return Err(AppError::RentalExists);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "rental::check_headroom", skip(ctx_data), err(Display))]
async fn check_headroom(ctx_data: ContextData<RentalCtxData>) -> AppResult<PipelineControl> {
  let market = loaded_market(&ctx_data)?;
  let (markets, hanger_count) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.hanger_count)
  };

  let live = markets.live_hangers(market.id).await?;
  if live + i64::from(hanger_count) > i64::from(market.max_hangers) {
    debug!(live, hanger_count, max_hangers = market.max_hangers, "Not enough hangers left.");
    return Err(AppError::MarketFull);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "rental::insert_rental", skip(ctx_data), err(Display))]
async fn insert_rental(ctx_data: ContextData<RentalCtxData>) -> AppResult<PipelineControl> {
  let (markets, clock, market_id, seller_id, hanger_count) = {
    let guard = ctx_data.read();
    (
      guard.app_state.markets.clone(),
      guard.app_state.clock.clone(),
      guard.market_id,
      guard.seller_id,
      guard.hanger_count,
    )
  };
  match markets.insert_rental(market_id, seller_id, hanger_count, clock.now()).await? {
    Inserted::Created(rental) => {
      debug!(rental_id = %rental.id, seq = rental.seq, "Hangers claimed.");
      ctx_data.write().rental = Some(rental);
      Ok(PipelineControl::Continue)
    }
    Inserted::Duplicate => Err(AppError::RentalExists),
  }
}

#[instrument(name = "rental::release_rental", skip(ctx_data), err(Display))]
async fn release_rental(ctx_data: ContextData<RentalCtxData>) -> AppResult<()> {
  let (markets, rental) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.rental.clone())
  };
  let Some(rental) = rental else {
    return Ok(());
  };
  if markets.delete_rental(rental.id).await? {
    info!(rental_id = %rental.id, "Overshooting rental released.");
  }
  ctx_data.write().rental = None;
  Ok(())
}

#[instrument(name = "rental::recheck_headroom", skip(ctx_data), err(Display))]
async fn recheck_headroom(ctx_data: ContextData<RentalCtxData>) -> AppResult<PipelineControl> {
  let market = loaded_market(&ctx_data)?;
  let (markets, rental) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.rental.clone())
  };
  let rental = rental.ok_or_else(|| AppError::Internal("rental missing at recheck".to_string()))?;

  let through = markets.hangers_through(market.id, rental.seq).await?;
  if through > i64::from(market.max_hangers) {
    warn!(through, max_hangers = market.max_hangers, "Rental overshot, compensating.");
    return Err(AppError::MarketFull);
  }
  Ok(PipelineControl::Continue)
}
