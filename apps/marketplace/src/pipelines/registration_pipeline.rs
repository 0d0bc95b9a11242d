// apps/marketplace/src/pipelines/registration_pipeline.rs

//! Market registration: check the vendor seat, claim it, then re-check the
//! claim against everyone who raced us. A claim ranked past `max_vendors`
//! is handed back by the `insert_enrollment` compensation.

use crate::errors::{AppError, Result as AppResult};
use crate::pipelines::common_steps::{load_open_market, loaded_market, refresh_market_counters};
use crate::pipelines::contexts::RegistrationCtxData;
use crate::state::AppState;
use crate::store::Inserted;
use rackflow::{ContextData, FlowRegistry, Pipeline, PipelineControl, StepDef};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub fn register_registration_pipeline(flows: &Arc<FlowRegistry<AppError>>, app_state: &AppState) {
  let mut p = Pipeline::<RegistrationCtxData, AppError>::from_steps(vec![
    StepDef::new("verify_seller"),
    StepDef::new("load_market"),
    StepDef::new("check_duplicate_enrollment"),
    StepDef::new("check_capacity"),
    StepDef::new("insert_enrollment"),
    StepDef::new("recheck_capacity"),
    StepDef::new("refresh_counters").optional(),
  ]);

  p.on_step("verify_seller", verify_seller);
  p.on_step("load_market", load_open_market::<RegistrationCtxData>);
  p.on_step("check_duplicate_enrollment", check_duplicate_enrollment);
  p.on_step("check_capacity", check_capacity);
  p.on_step("insert_enrollment", insert_enrollment);
  p.compensate("insert_enrollment", release_enrollment);
  p.on_step("recheck_capacity", recheck_capacity);
  p.on_step("refresh_counters", refresh_market_counters::<RegistrationCtxData>);

  let policy = app_state.config.read_retry_policy();
  for step in ["verify_seller", "load_market", "check_duplicate_enrollment", "check_capacity", "recheck_capacity"] {
    p.retry_step(step, policy.clone(), AppError::is_transient);
  }
  p.set_compensation_policy(app_state.config.compensation_policy());

  flows.register_pipeline(p);
}

#[instrument(name = "registration::verify_seller", skip(ctx_data), err(Display))]
async fn verify_seller(ctx_data: ContextData<RegistrationCtxData>) -> AppResult<PipelineControl> {
  let (markets, seller_id) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.seller_id)
  };
  match markets.find_seller(seller_id).await? {
    Some(seller) if seller.is_active => Ok(PipelineControl::Continue),
    _ => {
      debug!(%seller_id, "Seller missing or inactive.");
      Err(AppError::NotActiveSeller)
    }
  }
}

#[instrument(name = "registration::check_duplicate_enrollment", skip(ctx_data), err(Display))]
async fn check_duplicate_enrollment(ctx_data: ContextData<RegistrationCtxData>) -> AppResult<PipelineControl> {
  let (markets, market_id, seller_id) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.market_id, guard.seller_id)
  };
  if markets.find_enrollment(market_id, seller_id).await?.is_some() {
    return Err(AppError::AlreadyRegistered);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "registration::check_capacity", skip(ctx_data), err(Display))]
async fn check_capacity(ctx_data: ContextData<RegistrationCtxData>) -> AppResult<PipelineControl> {
  let market = loaded_market(&ctx_data)?;
  let markets = ctx_data.read().app_state.markets.clone();

  let vendors = markets.count_enrollments(market.id).await?;
  let hangers = markets.live_hangers(market.id).await?;
  if vendors >= i64::from(market.max_vendors) || hangers >= i64::from(market.max_hangers) {
    debug!(vendors, hangers, "No vendor seat left.");
    return Err(AppError::MarketFull);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "registration::insert_enrollment", skip(ctx_data), err(Display))]
async fn insert_enrollment(ctx_data: ContextData<RegistrationCtxData>) -> AppResult<PipelineControl> {
  let (markets, clock, market_id, seller_id) = {
    let guard = ctx_data.read();
    (
      guard.app_state.markets.clone(),
      guard.app_state.clock.clone(),
      guard.market_id,
      guard.seller_id,
    )
  };
  match markets.insert_enrollment(market_id, seller_id, clock.now()).await? {
    Inserted::Created(enrollment) => {
      debug!(enrollment_id = %enrollment.id, seq = enrollment.seq, "Vendor seat claimed.");
      ctx_data.write().enrollment = Some(enrollment);
      Ok(PipelineControl::Continue)
    }
    Inserted::Duplicate => Err(AppError::AlreadyRegistered),
  }
}

#[instrument(name = "registration::release_enrollment", skip(ctx_data), err(Display))]
async fn release_enrollment(ctx_data: ContextData<RegistrationCtxData>) -> AppResult<()> {
  let (markets, enrollment) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.enrollment.clone())
  };
  let Some(enrollment) = enrollment else {
    return Ok(());
  };
  if markets.delete_enrollment(enrollment.id).await? {
    info!(enrollment_id = %enrollment.id, "Overshooting enrollment released.");
  }
  ctx_data.write().enrollment = None;
  Ok(())
}

#[instrument(name = "registration::recheck_capacity", skip(ctx_data), err(Display))]
async fn recheck_capacity(ctx_data: ContextData<RegistrationCtxData>) -> AppResult<PipelineControl> {
  let market = loaded_market(&ctx_data)?;
  let (markets, enrollment) = {
    let guard = ctx_data.read();
    (guard.app_state.markets.clone(), guard.enrollment.clone())
  };
  let enrollment = enrollment.ok_or_else(|| AppError::Internal("enrollment missing at recheck".to_string()))?;

  let rank = markets.enrollment_rank(market.id, enrollment.seq).await?;
  let hangers = markets.live_hangers(market.id).await?;
  if rank > i64::from(market.max_vendors) || hangers >= i64::from(market.max_hangers) {
    warn!(rank, hangers, max_vendors = market.max_vendors, "Admission overshot, compensating.");
    return Err(AppError::MarketFull);
  }
  Ok(PipelineControl::Continue)
}
