// apps/marketplace/src/pipelines/contexts.rs

//! Context data for the admission pipelines. Handlers receive these wrapped
//! in `rackflow::ContextData`.

use crate::models::{HangerRental, Market, MarketEnrollment};
use crate::state::AppState;
use uuid::Uuid;

/// What every admission context exposes to the shared steps.
pub trait AdmissionCtx: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn market_id(&self) -> Uuid;
  fn seller_id(&self) -> Uuid;
  fn market(&self) -> Option<&Market>;
  fn set_market(&mut self, market: Market);
}

macro_rules! admission_ctx {
  ($ty:ty, market_id: $($m:ident).+, seller_id: $($s:ident).+) => {
    impl AdmissionCtx for $ty {
      fn app_state(&self) -> &AppState {
        &self.app_state
      }
      fn market_id(&self) -> Uuid {
        self.$($m).+
      }
      fn seller_id(&self) -> Uuid {
        self.$($s).+
      }
      fn market(&self) -> Option<&Market> {
        self.market.as_ref()
      }
      fn set_market(&mut self, market: Market) {
        self.market = Some(market);
      }
    }
  };
}

#[derive(Clone)]
pub struct RegistrationCtxData {
  pub app_state: AppState,
  pub market_id: Uuid,
  pub seller_id: Uuid,
  pub market: Option<Market>,
  pub enrollment: Option<MarketEnrollment>,
}

impl RegistrationCtxData {
  pub fn new(app_state: AppState, market_id: Uuid, seller_id: Uuid) -> Self {
    Self {
      app_state,
      market_id,
      seller_id,
      market: None,
      enrollment: None,
    }
  }
}

admission_ctx!(RegistrationCtxData, market_id: market_id, seller_id: seller_id);

#[derive(Clone)]
pub struct RentalCtxData {
  pub app_state: AppState,
  pub market_id: Uuid,
  pub seller_id: Uuid,
  pub hanger_count: i32,
  pub market: Option<Market>,
  pub rental: Option<HangerRental>,
}

impl RentalCtxData {
  pub fn new(app_state: AppState, market_id: Uuid, seller_id: Uuid, hanger_count: i32) -> Self {
    Self {
      app_state,
      market_id,
      seller_id,
      hanger_count,
      market: None,
      rental: None,
    }
  }
}

admission_ctx!(RentalCtxData, market_id: market_id, seller_id: seller_id);

/// Increase of an existing rental. `original` is the row as observed before
/// the pipeline started; the update is conditional on its count.
#[derive(Clone)]
pub struct RentalResizeCtxData {
  pub app_state: AppState,
  pub original: HangerRental,
  pub new_count: i32,
  pub market: Option<Market>,
  pub resized: Option<HangerRental>,
}

impl RentalResizeCtxData {
  pub fn new(app_state: AppState, original: HangerRental, new_count: i32) -> Self {
    Self {
      app_state,
      original,
      new_count,
      market: None,
      resized: None,
    }
  }
}

admission_ctx!(RentalResizeCtxData, market_id: original.market_id, seller_id: original.seller_id);
