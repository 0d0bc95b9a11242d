// apps/marketplace/src/state.rs
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines;
use crate::store::{MarketStore, MemoryStore, ReservationStore};
use rackflow::FlowRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub reservations: Arc<dyn ReservationStore>,
  pub markets: Arc<dyn MarketStore>,
  pub clock: Arc<dyn Clock>,
  pub flows: Arc<FlowRegistry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Builds the state and registers every admission pipeline on it.
  pub fn new(
    reservations: Arc<dyn ReservationStore>,
    markets: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
    config: Arc<AppConfig>,
  ) -> Self {
    let state = Self {
      reservations,
      markets,
      clock,
      flows: Arc::new(FlowRegistry::new()),
      config,
    };
    pipelines::register_all_pipelines(&state.flows, &state);
    state
  }

  /// Both stores backed by one in-memory instance.
  pub fn in_memory(store: Arc<MemoryStore>, clock: Arc<dyn Clock>, config: AppConfig) -> Self {
    Self::new(store.clone(), store, clock, Arc::new(config))
  }
}
