// apps/marketplace/src/pipelines/mod.rs

//! Admission pipelines of the capacity allocator.

use crate::errors::AppError;
use crate::state::AppState;
use rackflow::FlowRegistry;
use std::sync::Arc;

pub mod common_steps;
pub mod contexts;

pub mod registration_pipeline;
pub mod rental_pipeline;
pub mod rental_resize_pipeline;

/// Registers every admission pipeline with `flows`. Called once while the
/// application state is built.
pub fn register_all_pipelines(flows: &Arc<FlowRegistry<AppError>>, app_state: &AppState) {
  registration_pipeline::register_registration_pipeline(flows, app_state);
  rental_pipeline::register_rental_pipeline(flows, app_state);
  rental_resize_pipeline::register_rental_resize_pipeline(flows, app_state);

  tracing::info!("All admission pipelines registered.");
}
