// apps/marketplace/src/lib.rs

//! Cart reservations and market capacity allocation for a second-hand
//! marketplace.

pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
