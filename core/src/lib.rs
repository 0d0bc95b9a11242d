// src/lib.rs

//! Rackflow: asynchronous step pipelines for optimistic admission control.
//!
//! A pipeline is an ordered list of named steps that operate on a shared,
//! lock-guarded context. It is built for the "check, act, re-check,
//! compensate" style of writing against a transactional store:
//!  - Named steps, optionally skippable via a predicate on the context.
//!  - Asynchronous handlers that can continue or stop the run early.
//!  - Compensations that are armed once their step succeeds and are
//!    unwound in reverse order when a later step fails.
//!  - Bounded retries with exponential backoff for steps that are safe to
//!    repeat (idempotent reads), driven by a caller-supplied predicate.
//!  - A type-keyed registry for dispatching a context to its pipeline.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod retry;

// --- Re-exports for the Public API ---

pub use crate::core::context::{Compensator, Handler};
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult};

pub use crate::registry::FlowRegistry;

pub use crate::retry::{retry_with_predicate, RetryPolicy};

/*
    Typical admission flow:
    1. Define a context struct `AdmitCtx` holding inputs, handles to the store
       and slots for intermediate results.
    2. Create a `Pipeline<AdmitCtx, AppError>` listing the steps in order.
    3. Register handlers with `.on_step()`. Read-only checks may be wrapped
       with `.retry_step()`; the write that claims capacity gets a
       `.compensate()` undo action.
    4. A later "re-check" step returns an error when the write overshot; the
       pipeline unwinds the armed compensations before returning that error.
    5. Register the pipeline in a `FlowRegistry` and run it with
       `registry.run(ContextData::new(ctx)).await`.
*/
