// rackflow/src/core/context.rs

//! Boxed handler types stored by a pipeline.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by pipeline callbacks.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A step handler.
///
/// Receives a clone of the shared `ContextData<TData>` and resolves to a
/// `PipelineControl` or the pipeline's error type.
///
/// Lock guards obtained from the context MUST be dropped before any `.await`.
pub type Handler<TData, Err> =
  Box<dyn Fn(ContextData<TData>) -> BoxFuture<Result<PipelineControl, Err>> + Send + Sync>;

/// Undo action for a step whose effect must be rolled back when a later step fails.
///
/// A compensator may be invoked more than once (it is retried on failure), so it
/// must be idempotent: undoing an already-undone effect succeeds.
pub type Compensator<TData, Err> = Box<dyn Fn(ContextData<TData>) -> BoxFuture<Result<(), Err>> + Send + Sync>;

/// Classifies a handler error as worth retrying.
pub type RetryPredicate<Err> = std::sync::Arc<dyn Fn(&Err) -> bool + Send + Sync>;
