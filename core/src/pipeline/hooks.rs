// rackflow/src/pipeline/hooks.rs

//! Registration of step handlers, compensations and step retries.

use crate::core::context::{Compensator, Handler};
use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::error::FlowError;
use crate::pipeline::definition::{Pipeline, StepRetry};
use crate::retry::RetryPolicy;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Registers a handler for `step_name`. Several handlers on one step run in
  /// registration order.
  ///
  /// The handler's own error type only needs to convert into the pipeline's `Err`.
  pub fn on_step<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let handler: Handler<TData, Err> = Box::new(move |ctx_data| {
      let user_fut = handler_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.on.entry(step_name.to_string()).or_default().push(handler);
  }

  /// Registers the undo action for `step_name`.
  ///
  /// The compensation is armed only after every handler of the step has
  /// succeeded. When any later step fails, armed compensations run in reverse
  /// step order before the failure is returned. A step has at most one
  /// compensation; registering again replaces it.
  pub fn compensate<F, UserErr>(&mut self, step_name: &str, compensator_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<(), UserErr>> + Send + 'static,
    UserErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    if self.retries.contains_key(step_name) {
      panic!(
        "Pipeline setup error: step '{}' is retried and must not carry a compensation.",
        step_name
      );
    }
    let compensator: Compensator<TData, Err> = Box::new(move |ctx_data| {
      let user_fut = compensator_fn(ctx_data);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    if self.compensations.insert(step_name.to_string(), compensator).is_some() {
      event!(Level::WARN, %step_name, "Replacing an existing compensation.");
    }
  }

  /// Retries the handlers of `step_name` while `is_retryable` accepts the error.
  ///
  /// Only attach this to steps that are safe to repeat.
  pub fn retry_step(
    &mut self,
    step_name: &str,
    policy: RetryPolicy,
    is_retryable: impl Fn(&Err) -> bool + Send + Sync + 'static,
  ) {
    self.ensure_step_exists(step_name);
    if self.compensations.contains_key(step_name) {
      panic!(
        "Pipeline setup error: step '{}' has a compensation and must not be retried.",
        step_name
      );
    }
    self.retries.insert(
      step_name.to_string(),
      StepRetry {
        policy,
        is_retryable: Arc::new(is_retryable),
      },
    );
  }
}
