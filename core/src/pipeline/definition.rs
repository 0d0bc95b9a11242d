// rackflow/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural configuration.

use crate::core::context::{Compensator, Handler, RetryPredicate};
use crate::core::step::{SkipCondition, StepDef};
use crate::error::FlowError;
use crate::retry::RetryPolicy;
use std::collections::HashMap;

/// Retry configuration attached to a single step.
pub(crate) struct StepRetry<Err> {
  pub(crate) policy: RetryPolicy,
  pub(crate) is_retryable: RetryPredicate<Err>,
}

/// An ordered set of named steps over a shared context `TData`.
///
/// `Err` is the error type returned by handlers. It must be constructible from
/// `FlowError` so that framework failures (a step without handlers, a
/// compensation that could not complete) surface through the same type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) compensations: HashMap<String, Compensator<TData, Err>>,
  pub(crate) retries: HashMap<String, StepRetry<Err>>,
  /// Applied to every compensator. Compensations retry on any error.
  pub(crate) compensation_policy: RetryPolicy,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      steps,
      on: HashMap::new(),
      compensations: HashMap::new(),
      retries: HashMap::new(),
      compensation_policy: RetryPolicy::default().with_max_retries(4),
    }
  }

  /// Creates a pipeline from prepared step definitions.
  pub fn from_steps(steps: Vec<StepDef<TData>>) -> Self {
    let mut pipeline = Self::new(&[]);
    pipeline.steps = steps;
    pipeline
  }

  /// Step names in execution order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// Panics when the step is unknown. Registration happens at startup, so a typo
  /// in a step name is a programming error rather than a runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("Pipeline setup error: {}", FlowError::StepNotFound {
        step_name: step_name.to_string(),
      });
    }
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Appends a step at the end of the pipeline.
  pub fn push_step(&mut self, step: StepDef<TData>) {
    if self.has_step(&step.name) {
      panic!("Pipeline setup error: step '{}' already exists.", step.name);
    }
    self.steps.push(step);
  }

  pub fn remove_step(&mut self, step_name: &str) {
    self.steps.retain(|s| s.name != step_name);
    self.on.remove(step_name);
    self.compensations.remove(step_name);
    self.retries.remove(step_name);
  }

  /// Retry budget used when a compensation fails.
  pub fn set_compensation_policy(&mut self, policy: RetryPolicy) {
    self.compensation_policy = policy;
  }
}
