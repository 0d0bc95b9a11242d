// rackflow/src/pipeline/execution.rs

//! `Pipeline::run()`: step execution, retries and compensation unwinding.

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use crate::retry::retry_with_predicate;
use tracing::{event, info_span, instrument, Instrument, Level};

enum StepOutcome {
  Skipped,
  Ran(PipelineControl),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes the pipeline against the shared context `ctx_data`.
  ///
  /// On a handler error every compensation armed so far is run, newest first,
  /// and then the handler's error is returned. If a compensation cannot be
  /// completed within its retry budget the run fails with
  /// `FlowError::CompensationFailed` instead, since the store may now hold an
  /// effect that nobody owns. Under `RetryPolicy::until_success` that cannot
  /// happen: the unwind keeps going until every compensation lands.
  ///
  /// `PipelineControl::Stop` ends the run successfully. Effects of the steps
  /// that already ran are kept and their compensations are dropped, so a
  /// caller must treat `PipelineResult::Stopped` as a finished run.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");
    let mut armed: Vec<&str> = Vec::new();

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = info_span!(
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );

      match self.run_step(step_def, ctx_data.clone()).instrument(step_span).await {
        Ok(StepOutcome::Skipped) => {}
        Ok(StepOutcome::Ran(control)) => {
          if self.compensations.contains_key(&step_def.name) {
            armed.push(step_def.name.as_str());
          }
          if control == PipelineControl::Stop {
            event!(Level::INFO, step_name = %step_def.name, "Pipeline stopped by a handler.");
            return Ok(PipelineResult::Stopped);
          }
        }
        Err(err) => {
          event!(Level::WARN, step_name = %step_def.name, error = %err, armed = armed.len(), "Step failed.");
          self.unwind(&armed, ctx_data).await?;
          return Err(err);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: ContextData<TData>) -> Result<StepOutcome, Err> {
    if let Some(skip_cond_fn) = &step_def.skip_if {
      if skip_cond_fn(ctx_data.clone()) {
        event!(Level::DEBUG, "Step skipped due to 'skip_if' condition.");
        return Ok(StepOutcome::Skipped);
      }
    }

    let handlers = match self.on.get(&step_def.name) {
      Some(handlers) if !handlers.is_empty() => handlers,
      _ if step_def.optional => {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return Ok(StepOutcome::Skipped);
      }
      _ => {
        event!(Level::ERROR, "Non-optional step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }
    };

    let retry = self.retries.get(&step_def.name);
    for handler_fn in handlers {
      let control = match retry {
        Some(rule) => {
          let predicate = rule.is_retryable.clone();
          retry_with_predicate(&rule.policy, || handler_fn(ctx_data.clone()), |e: &Err| predicate(e)).await?
        }
        None => handler_fn(ctx_data.clone()).await?,
      };
      if control == PipelineControl::Stop {
        return Ok(StepOutcome::Ran(PipelineControl::Stop));
      }
    }
    Ok(StepOutcome::Ran(PipelineControl::Continue))
  }

  /// Runs every armed compensation, newest first. Each one is retried on any
  /// error; a failure does not prevent the remaining compensations from running.
  async fn unwind(&self, armed: &[&str], ctx_data: ContextData<TData>) -> Result<(), Err> {
    let mut first_failure: Option<FlowError> = None;

    for step_name in armed.iter().rev() {
      let Some(compensator) = self.compensations.get(*step_name) else {
        continue;
      };
      let span = info_span!("compensation", step_name = *step_name);
      let policy = &self.compensation_policy;
      let outcome = retry_with_predicate(policy, || compensator(ctx_data.clone()), |_: &Err| true)
        .instrument(span)
        .await;

      match outcome {
        Ok(()) => event!(Level::INFO, step_name = *step_name, "Compensation applied."),
        Err(err) => {
          event!(Level::ERROR, step_name = *step_name, error = %err, "Compensation failed; effect may be left behind.");
          first_failure.get_or_insert(FlowError::CompensationFailed {
            step_name: (*step_name).to_string(),
            attempts: policy.max_retries.saturating_add(1),
            message: err.to_string(),
          });
        }
      }
    }

    match first_failure {
      Some(failure) => Err(Err::from(failure)),
      None => Ok(()),
    }
  }
}
