// rackflow/src/core/control.rs

//! Signals for controlling pipeline flow and the outcome of a pipeline run.

/// Signal from a handler indicating whether the pipeline should continue or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  /// Proceed to the next handler or step.
  Continue,
  /// Halt the pipeline without error. Steps that already ran keep their effects;
  /// no compensation is performed.
  Stop,
}

/// Outcome of a pipeline run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step ran (or was skipped) to the end.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}
