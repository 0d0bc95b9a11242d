// tests/common/mod.rs
#![allow(dead_code)]

use rackflow::{ContextData, FlowError, PipelineControl};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

// --- Common Context Struct ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub compensated: Vec<String>,
  pub should_stop_at: Option<String>,
}

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Flow framework error: {0}")]
  Flow(String),

  #[error("Test handler failed: {0}")]
  Handler(String),

  #[error("Transient failure: {0}")]
  Transient(String),
}

impl TestError {
  pub fn is_transient(&self) -> bool {
    matches!(self, TestError::Transient(_))
  }
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(format!("{:?}", fe))
  }
}

// --- Common Handler Creators ---
pub fn create_simple_handler(step_name: &'static str, message_to_append: &'static str) -> rackflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name.to_string());
      if guard.should_stop_at.as_deref() == Some(step_name) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn create_failing_handler(step_name: &'static str, error_message: &'static str) -> rackflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      tracing::warn!(target: "test_handlers", step = %step_name, "failing with: '{}'", error_message);
      Err(TestError::Handler(error_message.to_string()))
    })
  })
}

/// Handler that fails with a transient error until it has been called `failures` times.
pub fn create_flaky_handler(step_name: &'static str, failures: usize, calls: Arc<AtomicUsize>) -> rackflow::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    let calls = calls.clone();
    Box::pin(async move {
      let attempt = calls.fetch_add(1, Ordering::SeqCst);
      if attempt < failures {
        return Err(TestError::Transient(format!("{} attempt {}", step_name, attempt)));
      }
      ctx.write().steps_executed.push(step_name.to_string());
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn create_recording_compensator(step_name: &'static str) -> impl Fn(ContextData<TestContext>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), TestError>> + Send>> + Send + Sync + 'static {
  move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().compensated.push(step_name.to_string());
      Ok(())
    })
  }
}

// --- Tracing Setup ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
