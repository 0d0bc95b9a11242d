// tests/error_handling_tests.rs
mod common;
use common::*;
use rackflow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_pipeline_run_catches_handler_missing() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("missing", false, None)]);
  let result = pipeline.run(ContextData::new(TestContext::default())).await;
  match result.err().unwrap() {
    TestError::Flow(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("Expected TestError::Flow(HandlerMissing), got {:?}", other),
  }
}

// A pipeline whose error type is FlowError itself.
#[tokio::test]
#[serial]
async fn test_pipeline_with_flow_error_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, FlowError>::new(&[("task", false, None)]);
  pipeline.on_step("task", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().counter = 1;
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().counter, 1);

  let mut failing_pipeline = Pipeline::<TestContext, FlowError>::new(&[("fail_task", false, None)]);
  failing_pipeline.on_step("fail_task", |_ctx: ContextData<TestContext>| {
    Box::pin(async move { Err::<PipelineControl, FlowError>(FlowError::Internal("store offline".to_string())) })
  });

  let result = failing_pipeline.run(ContextData::new(TestContext::default())).await;
  match result {
    Err(FlowError::Internal(msg)) => assert_eq!(msg, "store offline"),
    other => panic!("Expected FlowError::Internal, got {:?}", other),
  }
}

#[test]
fn test_anyhow_conversion_preserves_flow_errors() {
  let wrapped = anyhow::Error::new(FlowError::StepNotFound {
    step_name: "recheck".to_string(),
  });
  match FlowError::from(wrapped) {
    FlowError::StepNotFound { step_name } => assert_eq!(step_name, "recheck"),
    other => panic!("Expected StepNotFound, got {:?}", other),
  }

  let foreign = anyhow::anyhow!("socket closed");
  match FlowError::from(foreign) {
    FlowError::HandlerError { source } => assert_eq!(source.to_string(), "socket closed"),
    other => panic!("Expected HandlerError, got {:?}", other),
  }
}

#[test]
fn test_compensation_failed_display_names_step() {
  let err = FlowError::CompensationFailed {
    step_name: "insert_enrollment".to_string(),
    attempts: 5,
    message: "connection reset".to_string(),
  };
  let text = err.to_string();
  assert!(text.contains("insert_enrollment"));
  assert!(text.contains("5"));
  assert!(text.contains("connection reset"));
}
