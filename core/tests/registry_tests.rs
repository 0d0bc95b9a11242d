// tests/registry_tests.rs
mod common;

use common::*;
use rackflow::{ContextData, FlowError, FlowRegistry, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextAlpha {
  val: String,
}
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextBeta {
  num: i32,
}

#[derive(Debug, thiserror::Error)]
enum BetaError {
  #[error("beta rejected: {0}")]
  Rejected(i32),
  #[error(transparent)]
  Flow(#[from] FlowError),
}

impl From<BetaError> for TestError {
  fn from(e: BetaError) -> Self {
    match e {
      BetaError::Rejected(n) => TestError::Handler(format!("beta {}", n)),
      BetaError::Flow(fe) => TestError::from(fe),
    }
  }
}

#[tokio::test]
#[serial]
async fn test_registry_runs_pipeline_for_context_type() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  let mut p_alpha = Pipeline::<RegistryContextAlpha, TestError>::new(&[("alpha_task", false, None)]);
  p_alpha.on_step("alpha_task", |ctx: ContextData<RegistryContextAlpha>| {
    Box::pin(async move {
      ctx.write().val = "alpha_processed".to_string();
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(p_alpha);

  let mut p_beta = Pipeline::<RegistryContextBeta, TestError>::new(&[("beta_task", false, None)]);
  p_beta.on_step("beta_task", |ctx: ContextData<RegistryContextBeta>| {
    Box::pin(async move {
      ctx.write().num = 100;
      Ok::<PipelineControl, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(p_beta);

  assert!(registry.is_registered::<RegistryContextAlpha>());
  assert!(registry.is_registered::<RegistryContextBeta>());

  let ctx_alpha = ContextData::new(RegistryContextAlpha::default());
  assert_eq!(registry.run(ctx_alpha.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_alpha.read().val, "alpha_processed");

  let ctx_beta = ContextData::new(RegistryContextBeta::default());
  assert_eq!(registry.run(ctx_beta.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx_beta.read().num, 100);
}

#[tokio::test]
#[serial]
async fn test_registry_pipeline_not_found() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  #[derive(Clone, Debug, Default)]
  struct UnregisteredContext;

  assert!(!registry.is_registered::<UnregisteredContext>());
  let result = registry.run(ContextData::new(UnregisteredContext)).await;

  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("ConfigurationError"));
      assert!(s.contains("No pipeline registered"));
      assert!(s.contains("UnregisteredContext"));
    }
    other => panic!("Expected ConfigurationError for unregistered pipeline, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_registry_converts_pipeline_error_into_app_error() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  let mut p_beta = Pipeline::<RegistryContextBeta, BetaError>::new(&[("beta_task", false, None)]);
  p_beta.on_step("beta_task", |ctx: ContextData<RegistryContextBeta>| {
    Box::pin(async move {
      let num = ctx.read().num;
      Err::<PipelineControl, BetaError>(BetaError::Rejected(num))
    })
  });
  registry.register_pipeline(p_beta);

  let ctx = ContextData::new(RegistryContextBeta { num: 7 });
  let result = registry.run(ctx).await;
  assert_eq!(result.unwrap_err(), TestError::Handler("beta 7".to_string()));
}

#[tokio::test]
#[serial]
async fn test_registry_replaces_pipeline_on_reregistration() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  for value in ["first", "second"] {
    let mut p = Pipeline::<RegistryContextAlpha, TestError>::new(&[("task", false, None)]);
    p.on_step("task", move |ctx: ContextData<RegistryContextAlpha>| async move {
      ctx.write().val = value.to_string();
      Ok::<_, TestError>(PipelineControl::Continue)
    });
    registry.register_pipeline(p);
  }

  let ctx = ContextData::new(RegistryContextAlpha::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().val, "second");
}
