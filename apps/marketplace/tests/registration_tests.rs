// tests/registration_tests.rs
mod common;

use common::*;
use marketplace::errors::AppError;
use marketplace::models::MarketStatus;
use marketplace::services::capacity_allocator;
use marketplace::store::MarketStore;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Starts one registration per seller at the same time and collects the outcomes.
async fn register_concurrently(app: &TestApp, market_id: Uuid, sellers: &[Uuid]) -> Vec<Result<Uuid, AppError>> {
  let attempts: Vec<_> = sellers
    .iter()
    .map(|&seller_id| {
      let state = app.state.clone();
      tokio::spawn(async move {
        capacity_allocator::register_for_market(&state, market_id, seller_id)
          .await
          .map(|e| e.seller_id)
      })
    })
    .collect();

  let mut outcomes = Vec::new();
  for attempt in attempts {
    outcomes.push(attempt.await.unwrap());
  }
  outcomes
}

#[tokio::test]
#[serial]
async fn test_registration_claims_a_seat() {
  let app = TestApp::new();
  let market_id = app.seed_market(3, 10);
  let seller_id = app.seed_seller();

  let enrollment = capacity_allocator::register_for_market(&app.state, market_id, seller_id).await.unwrap();

  assert_eq!(enrollment.market_id, market_id);
  assert_eq!(enrollment.seller_id, seller_id);
  let availability = capacity_allocator::market_availability(&app.state, market_id).await.unwrap();
  assert_eq!(availability.vendors, 1);
  assert_eq!(availability.vendor_seats_left, 2);
  // Advisory counters follow on the optional refresh step.
  let market = app.store.find_market(market_id).await.unwrap().unwrap();
  assert_eq!(market.current_vendors, 1);
}

#[tokio::test]
#[serial]
async fn test_registration_preconditions() {
  let app = TestApp::new();
  let market_id = app.seed_market(3, 10);
  let inactive = app.seed_seller_with(false);
  let seller_id = app.seed_seller();

  let err = capacity_allocator::register_for_market(&app.state, market_id, inactive).await.unwrap_err();
  assert!(matches!(err, AppError::NotActiveSeller));

  let err = capacity_allocator::register_for_market(&app.state, market_id, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, AppError::NotActiveSeller));

  let unknown_market = Uuid::new_v4();
  let err = capacity_allocator::register_for_market(&app.state, unknown_market, seller_id).await.unwrap_err();
  assert!(matches!(err, AppError::MarketNotFound(id) if id == unknown_market));

  let draft = app.seed_market_with(3, 10, MarketStatus::Draft);
  let err = capacity_allocator::register_for_market(&app.state, draft, seller_id).await.unwrap_err();
  assert!(matches!(err, AppError::MarketNotOpen));

  capacity_allocator::register_for_market(&app.state, market_id, seller_id).await.unwrap();
  let err = capacity_allocator::register_for_market(&app.state, market_id, seller_id).await.unwrap_err();
  assert!(matches!(err, AppError::AlreadyRegistered));
}

#[tokio::test]
#[serial]
async fn test_full_market_rejects_before_writing() {
  let app = TestApp::new();
  let market_id = app.seed_market(1, 10);
  let first = app.seed_seller();
  let second = app.seed_seller();

  capacity_allocator::register_for_market(&app.state, market_id, first).await.unwrap();
  let err = capacity_allocator::register_for_market(&app.state, market_id, second).await.unwrap_err();

  assert!(matches!(err, AppError::MarketFull));
  assert_eq!(app.store.count_enrollments(market_id).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_full_hanger_pool_vetoes_registration() {
  let app = TestApp::new();
  let market_id = app.seed_market(5, 4);
  let renter = app.seed_seller();
  let latecomer = app.seed_seller();

  capacity_allocator::register_for_market(&app.state, market_id, renter).await.unwrap();
  capacity_allocator::create_hanger_rental(&app.state, market_id, renter, 4).await.unwrap();

  let err = capacity_allocator::register_for_market(&app.state, market_id, latecomer).await.unwrap_err();
  assert!(matches!(err, AppError::MarketFull));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_three_sellers_racing_for_two_seats() {
  let app = TestApp::new();
  let market_id = app.seed_market(2, 10);
  let sellers: Vec<Uuid> = (0..3).map(|_| app.seed_seller()).collect();
  // Every racer passes its pre-check before anyone inserts.
  app.store.gate_inserts(Arc::new(Barrier::new(sellers.len())));

  let outcomes = register_concurrently(&app, market_id, &sellers).await;

  let admitted = outcomes.iter().filter(|o| o.is_ok()).count();
  let full = outcomes.iter().filter(|o| matches!(o, Err(AppError::MarketFull))).count();
  assert_eq!((admitted, full), (2, 1));
  assert_eq!(app.store.count_enrollments(market_id).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_exactly_k_admitted_under_contention() {
  let app = TestApp::new();
  let market_id = app.seed_market(4, 100);
  let sellers: Vec<Uuid> = (0..12).map(|_| app.seed_seller()).collect();
  app.store.gate_inserts(Arc::new(Barrier::new(sellers.len())));

  let outcomes = register_concurrently(&app, market_id, &sellers).await;

  let mut admitted: Vec<Uuid> = outcomes.into_iter().filter_map(Result::ok).collect();
  assert_eq!(admitted.len(), 4);
  // No overshooting row outlives its compensation.
  assert_eq!(app.store.count_enrollments(market_id).await.unwrap(), 4);
  admitted.sort();
  for seller_id in admitted {
    assert!(app.store.find_enrollment(market_id, seller_id).await.unwrap().is_some());
  }
}

#[tokio::test]
#[serial]
async fn test_transient_read_faults_are_retried() {
  let app = TestApp::new();
  let market_id = app.seed_market(2, 10);
  let seller_id = app.seed_seller();

  app.store.fail_next_reads(2);
  capacity_allocator::register_for_market(&app.state, market_id, seller_id).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_failed_compensation_delete_is_retried() {
  let app = TestApp::new();
  let market_id = app.seed_market(1, 10);
  let sellers = [app.seed_seller(), app.seed_seller()];
  app.store.gate_inserts(Arc::new(Barrier::new(sellers.len())));
  app.store.fail_next_deletes(1);

  let outcomes = register_concurrently(&app, market_id, &sellers).await;

  assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
  assert!(outcomes.iter().any(|o| matches!(o, Err(AppError::MarketFull))));
  assert_eq!(app.store.count_enrollments(market_id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_compensation_outlasts_a_store_outage() {
  let app = TestApp::new();
  let market_id = app.seed_market(1, 10);
  let sellers = [app.seed_seller(), app.seed_seller()];
  app.store.gate_inserts(Arc::new(Barrier::new(sellers.len())));
  // Far more failures than the read retry budget allows.
  app.store.fail_next_deletes(25);

  let outcomes = register_concurrently(&app, market_id, &sellers).await;

  assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
  for (seller_id, outcome) in sellers.iter().zip(&outcomes) {
    if outcome.is_err() {
      assert!(matches!(outcome, Err(AppError::MarketFull)));
      assert!(app.store.find_enrollment(market_id, *seller_id).await.unwrap().is_none());
    }
  }
  assert_eq!(app.store.count_enrollments(market_id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_slow_commit_of_an_earlier_claim_cannot_over_admit() {
  let app = TestApp::new();
  let market_id = app.seed_market(1, 10);
  let sellers = [app.seed_seller(), app.seed_seller()];
  app.store.gate_inserts(Arc::new(Barrier::new(sellers.len())));
  // The lowest seq stays invisible well past the other racer's insert.
  app.store.stall_next_commit(Duration::from_millis(50));

  let outcomes = register_concurrently(&app, market_id, &sellers).await;

  assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
  assert!(outcomes.iter().any(|o| matches!(o, Err(AppError::MarketFull))));
  assert_eq!(app.store.count_enrollments(market_id).await.unwrap(), 1);
}
