// tests/reservation_tests.rs
mod common;

use chrono::Duration;
use common::*;
use marketplace::clock::Clock;
use marketplace::errors::AppError;
use marketplace::models::reservation::{MAX_RESERVATION_COUNT, RESERVATION_WINDOW};
use marketplace::models::{status_of, ItemStatus, ReservationStatus, SweepReport};
use marketplace::services::reservation_engine;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_add_to_cart_reserves_for_fifteen_minutes() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  let buyer = Uuid::new_v4();

  let reservation = reservation_engine::add_to_cart(&app.state, buyer, item_id).await.unwrap();

  assert_eq!(reservation.item_id, item_id);
  assert_eq!(reservation.reservation_count, 1);
  assert_eq!(reservation.expires_at - reservation.reserved_at, RESERVATION_WINDOW);
  assert_eq!(status_of(&reservation, app.clock.now()), ReservationStatus::Active);
}

#[tokio::test]
#[serial]
async fn test_second_buyer_gets_already_reserved() {
  let app = TestApp::new();
  let item_id = app.seed_item();

  reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), item_id).await.unwrap();
  let err = reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), item_id).await.unwrap_err();

  assert!(matches!(err, AppError::AlreadyReserved));
  assert!(err.retryable());
}

#[tokio::test]
#[serial]
async fn test_unknown_and_unavailable_items_are_rejected() {
  let app = TestApp::new();
  let sold = app.seed_item_with_status(ItemStatus::Sold);

  let err = reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), sold).await.unwrap_err();
  assert!(matches!(err, AppError::ItemNotAvailable));

  let missing = Uuid::new_v4();
  let err = reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), missing).await.unwrap_err();
  assert!(matches!(err, AppError::ItemNotFound(id) if id == missing));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_adds_admit_exactly_one_buyer() {
  let app = TestApp::new();
  let item_id = app.seed_item();

  let attempts: Vec<_> = (0..16)
    .map(|_| {
      let state = app.state.clone();
      tokio::spawn(async move { reservation_engine::add_to_cart(&state, Uuid::new_v4(), item_id).await })
    })
    .collect();

  let mut admitted = 0;
  for attempt in attempts {
    match attempt.await.unwrap() {
      Ok(_) => admitted += 1,
      Err(AppError::AlreadyReserved) => {}
      Err(other) => panic!("unexpected error: {:?}", other),
    }
  }

  assert_eq!(admitted, 1);
  let live: Vec<_> = app
    .store
    .reservations_for_item(item_id)
    .into_iter()
    .filter(|r| !r.auto_removed)
    .collect();
  assert_eq!(live.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_extension_is_bounded_regardless_of_remaining_time() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  let buyer = Uuid::new_v4();
  let reservation = reservation_engine::add_to_cart(&app.state, buyer, item_id).await.unwrap();

  let first = reservation_engine::extend_reservation(&app.state, buyer, reservation.id).await.unwrap();
  assert_eq!(first.reservation_count, 2);
  app.clock.advance(Duration::minutes(1));
  let second = reservation_engine::extend_reservation(&app.state, buyer, reservation.id).await.unwrap();
  assert_eq!(second.reservation_count, MAX_RESERVATION_COUNT);
  assert_eq!(second.expires_at, app.clock.now() + RESERVATION_WINDOW);

  // Plenty of time left, but the budget is spent.
  let err = reservation_engine::extend_reservation(&app.state, buyer, reservation.id).await.unwrap_err();
  assert!(matches!(err, AppError::MaxExtensionsReached));
}

#[tokio::test]
#[serial]
async fn test_expired_reservation_cannot_be_extended() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  let buyer = Uuid::new_v4();
  let reservation = reservation_engine::add_to_cart(&app.state, buyer, item_id).await.unwrap();

  app.clock.advance(RESERVATION_WINDOW);
  let err = reservation_engine::extend_reservation(&app.state, buyer, reservation.id).await.unwrap_err();
  assert!(matches!(err, AppError::AlreadyExpired));
}

#[tokio::test]
#[serial]
async fn test_only_the_owning_buyer_may_extend_or_remove() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  let owner = Uuid::new_v4();
  let stranger = Uuid::new_v4();
  let reservation = reservation_engine::add_to_cart(&app.state, owner, item_id).await.unwrap();
  // The stranger has a cart of their own.
  reservation_engine::add_to_cart(&app.state, stranger, app.seed_item()).await.unwrap();

  let err = reservation_engine::extend_reservation(&app.state, stranger, reservation.id).await.unwrap_err();
  assert!(matches!(err, AppError::NotOwner));
  let err = reservation_engine::remove_from_cart(&app.state, stranger, reservation.id).await.unwrap_err();
  assert!(matches!(err, AppError::NotOwner));

  reservation_engine::remove_from_cart(&app.state, owner, reservation.id).await.unwrap();
  let err = reservation_engine::remove_from_cart(&app.state, owner, reservation.id).await.unwrap_err();
  assert!(matches!(err, AppError::ReservationNotFound(_)));
}

#[tokio::test]
#[serial]
async fn test_status_moves_forward_as_time_passes() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  let buyer = Uuid::new_v4();
  reservation_engine::add_to_cart(&app.state, buyer, item_id).await.unwrap();

  let mut seen = Vec::new();
  for _ in 0..16 {
    let cart = reservation_engine::view_cart(&app.state, buyer).await.unwrap();
    seen.push(cart[0].status);
    app.clock.advance(Duration::minutes(1));
  }

  assert!(seen.windows(2).all(|w| w[0] <= w[1]));
  assert_eq!(seen.first(), Some(&ReservationStatus::Active));
  assert!(seen.contains(&ReservationStatus::Expiring));
  assert_eq!(seen.last(), Some(&ReservationStatus::Expired));
}

#[tokio::test]
#[serial]
async fn test_expired_item_is_released_to_the_next_buyer_after_sweep() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  let buyer_1 = Uuid::new_v4();
  let buyer_2 = Uuid::new_v4();

  let held = reservation_engine::add_to_cart(&app.state, buyer_1, item_id).await.unwrap();
  let err = reservation_engine::add_to_cart(&app.state, buyer_2, item_id).await.unwrap_err();
  assert!(matches!(err, AppError::AlreadyReserved));

  app.clock.advance(RESERVATION_WINDOW);
  assert_eq!(status_of(&held, app.clock.now()), ReservationStatus::Expired);

  let report = reservation_engine::sweep_expired(&app.state).await.unwrap();
  assert_eq!(report, SweepReport { expired: 1, purged: 0 });
  let again = reservation_engine::sweep_expired(&app.state).await.unwrap();
  assert_eq!(again, SweepReport::default());

  let taken = reservation_engine::add_to_cart(&app.state, buyer_2, item_id).await.unwrap();
  assert_ne!(taken.cart_id, held.cart_id);

  let buyer_1_cart = reservation_engine::view_cart(&app.state, buyer_1).await.unwrap();
  assert!(buyer_1_cart.iter().all(|v| v.status == ReservationStatus::Expired && !v.can_extend));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_sweep_racing_extensions_at_the_boundary_keeps_extended_rows() {
  let app = TestApp::new();
  let buyer = Uuid::new_v4();
  let mut reservations = Vec::new();
  for _ in 0..8 {
    let item_id = app.seed_item();
    reservations.push(reservation_engine::add_to_cart(&app.state, buyer, item_id).await.unwrap());
  }
  // One millisecond of life left on every row.
  app.clock.advance(RESERVATION_WINDOW - Duration::milliseconds(1));

  let sweeps: Vec<_> = (0..4)
    .map(|_| {
      let state = app.state.clone();
      tokio::spawn(async move { reservation_engine::sweep_expired(&state).await })
    })
    .collect();
  let extensions: Vec<_> = reservations
    .iter()
    .map(|r| {
      let state = app.state.clone();
      let reservation_id = r.id;
      tokio::spawn(async move { reservation_engine::extend_reservation(&state, buyer, reservation_id).await })
    })
    .collect();

  for extension in extensions {
    let extended = extension.await.unwrap().unwrap();
    assert_eq!(extended.reservation_count, 2);
  }
  for sweep in sweeps {
    assert_eq!(sweep.await.unwrap().unwrap(), SweepReport { expired: 0, purged: 0 });
  }

  // Past the original deadline, inside the extended one.
  app.clock.advance(Duration::milliseconds(1));
  let report = reservation_engine::sweep_expired(&app.state).await.unwrap();
  assert_eq!(report, SweepReport { expired: 0, purged: 0 });
  for r in &reservations {
    let rows = app.store.reservations_for_item(r.item_id);
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].auto_removed);
    assert_eq!(status_of(&rows[0], app.clock.now()), ReservationStatus::Active);
  }
}

#[tokio::test]
#[serial]
async fn test_sweep_purges_removed_rows_after_retention() {
  let app = TestApp::new();
  let item_id = app.seed_item();
  reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), item_id).await.unwrap();

  app.clock.advance(RESERVATION_WINDOW);
  assert_eq!(reservation_engine::sweep_expired(&app.state).await.unwrap().expired, 1);

  app.clock.advance(Duration::hours(24));
  let report = reservation_engine::sweep_expired(&app.state).await.unwrap();
  assert_eq!(report, SweepReport { expired: 0, purged: 1 });
  assert!(app.store.reservations_for_item(item_id).is_empty());
}

#[tokio::test]
#[serial]
async fn test_reads_survive_transient_store_faults() {
  let app = TestApp::new();
  let item_id = app.seed_item();

  app.store.fail_next_reads(2);
  reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), item_id).await.unwrap();

  app.store.fail_next_reads(3);
  let err = reservation_engine::add_to_cart(&app.state, Uuid::new_v4(), app.seed_item()).await.unwrap_err();
  assert!(err.is_transient());
}
