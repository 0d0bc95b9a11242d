// apps/marketplace/src/store/memory.rs

//! In-process store with the same atomicity as the Postgres schema: every
//! trait call runs under one table lock, so each call is a single atomic step.
//! Backs the test-suite and `STORE_BACKEND=memory` local runs.
//!
//! Enrollment and rental inserts also hold a per-market admission lock from
//! `seq` assignment until the row is published, mirroring the market row
//! lock the Postgres store takes. `stall_next_commit` widens that window.

use super::{Inserted, MarketStore, ReservationStore};
use crate::errors::{AppError, Result};
use crate::models::{Cart, CartReservation, HangerRental, Item, Market, MarketEnrollment, RentalStatus, Seller};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  items: HashMap<Uuid, Item>,
  sellers: HashMap<Uuid, Seller>,
  markets: HashMap<Uuid, Market>,
  carts_by_buyer: HashMap<Uuid, Cart>,
  reservations: HashMap<Uuid, CartReservation>,
  enrollments: Vec<MarketEnrollment>,
  rentals: HashMap<Uuid, HangerRental>,
  last_seq: i64,
}

impl Tables {
  fn next_seq(&mut self) -> i64 {
    self.last_seq += 1;
    self.last_seq
  }

  fn live_hangers(&self, market_id: Uuid, through_seq: Option<i64>) -> i64 {
    self
      .rentals
      .values()
      .filter(|r| r.market_id == market_id && r.status.holds_capacity())
      .filter(|r| through_seq.map_or(true, |seq| r.seq <= seq))
      .map(|r| i64::from(r.hanger_count))
      .sum()
  }
}

#[derive(Default)]
struct Faults {
  reads: usize,
  deletes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
  faults: Mutex<Faults>,
  insert_gate: Mutex<Option<Arc<Barrier>>>,
  increase_gate: Mutex<Option<Arc<Barrier>>>,
  admission_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
  commit_stall: Mutex<Option<Duration>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn seed_item(&self, item: Item) {
    self.tables.lock().items.insert(item.id, item);
  }

  pub fn seed_seller(&self, seller: Seller) {
    self.tables.lock().sellers.insert(seller.id, seller);
  }

  pub fn seed_market(&self, market: Market) {
    self.tables.lock().markets.insert(market.id, market);
  }

  /// The next `n` reads fail with a transient store error.
  pub fn fail_next_reads(&self, n: usize) {
    self.faults.lock().reads = n;
  }

  /// The next `n` deletes fail with a transient store error.
  pub fn fail_next_deletes(&self, n: usize) {
    self.faults.lock().deletes = n;
  }

  /// Every enrollment and rental insert waits on `gate` first. Lets a test
  /// hold concurrent admissions until all of them have passed their pre-checks.
  pub fn gate_inserts(&self, gate: Arc<Barrier>) {
    *self.insert_gate.lock() = Some(gate);
  }

  /// Every rental count increase waits on `gate` first. Decreases, including
  /// the restore of a rejected increase, pass straight through.
  pub fn gate_increases(&self, gate: Arc<Barrier>) {
    *self.increase_gate.lock() = Some(gate);
  }

  /// The next enrollment or rental insert takes `lag` between getting its
  /// `seq` and becoming visible, like a slow commit.
  pub fn stall_next_commit(&self, lag: Duration) {
    *self.commit_stall.lock() = Some(lag);
  }

  pub fn reservations_for_item(&self, item_id: Uuid) -> Vec<CartReservation> {
    let tables = self.tables.lock();
    tables.reservations.values().filter(|r| r.item_id == item_id).cloned().collect()
  }

  pub fn rentals_for_market(&self, market_id: Uuid) -> Vec<HangerRental> {
    let tables = self.tables.lock();
    let mut rentals: Vec<_> = tables.rentals.values().filter(|r| r.market_id == market_id).cloned().collect();
    rentals.sort_by_key(|r| r.seq);
    rentals
  }

  fn read_fault(&self) -> Result<()> {
    let mut faults = self.faults.lock();
    if faults.reads > 0 {
      faults.reads -= 1;
      return Err(AppError::StoreUnavailable("injected read fault".to_string()));
    }
    Ok(())
  }

  fn delete_fault(&self) -> Result<()> {
    let mut faults = self.faults.lock();
    if faults.deletes > 0 {
      faults.deletes -= 1;
      return Err(AppError::StoreUnavailable("injected delete fault".to_string()));
    }
    Ok(())
  }

  async fn pass_gate(gate: &Mutex<Option<Arc<Barrier>>>) {
    let gate = gate.lock().clone();
    if let Some(gate) = gate {
      gate.wait().await;
    }
  }

  fn admission_lock(&self, market_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
    self.admission_locks.lock().entry(market_id).or_default().clone()
  }

  async fn commit_lag(&self) {
    let lag = self.commit_stall.lock().take();
    if let Some(lag) = lag {
      tokio::time::sleep(lag).await;
    }
  }
}

#[async_trait]
impl ReservationStore for MemoryStore {
  async fn find_item(&self, item_id: Uuid) -> Result<Option<Item>> {
    self.read_fault()?;
    Ok(self.tables.lock().items.get(&item_id).cloned())
  }

  async fn find_cart(&self, buyer_id: Uuid) -> Result<Option<Cart>> {
    self.read_fault()?;
    Ok(self.tables.lock().carts_by_buyer.get(&buyer_id).cloned())
  }

  async fn find_or_create_cart(&self, buyer_id: Uuid, now: DateTime<Utc>) -> Result<Cart> {
    let mut tables = self.tables.lock();
    let cart = tables.carts_by_buyer.entry(buyer_id).or_insert_with(|| Cart {
      id: Uuid::new_v4(),
      buyer_id,
      created_at: now,
    });
    Ok(cart.clone())
  }

  async fn insert_reservation(&self, reservation: &CartReservation, now: DateTime<Utc>) -> Result<Inserted<CartReservation>> {
    let mut tables = self.tables.lock();
    let mut live = false;
    for existing in tables.reservations.values_mut() {
      if existing.item_id != reservation.item_id || existing.auto_removed {
        continue;
      }
      if existing.expires_at <= now {
        existing.auto_removed = true;
      } else {
        live = true;
      }
    }
    if live {
      return Ok(Inserted::Duplicate);
    }
    tables.reservations.insert(reservation.id, reservation.clone());
    Ok(Inserted::Created(reservation.clone()))
  }

  async fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<CartReservation>> {
    self.read_fault()?;
    Ok(self.tables.lock().reservations.get(&reservation_id).cloned())
  }

  async fn list_reservations(&self, cart_id: Uuid) -> Result<Vec<CartReservation>> {
    self.read_fault()?;
    let tables = self.tables.lock();
    let mut rows: Vec<_> = tables.reservations.values().filter(|r| r.cart_id == cart_id).cloned().collect();
    rows.sort_by_key(|r| r.reserved_at);
    Ok(rows)
  }

  async fn extend_reservation(
    &self,
    reservation_id: Uuid,
    now: DateTime<Utc>,
    new_expires_at: DateTime<Utc>,
    max_count: i32,
  ) -> Result<Option<CartReservation>> {
    let mut tables = self.tables.lock();
    let Some(row) = tables.reservations.get_mut(&reservation_id) else {
      return Ok(None);
    };
    if row.auto_removed || row.expires_at <= now || row.reservation_count >= max_count {
      return Ok(None);
    }
    row.expires_at = new_expires_at;
    row.reservation_count += 1;
    row.last_extended_at = Some(now);
    Ok(Some(row.clone()))
  }

  async fn delete_reservation(&self, reservation_id: Uuid) -> Result<bool> {
    self.delete_fault()?;
    Ok(self.tables.lock().reservations.remove(&reservation_id).is_some())
  }

  async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let mut tables = self.tables.lock();
    let mut marked = 0;
    for row in tables.reservations.values_mut() {
      if !row.auto_removed && row.expires_at <= now {
        row.auto_removed = true;
        marked += 1;
      }
    }
    Ok(marked)
  }

  async fn purge_removed(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let mut tables = self.tables.lock();
    let before = tables.reservations.len();
    tables.reservations.retain(|_, r| !(r.auto_removed && r.expires_at <= cutoff));
    Ok((before - tables.reservations.len()) as u64)
  }
}

#[async_trait]
impl MarketStore for MemoryStore {
  async fn find_seller(&self, seller_id: Uuid) -> Result<Option<Seller>> {
    self.read_fault()?;
    Ok(self.tables.lock().sellers.get(&seller_id).cloned())
  }

  async fn find_market(&self, market_id: Uuid) -> Result<Option<Market>> {
    self.read_fault()?;
    Ok(self.tables.lock().markets.get(&market_id).cloned())
  }

  async fn find_enrollment(&self, market_id: Uuid, seller_id: Uuid) -> Result<Option<MarketEnrollment>> {
    self.read_fault()?;
    let tables = self.tables.lock();
    Ok(
      tables
        .enrollments
        .iter()
        .find(|e| e.market_id == market_id && e.seller_id == seller_id)
        .cloned(),
    )
  }

  async fn count_enrollments(&self, market_id: Uuid) -> Result<i64> {
    self.read_fault()?;
    let tables = self.tables.lock();
    Ok(tables.enrollments.iter().filter(|e| e.market_id == market_id).count() as i64)
  }

  async fn enrollment_rank(&self, market_id: Uuid, seq: i64) -> Result<i64> {
    self.read_fault()?;
    let tables = self.tables.lock();
    Ok(
      tables
        .enrollments
        .iter()
        .filter(|e| e.market_id == market_id && e.seq <= seq)
        .count() as i64,
    )
  }

  async fn insert_enrollment(&self, market_id: Uuid, seller_id: Uuid, now: DateTime<Utc>) -> Result<Inserted<MarketEnrollment>> {
    Self::pass_gate(&self.insert_gate).await;
    let admission = self.admission_lock(market_id);
    let _held = admission.lock().await;

    let enrollment = {
      let mut tables = self.tables.lock();
      if tables
        .enrollments
        .iter()
        .any(|e| e.market_id == market_id && e.seller_id == seller_id)
      {
        return Ok(Inserted::Duplicate);
      }
      MarketEnrollment {
        id: Uuid::new_v4(),
        seq: tables.next_seq(),
        market_id,
        seller_id,
        enrolled_at: now,
      }
    };
    self.commit_lag().await;
    self.tables.lock().enrollments.push(enrollment.clone());
    Ok(Inserted::Created(enrollment))
  }

  async fn delete_enrollment(&self, enrollment_id: Uuid) -> Result<bool> {
    self.delete_fault()?;
    let mut tables = self.tables.lock();
    let before = tables.enrollments.len();
    tables.enrollments.retain(|e| e.id != enrollment_id);
    Ok(tables.enrollments.len() < before)
  }

  async fn live_hangers(&self, market_id: Uuid) -> Result<i64> {
    self.read_fault()?;
    Ok(self.tables.lock().live_hangers(market_id, None))
  }

  async fn hangers_through(&self, market_id: Uuid, seq: i64) -> Result<i64> {
    self.read_fault()?;
    Ok(self.tables.lock().live_hangers(market_id, Some(seq)))
  }

  async fn find_rental(&self, rental_id: Uuid) -> Result<Option<HangerRental>> {
    self.read_fault()?;
    Ok(self.tables.lock().rentals.get(&rental_id).cloned())
  }

  async fn find_open_rental(&self, market_id: Uuid, seller_id: Uuid) -> Result<Option<HangerRental>> {
    self.read_fault()?;
    let tables = self.tables.lock();
    Ok(
      tables
        .rentals
        .values()
        .find(|r| r.market_id == market_id && r.seller_id == seller_id && r.status.holds_capacity())
        .cloned(),
    )
  }

  async fn insert_rental(
    &self,
    market_id: Uuid,
    seller_id: Uuid,
    hanger_count: i32,
    now: DateTime<Utc>,
  ) -> Result<Inserted<HangerRental>> {
    Self::pass_gate(&self.insert_gate).await;
    let admission = self.admission_lock(market_id);
    let _held = admission.lock().await;

    let rental = {
      let mut tables = self.tables.lock();
      if tables
        .rentals
        .values()
        .any(|r| r.market_id == market_id && r.seller_id == seller_id && r.status.holds_capacity())
      {
        return Ok(Inserted::Duplicate);
      }
      HangerRental {
        id: Uuid::new_v4(),
        seq: tables.next_seq(),
        market_id,
        seller_id,
        hanger_count,
        status: RentalStatus::Pending,
        created_at: now,
        updated_at: now,
        confirmed_at: None,
        cancelled_at: None,
      }
    };
    self.commit_lag().await;
    self.tables.lock().rentals.insert(rental.id, rental.clone());
    Ok(Inserted::Created(rental))
  }

  async fn delete_rental(&self, rental_id: Uuid) -> Result<bool> {
    self.delete_fault()?;
    Ok(self.tables.lock().rentals.remove(&rental_id).is_some())
  }

  async fn update_rental_count(
    &self,
    rental_id: Uuid,
    seller_id: Uuid,
    expected_count: i32,
    new_count: i32,
    now: DateTime<Utc>,
  ) -> Result<Option<HangerRental>> {
    if new_count > expected_count {
      Self::pass_gate(&self.increase_gate).await;
    }
    let mut tables = self.tables.lock();
    match tables.rentals.get_mut(&rental_id) {
      Some(r) if r.seller_id == seller_id && r.status.holds_capacity() && r.hanger_count == expected_count => {
        r.hanger_count = new_count;
        r.updated_at = now;
        Ok(Some(r.clone()))
      }
      _ => Ok(None),
    }
  }

  async fn cancel_rental(&self, rental_id: Uuid, seller_id: Uuid, now: DateTime<Utc>) -> Result<Option<HangerRental>> {
    let mut tables = self.tables.lock();
    match tables.rentals.get_mut(&rental_id) {
      Some(r) if r.seller_id == seller_id && r.status.holds_capacity() => {
        r.status = RentalStatus::Cancelled;
        r.cancelled_at = Some(now);
        r.updated_at = now;
        Ok(Some(r.clone()))
      }
      _ => Ok(None),
    }
  }

  async fn confirm_rental(&self, rental_id: Uuid, now: DateTime<Utc>) -> Result<Option<HangerRental>> {
    let mut tables = self.tables.lock();
    match tables.rentals.get_mut(&rental_id) {
      Some(r) if r.status == RentalStatus::Pending => {
        r.status = RentalStatus::Confirmed;
        r.confirmed_at = Some(now);
        r.updated_at = now;
        Ok(Some(r.clone()))
      }
      _ => Ok(None),
    }
  }

  async fn cancel_overdue_rentals(&self, created_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
    let mut tables = self.tables.lock();
    let mut cancelled = 0;
    for r in tables.rentals.values_mut() {
      if r.status == RentalStatus::Pending && r.created_at < created_before {
        r.status = RentalStatus::Cancelled;
        r.cancelled_at = Some(now);
        r.updated_at = now;
        cancelled += 1;
      }
    }
    Ok(cancelled)
  }

  async fn refresh_counters(&self, market_id: Uuid) -> Result<()> {
    let mut tables = self.tables.lock();
    let vendors = tables.enrollments.iter().filter(|e| e.market_id == market_id).count();
    let hangers = tables.live_hangers(market_id, None);
    if let Some(market) = tables.markets.get_mut(&market_id) {
      market.current_vendors = i32::try_from(vendors).unwrap_or(i32::MAX);
      market.current_hangers = i32::try_from(hangers).unwrap_or(i32::MAX);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{CartReservation, MarketStatus};
  use chrono::Duration;

  fn market(max_vendors: i32, max_hangers: i32) -> Market {
    let now = Utc::now();
    Market {
      id: Uuid::new_v4(),
      name: "Flea".to_string(),
      status: MarketStatus::Active,
      max_vendors,
      max_hangers,
      hanger_price_cents: 500,
      starts_at: now,
      ends_at: now + Duration::hours(6),
      current_vendors: 0,
      current_hangers: 0,
    }
  }

  #[tokio::test]
  async fn insert_reservation_retires_expired_rows_for_the_item() {
    let store = MemoryStore::new();
    let t0 = Utc::now();
    let item_id = Uuid::new_v4();
    let first = CartReservation::new(Uuid::new_v4(), item_id, t0);
    assert!(matches!(store.insert_reservation(&first, t0).await.unwrap(), Inserted::Created(_)));

    let second = CartReservation::new(Uuid::new_v4(), item_id, t0);
    assert_eq!(store.insert_reservation(&second, t0).await.unwrap(), Inserted::Duplicate);

    let later = t0 + Duration::minutes(15);
    let third = CartReservation::new(Uuid::new_v4(), item_id, later);
    assert!(matches!(store.insert_reservation(&third, later).await.unwrap(), Inserted::Created(_)));
    let old = store.find_reservation(first.id).await.unwrap().unwrap();
    assert!(old.auto_removed);
  }

  #[tokio::test]
  async fn rank_and_prefix_sums_follow_seq() {
    let store = MemoryStore::new();
    let m = market(2, 10);
    store.seed_market(m.clone());
    let now = Utc::now();

    let Inserted::Created(a) = store.insert_enrollment(m.id, Uuid::new_v4(), now).await.unwrap() else {
      panic!("expected insert");
    };
    let Inserted::Created(b) = store.insert_enrollment(m.id, Uuid::new_v4(), now).await.unwrap() else {
      panic!("expected insert");
    };
    assert_eq!(store.enrollment_rank(m.id, a.seq).await.unwrap(), 1);
    assert_eq!(store.enrollment_rank(m.id, b.seq).await.unwrap(), 2);

    let Inserted::Created(r1) = store.insert_rental(m.id, a.seller_id, 4, now).await.unwrap() else {
      panic!("expected insert");
    };
    store.insert_rental(m.id, b.seller_id, 5, now).await.unwrap();
    assert_eq!(store.hangers_through(m.id, r1.seq).await.unwrap(), 4);
    assert_eq!(store.live_hangers(m.id).await.unwrap(), 9);

    store.refresh_counters(m.id).await.unwrap();
    let cached = store.find_market(m.id).await.unwrap().unwrap();
    assert_eq!((cached.current_vendors, cached.current_hangers), (2, 9));
  }

  #[tokio::test]
  async fn injected_faults_are_consumed() {
    let store = MemoryStore::new();
    store.fail_next_reads(1);
    assert!(store.find_market(Uuid::new_v4()).await.unwrap_err().is_transient());
    assert!(store.find_market(Uuid::new_v4()).await.unwrap().is_none());
  }
}
