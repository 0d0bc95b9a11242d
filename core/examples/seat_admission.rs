// rackflow/examples/seat_admission.rs

//! Admits sellers into a fixed number of seats with check, claim, re-check
//! and compensate. Several admissions race; the re-check hands back every
//! claim ranked past capacity.

use parking_lot::Mutex;
use rackflow::{ContextData, FlowError, Pipeline, PipelineControl, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const SEATS: usize = 2;

#[derive(Debug, thiserror::Error)]
enum SeatError {
  #[error("no seat left")]
  Full,
  #[error(transparent)]
  Flow(#[from] FlowError),
}

/// Claimed seats in claim order.
type Seats = Arc<Mutex<Vec<String>>>;

struct SeatCtx {
  seller: String,
  seats: Seats,
  claimed: bool,
}

fn seat_pipeline() -> Pipeline<SeatCtx, SeatError> {
  let mut p = Pipeline::<SeatCtx, SeatError>::new(&[
    ("check", false, None),
    ("claim", false, None),
    ("recheck", false, None),
  ]);

  p.on_step("check", |ctx: ContextData<SeatCtx>| async move {
    let full = ctx.get(|c| c.seats.lock().len() >= SEATS);
    if full {
      return Err(SeatError::Full);
    }
    Ok(PipelineControl::Continue)
  });

  p.on_step("claim", |ctx: ContextData<SeatCtx>| async move {
    // Let every racer pass its check before anyone claims.
    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.update(|c| {
      c.seats.lock().push(c.seller.clone());
      c.claimed = true;
    });
    Ok::<_, SeatError>(PipelineControl::Continue)
  });

  p.compensate("claim", |ctx: ContextData<SeatCtx>| async move {
    ctx.update(|c| {
      c.seats.lock().retain(|s| s != &c.seller);
      c.claimed = false;
      info!(seller = %c.seller, "Seat handed back.");
    });
    Ok::<_, SeatError>(())
  });

  p.on_step("recheck", |ctx: ContextData<SeatCtx>| async move {
    let rank = ctx.get(|c| c.seats.lock().iter().position(|s| s == &c.seller).map(|i| i + 1));
    match rank {
      Some(rank) if rank <= SEATS => Ok(PipelineControl::Continue),
      _ => Err(SeatError::Full),
    }
  });

  p.set_compensation_policy(RetryPolicy::default().with_max_retries(3));
  p
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  let pipeline = Arc::new(seat_pipeline());
  let seats: Seats = Arc::new(Mutex::new(Vec::new()));

  let runs: Vec<_> = ["ada", "bo", "cy", "dee"]
    .into_iter()
    .map(|seller| {
      let pipeline = pipeline.clone();
      let ctx = ContextData::new(SeatCtx {
        seller: seller.to_string(),
        seats: seats.clone(),
        claimed: false,
      });
      tokio::spawn(async move {
        let outcome = pipeline.run(ctx.clone()).await;
        (seller, outcome.map(|_| ctx.read().claimed))
      })
    })
    .collect();

  for run in runs {
    match run.await {
      Ok((seller, Ok(claimed))) => info!(seller, claimed, "Admitted."),
      Ok((seller, Err(e))) => info!(seller, error = %e, "Rejected."),
      Err(e) => info!(error = %e, "Admission task panicked."),
    }
  }
  info!(seats = ?seats.lock(), "Final seating.");
}
