// apps/marketplace/src/main.rs

use marketplace::clock::SystemClock;
use marketplace::config::{AppConfig, LogFormat, StoreBackend};
use marketplace::services::scheduler_auth;
use marketplace::state::AppState;
use marketplace::store::{MarketStore, MemoryStore, PgStore, ReservationStore};
use marketplace::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use std::io::Read;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Pretty => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

/// `marketplace_server hash-token` reads a secret from stdin and prints the
/// value to put in `SCHEDULER_TOKEN_HASH`.
fn hash_token_from_stdin() -> anyhow::Result<()> {
  let mut secret = String::new();
  std::io::stdin()
    .read_to_string(&mut secret)
    .context("reading secret from stdin")?;
  let hash = scheduler_auth::hash_secret(secret.trim_end_matches(['\r', '\n']))?;
  println!("{}", hash);
  Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  if std::env::args().nth(1).as_deref() == Some("hash-token") {
    return hash_token_from_stdin();
  }

  init_tracing(LogFormat::from_env()?);
  tracing::info!("Starting marketplace server...");

  let app_config = Arc::new(AppConfig::from_env().context("loading configuration")?);

  let (reservations, markets): (Arc<dyn ReservationStore>, Arc<dyn MarketStore>) = match app_config.store_backend {
    StoreBackend::Postgres => {
      let url = app_config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the postgres backend")?;
      let store = Arc::new(
        PgStore::connect(url, app_config.db_max_connections)
          .await
          .context("connecting to the database")?,
      );
      tracing::info!("Connected to the database.");
      (store.clone(), store)
    }
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory store; all data is lost on restart.");
      let store = Arc::new(MemoryStore::new());
      (store.clone(), store)
    }
  };

  let app_state = AppState::new(reservations, markets, Arc::new(SystemClock), app_config.clone());

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;
  Ok(())
}
