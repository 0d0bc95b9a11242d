// apps/marketplace/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

impl FromStr for StoreBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "postgres" => Ok(StoreBackend::Postgres),
      "memory" => Ok(StoreBackend::Memory),
      other => Err(AppError::Config(format!(
        "Invalid STORE_BACKEND '{}', expected 'postgres' or 'memory'",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl LogFormat {
  /// Reads `LOG_FORMAT` (`pretty` or `json`). Needed before the rest of the
  /// config, so the subscriber is up when config loading logs.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    match env::var("LOG_FORMAT").ok().map(|v| v.trim().to_ascii_lowercase()).as_deref() {
      None | Some("") | Some("pretty") => Ok(LogFormat::Pretty),
      Some("json") => Ok(LogFormat::Json),
      Some(other) => Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub db_max_connections: u32,

  /// Argon2 PHC hash of the bearer secret the external scheduler presents.
  pub scheduler_token_hash: Option<String>,
  /// Header the upstream auth proxy uses to pass the authenticated user id.
  pub auth_user_header: String,

  pub read_retry_max: usize,
  pub read_retry_delay_ms: u64,
  /// Backoff ceiling for compensations, which retry until they succeed.
  pub compensation_max_delay_ms: u64,
  pub log_format: LogFormat,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      store_backend: StoreBackend::Memory,
      database_url: None,
      db_max_connections: 10,
      scheduler_token_hash: None,
      auth_user_header: "X-User-ID".to_string(),
      read_retry_max: 2,
      read_retry_delay_ms: 25,
      compensation_max_delay_ms: 2_000,
      log_format: LogFormat::Pretty,
    }
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let defaults = Self::default();
    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    fn parse<T: FromStr>(var_name: &str, raw: Option<String>, default: T) -> Result<T>
    where
      T::Err: std::fmt::Display,
    {
      match raw {
        Some(value) => value
          .trim()
          .parse::<T>()
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
        None => Ok(default),
      }
    }

    let server_host = get_env("SERVER_HOST").unwrap_or(defaults.server_host);
    let server_port = parse("SERVER_PORT", get_env("SERVER_PORT"), defaults.server_port)?;
    let store_backend = parse("STORE_BACKEND", get_env("STORE_BACKEND"), StoreBackend::Postgres)?;
    let database_url = get_env("DATABASE_URL");
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required when STORE_BACKEND=postgres)".to_string(),
      ));
    }
    let db_max_connections = parse("DB_MAX_CONNECTIONS", get_env("DB_MAX_CONNECTIONS"), defaults.db_max_connections)?;
    let scheduler_token_hash = get_env("SCHEDULER_TOKEN_HASH");
    if scheduler_token_hash.is_none() {
      tracing::warn!("SCHEDULER_TOKEN_HASH is not set; internal sweep endpoints will reject every request.");
    }
    let auth_user_header = get_env("AUTH_USER_HEADER").unwrap_or(defaults.auth_user_header);
    let read_retry_max = parse("READ_RETRY_MAX", get_env("READ_RETRY_MAX"), defaults.read_retry_max)?;
    let read_retry_delay_ms = parse(
      "READ_RETRY_DELAY_MS",
      get_env("READ_RETRY_DELAY_MS"),
      defaults.read_retry_delay_ms,
    )?;
    let compensation_max_delay_ms = parse(
      "COMPENSATION_MAX_DELAY_MS",
      get_env("COMPENSATION_MAX_DELAY_MS"),
      defaults.compensation_max_delay_ms,
    )?;
    let log_format = LogFormat::from_env()?;

    tracing::info!(?store_backend, "Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      db_max_connections,
      scheduler_token_hash,
      auth_user_header,
      read_retry_max,
      read_retry_delay_ms,
      compensation_max_delay_ms,
      log_format,
    })
  }

  pub fn read_retry_policy(&self) -> rackflow::RetryPolicy {
    rackflow::RetryPolicy::default()
      .with_max_retries(self.read_retry_max)
      .with_initial_delay(std::time::Duration::from_millis(self.read_retry_delay_ms))
  }

  /// Compensations undo a write that already landed, so they never give up.
  pub fn compensation_policy(&self) -> rackflow::RetryPolicy {
    rackflow::RetryPolicy::until_success()
      .with_initial_delay(std::time::Duration::from_millis(self.read_retry_delay_ms))
      .with_max_delay(std::time::Duration::from_millis(self.compensation_max_delay_ms))
  }
}
