// apps/marketplace/src/services/scheduler_auth.rs

//! Shared-secret authentication for the external scheduler. Only an Argon2
//! PHC hash of the secret is configured on the server.

use crate::errors::AppError;
use argon2::{
  password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use rand_core::OsRng;
use tracing::{debug, error, instrument};

/// Hashes `secret` into the PHC string stored in `SCHEDULER_TOKEN_HASH`.
#[instrument(name = "scheduler_auth::hash_secret", skip(secret), err(Display))]
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
  if secret.is_empty() {
    return Err(AppError::Validation("Scheduler secret cannot be empty.".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(secret.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|argon_err| {
      error!(error = %argon_err, "Argon2 hashing failed.");
      AppError::Internal(format!("Secret hashing failed: {}", argon_err))
    })
}

/// Checks a presented bearer secret against the configured hash.
///
/// A malformed configured hash is an internal error, not a failed login.
#[instrument(name = "scheduler_auth::verify_secret", skip_all, err(Display))]
pub fn verify_secret(stored_hash: &str, presented: &str) -> Result<bool, AppError> {
  if presented.is_empty() {
    return Ok(false);
  }

  let parsed_hash = PasswordHash::new(stored_hash).map_err(|parse_err| {
    error!(error = %parse_err, "SCHEDULER_TOKEN_HASH is not a valid PHC string.");
    AppError::Config(format!("Invalid scheduler token hash: {}", parse_err))
  })?;

  match Argon2::default().verify_password(presented.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Scheduler secret mismatch.");
      Ok(false)
    }
    Err(other) => {
      error!(error = %other, "Argon2 verification encountered an error.");
      Err(AppError::Internal(format!("Secret verification failed: {}", other)))
    }
  }
}
