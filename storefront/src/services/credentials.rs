// storefront/src/services/credentials.rs

//! Admin password hashing and verification.
//!
//! Stored values come in three shapes. Fresh accounts carry
//! [`LEGACY_MARKER`] until their first sign-in, older accounts an unsalted
//! SHA-256 hex digest, and everything else an Argon2 PHC string. The first
//! two are rehashed to Argon2 after a successful sign-in.

use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, error, instrument, warn};

use crate::errors::{AppError, Result};

/// Placeholder stored for accounts that have never signed in.
pub const LEGACY_MARKER: &str = "legacy:default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredCredential<'a> {
  /// Only the configured migration password unlocks these.
  LegacyMarker,
  LegacySha256(&'a str),
  Argon2(&'a str),
  Unrecognized,
}

impl<'a> StoredCredential<'a> {
  pub fn classify(stored: &'a str) -> Self {
    if stored.is_empty() || stored == LEGACY_MARKER {
      StoredCredential::LegacyMarker
    } else if stored.starts_with("$argon2") {
      StoredCredential::Argon2(stored)
    } else if stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
      StoredCredential::LegacySha256(stored)
    } else {
      StoredCredential::Unrecognized
    }
  }

  pub fn is_legacy(&self) -> bool {
    matches!(self, StoredCredential::LegacyMarker | StoredCredential::LegacySha256(_))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
  Rejected,
  Accepted { needs_upgrade: bool },
}

/// Hashes a plain-text password using Argon2 with a random salt.
#[instrument(name = "credentials::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty.".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing process failed: {}", e))
    })
}

fn verify_argon2(stored: &str, provided: &str) -> Result<bool> {
  let parsed = PasswordHash::new(stored).map_err(|e| {
    error!(error = %e, "Failed to parse stored password hash string.");
    AppError::Internal(format!("Invalid stored password hash format: {}", e))
  })?;
  match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => Ok(false),
    Err(e) => {
      error!(error = %e, "Argon2 password verification process encountered an error.");
      Err(AppError::Internal(format!("Password verification process failed: {}", e)))
    }
  }
}

fn ct_str_eq(a: &str, b: &str) -> bool {
  a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Unsalted SHA-256 as lowercase hex; only used to read old rows.
pub fn legacy_sha256(password: &str) -> String {
  hex::encode(Sha256::digest(password.as_bytes()))
}

/// Checks `provided` against whatever shape `stored` has.
#[instrument(name = "credentials::verify_credential", skip_all, err(Display))]
pub fn verify_credential(stored: &str, provided: &str, migration_password: Option<&str>) -> Result<CredentialCheck> {
  if provided.is_empty() {
    return Ok(CredentialCheck::Rejected);
  }
  let credential = StoredCredential::classify(stored);
  let matched = match credential {
    StoredCredential::LegacyMarker => match migration_password {
      Some(expected) => ct_str_eq(expected, provided),
      None => {
        warn!("Account still carries the legacy marker but no migration password is configured.");
        false
      }
    },
    StoredCredential::LegacySha256(digest) => ct_str_eq(digest, &legacy_sha256(provided)),
    StoredCredential::Argon2(hash) => verify_argon2(hash, provided)?,
    StoredCredential::Unrecognized => {
      error!("Stored admin credential has an unrecognized format.");
      false
    }
  };
  debug!(matched, legacy = credential.is_legacy(), "Credential checked.");
  Ok(if matched {
    CredentialCheck::Accepted {
      needs_upgrade: credential.is_legacy(),
    }
  } else {
    CredentialCheck::Rejected
  })
}
