use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{AppError, Result};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Profile text, at most 140 characters
    pub about_me: Option<String>,
}

impl User {
    /// Hash and store a new password
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = hash_password(password)?;
        Ok(())
    }

    /// Verify a password against the stored hash
    pub fn check_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Gravatar identicon URL for this user's e-mail
    pub fn avatar(&self, size: u32) -> String {
        let digest = Md5::digest(self.email.to_lowercase().as_bytes());
        format!(
            "https://www.gravatar.com/avatar/{:x}?d=identicon&s={}",
            digest, size
        )
    }
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Registration payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(length(max = 64), custom(function = "validate_username"))]
    pub username: String,

    #[validate(email, length(max = 120))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Profile edit payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditProfile {
    #[validate(length(max = 64), custom(function = "validate_username"))]
    pub username: String,

    #[validate(length(max = 140))]
    pub about_me: Option<String>,
}

/// Usernames are stored trimmed and travel in `user:password` Basic
/// credentials, so they must be non-blank and free of `:`
fn validate_username(username: &str) -> std::result::Result<(), ValidationError> {
    if username.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Username must not be blank".into());
        return Err(err);
    }
    if username.contains(':') {
        let mut err = ValidationError::new("colon");
        err.message = Some("Username must not contain ':'".into());
        return Err(err);
    }
    Ok(())
}
