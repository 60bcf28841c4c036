//! Users and credential checks.
//!
//! Passwords are hashed with argon2id (random salt, PHC string format)
//! before they reach the store. The plaintext never leaves this module.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Serialize;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::storage::UserStore;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| Error::PasswordHash(err.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| Error::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Create a user. Fails with [`Error::Conflict`] if the name is taken.
    pub async fn register(&self, ctx: &Context, name: &str, password: &str) -> Result<User> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("user name cannot be empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::Validation("password cannot be empty".to_string()));
        }

        let store = Arc::clone(&self.store);
        let password = password.to_string();
        let result = ctx
            .run_blocking(move || {
                let hash = hash_password(&password)?;
                store.create_user(&name, &hash)
            })
            .await;

        match &result {
            Ok(user) => tracing::info!(user_id = user.id, "user registered"),
            Err(err) => tracing::error!(error = %err, "failed to register user"),
        }
        result
    }

    /// Check a name/password pair. An unknown name and a wrong password both
    /// yield [`Error::Unauthorized`].
    pub async fn authenticate(&self, ctx: &Context, name: &str, password: &str) -> Result<User> {
        let store = Arc::clone(&self.store);
        let name = name.trim().to_string();
        let password = password.to_string();
        ctx.run_blocking(move || {
            let user = store.find_user_by_name(&name)?.ok_or(Error::Unauthorized)?;
            if verify_password(&password, &user.password_hash)? {
                Ok(user)
            } else {
                Err(Error::Unauthorized)
            }
        })
        .await
    }
}
