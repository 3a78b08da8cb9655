use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::is_unique_violation;
use crate::database::models::User;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an account. Emails are stored lowercased so lookups are
    /// case-insensitive.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserError> {
        let email = normalize_email(email);
        let password_hash = hash_password(password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                UserError::EmailTaken
            } else {
                UserError::Database(e)
            }
        })?;

        Ok(user)
    }

    /// Verify email/password. The missing-account and wrong-password cases
    /// are collapsed into one error so responses don't reveal which it was.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, UserError> {
        let email = normalize_email(email);

        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(UserError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User, UserError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(UserError::NotFound)
    }

    /// Rotate a password after re-verifying the current one.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        let user = self.get(user_id).await?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        let password_hash = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| UserError::Hash(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, UserError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| UserError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
