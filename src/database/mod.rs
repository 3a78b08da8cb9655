pub mod manager;
pub mod models;

pub use manager::{DatabaseManager, DatabaseError};

/// True when an error is a Postgres unique-constraint violation (23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
