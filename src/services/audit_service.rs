use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::database::models::AuditEntry;

/// Insert-only audit trail. `record` takes any executor so callers can write
/// the audit row inside the same transaction as the mutation it describes.
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, org_id: Uuid, limit: i64) -> Result<Vec<AuditEntry>, sqlx::Error> {
        sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, org_id, actor_id, action, entity_type, entity_id, created_at
            FROM audit_logs
            WHERE org_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

pub async fn record<'e, E: PgExecutor<'e>>(
    executor: E,
    org_id: Uuid,
    actor_id: Option<Uuid>,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (org_id, actor_id, action, entity_type, entity_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(org_id)
    .bind(actor_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .execute(executor)
    .await?;

    Ok(())
}
