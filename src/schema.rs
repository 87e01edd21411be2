use sqlx::PgPool;

use crate::models::CANONICAL_ROLES;

// Arbitrary key for the transaction-scoped advisory lock serializing concurrent startups.
const SCHEMA_LOCK_KEY: i64 = 0x7573_6572_726f_6c65;

const CREATE_TABLES: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id   BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    // Unset external ids are stored as NULL, which the UNIQUE constraints do not compare.
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          BIGSERIAL PRIMARY KEY,
        github_id   BIGINT UNIQUE,
        telegram_id BIGINT UNIQUE,
        full_name   TEXT NOT NULL DEFAULT '',
        group_name  TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        role_id BIGINT NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
];

/// initialize
///
/// Creates the `roles`, `users` and `user_roles` tables when absent and find-or-creates the
/// canonical roles. Idempotent, so it runs on every process start. Any error here is fatal
/// for the caller.
pub async fn initialize(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let mut created = 0;
    for name in CANONICAL_ROLES {
        let result = sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        created += result.rows_affected();
    }

    tx.commit().await?;

    tracing::info!(created_roles = created, "database schema ready");
    Ok(())
}
