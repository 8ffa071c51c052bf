//! Database queries for permanent preferences.

use crate::models::Preference;

/// Insert or replace a preference.
pub async fn upsert_preference(
    pool: &sqlx::SqlitePool,
    name: &str,
    value: &str,
    expires_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO preferences (name, value, expires_at, updated_at)
        VALUES (?, ?, ?, strftime('%s', 'now'))
        ON CONFLICT(name) DO UPDATE SET
            value = excluded.value,
            expires_at = excluded.expires_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(name)
    .bind(value)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a preference regardless of expiry.
pub async fn get_preference(
    pool: &sqlx::SqlitePool,
    name: &str,
) -> Result<Option<Preference>, sqlx::Error> {
    sqlx::query_as::<_, Preference>(
        "SELECT name, value, expires_at FROM preferences WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn delete_preference(pool: &sqlx::SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM preferences WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove every preference that expired at or before `now`.
pub async fn purge_expired(pool: &sqlx::SqlitePool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM preferences WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
