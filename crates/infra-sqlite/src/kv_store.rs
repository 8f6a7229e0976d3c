// SQLite KeyValueStore Implementation
// Hash-per-key storage with lazy expiry, shared by every process using the file

use async_trait::async_trait;
use mirrorcheck_core::error::{AppError, Result};
use mirrorcheck_core::port::{KeyValueStore, TimeProvider};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "5" => AppError::Store(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => AppError::Store(format!("Database full: {}", db_err.message())),
                other => AppError::Store(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => AppError::Store(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Store("Row not found".to_string()),
        sqlx::Error::PoolTimedOut => AppError::Store("Connection pool timed out".to_string()),
        // Connection, pool, protocol errors
        _ => AppError::Store(err.to_string()),
    }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` prefix match
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn expiry_at(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

/// Key/value store backed by SQLite.
///
/// Expired keys are invisible to every read and are physically removed by the
/// next write touching them, or in bulk by `purge_expired`.
pub struct SqliteKvStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(map_sqlx_error)
    }

    /// Physically drop `key` if it has expired
    async fn evict_if_expired(conn: &mut SqliteConnection, key: &str, now: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM kv_keys WHERE key = ? AND expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(key)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            // Cascade covers this too; explicit so orphans never survive
            sqlx::query("DELETE FROM kv_hash_fields WHERE key = ?")
                .bind(key)
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
            debug!(key = %key, "Evicted expired key");
        }
        Ok(())
    }

    /// Make sure the key row exists (new keys never expire)
    async fn ensure_key(conn: &mut SqliteConnection, key: &str) -> Result<()> {
        sqlx::query("INSERT INTO kv_keys (key, expires_at) VALUES (?, NULL) ON CONFLICT(key) DO NOTHING")
            .bind(key)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_field(
        conn: &mut SqliteConnection,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_hash_fields (key, field, value) VALUES (?, ?, ?)
            ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(field)
        .bind(value)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Remove every expired key. Returns the number of keys removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM kv_hash_fields WHERE key IN (
                SELECT key FROM kv_keys WHERE expires_at IS NOT NULL AND expires_at <= ?
            )
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let removed = sqlx::query(
            "DELETE FROM kv_keys WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;

        if removed > 0 {
            info!(removed = removed, "Purged expired keys");
        }
        Ok(removed)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn hash_set_all(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut tx = self.begin().await?;

        Self::evict_if_expired(&mut tx, key, now).await?;
        Self::ensure_key(&mut tx, key).await?;
        for (field, value) in fields {
            Self::upsert_field(&mut tx, key, field, value).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let now = self.time_provider.now_millis();
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT f.field, f.value
            FROM kv_hash_fields f
            JOIN kv_keys k ON k.key = f.key
            WHERE f.key = ? AND (k.expires_at IS NULL OR k.expires_at > ?)
            "#,
        )
        .bind(key)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().collect())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.hash_set_all(key, &[(field, value.to_string())]).await
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let now = self.time_provider.now_millis();
        let mut tx = self.begin().await?;

        Self::evict_if_expired(&mut tx, key, now).await?;
        Self::ensure_key(&mut tx, key).await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_hash_fields WHERE key = ? AND field = ?")
                .bind(key)
                .bind(field)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let current = match current {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                AppError::Store(format!("field {} of {} is not an integer", field, key))
            })?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| AppError::Store(format!("field {} of {} overflowed", field, key)))?;

        Self::upsert_field(&mut tx, key, field, &next.to_string()).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let mut tx = self.begin().await?;

        Self::evict_if_expired(&mut tx, key, now).await?;
        let updated = sqlx::query("UPDATE kv_keys SET expires_at = ? WHERE key = ?")
            .bind(expiry_at(now, ttl))
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(updated > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.time_provider.now_millis();
        let expires_at: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT expires_at FROM kv_keys WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(expires_at
            .flatten()
            .map(|at| Duration::from_millis((at - now).max(0) as u64)))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = self.time_provider.now_millis();
        sqlx::query_scalar(
            r#"
            SELECT key FROM kv_keys
            WHERE key LIKE ? ESCAPE '\' AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY key
            "#,
        )
        .bind(like_prefix(prefix))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let mut tx = self.begin().await?;

        Self::evict_if_expired(&mut tx, key, now).await?;
        sqlx::query("DELETE FROM kv_hash_fields WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let removed = sqlx::query("DELETE FROM kv_keys WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(removed > 0)
    }
}
