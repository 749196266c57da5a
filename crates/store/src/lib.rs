//! Durable record of registered bots: ownership, activation state, and
//! soft-delete, with every token encrypted at rest via [`forge_codec`].
//!
//! The store indexes bots by ciphertext, not plaintext — `forge_codec`'s
//! determinism is what makes an equality lookup on that column possible
//! without ever persisting the plaintext token.

mod error;
mod model;

pub use error::{Result, StoreError};
pub use model::{BotCounts, BotRecord};

use chrono::{DateTime, Utc};
use model::BotRow;
use sqlx::MySqlPool;

/// Durable record of registered bots: ownership, activation state, and
/// soft-delete.
///
/// Every operation encrypts/decrypts tokens through the same 32-byte key
/// the store was constructed with; callers never see or pass ciphertext.
pub struct CredentialStore {
    pool: MySqlPool,
    key: Vec<u8>,
}

impl CredentialStore {
    pub fn new(pool: MySqlPool, encryption_key: &[u8]) -> Self {
        Self {
            pool,
            key: encryption_key.to_vec(),
        }
    }

    /// Runs the crate's bundled migrations against `pool`.
    pub async fn run_migrations(pool: &MySqlPool) -> Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }

    fn encrypt(&self, token: &str) -> Result<String> {
        Ok(forge_codec::encrypt(&self.key, token)?)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        Ok(forge_codec::decrypt(&self.key, ciphertext)?)
    }

    fn to_record(&self, row: BotRow) -> Result<BotRecord> {
        Ok(BotRecord {
            id: row.id,
            token: self.decrypt(&row.token_ciphertext)?,
            owner_chat_id: row.owner_chat_id,
            username: row.username,
            created_at: row.created_at,
            active: row.active,
            soft_deleted: row.soft_deleted,
        })
    }

    /// Inserts a fresh record. Fails with [`StoreError::DuplicateToken`] if
    /// an active (non-soft-deleted) record already exists for `token`.
    pub async fn create(&self, token: &str, owner: i64, username: Option<&str>) -> Result<i64> {
        let ciphertext = self.encrypt(token)?;
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM bots WHERE token_ciphertext = ? AND soft_deleted = FALSE",
        )
        .bind(&ciphertext)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(StoreError::DuplicateToken);
        }

        let result = sqlx::query(
            "INSERT INTO bots (token_ciphertext, owner_chat_id, username, active, soft_deleted) \
             VALUES (?, ?, ?, FALSE, FALSE)",
        )
        .bind(&ciphertext)
        .bind(owner)
        .bind(username)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.last_insert_id() as i64)
    }

    /// Returns the active (non-soft-deleted) record for `token`, if any.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<BotRecord>> {
        let ciphertext = self.encrypt(token)?;
        let row: Option<BotRow> = sqlx::query_as(
            "SELECT id, token_ciphertext, owner_chat_id, username, created_at, active, soft_deleted \
             FROM bots WHERE token_ciphertext = ? AND soft_deleted = FALSE",
        )
        .bind(&ciphertext)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| self.to_record(r)).transpose()
    }

    /// Returns a soft-deleted record matching `token`, used to drive the
    /// "restore" UX when a user re-submits a previously deleted token.
    pub async fn get_deleted_by_token(&self, token: &str) -> Result<Option<BotRecord>> {
        let ciphertext = self.encrypt(token)?;
        let row: Option<BotRow> = sqlx::query_as(
            "SELECT id, token_ciphertext, owner_chat_id, username, created_at, active, soft_deleted \
             FROM bots WHERE token_ciphertext = ? AND soft_deleted = TRUE \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(&ciphertext)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| self.to_record(r)).transpose()
    }

    /// Flips soft-deleted → active and reassigns owner + username,
    /// preserving `id` and `created_at` so anything keyed off the bot's id
    /// (e.g. cached thread links) remains valid across the restore.
    pub async fn restore(&self, token: &str, new_owner: i64, username: Option<&str>) -> Result<()> {
        let ciphertext = self.encrypt(token)?;
        let result = sqlx::query(
            "UPDATE bots SET soft_deleted = FALSE, active = FALSE, owner_chat_id = ?, username = ? \
             WHERE token_ciphertext = ? AND soft_deleted = TRUE",
        )
        .bind(new_owner)
        .bind(username)
        .bind(&ciphertext)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Sets `active = true`. The caller is responsible for only calling
    /// this after a successful remote webhook set.
    pub async fn activate(&self, token: &str) -> Result<()> {
        self.set_active(token, true).await
    }

    /// Sets `active = false`.
    pub async fn deactivate(&self, token: &str) -> Result<()> {
        self.set_active(token, false).await
    }

    async fn set_active(&self, token: &str, active: bool) -> Result<()> {
        let ciphertext = self.encrypt(token)?;
        let result = sqlx::query(
            "UPDATE bots SET active = ? WHERE token_ciphertext = ? AND soft_deleted = FALSE",
        )
        .bind(active)
        .bind(&ciphertext)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Renames the bot's cached display username.
    pub async fn update_username(&self, id: i64, username: &str) -> Result<()> {
        let result = sqlx::query("UPDATE bots SET username = ? WHERE id = ?")
            .bind(username)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Soft-deletes the record for `token`. Does not clear any reply-thread
    /// cache entries pointing into this bot; see the crate-level docs on
    /// orphaned cache entries.
    pub async fn delete_bot(&self, token: &str) -> Result<()> {
        let ciphertext = self.encrypt(token)?;
        let result = sqlx::query(
            "UPDATE bots SET soft_deleted = TRUE, active = FALSE \
             WHERE token_ciphertext = ? AND soft_deleted = FALSE",
        )
        .bind(&ciphertext)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Enumerates non-soft-deleted records owned by `owner`.
    pub async fn get_bots_by_owner(&self, owner: i64) -> Result<Vec<BotRecord>> {
        let rows: Vec<BotRow> = sqlx::query_as(
            "SELECT id, token_ciphertext, owner_chat_id, username, created_at, active, soft_deleted \
             FROM bots WHERE owner_chat_id = ? AND soft_deleted = FALSE ORDER BY created_at",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| self.to_record(r)).collect()
    }

    /// Enumerates every record with `active = true, soft_deleted = false`;
    /// used at startup to rehydrate the fleet.
    pub async fn get_active_bots(&self) -> Result<Vec<BotRecord>> {
        let rows: Vec<BotRow> = sqlx::query_as(
            "SELECT id, token_ciphertext, owner_chat_id, username, created_at, active, soft_deleted \
             FROM bots WHERE active = TRUE AND soft_deleted = FALSE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| self.to_record(r)).collect()
    }

    /// Aggregate counts for the admin dashboard.
    pub async fn counts(&self) -> Result<BotCounts> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bots WHERE soft_deleted = FALSE")
            .fetch_one(&self.pool)
            .await?;
        let (active,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM bots WHERE active = TRUE AND soft_deleted = FALSE")
                .fetch_one(&self.pool)
                .await?;
        let (soft_deleted,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM bots WHERE soft_deleted = TRUE")
                .fetch_one(&self.pool)
                .await?;
        Ok(BotCounts {
            total,
            active,
            inactive: total - active,
            soft_deleted,
        })
    }

    /// Counts non-soft-deleted records created since `since`, for the
    /// admin dashboard's time-window view.
    pub async fn count_created_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bots WHERE soft_deleted = FALSE AND created_at >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Counts non-soft-deleted records owned by `owner`.
    pub async fn count_by_owner(&self, owner: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bots WHERE soft_deleted = FALSE AND owner_chat_id = ?",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const KEY: &[u8; 32] = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    /// `encrypt`/`decrypt` round-trip through the store's own key handling,
    /// independent of a live database — the rest of the crate's contracts
    /// are exercised below against a real MySQL instance.
    #[test]
    fn store_encrypts_with_its_configured_key() {
        let pool = sqlx::Pool::connect_lazy("mysql://unused/unused").expect("lazy pool");
        let store = CredentialStore::new(pool, KEY);
        let ciphertext = store.encrypt("111:AAAA").unwrap();
        assert_eq!(store.decrypt(&ciphertext).unwrap(), "111:AAAA");
    }

    /// Exercises the full lifecycle against a real MySQL instance. Requires
    /// `MYSQL_TEST_URL` (e.g. `mysql://root@127.0.0.1/forge_test`); skipped
    /// otherwise since this crate has no embedded-database fallback.
    #[tokio::test]
    #[ignore = "requires a live MySQL instance; set MYSQL_TEST_URL"]
    async fn lifecycle_against_live_mysql() {
        let Ok(url) = std::env::var("MYSQL_TEST_URL") else {
            return;
        };
        let pool = MySqlPool::connect(&url).await.unwrap();
        CredentialStore::run_migrations(&pool).await.unwrap();
        let store = CredentialStore::new(pool, KEY);

        let token = format!("111:{}", uuid::Uuid::new_v4().simple());
        let id = store.create(&token, 42, Some("alice_bot")).await.unwrap();
        assert!(matches!(store.create(&token, 42, None).await, Err(StoreError::DuplicateToken)));

        let record = store.get_by_token(&token).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert!(!record.active);

        store.activate(&token).await.unwrap();
        assert!(store.get_by_token(&token).await.unwrap().unwrap().active);

        store.delete_bot(&token).await.unwrap();
        assert!(store.get_by_token(&token).await.unwrap().is_none());
        let deleted = store.get_deleted_by_token(&token).await.unwrap().unwrap();
        assert_eq!(deleted.id, id);

        store.restore(&token, 43, Some("alice_bot_v2")).await.unwrap();
        let restored = store.get_by_token(&token).await.unwrap().unwrap();
        assert_eq!(restored.id, id, "restore preserves the original id");
        assert_eq!(restored.owner_chat_id, 43);
        assert!(!restored.active, "restore leaves the bot inactive until started");
    }
}
