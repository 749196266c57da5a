use chrono::{DateTime, Utc};

/// A registered bot credential, as kept in the durable store.
///
/// `token` is always the decrypted plaintext — the ciphertext lives only
/// in the `token_ciphertext` column and is never handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRecord {
    pub id: i64,
    pub token: String,
    pub owner_chat_id: i64,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub soft_deleted: bool,
}

/// Row shape as returned by MySQL, before the ciphertext is decrypted back
/// into a plaintext token.
#[derive(sqlx::FromRow)]
pub(crate) struct BotRow {
    pub id: i64,
    pub token_ciphertext: String,
    pub owner_chat_id: i64,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub soft_deleted: bool,
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BotCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub soft_deleted: i64,
}
