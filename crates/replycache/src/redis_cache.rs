use std::time::Duration;

use redis::{AsyncCommands, aio::ConnectionManager};

use crate::{
    ReplyCache, Result,
    key::{ThreadKey, forward_redis_key, origin_redis_key},
};

/// Redis-backed [`ReplyCache`]. Every entry is written with the same
/// configured TTL; reads never refresh it.
pub struct RedisReplyCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisReplyCache {
    /// Connects to `addr` (e.g. `redis://127.0.0.1:6379`), selecting
    /// `db` and authenticating with `password` if given.
    pub async fn connect(
        addr: &str,
        password: Option<&str>,
        db: i64,
        ttl: Duration,
    ) -> Result<Self> {
        let client = redis::Client::open(addr)?;
        let mut conn = ConnectionManager::new(client).await?;
        if let Some(password) = password {
            redis::cmd("AUTH")
                .arg(password)
                .query_async::<()>(&mut conn)
                .await?;
        }
        if db != 0 {
            redis::cmd("SELECT")
                .arg(db)
                .query_async::<()>(&mut conn)
                .await?;
        }
        Ok(Self { conn, ttl })
    }

    pub fn with_connection(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait::async_trait]
impl ReplyCache for RedisReplyCache {
    async fn link(&self, forward: &ThreadKey, origin: &ThreadKey) -> Result<()> {
        let ttl_secs = self.ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(forward_redis_key(forward), origin.to_string(), ttl_secs)
            .await?;
        let _: () = conn
            .set_ex(origin_redis_key(origin), forward.to_string(), ttl_secs)
            .await?;
        Ok(())
    }

    async fn resolve_origin(&self, forward: &ThreadKey) -> Result<Option<ThreadKey>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(forward_redis_key(forward)).await?;
        Ok(raw.and_then(|s| ThreadKey::parse(&s)))
    }

    async fn resolve_forward(&self, origin: &ThreadKey) -> Result<Option<ThreadKey>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(origin_redis_key(origin)).await?;
        Ok(raw.and_then(|s| ThreadKey::parse(&s)))
    }
}
