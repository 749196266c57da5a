//! Ephemeral, TTL-bounded reply-thread cache: the bidirectional link
//! between a message relayed into the owner's chat and the chat/message it
//! originated from.

mod error;
mod key;
mod redis_cache;

pub use error::{ReplyCacheError, Result};
pub use key::ThreadKey;
pub use redis_cache::RedisReplyCache;

use async_trait::async_trait;

/// Public contract of the reply-thread cache. A cache-unavailable error is
/// distinct from a miss; callers in the relay behavior degrade a `None` or
/// an `Err` the same way — "forward without a clickable reply back-link".
#[async_trait]
pub trait ReplyCache: Send + Sync {
    /// Stores both directions of the link, each under the configured TTL.
    /// Overwrites any existing mapping for either key (last-writer-wins).
    async fn link(&self, forward: &ThreadKey, origin: &ThreadKey) -> Result<()>;

    /// Reverse lookup used when the owner replies by quoting a relayed
    /// message.
    async fn resolve_origin(&self, forward: &ThreadKey) -> Result<Option<ThreadKey>>;

    /// Used to collapse repeated inbound messages from the same origin
    /// onto one forward thread.
    async fn resolve_forward(&self, origin: &ThreadKey) -> Result<Option<ThreadKey>>;
}
