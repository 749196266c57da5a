//! The fixed per-bot behavior installed on every hosted bot: forward
//! third-party messages to the owner, and route the owner's quoted replies
//! back to their origin.

use async_trait::async_trait;
use forge_replycache::{ReplyCache, ThreadKey};
use std::sync::Arc;
use teloxide::types::{Update, UpdateKind};
use tracing::{debug, warn};

use crate::{Result, remote::RemoteBot};

/// Object-safe entry point the fleet manager dispatches inbound updates
/// through, one implementation per hosted bot.
#[async_trait]
pub trait HostedBot: Send + Sync {
    async fn dispatch(&self, update: Update);
}

/// The contact-relay behavior: forward third-party messages to the owner's
/// chat, and resolve the owner's quoted replies back to their origin via
/// the reply-thread cache.
pub struct ContactRelay<R: RemoteBot> {
    remote: Arc<R>,
    cache: Arc<dyn ReplyCache>,
    owner_chat_id: i64,
}

impl<R: RemoteBot> ContactRelay<R> {
    pub fn new(remote: Arc<R>, cache: Arc<dyn ReplyCache>, owner_chat_id: i64) -> Self {
        Self {
            remote,
            cache,
            owner_chat_id,
        }
    }

    async fn handle_message(&self, message: teloxide::types::Message) -> Result<()> {
        let chat_id = message.chat.id.0;
        let message_id = message.id.0 as i64;
        let text = message_text(&message);

        if chat_id == self.owner_chat_id {
            self.handle_owner_message(&message, text).await
        } else {
            self.handle_third_party_message(chat_id, message_id, text)
                .await
        }
    }

    async fn handle_owner_message(
        &self,
        message: &teloxide::types::Message,
        text: &str,
    ) -> Result<()> {
        let Some(quoted) = message.reply_to_message() else {
            debug!("owner message is not a quoted reply; ignoring");
            return Ok(());
        };
        let forward = ThreadKey::new(self.owner_chat_id, quoted.id.0 as i64);

        let resolved = match self.cache.resolve_origin(&forward).await {
            Ok(origin) => origin,
            Err(err) => {
                warn!(error = %err, "reply cache unavailable; treating quoted reply as an expired thread");
                None
            }
        };

        match resolved {
            Some(origin) => {
                self.remote
                    .send_message(origin.chat_id, text, Some(origin.message_id as i32))
                    .await?;
            }
            None => {
                warn!(forward = %forward, "owner quoted a reply whose thread has expired");
                self.remote
                    .send_message(
                        self.owner_chat_id,
                        "This conversation has expired and can no longer be replied to.",
                        Some(message.id.0),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_third_party_message(
        &self,
        sender_chat_id: i64,
        original_message_id: i64,
        text: &str,
    ) -> Result<()> {
        let origin = ThreadKey::new(sender_chat_id, original_message_id);

        let reply_to = match self.cache.resolve_forward(&origin).await {
            Ok(existing) => existing.map(|fwd| fwd.message_id as i32),
            Err(err) => {
                warn!(error = %err, "reply cache unavailable; forwarding without thread collapse");
                None
            }
        };

        let new_message_id = self
            .remote
            .send_message(self.owner_chat_id, text, reply_to)
            .await?;

        let forward = ThreadKey::new(self.owner_chat_id, new_message_id as i64);
        if let Err(err) = self.cache.link(&forward, &origin).await {
            warn!(error = %err, "failed to record reply-thread link; replies to this message will not route back");
        }
        Ok(())
    }
}

#[async_trait]
impl<R: RemoteBot> HostedBot for ContactRelay<R> {
    async fn dispatch(&self, update: Update) {
        let UpdateKind::Message(message) = update.kind else {
            debug!("ignoring non-message update");
            return;
        };
        if let Err(err) = self.handle_message(message).await {
            warn!(error = %err, "contact relay failed to handle message");
        }
    }
}

fn message_text(message: &teloxide::types::Message) -> &str {
    message
        .text()
        .or_else(|| message.caption())
        .unwrap_or_default()
}
