//! Abstraction over the outbound remote chat API — "set webhook", "delete
//! webhook", "send message", and the one-shot "get-me" identity lookup.
//! Kept narrow and object-safe so the fleet manager and the relay behavior
//! can both depend on it without committing to teloxide at every call site.

use async_trait::async_trait;
use teloxide::prelude::*;

use crate::{Result, error::RelayError};

/// Identity discovered via "get-me" at registration time.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub username: Option<String>,
}

/// The three categorical operations the fleet/relay need from a live bot
/// credential, plus the one-shot identity lookup.
#[async_trait]
pub trait RemoteBot: Send + Sync {
    async fn get_me(&self) -> Result<BotIdentity>;
    async fn set_webhook(&self, url: &str) -> Result<()>;
    async fn delete_webhook(&self) -> Result<()>;
    /// Sends `text` to `chat_id`, optionally as a reply to `reply_to`
    /// (a message id within that same chat), returning the new message id.
    async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<i32>;
}

/// Teloxide-backed [`RemoteBot`] bound to a single credential.
pub struct TeloxideRemoteBot {
    bot: Bot,
}

impl TeloxideRemoteBot {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

#[async_trait]
impl RemoteBot for TeloxideRemoteBot {
    async fn get_me(&self) -> Result<BotIdentity> {
        let me = self.bot.get_me().await?;
        Ok(BotIdentity {
            username: me.username.clone(),
        })
    }

    async fn set_webhook(&self, url: &str) -> Result<()> {
        let url = url
            .parse()
            .map_err(|_| RelayError::InvalidWebhookUrl(url.to_string()))?;
        self.bot.set_webhook(url).await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        self.bot.delete_webhook().await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<i32> {
        // Relayed content is forwarded transparently (§4.7): no parse mode,
        // so a message containing literal `<`, `>`, or `&` isn't mangled or
        // rejected by the remote's HTML/Markdown parser.
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(teloxide::types::ReplyParameters::new(
                teloxide::types::MessageId(reply_to),
            ));
        }
        let sent = request.await?;
        Ok(sent.id.0)
    }
}
