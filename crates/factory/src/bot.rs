//! The factory bot: the single control bot a user talks to in order to
//! register, list, and delete hosted bots. Installed on the fleet via
//! [`forge_fleet::FleetManager::register_existing_bot`] so its own updates
//! share the one inbound endpoint with every bot it manages.
//!
//! Out of scope here (per the boundary this crate sits behind): inline
//! keyboard menus and emoji rendering. Every interaction is a plain-text
//! slash command, which is all the core registration flow needs.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use forge_fleet::FleetManager;
use forge_relay::{HostedBot, RemoteBot, TeloxideRemoteBot};
use forge_store::{BotCounts, BotRecord, CredentialStore};
use teloxide::types::{Update, UpdateKind};
use tracing::{debug, info, warn};

use crate::error::{FactoryError, Result};

/// How long a newly submitted credential is given to answer "get-me"
/// before registration is rejected.
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of a registration attempt, distinguishing a brand-new bot from
/// one that had been soft-deleted and is now restored — the user-visible
/// message differs between the two (§8, scenario 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    Restored,
}

pub struct FactoryBot {
    store: Arc<CredentialStore>,
    fleet: Arc<FleetManager>,
    remote: Arc<dyn RemoteBot>,
    admin_id: Option<i64>,
}

impl FactoryBot {
    pub fn new(
        store: Arc<CredentialStore>,
        fleet: Arc<FleetManager>,
        remote: Arc<dyn RemoteBot>,
        admin_id: Option<i64>,
    ) -> Self {
        Self {
            store,
            fleet,
            remote,
            admin_id,
        }
    }

    /// Validates `token` by calling "get-me" against it directly (not
    /// through the fleet, which has no reason to probe identity), within
    /// the 1s deadline configuration names.
    async fn validate_token(&self, token: &str) -> Result<Option<String>> {
        let probe = TeloxideRemoteBot::new(token);
        let identity = tokio::time::timeout(VALIDATION_TIMEOUT, probe.get_me())
            .await
            .map_err(|_| FactoryError::ValidationTimedOut)??;
        Ok(identity.username)
    }

    /// Registers `token` on behalf of `owner_chat_id`, restoring a prior
    /// soft-deleted record for the same token if one exists (preserving
    /// its id, per the store's restore contract) rather than creating a
    /// fresh one.
    pub async fn register(&self, token: &str, owner_chat_id: i64) -> Result<RegisterOutcome> {
        if self.store.get_by_token(token).await?.is_some() {
            return Err(FactoryError::AlreadyRegistered);
        }

        let username = self.validate_token(token).await?;

        if let Some(deleted) = self.store.get_deleted_by_token(token).await? {
            self.store
                .restore(token, owner_chat_id, username.as_deref())
                .await?;
            self.fleet
                .start_bot(token, owner_chat_id, deleted.id)
                .await?;
            info!(bot_id = deleted.id, "bot restored and started");
            return Ok(RegisterOutcome::Restored);
        }

        let id = self
            .store
            .create(token, owner_chat_id, username.as_deref())
            .await?;
        self.fleet.start_bot(token, owner_chat_id, id).await?;
        info!(bot_id = id, "bot added and started");
        Ok(RegisterOutcome::Added)
    }

    /// Soft-deletes `token`, provided `requester_chat_id` is its owner or
    /// the configured admin.
    pub async fn delete(&self, token: &str, requester_chat_id: i64) -> Result<()> {
        let record = self
            .store
            .get_by_token(token)
            .await?
            .ok_or(FactoryError::NotFound)?;
        if record.owner_chat_id != requester_chat_id && self.admin_id != Some(requester_chat_id) {
            return Err(FactoryError::NotOwner);
        }
        self.fleet.stop_bot(token).await;
        self.store.delete_bot(token).await?;
        Ok(())
    }

    /// Enumerates the bots owned by `owner_chat_id`.
    pub async fn list(&self, owner_chat_id: i64) -> Result<Vec<BotRecord>> {
        Ok(self.store.get_bots_by_owner(owner_chat_id).await?)
    }

    /// Admin-only aggregate view: durable-store counts plus the live
    /// running count observed by the fleet.
    pub async fn status(&self, requester_chat_id: i64) -> Result<(BotCounts, usize)> {
        if self.admin_id != Some(requester_chat_id) {
            return Err(FactoryError::NotAdmin);
        }
        Ok((self.store.counts().await?, self.fleet.running_count()))
    }

    async fn reply(&self, chat_id: i64, text: impl Into<String>) {
        if let Err(err) = self.remote.send_message(chat_id, &text.into(), None).await {
            warn!(error = %err, "factory bot failed to send reply");
        }
    }

    async fn handle_command(&self, chat_id: i64, text: &str) {
        let (command, arg) = parse_command(text);

        match command {
            "/start" | "/help" => {
                self.reply(
                    chat_id,
                    "Send /register <token> to host a bot, /list to see your bots, \
                     /delete <token> to remove one.",
                )
                .await;
            }
            "/register" => self.handle_register(chat_id, arg).await,
            "/delete" => self.handle_delete(chat_id, arg).await,
            "/list" => self.handle_list(chat_id).await,
            "/status" => self.handle_status(chat_id).await,
            _ => {
                debug!(chat_id, command, "unrecognized factory bot command");
                self.reply(chat_id, "Unrecognized command. Send /help for usage.")
                    .await;
            }
        }
    }

    async fn handle_register(&self, chat_id: i64, token: &str) {
        if token.is_empty() {
            self.reply(chat_id, "Usage: /register <token>").await;
            return;
        }
        match self.register(token, chat_id).await {
            Ok(RegisterOutcome::Added) => self.reply(chat_id, "Bot added and activated.").await,
            Ok(RegisterOutcome::Restored) => {
                self.reply(chat_id, "Bot restored and activated.").await
            }
            Err(FactoryError::AlreadyRegistered) => {
                self.reply(chat_id, "This token is already registered.")
                    .await
            }
            Err(FactoryError::ValidationTimedOut) => {
                self.reply(chat_id, "Could not validate that token in time. Check it and retry.")
                    .await
            }
            Err(FactoryError::Fleet(_)) => {
                self.reply(
                    chat_id,
                    "Bot saved, but the webhook could not be bound. It will stay inactive — retry with /register.",
                )
                .await
            }
            Err(err) => {
                warn!(error = %err, "registration failed");
                self.reply(chat_id, "Registration failed. Please try again.")
                    .await;
            }
        }
    }

    async fn handle_delete(&self, chat_id: i64, token: &str) {
        if token.is_empty() {
            self.reply(chat_id, "Usage: /delete <token>").await;
            return;
        }
        match self.delete(token, chat_id).await {
            Ok(()) => self.reply(chat_id, "Bot deleted.").await,
            Err(FactoryError::NotFound) => self.reply(chat_id, "No such bot.").await,
            Err(FactoryError::NotOwner) => {
                self.reply(chat_id, "Only the owner can delete this bot.")
                    .await
            }
            Err(err) => {
                warn!(error = %err, "delete failed");
                self.reply(chat_id, "Could not delete that bot.").await;
            }
        }
    }

    async fn handle_list(&self, chat_id: i64) {
        match self.list(chat_id).await {
            Ok(bots) if bots.is_empty() => {
                self.reply(chat_id, "You have no bots registered.").await
            }
            Ok(bots) => {
                let lines: Vec<String> = bots
                    .iter()
                    .map(|b| {
                        format!(
                            "#{} {} — {}",
                            b.id,
                            b.username.as_deref().unwrap_or("(unknown)"),
                            if b.active { "active" } else { "inactive" }
                        )
                    })
                    .collect();
                self.reply(chat_id, lines.join("\n")).await;
            }
            Err(err) => {
                warn!(error = %err, "list failed");
                self.reply(chat_id, "Could not list your bots.").await;
            }
        }
    }

    async fn handle_status(&self, chat_id: i64) {
        match self.status(chat_id).await {
            Ok((counts, running)) => {
                self.reply(
                    chat_id,
                    format!(
                        "total={} active={} inactive={} soft_deleted={} running={}",
                        counts.total, counts.active, counts.inactive, counts.soft_deleted, running
                    ),
                )
                .await;
            }
            Err(FactoryError::NotAdmin) => {
                self.reply(chat_id, "This command is restricted.").await
            }
            Err(err) => {
                warn!(error = %err, "status failed");
                self.reply(chat_id, "Could not fetch status.").await;
            }
        }
    }
}

/// Splits `text` into a leading `/command` and the rest of the line,
/// trimmed. Both halves are empty strings for blank input.
fn parse_command(text: &str) -> (&str, &str) {
    let mut parts = text.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").trim();
    let arg = parts.next().unwrap_or("").trim();
    (command, arg)
}

#[async_trait]
impl HostedBot for FactoryBot {
    async fn dispatch(&self, update: Update) {
        let UpdateKind::Message(message) = update.kind else {
            debug!("factory bot ignoring non-message update");
            return;
        };
        let chat_id = message.chat.id.0;
        let Some(text) = message.text() else {
            debug!(chat_id, "factory bot ignoring message with no text");
            return;
        };
        self.handle_command(chat_id, text).await;
    }
}
