use std::{collections::HashMap, sync::Arc, sync::Mutex};

use forge_relay::{ContactRelay, HostedBot, RemoteBot, TeloxideRemoteBot};
use forge_replycache::ReplyCache;
use forge_store::CredentialStore;
use teloxide::types::Update;
use tracing::{debug, info, warn};

use crate::{
    entry::FleetEntry,
    error::{FleetError, Result},
};

/// A registry slot: either a reservation held while `start_bot` is still
/// doing its async work, or a fully live bot. Reserving and checking
/// happen under the same lock acquisition so two concurrent `start_bot`
/// calls for the same credential can't both proceed past the check
/// (§4.5, "StartBot must check-then-insert atomically").
enum Slot {
    Starting,
    Running(FleetEntry),
}

/// Owns the process-wide registry mapping credential → live fleet entry.
/// All registry mutations are serialized under a plain mutex; the mutex is
/// never held across an `.await`.
///
/// `store` is `None` only in tests that don't care about the durable
/// `active` flag; a real deployment always wires one in so `active` tracks
/// "should be running on next startup" regardless of which call site
/// started or stopped the bot (see DESIGN.md).
pub struct FleetManager {
    registry: Mutex<HashMap<String, Slot>>,
    cache: Arc<dyn ReplyCache>,
    public_base_url: String,
    store: Option<Arc<CredentialStore>>,
}

impl FleetManager {
    pub fn new(
        cache: Arc<dyn ReplyCache>,
        public_base_url: impl Into<String>,
        store: Option<Arc<CredentialStore>>,
    ) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            cache,
            public_base_url: public_base_url.into(),
            store,
        }
    }

    fn webhook_url(&self, token: &str) -> String {
        format!(
            "{}/webhook/{token}",
            self.public_base_url.trim_end_matches('/')
        )
    }

    /// Idempotent: if `token` is already running (or another caller is
    /// already in the middle of starting it), returns immediately.
    /// Otherwise reserves the slot, builds a teloxide-backed contact-relay
    /// bot, points the remote webhook at the shared endpoint, and fills
    /// the slot in. On webhook-set failure the reservation is released and
    /// the credential store is left untouched — the caller decides whether
    /// to retry or surface an error, per §4.5.
    pub async fn start_bot(&self, token: &str, owner_chat_id: i64, bot_record_id: i64) -> Result<()> {
        if !self.reserve(token) {
            return Ok(());
        }

        let remote = Arc::new(TeloxideRemoteBot::new(token));
        let hosted: Arc<dyn HostedBot> = Arc::new(ContactRelay::new(
            Arc::clone(&remote),
            Arc::clone(&self.cache),
            owner_chat_id,
        ));

        let webhook_result = remote.set_webhook(&self.webhook_url(token)).await;
        if let Err(err) = webhook_result {
            self.release(token);
            return Err(FleetError::WebhookSetFailed(err));
        }

        self.fill(
            token,
            FleetEntry {
                owner_chat_id,
                bot_record_id,
                remote,
                hosted,
            },
        );
        info!(token_prefix = %prefix(token), "bot started and webhook bound");

        if let Some(store) = &self.store {
            if let Err(err) = store.activate(token).await {
                warn!(token_prefix = %prefix(token), error = %err, "bot started but failed to mark active in the store");
            }
        }
        Ok(())
    }

    /// Inserts a pre-constructed bot directly, bypassing the contact-relay
    /// construction path. Used for the factory bot itself so its updates
    /// share the single inbound endpoint.
    pub fn register_existing_bot(
        &self,
        token: &str,
        owner_chat_id: i64,
        bot_record_id: i64,
        remote: Arc<dyn RemoteBot>,
        hosted: Arc<dyn HostedBot>,
    ) {
        let mut registry = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        registry.entry(token.to_string()).or_insert_with(|| {
            Slot::Running(FleetEntry {
                owner_chat_id,
                bot_record_id,
                remote,
                hosted,
            })
        });
    }

    /// Atomically checks the slot is empty and reserves it as `Starting`
    /// in one lock acquisition. Returns `false` (no reservation made) if
    /// `token` is already running or already being started by another
    /// caller, so the retry-free idempotence `start_bot` promises holds
    /// under concurrent callers too.
    fn reserve(&self, token: &str) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        if registry.contains_key(token) {
            return false;
        }
        registry.insert(token.to_string(), Slot::Starting);
        true
    }

    /// Releases a reservation made by `reserve` after the async work that
    /// would have filled it failed.
    fn release(&self, token: &str) {
        let mut registry = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        registry.remove(token);
    }

    /// Fills a reservation made by `reserve` with the live entry.
    fn fill(&self, token: &str, entry: FleetEntry) {
        let mut registry = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        registry.insert(token.to_string(), Slot::Running(entry));
    }

    /// Idempotent: removes the fleet entry and clears the remote webhook.
    /// A missing entry (or one still `Starting`) is silently tolerated.
    pub async fn stop_bot(&self, token: &str) {
        let slot = {
            let mut registry = self.registry.lock().unwrap_or_else(|p| p.into_inner());
            registry.remove(token)
        };
        let Some(Slot::Running(entry)) = slot else {
            debug!(token_prefix = %prefix(token), "stop_bot: no such bot is running");
            return;
        };
        if let Err(err) = entry.remote.delete_webhook().await {
            warn!(token_prefix = %prefix(token), error = %err, "failed to clear remote webhook on stop");
        }
        info!(token_prefix = %prefix(token), "bot stopped and webhook cleared");

        if let Some(store) = &self.store {
            if let Err(err) = store.deactivate(token).await {
                warn!(token_prefix = %prefix(token), error = %err, "bot stopped but failed to mark inactive in the store");
            }
        }
    }

    pub fn is_running(&self, token: &str) -> bool {
        matches!(
            self.registry.lock().unwrap_or_else(|p| p.into_inner()).get(token),
            Some(Slot::Running(_))
        )
    }

    pub fn running_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .filter(|slot| matches!(slot, Slot::Running(_)))
            .count()
    }

    /// Snapshots the registry and stops every entry. Used at graceful
    /// shutdown.
    pub async fn stop_all(&self) {
        let tokens: Vec<String> = self
            .registry
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        for token in tokens {
            self.stop_bot(&token).await;
        }
    }

    /// Looks up the live entry for `token` and hands it `update` to
    /// dispatch. Returns [`FleetError::NotRunning`] if no such bot is
    /// hosted (including one still `Starting`) — the caller (the webhook
    /// demultiplexer) maps that to 404.
    pub async fn dispatch(&self, token: &str, update: Update) -> Result<()> {
        let hosted = {
            let registry = self.registry.lock().unwrap_or_else(|p| p.into_inner());
            match registry.get(token) {
                Some(Slot::Running(entry)) => Some(Arc::clone(&entry.hosted)),
                _ => None,
            }
        };
        let Some(hosted) = hosted else {
            return Err(FleetError::NotRunning);
        };
        hosted.dispatch(update).await;
        Ok(())
    }
}

fn prefix(token: &str) -> String {
    token.split(':').next().unwrap_or(token).to_string()
}
