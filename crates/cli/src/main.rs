//! Binary entry point for the bot factory: loads configuration, wires up
//! the durable store and ephemeral cache, brings up the fleet manager,
//! installs the factory bot, rehydrates every previously active hosted
//! bot, and serves the shared webhook endpoint until a shutdown signal
//! arrives.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use forge_config::{Config, StoreConfig};
use forge_factory::FactoryBot;
use forge_fleet::FleetManager;
use forge_relay::{RemoteBot, TeloxideRemoteBot};
use forge_replycache::RedisReplyCache;
use forge_store::CredentialStore;
use forge_supervision::{RestartPolicy, logging_handler, safe_go_with_success_window};
use secrecy::ExposeSecret;
use sqlx::mysql::MySqlPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Restart budget for the webhook listener task: five attempts, 200ms
/// doubling to 30s, before giving up and letting the process exit.
const LISTENER_MAX_RETRIES: u32 = 5;
const LISTENER_BASE_DELAY: Duration = Duration::from_millis(200);
const LISTENER_MAX_DELAY: Duration = Duration::from_secs(30);
/// A listener that stays up this long before dying earns a fresh restart
/// budget rather than inheriting one worn down by earlier failures.
const LISTENER_HEALTHY_AFTER: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_telemetry(&config.rust_log);
    info!(version = env!("CARGO_PKG_VERSION"), "forge starting");

    let pool = MySqlPoolOptions::new()
        .connect(&store_url(&config.store))
        .await?;
    CredentialStore::run_migrations(&pool).await?;
    let store = Arc::new(CredentialStore::new(pool, &config.encryption_key));

    let ttl = Duration::from_secs(config.cache.ttl_hours.saturating_mul(3600));
    let cache = Arc::new(
        RedisReplyCache::connect(
            &config.cache.addr,
            config.cache.password.as_ref().map(|s| s.expose_secret()),
            config.cache.db,
            ttl,
        )
        .await?,
    );

    let fleet = Arc::new(FleetManager::new(
        cache,
        config.webhook_url.clone(),
        Some(Arc::clone(&store)),
    ));

    register_factory_bot(&config, &store, &fleet).await?;
    rehydrate_fleet(&store, &fleet).await;

    let app = forge_gateway::build_app(Arc::clone(&fleet), logging_handler());
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    serve_until_shutdown(addr, app).await?;

    info!("draining hosted bots");
    fleet.stop_all().await;
    info!("shutdown complete");
    Ok(())
}

fn store_url(store: &StoreConfig) -> String {
    match &store.password {
        Some(password) => format!(
            "mysql://{}:{}@{}/{}",
            store.user,
            password.expose_secret(),
            store.host,
            store.database
        ),
        None => format!("mysql://{}@{}/{}", store.user, store.host, store.database),
    }
}

/// Installs the factory bot so its own updates share the single inbound
/// endpoint, per `RegisterExistingBot` (§4.5). Unlike a hosted bot, the
/// factory bot's webhook is bound directly here rather than through
/// `FleetManager::start_bot`, since it has no credential-store record of
/// its own.
async fn register_factory_bot(
    config: &Config,
    store: &Arc<CredentialStore>,
    fleet: &Arc<FleetManager>,
) -> anyhow::Result<()> {
    let token = config.factory_bot_token.expose_secret();
    let remote: Arc<dyn RemoteBot> = Arc::new(TeloxideRemoteBot::new(token));

    let identity = remote.get_me().await?;
    info!(username = ?identity.username, "factory bot credential validated");

    let webhook_url = format!(
        "{}/webhook/{token}",
        config.webhook_url.trim_end_matches('/')
    );
    remote.set_webhook(&webhook_url).await?;

    let factory_bot = Arc::new(FactoryBot::new(
        Arc::clone(store),
        Arc::clone(fleet),
        Arc::clone(&remote),
        config.admin_id,
    ));

    fleet.register_existing_bot(token, config.admin_id.unwrap_or(0), 0, remote, factory_bot);
    info!("factory bot registered on the shared endpoint");
    Ok(())
}

/// Loads every `active = true` record and starts it; startup is the one
/// place the fleet registry is rebuilt from the durable store. A bot whose
/// webhook fails to (re)bind is logged and left for the owner to retry via
/// the factory bot — it is not fatal to the rest of the fleet.
async fn rehydrate_fleet(store: &Arc<CredentialStore>, fleet: &Arc<FleetManager>) {
    let bots = match store.get_active_bots().await {
        Ok(bots) => bots,
        Err(err) => {
            warn!(error = %err, "failed to load active bots at startup; fleet starts empty");
            return;
        }
    };

    info!(count = bots.len(), "rehydrating fleet from the credential store");
    for bot in bots {
        if let Err(err) = fleet.start_bot(&bot.token, bot.owner_chat_id, bot.id).await {
            warn!(bot_id = bot.id, error = %err, "failed to rehydrate bot at startup");
        }
    }
}

/// Initializes structured, leveled tracing filtered by `RUST_LOG` (or the
/// configured default), matching how the rest of this codebase's services
/// bootstrap logging.
fn init_telemetry(rust_log: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(rust_log));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();
}

/// Binds `addr` fresh and serves `app` on it until `cancel` fires, at which
/// point it stops accepting new connections and waits for in-flight
/// requests to finish. Rebinding on every call (rather than reusing one
/// `TcpListener`) is what lets [`safe_go_with_success_window`] restart this
/// as a whole if the listener ever exits unexpectedly.
async fn run_listener(
    addr: SocketAddr,
    app: axum::Router,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening for webhook updates");

    let shutdown_cancel = cancel.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_cancel.cancelled().await;
    })
    .await
    .map_err(Into::into)
}

/// Supervises [`run_listener`] under the success-window restart policy and
/// serves until `SIGINT`/`SIGTERM` is observed, then stops accepting new
/// connections and allows up to 5s for in-flight requests to drain before
/// returning, per the graceful-shutdown deadline.
async fn serve_until_shutdown(addr: SocketAddr, app: axum::Router) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let policy = Arc::new(RestartPolicy::new(
        LISTENER_MAX_RETRIES,
        LISTENER_BASE_DELAY,
        LISTENER_MAX_DELAY,
    ));

    let task_cancel = cancel.clone();
    let mut handle = safe_go_with_success_window(
        move || {
            let app = app.clone();
            let cancel = task_cancel.clone();
            async move {
                if let Err(err) = run_listener(addr, app, cancel).await {
                    warn!(error = %err, "webhook listener exited with an error");
                }
            }
        },
        HashMap::new(),
        logging_handler(),
        policy,
        Arc::new(|| warn!("webhook listener exhausted its restart budget; shutting down")),
        cancel.clone(),
        LISTENER_HEALTHY_AFTER,
    );

    tokio::select! {
        result = &mut handle => return result.map_err(Into::into),
        () = wait_for_shutdown_signal() => {
            info!("shutdown signal received; draining connections");
            cancel.cancel();
        }
    }

    match tokio::time::timeout(Duration::from_secs(5), handle).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            warn!("listener did not drain within the 5s deadline; shutting down anyway");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler; only SIGINT will trigger shutdown");
            std::future::pending().await
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
