#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use async_trait::async_trait;
use forge_fleet::FleetManager;
use forge_relay::{BotIdentity, HostedBot, RemoteBot};
use forge_replycache::{ReplyCache, ReplyCacheError, ThreadKey};
use forge_supervision::logging_handler;
use teloxide::types::Update;
use tokio::net::TcpListener;

struct NoopCache;

#[async_trait]
impl ReplyCache for NoopCache {
    async fn link(&self, _: &ThreadKey, _: &ThreadKey) -> Result<(), ReplyCacheError> {
        Ok(())
    }
    async fn resolve_origin(&self, _: &ThreadKey) -> Result<Option<ThreadKey>, ReplyCacheError> {
        Ok(None)
    }
    async fn resolve_forward(&self, _: &ThreadKey) -> Result<Option<ThreadKey>, ReplyCacheError> {
        Ok(None)
    }
}

struct NoopRemote;

#[async_trait]
impl RemoteBot for NoopRemote {
    async fn get_me(&self) -> forge_relay::Result<BotIdentity> {
        Ok(BotIdentity { username: Some("bot".into()) })
    }
    async fn set_webhook(&self, _url: &str) -> forge_relay::Result<()> {
        Ok(())
    }
    async fn delete_webhook(&self) -> forge_relay::Result<()> {
        Ok(())
    }
    async fn send_message(&self, _chat_id: i64, _text: &str, _reply_to: Option<i32>) -> forge_relay::Result<i32> {
        Ok(1)
    }
}

struct PanickingHosted;

#[async_trait]
impl HostedBot for PanickingHosted {
    async fn dispatch(&self, _update: Update) {
        panic!("simulated handler panic");
    }
}

struct QuietHosted;

#[async_trait]
impl HostedBot for QuietHosted {
    async fn dispatch(&self, _update: Update) {}
}

async fn spawn_app(fleet: Arc<FleetManager>) -> String {
    let app = forge_gateway::build_app(fleet, logging_handler());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn sample_update() -> serde_json::Value {
    serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "text": "hi",
        }
    })
}

#[tokio::test]
async fn healthz_reports_ok() {
    let fleet = Arc::new(FleetManager::new(Arc::new(NoopCache), "https://host", None));
    let base = spawn_app(fleet).await;

    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn webhook_dispatches_to_registered_bot() {
    let fleet = Arc::new(FleetManager::new(Arc::new(NoopCache), "https://host", None));
    fleet.register_existing_bot("tok:1", 1, 1, Arc::new(NoopRemote), Arc::new(QuietHosted));
    let base = spawn_app(fleet).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/webhook/tok:1"))
        .json(&sample_update())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn webhook_for_unknown_token_is_not_found() {
    let fleet = Arc::new(FleetManager::new(Arc::new(NoopCache), "https://host", None));
    let base = spawn_app(fleet).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/webhook/no-such-token"))
        .json(&sample_update())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let fleet = Arc::new(FleetManager::new(Arc::new(NoopCache), "https://host", None));
    fleet.register_existing_bot("tok:1", 1, 1, Arc::new(NoopRemote), Arc::new(QuietHosted));
    let base = spawn_app(fleet).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/webhook/tok:1"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn panicking_handler_recovers_as_internal_server_error() {
    let fleet = Arc::new(FleetManager::new(Arc::new(NoopCache), "https://host", None));
    fleet.register_existing_bot("tok:1", 1, 1, Arc::new(NoopRemote), Arc::new(PanickingHosted));
    let base = spawn_app(fleet).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/webhook/tok:1"))
        .json(&sample_update())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
}
