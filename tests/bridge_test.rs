use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tipbridge::bridge::{
    Channel, ChannelMapping, ChatError, ChatNetwork, InboundMessage, MessageRouter, UserDirectory,
};
use tipbridge::domain::{ChatUser, MICRO_PER_UNIT};
use tipbridge::engine::TippingEngine;
use tipbridge::ledger::MockLedger;
use tipbridge::store::{DepositStore, MemoryBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    User { id: String, text: String },
    Channel {
        channel: String,
        text: String,
        author: Option<String>,
    },
}

#[derive(Debug)]
struct RecordingNetwork {
    name: &'static str,
    users: Mutex<HashMap<String, ChatUser>>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNetwork {
    fn new(name: &'static str, users: Vec<ChatUser>) -> Self {
        Self {
            name,
            users: Mutex::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn to_user(&self, id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::User { id: to, text } if to == id => Some(text),
                _ => None,
            })
            .collect()
    }

    fn to_channel(&self, channel: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Channel {
                    channel: to, text, ..
                } if to == channel => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl UserDirectory for RecordingNetwork {
    async fn find_by_handle(&self, handle: &str) -> Option<ChatUser> {
        let handle = handle.trim_start_matches('@');
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.handle == handle)
            .cloned()
    }

    async fn find_by_id(&self, id: &str) -> Option<ChatUser> {
        self.users.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ChatNetwork for RecordingNetwork {
    fn name(&self) -> &str {
        self.name
    }

    async fn send_to_user(&self, user: &ChatUser, text: &str) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push(Sent::User {
            id: user.id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_to_channel(
        &self,
        channel: &str,
        text: &str,
        author: Option<&str>,
    ) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push(Sent::Channel {
            channel: channel.to_string(),
            text: text.to_string(),
            author: author.map(str::to_string),
        });
        Ok(())
    }

    async fn remember_user(&self, user: &ChatUser) {
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
    }
}

struct Bridge {
    router: MessageRouter,
    primary: Arc<RecordingNetwork>,
    secondary: Arc<RecordingNetwork>,
    ledger: Arc<MockLedger>,
}

fn alice() -> ChatUser {
    ChatUser::new("U1", "alice")
}

fn bob() -> ChatUser {
    ChatUser::new("U2", "bob")
}

async fn setup() -> Bridge {
    let ledger = Arc::new(MockLedger::new());
    let store = Arc::new(
        DepositStore::open(Arc::new(MemoryBackend::new()))
            .await
            .unwrap(),
    );
    let engine = Arc::new(TippingEngine::new(ledger.clone(), store));
    let primary = Arc::new(RecordingNetwork::new("primary", vec![alice(), bob()]));
    let secondary = Arc::new(RecordingNetwork::new("secondary", vec![]));
    let mapping = ChannelMapping::parse("#general=#NEM secret").unwrap();
    let router = MessageRouter::new(primary.clone(), secondary.clone(), mapping, engine);
    Bridge {
        router,
        primary,
        secondary,
        ledger,
    }
}

fn public(sender: ChatUser, channel: &str, text: &str) -> InboundMessage {
    InboundMessage {
        sender,
        channel: Channel::public(channel),
        text: text.to_string(),
    }
}

fn direct(sender: ChatUser, text: &str) -> InboundMessage {
    InboundMessage {
        sender,
        channel: Channel::direct("D1"),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_plain_chat_is_relayed_with_markup_normalized() {
    let b = setup().await;
    b.router
        .handle_primary(public(alice(), "#general", "hi <@U2> &amp; all"))
        .await;

    assert_eq!(b.secondary.to_channel("#nem"), vec!["<alice> hi @bob & all"]);
    assert!(b.primary.sent().is_empty());
}

#[tokio::test]
async fn test_unmapped_channel_is_not_relayed() {
    let b = setup().await;
    b.router
        .handle_primary(public(alice(), "#random", "hello"))
        .await;
    assert!(b.secondary.sent().is_empty());
}

#[tokio::test]
async fn test_private_commands_are_ignored_in_public() {
    let b = setup().await;
    b.router
        .handle_primary(public(alice(), "#general", "deposit"))
        .await;
    b.router
        .handle_primary(public(alice(), "#general", "withdraw nonsense"))
        .await;

    assert!(b.primary.sent().is_empty());
    assert_eq!(b.ledger.generated_count(), 0);
    assert_eq!(b.secondary.to_channel("#nem").len(), 2);
}

#[tokio::test]
async fn test_public_tip_reaches_both_networks() {
    let b = setup().await;
    b.router.handle_primary(direct(alice(), "deposit")).await;
    b.ledger
        .set_balance(&MockLedger::generated_address(1), 50 * MICRO_PER_UNIT);

    b.router
        .handle_primary(public(alice(), "#general", "!tip <@U2> 5"))
        .await;

    assert_eq!(b.ledger.submitted().len(), 1);
    let announcement = "User @alice has just tipped bob with 5 XEM".to_string();
    assert_eq!(b.primary.to_channel("#general"), vec![announcement.clone()]);
    assert!(b
        .secondary
        .to_channel("#nem")
        .contains(&announcement));
    assert!(b.secondary.to_channel("#nem").contains(&"<alice> !tip @bob 5".to_string()));
    assert_eq!(
        b.primary.to_user("U2").last().map(String::as_str),
        Some("User @alice has just tipped you with 5 XEM")
    );
}

#[tokio::test]
async fn test_malformed_public_tip_is_reported_privately() {
    let b = setup().await;
    b.router
        .handle_primary(public(alice(), "#general", "tip 5"))
        .await;

    assert_eq!(
        b.primary.to_user("U1"),
        vec!["Error in send command: couldn't find username"]
    );
    assert!(b.primary.to_channel("#general").is_empty());
}

#[tokio::test]
async fn test_direct_commands() {
    let b = setup().await;
    b.router.handle_primary(direct(alice(), "DEPOSIT")).await;
    b.router.handle_primary(direct(alice(), "withdraw N123")).await;

    let texts = b.primary.to_user("U1");
    assert!(texts[0].contains(MockLedger::generated_address(1).as_str()));
    assert!(texts[1].starts_with("target address must have 40 characters"));
    assert!(b.secondary.sent().is_empty());
}

#[tokio::test]
async fn test_bot_messages_are_ignored() {
    let b = setup().await;
    b.router
        .handle_primary(public(ChatUser::bot("B1", "tipbot"), "#general", "tip @bob 5"))
        .await;
    assert!(b.primary.sent().is_empty());
    assert!(b.secondary.sent().is_empty());
}

#[tokio::test]
async fn test_secondary_chat_is_relayed_with_author() {
    let b = setup().await;
    let carol = ChatUser::new("carol", "carol");
    b.router
        .handle_secondary(public(carol.clone(), "#NEM", "balance"))
        .await;
    b.router
        .handle_secondary(public(carol.clone(), "#other", "ignored"))
        .await;
    b.router.handle_secondary(direct(carol, "hello")).await;

    assert_eq!(
        b.primary.sent(),
        vec![Sent::Channel {
            channel: "#general".to_string(),
            text: "balance".to_string(),
            author: Some("carol".to_string()),
        }]
    );
    assert_eq!(b.ledger.generated_count(), 0);
}

mod ingress {
    use super::*;
    use axum::http::StatusCode;
    use tipbridge::api;
    use tower::util::ServiceExt;

    async fn app() -> (axum::Router, Arc<RecordingNetwork>, Arc<DepositStore>) {
        let ledger = Arc::new(MockLedger::new());
        let store = Arc::new(
            DepositStore::open(Arc::new(MemoryBackend::new()))
                .await
                .unwrap(),
        );
        let engine = Arc::new(TippingEngine::new(ledger, store.clone()));
        let primary = Arc::new(RecordingNetwork::new("primary", vec![]));
        let secondary = Arc::new(RecordingNetwork::new("secondary", vec![]));
        let mapping = ChannelMapping::parse("#general=#nem").unwrap();
        let router = Arc::new(MessageRouter::new(
            primary.clone(),
            secondary,
            mapping,
            engine,
        ));
        let app = api::create_router(api::AppState::new(router, store.clone()));
        (app, primary, store)
    }

    async fn request(
        app: axum::Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(axum::body::Body::empty()).unwrap(),
        };

        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let (app, _, _) = app().await;
        let (status, body) = request(app.clone(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = request(app, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["deposits"], 0);
    }

    #[tokio::test]
    async fn test_primary_event_is_processed_inline() {
        let (app, primary, store) = app().await;
        let event = serde_json::json!({
            "sender": {"id": "U1", "handle": "alice"},
            "channel": {"name": "D1", "kind": "direct"},
            "text": "deposit"
        });

        let (status, body) = request(app.clone(), "POST", "/v1/primary/events", Some(event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processed");
        assert_eq!(store.deposit_count().await, 1);
        assert_eq!(primary.to_user("U1").len(), 1);

        let (_, body) = request(app, "GET", "/ready", None).await;
        assert_eq!(body["deposits"], 1);
    }

    #[tokio::test]
    async fn test_secondary_event_is_relayed() {
        let (app, primary, _) = app().await;
        let event = serde_json::json!({
            "sender": {"id": "carol", "handle": "carol"},
            "channel": {"name": "#nem"},
            "text": "hello"
        });

        let (status, _) = request(app, "POST", "/v1/secondary/events", Some(event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(primary.to_channel("#general"), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_invalid_events_are_rejected() {
        let (app, primary, _) = app().await;
        let anonymous = serde_json::json!({
            "sender": {"id": " ", "handle": "ghost"},
            "channel": {"name": "#general"},
            "text": "hi"
        });
        let (status, body) =
            request(app.clone(), "POST", "/v1/primary/events", Some(anonymous)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("sender id"));

        let missing_text = serde_json::json!({
            "sender": {"id": "U1", "handle": "alice"},
            "channel": {"name": "#general"}
        });
        let (status, _) = request(app, "POST", "/v1/primary/events", Some(missing_text)).await;
        assert!(status.is_client_error());
        assert!(primary.sent().is_empty());
    }
}
