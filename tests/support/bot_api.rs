//! Mock Bot API plus an `App` wired to it over real HTTP.

use linkvault::Config;
use linkvault::bot::App;
use linkvault::chat::ChatPlatform;
use linkvault::config::GateChannel;
use linkvault::store::{ContentStore, SqliteStore};
use linkvault::telegram::{TelegramClient, Update};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "42:TEST";
pub const ARCHIVE: i64 = -100_500;
pub const ARCHIVED_ID: i64 = 77;
pub const UPLOADER: i64 = 7;

static NEXT_ID: AtomicI64 = AtomicI64::new(1);

pub struct BotApi {
    pub server: MockServer,
    pub app: App,
    pub store: SqliteStore,
}

pub fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
}

pub fn endpoint(name: &str) -> String {
    format!("/bot{TOKEN}/{name}")
}

/// Lower priority than anything a test mounts itself.
async fn mount_default(server: &MockServer, name: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path(endpoint(name)))
        .respond_with(ok(result))
        .with_priority(10)
        .mount(server)
        .await;
}

pub async fn start(gate: &[&str]) -> BotApi {
    let server = MockServer::start().await;
    mount_default(
        &server,
        "forwardMessage",
        json!({ "message_id": ARCHIVED_ID, "chat": { "id": ARCHIVE, "type": "channel" } }),
    )
    .await;
    mount_default(
        &server,
        "sendMessage",
        json!({ "message_id": 1, "chat": { "id": 0, "type": "private" } }),
    )
    .await;
    mount_default(&server, "copyMessage", json!({ "message_id": 500 })).await;
    mount_default(&server, "deleteMessages", json!(true)).await;
    mount_default(&server, "answerCallbackQuery", json!(true)).await;
    mount_default(&server, "getChatMember", json!({ "status": "member" })).await;

    let mut config = Config::default();
    config.telegram.bot_token = TOKEN.into();
    config.telegram.api_base = server.uri();
    config.telegram.archive_channel = ARCHIVE;
    config.telegram.admin_ids = vec![UPLOADER];
    config.gate.channels = gate.iter().map(|c| GateChannel::new(*c)).collect();
    config.delivery.item_delay_ms = 0;
    config.delivery.auto_delete_secs = None;

    let store = SqliteStore::open("sqlite::memory:", 1).await.unwrap();
    let client = Arc::new(TelegramClient::with_api_base(TOKEN.into(), &server.uri()));
    let app = App::new(
        &config,
        client as Arc<dyn ChatPlatform>,
        &store,
        "vault_bot".into(),
    );
    BotApi { server, app, store }
}

impl BotApi {
    pub async fn send(&self, update: Value) {
        let update: Update = serde_json::from_value(update).unwrap();
        self.app.handle_update(update).await;
    }

    /// JSON bodies posted to one Bot API method, in order.
    pub async fn bodies(&self, name: &str) -> Vec<Value> {
        let endpoint = endpoint(name);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == endpoint)
            .map(|request| request.body_json::<Value>().unwrap())
            .collect()
    }

    pub async fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.bodies("sendMessage")
            .await
            .into_iter()
            .filter(|body| body["chat_id"] == json!(chat_id))
            .filter_map(|body| body["text"].as_str().map(str::to_string))
            .collect()
    }

    /// Upload one document as the uploader and return its token.
    pub async fn upload(&self) -> String {
        self.send(message(UPLOADER, json!({ "document": { "file_id": "doc" } })))
            .await;
        let records = self.store.list_by_owner(UPLOADER, 10).await.unwrap();
        assert_eq!(records.len(), 1);
        records[0].token.clone()
    }
}

pub fn message(user: i64, body: Value) -> Value {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let mut message = json!({
        "message_id": id,
        "date": 0,
        "from": { "id": user, "is_bot": false, "first_name": "Tester" },
        "chat": { "id": user, "type": "private" },
    });
    if let (Some(target), Some(extra)) = (message.as_object_mut(), body.as_object()) {
        target.extend(extra.clone());
    }
    json!({ "update_id": id, "message": message })
}

pub fn text(user: i64, text: &str) -> Value {
    message(user, json!({ "text": text }))
}

pub fn callback(user: i64, data: &str, prompt_id: i64) -> Value {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    json!({
        "update_id": id,
        "callback_query": {
            "id": format!("cb-{id}"),
            "from": { "id": user, "is_bot": false, "first_name": "Tester" },
            "message": { "message_id": prompt_id, "date": 0, "chat": { "id": user, "type": "private" } },
            "data": data
        }
    })
}
