use super::bot_api::{self, ARCHIVE, ARCHIVED_ID, endpoint, ok};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::Mock;

const READER: i64 = 8;

#[tokio::test]
async fn ungated_link_copies_archived_file() {
    let api = bot_api::start(&[]).await;
    let token = api.upload().await;

    let forwards = api.bodies("forwardMessage").await;
    assert_eq!(forwards.len(), 1);
    assert_eq!(forwards[0]["chat_id"], json!(ARCHIVE));
    assert!(
        api.texts_to(bot_api::UPLOADER)
            .await
            .iter()
            .any(|t| t.contains(&format!("https://t.me/vault_bot?start={token}")))
    );

    api.send(bot_api::text(READER, &format!("/start {token}")))
        .await;
    let copies = api.bodies("copyMessage").await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0]["chat_id"], json!(READER));
    assert_eq!(copies[0]["from_chat_id"], json!(ARCHIVE));
    assert_eq!(copies[0]["message_id"], json!(ARCHIVED_ID));
}

#[tokio::test]
async fn gate_denies_until_member_then_delivers_on_check() {
    let api = bot_api::start(&["@news"]).await;
    Mock::given(method("POST"))
        .and(path(endpoint("getChatMember")))
        .and(body_partial_json(json!({ "chat_id": "@news", "user_id": READER })))
        .respond_with(ok(json!({ "status": "left" })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&api.server)
        .await;
    let token = api.upload().await;

    api.send(bot_api::text(READER, &format!("/start {token}")))
        .await;
    assert!(api.bodies("copyMessage").await.is_empty());
    let prompt = api
        .bodies("sendMessage")
        .await
        .into_iter()
        .rfind(|body| body["chat_id"] == json!(READER))
        .unwrap();
    assert!(prompt["text"].as_str().unwrap().contains("@news"));
    let rows = prompt["reply_markup"]["inline_keyboard"].as_array().unwrap();
    assert_eq!(rows[0][0]["url"], json!("https://t.me/news"));
    assert_eq!(
        rows.last().unwrap()[0]["callback_data"],
        json!(format!("check:{token}"))
    );

    api.send(bot_api::callback(READER, &format!("check:{token}"), 321))
        .await;
    assert_eq!(api.bodies("answerCallbackQuery").await.len(), 1);
    let copies = api.bodies("copyMessage").await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0]["chat_id"], json!(READER));
    assert!(
        api.bodies("deleteMessages")
            .await
            .iter()
            .any(|body| body["chat_id"] == json!(READER) && body["message_ids"] == json!([321]))
    );
}

#[tokio::test]
async fn membership_lookup_failure_keeps_gate_closed() {
    let api = bot_api::start(&["@news"]).await;
    Mock::given(method("POST"))
        .and(path(endpoint("getChatMember")))
        .respond_with(
            wiremock::ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })),
        )
        .with_priority(1)
        .mount(&api.server)
        .await;
    let token = api.upload().await;

    api.send(bot_api::text(READER, &format!("/start {token}")))
        .await;
    assert!(api.bodies("copyMessage").await.is_empty());
    assert!(
        api.texts_to(READER)
            .await
            .last()
            .is_some_and(|t| t.contains("Join these channels"))
    );
}
