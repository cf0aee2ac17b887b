use super::bot_api::{self, ARCHIVE, ARCHIVED_ID, UPLOADER};
use linkvault::store::ContentStore;
use serde_json::json;

#[tokio::test]
async fn owner_delete_removes_record_and_archive_copy() {
    let api = bot_api::start(&[]).await;
    let token = api.upload().await;

    api.send(bot_api::text(UPLOADER, &format!("/delete {token}")))
        .await;
    assert!(api.store.get(&token).await.unwrap().is_none());
    let deletions = api.bodies("deleteMessages").await;
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0]["chat_id"], json!(ARCHIVE));
    assert_eq!(deletions[0]["message_ids"], json!([ARCHIVED_ID]));
    assert!(
        api.texts_to(UPLOADER)
            .await
            .last()
            .is_some_and(|t| t.starts_with(&format!("Link {token} deleted")))
    );

    api.send(bot_api::text(9, &format!("/start {token}"))).await;
    assert!(api.bodies("copyMessage").await.is_empty());
    assert_eq!(
        api.texts_to(9).await.last().map(String::as_str),
        Some("This link does not exist or has expired.")
    );
}

#[tokio::test]
async fn stranger_cannot_delete_someone_elses_link() {
    let api = bot_api::start(&[]).await;
    let token = api.upload().await;

    api.send(bot_api::text(9, &format!("/delete {token}"))).await;
    assert!(api.store.get(&token).await.unwrap().is_some());
    assert!(api.bodies("deleteMessages").await.is_empty());
}
