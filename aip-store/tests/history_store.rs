use aip_store::{ChatHistory, ChatStore, Message, Role};
use tempfile::TempDir;

fn store(tmp: &TempDir, max_chats: usize) -> ChatStore {
    ChatStore::new(tmp.path().join("user_history.json"), max_chats)
}

fn msg(role: Role, content: &str) -> Message {
    Message {
        role,
        content: content.to_string(),
        timestamp: "2025-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn missing_file_reads_as_empty() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);
    assert!(store.load().await.is_empty());
    assert!(store.list_ids().await.is_empty());
    assert!(store.user_inputs().await.is_empty());
}

#[tokio::test]
async fn non_object_or_garbage_reads_as_empty() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);

    tokio::fs::write(store.path(), r#"["legacy", "array", "format"]"#)
        .await
        .unwrap();
    assert!(store.load().await.is_empty());

    tokio::fs::write(store.path(), "{oops").await.unwrap();
    assert!(store.load().await.is_empty());
}

#[tokio::test]
async fn malformed_chats_are_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);
    tokio::fs::write(
        store.path(),
        r#"{"good":[{"role":"user","content":"hi","timestamp":"t"}],"bad":"nope"}"#,
    )
    .await
    .unwrap();

    let history = store.load().await;
    assert_eq!(history.len(), 1);
    assert!(history.contains_key("good"));
}

#[tokio::test]
async fn create_replace_append_delete_cycle() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);

    let id = store.create_chat().await.unwrap();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(store.messages(&id).await, Some(Vec::new()));

    store
        .replace(&id, vec![msg(Role::User, "first")])
        .await
        .unwrap();
    assert!(store
        .append(&id, vec![msg(Role::Ai, "reply"), msg(Role::User, "second")])
        .await
        .unwrap());
    let messages = store.messages(&id).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::Ai);

    assert!(!store.append("unknown", vec![msg(Role::User, "x")]).await.unwrap());
    assert!(store.messages("unknown").await.is_none());

    assert!(store.delete(&id).await.unwrap());
    assert!(!store.delete(&id).await.unwrap());
    assert!(store.list_ids().await.is_empty());
}

#[tokio::test]
async fn save_keeps_only_the_newest_chats_in_order() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 3);

    let mut history = ChatHistory::new();
    for i in 0..5 {
        history.insert(format!("chat-{i}"), vec![msg(Role::User, &format!("q{i}"))]);
    }
    store.save(history).await.unwrap();

    assert_eq!(store.list_ids().await, vec!["chat-2", "chat-3", "chat-4"]);
}

#[tokio::test]
async fn trimming_drops_the_oldest_chats_not_the_lowest_ids() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 3);
    for id in ["z", "y", "x", "w"] {
        store.replace(id, vec![msg(Role::User, id)]).await.unwrap();
    }

    assert_eq!(store.list_ids().await, vec!["y", "x", "w"]);
    assert_eq!(store.user_inputs().await, vec!["y", "x", "w"]);
}

#[tokio::test]
async fn new_chat_survives_trimming_of_a_full_history() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 2);
    // Ids that sort after any uuid, so key order and insertion order disagree.
    store.replace("zz-old", vec![]).await.unwrap();
    store.replace("zz-older", vec![]).await.unwrap();

    let id = store.create_chat().await.unwrap();
    assert_eq!(store.list_ids().await, vec!["zz-older".to_string(), id.clone()]);
    assert_eq!(store.messages(&id).await, Some(Vec::new()));
}

#[tokio::test]
async fn replacing_an_existing_chat_keeps_its_position() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);
    store.replace("b", vec![]).await.unwrap();
    store.replace("a", vec![]).await.unwrap();
    store
        .replace("b", vec![msg(Role::User, "updated")])
        .await
        .unwrap();
    assert_eq!(store.list_ids().await, vec!["b", "a"]);
}

#[tokio::test]
async fn user_inputs_flatten_all_chats_in_file_order() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);
    store
        .replace(
            "zeta",
            vec![msg(Role::User, "alpha"), msg(Role::Ai, "ignored")],
        )
        .await
        .unwrap();
    store
        .replace("alpha", vec![msg(Role::User, "beta")])
        .await
        .unwrap();

    assert_eq!(store.user_inputs().await, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn file_is_pretty_printed_json_object() {
    let tmp = TempDir::new().unwrap();
    let store = store(&tmp, 10);
    store
        .replace("c", vec![msg(Role::User, "hello")])
        .await
        .unwrap();

    let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
    assert!(raw.starts_with("{\n  \"c\": ["));
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["c"][0]["role"], "user");
}

#[tokio::test]
async fn concurrent_appends_are_not_lost() {
    let tmp = TempDir::new().unwrap();
    let store = std::sync::Arc::new(store(&tmp, 10));
    store.replace("c", vec![]).await.unwrap();

    let appends = (0..8).map(|i| {
        let store = store.clone();
        async move {
            store
                .append("c", vec![msg(Role::User, &format!("m{i}"))])
                .await
                .unwrap()
        }
    });
    let results = futures::future::join_all(appends).await;
    assert!(results.into_iter().all(|appended| appended));
    assert_eq!(store.messages("c").await.unwrap().len(), 8);
}
