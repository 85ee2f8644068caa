use super::*;
use dealcast::models::OwnerId;
use dealcast::pipeline::RunOutcome;
use dealcast::telegram::listener::dispatch;
use dealcast::telegram::types::Update;
use dealcast::telegram::IncomingMessage;

fn message(sender: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: ChatId::from(sender),
        message_id: 100,
        sender: Some(OwnerId(sender)),
        text: text.to_string(),
    }
}

fn update(sender: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 100,
            "from": {"id": sender, "is_bot": false},
            "chat": {"id": sender, "type": "private"},
            "text": text
        }
    }))
    .unwrap()
}

async fn setup(
    extractor: Arc<dyn DealExtractor>,
) -> (SourceRegistry, Arc<RecordingMessenger>, CommandHandler) {
    let registry = registry_with(&[]).await;
    let messenger = RecordingMessenger::new();
    let pipeline = Arc::new(pipeline(
        &registry,
        extractor,
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    ));
    let handler = command_handler(&registry, pipeline);
    (registry, messenger, handler)
}

#[tokio::test]
async fn test_non_owner_cannot_add_source() {
    let (registry, messenger, handler) = setup(Arc::new(StaticExtractor::default())).await;

    dispatch(&handler, messenger.as_ref(), update(STRANGER, "/addsource https://b.test")).await;

    assert_eq!(registry.count().await.unwrap(), 0);
    assert!(messenger.posted().is_empty());
}

#[tokio::test]
async fn test_non_owner_cannot_post_now() {
    let extractor = Arc::new(StaticExtractor::new(&[(
        "https://a.test",
        vec![Deal::new("Deal X", "https://a.test/x")],
    )]));
    let (registry, messenger, handler) = setup(extractor.clone()).await;
    registry.add("https://a.test").await.unwrap();

    dispatch(&handler, messenger.as_ref(), update(STRANGER, "/postnow")).await;

    assert!(extractor.calls().is_empty());
    assert!(messenger.posted().is_empty());
}

#[tokio::test]
async fn test_owner_adds_source_once() {
    let (registry, messenger, handler) = setup(Arc::new(StaticExtractor::default())).await;

    dispatch(&handler, messenger.as_ref(), update(OWNER, "/addsource https://b.test")).await;
    dispatch(&handler, messenger.as_ref(), update(OWNER, "/addsource https://b.test")).await;

    let sources = registry.list().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].url, "https://b.test");

    let replies: Vec<String> = messenger.posted().into_iter().map(|p| p.text).collect();
    assert_eq!(
        replies,
        vec!["✅ Added source: https://b.test", "ℹ️ Source already registered: https://b.test"]
    );
    assert!(messenger.posted().iter().all(|p| p.reply_to == Some(100)));
}

#[tokio::test]
async fn test_add_source_without_url_shows_usage() {
    let (registry, _messenger, handler) = setup(Arc::new(StaticExtractor::default())).await;

    let reply = handler.handle(&message(OWNER, "/addsource")).await;

    assert_eq!(reply.as_deref(), Some("Usage: /addsource <url>"));
    assert_eq!(registry.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ping_answers_anyone() {
    let (_registry, messenger, handler) = setup(Arc::new(StaticExtractor::default())).await;

    dispatch(&handler, messenger.as_ref(), update(STRANGER, "/ping@deal_bot")).await;

    let posted = messenger.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].text, "🏓 Pong");
    assert_eq!(posted[0].chat_id, ChatId::from(STRANGER));
}

#[tokio::test]
async fn test_command_for_other_bot_is_ignored() {
    let (_registry, messenger, handler) = setup(Arc::new(StaticExtractor::default())).await;

    dispatch(&handler, messenger.as_ref(), update(OWNER, "/ping@someone_else_bot")).await;

    assert!(messenger.posted().is_empty());
}

#[tokio::test]
async fn test_post_now_publishes_then_confirms() {
    let extractor = Arc::new(StaticExtractor::new(&[(
        "https://a.test",
        vec![Deal::new("Deal X", "https://a.test/x")],
    )]));
    let (_registry, messenger, handler) = setup(extractor).await;

    dispatch(&handler, messenger.as_ref(), update(OWNER, "/addsource https://a.test")).await;
    dispatch(&handler, messenger.as_ref(), update(OWNER, "/postnow")).await;

    let texts: Vec<String> = messenger.posted().into_iter().map(|p| p.text).collect();
    assert_eq!(
        texts,
        vec![
            "✅ Added source: https://a.test",
            "🔥 Deal X\n👉 https://a.test/x",
            "✅ Posted deals now!",
        ]
    );
}

#[tokio::test]
async fn test_post_now_during_run_reports_in_progress() {
    let registry = registry_with(&["https://a.test"]).await;
    let extractor = GatedExtractor::new(vec![]);
    let messenger = RecordingMessenger::new();
    let pipeline = Arc::new(pipeline(
        &registry,
        extractor.clone(),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    ));
    let handler = command_handler(&registry, pipeline.clone());

    let scheduled = tokio::spawn(async move { pipeline.run_once().await });
    extractor.entered.notified().await;

    let reply = handler.handle(&message(OWNER, "/postnow")).await;
    assert_eq!(reply.as_deref(), Some("⏳ A posting run is already in progress"));

    extractor.release.notify_one();
    assert!(matches!(scheduled.await.unwrap(), RunOutcome::Completed(_)));
}
