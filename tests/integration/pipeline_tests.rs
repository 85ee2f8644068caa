use super::*;
use dealcast::extractor::HtmlDealExtractor;
use dealcast::fetcher::HttpFetcher;
use dealcast::pipeline::RunOutcome;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completed(outcome: RunOutcome) -> dealcast::pipeline::RunReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::Skipped => panic!("run was skipped"),
    }
}

#[tokio::test]
async fn test_single_deal_reaches_channel() {
    let registry = registry_with(&["https://a.test"]).await;
    let extractor = StaticExtractor::new(&[(
        "https://a.test",
        vec![Deal::new("Deal X", "https://a.test/x")],
    )]);
    let messenger = RecordingMessenger::new();

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.published, 1);
    assert_eq!(messenger.channel_texts(), vec!["🔥 Deal X\n👉 https://a.test/x"]);
}

#[tokio::test]
async fn test_unreachable_source_posts_nothing() {
    let registry = registry_with(&["https://down.test"]).await;
    let messenger = RecordingMessenger::new();

    let pipeline = pipeline(
        &registry,
        Arc::new(StaticExtractor::default()),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.published, 0);
    assert!(messenger.posted().is_empty());
}

#[tokio::test]
async fn test_failed_conversion_posts_original_link() {
    let registry = registry_with(&["https://a.test"]).await;
    let extractor = StaticExtractor::new(&[(
        "https://a.test",
        vec![
            Deal::new("Deal X", "https://a.test/x"),
            Deal::new("Deal Y", "https://a.test/y"),
        ],
    )]);
    let messenger = RecordingMessenger::new();

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::Automated(Arc::new(FailingBackend)),
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.link_fallbacks, 2);
    assert_eq!(
        messenger.channel_texts(),
        vec!["🔥 Deal X\n👉 https://a.test/x", "🔥 Deal Y\n👉 https://a.test/y"]
    );
}

#[tokio::test]
async fn test_converted_link_is_posted() {
    let registry = registry_with(&["https://a.test"]).await;
    let extractor = StaticExtractor::new(&[(
        "https://a.test",
        vec![Deal::new("Deal X", "https://a.test/x")],
    )]);
    let messenger = RecordingMessenger::new();

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::Automated(Arc::new(PrefixBackend)),
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.link_fallbacks, 0);
    assert_eq!(
        messenger.channel_texts(),
        vec!["🔥 Deal X\n👉 https://ekaro.in/enkr?url=https://a.test/x"]
    );
}

#[tokio::test]
async fn test_rejected_post_does_not_stop_run() {
    let registry = registry_with(&["https://a.test", "https://b.test"]).await;
    let extractor = StaticExtractor::new(&[
        (
            "https://a.test",
            vec![
                Deal::new("Bad", "https://a.test/bad"),
                Deal::new("Good", "https://a.test/good"),
            ],
        ),
        ("https://b.test", vec![Deal::new("Other", "https://b.test/1")]),
    ]);
    let messenger = RecordingMessenger::rejecting(&["🔥 Bad\n👉 https://a.test/bad"]);

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.publish_failures, 1);
    assert_eq!(report.published, 2);
    assert_eq!(
        messenger.channel_texts(),
        vec!["🔥 Good\n👉 https://a.test/good", "🔥 Other\n👉 https://b.test/1"]
    );
}

#[tokio::test]
async fn test_posts_are_paced() {
    let registry = registry_with(&["https://a.test"]).await;
    let deals = (1..=4)
        .map(|i| Deal::new(format!("Deal {}", i), format!("https://a.test/{}", i)))
        .collect();
    let extractor = StaticExtractor::new(&[("https://a.test", deals)]);
    let messenger = RecordingMessenger::new();
    let delay = Duration::from_millis(50);

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::PassThrough,
        messenger.clone(),
        delay,
        true,
    );
    completed(pipeline.run_once().await);

    let posted = messenger.posted();
    assert_eq!(posted.len(), 4);
    for pair in posted.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= delay);
    }
    assert!(posted[3].at.duration_since(posted[0].at) >= delay * 3);
}

#[tokio::test]
async fn test_listing_page_is_capped_and_resolved() {
    let server = MockServer::start().await;
    let cards: String = (1..=25)
        .map(|i| format!(r#"<div class="deal-card"><a href="/d/{i}">Deal {i}</a></div>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/deals"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><body>{}</body></html>", cards)),
        )
        .mount(&server)
        .await;

    let source = format!("{}/deals", server.uri());
    let registry = registry_with(&[source.as_str()]).await;

    let fetcher = Arc::new(assert_ok!(HttpFetcher::new(Duration::from_secs(5), "dealcast-test")));
    let extractor = assert_ok!(HtmlDealExtractor::new(fetcher, ".deal-card", 10));
    let messenger = RecordingMessenger::new();

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.deals_found, 10);
    let texts = messenger.channel_texts();
    assert_eq!(texts.len(), 10);
    assert_eq!(texts[0], format!("🔥 Deal 1\n👉 {}/d/1", server.uri()));
    assert_eq!(texts[9], format!("🔥 Deal 10\n👉 {}/d/10", server.uri()));
}

#[tokio::test]
async fn test_server_error_page_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let registry = registry_with(&[server.uri().as_str()]).await;
    let fetcher = Arc::new(assert_ok!(HttpFetcher::new(Duration::from_secs(5), "dealcast-test")));
    let extractor = assert_ok!(HtmlDealExtractor::new(fetcher, ".deal-card", 10));
    let messenger = RecordingMessenger::new();

    let pipeline = pipeline(
        &registry,
        Arc::new(extractor),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    );
    let report = completed(pipeline.run_once().await);

    assert_eq!(report.sources_failed, 1);
    assert!(messenger.posted().is_empty());
}

#[tokio::test]
async fn test_each_registered_source_is_visited_once_per_run() {
    let registry = registry_with(&["https://a.test", "https://b.test"]).await;
    registry.add("https://a.test").await.unwrap();

    let extractor = Arc::new(StaticExtractor::new(&[
        ("https://a.test", vec![]),
        ("https://b.test", vec![]),
    ]));
    let pipeline = pipeline(
        &registry,
        extractor.clone(),
        LinkTransformer::PassThrough,
        RecordingMessenger::new(),
        Duration::ZERO,
        true,
    );

    completed(pipeline.run_once().await);
    assert_eq!(extractor.calls(), vec!["https://a.test", "https://b.test"]);
}

#[tokio::test]
async fn test_overlapping_run_is_skipped() {
    let registry = registry_with(&["https://a.test"]).await;
    let extractor = GatedExtractor::new(vec![Deal::new("Deal X", "https://a.test/x")]);
    let messenger = RecordingMessenger::new();

    let pipeline = Arc::new(pipeline(
        &registry,
        extractor.clone(),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        true,
    ));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_once().await }
    });
    extractor.entered.notified().await;

    assert_eq!(pipeline.run_once().await, RunOutcome::Skipped);

    extractor.release.notify_one();
    let report = completed(first.await.unwrap());
    assert_eq!(report.published, 1);
    assert_eq!(messenger.channel_texts().len(), 1);
}

#[tokio::test]
async fn test_overlap_allowed_without_single_flight() {
    let registry = registry_with(&["https://a.test"]).await;
    let extractor = GatedExtractor::new(vec![Deal::new("Deal X", "https://a.test/x")]);
    let messenger = RecordingMessenger::new();

    let pipeline = Arc::new(pipeline(
        &registry,
        extractor.clone(),
        LinkTransformer::PassThrough,
        messenger.clone(),
        Duration::ZERO,
        false,
    ));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_once().await }
    });
    extractor.entered.notified().await;

    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_once().await }
    });
    extractor.entered.notified().await;

    extractor.release.notify_one();
    extractor.release.notify_one();

    completed(first.await.unwrap());
    completed(second.await.unwrap());
    assert_eq!(messenger.channel_texts().len(), 2);
}
