use super::*;
use serde_json::json;
use shopwatch::config::NotificationsConfig;
use shopwatch::scraper::StaticPageProvider;
use shopwatch::storage::MemorySnapshotStore;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOP_URL: &str = "https://shop.example/drops";

fn notifications(sms_base: &str, chat_base: &str) -> NotificationsConfig {
    let mut config = NotificationsConfig::default();
    config.delivery_timeout = 5;

    config.sms.enabled = true;
    config.sms.account_sid = "ACintegration".to_string();
    config.sms.auth_token = "token".to_string();
    config.sms.from_number = "+15550001".to_string();
    config.sms.to_number = "+15550002".to_string();
    config.sms.api_base = sms_base.to_string();

    config.chat.enabled = true;
    config.chat.bot_token = "bot-token".to_string();
    config.chat.channel_id = "42".to_string();
    config.chat.api_base = chat_base.to_string();

    config
}

fn monitor_with(config: &NotificationsConfig, snapshot: Arc<MemorySnapshotStore>) -> ListingMonitor {
    let provider = StaticPageProvider::new().with_page(
        SHOP_URL,
        &shop_page(&[("Sneaker X", "$150.00", "/p/sneaker-x")]),
    );
    ListingMonitor::new(
        Arc::new(vec![shop_rule("Drops", SHOP_URL)]),
        snapshot,
        ListingExtractor::new(Arc::new(provider), RENDER_TIMEOUT),
        NotificationDispatcher::from_config(config),
    )
}

#[tokio::test]
async fn test_sms_and_chat_delivered_over_http() {
    let sms = MockServer::start().await;
    let chat = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"/Accounts/ACintegration/Messages\.json$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM1"})))
        .expect(1)
        .mount(&sms)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/42/messages"))
        .and(header("authorization", "Bot bot-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "777"})))
        .expect(1)
        .mount(&chat)
        .await;

    let snapshot = Arc::new(MemorySnapshotStore::default());
    let monitor = monitor_with(&notifications(&sms.uri(), &chat.uri()), snapshot.clone());

    let report = monitor.run_cycle().await;
    let dispatch = report.dispatch.unwrap();

    assert_eq!(dispatch.succeeded(), 2);
    assert!(dispatch.outcome("sms").unwrap().is_success());
    assert!(dispatch.outcome("discord").unwrap().is_success());
    assert_eq!(snapshot.listings()[0].name, "Sneaker X");
}

#[tokio::test]
async fn test_rejected_sms_does_not_block_chat() {
    let sms = MockServer::start().await;
    let chat = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid To number"))
        .mount(&sms)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/42/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "778"})))
        .expect(1)
        .mount(&chat)
        .await;

    let snapshot = Arc::new(MemorySnapshotStore::default());
    let monitor = monitor_with(&notifications(&sms.uri(), &chat.uri()), snapshot.clone());

    let report = monitor.run_cycle().await;
    let dispatch = report.dispatch.unwrap();

    assert_eq!(dispatch.succeeded(), 1);
    assert_eq!(dispatch.failed(), 1);
    match &dispatch.outcome("sms").unwrap().result {
        Err(DeliveryError::Rejected { .. }) => {}
        other => panic!("expected rejected SMS, got {:?}", other),
    }
    assert!(report.snapshot_persisted);
    assert_eq!(snapshot.save_count(), 1);
}

#[tokio::test]
async fn test_unauthorized_chat_is_reported_as_authentication() {
    let sms = MockServer::start().await;
    let chat = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM2"})))
        .mount(&sms)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "401: Unauthorized"})))
        .mount(&chat)
        .await;

    let monitor = monitor_with(
        &notifications(&sms.uri(), &chat.uri()),
        Arc::new(MemorySnapshotStore::default()),
    );

    let report = monitor.run_cycle().await;
    let dispatch = report.dispatch.unwrap();

    let chat_outcome = dispatch.outcome("discord").unwrap();
    assert_eq!(chat_outcome.result.as_ref().unwrap_err().category(), "authentication");
    assert!(dispatch.outcome("sms").unwrap().is_success());
}
