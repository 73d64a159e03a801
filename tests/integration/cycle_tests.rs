use super::*;
use shopwatch::scraper::StaticPageProvider;
use shopwatch::storage::{JsonFile, MemorySnapshotStore};

const SHOP_URL: &str = "https://shop.example/new-arrivals";
const OTHER_URL: &str = "https://other.example/latest";

#[tokio::test]
async fn test_new_listing_is_notified_and_snapshot_replaced() {
    let provider = StaticPageProvider::new().with_page(
        SHOP_URL,
        &shop_page(&[
            ("A", "$10.00", "https://shop.example/p/A"),
            ("B", "$12.00", "https://shop.example/p/B"),
        ]),
    );
    let snapshot = Arc::new(MemorySnapshotStore::new(vec![listing("A", "Shop")]));
    let sms = RecordingNotifier::new("sms");
    let chat = RecordingNotifier::new("discord");
    let (sms_events, chat_events) = (sms.events.clone(), chat.events.clone());

    let monitor = build_monitor(
        provider,
        Arc::new(vec![shop_rule("Shop", SHOP_URL)]),
        snapshot.clone(),
        vec![Box::new(sms), Box::new(chat)],
    );

    let report = monitor.run_cycle().await;

    let new_names: Vec<_> = report.new_listings.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(new_names, vec!["B"]);

    for events in [&sms_events, &chat_events] {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].plain_text().contains("B"));
        assert_eq!(events[0].listings.len(), 1);
    }

    let dispatch = report.dispatch.expect("dispatch should have run");
    assert_eq!(dispatch.succeeded(), 2);

    assert!(report.snapshot_persisted);
    let names: Vec<_> = snapshot.listings().into_iter().map(|l| l.name).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_store_leaves_snapshot_unchanged() {
    let provider = StaticPageProvider::new()
        .with_page(SHOP_URL, &shop_page(&[("A", "$10.00", "/p/A")]))
        .with_delay(SHOP_URL, Duration::from_secs(300));
    let before = vec![listing("A", "Shop")];
    let snapshot = Arc::new(MemorySnapshotStore::new(before.clone()));
    let sms = RecordingNotifier::new("sms");
    let sms_events = sms.events.clone();

    let monitor = build_monitor(
        provider,
        Arc::new(vec![shop_rule("Shop", SHOP_URL)]),
        snapshot.clone(),
        vec![Box::new(sms)],
    );

    let report = monitor.run_cycle().await;

    assert_eq!(report.failed_stores().len(), 1);
    let error = report.stores[0].error.as_deref().unwrap();
    assert!(error.contains("Timed out"), "unexpected error: {}", error);
    assert!(report.new_listings.is_empty());
    assert!(report.dispatch.is_none());
    assert!(!report.snapshot_persisted);
    assert_eq!(snapshot.save_count(), 0);
    assert_eq!(snapshot.listings(), before);
    assert!(sms_events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_store_does_not_stop_others() {
    // OTHER_URL has no page, so it is unreachable
    let provider = StaticPageProvider::new()
        .with_page(SHOP_URL, &shop_page(&[("A", "$10.00", "/p/A")]));
    let snapshot = Arc::new(MemorySnapshotStore::default());

    let monitor = build_monitor(
        provider,
        Arc::new(vec![shop_rule("Other", OTHER_URL), shop_rule("Shop", SHOP_URL)]),
        snapshot.clone(),
        vec![Box::new(RecordingNotifier::new("sms"))],
    );

    let report = monitor.run_cycle().await;

    assert_eq!(report.stores.len(), 2);
    assert!(!report.stores[0].is_success());
    assert!(report.stores[1].is_success());
    assert_eq!(report.listings_seen, 1);
    assert_eq!(report.new_listings[0].link, "https://shop.example/p/A");
    assert!(report.snapshot_persisted);
}

#[tokio::test]
async fn test_price_change_does_not_notify() {
    let provider = StaticPageProvider::new()
        .with_page(SHOP_URL, &shop_page(&[("A", "$99.00", "https://shop.example/p/A-v2")]));
    let snapshot = Arc::new(MemorySnapshotStore::new(vec![listing("A", "Shop")]));
    let sms = RecordingNotifier::new("sms");
    let sms_events = sms.events.clone();

    let monitor = build_monitor(
        provider,
        Arc::new(vec![shop_rule("Shop", SHOP_URL)]),
        snapshot.clone(),
        vec![Box::new(sms)],
    );

    let report = monitor.run_cycle().await;

    assert!(report.new_listings.is_empty());
    assert!(sms_events.lock().unwrap().is_empty());
    assert_eq!(snapshot.listings()[0].price, "$10.00");
}

#[tokio::test]
async fn test_invalid_rule_is_skipped() {
    let provider = StaticPageProvider::new()
        .with_page(SHOP_URL, &shop_page(&[("A", "$10.00", "/p/A")]));
    let mut broken = shop_rule("Broken", OTHER_URL);
    broken.selectors.link = String::new();

    let monitor = build_monitor(
        provider,
        Arc::new(vec![broken, shop_rule("Shop", SHOP_URL)]),
        Arc::new(MemorySnapshotStore::default()),
        vec![],
    );

    let report = monitor.run_cycle().await;

    assert_eq!(report.rejected_rules, 1);
    assert_eq!(report.stores.len(), 1);
    assert_eq!(report.stores[0].store_name, "Shop");
    assert_eq!(report.new_listings.len(), 1);
}

#[tokio::test]
async fn test_snapshot_persisted_even_when_every_channel_fails() {
    let provider = StaticPageProvider::new()
        .with_page(SHOP_URL, &shop_page(&[("A", "$10.00", "/p/A")]));
    let snapshot = Arc::new(MemorySnapshotStore::default());

    let monitor = build_monitor(
        provider,
        Arc::new(vec![shop_rule("Shop", SHOP_URL)]),
        snapshot.clone(),
        vec![Box::new(RecordingNotifier::failing(
            "sms",
            DeliveryError::Authentication("bad token".to_string()),
        ))],
    );

    let report = monitor.run_cycle().await;

    assert_eq!(report.dispatch.unwrap().failed(), 1);
    assert!(report.snapshot_persisted);
    assert_eq!(snapshot.listings().len(), 1);
}

#[tokio::test]
async fn test_file_backed_cycle_bootstraps_from_malformed_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let rules_path = dir.path().join("stores.json");
    let snapshot_path = dir.path().join("listings.json");

    std::fs::write(
        &rules_path,
        serde_json::to_string(&vec![shop_rule("Shop", SHOP_URL).with_link_base("https://shop.example")]).unwrap(),
    )
    .unwrap();
    std::fs::write(&snapshot_path, "[{\"broken\":").unwrap();

    let provider = StaticPageProvider::new().with_page(
        SHOP_URL,
        &shop_page(&[("A", "$10.00", "/p/A"), ("B", "$12.00", "/p/B")]),
    );
    let monitor = build_monitor(
        provider,
        Arc::new(JsonFile::new(&rules_path)),
        Arc::new(JsonFile::new(&snapshot_path)),
        vec![Box::new(RecordingNotifier::new("email"))],
    );

    let first = monitor.run_cycle().await;
    assert_eq!(first.new_listings.len(), 2);
    assert!(first.snapshot_persisted);

    let saved: Vec<Listing> = serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(saved[1].link, "https://shop.example/p/B");

    let second = monitor.run_cycle().await;
    assert!(second.new_listings.is_empty());
    assert!(!second.snapshot_persisted);
}

#[tokio::test]
async fn test_missing_rule_file_is_a_no_op_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = build_monitor(
        StaticPageProvider::new(),
        Arc::new(JsonFile::new(dir.path().join("absent.json"))),
        Arc::new(MemorySnapshotStore::default()),
        vec![],
    );

    let report = monitor.run_cycle().await;

    assert!(report.stores.is_empty());
    assert_eq!(report.listings_seen, 0);
    assert!(!report.snapshot_persisted);
}

#[tokio::test]
async fn test_concurrent_extraction_keeps_rule_order() {
    let provider = StaticPageProvider::new()
        .with_page(SHOP_URL, &shop_page(&[("A", "$10.00", "/p/A")]))
        .with_delay(SHOP_URL, Duration::from_millis(50))
        .with_page(OTHER_URL, &shop_page(&[("Z", "$1.00", "/p/Z")]));

    let monitor = build_monitor(
        provider,
        Arc::new(vec![shop_rule("Shop", SHOP_URL), shop_rule("Other", OTHER_URL)]),
        Arc::new(MemorySnapshotStore::default()),
        vec![],
    )
    .with_max_concurrent_stores(2);

    let report = monitor.run_cycle().await;

    let names: Vec<_> = report.new_listings.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["A", "Z"]);
}
