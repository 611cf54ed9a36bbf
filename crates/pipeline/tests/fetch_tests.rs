use chrono::{TimeZone, Utc};
use pipeline::{fetch_new, plan_queries, ProductKey};
use storage::LocalInventory;
use test_utils::{
    goes_local_name, goes_remote_key, hours_before, names_in, radar_local_name,
    radar_remote_key, seed_keys, PrefixFailingStore, StreamDirs,
};

#[tokio::test]
async fn test_downloads_only_missing_objects() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 20, 0).unwrap();
    let t1 = hours_before(now, 0.25);
    let t2 = hours_before(now, 1.1);
    let store = seed_keys(&[
        goes_remote_key("ABI-L2-CMIPC", "C13", t1),
        goes_remote_key("ABI-L2-CMIPC", "C13", t2),
        goes_remote_key("ABI-L2-CMIPC", "C01", t1),
    ])
    .await;

    let dirs = StreamDirs::new();
    let product = ProductKey::goes("ABI-L2-CMIPC", "C13");
    let queries = plan_queries(2.0, now, &product);
    let mut inventory = LocalInventory::scan(dirs.raw_dir()).unwrap();

    let first = fetch_new(&store, &product, &queries, &mut inventory, &dirs.raw_dir(), false).await;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].timestamp.timestamp(), t2.timestamp());
    assert_eq!(
        names_in(&dirs.raw_dir()),
        vec![goes_local_name("C13", t2), goes_local_name("C13", t1)]
    );

    let second = fetch_new(&store, &product, &queries, &mut inventory, &dirs.raw_dir(), false).await;
    assert!(second.is_empty(), "already-present objects are not downloaded again");

    let forced = fetch_new(&store, &product, &queries, &mut inventory, &dirs.raw_dir(), true).await;
    assert_eq!(forced.len(), 2);
}

#[tokio::test]
async fn test_inventory_survives_restart() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 20, 0).unwrap();
    let store = seed_keys(&[goes_remote_key("ABI-L2-CMIPC", "C13", hours_before(now, 0.5))]).await;
    let dirs = StreamDirs::new();
    let product = ProductKey::goes("ABI-L2-CMIPC", "C13");
    let queries = plan_queries(1.0, now, &product);

    let mut inventory = LocalInventory::scan(dirs.raw_dir()).unwrap();
    assert_eq!(fetch_new(&store, &product, &queries, &mut inventory, &dirs.raw_dir(), false).await.len(), 1);

    let mut rescanned = LocalInventory::scan(dirs.raw_dir()).unwrap();
    assert!(fetch_new(&store, &product, &queries, &mut rescanned, &dirs.raw_dir(), false)
        .await
        .is_empty());
}

#[tokio::test]
async fn test_listing_failure_skips_only_that_prefix() {
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 1, 30, 0).unwrap();
    let yesterday = Utc.with_ymd_and_hms(2024, 3, 1, 23, 10, 0).unwrap();
    let today = Utc.with_ymd_and_hms(2024, 3, 2, 0, 40, 0).unwrap();

    let inner = seed_keys(&[
        radar_remote_key("KFSX", yesterday),
        radar_remote_key("KFSX", today),
        format!("{}_MDM", radar_remote_key("KFSX", today)),
    ])
    .await;
    let store = PrefixFailingStore {
        inner,
        failing_prefix: "2024/03/01/KFSX".to_string(),
    };

    let dirs = StreamDirs::new();
    let product = ProductKey::radar("KFSX");
    let queries = plan_queries(3.0, now, &product);
    let mut inventory = LocalInventory::scan(dirs.raw_dir()).unwrap();

    let fetched = fetch_new(&store, &product, &queries, &mut inventory, &dirs.raw_dir(), false).await;
    let names: Vec<&str> = fetched.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec![radar_local_name("KFSX", today).as_str()]);
}
