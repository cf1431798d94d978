//! Integration tests for persisted records.
//!
//! These tests run the registry against the SQLite store and verify the
//! two JSON records survive a reopen in the shape other readers expect.

use std::sync::Arc;

use sitebudget_core::storage::{DOMAIN_TIMERS_KEY, TIME_TRACKING_KEY};
use sitebudget_core::{Config, Database, DomainRegistry, KeyValueStore, Period, Records};

// 2024-03-10T12:00:00Z
const NOW: i64 = 1_710_072_000_000;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn registry_at(path: &std::path::Path) -> (Database, DomainRegistry) {
    let db = Database::open_at(path).unwrap();
    let registry = DomainRegistry::new(Records::new(Arc::new(db.clone())));
    (db, registry)
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sitebudget.db");

    {
        let (_, registry) = registry_at(&path);
        registry.seed_defaults(&Config::default(), NOW).await.unwrap();
        registry
            .add_domain("news.ycombinator.com", 10, 12, NOW)
            .await
            .unwrap();
    }

    let (db, registry) = registry_at(&path);
    let timers = registry.records().domain_timers().await.unwrap();
    assert_eq!(timers.len(), 7);
    assert_eq!(timers["news.ycombinator.com"].original_time, 600);
    assert_eq!(timers["news.ycombinator.com"].reset_interval, 12);

    // Reopening never reseeds.
    assert!(!registry.seed_defaults(&Config::default(), NOW).await.unwrap());

    let raw = db.get(DOMAIN_TIMERS_KEY).await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entry = &json["news.ycombinator.com"];
    assert_eq!(entry["originalTime"], 600);
    assert_eq!(entry["timeLeft"], 600);
    assert_eq!(entry["resetInterval"], 12);
    assert_eq!(entry["lastResetTimestamp"], NOW);
    assert_eq!(entry["expiredMessageLogged"], false);
}

#[tokio::test]
async fn test_tracking_written_by_other_clients_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let (db, registry) = registry_at(&dir.path().join("sitebudget.db"));

    db.set(vec![(
        TIME_TRACKING_KEY.to_string(),
        r#"{
            "x.com": {
                "dailyTotals": {"2024-03-10": 120, "2024-03-05": 60, "2024-01-01": 30},
                "allTimeTotal": 210,
                "trackingStartDate": "2024-01-01",
                "lastResetDate": "2024-01-01",
                "currentSessionStart": null,
                "lastActiveTimestamp": 0
            },
            "broken.com": {"dailyTotals": 5}
        }"#
        .to_string(),
    )])
    .await
    .unwrap();

    let tracking = registry.records().time_tracking().await.unwrap();
    assert!(!tracking.contains_key("broken.com"));

    let record = &tracking["x.com"];
    assert_eq!(record.time_spent(Period::Last24h, NOW), 120);
    assert_eq!(record.time_spent(Period::Last7d, NOW), 180);
    assert_eq!(record.time_spent(Period::Last30d, NOW), 180);
    assert_eq!(record.time_spent(Period::AllTime, NOW), 210);

    let pruned = registry
        .records()
        .prune_history(NOW + DAY_MS, 30)
        .await
        .unwrap();
    assert_eq!(pruned, 1);
}

#[tokio::test]
async fn test_overview_reports_usage_windows() {
    let dir = tempfile::tempdir().unwrap();
    let (_, registry) = registry_at(&dir.path().join("sitebudget.db"));
    registry.add_domain("x.com", 5, 24, NOW).await.unwrap();
    registry.add_domain("quiet.com", 5, 24, NOW).await.unwrap();

    registry
        .records()
        .update_time_tracking(|tracking| {
            let mut record = sitebudget_core::TimeTrackingRecord::new(NOW);
            record.daily_totals.insert("2024-03-10".into(), 90);
            record.daily_totals.insert("2024-02-20".into(), 40);
            record.all_time_total = 500;
            tracking.insert("x.com".into(), record);
        })
        .await
        .unwrap();

    let rows = registry.overview(NOW).await.unwrap();
    assert_eq!(rows.len(), 2);

    let quiet = rows.iter().find(|r| r.domain == "quiet.com").unwrap();
    assert_eq!(quiet.all_time, 0);

    let x = rows.iter().find(|r| r.domain == "x.com").unwrap();
    assert_eq!(x.last_24h, 90);
    assert_eq!(x.last_7d, 90);
    assert_eq!(x.last_30d, 130);
    assert_eq!(x.all_time, 500);
}
