//! Contract Test: Outage Scenarios
//!
//! End-to-end scenarios from raw router log lines to stored outages.
//!
//! Constraints verified:
//! - disconnect then connect yields one closed interval with its duration
//! - a planned hint turns the next interval into a planned one
//! - a trailing disconnect stays open
//! - IPv6 is tracked independently of IPv4

mod common;

use chrono::NaiveDate;
use common::*;
use linewatch_core::model::{OutageRecord, OutageStatus, Protocol};
use linewatch_core::traits::OutageStore;
use linewatch_core::MemoryStore;
use std::sync::Arc;

async fn outages_for(lines: &[&str]) -> Vec<OutageRecord> {
    let router = Arc::new(ScriptedRouter::new(true).with_log(lines));
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(router, &store, &idle_config());

    tracker.sync_log_once().await.expect("sync succeeds");
    store.list_outages().await.unwrap()
}

#[tokio::test]
async fn disconnect_then_reconnect_is_closed() {
    let outages = outages_for(&[V4_DOWN, V4_UP]).await;

    assert_eq!(outages.len(), 1);
    let outage = &outages[0];
    assert_eq!(outage.protocol, Some(Protocol::Ipv4));
    assert_eq!(outage.status, OutageStatus::Closed);
    assert_eq!(outage.duration_seconds, Some(300));
    assert_eq!(
        outage.start_time,
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    );
    assert!(outage.start_log_entry_id.is_some());
    assert!(outage.end_log_entry_id.is_some());
}

#[tokio::test]
async fn planned_hint_marks_outage_planned() {
    let outages = outages_for(&[PLANNED, V4_DOWN, V4_UP]).await;

    assert_eq!(outages.len(), 1);
    assert_eq!(outages[0].status, OutageStatus::Planned);
    assert_eq!(outages[0].duration_seconds, Some(300));
}

#[tokio::test]
async fn trailing_disconnect_stays_open() {
    let outages = outages_for(&[V4_DOWN]).await;

    assert_eq!(outages.len(), 1);
    assert_eq!(outages[0].status, OutageStatus::Open);
    assert_eq!(outages[0].end_time, None);
    assert_eq!(outages[0].duration_seconds, None);
}

#[tokio::test]
async fn planned_trailing_disconnect_is_planned_open() {
    let outages = outages_for(&[PLANNED, V4_DOWN]).await;

    assert_eq!(outages.len(), 1);
    assert_eq!(outages[0].status, OutageStatus::PlannedOpen);
}

#[tokio::test]
async fn ipv6_tracked_independently() {
    let outages = outages_for(&[V4_DOWN, V6_DOWN, V6_UP]).await;

    assert_eq!(outages.len(), 2);

    let v6 = outages
        .iter()
        .find(|o| o.protocol == Some(Protocol::Ipv6))
        .expect("ipv6 outage");
    assert_eq!(v6.status, OutageStatus::Closed);
    assert_eq!(v6.duration_seconds, Some(120));

    let v4 = outages
        .iter()
        .find(|o| o.protocol == Some(Protocol::Ipv4))
        .expect("ipv4 outage");
    assert_eq!(v4.status, OutageStatus::Open);
}

#[tokio::test]
async fn reconnect_without_disconnect_is_noise() {
    let outages = outages_for(&[V4_UP]).await;
    assert!(outages.is_empty());
}
