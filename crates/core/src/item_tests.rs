// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn item_at(id: &str, priority: Priority, secs: i64) -> WorkItem {
    let mut item = WorkItem::new(id, "task", "title").with_priority(priority);
    item.enqueued_at = Utc.timestamp_opt(secs, 0).single().unwrap();
    item
}

#[test]
fn priority_ordering_urgent_first() {
    assert!(Priority::Urgent > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
}

#[test]
fn claim_order_sorts_priority_then_age_then_id() {
    let mut items = vec![
        item_at("item-b", Priority::Normal, 100),
        item_at("item-a", Priority::Normal, 100),
        item_at("item-c", Priority::Urgent, 200),
        item_at("item-d", Priority::Normal, 50),
    ];
    items.sort_by(|a, b| a.claim_order(b));

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["item-c", "item-d", "item-a", "item-b"]);
}

#[test]
fn serde_uses_type_key_and_lowercase_status() {
    let item = item_at("item-1", Priority::High, 100);
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["type"], "task");
    assert_eq!(json["status"], "available");
    assert_eq!(json["priority"], "high");
    assert!(json.get("claimant").is_none(), "absent claimant is omitted");
}

#[test]
fn serde_roundtrip_preserves_claim_fields() {
    let mut item = item_at("item-1", Priority::Low, 100);
    item.status = ItemStatus::Claimed;
    item.claimant = Some(AgentId::new("agent-1"));
    item.claimed_at = Some(Utc.timestamp_opt(123, 0).single().unwrap());

    let json = serde_json::to_string(&item).unwrap();
    let back: WorkItem = serde_json::from_str(&json).unwrap();
    assert_eq!(back.status, ItemStatus::Claimed);
    assert_eq!(back.claimant, Some(AgentId::new("agent-1")));
    assert_eq!(back.claimed_at, item.claimed_at);
}

#[test]
fn minimal_json_fills_defaults() {
    let json = r#"{
        "id": "item-9",
        "type": "chore",
        "title": "sweep",
        "status": "available",
        "enqueued_at": "2026-01-01T00:00:00Z"
    }"#;
    let item: WorkItem = serde_json::from_str(json).unwrap();
    assert_eq!(item.priority, Priority::Normal);
    assert_eq!(item.failure_count, 0);
    assert!(item.rig.is_none());
    assert!(item.metadata.is_empty());
}
